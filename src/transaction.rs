//! File Transaction Manager: every directive for one file, then one write.
//!
//! The transaction starts from the file's pre-batch bytes (the backup
//! snapshot, or a plain read for previews), runs its directives in batch
//! order through the [`EditApplier`], and writes the final buffer
//! atomically. `create_file` and `delete_file` act on the filesystem
//! immediately and end line-level editing for the file.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::backup::BackupError;
use crate::batch::schema::{DirectiveKind, EditDirective};
use crate::buffer::LineBuffer;
use crate::edit::{DirectiveOutcome, EditApplier};
use crate::events::{Event, EventSink};
use crate::fs::FileSystem;

const SKIP_AFTER_CREATE: &str = "file was created earlier in this batch";
const SKIP_AFTER_DELETE: &str = "file was deleted earlier in this batch";
const SKIP_MISSING_FILE: &str = "file does not exist";

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    Encoding { path: PathBuf },

    #[error(transparent)]
    Backup(#[from] BackupError),
}

/// Where the file stands within the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileState {
    Existing,
    Absent,
    Created,
    Deleted,
}

/// Whether filesystem effects happen or are only computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Commit,
    Preview,
}

/// Before/after content of one file. `None` means the file does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl FileChange {
    pub fn is_modified(&self) -> bool {
        self.before != self.after
    }
}

pub struct FileTransaction<'a> {
    fs: &'a dyn FileSystem,
    sink: &'a dyn EventSink,
    mode: Mode,
    path: PathBuf,
    original: Option<String>,
    buffer: LineBuffer,
    state: FileState,
}

impl<'a> FileTransaction<'a> {
    /// Start a transaction on `path` whose pre-batch content is `original`.
    pub fn begin(
        fs: &'a dyn FileSystem,
        sink: &'a dyn EventSink,
        mode: Mode,
        path: &Path,
        original: Option<&[u8]>,
    ) -> Result<Self, TransactionError> {
        let original = original
            .map(|bytes| {
                String::from_utf8(bytes.to_vec()).map_err(|_| TransactionError::Encoding {
                    path: path.to_path_buf(),
                })
            })
            .transpose()?;
        let buffer = original.as_deref().map(LineBuffer::from_text).unwrap_or_default();
        let state = if original.is_some() {
            FileState::Existing
        } else {
            FileState::Absent
        };
        Ok(Self {
            fs,
            sink,
            mode,
            path: path.to_path_buf(),
            original,
            buffer,
            state,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply one directive. Only filesystem failures are errors.
    pub fn apply(
        &mut self,
        applier: &EditApplier,
        directive: &EditDirective,
    ) -> Result<DirectiveOutcome, TransactionError> {
        let kind = directive.kind;
        let skip = match (self.state, kind) {
            (FileState::Created, _) => Some(SKIP_AFTER_CREATE),
            (FileState::Deleted, DirectiveKind::CreateFile) => None,
            (FileState::Deleted, _) => Some(SKIP_AFTER_DELETE),
            (FileState::Absent, DirectiveKind::CreateFile | DirectiveKind::DeleteFile) => None,
            (FileState::Absent, _) => Some(SKIP_MISSING_FILE),
            (FileState::Existing, _) => None,
        };
        if let Some(reason) = skip {
            self.sink.record(&Event::DirectiveSkipped {
                file: self.path.clone(),
                kind,
                reason,
            });
            return Ok(DirectiveOutcome::Skipped { reason });
        }

        match kind {
            DirectiveKind::CreateFile => self.create(applier, directive),
            DirectiveKind::DeleteFile => self.delete(applier, directive),
            _ => Ok(self.edit(applier, directive)),
        }
    }

    fn create(
        &mut self,
        applier: &EditApplier,
        directive: &EditDirective,
    ) -> Result<DirectiveOutcome, TransactionError> {
        let outcome = applier.apply(&mut self.buffer, directive);
        if self.mode == Mode::Commit {
            if let Some(parent) = self.path.parent() {
                self.fs.create_dir_all(parent).map_err(|source| TransactionError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            self.fs
                .write_atomic(&self.path, directive.content.as_bytes())
                .map_err(|source| TransactionError::Io {
                    path: self.path.clone(),
                    source,
                })?;
        }
        self.state = FileState::Created;
        self.sink.record(&Event::FileCreated {
            file: self.path.clone(),
        });
        Ok(outcome)
    }

    fn delete(
        &mut self,
        applier: &EditApplier,
        directive: &EditDirective,
    ) -> Result<DirectiveOutcome, TransactionError> {
        let outcome = applier.apply(&mut self.buffer, directive);
        let existed = match self.mode {
            Mode::Commit => self.fs.remove(&self.path).map_err(|source| TransactionError::Io {
                path: self.path.clone(),
                source,
            })?,
            Mode::Preview => self.state == FileState::Existing,
        };
        self.state = FileState::Deleted;
        self.sink.record(&Event::FileDeleted {
            file: self.path.clone(),
            existed,
        });
        Ok(outcome)
    }

    fn edit(&mut self, applier: &EditApplier, directive: &EditDirective) -> DirectiveOutcome {
        let outcome = applier.apply(&mut self.buffer, directive);
        let file = self.path.clone();
        let kind = directive.kind;
        match &outcome {
            DirectiveOutcome::Applied { line } => self.sink.record(&Event::DirectiveApplied {
                file,
                kind,
                line: *line,
            }),
            DirectiveOutcome::NotFound { anchor, closest } => {
                self.sink.record(&Event::AnchorNotFound {
                    file,
                    kind,
                    anchor: anchor.clone(),
                    closest: closest.clone(),
                })
            }
            DirectiveOutcome::Downgraded { line } => {
                self.sink.record(&Event::DeclarationGuard {
                    file: file.clone(),
                    target: directive.target.clone(),
                });
                if line.is_some() {
                    self.sink.record(&Event::DirectiveApplied {
                        file,
                        kind: DirectiveKind::Insert,
                        line: *line,
                    });
                }
            }
            DirectiveOutcome::Skipped { reason } => self.sink.record(&Event::DirectiveSkipped {
                file,
                kind,
                reason: *reason,
            }),
        }
        outcome
    }

    /// Write the final buffer if line-level edits changed it.
    ///
    /// Created and deleted files were already handled when their directive
    /// ran, and a file that never existed is left alone.
    pub fn commit(self) -> Result<FileChange, TransactionError> {
        let after = match self.state {
            FileState::Existing => {
                let text = self.buffer.to_text();
                if self.original.as_deref() == Some(text.as_str()) {
                    self.sink.record(&Event::FileUnchanged {
                        file: self.path.clone(),
                    });
                } else {
                    if self.mode == Mode::Commit {
                        self.fs
                            .write_atomic(&self.path, text.as_bytes())
                            .map_err(|source| TransactionError::Io {
                                path: self.path.clone(),
                                source,
                            })?;
                    }
                    self.sink.record(&Event::FileWritten {
                        file: self.path.clone(),
                        bytes: text.len(),
                    });
                }
                Some(text)
            }
            FileState::Created => Some(self.buffer.to_text()),
            FileState::Absent | FileState::Deleted => None,
        };

        Ok(FileChange {
            path: self.path,
            before: self.original,
            after,
        })
    }
}
