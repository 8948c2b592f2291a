//! Pre-batch snapshots: the undo log behind rollback.
//!
//! Each touched file gets one [`Backup`] at first touch. An existing file is
//! copied to a sibling artifact (`<file><suffix>`) and kept in memory; a file
//! that did not exist is recorded as absent, so restoring it removes whatever
//! the batch created.
//!
//! While a batch runs, a journal at the workspace root lists every captured
//! file with the digest of its artifact. [`recover_backups`] trusts only
//! artifacts named there, so a user's own `notes.txt.bak` is never mistaken
//! for one of ours.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

use crate::events::{Event, EventSink};
use crate::fs::FileSystem;
use crate::safety::WorkspaceGuard;

pub const DEFAULT_BACKUP_SUFFIX: &str = ".bak";

/// Journal of the batch in flight, relative to the workspace root.
pub const JOURNAL_FILE: &str = ".anchor-patcher.journal";

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("backup I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed backup journal {path}: {source}")]
    Journal {
        path: PathBuf,
        source: serde_json::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> BackupError + '_ {
    move |source| BackupError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Sibling artifact path for `file`: the suffix is appended to the file name.
pub fn artifact_path(file: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = file.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    file.with_file_name(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    file: PathBuf,
    artifact: PathBuf,
    snapshot: Option<Vec<u8>>,
    digest: Option<u64>,
}

impl Backup {
    /// Snapshot `file` as it is right now.
    ///
    /// Any artifact left over from an earlier batch is replaced (existing
    /// file) or removed (absent file).
    pub fn capture(fs: &dyn FileSystem, file: &Path, suffix: &str) -> Result<Self, BackupError> {
        let artifact = artifact_path(file, suffix);
        let snapshot = fs.read(file).map_err(io_err(file))?;
        let digest = match &snapshot {
            Some(bytes) => {
                fs.write_atomic(&artifact, bytes).map_err(io_err(&artifact))?;
                Some(xxh3_64(bytes))
            }
            None => {
                fs.remove(&artifact).map_err(io_err(&artifact))?;
                None
            }
        };
        Ok(Self {
            file: file.to_path_buf(),
            artifact,
            snapshot,
            digest,
        })
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    pub fn existed(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn snapshot(&self) -> Option<&[u8]> {
        self.snapshot.as_deref()
    }

    pub fn digest(&self) -> Option<u64> {
        self.digest
    }

    /// True when `content` is byte-identical to the snapshot.
    pub fn matches(&self, content: &[u8]) -> bool {
        self.digest == Some(xxh3_64(content)) && self.snapshot.as_deref() == Some(content)
    }

    /// Put the file back exactly as captured and drop the artifact.
    ///
    /// An intact artifact is renamed over the file; a missing or corrupt one
    /// falls back to the in-memory snapshot.
    pub fn restore(&self, fs: &dyn FileSystem) -> Result<(), BackupError> {
        let Some(snapshot) = &self.snapshot else {
            fs.remove(&self.file).map_err(io_err(&self.file))?;
            return Ok(());
        };

        let artifact_intact = fs
            .read(&self.artifact)
            .map_err(io_err(&self.artifact))?
            .is_some_and(|bytes| Some(xxh3_64(&bytes)) == self.digest);

        if artifact_intact {
            fs.rename(&self.artifact, &self.file)
                .map_err(io_err(&self.file))?;
        } else {
            if let Some(parent) = self.file.parent() {
                fs.create_dir_all(parent).map_err(io_err(parent))?;
            }
            fs.write_atomic(&self.file, snapshot)
                .map_err(io_err(&self.file))?;
            fs.remove(&self.artifact).map_err(io_err(&self.artifact))?;
        }
        Ok(())
    }

    /// Drop the artifact; the batch's changes are final.
    pub fn discard(&self, fs: &dyn FileSystem) -> Result<(), BackupError> {
        fs.remove(&self.artifact).map_err(io_err(&self.artifact))?;
        Ok(())
    }
}

/// Backups for every file touched by one batch, in first-touch order.
#[derive(Debug, Default)]
pub struct BackupSet {
    suffix: String,
    backups: Vec<Backup>,
    index: HashMap<PathBuf, usize>,
    journal: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct Journal {
    suffix: String,
    entries: Vec<JournalEntry>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct JournalEntry {
    file: PathBuf,
    /// xxh3 of the artifact; `None` when the file did not exist.
    digest: Option<u64>,
}

impl BackupSet {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            backups: Vec::new(),
            index: HashMap::new(),
            journal: None,
        }
    }

    /// Keep a journal at `path`, rewritten after every capture and removed
    /// once the batch is settled.
    pub fn with_journal(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal = Some(path.into());
        self
    }

    /// Capture `file` unless it was already captured in this batch, so a
    /// second touch never overwrites the snapshot with mutated content.
    pub fn capture_once(
        &mut self,
        fs: &dyn FileSystem,
        sink: &dyn EventSink,
        file: &Path,
    ) -> Result<&Backup, BackupError> {
        if let Some(&i) = self.index.get(file) {
            return Ok(&self.backups[i]);
        }
        let backup = Backup::capture(fs, file, &self.suffix)?;
        sink.record(&Event::BackupCaptured {
            file: file.to_path_buf(),
            existed: backup.existed(),
        });
        self.index.insert(file.to_path_buf(), self.backups.len());
        self.backups.push(backup);
        self.write_journal(fs)?;
        Ok(&self.backups[self.backups.len() - 1])
    }

    fn write_journal(&self, fs: &dyn FileSystem) -> Result<(), BackupError> {
        let Some(path) = &self.journal else {
            return Ok(());
        };
        let journal = Journal {
            suffix: self.suffix.clone(),
            entries: self
                .backups
                .iter()
                .map(|b| JournalEntry {
                    file: b.file.clone(),
                    digest: b.digest,
                })
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&journal).map_err(|source| BackupError::Journal {
            path: path.clone(),
            source,
        })?;
        fs.write_atomic(path, &bytes).map_err(io_err(path))
    }

    fn remove_journal(&self, fs: &dyn FileSystem) -> Result<(), BackupError> {
        if let Some(path) = &self.journal {
            fs.remove(path).map_err(io_err(path))?;
        }
        Ok(())
    }

    pub fn get(&self, file: &Path) -> Option<&Backup> {
        self.index.get(file).map(|&i| &self.backups[i])
    }

    pub fn len(&self) -> usize {
        self.backups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backups.is_empty()
    }

    pub fn files(&self) -> Vec<PathBuf> {
        self.backups.iter().map(|b| b.file.clone()).collect()
    }

    /// Restore every file, continuing past failures. Returns the number
    /// restored and the errors hit along the way. The journal survives any
    /// failure so `recover` can finish the job.
    pub fn restore_all(&self, fs: &dyn FileSystem, sink: &dyn EventSink) -> (usize, Vec<BackupError>) {
        let mut restored = 0;
        let mut errors = Vec::new();
        for backup in self.backups.iter().rev() {
            match backup.restore(fs) {
                Ok(()) => {
                    restored += 1;
                    sink.record(&Event::BackupRestored {
                        file: backup.file.clone(),
                    });
                }
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            if let Err(e) = self.remove_journal(fs) {
                errors.push(e);
            }
        }
        sink.record(&Event::RolledBack { files: restored });
        (restored, errors)
    }

    /// Drop every artifact. The journal goes first, so artifacts left by a
    /// failure here are never restored over the batch's result.
    pub fn discard_all(&self, fs: &dyn FileSystem, sink: &dyn EventSink) -> Result<(), BackupError> {
        self.remove_journal(fs)?;
        for backup in &self.backups {
            backup.discard(fs)?;
            sink.record(&Event::BackupDiscarded {
                file: backup.file.clone(),
            });
        }
        Ok(())
    }
}

/// What [`recover_backups`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Files put back from their artifact.
    pub restored: Vec<PathBuf>,
    /// Files the interrupted batch created, now removed.
    pub removed: Vec<PathBuf>,
    /// Journal entries left alone, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

impl RecoveryReport {
    pub fn is_empty(&self) -> bool {
        self.restored.is_empty() && self.removed.is_empty() && self.skipped.is_empty()
    }
}

/// Undo a batch that was interrupted before it settled.
///
/// Only files listed in the journal at `journal` are touched, each one
/// through `guard`, and an artifact is renamed back only when it still has
/// the recorded digest. The journal is removed afterwards. A missing
/// journal means there is nothing to recover.
pub fn recover_backups(
    fs: &dyn FileSystem,
    guard: &WorkspaceGuard,
    journal: &Path,
) -> Result<RecoveryReport, BackupError> {
    let mut report = RecoveryReport::default();
    let Some(bytes) = fs.read(journal).map_err(io_err(journal))? else {
        return Ok(report);
    };
    let parsed: Journal = serde_json::from_slice(&bytes).map_err(|source| BackupError::Journal {
        path: journal.to_path_buf(),
        source,
    })?;

    // Last captured first, same as rollback
    for entry in parsed.entries.iter().rev() {
        let file = match guard.resolve(fs, &entry.file.to_string_lossy()) {
            Ok(file) => file,
            Err(e) => {
                report.skipped.push((entry.file.clone(), e.to_string()));
                continue;
            }
        };

        let Some(digest) = entry.digest else {
            if fs.remove(&file).map_err(io_err(&file))? {
                report.removed.push(file);
            }
            continue;
        };

        let artifact = artifact_path(&file, &parsed.suffix);
        match fs.read(&artifact).map_err(io_err(&artifact))? {
            Some(bytes) if xxh3_64(&bytes) == digest => {
                fs.rename(&artifact, &file).map_err(io_err(&file))?;
                report.restored.push(file);
            }
            Some(_) => report
                .skipped
                .push((file, "artifact does not match the journal".to_string())),
            None => report.skipped.push((file, "artifact is missing".to_string())),
        }
    }

    fs.remove(journal).map_err(io_err(journal))?;
    Ok(report)
}
