//! Batch Coordinator: the `apply_edits` entry point.
//!
//! A batch is validated, its paths resolved, and its directives grouped by
//! file (first-appearance order, per-file order preserved). Each file runs
//! as its own transaction behind a backup; the validator runs once at the
//! end, and any failure after the first write restores every touched file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::backup::{recover_backups, BackupError, BackupSet, RecoveryReport, JOURNAL_FILE};
use crate::batch::schema::{ApplyResult, EditBatch, ValidationError};
use crate::edit::{DirectiveOutcome, EditApplier};
use crate::events::{Event, EventSink, NullSink, TracingSink};
use crate::fs::{FileSystem, OsFileSystem};
use crate::safety::{PathError, WorkspaceGuard};
use crate::settings::{EngineSettings, SettingsError};
use crate::transaction::{FileChange, FileTransaction, Mode, TransactionError};
use crate::validate::{CommandValidator, NoopValidator, Validator, ValidatorError};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("invalid workspace: {0}")]
    Workspace(PathError),

    #[error("edit[{index}]: {source}")]
    Path { index: usize, source: PathError },

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Validator(#[from] ValidatorError),

    #[error("recovery failed: {0}")]
    Recovery(#[from] BackupError),
}

/// Directives for one file, as indices into the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileGroup {
    path: PathBuf,
    directives: Vec<usize>,
}

/// Full outcome of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub result: ApplyResult,
    /// One entry per directive, in batch order. Empty when the batch stopped
    /// before every directive ran.
    pub outcomes: Vec<DirectiveOutcome>,
    /// Files captured by the batch, in first-touch order.
    pub touched: Vec<PathBuf>,
}

/// Result of a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewReport {
    pub changes: Vec<FileChange>,
    pub outcomes: Vec<DirectiveOutcome>,
}

pub struct Engine {
    workspace: PathBuf,
    settings: EngineSettings,
    applier: EditApplier,
    fs: Box<dyn FileSystem>,
    validator: Box<dyn Validator>,
    sink: Arc<dyn EventSink>,
}

impl Engine {
    /// Engine on the real filesystem, reporting through `tracing`.
    ///
    /// Fails when `settings` do not pass [`EngineSettings::validate`]. The
    /// validator comes from `settings.validator` when configured.
    pub fn new(workspace: impl Into<PathBuf>, settings: EngineSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        let workspace = workspace.into();
        let validator: Box<dyn Validator> = match settings
            .validator
            .as_ref()
            .and_then(|v| CommandValidator::from_argv(&v.command, &workspace))
        {
            Some(command) => Box::new(command),
            None => Box::new(NoopValidator),
        };
        Ok(Self {
            applier: EditApplier::from_settings(&settings),
            workspace,
            settings,
            fs: Box::new(OsFileSystem),
            validator,
            sink: Arc::new(TracingSink),
        })
    }

    pub fn with_filesystem(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Box::new(fs);
        self
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn filesystem(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Apply a batch. Never panics; every failure is reported in the result.
    pub fn apply_edits(&self, batch: &EditBatch) -> ApplyResult {
        self.apply_edits_detailed(batch).result
    }

    /// [`apply_edits`](Self::apply_edits) plus per-directive outcomes.
    pub fn apply_edits_detailed(&self, batch: &EditBatch) -> BatchReport {
        let sink = self.sink.as_ref();
        let groups = match self.plan(batch) {
            Ok(groups) => groups,
            Err(e) => {
                sink.record(&Event::BatchFinished {
                    success: false,
                    edits_applied: 0,
                });
                return BatchReport {
                    result: ApplyResult::failed(e),
                    outcomes: Vec::new(),
                    touched: Vec::new(),
                };
            }
        };

        sink.record(&Event::BatchStarted {
            directives: batch.edits.len(),
            files: groups.len(),
        });

        let mut backups =
            BackupSet::new(self.settings.backup_suffix.clone()).with_journal(self.journal_path());
        let mut outcomes: Vec<Option<DirectiveOutcome>> = vec![None; batch.edits.len()];

        let outcome = self
            .run_groups(batch, &groups, &mut backups, &mut outcomes)
            .and_then(|()| {
                self.validator.validate(&backups.files()).map_err(|e| {
                    sink.record(&Event::ValidatorFailed {
                        message: e.to_string(),
                    });
                    BatchError::from(e)
                })
            });

        let result = match outcome {
            Ok(()) => {
                if let Err(e) = backups.discard_all(self.fs.as_ref(), sink) {
                    sink.record(&Event::BackupDiscardFailed {
                        message: e.to_string(),
                    });
                }
                ApplyResult::ok(batch.edits.len())
            }
            Err(e) => self.roll_back(&backups, e),
        };

        sink.record(&Event::BatchFinished {
            success: result.success,
            edits_applied: result.edits_applied,
        });

        BatchReport {
            result,
            outcomes: outcomes.into_iter().collect::<Option<Vec<_>>>().unwrap_or_default(),
            touched: backups.files(),
        }
    }

    /// Compute every file's before/after content without writing anything.
    pub fn preview(&self, batch: &EditBatch) -> Result<PreviewReport, BatchError> {
        let groups = self.plan(batch)?;
        let mut outcomes: Vec<Option<DirectiveOutcome>> = vec![None; batch.edits.len()];
        let mut changes = Vec::with_capacity(groups.len());

        for group in &groups {
            let original = self
                .fs
                .read(&group.path)
                .map_err(|source| TransactionError::Io {
                    path: group.path.clone(),
                    source,
                })?;
            let mut tx = FileTransaction::begin(
                self.fs.as_ref(),
                &NullSink,
                Mode::Preview,
                &group.path,
                original.as_deref(),
            )?;
            for &index in &group.directives {
                outcomes[index] = Some(tx.apply(&self.applier, &batch.edits[index])?);
            }
            changes.push(tx.commit()?);
        }

        Ok(PreviewReport {
            changes,
            outcomes: outcomes.into_iter().flatten().collect(),
        })
    }

    /// Undo a batch that was interrupted before it settled, using the
    /// journal it left in the workspace.
    pub fn recover(&self) -> Result<RecoveryReport, BatchError> {
        let guard = self.guard()?;
        Ok(recover_backups(self.fs.as_ref(), &guard, &self.journal_path())?)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.workspace.join(JOURNAL_FILE)
    }

    fn guard(&self) -> Result<WorkspaceGuard, BatchError> {
        WorkspaceGuard::new(
            self.fs.as_ref(),
            &self.workspace,
            &self.settings.forbidden,
            self.settings.confine_to_workspace,
        )
        .map_err(BatchError::Workspace)
    }

    /// Validate the batch and group its directives by resolved path.
    fn plan(&self, batch: &EditBatch) -> Result<Vec<FileGroup>, BatchError> {
        batch.validate()?;

        let guard = self.guard()?;

        let mut groups: Vec<FileGroup> = Vec::new();
        let mut by_path: HashMap<PathBuf, usize> = HashMap::new();
        for (index, directive) in batch.edits.iter().enumerate() {
            let path = guard
                .resolve(self.fs.as_ref(), &directive.file)
                .map_err(|source| BatchError::Path { index, source })?;
            match by_path.get(&path) {
                Some(&group) => groups[group].directives.push(index),
                None => {
                    by_path.insert(path.clone(), groups.len());
                    groups.push(FileGroup {
                        path,
                        directives: vec![index],
                    });
                }
            }
        }
        Ok(groups)
    }

    fn run_groups(
        &self,
        batch: &EditBatch,
        groups: &[FileGroup],
        backups: &mut BackupSet,
        outcomes: &mut [Option<DirectiveOutcome>],
    ) -> Result<(), BatchError> {
        for group in groups {
            self.run_file(batch, group, backups, outcomes)?;
        }
        Ok(())
    }

    fn run_file(
        &self,
        batch: &EditBatch,
        group: &FileGroup,
        backups: &mut BackupSet,
        outcomes: &mut [Option<DirectiveOutcome>],
    ) -> Result<(), TransactionError> {
        let fs = self.fs.as_ref();
        let sink = self.sink.as_ref();
        let backup = backups.capture_once(fs, sink, &group.path)?;
        let mut tx = FileTransaction::begin(fs, sink, Mode::Commit, &group.path, backup.snapshot())?;
        for &index in &group.directives {
            outcomes[index] = Some(tx.apply(&self.applier, &batch.edits[index])?);
        }
        tx.commit()?;
        Ok(())
    }

    fn roll_back(&self, backups: &BackupSet, error: BatchError) -> ApplyResult {
        let (_, failures) = backups.restore_all(self.fs.as_ref(), self.sink.as_ref());
        match failures.first() {
            None => ApplyResult::failed(error),
            Some(first) => ApplyResult::failed(format!(
                "{error}; rollback incomplete ({} file(s) not restored): {first}",
                failures.len()
            )),
        }
    }
}
