//! Anchor Patcher: anchor-based text patching with validator-driven rollback
//!
//! Edits locate their target lines by content rather than by line number, so
//! a batch authored against a slightly different version of a file still
//! lands in the right place. Matching is tolerant of re-indentation, case and
//! whitespace changes, and can be narrowed with nearby context lines.
//!
//! # Architecture
//!
//! A batch of directives is grouped by file. Each file is backed up, loaded
//! into a [`LineBuffer`], edited directive-by-directive by the
//! [`EditApplier`], and written back atomically. Once every file is written
//! a [`Validator`] checks the workspace; if it rejects the result, every
//! touched file is restored from its backup.
//!
//! # Safety
//!
//! - Anchors that cannot be found are no-ops, never errors
//! - Atomic file writes (tempfile + fsync + rename)
//! - One backup per file per batch, verified by digest on restore
//! - Workspace boundary enforcement
//! - Declaration-level single-line replaces are downgraded to inserts
//!
//! # Example
//!
//! ```no_run
//! use anchor_patcher::{EditBatch, EditDirective, Engine, EngineSettings};
//!
//! let engine = Engine::new("/path/to/workspace", EngineSettings::default())?;
//! let batch = EditBatch::new(vec![EditDirective::replace(
//!     "main.go",
//!     "fmt.Println(\"middle\")",
//!     "fmt.Println(\"X\")",
//! )
//! .with_context_before("func Demo(")]);
//!
//! let result = engine.apply_edits(&batch);
//! println!("applied {} edits", result.edits_applied);
//! # Ok::<(), anchor_patcher::SettingsError>(())
//! ```

pub mod backup;
pub mod batch;
pub mod block;
pub mod buffer;
pub mod edit;
pub mod events;
pub mod fs;
pub mod matcher;
pub mod normalize;
pub mod safety;
pub mod settings;
pub mod transaction;
pub mod validate;

// Re-exports
pub use backup::{recover_backups, Backup, BackupError, BackupSet, RecoveryReport, JOURNAL_FILE};
pub use batch::{
    load_from_path, load_from_str, ApplyResult, BatchError, BatchReport, DirectiveKind, EditBatch,
    EditDirective, Engine, LoadError, Position, PreviewReport,
};
pub use block::{find_block, BlockRange};
pub use buffer::LineBuffer;
pub use edit::{DirectiveOutcome, EditApplier};
pub use events::{Event, EventSink, NullSink, RecordingSink, TracingSink};
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use matcher::{ContextDirection, LineMatcher};
pub use normalize::Normalizer;
pub use safety::{PathError, WorkspaceGuard};
pub use settings::{EngineSettings, SettingsError};
pub use transaction::{FileChange, TransactionError};
pub use validate::{CommandValidator, FnValidator, NoopValidator, Validator, ValidatorError};
