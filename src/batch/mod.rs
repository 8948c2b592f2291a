pub mod coordinator;
pub mod loader;
pub mod schema;

pub use coordinator::{BatchError, BatchReport, Engine, PreviewReport};
pub use loader::{load_from_path, load_from_reader, load_from_str, LoadError};
pub use schema::{
    ApplyResult, DirectiveKind, EditBatch, EditDirective, Position, ValidationError,
    ValidationIssue, BOF_SENTINEL, EOF_SENTINEL,
};
