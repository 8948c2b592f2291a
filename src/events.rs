//! Structured engine events and the sinks that receive them.
//!
//! The engine never logs directly; it hands every observable step to an
//! [`EventSink`] supplied by the caller.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::batch::schema::DirectiveKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    BatchStarted {
        directives: usize,
        files: usize,
    },
    BatchFinished {
        success: bool,
        edits_applied: usize,
    },
    BackupCaptured {
        file: PathBuf,
        existed: bool,
    },
    BackupDiscarded {
        file: PathBuf,
    },
    BackupRestored {
        file: PathBuf,
    },
    BackupDiscardFailed {
        message: String,
    },
    DirectiveApplied {
        file: PathBuf,
        kind: DirectiveKind,
        line: Option<usize>,
    },
    AnchorNotFound {
        file: PathBuf,
        kind: DirectiveKind,
        anchor: String,
        closest: Option<(usize, String)>,
    },
    DeclarationGuard {
        file: PathBuf,
        target: String,
    },
    DirectiveSkipped {
        file: PathBuf,
        kind: DirectiveKind,
        reason: &'static str,
    },
    FileWritten {
        file: PathBuf,
        bytes: usize,
    },
    FileUnchanged {
        file: PathBuf,
    },
    FileCreated {
        file: PathBuf,
    },
    FileDeleted {
        file: PathBuf,
        existed: bool,
    },
    ValidatorFailed {
        message: String,
    },
    RolledBack {
        files: usize,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::BatchStarted { .. } => "batch_started",
            Event::BatchFinished { .. } => "batch_finished",
            Event::BackupCaptured { .. } => "backup_captured",
            Event::BackupDiscarded { .. } => "backup_discarded",
            Event::BackupRestored { .. } => "backup_restored",
            Event::BackupDiscardFailed { .. } => "backup_discard_failed",
            Event::DirectiveApplied { .. } => "directive_applied",
            Event::AnchorNotFound { .. } => "anchor_not_found",
            Event::DeclarationGuard { .. } => "declaration_guard",
            Event::DirectiveSkipped { .. } => "directive_skipped",
            Event::FileWritten { .. } => "file_written",
            Event::FileUnchanged { .. } => "file_unchanged",
            Event::FileCreated { .. } => "file_created",
            Event::FileDeleted { .. } => "file_deleted",
            Event::ValidatorFailed { .. } => "validator_failed",
            Event::RolledBack { .. } => "rolled_back",
        }
    }

    /// Events that deserve operator attention.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::AnchorNotFound { .. }
                | Event::DeclarationGuard { .. }
                | Event::BackupDiscardFailed { .. }
                | Event::ValidatorFailed { .. }
                | Event::RolledBack { .. }
        )
    }

    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let file = |p: &PathBuf| ("file", p.display().to_string());
        match self {
            Event::BatchStarted { directives, files } => vec![
                ("directives", directives.to_string()),
                ("files", files.to_string()),
            ],
            Event::BatchFinished {
                success,
                edits_applied,
            } => vec![
                ("success", success.to_string()),
                ("edits_applied", edits_applied.to_string()),
            ],
            Event::BackupCaptured { file: f, existed } => {
                vec![file(f), ("existed", existed.to_string())]
            }
            Event::BackupDiscarded { file: f }
            | Event::BackupRestored { file: f }
            | Event::FileUnchanged { file: f }
            | Event::FileCreated { file: f } => vec![file(f)],
            Event::DirectiveApplied { file: f, kind, line } => {
                let mut out = vec![file(f), ("kind", kind.to_string())];
                if let Some(line) = line {
                    out.push(("line", (line + 1).to_string()));
                }
                out
            }
            Event::AnchorNotFound {
                file: f,
                kind,
                anchor,
                closest,
            } => {
                let mut out = vec![file(f), ("kind", kind.to_string()), ("anchor", anchor.clone())];
                if let Some((line, text)) = closest {
                    out.push(("closest_line", (line + 1).to_string()));
                    out.push(("closest_text", text.clone()));
                }
                out
            }
            Event::DeclarationGuard { file: f, target } => {
                vec![file(f), ("target", target.clone())]
            }
            Event::DirectiveSkipped {
                file: f,
                kind,
                reason,
            } => vec![file(f), ("kind", kind.to_string()), ("reason", reason.to_string())],
            Event::FileWritten { file: f, bytes } => vec![file(f), ("bytes", bytes.to_string())],
            Event::FileDeleted { file: f, existed } => {
                vec![file(f), ("existed", existed.to_string())]
            }
            Event::ValidatorFailed { message } | Event::BackupDiscardFailed { message } => {
                vec![("message", message.clone())]
            }
            Event::RolledBack { files } => vec![("files", files.to_string())],
        }
    }
}

/// Receiver for engine events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &Event);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &Event) {}
}

/// Forwards events to `tracing`, warnings at WARN and the rest at INFO.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &Event) {
        let fields = event
            .fields()
            .into_iter()
            .map(|(k, v)| format!("{k}={v:?}"))
            .collect::<Vec<_>>()
            .join(" ");
        if event.is_warning() {
            tracing::warn!(event = event.name(), "{fields}");
        } else {
            tracing::info!(event = event.name(), "{fields}");
        }
    }
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(Event::name).collect()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.record(&Event::BatchStarted {
            directives: 2,
            files: 1,
        });
        sink.record(&Event::RolledBack { files: 1 });
        assert_eq!(sink.names(), vec!["batch_started", "rolled_back"]);
    }

    #[test]
    fn test_fields_use_one_based_lines() {
        let event = Event::DirectiveApplied {
            file: PathBuf::from("a.go"),
            kind: DirectiveKind::Insert,
            line: Some(0),
        };
        assert!(event.fields().contains(&("line", "1".to_string())));
        assert!(!event.is_warning());
    }

    #[test]
    fn test_guard_is_warning() {
        let event = Event::DeclarationGuard {
            file: PathBuf::from("a.go"),
            target: "type User struct {".to_string(),
        };
        assert!(event.is_warning());
        assert_eq!(event.name(), "declaration_guard");
    }
}
