//! Edit Applier: one directive against one in-memory line buffer.
//!
//! Anchors that cannot be located are never errors. The directive becomes a
//! no-op and the outcome says why, so a batch survives the occasional
//! mis-targeted directive.

use crate::batch::schema::{DirectiveKind, EditDirective, Position, BOF_SENTINEL, EOF_SENTINEL};
use crate::block::find_block;
use crate::buffer::{split_text, LineBuffer};
use crate::matcher::{ContextDirection, LineMatcher};
use crate::settings::EngineSettings;

/// What happened to a single directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveOutcome {
    /// Applied; `line` is the first affected line, when there is one.
    Applied { line: Option<usize> },
    /// The anchor (or a block bound) was not found; nothing changed.
    NotFound {
        anchor: String,
        closest: Option<(usize, String)>,
    },
    /// A single-line replace on a declaration opener ran as an insert-after.
    /// `line` is `None` when that insert's anchor was not found either.
    Downgraded { line: Option<usize> },
    /// Not applied because of the file's state within the batch.
    Skipped { reason: &'static str },
}

impl DirectiveOutcome {
    /// True when the buffer or file was changed.
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            DirectiveOutcome::Applied { .. } | DirectiveOutcome::Downgraded { line: Some(_) }
        )
    }
}

#[derive(Debug, Clone)]
pub struct EditApplier {
    matcher: LineMatcher,
    declaration_openers: Vec<String>,
}

impl Default for EditApplier {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

impl EditApplier {
    pub fn new(matcher: LineMatcher, declaration_openers: Vec<String>) -> Self {
        Self {
            matcher,
            declaration_openers,
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.matcher(), settings.declaration_openers.clone())
    }

    pub fn matcher(&self) -> &LineMatcher {
        &self.matcher
    }

    /// Apply `directive` to `buffer`.
    ///
    /// `create_file` and `delete_file` only reset the buffer here; touching
    /// the filesystem is the transaction's job.
    pub fn apply(&self, buffer: &mut LineBuffer, directive: &EditDirective) -> DirectiveOutcome {
        match directive.kind {
            DirectiveKind::Insert => self.insert(
                buffer,
                directive,
                directive.position,
                &directive.target,
                &directive.content,
            ),
            DirectiveKind::Replace => self.replace(buffer, directive),
            DirectiveKind::ReplaceFile => {
                buffer.replace_all(&directive.replacement);
                DirectiveOutcome::Applied { line: None }
            }
            DirectiveKind::CreateFile => {
                buffer.replace_all(&directive.content);
                DirectiveOutcome::Applied { line: None }
            }
            DirectiveKind::DeleteFile => {
                *buffer = LineBuffer::default();
                DirectiveOutcome::Applied { line: None }
            }
        }
    }

    /// True when `target` names a whole declaration (type, function, ...).
    pub fn is_declaration(&self, target: &str) -> bool {
        let normalizer = self.matcher.normalizer();
        let target = normalizer.normalize(target);
        self.declaration_openers.iter().any(|opener| {
            let opener = normalizer.normalize(opener);
            !opener.is_empty()
                && target
                    .strip_prefix(opener.as_str())
                    .is_some_and(|rest| rest.starts_with(' '))
        })
    }

    fn insert(
        &self,
        buffer: &mut LineBuffer,
        directive: &EditDirective,
        position: Position,
        target: &str,
        content: &str,
    ) -> DirectiveOutcome {
        let new_lines = split_text(content);
        let at = match target.trim() {
            BOF_SENTINEL => 0,
            EOF_SENTINEL => buffer.len(),
            _ => {
                let (context, direction) = authoritative_context(directive, position);
                let Some(index) = self.matcher.find_line(buffer.lines(), target, context, direction) else {
                    return self.not_found(buffer, target);
                };
                match position {
                    Position::Before => index,
                    Position::After => index + 1,
                }
            }
        };
        buffer.insert_lines(at, new_lines);
        DirectiveOutcome::Applied { line: Some(at) }
    }

    fn replace(&self, buffer: &mut LineBuffer, directive: &EditDirective) -> DirectiveOutcome {
        if directive.has_block_bounds() {
            let Some(range) = find_block(
                &self.matcher,
                buffer.lines(),
                &directive.start,
                &directive.end,
                &directive.context_before,
            ) else {
                return self.not_found(buffer, &directive.start);
            };
            buffer.splice_lines(range.start, range.end, split_text(&directive.replacement));
            return DirectiveOutcome::Applied {
                line: Some(range.start),
            };
        }

        // A declaration line is kept; the replacement goes right after it.
        if self.is_declaration(&directive.target) {
            let line = match self.insert(
                buffer,
                directive,
                Position::After,
                &directive.target,
                &directive.replacement,
            ) {
                DirectiveOutcome::Applied { line } => line,
                _ => None,
            };
            return DirectiveOutcome::Downgraded { line };
        }

        let (context, direction) = authoritative_context(directive, directive.position);
        let Some(index) = self
            .matcher
            .find_line(buffer.lines(), &directive.target, context, direction)
        else {
            return self.not_found(buffer, &directive.target);
        };
        buffer.splice_lines(index, index, split_text(&directive.replacement));
        DirectiveOutcome::Applied { line: Some(index) }
    }

    fn not_found(&self, buffer: &LineBuffer, anchor: &str) -> DirectiveOutcome {
        let closest = self
            .matcher
            .closest_line(buffer.lines(), anchor)
            .map(|(index, _)| (index, buffer.lines()[index].trim().to_string()));
        DirectiveOutcome::NotFound {
            anchor: anchor.to_string(),
            closest,
        }
    }
}

/// Pick the context that constrains an anchored directive.
///
/// With both contexts present `position` decides; otherwise whichever one
/// was given is used.
fn authoritative_context(directive: &EditDirective, position: Position) -> (&str, ContextDirection) {
    let before = directive.context_before.as_str();
    let after = directive.context_after.as_str();
    match (before.trim().is_empty(), after.trim().is_empty()) {
        (false, false) => match position {
            Position::Before => (before, ContextDirection::Before),
            Position::After => (after, ContextDirection::After),
        },
        (false, true) => (before, ContextDirection::Before),
        (true, false) => (after, ContextDirection::After),
        (true, true) => ("", ContextDirection::Before),
    }
}
