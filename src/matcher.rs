//! Anchor-to-line resolution.
//!
//! A line matches an anchor when, after normalization, it equals the anchor
//! or starts with the anchor followed by a space (the anchor names the head
//! of a longer statement). Without context the first match wins; with context
//! a candidate must also have every non-blank context line somewhere inside
//! a bounded window before or after it.

use crate::normalize::Normalizer;

/// Default number of lines searched for context around a candidate.
pub const DEFAULT_CONTEXT_WINDOW: usize = 100;

/// Which side of a candidate line the context window covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextDirection {
    Before,
    After,
}

/// A normalized anchor with its (possibly empty) context constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    target: String,
    context: Vec<String>,
    direction: ContextDirection,
}

impl Anchor {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn has_context(&self) -> bool {
        !self.context.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LineMatcher {
    normalizer: Normalizer,
    window: usize,
}

impl Default for LineMatcher {
    fn default() -> Self {
        Self::new(Normalizer::default(), DEFAULT_CONTEXT_WINDOW)
    }
}

impl LineMatcher {
    pub fn new(normalizer: Normalizer, window: usize) -> Self {
        Self { normalizer, window }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn normalize_all(&self, lines: &[String]) -> Vec<String> {
        lines.iter().map(|l| self.normalizer.normalize(l)).collect()
    }

    pub fn anchor(&self, target: &str, context: &str, direction: ContextDirection) -> Anchor {
        Anchor {
            target: self.normalizer.normalize(target),
            context: context
                .lines()
                .map(|l| self.normalizer.normalize(l))
                .filter(|l| !l.is_empty())
                .collect(),
            direction,
        }
    }

    /// Find the first line matching `target` whose context constraint holds.
    ///
    /// An empty `context` disables the constraint. `None` means no line
    /// qualified; callers treat that as a no-op, not an error.
    pub fn find_line(
        &self,
        lines: &[String],
        target: &str,
        context: &str,
        direction: ContextDirection,
    ) -> Option<usize> {
        let normalized = self.normalize_all(lines);
        self.find_normalized(&normalized, 0, &self.anchor(target, context, direction))
    }

    /// Same as [`find_line`](Self::find_line) over pre-normalized lines,
    /// starting the scan at `from`.
    pub fn find_normalized(&self, normalized: &[String], from: usize, anchor: &Anchor) -> Option<usize> {
        if anchor.target.is_empty() {
            return None;
        }
        (from..normalized.len()).find(|&i| {
            line_matches(&normalized[i], &anchor.target) && self.context_holds(normalized, i, anchor)
        })
    }

    fn context_holds(&self, normalized: &[String], index: usize, anchor: &Anchor) -> bool {
        if anchor.context.is_empty() {
            return true;
        }
        let window = match anchor.direction {
            ContextDirection::Before => &normalized[index.saturating_sub(self.window)..index],
            ContextDirection::After => {
                let end = normalized.len().min(index + 1 + self.window);
                &normalized[index + 1..end]
            }
        };
        anchor
            .context
            .iter()
            .all(|ctx| window.iter().any(|line| line.contains(ctx.as_str())))
    }

    /// The line most similar to `target`, for "did you mean" diagnostics.
    pub fn closest_line(&self, lines: &[String], target: &str) -> Option<(usize, f64)> {
        let target = self.normalizer.normalize(target);
        if target.is_empty() {
            return None;
        }
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let score = strsim::normalized_levenshtein(&self.normalizer.normalize(line), &target);
                (i, score)
            })
            .filter(|(_, score)| *score > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Equality, or the target followed by a space, on normalized text.
pub fn line_matches(normalized_line: &str, normalized_target: &str) -> bool {
    match normalized_line.strip_prefix(normalized_target) {
        Some(rest) => rest.is_empty() || rest.starts_with(' '),
        None => false,
    }
}
