//! Inclusive block resolution from start/end anchors.

use crate::matcher::{line_matches, ContextDirection, LineMatcher};

/// Inclusive line range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start: usize,
    pub end: usize,
}

/// Resolve the block delimited by `start_anchor` and `end_anchor`.
///
/// The first start line goes through the line matcher (honoring
/// `context_before`); further start lines, if any, must follow contiguously.
/// The end is the first line at or after the start whose normalized form
/// contains the end anchor; a multi-line end anchor needs a contiguous run of
/// such lines and the block ends on the run's last line.
pub fn find_block(
    matcher: &LineMatcher,
    lines: &[String],
    start_anchor: &str,
    end_anchor: &str,
    context_before: &str,
) -> Option<BlockRange> {
    let normalizer = matcher.normalizer();
    let normalized = matcher.normalize_all(lines);

    let mut start_lines = start_anchor.lines().map(|l| normalizer.normalize(l));
    let first = start_lines.next()?;
    let rest: Vec<String> = start_lines.collect();
    let end_lines: Vec<String> = end_anchor
        .lines()
        .map(|l| normalizer.normalize(l))
        .filter(|l| !l.is_empty())
        .collect();
    if end_lines.is_empty() {
        return None;
    }

    let anchor = matcher.anchor(&first, context_before, ContextDirection::Before);
    let mut from = 0;
    let start = loop {
        let candidate = matcher.find_normalized(&normalized, from, &anchor)?;
        if run_matches(&normalized, candidate + 1, &rest, line_matches) {
            break candidate;
        }
        from = candidate + 1;
    };

    let end = (start..normalized.len())
        .find(|&i| run_matches(&normalized, i, &end_lines, |line, needle| line.contains(needle)))
        .map(|i| i + end_lines.len() - 1)?;

    Some(BlockRange { start, end })
}

fn run_matches(
    normalized: &[String],
    at: usize,
    expected: &[String],
    matches: impl Fn(&str, &str) -> bool,
) -> bool {
    if at + expected.len() > normalized.len() {
        return false;
    }
    expected
        .iter()
        .zip(&normalized[at..])
        .all(|(want, line)| matches(line, want))
}
