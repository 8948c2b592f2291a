//! Comparison-only line canonicalization.
//!
//! Anchors are authored against one version of a file and applied against
//! another; re-indentation, tab/space swaps and case drift between the two
//! must not break matching. Normalized text is never written back.

/// Rules applied to both sides of every comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    case_insensitive: bool,
    comment_markers: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            comment_markers: Vec::new(),
        }
    }
}

impl Normalizer {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            case_insensitive,
            comment_markers: Vec::new(),
        }
    }

    /// Enable stripping of trailing line comments introduced by any of `markers`.
    pub fn with_comment_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.comment_markers = markers
            .into_iter()
            .map(Into::into)
            .filter(|m: &String| !m.is_empty())
            .collect();
        self
    }

    /// Canonicalize one line: optional comment strip, whitespace collapse
    /// (tabs included), trim, optional lowercase.
    pub fn normalize(&self, line: &str) -> String {
        let line = self.strip_comment(line);
        let mut out = String::with_capacity(line.len());
        for word in line.split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
        if self.case_insensitive {
            out.to_lowercase()
        } else {
            out
        }
    }

    fn strip_comment<'a>(&self, line: &'a str) -> &'a str {
        let mut cut = line.len();
        for marker in &self.comment_markers {
            let mut from = 0;
            while let Some(pos) = line[from..].find(marker.as_str()) {
                let at = from + pos;
                let starts_token = line[..at]
                    .chars()
                    .next_back()
                    .is_none_or(char::is_whitespace);
                if starts_token {
                    cut = cut.min(at);
                    break;
                }
                from = at + marker.len();
            }
        }
        &line[..cut]
    }
}
