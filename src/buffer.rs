//! In-memory line sequence for a single file.

/// A file's content as lines, remembering whether it ended with a newline.
///
/// Lines keep every byte except the `\n` separators (a `\r` from CRLF input
/// stays part of its line), so `from_text(s).to_text() == s` for any input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
    trailing_newline: bool,
}

impl LineBuffer {
    pub fn from_text(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        let (body, trailing_newline) = match text.strip_suffix('\n') {
            Some(body) => (body, true),
            None => (text, false),
        };
        Self {
            lines: body.split('\n').map(str::to_string).collect(),
            trailing_newline,
        }
    }

    pub fn to_text(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let mut out = self.lines.join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn replace_all(&mut self, text: &str) {
        *self = Self::from_text(text);
    }

    /// Insert `new_lines` so the first of them lands at `index` (`index == len` appends).
    pub fn insert_lines(&mut self, index: usize, new_lines: Vec<String>) {
        let index = index.min(self.lines.len());
        if self.lines.is_empty() && !new_lines.is_empty() {
            self.trailing_newline = true;
        }
        self.lines.splice(index..index, new_lines);
    }

    /// Replace the inclusive range `[start, end]` with `new_lines`.
    pub fn splice_lines(&mut self, start: usize, end: usize, new_lines: Vec<String>) {
        debug_assert!(start <= end && end < self.lines.len());
        self.lines.splice(start..=end, new_lines);
    }
}

/// Split directive text into lines, dropping one trailing newline so
/// `"a\nb\n"` contributes two lines rather than three. Empty text yields no lines.
pub fn split_text(text: &str) -> Vec<String> {
    let text = text.strip_suffix('\n').unwrap_or(text);
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_preserves_bytes() {
        for text in ["", "a", "a\n", "a\nb", "a\r\nb\r\n", "\n", "\n\n", "x\n\ny\n"] {
            assert_eq!(LineBuffer::from_text(text).to_text(), text, "input {text:?}");
        }
    }

    #[test]
    fn test_append_after_trailing_newline() {
        let mut buffer = LineBuffer::from_text("a\nb\n");
        buffer.insert_lines(buffer.len(), vec!["c".to_string()]);
        assert_eq!(buffer.to_text(), "a\nb\nc\n");
    }

    #[test]
    fn test_insert_into_empty_buffer() {
        let mut buffer = LineBuffer::default();
        buffer.insert_lines(0, vec!["first".to_string()]);
        assert_eq!(buffer.to_text(), "first\n");
    }

    #[test]
    fn test_splice_inclusive_range() {
        let mut buffer = LineBuffer::from_text("1\n2\n3\n4\n");
        buffer.splice_lines(1, 2, vec!["x".to_string()]);
        assert_eq!(buffer.to_text(), "1\nx\n4\n");

        buffer.splice_lines(0, 2, Vec::new());
        assert_eq!(buffer.to_text(), "");
    }

    #[test]
    fn test_split_text() {
        assert_eq!(split_text(""), Vec::<String>::new());
        assert_eq!(split_text("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_text("\n"), Vec::<String>::new());
        assert_eq!(split_text("\nfn x() {}"), vec!["", "fn x() {}"]);
    }
}
