use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Reserved `insert` target: place content before the first line.
pub const BOF_SENTINEL: &str = "__BOF__";
/// Reserved `insert` target: place content after the last line.
pub const EOF_SENTINEL: &str = "__EOF__";

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct EditBatch {
    #[serde(default)]
    pub edits: Vec<EditDirective>,
}

impl EditBatch {
    pub fn new(edits: Vec<EditDirective>) -> Self {
        Self { edits }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.edits.is_empty() {
            issues.push(ValidationIssue::EmptyBatch);
        }

        for (index, edit) in self.edits.iter().enumerate() {
            if edit.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    index,
                    field: "file",
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Insert,
    Replace,
    CreateFile,
    DeleteFile,
    ReplaceFile,
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectiveKind::Insert => "insert",
            DirectiveKind::Replace => "replace",
            DirectiveKind::CreateFile => "create_file",
            DirectiveKind::DeleteFile => "delete_file",
            DirectiveKind::ReplaceFile => "replace_file",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Before,
    #[default]
    After,
}

/// `null`, `""` and a missing field all mean the default, `after`.
fn deserialize_position<'de, D>(deserializer: D) -> Result<Position, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)?.as_deref().map(str::trim) {
        None | Some("") => Ok(Position::default()),
        Some(value) if value.eq_ignore_ascii_case("before") => Ok(Position::Before),
        Some(value) if value.eq_ignore_ascii_case("after") => Ok(Position::After),
        Some(other) => Err(de::Error::unknown_variant(other, &["before", "after"])),
    }
}

/// One requested mutation, exactly as it arrives on the wire.
///
/// Which text fields matter depends on `kind`: `target` (or `start`/`end`)
/// for anchored edits, `content` for insert/create, `replacement` for
/// replace/replace_file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct EditDirective {
    #[serde(rename = "type")]
    pub kind: DirectiveKind,
    #[serde(default)]
    pub file: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub end: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub replacement: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default, deserialize_with = "deserialize_position")]
    pub position: Position,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context_before: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context_after: String,
}

impl EditDirective {
    fn new(kind: DirectiveKind, file: impl Into<String>) -> Self {
        Self {
            kind,
            file: file.into(),
            target: String::new(),
            start: String::new(),
            end: String::new(),
            replacement: String::new(),
            content: String::new(),
            position: Position::After,
            context_before: String::new(),
            context_after: String::new(),
        }
    }

    pub fn insert(file: impl Into<String>, target: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            content: content.into(),
            ..Self::new(DirectiveKind::Insert, file)
        }
    }

    pub fn replace(file: impl Into<String>, target: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            replacement: replacement.into(),
            ..Self::new(DirectiveKind::Replace, file)
        }
    }

    pub fn replace_block(
        file: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            replacement: replacement.into(),
            ..Self::new(DirectiveKind::Replace, file)
        }
    }

    pub fn create_file(file: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::new(DirectiveKind::CreateFile, file)
        }
    }

    pub fn delete_file(file: impl Into<String>) -> Self {
        Self::new(DirectiveKind::DeleteFile, file)
    }

    pub fn replace_file(file: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            replacement: replacement.into(),
            ..Self::new(DirectiveKind::ReplaceFile, file)
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_context_before(mut self, context: impl Into<String>) -> Self {
        self.context_before = context.into();
        self
    }

    pub fn with_context_after(mut self, context: impl Into<String>) -> Self {
        self.context_after = context.into();
        self
    }

    /// Both block bounds present; the directive is a block replace.
    pub fn has_block_bounds(&self) -> bool {
        !self.start.trim().is_empty() && !self.end.trim().is_empty()
    }
}

/// Batch outcome as reported back to the caller.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct ApplyResult {
    pub success: bool,
    pub edits_applied: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApplyResult {
    pub fn ok(edits_applied: usize) -> Self {
        Self {
            success: true,
            edits_applied,
            error: None,
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            edits_applied: 0,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyBatch,
    MissingField { index: usize, field: &'static str },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyBatch => write!(f, "edits list must not be empty"),
            ValidationIssue::MissingField { index, field } => {
                write!(f, "edit[{index}] is missing required '{field}' field")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_insert_defaults_to_after() {
        let json = r#"{"type": "insert", "file": "a.go", "target": "x", "content": "y"}"#;
        let directive: EditDirective = serde_json::from_str(json).unwrap();
        assert_eq!(directive.kind, DirectiveKind::Insert);
        assert_eq!(directive.position, Position::After);
        assert_eq!(directive, EditDirective::insert("a.go", "x", "y"));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let json = r#"{"type": "rename_file", "file": "a.go"}"#;
        assert!(serde_json::from_str::<EditDirective>(json).is_err());
    }

    #[test]
    fn test_validate_collects_all_issues() {
        let batch = EditBatch::new(vec![
            EditDirective::delete_file("a.go"),
            EditDirective::delete_file("  "),
            EditDirective::delete_file(""),
        ]);
        let err = batch.validate().unwrap_err();
        assert_eq!(
            err.issues,
            vec![
                ValidationIssue::MissingField { index: 1, field: "file" },
                ValidationIssue::MissingField { index: 2, field: "file" },
            ]
        );
        assert!(err.to_string().contains("edit[1] is missing required 'file' field"));
    }

    #[test]
    fn test_validate_empty_batch() {
        let err = EditBatch::default().validate().unwrap_err();
        assert_eq!(err.issues, vec![ValidationIssue::EmptyBatch]);
    }

    #[test]
    fn test_apply_result_wire_shape() {
        let ok = serde_json::to_value(ApplyResult::ok(3)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "edits_applied": 3}));

        let failed = serde_json::to_value(ApplyResult::failed("boom")).unwrap();
        assert_eq!(
            failed,
            serde_json::json!({"success": false, "edits_applied": 0, "error": "boom"})
        );
    }
}
