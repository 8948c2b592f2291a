//! Engine settings, loaded from an optional TOML file.
//!
//! ```toml
//! context_window = 150
//! strip_line_comments = true
//! comment_markers = ["//"]
//!
//! [validator]
//! command = ["go", "build", "./..."]
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::backup::DEFAULT_BACKUP_SUFFIX;
use crate::matcher::{LineMatcher, DEFAULT_CONTEXT_WINDOW};
use crate::normalize::Normalizer;

/// File name looked up in the workspace root when no path is given.
pub const SETTINGS_FILE_NAME: &str = ".anchor-patcher.toml";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings TOML{}: {source}", path_suffix(.path))]
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },

    #[error("invalid setting '{field}': {message}")]
    Invalid {
        field: &'static str,
        message: &'static str,
    },
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Lines searched before/after a candidate for its context string.
    pub context_window: usize,
    pub case_insensitive: bool,
    pub strip_line_comments: bool,
    pub comment_markers: Vec<String>,
    /// Target prefixes that mark a whole declaration; a single-line replace
    /// on one of these is downgraded to an insert.
    pub declaration_openers: Vec<String>,
    pub backup_suffix: String,
    pub confine_to_workspace: bool,
    /// Workspace-relative directories that are never edited.
    pub forbidden: Vec<PathBuf>,
    pub validator: Option<ValidatorSettings>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ValidatorSettings {
    /// Program followed by its arguments, run in the workspace root.
    pub command: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
            case_insensitive: true,
            strip_line_comments: false,
            comment_markers: vec!["//".to_string(), "#".to_string()],
            declaration_openers: default_declaration_openers(),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            confine_to_workspace: true,
            forbidden: vec![PathBuf::from(".git")],
            validator: None,
        }
    }
}

fn default_declaration_openers() -> Vec<String> {
    [
        "type ",
        "func ",
        "fn ",
        "pub fn ",
        "struct ",
        "pub struct ",
        "enum ",
        "pub enum ",
        "trait ",
        "impl ",
        "class ",
        "interface ",
        "def ",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.context_window == 0 {
            return Err(SettingsError::Invalid {
                field: "context_window",
                message: "must be at least 1",
            });
        }
        if self.backup_suffix.is_empty() {
            return Err(SettingsError::Invalid {
                field: "backup_suffix",
                message: "must not be empty",
            });
        }
        if let Some(validator) = &self.validator {
            if validator.command.first().is_none_or(|p| p.trim().is_empty()) {
                return Err(SettingsError::Invalid {
                    field: "validator.command",
                    message: "must name a program",
                });
            }
        }
        Ok(())
    }

    pub fn normalizer(&self) -> Normalizer {
        let normalizer = Normalizer::new(self.case_insensitive);
        if self.strip_line_comments {
            normalizer.with_comment_markers(self.comment_markers.iter().cloned())
        } else {
            normalizer
        }
    }

    pub fn matcher(&self) -> LineMatcher {
        LineMatcher::new(self.normalizer(), self.context_window)
    }

    pub fn from_toml_str(input: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml_edit::de::from_str(input)
            .map_err(|source| SettingsError::Toml { path: None, source })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|error| match error {
            SettingsError::Toml { path: None, source } => SettingsError::Toml {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        })
    }

    /// Load `<workspace>/.anchor-patcher.toml` if present, defaults otherwise.
    pub fn discover(workspace: &Path) -> Result<Self, SettingsError> {
        let candidate = workspace.join(SETTINGS_FILE_NAME);
        if candidate.is_file() {
            Self::load_from_path(candidate)
        } else {
            Ok(Self::default())
        }
    }
}
