//! Post-apply validation hook.
//!
//! After every file in a batch is written the engine asks a [`Validator`]
//! whether the workspace is still healthy (formatter, type-checker, build).
//! A failure rolls the whole batch back.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Environment variable carrying the batch's touched files to a validator
/// command, one path per line.
pub const TOUCHED_FILES_ENV: &str = "ANCHOR_PATCHER_FILES";

/// Diagnostics longer than this are truncated in the reported error.
const MAX_DIAGNOSTIC_CHARS: usize = 4000;

#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("failed to run validator `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("validator `{program}` failed ({}){}", status_text(.status), diagnostics_text(.diagnostics))]
    Failed {
        program: String,
        status: Option<i32>,
        diagnostics: String,
    },

    #[error("validation failed: {0}")]
    Rejected(String),
}

fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn diagnostics_text(diagnostics: &str) -> String {
    if diagnostics.is_empty() {
        String::new()
    } else {
        format!(": {diagnostics}")
    }
}

pub trait Validator: Send + Sync {
    fn validate(&self, touched: &[PathBuf]) -> Result<(), ValidatorError>;
}

/// Accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn validate(&self, _touched: &[PathBuf]) -> Result<(), ValidatorError> {
        Ok(())
    }
}

/// Adapts a closure; an `Err` message becomes [`ValidatorError::Rejected`].
pub struct FnValidator<F>(pub F);

impl<F> Validator for FnValidator<F>
where
    F: Fn(&[PathBuf]) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, touched: &[PathBuf]) -> Result<(), ValidatorError> {
        (self.0)(touched).map_err(ValidatorError::Rejected)
    }
}

/// Runs an external command in the workspace; a non-zero exit is a failure.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl CommandValidator {
    pub fn new(program: impl Into<String>, args: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: working_dir.into(),
        }
    }

    /// Build from a full argv (`["go", "build", "./..."]`). `None` when empty.
    pub fn from_argv(argv: &[String], working_dir: &Path) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec(), working_dir))
    }
}

impl Validator for CommandValidator {
    fn validate(&self, touched: &[PathBuf]) -> Result<(), ValidatorError> {
        let files = touched
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");

        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env(TOUCHED_FILES_ENV, files)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ValidatorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let mut diagnostics = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            if !diagnostics.is_empty() {
                diagnostics.push('\n');
            }
            diagnostics.push_str(stdout.trim());
        }
        if diagnostics.chars().count() > MAX_DIAGNOSTIC_CHARS {
            diagnostics = diagnostics.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
            diagnostics.push_str("...");
        }

        Err(ValidatorError::Failed {
            program: self.program.clone(),
            status: output.status.code(),
            diagnostics,
        })
    }
}
