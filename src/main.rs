use anchor_patcher::settings::ValidatorSettings;
use anchor_patcher::{load_from_path, DirectiveOutcome, EditBatch, EngineSettings, Engine};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "anchor-patcher")]
#[command(about = "Anchor-based text patching with validator-driven rollback", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply an edit batch and print the result as JSON
    Apply {
        /// Edit batch JSON file, or `-` for stdin
        #[arg(short, long)]
        edits: PathBuf,

        /// Path to workspace root
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Settings file (defaults to <workspace>/.anchor-patcher.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Validator command and its arguments, run once after all writes
        #[arg(long = "validate", value_name = "ARG", num_args = 1.., conflicts_with = "no_validate")]
        validate: Vec<String>,

        /// Skip the configured validator
        #[arg(long)]
        no_validate: bool,
    },

    /// Show the diff a batch would produce without writing anything
    Preview {
        /// Edit batch JSON file, or `-` for stdin
        #[arg(short, long)]
        edits: PathBuf,

        /// Path to workspace root
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Settings file (defaults to <workspace>/.anchor-patcher.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Restore backups left behind by an interrupted batch
    Recover {
        /// Path to workspace root
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Settings file (defaults to <workspace>/.anchor-patcher.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Apply {
            edits,
            workspace,
            config,
            validate,
            no_validate,
        } => cmd_apply(edits, workspace, config, validate, no_validate),

        Commands::Preview {
            edits,
            workspace,
            config,
        } => cmd_preview(edits, workspace, config),

        Commands::Recover { workspace, config } => cmd_recover(workspace, config),
    }
}

/// Resolve workspace path
///
/// Priority order:
/// 1. Explicit --workspace flag
/// 2. ANCHOR_PATCHER_WORKSPACE environment variable
/// 3. Current directory
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_workspace {
        return path
            .canonicalize()
            .with_context(|| format!("workspace not found: {}", path.display()));
    }

    if let Ok(env_path) = env::var("ANCHOR_PATCHER_WORKSPACE") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: ANCHOR_PATCHER_WORKSPACE is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    env::current_dir().context("failed to read current directory")
}

fn load_settings(workspace: &Path, config: Option<PathBuf>) -> Result<EngineSettings> {
    match config {
        Some(path) => EngineSettings::load_from_path(&path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => EngineSettings::discover(workspace).context("failed to load workspace settings"),
    }
}

fn load_batch(edits: &Path) -> Result<EditBatch> {
    if edits == Path::new("-") {
        anchor_patcher::batch::load_from_reader(io::stdin().lock())
            .context("failed to read edit batch from stdin")
    } else {
        load_from_path(edits).context("failed to load edit batch")
    }
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
        if change.missing_newline() {
            println!();
        }
    }
}

fn cmd_apply(
    edits: PathBuf,
    workspace: Option<PathBuf>,
    config: Option<PathBuf>,
    validate: Vec<String>,
    no_validate: bool,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let mut settings = load_settings(&workspace, config)?;
    if no_validate {
        settings.validator = None;
    } else if !validate.is_empty() {
        settings.validator = Some(ValidatorSettings { command: validate });
    }
    let engine = Engine::new(workspace, settings).context("invalid settings")?;

    let batch = load_batch(&edits)?;
    let result = engine.apply_edits(&batch);

    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_preview(edits: PathBuf, workspace: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let settings = load_settings(&workspace, config)?;
    let batch = load_batch(&edits)?;

    let engine = Engine::new(&workspace, settings).context("invalid settings")?;
    let report = engine.preview(&batch).context("preview failed")?;

    let mut modified = 0;
    for change in &report.changes {
        if !change.is_modified() {
            continue;
        }
        modified += 1;
        display_diff(
            &change.path,
            change.before.as_deref().unwrap_or_default(),
            change.after.as_deref().unwrap_or_default(),
        );
    }

    println!();
    for (directive, outcome) in batch.edits.iter().zip(&report.outcomes) {
        match outcome {
            DirectiveOutcome::NotFound { anchor, closest } => {
                println!(
                    "{} {} {}: anchor not found: {}",
                    "⊘".yellow(),
                    directive.kind,
                    directive.file,
                    anchor
                );
                if let Some((line, text)) = closest {
                    println!("  {}", format!("closest line {}: {}", line + 1, text).dimmed());
                }
            }
            DirectiveOutcome::Downgraded { .. } => {
                println!(
                    "{} {} {}: declaration replace downgraded to insert",
                    "⊙".yellow(),
                    directive.kind,
                    directive.file
                );
            }
            DirectiveOutcome::Skipped { reason } => {
                println!(
                    "{} {} {}: skipped ({})",
                    "⊘".cyan(),
                    directive.kind,
                    directive.file,
                    reason
                );
            }
            DirectiveOutcome::Applied { .. } => {}
        }
    }

    println!("{}", "Summary:".bold());
    println!(
        "  {} file(s) would change",
        format!("{}", modified).green()
    );

    Ok(())
}

fn cmd_recover(workspace: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let settings = load_settings(&workspace, config)?;
    let engine = Engine::new(&workspace, settings).context("invalid settings")?;

    let report = engine.recover().context("failed to recover backups")?;

    if report.is_empty() {
        println!("{}", "No interrupted batch found".dimmed());
    }
    for file in &report.restored {
        println!("{} Restored {}", "✓".green(), file.display());
    }
    for file in &report.removed {
        println!("{} Removed {}", "✓".green(), file.display());
    }
    for (file, reason) in &report.skipped {
        println!("{} Skipped {}: {}", "⚠".yellow(), file.display(), reason);
    }

    Ok(())
}
