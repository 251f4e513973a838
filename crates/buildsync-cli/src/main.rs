use anyhow::Context;
use buildsync_core::config::Settings;
use buildsync_core::logging::init_logging;
use buildsync_merge::{format, load, parse_bytes, reconcile, unified_diff};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "buildsync",
    about = "Merge generated Go rules into hand-edited Bazel BUILD files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the settings file
    #[arg(long, default_value = "buildsync.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a generated rule set into an existing build file
    Reconcile {
        /// Build file, or package directory containing one
        target: PathBuf,
        /// Build file holding the freshly generated rules
        #[arg(long)]
        generated: PathBuf,
        #[command(flatten)]
        output: Output,
    },
    /// Parse a build file and print it in canonical layout
    Fmt {
        /// Build file to format
        file: PathBuf,
        #[command(flatten)]
        output: Output,
    },
}

#[derive(Args)]
struct Output {
    /// Write the result back instead of printing it
    #[arg(long, conflicts_with = "diff")]
    write: bool,
    /// Print a unified diff against the current file
    #[arg(long)]
    diff: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load_or_default(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    let _guard = init_logging(&settings.logging)?;

    match &cli.command {
        Commands::Reconcile {
            target,
            generated,
            output,
        } => cmd_reconcile(&settings, target, generated, output),
        Commands::Fmt { file, output } => cmd_fmt(file, output),
    }
}

fn cmd_reconcile(
    settings: &Settings,
    target: &Path,
    generated: &Path,
    output: &Output,
) -> anyhow::Result<()> {
    let path = if target.is_dir() {
        settings.build_file_in(target)
    } else {
        target.to_path_buf()
    };

    let bytes = std::fs::read(generated)
        .with_context(|| format!("failed to read generated rules {}", generated.display()))?;
    let generated = parse_bytes(generated, &bytes)?;

    let merged = reconcile(&path, &generated)?;

    tracing::info!(
        path = %path.display(),
        rules = merged.rules(None).count(),
        "reconciled build file"
    );
    emit(&path, &format(&merged), output)
}

fn cmd_fmt(file: &Path, output: &Output) -> anyhow::Result<()> {
    let tree = load(file)?;
    emit(file, &format(&tree), output)
}

/// Current content of `path`, empty when the file does not exist yet.
fn read_existing(path: &Path) -> anyhow::Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Print, diff or write `formatted`, the new content of `path`.
fn emit(path: &Path, formatted: &str, output: &Output) -> anyhow::Result<()> {
    if output.diff {
        let current = read_existing(path)?;
        if let Some(diff) = unified_diff(path, &current, formatted) {
            print!("{}", diff);
        }
        return Ok(());
    }

    if output.write {
        std::fs::write(path, formatted)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote build file");
        return Ok(());
    }

    print!("{}", formatted);
    Ok(())
}
