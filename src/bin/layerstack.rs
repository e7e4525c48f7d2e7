use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use layerstack::{FailurePolicy, GenerateConfig};
use tracing_subscriber::EnvFilter;

/// Generate unique layered images from directories of layer files.
///
/// Values come from `--config`, then `NFT_COUNT` / `OUTPUT_DIR` / `DIR*` read from `.env` in
/// the working directory, then the same variables from the process environment, then the
/// flags below (later sources win).
#[derive(Parser, Debug)]
#[command(name = "layerstack", version)]
struct Cli {
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Layer directory; repeat in stacking order, bottom first.
    #[arg(long = "layer-dir", value_name = "DIR")]
    layer_dirs: Vec<PathBuf>,

    /// Number of units to generate.
    #[arg(long)]
    count: Option<u32>,

    /// Output directory (must not exist yet).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Persistence worker threads.
    #[arg(long)]
    workers: Option<usize>,

    /// Composites allowed to queue for persistence before generation waits.
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Record failed units and continue instead of aborting the batch.
    #[arg(long)]
    keep_going: bool,

    /// Dotenv file to read instead of `./.env`; unlike `./.env` it must exist.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Ignore `NFT_COUNT`, `OUTPUT_DIR` and `DIR*` from the environment and any dotenv file.
    #[arg(long, conflicts_with = "env_file")]
    no_env: bool,

    /// Log per-unit progress.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    // Panics on this thread are reported by `abort_message`; worker panics become unit errors.
    std::panic::set_hook(Box::new(|info| tracing::debug!("{info}")));

    match abort_message(std::panic::catch_unwind(|| run(cli))) {
        None => ExitCode::SUCCESS,
        Some(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

/// Final diagnostic for a failed or panicked run, `None` on success.
fn abort_message(outcome: std::thread::Result<anyhow::Result<()>>) -> Option<String> {
    match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("layerstack aborted: {e:#}")),
        Err(panic) => Some(format!(
            "layerstack aborted: panic: {}",
            layerstack::panic_message(&*panic)
        )),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "layerstack=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = build_config(&cli)?;
    let report = layerstack::generate(&cfg)
        .with_context(|| format!("generate into '{}'", cfg.out_dir.display()))?;

    eprintln!(
        "wrote {} images to {} ({} duplicates skipped, {} failed)",
        report.persisted.len(),
        cfg.out_dir.display(),
        report.duplicates.len(),
        report.failures.len()
    );
    Ok(())
}

fn build_config(cli: &Cli) -> anyhow::Result<GenerateConfig> {
    let mut cfg = match cli.config.as_ref() {
        Some(path) => GenerateConfig::from_path(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => GenerateConfig::default(),
    };

    if !cli.no_env {
        let vars = environment(cli.env_file.as_deref())?;
        cfg.apply_env(vars).context("read environment")?;
    }

    if !cli.layer_dirs.is_empty() {
        cfg.layer_dirs = cli.layer_dirs.clone();
    }
    if let Some(count) = cli.count {
        cfg.count = count;
    }
    if let Some(out) = cli.out.as_ref() {
        cfg.out_dir = out.clone();
    }
    if let Some(workers) = cli.workers {
        cfg.workers = workers;
    }
    if let Some(cap) = cli.queue_capacity {
        cfg.queue_capacity = cap;
    }
    if cli.keep_going {
        cfg.failure_policy = FailurePolicy::Continue;
    }

    cfg.validate()?;
    Ok(cfg)
}

/// Dotenv variables overlaid with the process environment, which wins per variable.
fn environment(env_file: Option<&Path>) -> anyhow::Result<BTreeMap<String, String>> {
    let path = env_file.unwrap_or(Path::new(".env"));
    let mut vars = BTreeMap::new();

    match dotenvy::from_path_iter(path) {
        Ok(iter) => {
            for item in iter {
                let (k, v) = item.with_context(|| format!("parse env file '{}'", path.display()))?;
                vars.insert(k, v);
            }
            tracing::debug!(path = %path.display(), "loaded env file");
        }
        Err(e) if e.not_found() && env_file.is_none() => {}
        Err(e) => {
            return Err(e).with_context(|| format!("read env file '{}'", path.display()));
        }
    }

    vars.extend(
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
    );
    Ok(vars)
}
