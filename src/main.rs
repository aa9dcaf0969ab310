use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use disquoter::catalog::{self, AudioIndex};
use disquoter::voice;
use disquoter::{Config, ConfigOverrides, Daemon};

/// Disquoter - Discord soundboard bot
#[derive(Parser)]
#[command(name = "disquoter", version, about)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, env = "DISQUOTER_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Directory holding the audio clips
    #[arg(long)]
    audio_dir: Option<PathBuf>,

    /// JSON document for per-channel state
    #[arg(long)]
    state_path: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Render a precompiled companion for every clip that lacks one
    Precompile {
        /// Re-render companions that already exist
        #[arg(long)]
        force: bool,
    },
    /// Show catalog matches for a query
    Search {
        /// Clip name to look for
        query: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,disquoter=info",
        1 => "info,disquoter=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = ConfigOverrides {
        config_dir: cli.config_dir,
        audio_dir: cli.audio_dir,
        state_path: cli.state_path,
    };

    let config = Config::load(&overrides)?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Precompile { force } => cmd_precompile(&config, force).await,
            Command::Search { query } => cmd_search(&config, &query).await,
        };
    }

    tracing::info!(
        audio_dir = %config.audio.files_path.display(),
        "starting disquoter"
    );

    Daemon::new(config).run().await?;

    Ok(())
}

/// Render companions for the whole catalog
async fn cmd_precompile(config: &Config, force: bool) -> anyhow::Result<()> {
    let dir = config.audio.files_path.clone();
    let names = catalog::list_asset_names(&dir).await?;

    let mut rendered = 0usize;
    let mut failed = 0usize;

    for name in names {
        let clip = dir.join(&name);
        if !force && catalog::companion_path(&clip).exists() {
            continue;
        }

        match tokio::task::spawn_blocking(move || voice::precompile(&clip)).await? {
            Ok(path) => {
                rendered += 1;
                println!("{name} -> {}", path.display());
            }
            Err(e) => {
                failed += 1;
                eprintln!("{name}: {e}");
            }
        }
    }

    println!("Rendered {rendered} companion(s), {failed} failure(s)");

    if failed > 0 {
        anyhow::bail!("{failed} clip(s) could not be precompiled");
    }

    Ok(())
}

/// Print ranked matches for a query
async fn cmd_search(config: &Config, query: &str) -> anyhow::Result<()> {
    let index = AudioIndex::new();
    catalog::refresh(&index, &config.audio.files_path).await?;

    let results = index.search(query);
    if results.is_empty() {
        println!("Couldn't find anything that matches '{query}'");
        return Ok(());
    }

    for (rank, asset) in results.iter().enumerate() {
        println!("{:>3}. {}", rank + 1, asset.name);
    }

    Ok(())
}
