use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use m3u_merge::{
    config::Config,
    generator::PlaylistComposer,
    ingestor::{SourceFetcher, decode_playlist_bytes},
    matching::{MergeRules, NameNormalizer},
    pipeline::MergePipeline,
    utils::time::{format_update_timestamp, reference_date},
};

#[derive(Parser)]
#[command(name = "m3u-merge")]
#[command(version)]
#[command(about = "Refresh a canonical IPTV playlist from several upstream feeds")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path (defaults to $CONFIG_FILE, then merge.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Target playlist to refresh (overrides config file)
    #[arg(short, long, value_name = "FILE")]
    target: Option<PathBuf>,

    /// Where to write the merged playlist (defaults to the target)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Run the merge without writing the output
    #[arg(long)]
    dry_run: bool,

    /// Print the run counters as JSON on stdout
    #[arg(long)]
    summary_json: bool,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with specified level
    let log_filter = format!("m3u_merge={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting m3u-merge v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load_from_file(path)?;
            info!("Configuration loaded from: {}", path);
            config
        }
        None => Config::load()?,
    };

    // Override config with CLI arguments
    if let Some(target) = cli.target {
        config.playlist.target = target;
    }
    if let Some(output) = cli.output {
        config.playlist.output = Some(output);
    }

    config.validate()?;
    let rules = MergeRules::from_config(&config)?;
    let normalizer = NameNormalizer::new(&config.naming, &config.aliases)?
        .with_fuzzy_matching(config.resolution.fuzzy_matching);
    let sources = config.active_sources()?;
    info!("{} of {} sources active", sources.len(), config.sources.len());

    let target_text = read_target(&config.playlist.target).await?;

    let fetcher = SourceFetcher::new(&config.fetch)?;
    let feeds = fetcher.fetch_all(&sources).await;

    let now = Utc::now();
    let reference = reference_date(now, rules.reference_offset);
    info!("Reference date: {}", reference);

    let pipeline = MergePipeline::new(&rules, &normalizer)?;
    let outcome = pipeline.run(&target_text, &feeds, reference);

    let header = outcome
        .header
        .clone()
        .unwrap_or_else(|| config.playlist.default_header.clone());
    let mut composer = PlaylistComposer::new(header);
    if config.playlist.write_update_trailer {
        composer = composer.with_update_trailer(format_update_timestamp(now, rules.reference_offset));
    }
    let rendered = composer.render(&outcome.entries);

    let output = config
        .playlist
        .output
        .clone()
        .unwrap_or_else(|| config.playlist.target.clone());
    if cli.dry_run {
        info!("Dry run, not writing {}", output.display());
    } else {
        write_output(&output, &rendered).await?;
        info!(
            "Wrote {} entries to {}",
            outcome.entries.len(),
            output.display()
        );
    }

    outcome.stats.log_summary();
    if cli.summary_json {
        println!("{}", serde_json::to_string_pretty(&outcome.stats)?);
    }

    Ok(())
}

/// Read the current playlist; a missing file is an empty roster
async fn read_target(path: &Path) -> Result<String> {
    if !tokio::fs::try_exists(path).await? {
        warn!(
            "Target playlist {} does not exist, starting from an empty roster",
            path.display()
        );
        return Ok(String::new());
    }
    let bytes = tokio::fs::read(path).await?;
    Ok(decode_playlist_bytes(&bytes))
}

async fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await?;
    Ok(())
}
