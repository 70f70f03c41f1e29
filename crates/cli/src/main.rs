use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clipline_core::{
    load_config, report, validate_config, ClipSource, Collaborators, Config, FfmpegTransformer,
    LockError, OfflineProvider, PipelineError, PipelineRunner, PublisherProvider, RunContext,
    SanitizedConfig, SqliteClipStore, TwitchSource, YouTubeProvider, YtDlpDownloader,
};

/// Exit code for an invalid or incomplete configuration.
const EXIT_CONFIG: u8 = 2;
/// Exit code when another run holds the lock.
const EXIT_LOCKED: u8 = 3;

/// Pick, process and publish the best recent Twitch clips of each configured streamer.
#[derive(Debug, Parser)]
#[command(name = "clipline", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "clipline.toml")]
    config: PathBuf,

    /// Run every step except the upload.
    #[arg(long)]
    dry_run: bool,

    /// Ignore the posting-time window.
    #[arg(long)]
    force: bool,

    /// Recorded on the run, e.g. "cron" or "manual".
    #[arg(long, default_value = "cli")]
    trigger: String,

    /// Validate the configuration, print it with secrets redacted, and exit.
    #[arg(long)]
    check_config: bool,

    /// Print the aggregated runs of a UTC day as JSON and exit.
    #[arg(long, value_name = "YYYY-MM-DD")]
    daily_summary: Option<NaiveDate>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("CLIPLINE_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    info!("Loading configuration from {:?}", args.config);
    let config = match load_config(&args.config).and_then(|c| validate_config(&c).map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };
    let dry_run = args.dry_run || config.pipeline.dry_run;

    if args.check_config {
        let sanitized = SanitizedConfig::from(&config);
        println!("{}", serde_json::to_string_pretty(&sanitized)?);
        return Ok(ExitCode::SUCCESS);
    }

    let store = Arc::new(
        SqliteClipStore::new(&config.database.path).context("Failed to open clip store")?,
    );
    info!("Clip store opened at {:?}", config.database.path);

    if let Some(date) = args.daily_summary {
        let summary = report::daily_summary(store.as_ref(), date)?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(ExitCode::SUCCESS);
    }

    let (source, publisher) = match build_adapters(&config, dry_run) {
        Ok(adapters) => adapters,
        Err(e) => {
            error!("{:#}", e);
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };

    let collab = Collaborators {
        source,
        store: store.clone(),
        history: store,
        downloader: Arc::new(YtDlpDownloader::new(config.media.clone())),
        transformer: Arc::new(FfmpegTransformer::new(config.media.clone())),
        publisher,
    };

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let ctx = RunContext::new(args.trigger)
        .with_dry_run(dry_run)
        .with_force(args.force)
        .with_config_hash(&config_hash[..16]);

    let runner = PipelineRunner::new(config, collab);
    match runner.run(&ctx).await {
        Ok(run) => {
            println!("{}", run.summary());
            for streamer in &run.streamers {
                let status = streamer
                    .skip_reason
                    .map(|r| r.as_str().to_string())
                    .or_else(|| streamer.stop_reason.map(|r| format!("stopped: {:?}", r)))
                    .unwrap_or_else(|| "ok".to_string());
                println!(
                    "  {:<20} fetched={:<3} filtered={:<3} uploaded={:<2} failed={:<2} {}",
                    streamer.streamer,
                    streamer.fetched,
                    streamer.filtered,
                    streamer.uploaded,
                    streamer.failed,
                    status
                );
            }
            if run.error.is_some() {
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(PipelineError::Lock(LockError::Held { pid })) => {
            warn!(pid, "Another run is in progress, exiting");
            Ok(ExitCode::from(EXIT_LOCKED))
        }
        Err(e) => Err(e.into()),
    }
}

/// Build the clip source and the publisher provider from their config sections.
fn build_adapters(
    config: &Config,
    dry_run: bool,
) -> Result<(Arc<dyn ClipSource>, Arc<dyn PublisherProvider>)> {
    let twitch = config
        .twitch
        .clone()
        .context("A [twitch] section is required")?;
    let source: Arc<dyn ClipSource> =
        Arc::new(TwitchSource::new(twitch).context("Failed to create Twitch client")?);

    let publisher: Arc<dyn PublisherProvider> = match &config.youtube {
        Some(youtube) => Arc::new(
            YouTubeProvider::new(youtube.clone()).context("Failed to create YouTube client")?,
        ),
        None if dry_run => {
            info!("No [youtube] section, dry run continues without a publisher");
            Arc::new(OfflineProvider)
        }
        None => anyhow::bail!("A [youtube] section is required unless running with --dry-run"),
    };

    Ok((source, publisher))
}
