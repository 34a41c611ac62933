mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use tokio_util::sync::CancellationToken;

use loopcast::cache::ValidityCache;
use loopcast::fetch::{AssetManifest, Downloader, FetchSummary};
use loopcast::scanner::{self, ValidityScanner};
use loopcast::server::{self, StreamListing};
use loopcast::supervisor::{self, MediaServer, StreamSupervisor};
use loopcast_av::{FfmpegRestream, FfprobeValidator, ToolRegistry, Validator};
use loopcast_core::config::Config;
use loopcast_core::FetchLimit;

/// Options for the `run` command that override configuration.
struct RunOptions {
    single: bool,
    skip_download: bool,
    host: Option<String>,
    port: Option<u16>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "loopcast=trace,loopcast_av=trace,loopcast_core=debug,tower_http=debug".to_string()
        } else {
            "loopcast=info,loopcast_av=info,loopcast_core=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config = Config::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    match cli.command {
        Commands::CheckTools => check_tools(&config),
        command => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(dispatch(command, config))
        }
    }
}

async fn dispatch(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Run {
            single,
            skip_download,
            host,
            port,
        } => {
            run(
                config,
                RunOptions {
                    single,
                    skip_download,
                    host,
                    port,
                },
            )
            .await
        }
        Commands::Fetch { limit } => fetch(&config, limit).await,
        Commands::Scan { json } => scan(&config, json).await,
        Commands::Clean => clean(&config).await,
        Commands::CheckTools => check_tools(&config),
    }
}

/// Find ffmpeg and make sure it actually runs.
async fn require_ffmpeg(tools: &ToolRegistry) -> Result<PathBuf> {
    let version = tools
        .verify("ffmpeg")
        .await
        .context("ffmpeg not found. Please install ffmpeg.")?;
    tracing::debug!(%version, "Found ffmpeg");
    Ok(tools.require("ffmpeg")?.to_path_buf())
}

fn build_validator(config: &Config, tools: &ToolRegistry) -> Result<Arc<dyn Validator>> {
    let validator = FfprobeValidator::from_registry(tools, config.validator.timeout())?;
    Ok(Arc::new(validator))
}

fn scanner_for(config: &Config, validator: Arc<dyn Validator>) -> ValidityScanner {
    ValidityScanner::new(
        &config.paths.video_dir,
        ValidityCache::new(&config.paths.cache_file),
        validator,
    )
}

async fn fetch_assets(
    config: &Config,
    validator: Arc<dyn Validator>,
    limit: FetchLimit,
) -> Result<FetchSummary> {
    let manifest = AssetManifest::load(&config.paths.manifest)?;
    std::fs::create_dir_all(&config.paths.video_dir).with_context(|| {
        format!(
            "failed to create video directory {}",
            config.paths.video_dir.display()
        )
    })?;

    let downloader = Downloader::new(&config.paths.video_dir, validator, &config.fetch);
    Ok(downloader.fetch_all(&manifest, limit).await)
}

async fn run(mut config: Config, opts: RunOptions) -> Result<()> {
    if let Some(host) = opts.host {
        config.server.host = host;
    }
    if let Some(port) = opts.port {
        config.server.port = port;
    }

    let tools = ToolRegistry::discover(&config.tools);
    let ffmpeg = require_ffmpeg(&tools).await?;
    let validator = build_validator(&config, &tools)?;

    if opts.skip_download {
        tracing::info!("Skipping download");
    } else {
        let limit = if opts.single {
            FetchLimit::AtMost(1)
        } else {
            FetchLimit::All
        };
        fetch_assets(&config, validator.clone(), limit).await?;
    }

    let mut media_server = MediaServer::start_and_await_ready(&config.media_server)
        .await
        .context("media server failed to become ready")?;

    let single_name = opts
        .single
        .then(|| config.restream.single_stream_name.clone());
    let result =
        stream_until_shutdown(&config, single_name.as_deref(), ffmpeg, validator).await;

    media_server.kill().await;
    result
}

/// Scan, start one loop stream per assignment, and serve the listing until a
/// shutdown signal.
async fn stream_until_shutdown(
    config: &Config,
    single_name: Option<&str>,
    ffmpeg: PathBuf,
    validator: Arc<dyn Validator>,
) -> Result<()> {
    let valid = scanner_for(config, validator.clone())
        .scan()
        .await?
        .into_result()?;
    if valid.is_empty() {
        anyhow::bail!("No videos available");
    }

    let plan = supervisor::plan_streams(&valid, single_name);
    let cancel = CancellationToken::new();
    let launcher = Arc::new(FfmpegRestream::new(ffmpeg, config.restream.clone()));
    let mut streams = StreamSupervisor::new(launcher, validator, cancel.clone());

    for assignment in &plan {
        streams.start_loop_stream(
            config.paths.video_dir.join(&assignment.source_file),
            assignment.stream_name.clone(),
        );
    }

    let listing = StreamListing::from_assignments(&plan);
    let host = config.server.host.clone();
    let port = config.server.port;

    println!("Streams listed at http://{host}:{port}/");
    println!("Press Ctrl+C to exit");

    let server_cancel = cancel.clone();
    let server_listing = listing.clone();
    let server_task = tokio::spawn(async move {
        let result = server::serve(&host, port, server_listing, server_cancel.clone()).await;
        server_cancel.cancel();
        result
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(outcome) = streams.next_outcome(), if !streams.is_empty() => {
                listing.remove(outcome.stream_name());
            }
        }
    }

    tracing::info!("Shutting down...");
    let outcomes = streams.shutdown().await;
    tracing::debug!(streams = outcomes.len(), "Loop streams stopped");

    server_task.await.context("listing server task failed")??;
    Ok(())
}

async fn fetch(config: &Config, limit: i64) -> Result<()> {
    let limit = FetchLimit::from_raw(limit)?;
    let tools = ToolRegistry::discover(&config.tools);
    let validator = build_validator(config, &tools)?;

    let summary = fetch_assets(config, validator, limit).await?;
    println!(
        "Fetched {} of {} assets ({} failed)",
        summary.succeeded, summary.attempted, summary.failed
    );
    Ok(())
}

async fn scan(config: &Config, json: bool) -> Result<()> {
    let tools = ToolRegistry::discover(&config.tools);
    let validator = build_validator(config, &tools)?;

    let valid = scanner_for(config, validator).scan().await?.into_result()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&valid)?);
    } else {
        for name in &valid {
            println!("{name}");
        }
    }
    Ok(())
}

async fn clean(config: &Config) -> Result<()> {
    let tools = ToolRegistry::discover(&config.tools);
    let validator = build_validator(config, &tools)?;

    let removed = scanner::remove_corrupted(&config.paths.video_dir, validator.as_ref()).await?;
    if removed.is_empty() {
        println!("No corrupted videos found");
    } else {
        for name in &removed {
            println!("Removed {name}");
        }
    }
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to stream videos.");
    }

    Ok(())
}
