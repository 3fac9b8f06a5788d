//! Reference signage player binary.
//!
//! Wires the slideshow engine to the bundled directory sync service and a
//! logging paint sink, then runs until interrupted. A real deployment
//! replaces the paint sink with its display surface and the directory sync
//! with the device cache service.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use signage_slideshow::config::PlayerConfig;
use signage_slideshow::context::{EngineContext, Environment, SyncClient};
use signage_slideshow::engine::Engine;
use signage_slideshow::events::{EngineEvent, PaintCommand, SyncRequest};
use signage_slideshow::sync;

/// Simple CLI
#[derive(Debug, Parser)]
#[command(name = "signage-slideshow", about = "Digital-signage image slideshow")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Override per-image duration (seconds)
    #[arg(long, value_name = "SECONDS")]
    duration: Option<f64>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("signage_slideshow={level}").parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut cfg = PlayerConfig::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?
        .validated()
        .context("validating configuration")?;
    if let Some(duration) = cli.duration {
        cfg.slide.duration = duration;
    }
    info!(
        media_root = %cfg.media_root.display(),
        first_file_timeout = %humantime::format_duration(cfg.first_file_timeout),
        "player configured"
    );

    let cancel = CancellationToken::new();
    let (sync_tx, sync_rx) = mpsc::channel::<SyncRequest>(32);
    let (paint_tx, mut paint_rx) = mpsc::channel::<PaintCommand>(16);
    let (event_tx, mut event_rx) = mpsc::channel::<EngineEvent>(32);

    let mut ctx = EngineContext::new(Environment::default(), SyncClient::new(sync_tx));
    ctx.storage_prefix = cfg.storage_prefix.clone();
    ctx.first_file_timeout = cfg.first_file_timeout;

    let (engine, handle) = Engine::new(cfg.slide.clone(), ctx, paint_tx, event_tx);

    let mut tasks: JoinSet<Result<()>> = JoinSet::new();
    tasks.spawn(sync::run(cfg.media_root.clone(), sync_rx, cancel.clone()));
    tasks.spawn(engine.run(cancel.clone()));

    // Paint sink: log each frame and acknowledge it as displayed.
    let paint_handle = handle.clone();
    let paint_cancel = cancel.clone();
    tasks.spawn(async move {
        loop {
            tokio::select! {
                _ = paint_cancel.cancelled() => break,
                maybe_cmd = paint_rx.recv() => match maybe_cmd {
                    Some(PaintCommand::Show(frame)) => {
                        info!(file = %frame.file_path, url = %frame.url, "displaying");
                        let _ = paint_handle.paint_done(frame.file_path).await;
                    }
                    Some(PaintCommand::Clear) => info!("display cleared"),
                    None => break,
                },
            }
        }
        Ok(())
    });

    // Host event sink.
    let event_cancel = cancel.clone();
    tasks.spawn(async move {
        loop {
            tokio::select! {
                _ = event_cancel.cancelled() => break,
                maybe_event = event_rx.recv() => match maybe_event {
                    Some(event) => info!(?event, "engine event"),
                    None => break,
                },
            }
        }
        Ok(())
    });

    handle.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    cancel.cancel();
    while tasks.join_next().await.is_some() {}
    Ok(())
}
