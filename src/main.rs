//! scrobd — scrobble daemon for Walkman-class portable players
//!
//! Observes the device log, infers listened/skipped tracks and appends them
//! to the on-device `.scrobbler.log`.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scrobd::config::Config;
use scrobd::parser::LogParser;
use scrobd::player::AudioPlayer;
use scrobd::resolver::MtpDbResolver;
use scrobd::scrobble::FileLog;
use scrobd::server::StatusServer;
use scrobd::{config, device, logreader, Error};

/// Scrobble daemon: derives listened/skipped track events from the device log
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Kernel log device to observe (overrides config file)
    #[arg(long, value_name = "PATH")]
    log_device: Option<String>,

    /// Status socket path (overrides config file)
    #[arg(long, value_name = "PATH")]
    socket: Option<std::path::PathBuf>,

    /// Scrobble log file path (overrides config file)
    #[arg(long, value_name = "PATH")]
    scrobble_log: Option<std::path::PathBuf>,

    /// MTP object database path (overrides config file)
    #[arg(long, value_name = "PATH")]
    db: Option<String>,

    /// Listen threshold as a percent of track duration, in (0, 100]
    #[arg(long, value_name = "PERCENT")]
    listen_percent: Option<u32>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose || config::debug_logging() {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("scrobd={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(log_device) = args.log_device {
        config.log_device = log_device;
    }
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }
    if let Some(scrobble_log) = args.scrobble_log {
        config.scrobble_log = scrobble_log;
    }
    if let Some(db) = args.db {
        config.db_path = db;
    }
    if let Some(listen_percent) = args.listen_percent {
        config.listen_percent = listen_percent;
    }

    // Device discovery is best-effort; an unidentified device still scrobbles.
    let model = device::model().await.unwrap_or_else(|e| {
        error!(error = %e, "cannot get model");
        Default::default()
    });
    let model_id = device::model_id().await.unwrap_or_else(|e| {
        error!(error = %e, "cannot get model id");
        String::new()
    });
    let walkman_one = device::is_walkman_one().await;

    let identification = &model.device.identification;
    let model_name = if identification.model.is_empty() {
        // Capability XML missing or unreadable; fall back to the NVP node.
        device::model_nvp().await.unwrap_or_default()
    } else {
        identification.model.clone()
    };
    info!(
        model = %model_name,
        fw = %identification.firmwareversion,
        model_id = %model_id,
        walkman_one,
        version = env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let log_file = tokio::fs::File::open(&config.log_device)
        .await
        .with_context(|| format!("cannot open log device {}", config.log_device))?;

    let resolver = Arc::new(
        MtpDbResolver::connect(&config.db_path)
            .await
            .with_context(|| format!("cannot open content database {}", config.db_path))?,
    );

    let client = format!("{}@{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    let mut device_string = format!("{}, fw {}", model_name, identification.firmwareversion);
    if walkman_one {
        device_string.push_str(", walkmanOne");
    }

    let (err_tx, err_rx) = mpsc::channel::<Error>(1);
    tokio::spawn(report_errors(err_rx));

    let (entries_tx, mut entries_rx) = mpsc::channel::<String>(1);
    tokio::spawn(logreader::read_device(log_file, entries_tx, err_tx.clone()));

    let (emitter_tx, emitter_rx) = mpsc::channel(1);
    let scrobbler = FileLog::new(config.scrobble_log.clone(), client, device_string);
    let scrobbler_errors = err_tx.clone();
    tokio::spawn(async move {
        scrobbler.listen(emitter_rx, scrobbler_errors).await;
    });

    let player = Arc::new(
        AudioPlayer::new(resolver, emitter_tx).with_listen_percent(config.listen_percent),
    );

    let mut parser = LogParser::new();
    parser.subscribe(player.consumer());
    let parser_errors = err_tx.clone();
    tokio::spawn(async move {
        while let Some(line) = entries_rx.recv().await {
            if let Err(e) = parser.parse(&line).await {
                let _ = parser_errors.send(e).await;
            }
        }
    });

    let server = StatusServer::bind(config.socket_path.clone(), player.clone())
        .with_context(|| format!("cannot bind status socket {}", config.socket_path.display()))?;
    tokio::spawn(server.run());

    let (stop_tx, stop_rx) = mpsc::channel::<()>(1);
    let socket_path = config.socket_path.clone();
    tokio::spawn(async move {
        let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(term) => term,
            Err(e) => {
                error!(error = %e, "cannot install signal handler");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }

        info!("shutting down");
        let _ = tokio::fs::remove_file(&socket_path).await;
        let _ = stop_tx.send(()).await;
    });

    player.consume(stop_rx, err_tx).await;

    Ok(())
}

/// Drain and log non-fatal pipeline errors.
async fn report_errors(mut errors: mpsc::Receiver<Error>) {
    while let Some(e) = errors.recv().await {
        error!(error = %e, "pipeline error");
    }
}
