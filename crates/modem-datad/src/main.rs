//! modem-datad - Modem Data Daemon
//!
//! Runs the data-call engine against a simulated modem and logs every
//! change notification.
//!
//! Usage:
//!   modem-datad [OPTIONS] [config.toml]
//!
//! Options:
//!   --latency-ms <ms>  Simulated modem response latency
//!   --apn <apn>        APN of the internet call set up at startup
//!
//! If no config file is provided, two slots with default settings are used.

use std::time::Duration;

use anyhow::Context;
use modem_data::{
    mock::MockRadioTransport, CallOwner, ContextParams, ContextType, DataConfig, DataEvent,
    DataManager, DataRole, DataService, SlotConfig,
};
use modem_data_core::{PowerControl, PowerTag, RatControl, RatMask};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parsed command-line arguments
struct Args {
    /// Engine config file (TOML)
    config_path: Option<String>,
    latency: Duration,
    apn: String,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut result = Args {
        config_path: None,
        latency: Duration::from_millis(50),
        apn: "internet".to_string(),
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--latency-ms" | "-l" => {
                match args.get(i + 1).map(|v| v.parse::<u64>()) {
                    Some(Ok(ms)) => result.latency = Duration::from_millis(ms),
                    _ => tracing::error!("Missing or invalid argument for --latency-ms"),
                }
                i += 2;
            }
            "--apn" | "-a" => {
                match args.get(i + 1) {
                    Some(apn) => result.apn = apn.clone(),
                    None => tracing::error!("Missing argument for --apn"),
                }
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                // Positional argument = config file
                result.config_path = Some(arg.to_string());
                i += 1;
            }
            _ => {
                tracing::warn!("Unknown argument: {}", args[i]);
                i += 1;
            }
        }
    }

    result
}

fn print_help() {
    eprintln!(
        r#"modem-datad - Modem Data Daemon

Usage: modem-datad [OPTIONS] [config.toml]

Options:
  -l, --latency-ms <ms>  Simulated modem response latency (default 50)
  -a, --apn <apn>        APN of the internet call set up at startup
  -h, --help             Print this help message

Examples:
  # Two slots with default settings
  modem-datad

  # Run with config file
  modem-datad config/modem-datad.toml

  # Slow modem
  modem-datad --latency-ms 500 config/modem-datad.toml
"#
    );
}

/// Power control that only logs
struct LogPower;

impl PowerControl for LogPower {
    fn power_on(&mut self, tag: PowerTag) {
        tracing::debug!(?tag, "Power on");
    }

    fn power_off(&mut self, tag: PowerTag) {
        tracing::debug!(?tag, "Power off");
    }
}

/// RAT setter that only logs
struct LogRatControl;

impl RatControl for LogRatControl {
    fn set_allowed_rat_mask(&mut self, slot: usize, mask: RatMask, urgent: bool) {
        tracing::info!(slot, ?mask, urgent, "Allowed RAT mask");
    }
}

fn load_config(args: &Args) -> anyhow::Result<DataConfig> {
    let mut config = match &args.config_path {
        Some(path) => {
            tracing::info!("Loading config from: {}", path);
            DataConfig::from_file(path).with_context(|| format!("loading {}", path))?
        }
        None => {
            tracing::info!("No config file provided, using defaults");
            DataConfig::default()
        }
    };
    if config.slots.is_empty() {
        config.slots = vec![SlotConfig::new(0), SlotConfig::new(1)];
    }
    Ok(config)
}

fn log_event(event: &DataEvent) {
    match event {
        DataEvent::AllowedChanged { slot, allowed } => {
            tracing::info!(slot, allowed, "Data allowed changed");
        }
        DataEvent::CallsChanged { slot } => tracing::debug!(slot, "Call list changed"),
        DataEvent::Call { slot, event } => tracing::info!(slot, ?event, "Data call"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modem_datad=info,modem_data=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting modem-datad (Modem Data Daemon)");

    let args = parse_args();
    let config = load_config(&args)?;
    let slots = config.slots.clone();

    let (radio_tx, radio_rx) = mpsc::unbounded_channel();
    let radio = MockRadioTransport::with_event_sink(radio_tx, args.latency);
    let manager = DataManager::new(
        config,
        Box::new(radio),
        Box::new(LogPower),
        Box::new(LogRatControl),
    );
    let (task, handle) = DataService::spawn(manager, radio_rx);

    let mut events = handle.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Dropped {} data events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    for slot in &slots {
        handle.attach_slot(slot.clone()).await?;
        handle
            .imsi_changed(slot.slot, Some(format!("00101000000000{}", slot.slot)))
            .await?;
    }

    if let Some(first) = slots.first() {
        handle.allow(first.slot, DataRole::Internet).await?;
        let call = handle
            .setup_call(
                first.slot,
                ContextParams::new(args.apn.clone()),
                ContextType::Internet,
                Some(CallOwner(1)),
            )
            .await?;
        tracing::info!(
            slot = first.slot,
            cid = call.cid,
            ifname = %call.ifname,
            "Internet call up"
        );
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    handle.shutdown().await?;
    task.await?;

    Ok(())
}
