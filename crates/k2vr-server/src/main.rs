// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! K2VR Tracker Server
//!
//! Local command endpoint through which a companion application registers
//! virtual trackers and streams their poses into a VR runtime.
//!
//! # Usage
//!
//! ```bash
//! # Serve on the default endpoint (tcp://127.0.0.1:7135)
//! k2vr-server
//!
//! # All interfaces, start with dispatch paused
//! k2vr-server --endpoint "tcp://*:7135" --paused
//!
//! # Using config file
//! k2vr-server --config server.json
//!
//! # Write the default configuration
//! k2vr-server gen-config --output server.json
//! ```

use clap::{Parser, Subcommand};
use k2vr_server::{LoggingRegistrar, LoopStatsSnapshot, ServerConfig, TrackerServer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// K2VR Tracker Server - virtual tracker bridge for VR runtimes
#[derive(Parser, Debug)]
#[command(name = "k2vr-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Endpoint to bind (host:port, tcp://host:port, tcp://*:port)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Request loop rate in Hz
    #[arg(long)]
    tick_rate: Option<u32>,

    /// Start with dispatch paused
    #[arg(long)]
    paused: bool,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long)]
    stats_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the default configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "server.json")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    if let Some(cmd) = args.command {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;

    info!("+----------------------------------------------------+");
    info!(
        "|       K2VR Tracker Server v{}                  |",
        env!("CARGO_PKG_VERSION")
    );
    info!("+----------------------------------------------------+");
    info!("|  Endpoint: {:39} |", config.endpoint);
    info!("|  Rate:     {:39} |", format!("{} Hz", config.tick_rate_hz));
    info!(
        "|  Start:    {:39} |",
        if config.start_active {
            "active"
        } else {
            "paused"
        }
    );
    info!(
        "|  Stats:    {:39} |",
        if config.stats_interval_secs == 0 {
            "disabled".to_string()
        } else {
            format!("every {}s", config.stats_interval_secs)
        }
    );
    info!("+----------------------------------------------------+");

    let stats_interval = config.stats_interval_secs;
    let server = TrackerServer::bind(config, Arc::new(LoggingRegistrar)).await?;
    let handle = server.start();

    // Stats reporting task
    if stats_interval > 0 {
        let stats_handle = handle.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
            interval.tick().await;
            loop {
                interval.tick().await;
                if !stats_handle.is_running() {
                    break;
                }
                let trackers = stats_handle.tracker_count().await;
                print_stats(&stats_handle.stats(), trackers);
            }
        });
    }

    // Handle shutdown signals
    let signal_handle = handle.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received, stopping server...");
        signal_handle.stop();
    });

    handle.join().await?;

    print_stats(&handle.stats(), handle.tracker_count().await);
    info!("Tracker server stopped");
    Ok(())
}

fn build_config(args: &Args) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = if let Some(ref config_path) = args.config {
        info!("Loading config from {:?}", config_path);
        ServerConfig::from_file(config_path)?
    } else {
        ServerConfig::default()
    };

    // Command line overrides the file
    if let Some(ref endpoint) = args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(rate) = args.tick_rate {
        config.tick_rate_hz = rate;
    }
    if args.paused {
        config.start_active = false;
    }
    if let Some(interval) = args.stats_interval {
        config.stats_interval_secs = interval;
    }

    config.validate()?;
    Ok(config)
}

fn print_stats(stats: &LoopStatsSnapshot, trackers: usize) {
    info!(
        "trackers={} ticks={} received={} dispatched={} replies={} ignored={} payload_errors={} socket_errors={}",
        trackers,
        stats.ticks,
        stats.messages_received,
        stats.commands_dispatched,
        stats.replies_sent,
        stats.messages_ignored,
        stats.payload_errors,
        stats.socket_errors
    );
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    ServerConfig::default().to_file(&output)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_file(&config_path)?;
    config.validate()?;

    println!("Configuration valid!");
    println!();
    println!("Endpoint:      {}", config.endpoint);
    println!("Bind address:  {}", config.bind_address());
    println!("Tick rate:     {} Hz", config.tick_rate_hz);
    println!("Paused poll:   {} ms", config.paused_poll_ms);
    println!("Max message:   {} bytes", config.max_message_size);
    println!("Start active:  {}", config.start_active);
    Ok(())
}
