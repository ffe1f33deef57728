// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! k2vrctl: drive a running tracker server from the command line.
//!
//! ```bash
//! k2vrctl add --descriptor '{"serial": "K2-WAIST", "role": "waist"}'
//! k2vrctl state-all 1
//! k2vrctl pose 0 --position 0,1,0 --orientation 1,0,0,0
//! k2vrctl raw "/CSET_STATE/P0/P11/T" --expect-reply
//! ```

use clap::{Parser, Subcommand};
use k2vr_server::{
    DataPacket, PosePacket, Quaternion, TrackerClient, TrackerDescriptor, TrackerRole, Vector3,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Command-line companion for the k2vr tracker server
#[derive(Parser, Debug)]
#[command(name = "k2vrctl")]
#[command(version, about, long_about = None)]
struct Args {
    /// Server endpoint
    #[arg(short, long, default_value = "tcp://127.0.0.1:7135")]
    endpoint: String,

    /// Largest request/reply accepted (bytes)
    #[arg(long, default_value = "1048576")]
    max_message_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a tracker and print its id
    Add {
        /// Tracker descriptor as JSON
        #[arg(short, long)]
        descriptor: String,
    },

    /// Set one tracker's state
    State {
        id: usize,
        #[arg(value_parser = parse_state, action = clap::ArgAction::Set)]
        active: bool,
    },

    /// Spawn every tracker and set all states
    StateAll {
        #[arg(value_parser = parse_state, action = clap::ArgAction::Set)]
        active: bool,
    },

    /// Send a pose update
    Pose {
        id: usize,

        /// Position as x,y,z
        #[arg(long, value_parser = parse_vector3, allow_hyphen_values = true)]
        position: Vector3,

        /// Orientation as w,x,y,z
        #[arg(long, value_parser = parse_quaternion, allow_hyphen_values = true)]
        orientation: Quaternion,

        /// Offset from now the pose applies at (milliseconds)
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        millis: f64,
    },

    /// Send a data update
    Data {
        id: usize,

        #[arg(long)]
        serial: String,

        /// Role (e.g. waist, left_foot)
        #[arg(long, value_parser = parse_role, default_value = "handed")]
        role: TrackerRole,

        #[arg(long)]
        active: bool,

        /// Offset from now the data applies at (milliseconds)
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        millis: f64,
    },

    /// Send a message verbatim
    Raw {
        message: String,

        /// Wait for and print a reply
        #[arg(long)]
        expect_reply: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut client = TrackerClient::connect(&args.endpoint)
        .await?
        .with_max_message_size(args.max_message_size);
    debug!("Connected to {}", client.peer_addr());

    match args.command {
        Commands::Add { descriptor } => {
            let descriptor: TrackerDescriptor = serde_json::from_str(&descriptor)?;
            debug!("Adding {:?}", descriptor);
            let id = client.add_tracker(&descriptor).await?;
            println!("{}", id);
        }
        Commands::State { id, active } => {
            let ok = client.set_state(id, active).await?;
            println!("{}", u8::from(ok));
        }
        Commands::StateAll { active } => {
            let ok = client.set_state_all(active).await?;
            println!("{}", u8::from(ok));
        }
        Commands::Pose {
            id,
            position,
            orientation,
            millis,
        } => {
            let pose = PosePacket {
                position,
                orientation,
                millis_from_now: millis,
                ..Default::default()
            };
            client.update_pose(id, &pose).await?;
        }
        Commands::Data {
            id,
            serial,
            role,
            active,
            millis,
        } => {
            let data = DataPacket {
                serial,
                role,
                is_active: active,
                millis_from_now: millis,
            };
            client.update_data(id, &data).await?;
        }
        Commands::Raw {
            message,
            expect_reply,
        } => {
            debug!("Sending {:?}", message);
            match client.send_raw(&message, expect_reply).await? {
                Some(reply) => println!("{}", reply),
                None => debug!("No reply expected"),
            }
        }
    }

    Ok(())
}

fn parse_state(value: &str) -> Result<bool, String> {
    match value {
        "0" | "false" | "off" => Ok(false),
        "1" | "true" | "on" => Ok(true),
        _ => Err(format!("expected 0 or 1, got {:?}", value)),
    }
}

fn parse_components<const N: usize>(value: &str) -> Result<[f64; N], String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid number in {:?}: {}", value, e))?;
    parts
        .try_into()
        .map_err(|parts: Vec<f64>| format!("expected {} components, got {}", N, parts.len()))
}

fn parse_vector3(value: &str) -> Result<Vector3, String> {
    let [x, y, z] = parse_components::<3>(value)?;
    Ok(Vector3::new(x, y, z))
}

fn parse_quaternion(value: &str) -> Result<Quaternion, String> {
    let [w, x, y, z] = parse_components::<4>(value)?;
    Ok(Quaternion { w, x, y, z })
}

fn parse_role(value: &str) -> Result<TrackerRole, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown role {:?}", value))
}
