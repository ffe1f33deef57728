// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! K2VR Tracker Server
//!
//! Always-on local server through which a companion application registers
//! and drives virtual trackers for a VR runtime.
//!
//! # Features
//!
//! - **Tracker Registry**: append-only arena of trackers addressed by stable ids
//! - **Command Protocol**: `/C<NAME>/P<params>/T` text messages over framed TCP
//! - **Fixed-Rate Loop**: one request per tick at 140 Hz, drift-free scheduling
//! - **Pause/Resume**: the endpoint stays bound while dispatch is paused
//!
//! # Quick Start
//!
//! ```bash
//! # Serve on the default endpoint (tcp://127.0.0.1:7135)
//! k2vr-server
//!
//! # Custom endpoint, start paused
//! k2vr-server --endpoint "tcp://*:7135" --paused
//!
//! # Using config file
//! k2vr-server --config server.json
//! ```
//!
//! # Wire Protocol
//!
//! ```text
//! /CADD_TRACKER/P<descriptor archive>/T        -> "<id>" | "-1"
//! /CSET_STATE_ALL/P<0|1>/T                      -> "1" | "0"
//! /CSET_STATE/P<id>/P1<0|1>/T                   -> "1" | "0"
//! /CUPDATE_POSE/P<id>/P1<pose archive>/T        -> (no reply)
//! /CUPDATE_DATA/P<id>/P1<data archive>/T        -> (no reply)
//! ```

pub mod client;
pub mod config;
pub mod protocol;
pub mod server;
pub mod tracker;

pub use client::{ClientError, TrackerClient};
pub use config::{ConfigError, ServerConfig};
pub use protocol::{Command, ParsedCommand, ProtocolError, Reply};
pub use server::{LoopStatsSnapshot, ServerError, ServerHandle, TrackerServer};
pub use tracker::{
    DataPacket, DeviceRegistrar, LoggingRegistrar, PosePacket, Quaternion, Tracker,
    TrackerDescriptor, TrackerRegistry, TrackerRole, TrackerSnapshot, TrackerState, Vector3,
};
