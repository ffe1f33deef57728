// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command dispatch against the tracker registry.
//!
//! Every failure is contained here: a message either maps to an [`Outcome`]
//! or is ignored, and nothing propagates past the current tick.

use crate::protocol::{
    decode_message, from_archive_str, parse_bool, parse_id, ArchiveDecode, Command, ParsedCommand,
    Reply,
};
use crate::tracker::{DataPacket, PosePacket, TrackerDescriptor, TrackerRegistry};
use std::time::Instant;
use tracing::debug;

/// Result of handling one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No terminator, no command marker, or an unknown command name.
    Ignored,

    /// Command was applied (possibly as a no-op for an unknown id).
    Handled {
        command: Command,
        reply: Option<Reply>,
    },

    /// Command parameters could not be decoded; registry untouched.
    Rejected {
        command: Command,
        reply: Option<Reply>,
        reason: String,
    },
}

impl Outcome {
    /// Reply to send, if any.
    pub fn reply(&self) -> Option<Reply> {
        match self {
            Self::Ignored => None,
            Self::Handled { reply, .. } | Self::Rejected { reply, .. } => *reply,
        }
    }

    /// Command the request resolved to, if any.
    pub fn command(&self) -> Option<Command> {
        match self {
            Self::Ignored => None,
            Self::Handled { command, .. } | Self::Rejected { command, .. } => Some(*command),
        }
    }
}

/// Decode `raw` and apply it to `registry`.
pub fn handle_message(registry: &mut TrackerRegistry, raw: &str, received_at: Instant) -> Outcome {
    let Some(parsed) = decode_message(raw) else {
        debug!("Ignoring message without command: {:?}", raw);
        return Outcome::Ignored;
    };

    let Some(command) = parsed.command() else {
        debug!("Ignoring unknown command {:?}", parsed.name);
        return Outcome::Ignored;
    };

    debug!("Dispatching {}", command);

    match command {
        Command::AddTracker => add_tracker(registry, &parsed.parameters),
        Command::SetStateAll => set_state_all(registry, &parsed.parameters),
        Command::SetState => set_state(registry, &parsed),
        Command::UpdatePose => update(&parsed, command, |id, pose: PosePacket| {
            registry.update_pose(id, pose, received_at)
        }),
        Command::UpdateData => update(&parsed, command, |id, data: DataPacket| {
            registry.update_data(id, data, received_at)
        }),
    }
}

fn add_tracker(registry: &mut TrackerRegistry, parameters: &str) -> Outcome {
    let command = Command::AddTracker;
    match from_archive_str::<TrackerDescriptor>(parameters) {
        Ok(descriptor) => {
            let id = registry.add(descriptor);
            Outcome::Handled {
                command,
                reply: Some(Reply::TrackerId(id)),
            }
        }
        Err(e) => Outcome::Rejected {
            command,
            reply: Some(Reply::AddFailed),
            reason: format!("invalid descriptor: {}", e),
        },
    }
}

fn set_state_all(registry: &mut TrackerRegistry, parameters: &str) -> Outcome {
    let command = Command::SetStateAll;
    match parse_bool(parameters) {
        Some(active) => Outcome::Handled {
            command,
            reply: Some(Reply::Ack(registry.set_state_all(active))),
        },
        None => Outcome::Rejected {
            command,
            reply: Some(Reply::Ack(false)),
            reason: format!("invalid state {:?}", parameters),
        },
    }
}

fn set_state(registry: &mut TrackerRegistry, parsed: &ParsedCommand) -> Outcome {
    let command = Command::SetState;
    let rejected = |reason: String| Outcome::Rejected {
        command,
        reply: Some(Reply::Ack(false)),
        reason,
    };

    let Some((id, state)) = parsed.parameter_pair() else {
        return rejected(format!("expected <id>/P1<state>, got {:?}", parsed.parameters));
    };
    let Some(id) = parse_id(id) else {
        return rejected(format!("invalid tracker id {:?}", id));
    };
    let Some(active) = parse_bool(state) else {
        return rejected(format!("invalid state {:?}", state));
    };

    let applied = registry.set_state(id, active);
    if !applied {
        debug!("SET_STATE for unknown tracker {}", id);
    }
    Outcome::Handled {
        command,
        reply: Some(Reply::Ack(applied)),
    }
}

/// Shared path of the non-replying `<id>/P1<archive>` updates.
fn update<T, F>(parsed: &ParsedCommand, command: Command, apply: F) -> Outcome
where
    T: ArchiveDecode,
    F: FnOnce(usize, T) -> bool,
{
    let rejected = |reason: String| Outcome::Rejected {
        command,
        reply: None,
        reason,
    };

    let Some((id, payload)) = parsed.parameter_pair() else {
        return rejected(format!("expected <id>/P1<payload>, got {:?}", parsed.parameters));
    };
    let Some(id) = parse_id(id) else {
        return rejected(format!("invalid tracker id {:?}", id));
    };
    let value = match from_archive_str::<T>(payload) {
        Ok(value) => value,
        Err(e) => return rejected(format!("invalid payload: {}", e)),
    };

    if !apply(id, value) {
        debug!("{} for unknown tracker {}", command, id);
    }
    Outcome::Handled {
        command,
        reply: None,
    }
}
