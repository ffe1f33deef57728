// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tracker command protocol.
//!
//! Every request is one length-prefixed frame carrying an ASCII message:
//! ```text
//! +----------------+----------------------------------------+
//! | Length (4B BE) | [prefix]/C<NAME>/P<params>/T[trailing] |
//! +----------------+----------------------------------------+
//! ```
//! Two-parameter commands separate their parameters with `/P1`. Replies are
//! plain decimal strings in the same framing.

pub mod archive;
pub mod codec;
pub mod frame;

pub use archive::{
    from_archive_str, to_archive_string, ArchiveDecode, ArchiveEncode, ArchiveError,
    ArchiveReader, ArchiveWriter,
};
pub use codec::{decode_message, encode_message, parse_bool, parse_id, ParsedCommand, Reply};
pub use frame::{read_frame, write_frame, FrameError};

use std::fmt;
use thiserror::Error;

/// Marks the start of the command name.
pub const COMMAND_MARKER: &str = "/C";

/// Marks the start of the parameter region.
pub const PARAM_MARKER: &str = "/P";

/// Separates the first and second parameter of two-parameter commands.
pub const SECOND_PARAM_MARKER: &str = "/P1";

/// Terminates the message; anything after the last one is ignored.
pub const TERMINATOR: &str = "/T";

/// Commands understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Register a new tracker; replies with its id.
    AddTracker,
    /// Spawn every unadded tracker and set all states; replies `1`.
    SetStateAll,
    /// Set one tracker's state; replies `1` or `0`.
    SetState,
    /// Overwrite one tracker's pose; no reply.
    UpdatePose,
    /// Overwrite one tracker's auxiliary data; no reply.
    UpdateData,
}

impl Command {
    /// All commands, in protocol table order.
    pub const ALL: [Command; 5] = [
        Command::AddTracker,
        Command::SetStateAll,
        Command::SetState,
        Command::UpdatePose,
        Command::UpdateData,
    ];

    /// Wire name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddTracker => "ADD_TRACKER",
            Self::SetStateAll => "SET_STATE_ALL",
            Self::SetState => "SET_STATE",
            Self::UpdatePose => "UPDATE_POSE",
            Self::UpdateData => "UPDATE_DATA",
        }
    }

    /// Look up a command by wire name (exact match).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Whether the server sends exactly one reply for this command.
    pub fn is_replying(&self) -> bool {
        matches!(self, Self::AddTracker | Self::SetStateAll | Self::SetState)
    }

    /// Whether the parameter region is split at `/P1`.
    pub fn takes_pair(&self) -> bool {
        matches!(self, Self::SetState | Self::UpdatePose | Self::UpdateData)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol error types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("Empty command name")]
    EmptyCommand,

    #[error("Parameter contains reserved marker {marker:?}: {parameter:?}")]
    MarkerInParameter {
        marker: &'static str,
        parameter: String,
    },

    #[error("Too many parameters: {0} (at most 2)")]
    TooManyParameters(usize),

    #[error("Invalid reply: {0:?}")]
    InvalidReply(String),
}
