// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message decoding and reply encoding.

use super::{
    Command, ProtocolError, COMMAND_MARKER, PARAM_MARKER, SECOND_PARAM_MARKER, TERMINATOR,
};
use std::fmt;

/// Reply sent when an ADD_TRACKER descriptor cannot be decoded.
pub const ADD_FAILED_REPLY: &str = "-1";

/// A decoded request: command name plus the raw parameter region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Text between `/C` and the following `/P`.
    pub name: String,
    /// Everything after that `/P`, up to the last `/T`.
    pub parameters: String,
}

impl ParsedCommand {
    /// Known command for this name, if any.
    pub fn command(&self) -> Option<Command> {
        Command::from_name(&self.name)
    }

    /// Split the parameter region at its last `/P1`.
    ///
    /// Returns `None` when the marker is missing or either side is empty.
    pub fn parameter_pair(&self) -> Option<(&str, &str)> {
        let split = self.parameters.rfind(SECOND_PARAM_MARKER)?;
        let first = &self.parameters[..split];
        let second = &self.parameters[split + SECOND_PARAM_MARKER.len()..];
        if first.is_empty() || second.is_empty() {
            return None;
        }
        Some((first, second))
    }
}

/// Decode a raw message.
///
/// Returns `None` ("no command present") when the terminator or the command
/// marker is missing, or when the command name is empty.
pub fn decode_message(raw: &str) -> Option<ParsedCommand> {
    let end = raw.rfind(TERMINATOR)?;
    let body = &raw[..end];

    let start = body.find(COMMAND_MARKER)? + COMMAND_MARKER.len();
    let rest = &body[start..];

    let (name, parameters) = match rest.find(PARAM_MARKER) {
        Some(p) => (&rest[..p], &rest[p + PARAM_MARKER.len()..]),
        None => (rest, ""),
    };

    if name.is_empty() {
        return None;
    }

    Some(ParsedCommand {
        name: name.to_string(),
        parameters: parameters.to_string(),
    })
}

/// Encode a request message with zero, one or two parameters.
pub fn encode_message(command: &str, parameters: &[&str]) -> Result<String, ProtocolError> {
    if command.is_empty() {
        return Err(ProtocolError::EmptyCommand);
    }
    if parameters.len() > 2 {
        return Err(ProtocolError::TooManyParameters(parameters.len()));
    }
    for text in std::iter::once(&command).chain(parameters.iter()) {
        for marker in [TERMINATOR, PARAM_MARKER, COMMAND_MARKER] {
            if text.contains(marker) {
                return Err(ProtocolError::MarkerInParameter {
                    marker,
                    parameter: text.to_string(),
                });
            }
        }
    }

    let mut message = String::with_capacity(
        command.len() + parameters.iter().map(|p| p.len()).sum::<usize>() + 10,
    );
    message.push_str(COMMAND_MARKER);
    message.push_str(command);
    if let Some(first) = parameters.first() {
        message.push_str(PARAM_MARKER);
        message.push_str(first);
    }
    if let Some(second) = parameters.get(1) {
        message.push_str(SECOND_PARAM_MARKER);
        message.push_str(second);
    }
    message.push_str(TERMINATOR);
    Ok(message)
}

/// Parse a `0`/`1` boolean parameter.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

/// Parse a decimal tracker id parameter.
///
/// Only ASCII digits are accepted; a leading `+` or `-` is rejected.
pub fn parse_id(text: &str) -> Option<usize> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Reply to a replying command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// `"1"` on success, `"0"` on failure.
    Ack(bool),
    /// Id assigned to a new tracker.
    TrackerId(usize),
    /// ADD_TRACKER descriptor could not be decoded.
    AddFailed,
}

impl Reply {
    /// Wire text of the reply.
    pub fn encode(&self) -> String {
        match self {
            Self::Ack(true) => "1".to_string(),
            Self::Ack(false) => "0".to_string(),
            Self::TrackerId(id) => id.to_string(),
            Self::AddFailed => ADD_FAILED_REPLY.to_string(),
        }
    }

    /// Parse an acknowledgement reply.
    pub fn parse_ack(text: &str) -> Result<bool, ProtocolError> {
        parse_bool(text).ok_or_else(|| ProtocolError::InvalidReply(text.to_string()))
    }

    /// Parse an ADD_TRACKER reply; `None` means the server rejected the descriptor.
    pub fn parse_tracker_id(text: &str) -> Result<Option<usize>, ProtocolError> {
        if text.trim() == ADD_FAILED_REPLY {
            return Ok(None);
        }
        parse_id(text)
            .map(Some)
            .ok_or_else(|| ProtocolError::InvalidReply(text.to_string()))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
