// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field-order text archive for structured payloads.
//!
//! Values are written as whitespace-separated tokens in declaration order,
//! after an optional `22 serialization::archive <version>` header. Sender and
//! receiver must agree on field order and count; nothing is self-describing.
//!
//! Token encoding:
//! ```text
//! f64 / i32 / u32 : decimal
//! bool            : 0 | 1
//! Option<T>       : 0 | 1 <T>
//! string          : <byte-length> <percent-escaped text>
//! ```
//!
//! Strings escape `%`, `/`, whitespace and every non-printable or non-ASCII
//! byte, so an archive never contains a protocol marker.

use thiserror::Error;

/// Archive signature written as the first string of every archive.
pub const ARCHIVE_SIGNATURE: &str = "serialization::archive";

/// Archive format version written after the signature.
pub const ARCHIVE_VERSION: u32 = 19;

/// Archive decoding errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArchiveError {
    #[error("unexpected end of archive while reading {0}")]
    UnexpectedEnd(&'static str),

    #[error("invalid {kind} token: {token:?}")]
    InvalidToken { kind: &'static str, token: String },

    #[error("string length mismatch: declared {declared}, decoded {decoded}")]
    LengthMismatch { declared: usize, decoded: usize },

    #[error("unknown tracker role: {0}")]
    UnknownRole(i32),
}

/// Types that can be written to a text archive.
pub trait ArchiveEncode {
    /// Append this value's fields to the writer, in declaration order.
    fn encode_archive(&self, writer: &mut ArchiveWriter);
}

/// Types that can be read back from a text archive.
pub trait ArchiveDecode: Sized {
    /// Read this value's fields from the reader, in declaration order.
    fn decode_archive(reader: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError>;
}

/// Serialize a value to a complete archive string (header included).
pub fn to_archive_string<T: ArchiveEncode>(value: &T) -> String {
    let mut writer = ArchiveWriter::new();
    value.encode_archive(&mut writer);
    writer.finish()
}

/// Deserialize a value from an archive string (header optional).
pub fn from_archive_str<T: ArchiveDecode>(input: &str) -> Result<T, ArchiveError> {
    let mut reader = ArchiveReader::new(input);
    T::decode_archive(&mut reader)
}

/// Token writer.
#[derive(Debug)]
pub struct ArchiveWriter {
    buf: String,
}

impl ArchiveWriter {
    /// Create a writer with the archive header already written.
    pub fn new() -> Self {
        let mut writer = Self::headless();
        writer.write_str(ARCHIVE_SIGNATURE);
        writer.write_u32(ARCHIVE_VERSION);
        writer
    }

    /// Create a writer without a header.
    pub fn headless() -> Self {
        Self {
            buf: String::with_capacity(128),
        }
    }

    fn push_token(&mut self, token: &str) {
        if !self.buf.is_empty() {
            self.buf.push(' ');
        }
        self.buf.push_str(token);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.push_token(&value.to_string());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.push_token(&value.to_string());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.push_token(&value.to_string());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.push_token(if value { "1" } else { "0" });
    }

    pub fn write_str(&mut self, value: &str) {
        self.push_token(&value.len().to_string());
        // An empty string has no text token
        if !value.is_empty() {
            let escaped = escape(value);
            self.push_token(&escaped);
        }
    }

    pub fn write_option<T: ArchiveEncode>(&mut self, value: Option<&T>) {
        match value {
            Some(v) => {
                self.write_bool(true);
                v.encode_archive(self);
            }
            None => self.write_bool(false),
        }
    }

    pub fn write<T: ArchiveEncode>(&mut self, value: &T) {
        value.encode_archive(self);
    }

    /// Consume the writer and return the archive text.
    pub fn finish(self) -> String {
        self.buf
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Token reader over an archive string.
#[derive(Debug)]
pub struct ArchiveReader<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> ArchiveReader<'a> {
    /// Create a reader, skipping the archive header if present.
    pub fn new(input: &'a str) -> Self {
        let tokens: Vec<&str> = input.split_ascii_whitespace().collect();
        let signature_len = ARCHIVE_SIGNATURE.len().to_string();
        let pos = if tokens.len() >= 3
            && tokens[0] == signature_len
            && tokens[1] == ARCHIVE_SIGNATURE
        {
            3
        } else {
            0
        };
        Self { tokens, pos }
    }

    fn next_token(&mut self, kind: &'static str) -> Result<&'a str, ArchiveError> {
        let token = self
            .tokens
            .get(self.pos)
            .copied()
            .ok_or(ArchiveError::UnexpectedEnd(kind))?;
        self.pos += 1;
        Ok(token)
    }

    fn parse_token<T: std::str::FromStr>(&mut self, kind: &'static str) -> Result<T, ArchiveError> {
        let token = self.next_token(kind)?;
        token.parse().map_err(|_| ArchiveError::InvalidToken {
            kind,
            token: token.to_string(),
        })
    }

    pub fn read_f64(&mut self) -> Result<f64, ArchiveError> {
        self.parse_token("f64")
    }

    pub fn read_i32(&mut self) -> Result<i32, ArchiveError> {
        self.parse_token("i32")
    }

    pub fn read_u32(&mut self) -> Result<u32, ArchiveError> {
        self.parse_token("u32")
    }

    pub fn read_bool(&mut self) -> Result<bool, ArchiveError> {
        match self.next_token("bool")? {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(ArchiveError::InvalidToken {
                kind: "bool",
                token: other.to_string(),
            }),
        }
    }

    pub fn read_string(&mut self) -> Result<String, ArchiveError> {
        let declared: usize = self.parse_token("string length")?;
        if declared == 0 {
            return Ok(String::new());
        }
        let token = self.next_token("string")?;
        let decoded = unescape(token).ok_or_else(|| ArchiveError::InvalidToken {
            kind: "string",
            token: token.to_string(),
        })?;
        if decoded.len() != declared {
            return Err(ArchiveError::LengthMismatch {
                declared,
                decoded: decoded.len(),
            });
        }
        Ok(decoded)
    }

    pub fn read_option<T: ArchiveDecode>(&mut self) -> Result<Option<T>, ArchiveError> {
        if self.read_bool()? {
            Ok(Some(T::decode_archive(self)?))
        } else {
            Ok(None)
        }
    }

    pub fn read<T: ArchiveDecode>(&mut self) -> Result<T, ArchiveError> {
        T::decode_archive(self)
    }

    /// Number of tokens not yet consumed.
    pub fn remaining(&self) -> usize {
        self.tokens.len().saturating_sub(self.pos)
    }
}

fn needs_escape(byte: u8) -> bool {
    !(0x21..0x7f).contains(&byte) || byte == b'%' || byte == b'/'
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for &byte in value.as_bytes() {
        if needs_escape(byte) {
            out.push_str(&format!("%{:02X}", byte));
        } else {
            out.push(byte as char);
        }
    }
    out
}

fn unescape(token: &str) -> Option<String> {
    let bytes = token.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = token.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
