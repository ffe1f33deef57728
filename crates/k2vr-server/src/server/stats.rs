// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request loop statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the request loop, readable from any task.
#[derive(Debug, Default)]
pub struct LoopStats {
    /// Ticks executed while active.
    pub ticks: AtomicU64,

    /// Requests received.
    pub messages_received: AtomicU64,

    /// Requests that reached a known command.
    pub commands_dispatched: AtomicU64,

    /// Replies sent.
    pub replies_sent: AtomicU64,

    /// Requests without a terminator, command marker or known name.
    pub messages_ignored: AtomicU64,

    /// Requests whose parameters failed to decode.
    pub payload_errors: AtomicU64,

    /// Receive/send failures.
    pub socket_errors: AtomicU64,
}

impl LoopStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.commands_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reply(&self) {
        self.replies_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.messages_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_payload_error(&self) {
        self.payload_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_socket_error(&self) {
        self.socket_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> LoopStatsSnapshot {
        LoopStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
            replies_sent: self.replies_sent.load(Ordering::Relaxed),
            messages_ignored: self.messages_ignored.load(Ordering::Relaxed),
            payload_errors: self.payload_errors.load(Ordering::Relaxed),
            socket_errors: self.socket_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`LoopStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStatsSnapshot {
    pub ticks: u64,
    pub messages_received: u64,
    pub commands_dispatched: u64,
    pub replies_sent: u64,
    pub messages_ignored: u64,
    pub payload_errors: u64,
    pub socket_errors: u64,
}
