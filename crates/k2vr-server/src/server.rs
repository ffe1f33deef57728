// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tracker server core: the fixed-rate request loop and its lifecycle.

use crate::config::{ConfigError, ServerConfig};
use crate::tracker::{DeviceRegistrar, TrackerRegistry, TrackerSnapshot};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub mod dispatch;
pub mod socket;
pub mod stats;

pub use dispatch::{handle_message, Outcome};
pub use socket::{ReplySocket, SocketError};
pub use stats::{LoopStats, LoopStatsSnapshot};

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bind error: {0}")]
    Bind(SocketError),

    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("Server task already joined")]
    AlreadyJoined,

    #[error("Server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// State shared between the loop task and every [`ServerHandle`].
struct Shared {
    registry: RwLock<TrackerRegistry>,
    active: AtomicBool,
    stop: AtomicBool,
    running: AtomicBool,
    shutdown: Notify,
    stats: LoopStats,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// A tracker server whose endpoint is bound but whose loop is not running yet.
pub struct TrackerServer {
    config: Arc<ServerConfig>,
    socket: ReplySocket,
    registry: TrackerRegistry,
    local_addr: SocketAddr,
}

impl TrackerServer {
    /// Validate `config` and bind its endpoint.
    ///
    /// Binding is not retried; a failure is returned to the caller.
    pub async fn bind(
        config: ServerConfig,
        registrar: Arc<dyn DeviceRegistrar>,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let address = config.bind_address();
        let socket = ReplySocket::bind(&address, config.max_message_size)
            .await
            .map_err(ServerError::Bind)?;
        let local_addr = socket.local_addr().map_err(ServerError::Bind)?;

        info!("Tracker server bound to {}", local_addr);

        Ok(Self {
            config: Arc::new(config),
            socket,
            registry: TrackerRegistry::new(registrar),
            local_addr,
        })
    }

    /// Address the endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawn the request loop on the current runtime.
    pub fn start(self) -> ServerHandle {
        let Self {
            config,
            socket,
            registry,
            local_addr,
        } = self;

        let shared = Arc::new(Shared {
            registry: RwLock::new(registry),
            active: AtomicBool::new(config.start_active),
            stop: AtomicBool::new(false),
            running: AtomicBool::new(true),
            shutdown: Notify::new(),
            stats: LoopStats::new(),
            task: Mutex::new(None),
        });

        info!(
            "Request loop started at {} Hz ({})",
            config.tick_rate_hz,
            if config.start_active {
                "active"
            } else {
                "paused"
            }
        );

        let task = tokio::spawn(run_loop(shared.clone(), socket, config));
        *lock_task(&shared) = Some(task);

        ServerHandle { shared, local_addr }
    }
}

/// Control handle for a running server. Cheap to clone.
#[derive(Clone)]
pub struct ServerHandle {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    /// Pause or resume dispatch. The endpoint stays bound either way.
    pub fn set_active(&self, active: bool) {
        let previous = self.shared.active.swap(active, Ordering::SeqCst);
        if previous != active {
            info!("Dispatch {}", if active { "resumed" } else { "paused" });
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Ask the loop to exit at its next wait point.
    pub fn stop(&self) {
        if !self.shared.stop.swap(true, Ordering::SeqCst) {
            info!("Stopping request loop");
        }
        self.shared.shutdown.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Wait for the loop task to finish. Only the first caller gets the task.
    pub async fn join(&self) -> Result<(), ServerError> {
        let task = lock_task(&self.shared)
            .take()
            .ok_or(ServerError::AlreadyJoined)?;
        task.await?;
        Ok(())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of trackers registered so far.
    pub async fn tracker_count(&self) -> usize {
        self.shared.registry.read().await.len()
    }

    pub fn stats(&self) -> LoopStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Copy of every tracker, for readers outside the loop.
    pub async fn snapshot(&self) -> Vec<TrackerSnapshot> {
        self.shared.registry.read().await.snapshot()
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.local_addr)
            .field("active", &self.is_active())
            .field("running", &self.is_running())
            .finish()
    }
}

fn lock_task(shared: &Shared) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
    shared
        .task
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The request loop: one receive per tick, deadlines advanced by a fixed period.
async fn run_loop(shared: Arc<Shared>, mut socket: ReplySocket, config: Arc<ServerConfig>) {
    let paused_poll = config.paused_poll();
    let mut schedule = TickSchedule::new(config.tick_period(), Instant::now());
    let mut was_active = shared.active.load(Ordering::SeqCst);

    loop {
        // Registered before the stop check so a concurrent stop() is not lost
        let shutdown = shared.shutdown.notified();
        tokio::pin!(shutdown);
        shutdown.as_mut().enable();

        if shared.stop.load(Ordering::SeqCst) {
            break;
        }

        if !shared.active.load(Ordering::SeqCst) {
            if was_active {
                debug!("Request loop idle");
                was_active = false;
            }
            tokio::select! {
                _ = tokio::time::sleep(paused_poll) => {}
                _ = &mut shutdown => break,
            }
            continue;
        }

        if !was_active {
            debug!("Request loop dispatching");
            was_active = true;
            schedule.reset(Instant::now());
        }

        let deadline = schedule.advance();
        shared.stats.record_tick();

        let received = tokio::select! {
            result = socket.recv() => {
                result.map(|request| String::from_utf8_lossy(request).into_owned())
            }
            _ = &mut shutdown => break,
        };

        match received {
            Ok(message) => {
                shared.stats.record_received();
                let outcome = {
                    let mut registry = shared.registry.write().await;
                    handle_message(&mut registry, &message, std::time::Instant::now())
                };
                record_outcome(&shared.stats, &outcome);

                if let Some(reply) = outcome.reply() {
                    match socket.send(reply.encode().as_bytes()).await {
                        Ok(()) => shared.stats.record_reply(),
                        Err(e) => {
                            warn!("Failed to send reply {}: {}", reply, e);
                            shared.stats.record_socket_error();
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Receive failed: {}", e);
                shared.stats.record_socket_error();
            }
        }

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            _ = &mut shutdown => break,
        }
    }

    shared.running.store(false, Ordering::SeqCst);
    info!("Request loop stopped");
}

/// Tick deadlines, each exactly one period after the previous one.
///
/// A tick that overruns leaves later deadlines in place, so the following
/// ticks run back to back until the schedule is caught up.
#[derive(Debug)]
struct TickSchedule {
    period: Duration,
    next: Instant,
}

impl TickSchedule {
    fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next: start,
        }
    }

    /// Restart from `now`, dropping missed ticks.
    fn reset(&mut self, now: Instant) {
        self.next = now;
    }

    /// Deadline the current tick sleeps until.
    fn advance(&mut self) -> Instant {
        self.next += self.period;
        self.next
    }
}

fn record_outcome(stats: &LoopStats, outcome: &Outcome) {
    match outcome {
        Outcome::Ignored => stats.record_ignored(),
        Outcome::Handled { .. } => stats.record_dispatched(),
        Outcome::Rejected {
            command, reason, ..
        } => {
            warn!("Rejected {}: {}", command, reason);
            stats.record_dispatched();
            stats.record_payload_error();
        }
    }
}
