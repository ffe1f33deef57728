// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Append-only tracker registry.
//!
//! Trackers are addressed by their position in the registry. Ids are assigned
//! in insertion order and never reused; nothing is ever removed.

use super::{DataPacket, PosePacket, Tracker, TrackerDescriptor, TrackerRole};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Hook into the VR runtime's device lifecycle.
pub trait DeviceRegistrar: Send + Sync {
    /// Register tracker `id` with the runtime; returns true if it was spawned.
    fn register_device(&self, id: usize, descriptor: &TrackerDescriptor) -> bool;
}

/// Registrar that only logs, for running without a VR runtime attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRegistrar;

impl DeviceRegistrar for LoggingRegistrar {
    fn register_device(&self, id: usize, descriptor: &TrackerDescriptor) -> bool {
        info!(
            "Registering device {} serial={} role={}",
            id, descriptor.serial, descriptor.role
        );
        true
    }
}

/// Read-only copy of a tracker for control-plane readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerSnapshot {
    pub id: usize,
    pub serial: String,
    pub role: TrackerRole,
    pub added: bool,
    pub active: bool,
    pub pose: PosePacket,
    pub data: DataPacket,
}

impl From<&Tracker> for TrackerSnapshot {
    fn from(tracker: &Tracker) -> Self {
        Self {
            id: tracker.id(),
            serial: tracker.descriptor().serial.clone(),
            role: tracker.descriptor().role,
            added: tracker.is_added(),
            active: tracker.is_active(),
            pose: tracker.pose().value,
            data: tracker.data().value.clone(),
        }
    }
}

/// Registry of all trackers created during this process' lifetime.
pub struct TrackerRegistry {
    trackers: Vec<Tracker>,
    registrar: Arc<dyn DeviceRegistrar>,
}

impl TrackerRegistry {
    /// Create an empty registry that spawns through `registrar`.
    pub fn new(registrar: Arc<dyn DeviceRegistrar>) -> Self {
        Self {
            trackers: Vec::new(),
            registrar,
        }
    }

    /// Append a tracker and return its id (the previous length).
    pub fn add(&mut self, descriptor: TrackerDescriptor) -> usize {
        let id = self.trackers.len();
        debug!("Adding tracker {} serial={}", id, descriptor.serial);
        self.trackers.push(Tracker::new(id, descriptor, Instant::now()));
        id
    }

    /// Spawn every unadded tracker, then set every tracker's state.
    ///
    /// The registrar is asked at most once per tracker per call.
    pub fn set_state_all(&mut self, active: bool) -> bool {
        let registrar = self.registrar.as_ref();
        for tracker in &mut self.trackers {
            tracker.spawn(registrar);
            tracker.set_active(active);
        }
        true
    }

    /// Set one tracker's state; false if `id` is out of range.
    pub fn set_state(&mut self, id: usize, active: bool) -> bool {
        let registrar = self.registrar.as_ref();
        match self.trackers.get_mut(id) {
            Some(tracker) => {
                tracker.set_state(active, registrar);
                true
            }
            None => false,
        }
    }

    /// Overwrite one tracker's pose; false if `id` is out of range.
    pub fn update_pose(&mut self, id: usize, pose: PosePacket, received_at: Instant) -> bool {
        match self.trackers.get_mut(id) {
            Some(tracker) => {
                tracker.set_pose(pose, received_at);
                true
            }
            None => false,
        }
    }

    /// Overwrite one tracker's data; false if `id` is out of range.
    pub fn update_data(&mut self, id: usize, data: DataPacket, received_at: Instant) -> bool {
        match self.trackers.get_mut(id) {
            Some(tracker) => {
                tracker.set_data(data, received_at);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: usize) -> Option<&Tracker> {
        self.trackers.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tracker> {
        self.trackers.iter()
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Number of trackers spawned in the runtime.
    pub fn added_count(&self) -> usize {
        self.trackers.iter().filter(|t| t.is_added()).count()
    }

    /// Copy every tracker for readers outside the request loop.
    pub fn snapshot(&self) -> Vec<TrackerSnapshot> {
        self.trackers.iter().map(TrackerSnapshot::from).collect()
    }
}

impl std::fmt::Debug for TrackerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerRegistry")
            .field("trackers", &self.trackers)
            .finish_non_exhaustive()
    }
}
