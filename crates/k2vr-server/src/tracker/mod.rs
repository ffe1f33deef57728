// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Virtual trackers and the registry that owns them.

pub mod registry;
pub mod types;

pub use registry::{DeviceRegistrar, LoggingRegistrar, TrackerRegistry, TrackerSnapshot};
pub use types::{DataPacket, PosePacket, Quaternion, TrackerDescriptor, TrackerRole, Vector3};

use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Activity state requested by the companion app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    #[default]
    Inactive,
    Active,
}

impl From<bool> for TrackerState {
    fn from(active: bool) -> Self {
        if active {
            Self::Active
        } else {
            Self::Inactive
        }
    }
}

/// A value together with when it was received and when it takes effect.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedUpdate<T> {
    pub value: T,
    pub received_at: Instant,
    /// `None` when the value is authoritative immediately.
    pub apply_at: Option<Instant>,
}

impl<T> TimedUpdate<T> {
    /// Tag `value` with a target time `millis_from_now` after `received_at`.
    ///
    /// Offsets whose integer part is zero (or that are not finite) apply
    /// immediately; negative offsets apply at receipt.
    pub fn new(value: T, received_at: Instant, millis_from_now: f64) -> Self {
        let apply_at = schedule_offset(millis_from_now)
            .map(|offset| received_at.checked_add(offset).unwrap_or(received_at));
        Self {
            value,
            received_at,
            apply_at,
        }
    }

    /// Value applies immediately.
    pub fn immediate(value: T, received_at: Instant) -> Self {
        Self {
            value,
            received_at,
            apply_at: None,
        }
    }

    /// The value targets a later application time.
    pub fn is_predictive(&self) -> bool {
        self.apply_at.is_some()
    }

    /// The value should be in effect at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.apply_at.map_or(true, |at| now >= at)
    }
}

fn schedule_offset(millis_from_now: f64) -> Option<Duration> {
    if !millis_from_now.is_finite() || millis_from_now.trunc() == 0.0 {
        return None;
    }
    // `as` saturates on overflow
    Some(Duration::from_nanos((millis_from_now.max(0.0) * 1_000_000.0) as u64))
}

/// One virtual tracker.
#[derive(Debug, Clone)]
pub struct Tracker {
    id: usize,
    descriptor: TrackerDescriptor,
    added: bool,
    state: TrackerState,
    pose: TimedUpdate<PosePacket>,
    data: TimedUpdate<DataPacket>,
}

impl Tracker {
    /// Create an unadded, inactive tracker seeded from its descriptor.
    pub fn new(id: usize, descriptor: TrackerDescriptor, created_at: Instant) -> Self {
        Self {
            id,
            pose: TimedUpdate::immediate(descriptor.pose, created_at),
            data: TimedUpdate::immediate(descriptor.data.clone(), created_at),
            descriptor,
            added: false,
            state: TrackerState::Inactive,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn descriptor(&self) -> &TrackerDescriptor {
        &self.descriptor
    }

    /// The tracker has been spawned in the VR runtime.
    pub fn is_added(&self) -> bool {
        self.added
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TrackerState::Active
    }

    pub fn pose(&self) -> &TimedUpdate<PosePacket> {
        &self.pose
    }

    pub fn data(&self) -> &TimedUpdate<DataPacket> {
        &self.data
    }

    /// Spawn the tracker through `registrar` unless already added.
    ///
    /// Returns true if this call spawned it.
    pub fn spawn(&mut self, registrar: &dyn DeviceRegistrar) -> bool {
        if self.added {
            return false;
        }
        if registrar.register_device(self.id, &self.descriptor) {
            self.added = true;
            info!(
                "Spawned tracker {} ({}, {})",
                self.id, self.descriptor.serial, self.descriptor.role
            );
            true
        } else {
            warn!(
                "Runtime refused tracker {} ({}), will retry on next activation",
                self.id, self.descriptor.serial
            );
            false
        }
    }

    /// Set the activity state, spawning on first activation.
    pub fn set_state(&mut self, active: bool, registrar: &dyn DeviceRegistrar) {
        self.set_active(active);
        if active && !self.added {
            self.spawn(registrar);
        }
    }

    /// Set the activity state without touching the runtime.
    pub fn set_active(&mut self, active: bool) {
        self.state = active.into();
    }

    pub fn set_pose(&mut self, pose: PosePacket, received_at: Instant) {
        let millis = pose.millis_from_now;
        self.pose = TimedUpdate::new(pose, received_at, millis);
    }

    pub fn set_data(&mut self, data: DataPacket, received_at: Instant) {
        let millis = data.millis_from_now;
        self.data = TimedUpdate::new(data, received_at, millis);
    }
}
