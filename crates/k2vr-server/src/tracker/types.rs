// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pose, data and descriptor payloads carried by tracker commands.

use crate::protocol::archive::{
    ArchiveDecode, ArchiveEncode, ArchiveError, ArchiveReader, ArchiveWriter,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 3D vector (meters, or meters per second for velocities).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Orientation quaternion, stored `w, x, y, z`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 0.0);

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Body role a virtual tracker stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerRole {
    #[default]
    Handed = 0,
    LeftFoot = 1,
    RightFoot = 2,
    LeftShoulder = 3,
    RightShoulder = 4,
    LeftElbow = 5,
    RightElbow = 6,
    LeftKnee = 7,
    RightKnee = 8,
    Waist = 9,
    Chest = 10,
    Camera = 11,
    Keyboard = 12,
}

impl TrackerRole {
    /// Role for a wire discriminant.
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            0 => Self::Handed,
            1 => Self::LeftFoot,
            2 => Self::RightFoot,
            3 => Self::LeftShoulder,
            4 => Self::RightShoulder,
            5 => Self::LeftElbow,
            6 => Self::RightElbow,
            7 => Self::LeftKnee,
            8 => Self::RightKnee,
            9 => Self::Waist,
            10 => Self::Chest,
            11 => Self::Camera,
            12 => Self::Keyboard,
            _ => return None,
        })
    }

    /// Runtime-facing role name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Handed => "vive_tracker_handed",
            Self::LeftFoot => "vive_tracker_left_foot",
            Self::RightFoot => "vive_tracker_right_foot",
            Self::LeftShoulder => "vive_tracker_left_shoulder",
            Self::RightShoulder => "vive_tracker_right_shoulder",
            Self::LeftElbow => "vive_tracker_left_elbow",
            Self::RightElbow => "vive_tracker_right_elbow",
            Self::LeftKnee => "vive_tracker_left_knee",
            Self::RightKnee => "vive_tracker_right_knee",
            Self::Waist => "vive_tracker_waist",
            Self::Chest => "vive_tracker_chest",
            Self::Camera => "vive_tracker_camera",
            Self::Keyboard => "vive_tracker_keyboard",
        }
    }
}

impl fmt::Display for TrackerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pose sample for one tracker.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PosePacket {
    pub orientation: Quaternion,
    pub position: Vector3,
    #[serde(default)]
    pub velocity: Option<Vector3>,
    #[serde(default)]
    pub angular_velocity: Option<Vector3>,
    /// Offset from receipt at which the pose applies (0 = now).
    #[serde(default)]
    pub millis_from_now: f64,
}

/// Auxiliary per-tracker data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataPacket {
    pub serial: String,
    #[serde(default)]
    pub role: TrackerRole,
    #[serde(default)]
    pub is_active: bool,
    /// Offset from receipt at which the data applies (0 = now).
    #[serde(default)]
    pub millis_from_now: f64,
}

/// Everything the companion app tells the server about a new tracker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackerDescriptor {
    pub serial: String,
    #[serde(default)]
    pub role: TrackerRole,
    /// Initial pose.
    #[serde(default)]
    pub pose: PosePacket,
    /// Initial data.
    #[serde(default)]
    pub data: DataPacket,
    /// Calibration offset applied by the consumer.
    #[serde(default)]
    pub position_offset: Vector3,
    #[serde(default)]
    pub orientation_offset: Quaternion,
}

impl TrackerDescriptor {
    /// Descriptor with the given serial and role, everything else default.
    pub fn new(serial: impl Into<String>, role: TrackerRole) -> Self {
        let serial = serial.into();
        Self {
            data: DataPacket {
                serial: serial.clone(),
                role,
                ..Default::default()
            },
            serial,
            role,
            ..Default::default()
        }
    }
}

impl ArchiveEncode for Vector3 {
    fn encode_archive(&self, writer: &mut ArchiveWriter) {
        writer.write_f64(self.x);
        writer.write_f64(self.y);
        writer.write_f64(self.z);
    }
}

impl ArchiveDecode for Vector3 {
    fn decode_archive(reader: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        Ok(Self {
            x: reader.read_f64()?,
            y: reader.read_f64()?,
            z: reader.read_f64()?,
        })
    }
}

impl ArchiveEncode for Quaternion {
    fn encode_archive(&self, writer: &mut ArchiveWriter) {
        writer.write_f64(self.w);
        writer.write_f64(self.x);
        writer.write_f64(self.y);
        writer.write_f64(self.z);
    }
}

impl ArchiveDecode for Quaternion {
    fn decode_archive(reader: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        Ok(Self {
            w: reader.read_f64()?,
            x: reader.read_f64()?,
            y: reader.read_f64()?,
            z: reader.read_f64()?,
        })
    }
}

impl ArchiveEncode for TrackerRole {
    fn encode_archive(&self, writer: &mut ArchiveWriter) {
        writer.write_i32(*self as i32);
    }
}

impl ArchiveDecode for TrackerRole {
    fn decode_archive(reader: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        let value = reader.read_i32()?;
        Self::from_i32(value).ok_or(ArchiveError::UnknownRole(value))
    }
}

impl ArchiveEncode for PosePacket {
    fn encode_archive(&self, writer: &mut ArchiveWriter) {
        writer.write(&self.orientation);
        writer.write(&self.position);
        writer.write_option(self.velocity.as_ref());
        writer.write_option(self.angular_velocity.as_ref());
        writer.write_f64(self.millis_from_now);
    }
}

impl ArchiveDecode for PosePacket {
    fn decode_archive(reader: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        Ok(Self {
            orientation: reader.read()?,
            position: reader.read()?,
            velocity: reader.read_option()?,
            angular_velocity: reader.read_option()?,
            millis_from_now: reader.read_f64()?,
        })
    }
}

impl ArchiveEncode for DataPacket {
    fn encode_archive(&self, writer: &mut ArchiveWriter) {
        writer.write_str(&self.serial);
        writer.write(&self.role);
        writer.write_bool(self.is_active);
        writer.write_f64(self.millis_from_now);
    }
}

impl ArchiveDecode for DataPacket {
    fn decode_archive(reader: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        Ok(Self {
            serial: reader.read_string()?,
            role: reader.read()?,
            is_active: reader.read_bool()?,
            millis_from_now: reader.read_f64()?,
        })
    }
}

impl ArchiveEncode for TrackerDescriptor {
    fn encode_archive(&self, writer: &mut ArchiveWriter) {
        writer.write_str(&self.serial);
        writer.write(&self.role);
        writer.write(&self.pose);
        writer.write(&self.data);
        writer.write(&self.position_offset);
        writer.write(&self.orientation_offset);
    }
}

impl ArchiveDecode for TrackerDescriptor {
    fn decode_archive(reader: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        Ok(Self {
            serial: reader.read_string()?,
            role: reader.read()?,
            pose: reader.read()?,
            data: reader.read()?,
            position_offset: reader.read()?,
            orientation_offset: reader.read()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::archive::{from_archive_str, to_archive_string};

    #[test]
    fn test_role_discriminants() {
        for value in 0..=12 {
            let role = TrackerRole::from_i32(value).unwrap();
            assert_eq!(role as i32, value);
        }
        assert_eq!(TrackerRole::from_i32(13), None);
        assert_eq!(TrackerRole::from_i32(-1), None);
        assert_eq!(TrackerRole::Waist.to_string(), "vive_tracker_waist");
    }

    #[test]
    fn test_pose_field_order() {
        let pose = PosePacket {
            orientation: Quaternion::new(1.0, 0.0, 0.5, 0.0),
            position: Vector3::new(0.1, 1.2, -0.3),
            velocity: None,
            angular_velocity: Some(Vector3::new(0.0, 2.0, 0.0)),
            millis_from_now: 0.0,
        };
        let text = to_archive_string(&pose);
        assert_eq!(
            text,
            "22 serialization::archive 19 1 0 0.5 0 0.1 1.2 -0.3 0 1 0 2 0 0"
        );
        assert_eq!(from_archive_str::<PosePacket>(&text).unwrap(), pose);
    }

    #[test]
    fn test_descriptor_archive() {
        let mut descriptor = TrackerDescriptor::new("K2 Waist/01", TrackerRole::Waist);
        descriptor.position_offset = Vector3::new(0.0, 0.05, 0.0);

        let text = to_archive_string(&descriptor);
        assert!(!text.contains('/'));

        let back: TrackerDescriptor = from_archive_str(&text).unwrap();
        assert_eq!(back, descriptor);
        assert_eq!(back.data.serial, "K2 Waist/01");
        assert_eq!(back.data.role, TrackerRole::Waist);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let err = from_archive_str::<DataPacket>("3 abc 42 1 0").unwrap_err();
        assert_eq!(err, ArchiveError::UnknownRole(42));
    }

    #[test]
    fn test_descriptor_json() {
        let descriptor: TrackerDescriptor =
            serde_json::from_str(r#"{"serial":"K2-LF","role":"left_foot"}"#).unwrap();
        assert_eq!(descriptor.role, TrackerRole::LeftFoot);
        assert_eq!(descriptor.orientation_offset, Quaternion::IDENTITY);
        assert_eq!(descriptor.pose.orientation, Quaternion::IDENTITY);
    }
}
