//! Device detection and the role each device kind starts with.
//!
//! Device identity is advisory: a probe that fails, or reports nothing we
//! recognise, resolves to [`DeviceKind::Desktop`].

use std::fmt;

use crate::session::SessionRole;

/// Fixed participant roles within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Coordinator,
    Scanner,
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinator => f.write_str("coordinator"),
            Self::Scanner => f.write_str("scanner"),
            Self::Viewer => f.write_str("viewer"),
        }
    }
}

/// Kinds of device this software runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Scans the room and pushes geometry.
    HoloLens,
    Vive,
    /// Not detectable yet; a Kinect host reports as `Desktop`.
    Kinect,
    /// Prospective coordinator, settled when the room join resolves.
    Desktop,
}

impl DeviceKind {
    pub fn initial_role(self) -> SessionRole {
        match self {
            Self::HoloLens => SessionRole::Confirmed(Role::Scanner),
            Self::Vive | Self::Kinect => SessionRole::Confirmed(Role::Viewer),
            Self::Desktop => SessionRole::Provisional,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("capability probe failed: {0}")]
pub struct ProbeError(pub String);

/// Source of the host platform's declared device capabilities.
pub trait CapabilityProbe {
    fn supported_devices(&self) -> Result<Vec<String>, ProbeError>;
}

/// A fixed capability list, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe(pub Vec<String>);

impl CapabilityProbe for StaticProbe {
    fn supported_devices(&self) -> Result<Vec<String>, ProbeError> {
        Ok(self.0.clone())
    }
}

/// Determine the device kind. Runs once, before any networking.
pub fn detect_device(probe: &dyn CapabilityProbe) -> DeviceKind {
    let devices = match probe.supported_devices() {
        Ok(devices) => devices,
        Err(err) => {
            log::warn!("role: {}, assuming desktop", err);
            return DeviceKind::Desktop;
        }
    };
    let has = |name: &str| devices.iter().any(|d| d.trim().eq_ignore_ascii_case(name));
    let kind = if has("HoloLens") {
        DeviceKind::HoloLens
    } else if has("OpenVR") {
        DeviceKind::Vive
    } else {
        DeviceKind::Desktop
    };
    log::info!("role: detected {} from {:?}", kind, devices);
    kind
}

/// Resolve the role this process starts with.
pub fn resolve(probe: &dyn CapabilityProbe) -> (DeviceKind, SessionRole) {
    let kind = detect_device(probe);
    (kind, kind.initial_role())
}
