use serde::Deserialize;
use std::fs;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use roommesh_signal::RoomOptions;
use roommesh_transfer::local_ip_address;

pub const DEFAULT_ROOM: &str = "UWBMixedReality";
pub const DEFAULT_TRANSFER_PORT: u16 = 25827;
pub const DEFAULT_MESH_NAME: &str = "RoomMesh";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("couldn't read config {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub room_name: String,
    pub max_participants: u8,
    pub transfer_port: u16,
    pub push_port: Option<u16>,
    pub bind_host: String,
    /// Host put into announced endpoints; `"auto"` detects the outbound
    /// interface address.
    pub advertise_host: String,
    pub fetch_timeout_secs: Option<u64>,
    pub mesh_name: String,
    pub storage_dir: PathBuf,
    pub capabilities: Vec<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            room_name: DEFAULT_ROOM.to_string(),
            max_participants: 4,
            transfer_port: DEFAULT_TRANSFER_PORT,
            push_port: None,
            bind_host: "0.0.0.0".to_string(),
            advertise_host: "auto".to_string(),
            fetch_timeout_secs: None,
            mesh_name: DEFAULT_MESH_NAME.to_string(),
            storage_dir: PathBuf::from("."),
            capabilities: Vec::new(),
        }
    }
}

impl DaemonConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "room_name",
                message: "must not be empty".into(),
            });
        }
        if self.max_participants == 0 {
            return Err(ConfigError::Invalid {
                field: "max_participants",
                message: "must be at least 1".into(),
            });
        }
        if self.mesh_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "mesh_name",
                message: "must not be empty".into(),
            });
        }
        self.bind_ip()?;
        Ok(())
    }

    /// Port for the scanner's reverse-direction push server. Defaults to the
    /// port after `transfer_port` so it never collides with a coordinator
    /// on the same host; ephemeral when the transfer port is.
    pub fn push_port(&self) -> u16 {
        self.push_port.unwrap_or(match self.transfer_port {
            0 => 0,
            port => port.checked_add(1).unwrap_or(0),
        })
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn resolved_advertise_host(&self) -> String {
        if self.advertise_host.eq_ignore_ascii_case("auto") {
            local_ip_address()
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "127.0.0.1".to_string())
        } else {
            self.advertise_host.clone()
        }
    }

    fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.bind_host.parse().map_err(|_| ConfigError::Invalid {
            field: "bind_host",
            message: format!("'{}' is not an IP address", self.bind_host),
        })
    }
}

/// Everything the sync orchestrator needs, resolved from a [`DaemonConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub room_name: String,
    pub room_options: RoomOptions,
    pub transfer_addr: SocketAddr,
    pub push_addr: SocketAddr,
    pub advertise_host: String,
    pub fetch_timeout: Option<Duration>,
    pub mesh_name: String,
}

impl SyncSettings {
    pub fn from_config(config: &DaemonConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let ip = config.bind_ip()?;
        Ok(Self {
            room_name: config.room_name.clone(),
            room_options: RoomOptions { max_participants: config.max_participants },
            transfer_addr: SocketAddr::new(ip, config.transfer_port),
            push_addr: SocketAddr::new(ip, config.push_port()),
            advertise_host: config.resolved_advertise_host(),
            fetch_timeout: config.fetch_timeout(),
            mesh_name: config.mesh_name.clone(),
        })
    }

    /// Loopback settings with ephemeral ports, for in-process groups.
    pub fn loopback(room_name: &str) -> Self {
        let ip = IpAddr::from([127, 0, 0, 1]);
        Self {
            room_name: room_name.to_string(),
            room_options: RoomOptions::default(),
            transfer_addr: SocketAddr::new(ip, 0),
            push_addr: SocketAddr::new(ip, 0),
            advertise_host: ip.to_string(),
            fetch_timeout: None,
            mesh_name: DEFAULT_MESH_NAME.to_string(),
        }
    }
}
