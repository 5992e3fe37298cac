use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;

use roommesh_daemon::config::{DEFAULT_MESH_NAME, DEFAULT_ROOM, DEFAULT_TRANSFER_PORT};
use roommesh_daemon::{ConfigError, DaemonConfig, SyncSettings};

#[test]
fn empty_config_uses_defaults() {
    let config = DaemonConfig::from_toml("").expect("parse");
    assert_eq!(config, DaemonConfig::default());
    assert_eq!(config.room_name, DEFAULT_ROOM);
    assert_eq!(config.max_participants, 4);
    assert_eq!(config.transfer_port, DEFAULT_TRANSFER_PORT);
    assert_eq!(config.push_port(), DEFAULT_TRANSFER_PORT + 1);
    assert_eq!(config.mesh_name, DEFAULT_MESH_NAME);
    assert_eq!(config.fetch_timeout(), None);
}

#[test]
fn parses_full_config() {
    let config = DaemonConfig::from_toml(
        r#"
room_name = "lab"
max_participants = 6
transfer_port = 4000
push_port = 4100
bind_host = "127.0.0.1"
advertise_host = "10.0.0.7"
fetch_timeout_secs = 3
mesh_name = "LabMesh"
storage_dir = "/var/lib/roommesh"
capabilities = ["OpenVR"]
"#,
    )
    .expect("parse");

    let settings = SyncSettings::from_config(&config).expect("settings");
    assert_eq!(settings.room_name, "lab");
    assert_eq!(settings.room_options.max_participants, 6);
    assert_eq!(settings.transfer_addr, "127.0.0.1:4000".parse::<SocketAddr>().expect("addr"));
    assert_eq!(settings.push_addr, "127.0.0.1:4100".parse::<SocketAddr>().expect("addr"));
    assert_eq!(settings.advertise_host, "10.0.0.7");
    assert_eq!(settings.fetch_timeout, Some(Duration::from_secs(3)));
    assert_eq!(settings.mesh_name, "LabMesh");
    assert_eq!(config.capabilities, vec!["OpenVR".to_string()]);
}

#[test]
fn ephemeral_transfer_port_keeps_push_port_ephemeral() {
    let config = DaemonConfig::from_toml("transfer_port = 0").expect("parse");
    assert_eq!(config.push_port(), 0);
}

#[test]
fn rejects_invalid_values() {
    for input in ["room_name = \"  \"", "max_participants = 0", "bind_host = \"not-an-ip\""] {
        let err = DaemonConfig::from_toml(input).expect_err(input);
        assert!(matches!(err, ConfigError::Invalid { .. }), "{input}: {err}");
    }
    let err = DaemonConfig::from_toml("transfer_port = \"x\"").expect_err("type mismatch");
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn loads_from_path() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "room_name = \"from-file\"").expect("write");
    let config = DaemonConfig::from_path(file.path()).expect("load");
    assert_eq!(config.room_name, "from-file");

    let missing = file.path().with_extension("missing");
    assert!(matches!(DaemonConfig::from_path(&missing), Err(ConfigError::Read { .. })));
}
