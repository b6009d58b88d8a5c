//! Loading configuration files from disk.

use std::io::Write;
use std::time::Duration;

use systa_probe::config::Config;
use systa_probe::protocol::{FrameHeader, OffsetPair};

#[test]
fn test_load_file_with_offsets() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[discovery]
timeout = "3s"

[session]
port = 22460
skip_count = 2

[probe]
max_trials = 512

[[offsets]]
packet_type = 0x02
subtype = 0x0B
mac = 0x4AB0
counter = 0x10F9

[[offsets]]
packet_type = 0x02
subtype = 0x0C
mac = 0x5AB0
counter = 0x10F9
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.discovery.timeout, Duration::from_secs(3));
    assert_eq!(config.session.skip_count, 2);
    assert_eq!(config.probe.max_trials, Some(512));

    let engine = config.checksum_engine();
    assert_eq!(engine.table().len(), 2);

    let header = FrameHeader {
        device_id: 0x0201,
        counter: 7,
        packet_type: 0x02,
        subtype: Some(0x0C),
        parameter: Some(3),
    };
    assert_eq!(
        engine.table().lookup(&header),
        Some(OffsetPair::new(0x5AB3, 0x10F9))
    );
}

#[test]
fn test_invalid_file_is_configuration_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[session]\nreceive_timeout = \"0s\"").unwrap();
    let err = Config::load(file.path()).unwrap_err();
    assert!(err.is_configuration());

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[session\nport = 1").unwrap();
    assert!(Config::load(file.path()).unwrap_err().is_configuration());
}

#[test]
fn test_example_written_and_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, Config::example().to_toml().unwrap()).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.offsets, Config::example().offsets);
    assert_eq!(config.probe.seed, Some(1));
}
