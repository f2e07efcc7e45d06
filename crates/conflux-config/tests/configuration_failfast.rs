use std::ffi::OsString;
use std::fs;

use ortho_config::OrthoConfig;
use tempfile::TempDir;

use conflux_config::Config;

#[test]
fn malformed_config_file_fails_to_load() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = temp_dir.path().join("conflux.toml");
    fs::write(&path, "tick_interval_ms = not_a_number\n").expect("write malformed config");

    let args = vec![
        OsString::from("confluxd"),
        OsString::from("--config-path"),
        path.into_os_string(),
    ];

    let error = Config::load_from_iter(args).expect_err("loading must fail");
    assert!(
        !error.to_string().is_empty(),
        "expected a descriptive configuration error"
    );
}

#[test]
fn invalid_log_format_flag_fails_to_load() {
    let args = vec![
        OsString::from("confluxd"),
        OsString::from("--log-format"),
        OsString::from("xml"),
    ];

    Config::load_from_iter(args).expect_err("unknown log format must be rejected");
}
