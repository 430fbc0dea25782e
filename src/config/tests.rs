use super::settings::{PartialPollerSettings, PartialSettings, Settings};
use super::{PollerSettings, load_config};
use serial_test::serial;
use std::env;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.poller.interval(), Duration::from_secs(5));
    assert_eq!(settings.poller.max_messages, 10);
    assert_eq!(settings.poller.wait_time(), Duration::from_secs(1));
    assert_eq!(settings.session.ping_interval(), Duration::from_secs(30));
    assert_eq!(settings.session.idle_timeout(), Duration::from_secs(60));
    assert_eq!(settings.logging.level, "info");
    assert_eq!(settings.demo.queues.len(), 3);
}

#[test]
fn test_partial_merge_keeps_defaults_for_missing_values() {
    let partial = PartialSettings {
        poller: Some(PartialPollerSettings {
            interval_secs: Some(2),
            ..Default::default()
        }),
        ..Default::default()
    };

    let merged = partial.merge(Settings::default());
    assert_eq!(merged.poller.interval_secs, 2);
    assert_eq!(merged.poller.max_messages, 10);
    assert_eq!(merged.server, Settings::default().server);
}

#[test]
fn test_batch_size_is_clamped() {
    let mut poller = PollerSettings {
        interval_secs: 5,
        max_messages: 0,
        wait_time_secs: 1,
    };
    assert_eq!(poller.batch_size(), 1);

    poller.max_messages = 250;
    assert_eq!(poller.batch_size(), PollerSettings::MAX_BATCH);

    poller.max_messages = 4;
    assert_eq!(poller.batch_size(), 4);
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    // load_config reads config/default.toml relative to the working directory.
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [poller]
        interval_secs = 2
        max_messages = 5

        [session]
        idle_timeout_secs = 90

        [demo]
        queues = ["billing"]
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();
    env::set_current_dir(orig).expect("restore cwd");
    let cfg = cfg.expect("load_config failed");

    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.poller.interval_secs, 2);
    assert_eq!(cfg.poller.max_messages, 5);
    assert_eq!(cfg.poller.wait_time_secs, 1);
    assert_eq!(cfg.session.idle_timeout_secs, 90);
    assert_eq!(cfg.session.ping_interval_secs, 30);
    assert_eq!(cfg.demo.queues, vec!["billing".to_string()]);
}

#[test]
#[serial]
fn load_config_from_environment() {
    temp_env::with_vars(
        [
            ("QUEUESCOPE_SERVER__PORT", Some("9100")),
            ("QUEUESCOPE_POLLER__WAIT_TIME_SECS", Some("3")),
            ("QUEUESCOPE_LOGGING__LEVEL", Some("debug")),
            ("QUEUESCOPE_DEMO__QUEUES", Some("alpha,beta")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 9100);
            assert_eq!(cfg.poller.wait_time_secs, 3);
            assert_eq!(cfg.logging.level, "debug");
            assert_eq!(
                cfg.demo.queues,
                vec!["alpha".to_string(), "beta".to_string()]
            );
            assert_eq!(cfg.server.host, "127.0.0.1");
        },
    );
}
