//! Tests for `src/logging.rs`.

use wasapi_bridge::logging::LoggingGuard;

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn init_server_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("logs");
    assert!(!logs_dir.exists());

    // The global subscriber can only be installed once per process, so the
    // result is ignored; the directory is created before that step.
    let _result = wasapi_bridge::logging::init_server(&logs_dir);
    assert!(logs_dir.exists(), "logs directory should be created");
}

#[test]
fn init_cli_reports_an_already_installed_subscriber() {
    // The first call may already lose to another test in this binary; after
    // it a global subscriber is always installed.
    let _first = wasapi_bridge::logging::init_cli();
    let second = wasapi_bridge::logging::init_cli();
    let err = match second {
        Ok(()) => panic!("a second global subscriber must be rejected"),
        Err(err) => err,
    };
    assert!(err.to_string().contains("failed to install tracing subscriber"));
}

#[test]
fn server_log_prefix_names_the_bridge() {
    assert_eq!(wasapi_bridge::logging::LOG_FILE_PREFIX, "wasapi-bridge.log");
}
