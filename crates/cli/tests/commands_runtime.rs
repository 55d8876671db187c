use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use voicedesk_cli::commands::{config, migrate, sync_default_agent};

#[test]
fn migrate_returns_success_with_valid_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());
    with_env(&[("VOICEDESK_DATABASE_URL", url.as_str())], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert!(payload["detail"]["known_migrations"].as_u64().unwrap_or_default() >= 2);
    });
}

#[test]
fn migrate_reports_config_failure_for_non_sqlite_url() {
    with_env(&[("VOICEDESK_DATABASE_URL", "postgres://elsewhere/db")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn sync_default_agent_creates_then_reports_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());
    let document = dir.path().join(".config.yaml");
    fs::write(&document, "selected_module:\n  TTS: CoquiTTS\nprompt: Keep answers short.\n")
        .expect("write document");
    let document = document.display().to_string();
    let vars = [
        ("VOICEDESK_DATABASE_URL", url.as_str()),
        ("VOICEDESK_DATABASE_MAX_CONNECTIONS", "1"),
        ("VOICEDESK_MODULES_DOCUMENT_PATHS", document.as_str()),
    ];

    with_env(&vars, || {
        let first = parse_payload(&sync_default_agent::run().output);
        assert_eq!(first["command"], "sync-default-agent");
        assert_eq!(first["status"], "ok");
        assert_eq!(first["detail"]["result"]["outcome"], "created");
        assert_eq!(first["detail"]["document"], document.as_str());

        let second = parse_payload(&sync_default_agent::run().output);
        assert_eq!(second["detail"]["result"]["outcome"], "unchanged");
    });
}

#[test]
fn sync_default_agent_without_document_uses_template_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());
    let missing = dir.path().join("missing.yaml").display().to_string();

    let vars =
        [("VOICEDESK_DATABASE_URL", url.as_str()), ("VOICEDESK_MODULES_DOCUMENT_PATHS", missing.as_str())];

    with_env(&vars, || {
        let result = sync_default_agent::run();
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["detail"]["result"]["outcome"], "created");
        assert_eq!(payload["detail"]["document"], Value::Null);
    });
}

#[test]
fn config_attributes_env_overrides() {
    with_env(&[("VOICEDESK_CACHE_BACKEND", "memory"), ("VOICEDESK_LOG_LEVEL", "debug")], || {
        let output = config::run();

        assert!(output.contains("- cache.backend = Memory (source: env (VOICEDESK_CACHE_BACKEND))"));
        assert!(output.contains("- logging.level = debug (source: env (VOICEDESK_LOG_LEVEL))"));
        assert!(output.contains("- server.health_check_port = 8002 (source: default)"));
    });
}

fn database_url(dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", dir.join("voicedesk.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "VOICEDESK_DATABASE_URL",
        "VOICEDESK_DATABASE_MAX_CONNECTIONS",
        "VOICEDESK_DATABASE_TIMEOUT_SECS",
        "VOICEDESK_CACHE_BACKEND",
        "VOICEDESK_CACHE_VERSION",
        "VOICEDESK_SERVER_BIND_ADDRESS",
        "VOICEDESK_SERVER_HEALTH_CHECK_PORT",
        "VOICEDESK_LOGGING_LEVEL",
        "VOICEDESK_LOGGING_FORMAT",
        "VOICEDESK_LOG_LEVEL",
        "VOICEDESK_LOG_FORMAT",
        "VOICEDESK_MODULES_DOCUMENT_PATHS",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
