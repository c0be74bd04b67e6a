use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use supportdesk_cli::commands::{doctor, migrate, seed};

const MEMORY_DB: (&str, &str) = ("SUPPORTDESK_DATABASE_URL", "sqlite::memory:");

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[MEMORY_DB], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_service_url() {
    with_env(&[MEMORY_DB, ("SUPPORTDESK_SUPPORT_SERVICE_URL", "ftp://support.internal")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or("").contains("services.support_url"));
    });
}

#[test]
fn production_without_auth_token_fails_config_validation() {
    with_env(&[MEMORY_DB, ("SUPPORTDESK_APP_ENV", "production")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn seed_returns_deterministic_case_summary() {
    with_env(&[MEMORY_DB], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected deterministic seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("  - SC-DEMO0001: Open question without a refund"));
        assert!(message.contains(
            "  - SC-DEMO0002 + RC-DEMO0002: Refund awaiting an agent decision, one product out of window"
        ));
        assert!(message.contains("  - SC-DEMO0003 + RC-DEMO0003: Closed case with a rejected refund"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("seed.db").display());

    with_env(&[("SUPPORTDESK_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        let first_payload = parse_payload(&first.output);
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[MEMORY_DB, ("SUPPORTDESK_LOGGING_LEVEL", "loud")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 2);

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(report["checks"][0]["name"], "config_validation");
        assert_eq!(report["checks"][0]["status"], "fail");
        assert_eq!(report["checks"][1]["status"], "skipped");
        assert_eq!(report["checks"][3]["status"], "skipped");
    });
}

#[test]
fn doctor_reports_unreachable_services() {
    with_env(
        &[
            MEMORY_DB,
            ("SUPPORTDESK_SUPPORT_SERVICE_URL", "http://127.0.0.1:9"),
            ("SUPPORTDESK_REFUND_SERVICE_URL", "http://127.0.0.1:9"),
            ("SUPPORTDESK_SERVICES_TIMEOUT_SECS", "1"),
        ],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 3);

            let report = parse_payload(&result.output);
            assert_eq!(report["checks"][1]["name"], "database_connectivity");
            assert_eq!(report["checks"][1]["status"], "pass");
            assert_eq!(report["checks"][2]["name"], "support_service");
            assert_eq!(report["checks"][2]["status"], "fail");
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SUPPORTDESK_APP_ENV",
        "SUPPORTDESK_DEFAULT_USER_ID",
        "SUPPORTDESK_SUPPORT_SERVICE_URL",
        "SUPPORTDESK_REFUND_SERVICE_URL",
        "SUPPORTDESK_SERVICES_TIMEOUT_SECS",
        "SUPPORTDESK_SERVICES_MAX_RETRIES",
        "SUPPORTDESK_SERVICES_RETRY_BASE_DELAY_MS",
        "SUPPORTDESK_AUTH_TOKEN",
        "SUPPORTDESK_DATABASE_URL",
        "SUPPORTDESK_DATABASE_MAX_CONNECTIONS",
        "SUPPORTDESK_DATABASE_TIMEOUT_SECS",
        "SUPPORTDESK_SERVER_BIND_ADDRESS",
        "SUPPORTDESK_SERVER_PORT",
        "SUPPORTDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "SUPPORTDESK_LOGGING_LEVEL",
        "SUPPORTDESK_LOGGING_FORMAT",
        "SUPPORTDESK_LOG_LEVEL",
        "SUPPORTDESK_LOG_FORMAT",
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
