use std::env;
use std::sync::{Mutex, OnceLock};

use northwind_cli::commands::{config, doctor, migrate, seed};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("NORTHWIND_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_override() {
    with_env(
        &[
            ("NORTHWIND_DATABASE_URL", "sqlite::memory:"),
            ("NORTHWIND_SERVER_HTTP_PORT", "not-a-port"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn seed_loads_sample_customers() {
    with_env(&[("NORTHWIND_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run(false);
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        assert_eq!(
            payload["message"],
            "seed customers present: ALFKI, ANATR, ANTON, AROUT, BERGS (5 newly inserted)"
        );
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("Northwind.db").display());

    with_env(&[("NORTHWIND_DATABASE_URL", &url)], || {
        let first = parse_payload(&seed::run(false).output);
        assert_eq!(first["status"], "ok");
        assert!(first["message"].as_str().unwrap_or_default().ends_with("(5 newly inserted)"));

        let second = parse_payload(&seed::run(false).output);
        assert_eq!(second["status"], "ok");
        assert!(second["message"].as_str().unwrap_or_default().ends_with("(0 newly inserted)"));
    });
}

#[test]
fn seed_clean_reinserts_sample_customers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("Northwind.db").display());

    with_env(&[("NORTHWIND_DATABASE_URL", &url)], || {
        assert_eq!(seed::run(false).exit_code, 0);

        let cleaned = seed::run(true);
        assert_eq!(cleaned.exit_code, 0, "expected seed --clean success");
        let payload = parse_payload(&cleaned.output);
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"].as_str().unwrap_or_default().ends_with("(5 newly inserted)"));
    });
}

#[test]
fn doctor_passes_against_migrated_database_without_tls_in_development() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("Northwind.db").display());

    with_env(&[("NORTHWIND_DATABASE_URL", &url), ("NORTHWIND_ENVIRONMENT", "development")], || {
        assert_eq!(migrate::run().exit_code, 0);

        let report = parse_payload(&doctor::run(true));
        assert_eq!(report["overall_status"], "pass");
        assert_eq!(check_status(&report, "config_validation"), "pass");
        assert_eq!(check_status(&report, "tls_files"), "skipped");
        assert_eq!(check_status(&report, "database_connectivity"), "pass");
        assert_eq!(check_status(&report, "customer_schema"), "pass");
    });
}

#[test]
fn doctor_flags_unmigrated_database_and_missing_tls_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cert = dir.path().join("cert.pem");
    let key = dir.path().join("key.pem");

    with_env(
        &[
            ("NORTHWIND_DATABASE_URL", "sqlite::memory:"),
            ("NORTHWIND_SERVER_TLS_CERT_PATH", cert.to_str().unwrap_or_default()),
            ("NORTHWIND_SERVER_TLS_KEY_PATH", key.to_str().unwrap_or_default()),
        ],
        || {
            let report = parse_payload(&doctor::run(true));
            assert_eq!(report["overall_status"], "fail");
            assert_eq!(check_status(&report, "tls_files"), "fail");
            assert_eq!(check_status(&report, "database_connectivity"), "pass");
            assert_eq!(check_status(&report, "customer_schema"), "fail");

            let human = doctor::run(false);
            assert!(human.starts_with("doctor: one or more readiness checks failed"));
            assert!(human.contains("- [fail] tls_files: missing TLS files:"));
        },
    );
}

#[test]
fn doctor_requires_tls_outside_development() {
    with_env(&[("NORTHWIND_DATABASE_URL", "sqlite::memory:")], || {
        let report = parse_payload(&doctor::run(true));
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(check_status(&report, "tls_files"), "fail");
    });
}

#[test]
fn config_attributes_env_sources() {
    with_env(
        &[
            ("NORTHWIND_DATABASE_URL", "sqlite::memory:"),
            ("NORTHWIND_FORMATTERS_PREFERRED_XML", "reflection"),
        ],
        || {
            let output = config::run();
            assert!(output.starts_with("effective config (source precedence: env > file > default):"));
            assert!(output.contains(
                "- database.url = sqlite::memory: (source: env (NORTHWIND_DATABASE_URL))"
            ));
            assert!(output.contains(
                "- formatters.preferred_xml = reflection (source: env (NORTHWIND_FORMATTERS_PREFERRED_XML))"
            ));
            assert!(output.contains("- server.http_port = 5000 (source: default)"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn check_status<'a>(report: &'a Value, name: &str) -> &'a str {
    report["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .and_then(|check| check["status"].as_str())
        .unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "NORTHWIND_ENVIRONMENT",
        "NORTHWIND_DATABASE_URL",
        "NORTHWIND_DATABASE_MAX_CONNECTIONS",
        "NORTHWIND_DATABASE_TIMEOUT_SECS",
        "NORTHWIND_SERVER_BIND_ADDRESS",
        "NORTHWIND_SERVER_HTTP_PORT",
        "NORTHWIND_SERVER_HTTPS_PORT",
        "NORTHWIND_SERVER_TLS_CERT_PATH",
        "NORTHWIND_SERVER_TLS_KEY_PATH",
        "NORTHWIND_CORS_ALLOWED_ORIGINS",
        "NORTHWIND_FORMATTERS_PREFERRED_XML",
        "NORTHWIND_LOGGING_LEVEL",
        "NORTHWIND_LOGGING_FORMAT",
        "NORTHWIND_LOG_LEVEL",
        "NORTHWIND_LOG_FORMAT",
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
