use northwind_core::config::{AppConfig, LoadOptions};
use northwind_core::domain::customer::CustomerFilter;
use northwind_db::{connect_with_settings, CustomerRepository, DbPool, SqlCustomerRepository};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: format!(
                    "configuration loaded and validated ({} environment)",
                    config.environment.as_str()
                ),
            });
            checks.push(check_tls_files(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            let reason = "skipped because configuration did not load";
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck::skipped("tls_files", reason));
            checks.push(DoctorCheck::skipped("database_connectivity", reason));
            checks.push(DoctorCheck::skipped("customer_schema", reason));
        }
    }

    let healthy = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if healthy { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if healthy {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_tls_files(config: &AppConfig) -> DoctorCheck {
    let Some(tls) = &config.server.tls else {
        if config.environment.is_development() {
            return DoctorCheck::skipped(
                "tls_files",
                "TLS is not configured; development serves plain HTTP",
            );
        }
        return DoctorCheck {
            name: "tls_files",
            status: CheckStatus::Fail,
            details: format!(
                "server.tls is required in the {} environment",
                config.environment.as_str()
            ),
        };
    };

    let missing = [&tls.cert_path, &tls.key_path]
        .into_iter()
        .filter(|path| !path.is_file())
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>();

    if missing.is_empty() {
        DoctorCheck {
            name: "tls_files",
            status: CheckStatus::Pass,
            details: format!(
                "certificate `{}` and key `{}` are readable",
                tls.cert_path.display(),
                tls.key_path.display()
            ),
        }
    } else {
        DoctorCheck {
            name: "tls_files",
            status: CheckStatus::Fail,
            details: format!("missing TLS files: {}", missing.join(", ")),
        }
    }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: format!("failed to initialize async runtime: {error}"),
                },
                DoctorCheck::skipped("customer_schema", "skipped because no runtime is available"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck {
                        name: "database_connectivity",
                        status: CheckStatus::Fail,
                        details: format!("failed to connect to database: {error}"),
                    },
                    DoctorCheck::skipped(
                        "customer_schema",
                        "skipped because the database is unreachable",
                    ),
                ];
            }
        };

        let connectivity = DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        };
        let schema = check_customer_schema(&pool).await;
        pool.close().await;
        vec![connectivity, schema]
    })
}

async fn check_customer_schema(pool: &DbPool) -> DoctorCheck {
    let repository = SqlCustomerRepository::new(pool.clone());
    match repository.list(&CustomerFilter::default()).await {
        Ok(customers) => DoctorCheck {
            name: "customer_schema",
            status: CheckStatus::Pass,
            details: format!("Customers table holds {} rows", customers.len()),
        },
        Err(error) => DoctorCheck {
            name: "customer_schema",
            status: CheckStatus::Fail,
            details: format!("Customers table is not usable ({error}); run `northwind migrate`"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
