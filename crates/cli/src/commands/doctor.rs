use serde::Serialize;
use supportdesk_core::config::{AppConfig, LoadOptions};
use supportdesk_core::ActorRole;
use supportdesk_db::connect_with_config;
use supportdesk_gateway::{AuthContext, Gateways, ServiceClient};
use tokio::runtime::Runtime;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_DATABASE, EXIT_RUNTIME};

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
    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const SERVICE_CHECKS: [&str; 2] = ["support_service", "refund_service"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = exit_code_for(&report);

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => {
                    checks.push(check_database_connectivity(&runtime, &config));
                    let auth = AuthContext::from_config(&config, ActorRole::Agent);
                    match Gateways::from_config(&config, auth) {
                        Ok(gateways) => {
                            checks.push(check_service(
                                &runtime,
                                "support_service",
                                gateways.support.client(),
                            ));
                            checks.push(check_service(
                                &runtime,
                                "refund_service",
                                gateways.refund.client(),
                            ));
                        }
                        Err(error) => {
                            for name in SERVICE_CHECKS {
                                checks.push(DoctorCheck {
                                    name,
                                    status: CheckStatus::Fail,
                                    details: format!("could not build the service client: {error}"),
                                });
                            }
                        }
                    }
                }
                Err(error) => {
                    let reason = format!("the async runtime failed to start: {error}");
                    checks.push(DoctorCheck::skipped("database_connectivity", &reason));
                    for name in SERVICE_CHECKS {
                        checks.push(DoctorCheck::skipped(name, &reason));
                    }
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            let reason = "configuration did not load";
            checks.push(DoctorCheck::skipped("database_connectivity", reason));
            for name in SERVICE_CHECKS {
                checks.push(DoctorCheck::skipped(name, reason));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database_connectivity(runtime: &Runtime, config: &AppConfig) -> DoctorCheck {
    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn check_service(runtime: &Runtime, name: &'static str, client: &ServiceClient) -> DoctorCheck {
    let base_url = client.base_url();
    let result = runtime.block_on(client.health());

    match result {
        Ok(body) => {
            let status = body.get("status").and_then(|value| value.as_str()).unwrap_or("ok");
            DoctorCheck {
                name,
                status: CheckStatus::Pass,
                details: format!("`{base_url}/health` reported `{status}`"),
            }
        }
        Err(error) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("`{base_url}/health` failed: {error}"),
        },
    }
}

/// First failing check decides the exit code.
fn exit_code_for(report: &DoctorReport) -> u8 {
    let first_failure = report.checks.iter().find(|check| check.status == CheckStatus::Fail);
    match first_failure.map(|check| check.name) {
        None => 0,
        Some("config_validation") => EXIT_CONFIG,
        Some("database_connectivity") => EXIT_DATABASE,
        Some(_) => EXIT_RUNTIME,
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
