use crate::commands::{
    CommandResult, EXIT_CONFIG, EXIT_DATABASE, EXIT_INPUT, EXIT_MIGRATION, EXIT_RUNTIME,
};
use supportdesk_core::config::{AppConfig, LoadOptions};
use supportdesk_db::fixtures::CaseSeedInfo;
use supportdesk_db::{connect_with_config, migrations, DemoDataset};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

        let seed_result = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_MIGRATION))?;

        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_INPUT))?;

        let failed_checks = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();
        let run_result = if verification.all_present {
            Ok(seed_result.cases_seeded)
        } else {
            Err(("seed_verification", verification_failure_message(&failed_checks), EXIT_INPUT))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(cases) => CommandResult::success("seed", seed_summary(&cases)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seed_summary(cases: &[CaseSeedInfo]) -> String {
    let lines: Vec<String> = cases
        .iter()
        .map(|case| match &case.refund_case_id {
            Some(refund) => format!("  - {} + {refund}: {}", case.case_number, case.description),
            None => format!("  - {}: {}", case.case_number, case.description),
        })
        .collect();
    format!("demo dataset loaded with {} support cases:\n{}", cases.len(), lines.join("\n"))
}

fn verification_failure_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use supportdesk_db::fixtures::CaseSeedInfo;

    use super::{seed_summary, verification_failure_message};

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let message = verification_failure_message(&["comment-count", "refund-link"]);

        assert_eq!(message, "Seed verification failed for checks: comment-count, refund-link");
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_failure_message(&[]), "Some seed data failed to load");
    }

    #[test]
    fn summary_lists_refund_links() {
        let summary = seed_summary(&[
            CaseSeedInfo {
                case_number: "SC-1",
                refund_case_id: None,
                description: "question",
            },
            CaseSeedInfo {
                case_number: "SC-2",
                refund_case_id: Some("RC-2"),
                description: "pending refund",
            },
        ]);

        assert!(summary.starts_with("demo dataset loaded with 2 support cases"));
        assert!(summary.contains("  - SC-1: question"));
        assert!(summary.contains("  - SC-2 + RC-2: pending refund"));
    }
}
