use crate::commands::{load_config, runtime, CommandResult, StepFailure};
use northwind_db::{connect_with_settings, migrations, NorthwindSeed};

pub fn run(clean: bool) -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        if clean {
            NorthwindSeed::clean(&pool)
                .await
                .map_err(|error| ("seed_clean", error.to_string(), 5u8))?;
        }

        let seeded = NorthwindSeed::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = NorthwindSeed::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let outcome = if verification.all_present {
            Ok(seed_summary(&seeded.customer_ids, seeded.inserted))
        } else {
            Err(("seed_verification", verification_failure(&verification.checks), 6u8))
        };

        pool.close().await;
        outcome
    });

    match result {
        Ok(message) => CommandResult::success("seed", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seed_summary(customer_ids: &[&str], inserted: usize) -> String {
    format!(
        "seed customers present: {} ({inserted} newly inserted)",
        customer_ids.join(", ")
    )
}

fn verification_failure(checks: &[(&str, bool)]) -> String {
    let missing =
        checks.iter().filter_map(|(id, present)| (!present).then_some(*id)).collect::<Vec<_>>();
    if missing.is_empty() {
        "some seed customers failed to load".to_string()
    } else {
        format!("seed verification failed; missing customers: {}", missing.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::{seed_summary, verification_failure};

    #[test]
    fn verification_error_message_names_missing_customers() {
        let checks = [("ALFKI", true), ("ANATR", false), ("BERGS", false)];
        assert_eq!(
            verification_failure(&checks),
            "seed verification failed; missing customers: ANATR, BERGS"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_nothing_missing() {
        let checks = [("ALFKI", true), ("ANATR", true)];
        assert_eq!(verification_failure(&checks), "some seed customers failed to load");
    }

    #[test]
    fn summary_lists_ids_and_insert_count() {
        assert_eq!(
            seed_summary(&["ALFKI", "ANATR"], 0),
            "seed customers present: ALFKI, ANATR (0 newly inserted)"
        );
    }
}
