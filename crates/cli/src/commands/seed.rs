use chrono::Utc;
use serde_json::json;

use crate::commands::{execute, open_pool, CommandResult, GlobalArgs, EXIT_SEED_VERIFICATION};
use stressless_db::DemoSeed;

pub fn run(globals: &GlobalArgs) -> CommandResult {
    execute("seed", globals, |config| async move {
        let pool = open_pool(&config).await?;

        let seeded = DemoSeed::load(&pool, Utc::now())
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_SEED_VERIFICATION))?;
        let verification = DemoSeed::verify(&pool, &seeded)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_SEED_VERIFICATION))?;
        pool.close().await;

        if !verification.all_present {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            return Err(("seed_verification", verification_message(&failed_checks), EXIT_SEED_VERIFICATION));
        }

        let requests = seeded
            .requests
            .iter()
            .map(|request| {
                json!({
                    "id": request.id.0,
                    "status": request.status.as_str(),
                    "description": request.description,
                })
            })
            .collect::<Vec<_>>();
        Ok(CommandResult::success_with_data(
            "seed",
            format!("seeded {} demo stress requests", requests.len()),
            Some(json!({ "requests": requests })),
        ))
    })
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
