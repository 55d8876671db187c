use serde_json::json;
use voicedesk_db::migrations::MIGRATOR;

use crate::commands::{load_config, migrated_pool, runtime, CommandResult};

const COMMAND: &str = "migrate";

pub fn run() -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = match migrated_pool(COMMAND, &config).await {
            Ok(pool) => pool,
            Err(failure) => return failure,
        };
        pool.close().await;

        let latest = MIGRATOR.iter().map(|migration| migration.version).max();
        CommandResult::success_with_detail(
            COMMAND,
            "applied pending migrations",
            Some(json!({ "known_migrations": MIGRATOR.iter().count(), "latest_version": latest })),
        )
    })
}
