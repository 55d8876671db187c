use serde_json::json;
use voicedesk_agent::{DefaultAgentReconciler, ReconcileOutcome, Repositories};
use voicedesk_core::modules::ModuleDocument;

use crate::commands::{load_config, migrated_pool, runtime, CommandResult};

const COMMAND: &str = "sync-default-agent";

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

        let document = ModuleDocument::new(config.modules.document_paths.clone());
        let source = document.locate();
        let reconciler = DefaultAgentReconciler::new(Repositories::sqlite(pool.clone()), document);
        let outcome = reconciler.ensure_default_agent().await;
        pool.close().await;

        match outcome {
            Ok(outcome) => CommandResult::success_with_detail(
                COMMAND,
                summary(&outcome),
                Some(json!({
                    "result": outcome,
                    "document": source.map(|path| path.display().to_string()),
                })),
            ),
            Err(error) => CommandResult::failure(COMMAND, "reconcile", error.to_string(), 6),
        }
    })
}

fn summary(outcome: &ReconcileOutcome) -> String {
    match outcome {
        ReconcileOutcome::Created => "default agent created".to_string(),
        ReconcileOutcome::Synced { changed } => {
            format!("default agent synced ({} field(s) changed)", changed.len())
        }
        ReconcileOutcome::Unchanged => "default agent already up to date".to_string(),
        ReconcileOutcome::SkippedNoTemplate => {
            "no agent template configured; default agent not created".to_string()
        }
    }
}
