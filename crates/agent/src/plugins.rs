use tracing::{debug, warn};

use voicedesk_core::domain::agent::AgentId;
use voicedesk_core::domain::plugin::{AgentPluginMapping, PluginId, DEFAULT_PLUGIN_IDS};
use voicedesk_core::plugins::PluginMappingDiff;
use voicedesk_db::repositories::{PluginProviderRepository, RepositoryError};

/// Mappings for the system plugins every new agent starts with.
///
/// Plugins missing from the provider catalog are skipped; parameters come from each
/// provider's field schema defaults.
pub async fn default_plugin_mappings(
    providers: &dyn PluginProviderRepository,
    agent_id: &AgentId,
) -> Result<Vec<AgentPluginMapping>, RepositoryError> {
    let mut mappings = Vec::with_capacity(DEFAULT_PLUGIN_IDS.len());
    for plugin_id in DEFAULT_PLUGIN_IDS {
        let plugin_id = PluginId::new(plugin_id);
        let Some(provider) = providers.find_by_id(&plugin_id).await? else {
            warn!(
                event_name = "agent.plugins.default_missing",
                agent_id = %agent_id,
                plugin_id = %plugin_id.0,
                "default plugin is not in the provider catalog; skipping"
            );
            continue;
        };
        mappings.push(AgentPluginMapping {
            id: None,
            agent_id: agent_id.clone(),
            param_info: provider.default_params(),
            plugin_id,
        });
    }
    Ok(mappings)
}

/// Logs the partitions of a diff that was just committed.
pub fn log_applied_diff(agent_id: &AgentId, diff: &PluginMappingDiff) {
    debug!(
        event_name = "agent.plugins.reconciled",
        agent_id = %agent_id,
        created = diff.to_create.len(),
        updated = diff.to_update.len(),
        deleted = diff.to_delete.len(),
        "plugin mappings reconciled"
    );
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use voicedesk_core::domain::agent::AgentId;
    use voicedesk_core::domain::plugin::{PluginField, PluginId, PluginProvider};
    use voicedesk_db::repositories::InMemoryPluginProviderRepository;

    use super::default_plugin_mappings;

    fn provider(id: &str, fields: Vec<PluginField>) -> PluginProvider {
        PluginProvider {
            id: PluginId::new(id),
            provider_code: id.to_ascii_lowercase(),
            name: id.to_string(),
            fields,
            sort: 0,
        }
    }

    #[tokio::test]
    async fn defaults_skip_plugins_missing_from_catalog() {
        let weather_fields = vec![PluginField {
            key: Some("default_location".to_string()),
            label: None,
            field_type: Some("string".to_string()),
            default: json!("Berlin"),
        }];
        let providers = InMemoryPluginProviderRepository::with_providers([
            provider("SYSTEM_PLUGIN_MUSIC", Vec::new()),
            provider("SYSTEM_PLUGIN_WEATHER", weather_fields),
        ]);
        let agent = AgentId("a-1".to_string());

        let rows = default_plugin_mappings(&providers, &agent).await.expect("defaults");

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.id.is_none() && row.agent_id == agent));
        assert_eq!(rows[0].plugin_id.0, "SYSTEM_PLUGIN_MUSIC");
        assert!(rows[0].param_info.is_empty());
        assert_eq!(rows[1].param_info.get("default_location"), Some(&json!("Berlin")));
    }

    #[tokio::test]
    async fn empty_catalog_yields_no_defaults() {
        let providers = InMemoryPluginProviderRepository::default();

        let rows = default_plugin_mappings(&providers, &AgentId("a-1".to_string()))
            .await
            .expect("defaults");

        assert!(rows.is_empty());
    }
}
