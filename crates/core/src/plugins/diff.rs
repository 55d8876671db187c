//! Three-way diff between an agent's stored plugin mappings and a submitted plugin list.
//!
//! Rows are matched by plugin id. A plugin present on both sides keeps its stored row id so
//! callers issue an update rather than a delete followed by an insert.

use std::collections::HashMap;

use crate::domain::agent::AgentId;
use crate::domain::plugin::{AgentPluginMapping, DesiredPlugin, PluginId, PluginMappingId};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PluginMappingDiff {
    /// Candidates without an id, in submission order.
    pub to_create: Vec<AgentPluginMapping>,
    /// Candidates carrying the id of the stored row they replace, in submission order.
    pub to_update: Vec<AgentPluginMapping>,
    /// Ids of stored rows whose plugin was not submitted.
    pub to_delete: Vec<PluginMappingId>,
}

impl PluginMappingDiff {
    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Computes the inserts, updates and deletes that turn `existing` into `desired`.
///
/// `existing` must hold at most one row per plugin id. When `desired` names the same plugin
/// more than once the last occurrence's params win and the candidate keeps the position of
/// the first occurrence.
pub fn diff_plugin_mappings(
    agent_id: &AgentId,
    existing: &[AgentPluginMapping],
    desired: &[DesiredPlugin],
) -> PluginMappingDiff {
    let stored: HashMap<&PluginId, Option<PluginMappingId>> =
        existing.iter().map(|row| (&row.plugin_id, row.id)).collect();

    let mut candidates: Vec<AgentPluginMapping> = Vec::with_capacity(desired.len());
    let mut position: HashMap<&PluginId, usize> = HashMap::with_capacity(desired.len());

    for item in desired {
        if let Some(&index) = position.get(&item.plugin_id) {
            candidates[index].param_info = item.params.clone();
            continue;
        }
        position.insert(&item.plugin_id, candidates.len());
        candidates.push(AgentPluginMapping {
            id: stored.get(&item.plugin_id).copied().flatten(),
            agent_id: agent_id.clone(),
            plugin_id: item.plugin_id.clone(),
            param_info: item.params.clone(),
        });
    }

    let (to_update, to_create): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(|candidate| candidate.id.is_some());

    let to_delete = existing
        .iter()
        .filter(|row| !position.contains_key(&row.plugin_id))
        .filter_map(|row| row.id)
        .collect();

    PluginMappingDiff { to_create, to_update, to_delete }
}
