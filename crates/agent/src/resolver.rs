//! Maps module names chosen in the configuration document to model catalog ids.

use std::sync::Arc;

use tracing::{debug, warn};

use voicedesk_core::domain::model::{ModelCategory, ModelId};
use voicedesk_core::modules::ModuleSelection;
use voicedesk_db::repositories::ModelConfigRepository;

/// Memory modules with a well-known catalog id, used when the catalog has no match.
const KNOWN_MEMORY_MODULES: [(&str, &str); 3] = [
    ("nomem", "Memory_nomem"),
    ("mem_local_short", "Memory_mem_local_short"),
    ("mem0ai", "Memory_mem0ai"),
];

#[derive(Clone)]
pub struct ConfigResolver {
    catalog: Arc<dyn ModelConfigRepository>,
}

impl ConfigResolver {
    pub fn new(catalog: Arc<dyn ModelConfigRepository>) -> Self {
        Self { catalog }
    }

    /// Resolves `module_name` to a catalog id, first hit wins:
    ///
    /// 1. `{CATEGORY}_{module_name}` when that entry is enabled and of `category`;
    /// 2. the first enabled entry of `category` whose display name equals `module_name`;
    /// 3. `fallback`.
    ///
    /// Catalog failures are logged and count as a miss, so this never fails.
    pub async fn resolve_model_id(
        &self,
        category: ModelCategory,
        module_name: &str,
        fallback: Option<&ModelId>,
    ) -> Option<ModelId> {
        let module_name = module_name.trim();
        if module_name.is_empty() {
            return fallback.cloned();
        }

        if let Some(id) = self.by_convention(category, module_name).await {
            return Some(id);
        }
        if let Some(id) = self.by_display_name(category, module_name).await {
            return Some(id);
        }

        debug!(
            event_name = "modules.resolve.fallback",
            category = category.as_str(),
            module_name,
            fallback = fallback.map(ModelId::as_str).unwrap_or("none"),
            "no catalog match for module; using fallback"
        );
        fallback.cloned()
    }

    /// Like [`Self::resolve_model_id`], but memory modules missing from the catalog still map
    /// to their well-known ids.
    pub async fn resolve_memory_model_id(
        &self,
        module_name: &str,
        fallback: Option<&ModelId>,
    ) -> Option<ModelId> {
        let resolved = self.resolve_model_id(ModelCategory::Memory, module_name, fallback).await;
        if resolved.as_ref() != fallback {
            return resolved;
        }

        KNOWN_MEMORY_MODULES
            .iter()
            .find(|(name, _)| *name == module_name.trim())
            .map(|(_, id)| ModelId::new(*id))
            .or(resolved)
    }

    /// Resolves the document's choice for `category`, using the platform default name when the
    /// document is silent.
    pub async fn resolve_selection(
        &self,
        selection: &ModuleSelection,
        category: ModelCategory,
        fallback: Option<&ModelId>,
    ) -> Option<ModelId> {
        let module_name = selection.module_name(category);
        match category {
            ModelCategory::Memory => self.resolve_memory_model_id(module_name, fallback).await,
            _ => self.resolve_model_id(category, module_name, fallback).await,
        }
    }

    async fn by_convention(&self, category: ModelCategory, module_name: &str) -> Option<ModelId> {
        let candidate = category.conventional_id(module_name);
        match self.catalog.find_by_id(&candidate).await {
            Ok(Some(model)) if model.is_enabled && model.category == category => Some(model.id),
            Ok(_) => None,
            Err(error) => {
                warn!(
                    event_name = "modules.resolve.catalog_failed",
                    category = category.as_str(),
                    candidate = candidate.as_str(),
                    error = %error,
                    "catalog lookup failed; skipping conventional id"
                );
                None
            }
        }
    }

    async fn by_display_name(&self, category: ModelCategory, module_name: &str) -> Option<ModelId> {
        let codes = match self.catalog.list_codes(category, Some(module_name)).await {
            Ok(codes) => codes,
            Err(error) => {
                warn!(
                    event_name = "modules.resolve.catalog_failed",
                    category = category.as_str(),
                    module_name,
                    error = %error,
                    "catalog code list failed; skipping name match"
                );
                return None;
            }
        };

        for code in codes.into_iter().filter(|code| code.model_name == module_name) {
            match self.catalog.find_by_id(&code.id).await {
                Ok(Some(model)) if model.is_enabled => return Some(model.id),
                Ok(_) => continue,
                Err(error) => {
                    warn!(
                        event_name = "modules.resolve.catalog_failed",
                        category = category.as_str(),
                        candidate = code.id.as_str(),
                        error = %error,
                        "catalog lookup failed; skipping candidate"
                    );
                }
            }
        }
        None
    }
}
