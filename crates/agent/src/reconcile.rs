//! Keeps the system-owned default agent in line with the voice server's configuration.
//!
//! The first pass creates the agent from the default template; later passes only write the
//! fields whose resolved value changed, so a pass over unchanged configuration writes nothing.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use voicedesk_core::domain::agent::{
    AgentId, AgentPatch, AgentRecord, ChatHistoryMode, DEFAULT_AGENT_CODE, DEFAULT_AGENT_NAME,
};
use voicedesk_core::domain::model::{ModelCategory, ModelId};
use voicedesk_core::domain::template::AgentTemplate;
use voicedesk_core::modules::{ModuleDocument, ModuleSelection};
use voicedesk_core::plugins::PluginMappingDiff;
use voicedesk_db::repositories::AgentChangeSet;

use crate::context::Repositories;
use crate::errors::ReconcileError;
use crate::plugins::default_plugin_mappings;
use crate::resolver::ConfigResolver;

const CORRELATION_ID: &str = "system.init";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Created,
    Synced { changed: Vec<&'static str> },
    Unchanged,
    SkippedNoTemplate,
}

pub struct DefaultAgentReconciler {
    repos: Repositories,
    resolver: ConfigResolver,
    document: ModuleDocument,
}

impl DefaultAgentReconciler {
    pub fn new(repos: Repositories, document: ModuleDocument) -> Self {
        let resolver = ConfigResolver::new(repos.models.clone());
        Self { repos, resolver, document }
    }

    /// Creates the default agent when it is missing, otherwise syncs it with the document.
    pub async fn ensure_default_agent(&self) -> Result<ReconcileOutcome, ReconcileError> {
        let id = AgentId::default_agent();
        let existing = self.repos.agents.find_by_id(&id).await.map_err(ReconcileError::Load)?;
        let selection = self.document.load_module_selections();
        let prompt = self.document.load_prompt();

        match existing {
            None => self.create(id, &selection, prompt).await,
            Some(current) => self.sync(current, &selection, prompt).await,
        }
    }

    async fn create(
        &self,
        id: AgentId,
        selection: &ModuleSelection,
        prompt: Option<String>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let template =
            self.repos.templates.default_template().await.map_err(ReconcileError::Load)?;
        let Some(template) = template else {
            warn!(
                event_name = "system.init.default_agent_skipped",
                correlation_id = CORRELATION_ID,
                "no agent template available; default agent not created"
            );
            return Ok(ReconcileOutcome::SkippedNoTemplate);
        };

        let record = self.creation_record(id, &template, selection, prompt).await;
        let plugins =
            default_plugin_mappings(self.repos.plugin_providers.as_ref(), &record.id)
                .await
                .map_err(|source| ReconcileError::SeedPlugins {
                    agent_id: record.id.clone(),
                    source,
                })?;
        let seeded = plugins.len();
        let changes = AgentChangeSet::insert(record.clone())
            .with_plugins(PluginMappingDiff { to_create: plugins, ..PluginMappingDiff::default() });
        self.repos.agent_writes.commit(changes).await.map_err(ReconcileError::Persist)?;

        info!(
            event_name = "system.init.default_agent_created",
            correlation_id = CORRELATION_ID,
            agent_id = %record.id,
            llm_model_id = record.llm_model_id.as_ref().map(ModelId::as_str).unwrap_or("none"),
            mem_model_id = record.mem_model_id.as_ref().map(ModelId::as_str).unwrap_or("none"),
            plugins_seeded = seeded,
            "default agent created"
        );
        Ok(ReconcileOutcome::Created)
    }

    async fn creation_record(
        &self,
        id: AgentId,
        template: &AgentTemplate,
        selection: &ModuleSelection,
        prompt: Option<String>,
    ) -> AgentRecord {
        let mut resolved = AgentPatch::default();
        for category in ModelCategory::ALL {
            let fallback = template.model_id(category);
            let model_id = self.resolver.resolve_selection(selection, category, fallback).await;
            if let Some(model_id) = model_id {
                resolved.set_model_id(category, model_id);
            }
        }
        let chat_history_mode = ChatHistoryMode::for_memory(resolved.mem_model_id.as_ref());
        let now = Utc::now();

        AgentRecord {
            id,
            agent_code: Some(DEFAULT_AGENT_CODE.to_string()),
            agent_name: DEFAULT_AGENT_NAME.to_string(),
            owner: None,
            asr_model_id: resolved.asr_model_id,
            vad_model_id: resolved.vad_model_id,
            llm_model_id: resolved.llm_model_id,
            vllm_model_id: resolved.vllm_model_id,
            tts_model_id: resolved.tts_model_id,
            mem_model_id: resolved.mem_model_id,
            intent_model_id: resolved.intent_model_id,
            tts_voice_id: template.tts_voice_id.clone(),
            system_prompt: prompt.or_else(|| template.system_prompt.clone()),
            summary_memory: template.summary_memory.clone(),
            chat_history_mode: Some(chat_history_mode),
            lang_code: template.lang_code.clone(),
            language: template.language.clone(),
            sort: 0,
            creator: None,
            created_at: now,
            updater: None,
            updated_at: now,
        }
    }

    async fn sync(
        &self,
        current: AgentRecord,
        selection: &ModuleSelection,
        prompt: Option<String>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let patch = self.sync_patch(&current, selection, prompt).await;
        if patch.is_empty() {
            debug!(
                event_name = "system.init.default_agent_unchanged",
                correlation_id = CORRELATION_ID,
                agent_id = %current.id,
                "default agent already matches configuration"
            );
            return Ok(ReconcileOutcome::Unchanged);
        }

        let changed = patch.changed_fields();
        let mut next = patch.apply(&current);
        next.updated_at = Utc::now();
        self.repos.agents.update(next).await.map_err(ReconcileError::Persist)?;

        info!(
            event_name = "system.init.default_agent_synced",
            correlation_id = CORRELATION_ID,
            agent_id = %current.id,
            changed = ?changed,
            "default agent synced with configuration"
        );
        Ok(ReconcileOutcome::Synced { changed })
    }

    /// Fields of `current` that disagree with the resolved configuration.
    async fn sync_patch(
        &self,
        current: &AgentRecord,
        selection: &ModuleSelection,
        prompt: Option<String>,
    ) -> AgentPatch {
        let mut patch = AgentPatch::default();
        for category in ModelCategory::ALL {
            let persisted = current.model_id(category);
            let resolved = self.resolver.resolve_selection(selection, category, persisted).await;
            if let Some(model_id) = resolved.filter(|id| Some(id) != persisted) {
                patch.set_model_id(category, model_id);
            }
        }

        let memory = patch.mem_model_id.as_ref().or(current.mem_model_id.as_ref());
        let memory_disabled = memory.map(ModelId::is_no_memory).unwrap_or(false);
        match current.chat_history_mode {
            Some(mode) if memory_disabled && mode != ChatHistoryMode::None => {
                patch.chat_history_mode = Some(ChatHistoryMode::None);
            }
            None | Some(ChatHistoryMode::None) if !memory_disabled => {
                patch.chat_history_mode = Some(ChatHistoryMode::TextAndAudio);
            }
            _ => {}
        }

        if let Some(prompt) = prompt {
            if current.system_prompt.as_deref() != Some(prompt.as_str()) {
                patch.system_prompt = Some(prompt);
            }
        }
        patch
    }
}

/// Startup hook: runs one reconciliation pass and never fails the caller.
pub async fn initialize_default_agent(
    reconciler: &DefaultAgentReconciler,
) -> Option<ReconcileOutcome> {
    match reconciler.ensure_default_agent().await {
        Ok(outcome) => {
            info!(
                event_name = "system.init.default_agent_ready",
                correlation_id = CORRELATION_ID,
                outcome = ?outcome,
                "default agent reconciliation finished"
            );
            Some(outcome)
        }
        Err(reconcile_error) => {
            error!(
                event_name = "system.init.default_agent_failed",
                correlation_id = CORRELATION_ID,
                error = %reconcile_error,
                "default agent reconciliation failed; continuing startup"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;

    use tempfile::TempDir;

    use voicedesk_core::domain::agent::{AgentId, AgentRecord, ChatHistoryMode};
    use voicedesk_core::domain::model::ModelId;
    use voicedesk_core::modules::ModuleDocument;
    use voicedesk_db::fixtures::sample_template;
    use voicedesk_db::repositories::{AgentRepository, PluginMappingRepository};

    use super::{initialize_default_agent, DefaultAgentReconciler, ReconcileOutcome};
    use crate::context::testing::{FailingAgentWrites, Harness};
    use crate::errors::ReconcileError;

    struct Document {
        _dir: TempDir,
        path: PathBuf,
    }

    impl Document {
        fn new(yaml: &str) -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join(".config.yaml");
            fs::write(&path, yaml).expect("write document");
            Self { _dir: dir, path }
        }

        fn rewrite(&self, yaml: &str) {
            fs::write(&self.path, yaml).expect("rewrite document");
        }

        fn module_document(&self) -> ModuleDocument {
            ModuleDocument::new(vec![self.path.clone()])
        }
    }

    fn reconciler(harness: &Harness, document: &Document) -> DefaultAgentReconciler {
        DefaultAgentReconciler::new(harness.repos.clone(), document.module_document())
    }

    async fn default_agent(harness: &Harness) -> AgentRecord {
        harness
            .agents
            .find_by_id(&AgentId::default_agent())
            .await
            .expect("find")
            .expect("default agent exists")
    }

    #[tokio::test]
    async fn first_pass_creates_default_agent_from_document_and_template() {
        let harness = Harness::new();
        let document = Document::new(
            "selected_module:\n  LLM: ChatGLMLLM\n  Memory: nomem\n  TTS: CoquiTTS\nprompt: Be brief.\n",
        );

        let outcome = reconciler(&harness, &document).ensure_default_agent().await.expect("pass");

        let agent = default_agent(&harness).await;
        assert_eq!(outcome, ReconcileOutcome::Created);
        assert_eq!(agent.agent_code.as_deref(), Some("DEFAULT_AGENT"));
        assert_eq!(agent.owner, None);
        assert_eq!(agent.llm_model_id, Some(ModelId::new("LLM_ChatGLMLLM")));
        assert_eq!(agent.tts_model_id, Some(ModelId::new("TTS_CoquiTTS")));
        assert_eq!(agent.mem_model_id, Some(ModelId::new("Memory_nomem")));
        assert_eq!(agent.chat_history_mode, Some(ChatHistoryMode::None));
        assert_eq!(agent.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(agent.lang_code, sample_template().lang_code);
    }

    #[tokio::test]
    async fn creation_seeds_the_system_plugins() {
        let harness = Harness::new();
        let document = Document::new("selected_module: {}\n");

        reconciler(&harness, &document).ensure_default_agent().await.expect("pass");

        let plugins = harness
            .plugin_mappings
            .list_by_agent(&AgentId::default_agent())
            .await
            .expect("list");
        let ids: Vec<&str> = plugins.iter().map(|row| row.plugin_id.0.as_str()).collect();
        assert_eq!(
            ids,
            vec!["SYSTEM_PLUGIN_MUSIC", "SYSTEM_PLUGIN_WEATHER", "SYSTEM_PLUGIN_NEWS_NEWSNOW"]
        );
        assert_eq!(plugins[1].param_info.get("default_location"), Some(&serde_json::json!("Berlin")));
    }

    #[tokio::test]
    async fn memory_backed_creation_records_text_and_audio() {
        let harness = Harness::new();
        let document = Document::new("selected_module:\n  Memory: mem0ai\n");

        reconciler(&harness, &document).ensure_default_agent().await.expect("pass");

        let agent = default_agent(&harness).await;
        assert_eq!(agent.mem_model_id, Some(ModelId::new("Memory_mem0ai")));
        assert_eq!(agent.chat_history_mode, Some(ChatHistoryMode::TextAndAudio));
        assert_eq!(agent.system_prompt, sample_template().system_prompt);
    }

    #[tokio::test]
    async fn missing_document_falls_back_to_defaults_and_template() {
        let harness = Harness::new();
        let reconciler = DefaultAgentReconciler::new(
            harness.repos.clone(),
            ModuleDocument::new(vec![PathBuf::from("/nonexistent/voicedesk/.config.yaml")]),
        );

        reconciler.ensure_default_agent().await.expect("pass");

        let agent = default_agent(&harness).await;
        let template = sample_template();
        assert_eq!(agent.asr_model_id, template.asr_model_id);
        assert_eq!(agent.intent_model_id, template.intent_model_id);
        assert_eq!(agent.system_prompt, template.system_prompt);
    }

    #[tokio::test]
    async fn second_pass_with_unchanged_document_writes_nothing() {
        let harness = Harness::new();
        let document = Document::new("selected_module:\n  TTS: EdgeTTS\nprompt: Be brief.\n");
        let reconciler = reconciler(&harness, &document);

        reconciler.ensure_default_agent().await.expect("first pass");
        let writes_after_create = harness.agents.write_count();
        let outcome = reconciler.ensure_default_agent().await.expect("second pass");

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(harness.agents.write_count(), writes_after_create);
        assert_eq!(harness.plugin_mappings.batch_calls(), (1, 0, 0));
    }

    #[tokio::test]
    async fn sync_applies_only_changed_fields() {
        let harness = Harness::new();
        let document = Document::new("selected_module:\n  TTS: EdgeTTS\n  LLM: ChatGLMLLM\n");
        let reconciler = reconciler(&harness, &document);
        reconciler.ensure_default_agent().await.expect("create");
        let before = default_agent(&harness).await;

        document.rewrite("selected_module:\n  TTS: CoquiTTS\n  LLM: ChatGLMLLM\nprompt: New voice.\n");
        let outcome = reconciler.ensure_default_agent().await.expect("sync");

        let after = default_agent(&harness).await;
        assert_eq!(
            outcome,
            ReconcileOutcome::Synced { changed: vec!["tts_model_id", "system_prompt"] }
        );
        assert_eq!(after.tts_model_id, Some(ModelId::new("TTS_CoquiTTS")));
        assert_eq!(after.system_prompt.as_deref(), Some("New voice."));
        assert_eq!(after.llm_model_id, before.llm_model_id);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn switching_memory_updates_history_mode() {
        let harness = Harness::new();
        let document = Document::new("selected_module:\n  Memory: nomem\n");
        let reconciler = reconciler(&harness, &document);
        reconciler.ensure_default_agent().await.expect("create");

        document.rewrite("selected_module:\n  Memory: mem_local_short\n");
        let enabled = reconciler.ensure_default_agent().await.expect("enable memory");
        assert_eq!(
            enabled,
            ReconcileOutcome::Synced { changed: vec!["mem_model_id", "chat_history_mode"] }
        );
        assert_eq!(
            default_agent(&harness).await.chat_history_mode,
            Some(ChatHistoryMode::TextAndAudio)
        );

        document.rewrite("selected_module:\n  Memory: nomem\n");
        reconciler.ensure_default_agent().await.expect("disable memory");
        assert_eq!(default_agent(&harness).await.chat_history_mode, Some(ChatHistoryMode::None));
    }

    #[tokio::test]
    async fn text_only_history_survives_memory_backed_sync() {
        let harness = Harness::new();
        let document = Document::new("selected_module:\n  Memory: mem0ai\n");
        let reconciler = reconciler(&harness, &document);
        reconciler.ensure_default_agent().await.expect("create");
        let mut agent = default_agent(&harness).await;
        agent.chat_history_mode = Some(ChatHistoryMode::TextOnly);
        harness.agents.update(agent).await.expect("operator picks text only");

        let outcome = reconciler.ensure_default_agent().await.expect("sync");

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(default_agent(&harness).await.chat_history_mode, Some(ChatHistoryMode::TextOnly));
    }

    #[tokio::test]
    async fn unrecognised_history_code_is_left_alone_while_memory_is_on() {
        let harness = Harness::new();
        let document = Document::new("selected_module:\n  Memory: mem0ai\n");
        let reconciler = reconciler(&harness, &document);
        reconciler.ensure_default_agent().await.expect("create");
        let mut agent = default_agent(&harness).await;
        agent.chat_history_mode = Some(ChatHistoryMode::Other(3));
        harness.agents.update(agent).await.expect("store custom code");

        let outcome = reconciler.ensure_default_agent().await.expect("sync");

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(default_agent(&harness).await.chat_history_mode, Some(ChatHistoryMode::Other(3)));
    }

    #[tokio::test]
    async fn blank_prompt_never_overwrites() {
        let harness = Harness::new();
        let document = Document::new("selected_module: {}\nprompt: Keep me.\n");
        let reconciler = reconciler(&harness, &document);
        reconciler.ensure_default_agent().await.expect("create");

        document.rewrite("selected_module: {}\nprompt: '   '\n");
        let outcome = reconciler.ensure_default_agent().await.expect("sync");

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(default_agent(&harness).await.system_prompt.as_deref(), Some("Keep me."));
    }

    #[tokio::test]
    async fn unknown_module_keeps_persisted_value() {
        let harness = Harness::new();
        let document = Document::new("selected_module:\n  TTS: CoquiTTS\n");
        let reconciler = reconciler(&harness, &document);
        reconciler.ensure_default_agent().await.expect("create");

        document.rewrite("selected_module:\n  TTS: NotInstalledTTS\n");
        let outcome = reconciler.ensure_default_agent().await.expect("sync");

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(default_agent(&harness).await.tts_model_id, Some(ModelId::new("TTS_CoquiTTS")));
    }

    #[tokio::test]
    async fn no_template_skips_creation() {
        let harness = Harness::with_templates(Vec::new());
        let document = Document::new("selected_module: {}\n");

        let outcome = reconciler(&harness, &document).ensure_default_agent().await.expect("pass");

        assert_eq!(outcome, ReconcileOutcome::SkippedNoTemplate);
        assert_eq!(harness.agents.write_count(), 0);
    }

    #[tokio::test]
    async fn persistence_failure_is_reported_and_swallowed_at_startup() {
        let harness = Harness::new();
        let repos =
            harness.repos_with_agents(Arc::new(FailingAgentWrites::new(harness.agents.clone())));
        let document = Document::new("selected_module: {}\n");
        let reconciler = DefaultAgentReconciler::new(repos, document.module_document());

        let error = reconciler.ensure_default_agent().await.expect_err("insert fails");
        let startup = initialize_default_agent(&reconciler).await;

        assert!(matches!(error, ReconcileError::Persist(_)));
        assert!(startup.is_none());
        assert_eq!(harness.plugin_mappings.batch_calls(), (0, 0, 0));
    }

    #[tokio::test]
    async fn startup_hook_reports_outcome() {
        let harness = Harness::new();
        let document = Document::new("selected_module: {}\n");

        let outcome = initialize_default_agent(&reconciler(&harness, &document)).await;

        assert_eq!(outcome, Some(ReconcileOutcome::Created));
    }
}
