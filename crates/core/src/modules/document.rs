//! Reads module selections and the default prompt from the voice server's YAML config.
//!
//! The document is optional. Every failure mode (no candidate file, unreadable file,
//! malformed YAML, missing keys) degrades to an empty selection or an absent prompt.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::{debug, warn};

use crate::domain::model::ModelCategory;

const SELECTED_MODULE_KEY: &str = "selected_module";
const PROMPT_KEY: &str = "prompt";

/// Candidate locations probed when nothing else is configured, highest priority first.
pub fn default_document_paths() -> Vec<PathBuf> {
    let cwd = std::env::current_dir().ok();
    let mut paths = Vec::with_capacity(10);
    for file in ["data/.config.yaml", "config.yaml"] {
        paths.push(PathBuf::from("../pingping-server").join(file));
        paths.push(PathBuf::from("../../pingping-server").join(file));
        paths.push(PathBuf::from("pingping-server").join(file));
        if let Some(cwd) = &cwd {
            paths.push(cwd.join("pingping-server").join(file));
            paths.push(cwd.join("../pingping-server").join(file));
        }
    }
    paths
}

/// First candidate that exists and is a regular file.
pub fn locate_document(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|path| path.is_file()).cloned()
}

/// Module name chosen per category by the configuration document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleSelection(BTreeMap<ModelCategory, String>);

impl ModuleSelection {
    pub fn get(&self, category: ModelCategory) -> Option<&str> {
        self.0.get(&category).map(String::as_str)
    }

    /// Selected module, or the platform default for the category.
    pub fn module_name(&self, category: ModelCategory) -> &str {
        self.get(category).unwrap_or_else(|| category.default_module())
    }

    pub fn insert(&mut self, category: ModelCategory, module_name: impl Into<String>) {
        self.0.insert(category, module_name.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(ModelCategory, String)> for ModuleSelection {
    fn from_iter<I: IntoIterator<Item = (ModelCategory, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Clone, Debug)]
pub struct ModuleDocument {
    candidates: Vec<PathBuf>,
}

impl Default for ModuleDocument {
    fn default() -> Self {
        Self::new(default_document_paths())
    }
}

impl ModuleDocument {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    pub fn locate(&self) -> Option<PathBuf> {
        locate_document(&self.candidates)
    }

    pub fn load_module_selections(&self) -> ModuleSelection {
        let Some((path, document)) = self.read() else {
            return ModuleSelection::default();
        };

        let Some(Value::Mapping(selected)) = document.get(SELECTED_MODULE_KEY) else {
            warn!(
                event_name = "modules.document.selected_module_missing",
                path = %path.display(),
                "config document has no selected_module mapping"
            );
            return ModuleSelection::default();
        };

        let selection: ModuleSelection = selected
            .iter()
            .filter_map(|(key, value)| {
                let category = key.as_str().and_then(ModelCategory::parse)?;
                scalar_to_string(value).map(|name| (category, name))
            })
            .collect();

        debug!(
            event_name = "modules.document.selections_loaded",
            path = %path.display(),
            count = selection.len(),
            "loaded module selections"
        );
        selection
    }

    pub fn load_prompt(&self) -> Option<String> {
        let (_, document) = self.read()?;
        document
            .get(PROMPT_KEY)
            .and_then(scalar_to_string)
            .filter(|prompt| !prompt.trim().is_empty())
    }

    fn read(&self) -> Option<(PathBuf, Value)> {
        let Some(path) = self.locate() else {
            warn!(
                event_name = "modules.document.not_found",
                candidates = self.candidates.len(),
                "no config document found, using defaults"
            );
            return None;
        };

        match parse_document(&path) {
            Ok(document) => Some((path, document)),
            Err(reason) => {
                warn!(
                    event_name = "modules.document.unreadable",
                    path = %path.display(),
                    error = %reason,
                    "config document could not be read, using defaults"
                );
                None
            }
        }
    }
}

fn parse_document(path: &Path) -> Result<Value, String> {
    let raw = fs::read_to_string(path).map_err(|error| error.to_string())?;
    serde_yaml::from_str::<Value>(&raw).map_err(|error| error.to_string())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::{locate_document, ModuleDocument, ModuleSelection};
    use crate::domain::model::ModelCategory;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, body).expect("write document");
        path
    }

    #[test]
    fn first_existing_regular_file_wins() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("missing.yaml");
        let directory = dir.path().join("data");
        fs::create_dir_all(&directory).expect("create dir");
        let second = write(&dir, "second.yaml", "prompt: two");
        let third = write(&dir, "third.yaml", "prompt: three");

        let found = locate_document(&[missing, directory, second.clone(), third]);

        assert_eq!(found, Some(second));
    }

    #[test]
    fn no_candidates_yield_empty_selection_and_no_prompt() {
        let dir = TempDir::new().expect("tempdir");
        let document = ModuleDocument::new(vec![dir.path().join("absent.yaml")]);

        assert!(document.load_module_selections().is_empty());
        assert_eq!(document.load_prompt(), None);
    }

    #[test]
    fn selections_are_read_from_selected_module() {
        let dir = TempDir::new().expect("tempdir");
        let path = write(
            &dir,
            "data/.config.yaml",
            r#"
selected_module:
  ASR: Whisper
  LLM: ChatGLMLLM
  Memory: nomem
  Intent: ~
  Plugin: ignored
  TTS: 42
prompt: |
  You are a friendly voice assistant.
"#,
        );
        let document = ModuleDocument::new(vec![path]);

        let selection = document.load_module_selections();

        assert_eq!(selection.get(ModelCategory::Asr), Some("Whisper"));
        assert_eq!(selection.get(ModelCategory::Llm), Some("ChatGLMLLM"));
        assert_eq!(selection.get(ModelCategory::Memory), Some("nomem"));
        assert_eq!(selection.get(ModelCategory::Tts), Some("42"));
        assert_eq!(selection.get(ModelCategory::Intent), None);
        assert_eq!(selection.len(), 4);
        assert_eq!(selection.module_name(ModelCategory::Vad), "SileroVAD");
        assert_eq!(
            document.load_prompt().as_deref(),
            Some("You are a friendly voice assistant.\n")
        );
    }

    #[test]
    fn malformed_document_degrades_to_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let path = write(&dir, "config.yaml", "selected_module: [unclosed\n  - : :");
        let document = ModuleDocument::new(vec![path]);

        assert_eq!(document.load_module_selections(), ModuleSelection::default());
        assert_eq!(document.load_prompt(), None);
    }

    #[test]
    fn blank_prompt_and_scalar_selected_module_are_absent() {
        let dir = TempDir::new().expect("tempdir");
        let path = write(&dir, "config.yaml", "selected_module: Whisper\nprompt: \"   \"\n");
        let document = ModuleDocument::new(vec![path]);

        assert!(document.load_module_selections().is_empty());
        assert_eq!(document.load_prompt(), None);
    }
}
