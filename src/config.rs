use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::fields::{DEFAULT_FIELD_QUERY, DEFAULT_FIELD_SYSTEM};
use crate::generate::GenerationSettings;

pub const CONFIG_FILE_NAME: &str = ".astound.json";

/// How child fields of a node kind are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldDiscovery {
    /// Compiled table only; unknown kinds are an error.
    Static,
    /// Every kind goes through the cached oracle.
    Oracle,
    /// Compiled table, oracle for unknown kinds.
    #[default]
    Layered,
}

/// Prompt templates. `{kind}` is substituted where noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub field_system: String,
    /// Field-discovery question; `{kind}` is the node kind label.
    pub field_query: String,
    pub summary_system: String,
    pub individual_header: String,
    pub joint_header: String,
    /// Precedes each child summary in a joint prompt; `{kind}` is the child's kind.
    pub child_header: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            field_system: DEFAULT_FIELD_SYSTEM.to_string(),
            field_query: DEFAULT_FIELD_QUERY.to_string(),
            summary_system: "You explain Python code to a developer reading it for the first time. \
                             Be concise and concrete."
                .to_string(),
            individual_header: "Summarize what the following Python code does in a few sentences.\n\n".to_string(),
            joint_header: "Below is a summary of a piece of Python code, followed by summaries of the pieces \
                           it depends on. Combine them into one summary of what the code does, \
                           in a few sentences.\n\n"
                .to_string(),
            child_header: "\n\nSummary of a dependency ({kind}):\n".to_string(),
        }
    }
}

impl Prompts {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn child_header_for(&self, kind: &str) -> String {
        self.child_header.replace("{kind}", kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: String,
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Persistent field-discovery cache.
    pub field_cache: PathBuf,
    pub field_discovery: FieldDiscovery,
    pub field_query: GenerationSettings,
    pub summary: GenerationSettings,
    /// How far `split` descends below a non-rich node.
    pub split_depth: usize,
    /// Optional JSON file overriding `prompts`.
    pub prompts_path: Option<PathBuf>,
    pub prompts: Prompts,
}

fn default_field_cache() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".astound")
        .join("field_cache.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "claude-3-haiku-20240307".to_string(),
            api_base: "https://api.anthropic.com".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            field_cache: default_field_cache(),
            field_discovery: FieldDiscovery::default(),
            field_query: GenerationSettings::field_query(),
            summary: GenerationSettings::summary(),
            split_depth: 2,
            prompts_path: None,
            prompts: Prompts::default(),
        }
    }
}

impl Config {
    /// Apply `prompts_path`, keeping the inline prompts if the file is unusable.
    fn resolve_prompts(mut self, base: &Path) -> Self {
        let Some(path) = self.prompts_path.as_ref() else {
            return self;
        };
        let path = if path.is_absolute() {
            path.clone()
        } else {
            base.join(path)
        };
        match Prompts::load(&path) {
            Ok(prompts) => self.prompts = prompts,
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "ignoring prompts file"),
        }
        self
    }
}

/// Load `.astound.json` from `dir`; missing or malformed files yield defaults.
pub fn load_config(dir: &Path) -> Config {
    load_config_file(&dir.join(CONFIG_FILE_NAME))
}

pub fn load_config_file(path: &Path) -> Config {
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let text = std::fs::read_to_string(path);
    let Ok(text) = text else { return Config::default() };

    let cfg = serde_json::from_str::<Config>(&text).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "malformed config, using defaults");
        Config::default()
    });
    cfg.resolve_prompts(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(tmp.path());
        assert_eq!(cfg.split_depth, 2);
        assert_eq!(cfg.field_discovery, FieldDiscovery::Layered);
        assert_eq!(cfg.field_query.temperature, 0.0);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"{ "field_discovery": "static", "summary": { "max_tokens": 800 } }"#,
        )
        .unwrap();

        let cfg = load_config(tmp.path());
        assert_eq!(cfg.field_discovery, FieldDiscovery::Static);
        assert_eq!(cfg.summary.max_tokens, 800);
        assert_eq!(cfg.summary.temperature, 0.0);
        assert_eq!(cfg.model, Config::default().model);
    }

    #[test]
    fn prompts_file_is_resolved_relative_to_config() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("prompts.json"), r#"{ "individual_header": "Explain: " }"#).unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"{ "prompts_path": "prompts.json" }"#,
        )
        .unwrap();

        let cfg = load_config(tmp.path());
        assert_eq!(cfg.prompts.individual_header, "Explain: ");
        assert_eq!(cfg.prompts.joint_header, Prompts::default().joint_header);
    }

    #[test]
    fn child_header_names_the_kind() {
        let prompts = Prompts::default();
        assert!(prompts.child_header_for("FunctionDef").contains("FunctionDef"));
    }
}
