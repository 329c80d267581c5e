//! Configuration stored in `cardsmith.toml`.
//!
//! Secrets never live in this file. API keys and tokens are read from the
//! environment by the binary entry point and passed around as explicit
//! credential structs.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::evaluator::{EvaluatorSettings, RuleSet};
use crate::core::state::DEFAULT_MAX_RETRIES;
use crate::core::types::Category;
use crate::io::gemini::{self, GeminiCredentials};
use crate::io::trello::{self, TrelloCredentials};

pub const DEFAULT_CONFIG_PATH: &str = "cardsmith.toml";

/// Top-level configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values a
/// fresh `cardsmith init` writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Retries shared by drafting failures and rejections (attempts = retries + 1).
    pub max_retries: u32,

    /// Directory for run artifacts (`<state_dir>/runs/<run-id>/`).
    pub state_dir: PathBuf,

    /// Let the planner search the board for existing cards.
    pub search_enabled: bool,

    pub model: ModelConfig,
    pub evaluator: EvaluatorConfig,
    pub trello: TrelloConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Codex,
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    pub backend: BackendKind,

    /// Model name passed to the backend (backend default when unset).
    pub model: Option<String>,

    /// Gemini API base URL.
    pub api_base: String,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Truncate backend logs beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Search rounds the planner may take before it must return a plan.
    pub max_tool_calls: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub rule_set: RuleSet,
    pub min_description_chars: usize,
    pub min_id_chars: usize,
    pub allowed_categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrelloConfig {
    pub api_base: String,

    /// List that new cards are created in (see `cardsmith lists`).
    pub list_id: String,

    /// Restrict search to one board.
    pub board_id: Option<String>,

    pub search_limit: u32,

    /// Search results show at most this many description characters.
    pub description_preview_chars: usize,

    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            state_dir: PathBuf::from(".cardsmith"),
            search_enabled: true,
            model: ModelConfig::default(),
            evaluator: EvaluatorConfig::default(),
            trello: TrelloConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Gemini,
            model: None,
            api_base: gemini::DEFAULT_API_BASE.to_string(),
            timeout_secs: 120,
            output_limit_bytes: 100_000,
            max_tool_calls: 3,
        }
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        let settings = EvaluatorSettings::default();
        Self {
            rule_set: settings.rule_set,
            min_description_chars: settings.min_description_chars,
            min_id_chars: settings.min_id_chars,
            allowed_categories: settings.allowed_categories,
        }
    }
}

impl Default for TrelloConfig {
    fn default() -> Self {
        Self {
            api_base: trello::DEFAULT_API_BASE.to_string(),
            list_id: String::new(),
            board_id: None,
            search_limit: 5,
            description_preview_chars: 100,
            timeout_secs: 30,
        }
    }
}

impl EvaluatorConfig {
    pub fn settings(&self) -> EvaluatorSettings {
        EvaluatorSettings {
            rule_set: self.rule_set,
            min_description_chars: self.min_description_chars,
            min_id_chars: self.min_id_chars,
            allowed_categories: self.allowed_categories.clone(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.timeout_secs == 0 {
            return Err(anyhow!("model.timeout_secs must be > 0"));
        }
        if self.model.output_limit_bytes == 0 {
            return Err(anyhow!("model.output_limit_bytes must be > 0"));
        }
        if self.evaluator.min_description_chars == 0 || self.evaluator.min_id_chars == 0 {
            return Err(anyhow!("evaluator minimum lengths must be > 0"));
        }
        if self.evaluator.allowed_categories.is_empty() {
            return Err(anyhow!("evaluator.allowed_categories must not be empty"));
        }
        if !(1..=1000).contains(&self.trello.search_limit) {
            return Err(anyhow!("trello.search_limit must be between 1 and 1000"));
        }
        if self.trello.timeout_secs == 0 {
            return Err(anyhow!("trello.timeout_secs must be > 0"));
        }
        if self.search_enabled && !self.updates_enabled() {
            return Err(anyhow!(
                "evaluator.rule_set = \"description-length\" only creates cards; \
                 set search_enabled = false or use rule_set = \"existing-id\""
            ));
        }
        Ok(())
    }

    /// Drafts may target existing cards only under the existing-id rule set.
    pub fn updates_enabled(&self) -> bool {
        self.evaluator.rule_set == RuleSet::ExistingId
    }

    /// The list id is only needed once something is about to be committed.
    pub fn require_list_id(&self) -> Result<&str> {
        let list_id = self.trello.list_id.trim();
        if list_id.is_empty() {
            return Err(anyhow!(
                "trello.list_id is not set (run `cardsmith lists <board-id>` to find it)"
            ));
        }
        Ok(list_id)
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.state_dir.join("runs")
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AppConfig::default()`.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        let cfg = AppConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AppConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AppConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let tmp_path = path.with_extension("toml.tmp");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(&tmp_path, buf).with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

fn require_env(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("missing {name} (set it in the environment or .env)"))
}

pub fn trello_credentials_from_env() -> Result<TrelloCredentials> {
    Ok(TrelloCredentials {
        api_key: require_env("TRELLO_API_KEY")?,
        token: require_env("TRELLO_TOKEN")?,
    })
}

pub fn gemini_credentials_from_env() -> Result<GeminiCredentials> {
    let api_key = require_env("GEMINI_API_KEY").or_else(|_| require_env("GOOGLE_API_KEY"))?;
    Ok(GeminiCredentials { api_key })
}
