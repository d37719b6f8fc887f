use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::language::RuntimeTable;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeJudgeConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub runtimes: RuntimeTable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub synthesis_model: String,
    pub adjudication_model: String,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            api_base: None,
            api_key: None,
            synthesis_model: "gpt-4o-mini".to_string(),
            adjudication_model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub url: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            url: "https://emkc.org/api/v2/piston".to_string(),
        }
    }
}

/// Per-stage upper bounds, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub synthesis_ms: u64,
    pub sandbox_ms: u64,
    pub adjudication_ms: u64,
    pub persistence_ms: u64,
}

impl TimeoutConfig {
    pub fn synthesis(&self) -> Duration {
        Duration::from_millis(self.synthesis_ms)
    }

    pub fn sandbox(&self) -> Duration {
        Duration::from_millis(self.sandbox_ms)
    }

    pub fn adjudication(&self) -> Duration {
        Duration::from_millis(self.adjudication_ms)
    }

    pub fn persistence(&self) -> Duration {
        Duration::from_millis(self.persistence_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            synthesis_ms: 45_000,
            sandbox_ms: 20_000,
            adjudication_ms: 45_000,
            persistence_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u8,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl RetryConfig {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "codejudge.db".to_string(),
        }
    }
}

impl CodeJudgeConfig {
    pub fn load(path: &Path) -> Result<Self, ExecutionError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExecutionError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ExecutionError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Optional JSON file from `CODEJUDGE_CONFIG`, then environment overrides.
    pub fn from_env() -> Result<Self, ExecutionError> {
        let mut config = match std::env::var("CODEJUDGE_CONFIG") {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ExecutionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = match provider.to_lowercase().as_str() {
                "openai" => LlmProvider::OpenAi,
                "ollama" => LlmProvider::Ollama,
                other => {
                    return Err(ExecutionError::Config(format!(
                        "unknown LLM_PROVIDER: {}",
                        other
                    )))
                }
            };
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(base) = lookup("LLM_API_BASE") {
            self.llm.api_base = Some(base);
        }
        if let Some(model) = lookup("SYNTHESIS_MODEL") {
            self.llm.synthesis_model = model;
        }
        if let Some(model) = lookup("ADJUDICATION_MODEL") {
            self.llm.adjudication_model = model;
        }
        if let Some(url) = lookup("SANDBOX_URL") {
            self.sandbox.url = url;
        }
        if let Some(path) = lookup("CODEJUDGE_DB") {
            self.store.db_path = path;
        }
        Ok(())
    }

    /// Runs once at startup, before any external call.
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.llm.provider == LlmProvider::OpenAi
            && self.llm.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(ExecutionError::Config(
                "OPENAI_API_KEY is not configured".into(),
            ));
        }
        if self.llm.provider == LlmProvider::Ollama && self.llm.api_base.is_none() {
            return Err(ExecutionError::Config(
                "LLM_API_BASE is required for the ollama provider".into(),
            ));
        }
        if self.sandbox.url.trim().is_empty() {
            return Err(ExecutionError::Config("sandbox url is empty".into()));
        }
        if self.runtimes.is_empty() {
            return Err(ExecutionError::Config("no runtimes configured".into()));
        }
        let t = &self.timeouts;
        if [t.synthesis_ms, t.sandbox_ms, t.adjudication_ms, t.persistence_ms]
            .contains(&0)
        {
            return Err(ExecutionError::Config("stage timeouts must be non-zero".into()));
        }
        Ok(())
    }
}
