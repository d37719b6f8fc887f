use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage an error or log line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Synthesis,
    Sandbox,
    Segmentation,
    Adjudication,
    Aggregation,
    Persistence,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::Synthesis => "synthesis",
            Stage::Sandbox => "sandbox",
            Stage::Segmentation => "segmentation",
            Stage::Adjudication => "adjudication",
            Stage::Aggregation => "aggregation",
            Stage::Persistence => "persistence",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages never include the candidate's source code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Driver synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Sandbox unreachable: {0}")]
    SandboxUnreachable(String),

    #[error("Submitted code failed at runtime: {stderr}")]
    UserCodeRuntimeError { stderr: String, exit_code: Option<i32> },

    #[error("Adjudication service unavailable: {0}")]
    AdjudicationUnavailable(String),

    #[error("{stage} timed out after {limit_ms}ms")]
    Timeout { stage: Stage, limit_ms: u64 },

    #[error("Cancelled during {stage}")]
    Cancelled { stage: Stage },

    #[error("Persistence failed: {0}")]
    Persistence(String),
}

impl ExecutionError {
    pub fn stage(&self) -> Stage {
        match self {
            ExecutionError::Config(_) | ExecutionError::InvalidRequest(_) => Stage::Validation,
            ExecutionError::SynthesisFailed(_) => Stage::Synthesis,
            ExecutionError::SandboxUnreachable(_) => Stage::Sandbox,
            ExecutionError::UserCodeRuntimeError { .. } => Stage::Sandbox,
            ExecutionError::AdjudicationUnavailable(_) => Stage::Adjudication,
            ExecutionError::Timeout { stage, .. } => *stage,
            ExecutionError::Cancelled { stage } => *stage,
            ExecutionError::Persistence(_) => Stage::Persistence,
        }
    }

    /// Transient failures of a third-party service. User code errors are
    /// deterministic and never qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecutionError::SynthesisFailed(_)
                | ExecutionError::SandboxUnreachable(_)
                | ExecutionError::AdjudicationUnavailable(_)
                | ExecutionError::Timeout { .. }
        )
    }

    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::Config(_) => "config_error",
            ExecutionError::InvalidRequest(_) => "invalid_request",
            ExecutionError::SynthesisFailed(_) => "synthesis_failed",
            ExecutionError::SandboxUnreachable(_) => "sandbox_unreachable",
            ExecutionError::UserCodeRuntimeError { .. } => "user_code_runtime_error",
            ExecutionError::AdjudicationUnavailable(_) => "adjudication_unavailable",
            ExecutionError::Timeout { .. } => "timeout",
            ExecutionError::Cancelled { .. } => "cancelled",
            ExecutionError::Persistence(_) => "persistence_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
