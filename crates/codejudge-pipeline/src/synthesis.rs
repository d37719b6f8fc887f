use std::sync::Arc;

use async_trait::async_trait;
use codejudge_core::{ExecutionError, Language, Result, SubmissionRequest};
use codejudge_llm::{strip_code_fences, ChatModel};
use tracing::{debug, info};

use crate::prompts::synthesis_prompt;

/// What the driver generator is told about a submission.
#[derive(Clone)]
pub struct SynthesisRequest {
    pub source_code: String,
    pub language: Language,
    pub problem_title: String,
    pub case_count: usize,
}

impl SynthesisRequest {
    pub fn for_submission(request: &SubmissionRequest) -> Self {
        Self {
            source_code: request.source_code.clone(),
            language: request.language,
            problem_title: request.problem_title.clone(),
            case_count: request.mode.case_count(),
        }
    }
}

impl std::fmt::Debug for SynthesisRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisRequest")
            .field("source_bytes", &self.source_code.len())
            .field("language", &self.language)
            .field("problem_title", &self.problem_title)
            .field("case_count", &self.case_count)
            .finish()
    }
}

/// Produces raw driver text for a submission. Parsing is done by
/// [`SynthesizedDriver::parse`] so every implementation is held to it.
#[async_trait]
pub trait CodeSynthesisClient: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String>;
}

pub struct LlmSynthesizer {
    model: Arc<dyn ChatModel>,
}

impl LlmSynthesizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl CodeSynthesisClient for LlmSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String> {
        let system = synthesis_prompt(request.language, &request.problem_title, request.case_count);
        info!(
            "SYNTHESIS: Requesting {} cases from {}",
            request.case_count,
            self.model.model_name()
        );

        self.model
            .complete(&system, &request.source_code)
            .await
            .map_err(|e| ExecutionError::SynthesisFailed(e.to_string()))
    }
}

/// Driver code plus one human-readable label per test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedDriver {
    pub code: String,
    pub labels: Vec<String>,
}

impl SynthesizedDriver {
    /// Strips fences and collects `CASE:` labels. Labels fall back to
    /// "Test case k" unless exactly `case_count` non-empty ones are found.
    pub fn parse(raw: &str, language: Language, case_count: usize) -> Result<Self> {
        let code = strip_code_fences(raw);
        if code.is_empty() {
            return Err(ExecutionError::SynthesisFailed(
                "model returned no driver code".into(),
            ));
        }

        let found = case_labels(&code, language);
        let labels = if found.len() == case_count {
            found
        } else {
            debug!(
                "SYNTHESIS: Found {} case labels, expected {}; using generic labels",
                found.len(),
                case_count
            );
            generic_labels(case_count)
        };

        Ok(Self { code, labels })
    }
}

fn case_labels(code: &str, language: Language) -> Vec<String> {
    let comment = language.line_comment();
    code.lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix(comment)?;
            let label = rest.trim().strip_prefix("CASE:")?.trim();
            (!label.is_empty()).then(|| label.to_string())
        })
        .collect()
}

pub fn generic_labels(case_count: usize) -> Vec<String> {
    (1..=case_count).map(|i| format!("Test case {}", i)).collect()
}
