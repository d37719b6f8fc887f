use std::sync::Arc;

use async_trait::async_trait;
use codejudge_core::{CaseVerdict, ExecutionError, Result};
use codejudge_llm::{strip_code_fences, ChatModel};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::prompts::adjudication_prompt;

#[derive(Debug, Clone)]
pub struct AdjudicationRequest {
    pub problem_title: String,
    pub input_labels: Vec<String>,
    pub actual_outputs: Vec<String>,
}

impl AdjudicationRequest {
    pub fn case_count(&self) -> usize {
        self.input_labels.len()
    }

    /// Segment `index`, or "" when the program printed fewer results.
    pub fn actual_output(&self, index: usize) -> &str {
        self.actual_outputs
            .get(index)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Judges actual outputs against the problem when no expected output exists.
/// Transport failures are errors; an untrustworthy answer is not.
#[async_trait]
pub trait AdjudicationClient: Send + Sync {
    async fn adjudicate(&self, request: &AdjudicationRequest) -> Result<Vec<CaseVerdict>>;
}

pub struct LlmAdjudicator {
    model: Arc<dyn ChatModel>,
}

impl LlmAdjudicator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl AdjudicationClient for LlmAdjudicator {
    async fn adjudicate(&self, request: &AdjudicationRequest) -> Result<Vec<CaseVerdict>> {
        let system = adjudication_prompt(&request.problem_title, request.case_count());
        let user = json!({
            "inputs": request.input_labels,
            "actualOutputs": request.actual_outputs,
        })
        .to_string();

        info!(
            "ADJUDICATION: Judging {} cases with {}",
            request.case_count(),
            self.model.model_name()
        );

        let raw = self
            .model
            .complete_json(&system, &user)
            .await
            .map_err(|e| ExecutionError::AdjudicationUnavailable(e.to_string()))?;

        Ok(match parse_judgement(&raw) {
            Some(cases) => reconcile(cases, request),
            None => {
                warn!("ADJUDICATION: Response is not a verdict list, marking every case failed");
                fallback_verdicts(request)
            }
        })
    }
}

/// Keys a wrapped verdict list is looked up under, in order, before any
/// other array member is tried.
const LIST_KEYS: [&str; 2] = ["results", "cases"];

/// Accepts `{"results": [...]}`, a bare array, or an object wrapping the list
/// under some other key.
pub fn parse_judgement(raw: &str) -> Option<Vec<CaseVerdict>> {
    let body = strip_code_fences(raw);
    let value: Value = serde_json::from_str(&body).ok()?;

    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => {
            let named = LIST_KEYS
                .iter()
                .filter_map(|key| map.remove(*key))
                .find(Value::is_array);
            match named {
                Some(list) => list,
                None => map.into_iter().map(|(_, v)| v).find(Value::is_array)?,
            }
        }
        _ => return None,
    };

    serde_json::from_value(list).ok()
}

/// Every case failed with an unknown expectation, outputs kept by position.
pub fn fallback_verdicts(request: &AdjudicationRequest) -> Vec<CaseVerdict> {
    request
        .input_labels
        .iter()
        .enumerate()
        .map(|(i, label)| CaseVerdict::unjudged(label, request.actual_output(i)))
        .collect()
}

/// Keeps the judge's list only if it has one entry per requested label and
/// each entry echoes its label; otherwise the whole batch falls back.
pub fn reconcile(cases: Vec<CaseVerdict>, request: &AdjudicationRequest) -> Vec<CaseVerdict> {
    if cases.len() != request.case_count() {
        warn!(
            "ADJUDICATION: Judge returned {} verdicts for {} cases, marking every case failed",
            cases.len(),
            request.case_count()
        );
        return fallback_verdicts(request);
    }

    let misaligned = cases
        .iter()
        .zip(&request.input_labels)
        .position(|(case, label)| normalize(&case.input) != normalize(label));

    if let Some(index) = misaligned {
        warn!(
            "ADJUDICATION: Verdict {} does not echo its input, marking every case failed",
            index + 1
        );
        return fallback_verdicts(request);
    }

    cases
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
