use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::language::Language;

pub const UNKNOWN_EXPECTED: &str = "Unknown";

/// One adjudicated test case. Field names follow the judge's output schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseVerdict {
    #[serde(deserialize_with = "json_text")]
    pub input: String,
    #[serde(default = "unknown_expected", deserialize_with = "json_text")]
    pub expected_output: String,
    #[serde(default, deserialize_with = "json_text")]
    pub actual_output: String,
    pub passed: bool,
}

fn unknown_expected() -> String {
    UNKNOWN_EXPECTED.to_string()
}

/// Judges sometimes answer `[0, 1]` or `6` instead of `"[0, 1]"` or `"6"`.
/// Any JSON value is kept as its compact text.
fn json_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl CaseVerdict {
    /// Verdict used when the judge's answer cannot be trusted.
    pub fn unjudged(input: &str, actual_output: &str) -> Self {
        Self {
            input: input.to_string(),
            expected_output: UNKNOWN_EXPECTED.to_string(),
            actual_output: actual_output.to_string(),
            passed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictStatus {
    Accepted,
    WrongAnswer,
}

impl VerdictStatus {
    pub fn label(&self) -> &'static str {
        match self {
            VerdictStatus::Accepted => "Accepted",
            VerdictStatus::WrongAnswer => "Wrong Answer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub passed_count: u32,
    pub total_count: u32,
    pub cases: Vec<CaseVerdict>,
}

/// Durable form of a graded submission.
#[derive(Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub identity: String,
    pub problem_id: String,
    pub language: Language,
    pub source_code: String,
    pub status: VerdictStatus,
    pub passed_count: u32,
    pub total_count: u32,
}

impl std::fmt::Debug for SubmissionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionRecord")
            .field("identity", &self.identity)
            .field("problem_id", &self.problem_id)
            .field("language", &self.language)
            .field("source_bytes", &self.source_code.len())
            .field("status", &self.status)
            .field("passed_count", &self.passed_count)
            .field("total_count", &self.total_count)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PersistenceOutcome {
    NotRequested,
    Stored,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeReport {
    pub verdict: Verdict,
    pub persistence: PersistenceOutcome,
}
