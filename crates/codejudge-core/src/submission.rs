use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::language::Language;

pub const TRIAL_CASE_COUNT: usize = 3;
pub const GRADED_CASE_COUNT: usize = 5;

/// Trial runs are never persisted; graded runs carry what the record needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Mode {
    Trial,
    Graded { problem_id: String, identity: String },
}

impl Mode {
    pub fn case_count(&self) -> usize {
        match self {
            Mode::Trial => TRIAL_CASE_COUNT,
            Mode::Graded { .. } => GRADED_CASE_COUNT,
        }
    }

    pub fn is_graded(&self) -> bool {
        matches!(self, Mode::Graded { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Trial => "trial",
            Mode::Graded { .. } => "graded",
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub source_code: String,
    pub language: Language,
    pub problem_title: String,
    pub mode: Mode,
}

impl SubmissionRequest {
    pub fn trial(source_code: &str, language: Language, problem_title: &str) -> Self {
        Self {
            source_code: source_code.to_string(),
            language,
            problem_title: problem_title.to_string(),
            mode: Mode::Trial,
        }
    }

    pub fn graded(
        source_code: &str,
        language: Language,
        problem_title: &str,
        problem_id: &str,
        identity: &str,
    ) -> Self {
        Self {
            source_code: source_code.to_string(),
            language,
            problem_title: problem_title.to_string(),
            mode: Mode::Graded {
                problem_id: problem_id.to_string(),
                identity: identity.to_string(),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.source_code.trim().is_empty() {
            return Err(ExecutionError::InvalidRequest("source code is empty".into()));
        }
        if self.problem_title.trim().is_empty() {
            return Err(ExecutionError::InvalidRequest("problem title is empty".into()));
        }
        if let Mode::Graded {
            problem_id,
            identity,
        } = &self.mode
        {
            if problem_id.trim().is_empty() {
                return Err(ExecutionError::InvalidRequest(
                    "graded submissions require a problem id".into(),
                ));
            }
            if identity.trim().is_empty() {
                return Err(ExecutionError::InvalidRequest(
                    "graded submissions require a submitter identity".into(),
                ));
            }
        }
        Ok(())
    }
}

// Source is elided so requests can be logged.
impl std::fmt::Debug for SubmissionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionRequest")
            .field("source_bytes", &self.source_code.len())
            .field("language", &self.language)
            .field("problem_title", &self.problem_title)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Candidate source plus synthesized driver, ready for the sandbox.
#[derive(Clone)]
pub struct ComposedProgram {
    language: Language,
    source: String,
}

impl ComposedProgram {
    pub fn compose(candidate: &str, driver: &str, language: Language) -> Self {
        let candidate = candidate.trim_end();
        let driver = driver.trim();
        let mut source =
            String::with_capacity(candidate.len() + driver.len() + 4);
        source.push_str(candidate);
        source.push_str(language.statement_separator());
        source.push_str(driver);
        source.push('\n');
        Self { language, source }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

impl std::fmt::Debug for ComposedProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedProgram")
            .field("language", &self.language)
            .field("bytes", &self.source.len())
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub signal: Option<String>,
}
