pub mod config;
pub mod error;
pub mod language;
pub mod submission;
pub mod verdict;

pub use config::{
    CodeJudgeConfig, LlmConfig, LlmProvider, RetryConfig, SandboxConfig, StoreConfig,
    TimeoutConfig,
};
pub use error::{ExecutionError, Result, Stage};
pub use language::{Language, Runtime, RuntimeTable};
pub use submission::{
    ComposedProgram, Mode, SandboxResult, SubmissionRequest, GRADED_CASE_COUNT,
    TRIAL_CASE_COUNT,
};
pub use verdict::{
    CaseVerdict, GradeReport, PersistenceOutcome, SubmissionRecord, Verdict, VerdictStatus,
    UNKNOWN_EXPECTED,
};

/// Separates per-case results in driver stdout. The synthesis prompt and the
/// segmenter both use this exact byte sequence.
pub const CASE_DELIMITER: &str = "---SPLIT---";
