use async_trait::async_trait;
use codejudge_core::{
    CaseVerdict, Mode, Result, SubmissionRecord, SubmissionRequest, Verdict, VerdictStatus,
};

/// Accepted only when at least one case ran and every case passed.
pub fn aggregate(cases: Vec<CaseVerdict>) -> Verdict {
    let total_count = cases.len() as u32;
    let passed_count = cases.iter().filter(|c| c.passed).count() as u32;

    let status = if total_count > 0 && passed_count == total_count {
        VerdictStatus::Accepted
    } else {
        VerdictStatus::WrongAnswer
    };

    Verdict {
        status,
        passed_count,
        total_count,
        cases,
    }
}

/// Record to persist for a graded run; `None` for trial runs.
pub fn submission_record(
    request: &SubmissionRequest,
    verdict: &Verdict,
) -> Option<SubmissionRecord> {
    match &request.mode {
        Mode::Trial => None,
        Mode::Graded {
            problem_id,
            identity,
        } => Some(SubmissionRecord {
            identity: identity.clone(),
            problem_id: problem_id.clone(),
            language: request.language,
            source_code: request.source_code.clone(),
            status: verdict.status,
            passed_count: verdict.passed_count,
            total_count: verdict.total_count,
        }),
    }
}

/// Durable destination for graded verdicts.
#[async_trait]
pub trait VerdictSink: Send + Sync {
    async fn persist(&self, record: &SubmissionRecord) -> Result<()>;
}
