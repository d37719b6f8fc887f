use codejudge_core::{GradeReport, Result, RuntimeTable, SubmissionRequest};
use codejudge_pipeline::{CancellationToken, Orchestrator};

pub struct AppState {
    orchestrator: Orchestrator,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, shutdown: CancellationToken) -> Self {
        Self {
            orchestrator,
            shutdown,
        }
    }

    pub fn runtimes(&self) -> &RuntimeTable {
        self.orchestrator.runtimes()
    }

    /// Each run gets a child of the shutdown token, cancelled as well when
    /// the request future is dropped.
    pub async fn grade(&self, request: &SubmissionRequest) -> Result<GradeReport> {
        let cancel = self.shutdown.child_token();
        let _guard = cancel.clone().drop_guard();
        self.orchestrator.run(request, &cancel).await
    }
}
