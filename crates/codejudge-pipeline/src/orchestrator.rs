use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use codejudge_core::{
    CodeJudgeConfig, ComposedProgram, ExecutionError, GradeReport, PersistenceOutcome, Result,
    RetryConfig, RuntimeTable, Stage, SubmissionRecord, SubmissionRequest, TimeoutConfig,
};
use codejudge_llm::build_chat_model;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::adjudication::{reconcile, AdjudicationClient, AdjudicationRequest, LlmAdjudicator};
use crate::aggregator::{aggregate, submission_record, VerdictSink};
use crate::retry::backoff_delay;
use crate::sandbox::{check_runtime, PistonClient, SandboxExecutionClient};
use crate::segmenter::segment;
use crate::synthesis::{CodeSynthesisClient, LlmSynthesizer, SynthesisRequest, SynthesizedDriver};

/// Runs one submission through synthesis, sandbox, segmentation,
/// adjudication and aggregation, then persists graded verdicts.
///
/// Holds only read-only configuration and shared clients, so one instance
/// serves any number of concurrent runs.
pub struct Orchestrator {
    synthesizer: Arc<dyn CodeSynthesisClient>,
    sandbox: Arc<dyn SandboxExecutionClient>,
    adjudicator: Arc<dyn AdjudicationClient>,
    sink: Option<Arc<dyn VerdictSink>>,
    runtimes: RuntimeTable,
    timeouts: TimeoutConfig,
    retry: RetryConfig,
}

impl Orchestrator {
    pub fn new(
        synthesizer: Arc<dyn CodeSynthesisClient>,
        sandbox: Arc<dyn SandboxExecutionClient>,
        adjudicator: Arc<dyn AdjudicationClient>,
        runtimes: RuntimeTable,
    ) -> Self {
        Self {
            synthesizer,
            sandbox,
            adjudicator,
            sink: None,
            runtimes,
            timeouts: TimeoutConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Wires the model-backed clients and the Piston sandbox from config.
    pub fn from_config(
        config: &CodeJudgeConfig,
        sink: Option<Arc<dyn VerdictSink>>,
    ) -> Result<Self> {
        config.validate()?;

        let synthesis_model = build_chat_model(&config.llm, &config.llm.synthesis_model)?;
        let adjudication_model = build_chat_model(&config.llm, &config.llm.adjudication_model)?;

        let orchestrator = Self::new(
            Arc::new(LlmSynthesizer::new(synthesis_model)),
            Arc::new(PistonClient::new(&config.sandbox.url)),
            Arc::new(LlmAdjudicator::new(adjudication_model)),
            config.runtimes.clone(),
        )
        .with_timeouts(config.timeouts.clone())
        .with_retry(config.retry.clone());

        Ok(match sink {
            Some(sink) => orchestrator.with_sink(sink),
            None => orchestrator,
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn VerdictSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn runtimes(&self) -> &RuntimeTable {
        &self.runtimes
    }

    pub async fn run(
        &self,
        request: &SubmissionRequest,
        cancel: &CancellationToken,
    ) -> Result<GradeReport> {
        request.validate()?;
        let runtime = self.runtimes.resolve(request.language)?;
        if request.mode.is_graded() && self.sink.is_none() {
            return Err(ExecutionError::Config("graded submissions need a verdict store".into()));
        }

        let case_count = request.mode.case_count();
        let start = Instant::now();
        info!(
            "ORCHESTRATOR: Starting {} run, {} on {} {}, {} cases, {} source bytes",
            request.mode.label(),
            request.problem_title,
            runtime.language,
            runtime.version,
            case_count,
            request.source_code.len()
        );

        // Synthesis
        let synthesizer = &self.synthesizer;
        let synthesis = SynthesisRequest::for_submission(request);
        let synthesis = &synthesis;
        let synthesize = move || async move {
            let raw = synthesizer.synthesize(synthesis).await?;
            SynthesizedDriver::parse(&raw, synthesis.language, synthesis.case_count)
        };
        let driver = self
            .call_stage(Stage::Synthesis, self.timeouts.synthesis(), cancel, synthesize)
            .await?;
        info!("SYNTHESIS: Driver ready ({} bytes)", driver.code.len());

        // Sandbox
        let program =
            ComposedProgram::compose(&request.source_code, &driver.code, request.language);
        let sandbox = &self.sandbox;
        let program = &program;
        let result = self
            .call_stage(Stage::Sandbox, self.timeouts.sandbox(), cancel, move || {
                sandbox.execute(runtime, program)
            })
            .await?;
        let result = check_runtime(result)?;

        // Segmentation
        let outputs = segment(&result.stdout);
        if outputs.len() != case_count {
            warn!("SEGMENTER: Got {} outputs for {} cases", outputs.len(), case_count);
        }

        // Adjudication
        let adjudicator = &self.adjudicator;
        let adjudication = AdjudicationRequest {
            problem_title: request.problem_title.clone(),
            input_labels: driver.labels,
            actual_outputs: outputs,
        };
        let adjudication = &adjudication;
        let cases = self
            .call_stage(
                Stage::Adjudication,
                self.timeouts.adjudication(),
                cancel,
                move || adjudicator.adjudicate(adjudication),
            )
            .await?;
        let cases = reconcile(cases, adjudication);

        // Aggregation
        let verdict = aggregate(cases);
        info!(
            "AGGREGATOR: {} ({}/{}) in {}ms",
            verdict.status.label(),
            verdict.passed_count,
            verdict.total_count,
            start.elapsed().as_millis()
        );

        // Persistence
        let persistence = match submission_record(request, &verdict) {
            None => PersistenceOutcome::NotRequested,
            Some(record) => {
                if cancel.is_cancelled() {
                    return Err(ExecutionError::Cancelled {
                        stage: Stage::Persistence,
                    });
                }
                match self.persist(&record).await {
                    Ok(()) => {
                        info!("PERSISTENCE: Stored verdict for problem {}", record.problem_id);
                        PersistenceOutcome::Stored
                    }
                    Err(e) => {
                        error!(
                            "PERSISTENCE: Verdict for problem {} not stored: {}",
                            record.problem_id, e
                        );
                        PersistenceOutcome::Failed {
                            message: e.to_string(),
                        }
                    }
                }
            }
        };

        Ok(GradeReport {
            verdict,
            persistence,
        })
    }

    /// One write, bounded by the persistence timeout. Not raced against
    /// cancellation: once started, a write either lands or fails.
    async fn persist(&self, record: &SubmissionRecord) -> Result<()> {
        let sink = self.sink.as_ref().ok_or_else(|| {
            ExecutionError::Config("graded submissions need a verdict store".into())
        })?;
        let limit = self.timeouts.persistence();

        tokio::time::timeout(limit, sink.persist(record))
            .await
            .map_err(|_| ExecutionError::Timeout {
                stage: Stage::Persistence,
                limit_ms: millis(limit),
            })?
    }

    /// Runs `call` under the stage timeout, racing cancellation, and retries
    /// retryable failures up to the configured limit.
    async fn call_stage<T, F, Fut>(
        &self,
        stage: Stage,
        limit: Duration,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u8 = 0;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExecutionError::Cancelled { stage }),
                timed = tokio::time::timeout(limit, call()) => match timed {
                    Ok(result) => result,
                    Err(_) => Err(ExecutionError::Timeout {
                        stage,
                        limit_ms: millis(limit),
                    }),
                },
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() || attempt >= self.retry.max_retries {
                warn!("{}: Failed: {}", stage_tag(stage), err);
                return Err(err);
            }

            attempt += 1;
            let delay = backoff_delay(&self.retry, attempt);
            warn!(
                "{}: Attempt {} failed ({}), retrying in {}ms",
                stage_tag(stage),
                attempt,
                err,
                delay.as_millis()
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExecutionError::Cancelled { stage }),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn stage_tag(stage: Stage) -> String {
    stage.as_str().to_uppercase()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
