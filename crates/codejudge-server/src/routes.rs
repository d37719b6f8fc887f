use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use codejudge_core::{GradeReport, Language, RuntimeTable, SubmissionRequest, Verdict};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Deserialize)]
pub struct RunBody {
    pub language: String,
    pub source_code: String,
    pub problem_title: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub language: String,
    pub source_code: String,
    pub problem_title: String,
    pub problem_id: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/runtimes", get(runtimes))
        .route("/api/run", post(run_trial))
        .route("/api/submit", post(submit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn runtimes(State(state): State<Arc<AppState>>) -> Json<RuntimeTable> {
    Json(state.runtimes().clone())
}

async fn run_trial(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<RunBody>,
) -> Result<Json<Verdict>, AppError> {
    let language: Language = body.language.parse()?;
    let request = SubmissionRequest::trial(&body.source_code, language, &body.problem_title);

    let report = state.grade(&request).await?;
    Ok(Json(report.verdict))
}

async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<SubmitBody>,
) -> Result<Json<GradeReport>, AppError> {
    let identity = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("missing {} header", USER_HEADER)))?;

    let language: Language = body.language.parse()?;
    let request = SubmissionRequest::graded(
        &body.source_code,
        language,
        &body.problem_title,
        &body.problem_id,
        identity,
    );

    let report = state.grade(&request).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use codejudge_core::{
        CaseVerdict, ComposedProgram, ExecutionError, Result, Runtime, SandboxResult,
        SubmissionRecord,
    };
    use codejudge_pipeline::{
        AdjudicationClient, AdjudicationRequest, CancellationToken, CodeSynthesisClient,
        Orchestrator, SandboxExecutionClient, SynthesisRequest, VerdictSink,
    };
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct EchoSynthesizer;

    #[async_trait]
    impl CodeSynthesisClient for EchoSynthesizer {
        async fn synthesize(&self, request: &SynthesisRequest) -> Result<String> {
            Ok(format!("print('{} cases')", request.case_count))
        }
    }

    struct ScriptedSandbox(Result<SandboxResult>);

    #[async_trait]
    impl SandboxExecutionClient for ScriptedSandbox {
        async fn execute(
            &self,
            _runtime: &Runtime,
            _program: &ComposedProgram,
        ) -> Result<SandboxResult> {
            self.0.clone()
        }
    }

    struct PassingJudge;

    #[async_trait]
    impl AdjudicationClient for PassingJudge {
        async fn adjudicate(&self, request: &AdjudicationRequest) -> Result<Vec<CaseVerdict>> {
            Ok(request
                .input_labels
                .iter()
                .enumerate()
                .map(|(i, label)| CaseVerdict {
                    input: label.clone(),
                    expected_output: request.actual_output(i).to_string(),
                    actual_output: request.actual_output(i).to_string(),
                    passed: true,
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct MemorySink(Mutex<Vec<SubmissionRecord>>);

    #[async_trait]
    impl VerdictSink for MemorySink {
        async fn persist(&self, record: &SubmissionRecord) -> Result<()> {
            self.0.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn app(sandbox: Result<SandboxResult>) -> (Router, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let orchestrator = Orchestrator::new(
            Arc::new(EchoSynthesizer),
            Arc::new(ScriptedSandbox(sandbox)),
            Arc::new(PassingJudge),
            RuntimeTable::default(),
        )
        .with_sink(sink.clone())
        .with_retry(codejudge_core::RetryConfig::none());
        let state = Arc::new(AppState::new(orchestrator, CancellationToken::new()));
        (router(state), sink)
    }

    fn printing(stdout: &str) -> Result<SandboxResult> {
        Ok(SandboxResult {
            stdout: stdout.into(),
            exit_code: Some(0),
            ..SandboxResult::default()
        })
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn post_json(uri: &str, body: Value, user: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header(USER_HEADER, user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(printing(""));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_runtimes_lists_table() {
        let (app, _) = app(printing(""));
        let (status, body) = send(
            app,
            Request::builder().uri("/api/runtimes").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["python"]["version"], "3.10.0");
        assert_eq!(body["java"]["language"], "java");
    }

    #[tokio::test]
    async fn test_trial_run_returns_verdict() {
        let (app, sink) = app(printing("1\n---SPLIT---\n2\n---SPLIT---\n3"));
        let (status, body) = send(
            app,
            post_json(
                "/api/run",
                json!({
                    "language": "py",
                    "source_code": "def f(x): return x",
                    "problem_title": "Identity"
                }),
                None,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Accepted");
        assert_eq!(body["total_count"], 3);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_requires_user_header() {
        let (app, _) = app(printing("1"));
        let (status, body) = send(
            app,
            post_json(
                "/api/submit",
                json!({
                    "language": "python",
                    "source_code": "x = 1",
                    "problem_title": "T",
                    "problem_id": "p1"
                }),
                None,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains(USER_HEADER));
    }

    #[tokio::test]
    async fn test_submit_persists_graded_report() {
        let (app, sink) = app(printing("1---SPLIT---2---SPLIT---3---SPLIT---4---SPLIT---5"));
        let (status, body) = send(
            app,
            post_json(
                "/api/submit",
                json!({
                    "language": "javascript",
                    "source_code": "const f = x => x",
                    "problem_title": "Identity",
                    "problem_id": "identity"
                }),
                Some("alice"),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verdict"]["passed_count"], 5);
        assert_eq!(body["persistence"]["state"], "stored");
        let records = sink.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identity, "alice");
    }

    #[tokio::test]
    async fn test_runtime_error_is_unprocessable() {
        let (app, _) = app(Ok(SandboxResult {
            stderr: "ZeroDivisionError: division by zero".into(),
            exit_code: Some(1),
            ..SandboxResult::default()
        }));
        let (status, body) = send(
            app,
            post_json(
                "/api/run",
                json!({"language": "python", "source_code": "1/0", "problem_title": "Crash"}),
                None,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["stage"], "sandbox");
        assert!(body["error"].as_str().unwrap().contains("ZeroDivisionError"));
    }

    #[tokio::test]
    async fn test_sandbox_outage_is_bad_gateway() {
        let (app, _) = app(Err(ExecutionError::SandboxUnreachable("connection refused".into())));
        let (status, body) = send(
            app,
            post_json(
                "/api/run",
                json!({"language": "python", "source_code": "x = 1", "problem_title": "T"}),
                None,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["stage"], "sandbox");
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let (app, _) = app(printing(""));
        let request = Request::builder()
            .method("POST")
            .uri("/api/run")
            .header("content-type", "application/json")
            .body(Body::from("{\"language\": \"python\""))
            .unwrap();
        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body["error"].as_str().unwrap().is_empty());
        assert!(body["stage"].is_null());
    }

    #[tokio::test]
    async fn test_missing_field_is_json_error() {
        let (app, _) = app(printing(""));
        let (status, body) = send(
            app,
            post_json("/api/run", json!({"language": "python"}), None),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("source_code"));
    }

    #[tokio::test]
    async fn test_unknown_language_is_bad_request() {
        let (app, _) = app(printing(""));
        let (status, body) = send(
            app,
            post_json(
                "/api/run",
                json!({"language": "cobol", "source_code": "DISPLAY 1", "problem_title": "T"}),
                None,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["stage"], "validation");
    }
}
