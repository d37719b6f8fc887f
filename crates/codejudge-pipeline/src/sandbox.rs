use std::time::Instant;

use async_trait::async_trait;
use codejudge_core::{ComposedProgram, ExecutionError, Result, Runtime, SandboxResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Longest stderr excerpt carried in a runtime error.
const MAX_STDERR_CHARS: usize = 2000;

/// Runs one composed program in an isolated environment.
#[async_trait]
pub trait SandboxExecutionClient: Send + Sync {
    async fn execute(&self, runtime: &Runtime, program: &ComposedProgram) -> Result<SandboxResult>;
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<SourceFile<'a>>,
}

#[derive(Debug, Serialize)]
struct SourceFile<'a> {
    name: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    run: Option<StageOutput>,
    compile: Option<StageOutput>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StageOutput {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    code: Option<i32>,
    signal: Option<String>,
}

/// Client for a Piston-compatible `/execute` endpoint.
pub struct PistonClient {
    client: Client,
    base_url: String,
}

impl PistonClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SandboxExecutionClient for PistonClient {
    async fn execute(&self, runtime: &Runtime, program: &ComposedProgram) -> Result<SandboxResult> {
        let url = format!("{}/execute", self.base_url);
        let request = ExecuteRequest {
            language: &runtime.language,
            version: &runtime.version,
            files: vec![SourceFile {
                name: program.language().file_name(),
                content: program.source(),
            }],
        };

        info!(
            "SANDBOX: Executing {} bytes on {} {}",
            program.len(),
            runtime.language,
            runtime.version
        );
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExecutionError::SandboxUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            return Err(ExecutionError::SandboxUnreachable(format!(
                "{} - {}",
                status, snippet
            )));
        }

        let body: ExecuteResponse = response
            .json()
            .await
            .map_err(|e| ExecutionError::SandboxUnreachable(format!("invalid response: {}", e)))?;

        let run = body.run.ok_or_else(|| {
            ExecutionError::SandboxUnreachable(
                body.message
                    .clone()
                    .unwrap_or_else(|| "response has no run result".into()),
            )
        })?;

        info!(
            "SANDBOX: Finished in {}ms, exit code {:?}",
            start.elapsed().as_millis(),
            run.code
        );

        Ok(merge_stages(body.compile, run))
    }
}

/// A failed build surfaces through stderr as a runtime error. Diagnostics
/// from a build that succeeded are only logged.
fn merge_stages(compile: Option<StageOutput>, run: StageOutput) -> SandboxResult {
    if let Some(compile) = compile {
        if compile.code.is_some_and(|c| c != 0) {
            let stderr = [compile.stderr.trim_end(), compile.stdout.trim_end()]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or("compilation failed")
                .to_string();
            return SandboxResult {
                stdout: String::new(),
                stderr,
                exit_code: compile.code,
                signal: compile.signal,
            };
        }
        if !compile.stderr.trim().is_empty() {
            debug!("SANDBOX: Compiler warnings: {}", compile.stderr.trim());
        }
    }

    SandboxResult {
        stdout: run.stdout,
        stderr: run.stderr,
        exit_code: run.code,
        signal: run.signal,
    }
}

/// Any stderr output, or termination by signal, means the candidate's code
/// failed and nothing downstream should run.
pub fn check_runtime(result: SandboxResult) -> Result<SandboxResult> {
    if !result.stderr.trim().is_empty() {
        warn!("SANDBOX: Program wrote to stderr (exit code {:?})", result.exit_code);
        return Err(ExecutionError::UserCodeRuntimeError {
            stderr: truncate(result.stderr.trim(), MAX_STDERR_CHARS),
            exit_code: result.exit_code,
        });
    }

    if let Some(signal) = result.signal.as_deref().filter(|s| !s.is_empty()) {
        warn!("SANDBOX: Program terminated by {}", signal);
        return Err(ExecutionError::UserCodeRuntimeError {
            stderr: format!("terminated by signal {}", signal),
            exit_code: result.exit_code,
        });
    }

    Ok(result)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
