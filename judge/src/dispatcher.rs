//! Execution dispatcher
//!
//! Sends one program + stdin to the sandbox and normalizes the nested
//! compile/run response into a flat `ExecutionResult`. A failure to reach
//! the sandbox is an error here, never a passing run.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::languages::Runtime;
use crate::sandbox::{ExecuteRequest, ExecuteResponse, Sandbox, SandboxError, SourceFile, StageOutput};

/// Exit code recorded for a stage that was killed without reporting one
pub const SIGNALED_EXIT_CODE: i32 = -1;

/// Flattened outcome of one sandbox call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub compile_exit_code: i32,
    pub compile_stdout: String,
    pub compile_stderr: String,
    pub run_exit_code: i32,
    pub run_stdout: String,
    pub run_stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_message: Option<String>,
}

impl ExecutionResult {
    pub fn from_response(response: ExecuteResponse) -> Self {
        let compile = response.compile.unwrap_or_default();
        let run = response.run.unwrap_or_default();

        Self {
            compile_exit_code: stage_exit_code(&compile),
            compile_stdout: compile.stdout.unwrap_or_default(),
            compile_stderr: compile.stderr.unwrap_or_default(),
            run_exit_code: stage_exit_code(&run),
            run_stdout: run.stdout.unwrap_or_default(),
            run_stderr: run.stderr.unwrap_or_default(),
            engine_message: response.message.filter(|m| !m.is_empty()),
        }
    }

    /// Both stages exited 0
    pub fn is_success(&self) -> bool {
        self.compile_exit_code == 0 && self.run_exit_code == 0
    }
}

/// Missing stages and missing codes count as success; a stage killed by a
/// signal without a code does not.
fn stage_exit_code(stage: &StageOutput) -> i32 {
    match (stage.code, &stage.signal) {
        (Some(code), _) => code,
        (None, Some(_)) => SIGNALED_EXIT_CODE,
        (None, None) => 0,
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("sandbox did not respond within {0:?}")]
    Timeout(Duration),

    #[error("dispatch cancelled")]
    Cancelled,
}

/// Dispatches programs to an injected sandbox
#[derive(Clone)]
pub struct Dispatcher {
    sandbox: Arc<dyn Sandbox>,
    timeout: Option<Duration>,
}

impl Dispatcher {
    /// Dispatcher that waits as long as the sandbox takes
    pub fn new(sandbox: Arc<dyn Sandbox>) -> Self {
        Self {
            sandbox,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn dispatch(
        &self,
        program: &str,
        stdin: &str,
        runtime: &Runtime,
    ) -> Result<ExecutionResult, DispatchError> {
        self.dispatch_with_cancel(program, stdin, runtime, &CancellationToken::new())
            .await
    }

    /// Dispatch once; resolves early with `Cancelled` when `cancel` fires
    pub async fn dispatch_with_cancel(
        &self,
        program: &str,
        stdin: &str,
        runtime: &Runtime,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, DispatchError> {
        let request = ExecuteRequest {
            language: runtime.language.clone(),
            version: runtime.version.clone(),
            files: vec![SourceFile {
                name: runtime.source_file.clone(),
                content: program.to_string(),
            }],
            stdin: stdin.to_string(),
        };

        let call = async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, self.sandbox.execute(&request)).await {
                    Ok(response) => response.map_err(DispatchError::from),
                    Err(_) => Err(DispatchError::Timeout(limit)),
                },
                None => self.sandbox.execute(&request).await.map_err(DispatchError::from),
            }
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
            response = call => response?,
        };

        let result = ExecutionResult::from_response(response);
        debug!(
            "Dispatched {} program: compile_exit={}, run_exit={}",
            runtime.language, result.compile_exit_code, result.run_exit_code
        );

        Ok(result)
    }
}
