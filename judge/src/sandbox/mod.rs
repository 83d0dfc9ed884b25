//! Sandbox module - Remote execution service wrapper
//!
//! This module provides a minimal abstraction over the external sandbox.
//! It handles:
//! - The execute request/response wire format
//! - The `Sandbox` trait the dispatcher is written against
//! - The Piston HTTP client
//!
//! The sandbox module does NOT:
//! - Interpret exit codes or verdicts (that's the dispatcher's and judge's job)
//! - Know about problems or test cases
//! - Retry failed calls

pub mod piston;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use piston::PistonClient;

/// Version selector accepted by every runtime
pub const ANY_VERSION: &str = "*";

/// A single source file sent for execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
}

/// Request body for the sandbox `execute` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub language: String,
    pub version: String,
    pub files: Vec<SourceFile>,
    pub stdin: String,
}

/// Output of one compile or run stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub signal: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
}

/// Response body of the sandbox `execute` call.
///
/// Interpreted languages usually come back without a `compile` stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub compile: Option<StageOutput>,
    #[serde(default)]
    pub run: Option<StageOutput>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Failures talking to the sandbox service itself
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox unreachable: {message}")]
    Transport { message: String },

    #[error("sandbox returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid sandbox response: {message}")]
    InvalidResponse { message: String },
}

/// Remote executor of untrusted programs
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Compile (if needed) and run the request's program once
    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResponse, SandboxError>;
}
