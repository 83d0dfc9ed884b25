//! `run` and `run_sample` jobs: execution without a stored verdict

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::JobStatus;
use crate::dispatcher::ExecutionResult;
use crate::judger::{Judge, JudgeError};
use crate::models::ProblemRef;

#[derive(Debug, Serialize, Deserialize)]
pub struct RunJob {
    pub job_id: String,
    pub language: String,
    pub code: String,
    #[serde(default)]
    pub stdin: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunSampleJob {
    pub job_id: String,
    /// Numeric id or slug
    pub problem: String,
    pub language: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunJobResult {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RunJobResult {
    fn from_outcome(job_id: String, outcome: Result<ExecutionResult, JudgeError>) -> Self {
        match outcome {
            Ok(result) => {
                info!(
                    "Run job completed: job_id={}, compile_exit={}, run_exit={}",
                    job_id, result.compile_exit_code, result.run_exit_code
                );
                Self {
                    job_id,
                    status: JobStatus::Completed,
                    result: Some(result),
                    error_message: None,
                }
            }
            Err(e) => {
                error!("Failed to process run job {}: {}", job_id, e);
                Self {
                    job_id,
                    status: JobStatus::for_error(&e),
                    result: None,
                    error_message: Some(e.to_string()),
                }
            }
        }
    }
}

pub async fn process_run_job(judge: &Judge, job: RunJob) -> RunJobResult {
    let outcome = judge.run_raw(&job.language, &job.code, &job.stdin).await;
    RunJobResult::from_outcome(job.job_id, outcome)
}

pub async fn process_run_sample_job(judge: &Judge, job: RunSampleJob) -> RunJobResult {
    let problem = ProblemRef::parse(&job.problem);
    let outcome = judge.run_sample(&problem, &job.language, &job.code).await;
    RunJobResult::from_outcome(job.job_id, outcome)
}
