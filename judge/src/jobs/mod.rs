//! Worker jobs read from the Redis queue
//!
//! Every job produces exactly one result carrying an explicit `status`;
//! rejections and failures are reported through `error_message`.

pub mod judge;
pub mod run;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::judger::{Judge, JudgeError};
use crate::jobs::judge::{process_judge_job, JudgeJob, JudgeJobResult};
use crate::jobs::run::{process_run_job, process_run_sample_job, RunJob, RunJobResult, RunSampleJob};

/// Worker job enum - represents different types of jobs the worker can process
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "job_type")]
pub enum WorkerJob {
    /// Judge a submission against all test cases and store it
    #[serde(rename = "judge")]
    Judge(JudgeJob),
    /// Execute code as-is with the given stdin
    #[serde(rename = "run")]
    Run(RunJob),
    /// Execute the harnessed code against a problem's first test case
    #[serde(rename = "run_sample")]
    RunSample(RunSampleJob),
}

impl WorkerJob {
    pub fn job_id(&self) -> &str {
        match self {
            WorkerJob::Judge(job) => &job.job_id,
            WorkerJob::Run(job) => &job.job_id,
            WorkerJob::RunSample(job) => &job.job_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    /// The request itself was unusable (unknown language, problem, ...)
    Rejected,
    /// The request was fine but the worker could not finish it
    Failed,
}

impl JobStatus {
    /// Status for a judge error
    pub fn for_error(error: &JudgeError) -> Self {
        match error {
            JudgeError::UnsupportedLanguage(_)
            | JudgeError::ProblemNotFound(_)
            | JudgeError::NoTestCases(_)
            | JudgeError::InvalidTestCase { .. } => JobStatus::Rejected,
            JudgeError::ExecutionFault(_) | JudgeError::Lookup(_) | JudgeError::Persistence { .. } => {
                JobStatus::Failed
            }
        }
    }
}

/// Result of any worker job, serialized without a wrapper
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum JobResult {
    Judge(JudgeJobResult),
    Run(RunJobResult),
}

impl JobResult {
    pub fn job_id(&self) -> &str {
        match self {
            JobResult::Judge(result) => &result.job_id,
            JobResult::Run(result) => &result.job_id,
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobResult::Judge(result) => result.status,
            JobResult::Run(result) => result.status,
        }
    }
}

/// Run one job to completion
pub async fn process_job(judge: &Judge, job: WorkerJob) -> JobResult {
    match job {
        WorkerJob::Judge(job) => {
            info!(
                "Received judge job: job_id={}, problem={}, language={}",
                job.job_id, job.problem, job.language
            );
            JobResult::Judge(process_judge_job(judge, job).await)
        }
        WorkerJob::Run(job) => {
            info!(
                "Received run job: job_id={}, language={}",
                job.job_id, job.language
            );
            JobResult::Run(process_run_job(judge, job).await)
        }
        WorkerJob::RunSample(job) => {
            info!(
                "Received run_sample job: job_id={}, problem={}, language={}",
                job.job_id, job.problem, job.language
            );
            JobResult::Run(process_run_sample_job(judge, job).await)
        }
    }
}
