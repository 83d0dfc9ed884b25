//! `judge` job: full judging with persistence

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::JobStatus;
use crate::judger::{Judge, JudgeError};
use crate::models::{CallerIdentity, ProblemRef};
use crate::verdict::Verdict;

#[derive(Debug, Serialize, Deserialize)]
pub struct JudgeJob {
    pub job_id: String,
    /// Numeric id or slug
    pub problem: String,
    pub language: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<CallerIdentity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeJobResult {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<i64>,
    /// Present whenever judging finished, even if saving failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JudgeJobResult {
    fn failed(job_id: String, error: &JudgeError) -> Self {
        Self {
            job_id,
            status: JobStatus::for_error(error),
            submission_id: None,
            verdict: None,
            diagnostic: None,
            error_message: Some(error.to_string()),
        }
    }
}

pub async fn process_judge_job(judge: &Judge, job: JudgeJob) -> JudgeJobResult {
    let problem = ProblemRef::parse(&job.problem);

    match judge
        .judge(&problem, &job.language, &job.code, job.caller.as_ref())
        .await
    {
        Ok(submission) => {
            info!(
                "Judge job completed: job_id={}, submission_id={}, verdict={}",
                job.job_id, submission.id, submission.verdict
            );
            JudgeJobResult {
                job_id: job.job_id,
                status: JobStatus::Completed,
                submission_id: Some(submission.id),
                verdict: Some(submission.verdict),
                diagnostic: Some(submission.diagnostic),
                error_message: None,
            }
        }
        Err(e) => {
            error!("Failed to process judge job {}: {}", job.job_id, e);
            let mut result = JudgeJobResult::failed(job.job_id, &e);
            if let JudgeError::Persistence { outcome, .. } = e {
                result.verdict = Some(outcome.verdict);
                result.diagnostic = Some(outcome.diagnostic);
            }
            result
        }
    }
}
