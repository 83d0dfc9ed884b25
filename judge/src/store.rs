//! Store module - Problems, users and submissions
//!
//! This module handles:
//! - The `SubmissionStore` trait the judge is written against
//! - An in-memory store for tests and local runs
//! - A Redis-backed store used by the worker
//! - Loading a JSON problem catalog for seeding
//!
//! The store module does NOT:
//! - Judge anything or change verdicts
//! - Decide what gets persisted (that's the judge's job)

use std::fs;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::{CallerIdentity, NewSubmission, Problem, ProblemRef, Submission, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to (de)serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("inconsistent store state: {0}")]
    Inconsistent(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// External data store consumed by the judge
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn find_problem(&self, problem: &ProblemRef) -> Result<Option<Problem>, StoreError>;

    /// Persist a new submission and return it with its assigned id
    async fn create_submission(&self, record: NewSubmission) -> Result<Submission, StoreError>;

    /// Id of the user for `caller`, created on first sight
    async fn upsert_user(&self, caller: &CallerIdentity) -> Result<i64, StoreError>;
}

/// Read a JSON array of problems
pub fn load_catalog(path: impl AsRef<Path>) -> anyhow::Result<Vec<Problem>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read problem catalog {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid problem catalog {}", path.display()))
}

#[derive(Debug, Default)]
struct MemoryState {
    problems: Vec<Problem>,
    users: Vec<User>,
    submissions: Vec<Submission>,
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_problems(problems: Vec<Problem>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                problems,
                ..Default::default()
            }),
        }
    }

    pub async fn submissions(&self) -> Vec<Submission> {
        self.state.lock().await.submissions.clone()
    }

    pub async fn users(&self) -> Vec<User> {
        self.state.lock().await.users.clone()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn find_problem(&self, problem: &ProblemRef) -> Result<Option<Problem>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.problems.iter().find(|p| problem.matches(p)).cloned())
    }

    async fn create_submission(&self, record: NewSubmission) -> Result<Submission, StoreError> {
        let mut state = self.state.lock().await;
        let submission = Submission::from_new(state.submissions.len() as i64 + 1, record);
        state.submissions.push(submission.clone());
        Ok(submission)
    }

    async fn upsert_user(&self, caller: &CallerIdentity) -> Result<i64, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(user) = state
            .users
            .iter()
            .find(|u| u.external_id == caller.external_id)
        {
            return Ok(user.id);
        }

        let id = state.users.len() as i64 + 1;
        state.users.push(User {
            id,
            external_id: caller.external_id.clone(),
            email: caller.email_or_placeholder().to_string(),
            username: caller.username_or_anonymous().to_string(),
        });
        Ok(id)
    }
}

/// Redis key layout
pub mod keys {
    /// Problem JSON by slug
    pub const PROBLEM_PREFIX: &str = "judge:problem:";

    /// Problem id → slug
    pub const PROBLEM_ID_PREFIX: &str = "judge:problem:id:";

    /// Submission id sequence
    pub const SUBMISSION_SEQ: &str = "judge:submission:seq";

    /// Submission JSON by id
    pub const SUBMISSION_PREFIX: &str = "judge:submission:";

    /// User id sequence
    pub const USER_SEQ: &str = "judge:user:seq";

    /// Hash of external id → user id
    pub const USER_EXTERNAL_INDEX: &str = "judge:user:external";

    /// User JSON by id
    pub const USER_PREFIX: &str = "judge:user:";
}

/// Store backed by Redis
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Submission store connected to Redis at {}", redis_url);
        Ok(Self { conn })
    }

    /// Write `problems` to the catalog, replacing entries with the same slug
    pub async fn seed_problems(&self, problems: &[Problem]) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        for problem in problems {
            let json = serde_json::to_string(problem)?;
            conn.set::<_, _, ()>(format!("{}{}", keys::PROBLEM_PREFIX, problem.slug), json)
                .await?;
            conn.set::<_, _, ()>(
                format!("{}{}", keys::PROBLEM_ID_PREFIX, problem.id),
                &problem.slug,
            )
            .await?;
        }
        Ok(problems.len())
    }
}

#[async_trait]
impl SubmissionStore for RedisStore {
    async fn find_problem(&self, problem: &ProblemRef) -> Result<Option<Problem>, StoreError> {
        let mut conn = self.conn.clone();

        let slug = match problem {
            ProblemRef::Slug(slug) => slug.clone(),
            ProblemRef::Id(id) => {
                let slug: Option<String> =
                    conn.get(format!("{}{}", keys::PROBLEM_ID_PREFIX, id)).await?;
                match slug {
                    Some(slug) => slug,
                    None => return Ok(None),
                }
            }
        };

        let json: Option<String> = conn.get(format!("{}{}", keys::PROBLEM_PREFIX, slug)).await?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn create_submission(&self, record: NewSubmission) -> Result<Submission, StoreError> {
        let mut conn = self.conn.clone();
        let id: i64 = conn.incr(keys::SUBMISSION_SEQ, 1).await?;
        let submission = Submission::from_new(id, record);

        let json = serde_json::to_string(&submission)?;
        conn.set::<_, _, ()>(format!("{}{}", keys::SUBMISSION_PREFIX, id), json)
            .await?;
        debug!("Stored submission {}", id);

        Ok(submission)
    }

    async fn upsert_user(&self, caller: &CallerIdentity) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();

        let existing: Option<i64> = conn
            .hget(keys::USER_EXTERNAL_INDEX, &caller.external_id)
            .await?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let candidate: i64 = conn.incr(keys::USER_SEQ, 1).await?;
        let claimed: bool = conn
            .hset_nx(keys::USER_EXTERNAL_INDEX, &caller.external_id, candidate)
            .await?;

        if claimed {
            let user = User {
                id: candidate,
                external_id: caller.external_id.clone(),
                email: caller.email_or_placeholder().to_string(),
                username: caller.username_or_anonymous().to_string(),
            };
            conn.set::<_, _, ()>(
                format!("{}{}", keys::USER_PREFIX, candidate),
                serde_json::to_string(&user)?,
            )
            .await?;
            return Ok(candidate);
        }

        // Another worker inserted the same caller first
        let winner: Option<i64> = conn
            .hget(keys::USER_EXTERNAL_INDEX, &caller.external_id)
            .await?;
        winner.ok_or_else(|| {
            StoreError::Inconsistent(format!(
                "user {} vanished after a conflicting insert",
                caller.external_id
            ))
        })
    }
}
