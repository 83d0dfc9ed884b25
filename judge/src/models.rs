//! Catalog and submission records exchanged with the store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::ValueKind;
use crate::verdict::Verdict;

/// Declared shape of the method a problem expects on `Solution`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub method: String,
    #[serde(default)]
    pub params: Vec<ValueKind>,
    pub returns: ValueKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// One literal per line
    pub input_data: String,
    pub expected_output: String,
    #[serde(default = "default_hidden")]
    pub is_hidden: bool,
}

fn default_hidden() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: i64,
    pub slug: String,
    #[serde(default)]
    pub title: String,
    /// Evaluated in this order; the first failure is the one reported
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    /// When absent the harness discovers the method at run time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<MethodSignature>,
}

/// How a caller refers to a problem
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProblemRef {
    Id(i64),
    Slug(String),
}

impl ProblemRef {
    /// All-digit references are ids, everything else is a slug
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        if !reference.is_empty() && reference.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = reference.parse::<i64>() {
                return ProblemRef::Id(id);
            }
        }
        ProblemRef::Slug(reference.to_string())
    }

    pub fn matches(&self, problem: &Problem) -> bool {
        match self {
            ProblemRef::Id(id) => problem.id == *id,
            ProblemRef::Slug(slug) => problem.slug == *slug,
        }
    }
}

impl std::fmt::Display for ProblemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProblemRef::Id(id) => write!(f, "{}", id),
            ProblemRef::Slug(slug) => write!(f, "{}", slug),
        }
    }
}

/// Account the submission is attributed to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub external_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl CallerIdentity {
    pub fn email_or_placeholder(&self) -> &str {
        self.email
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or("placeholder@example.com")
    }

    pub fn username_or_anonymous(&self) -> &str {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or("Anonymous")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub external_id: String,
    pub email: String,
    pub username: String,
}

/// Submission record before the store assigns it an id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubmission {
    pub problem_id: i64,
    pub user_id: Option<i64>,
    pub code: String,
    pub language: String,
    pub verdict: Verdict,
    pub diagnostic: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub problem_id: i64,
    pub user_id: Option<i64>,
    pub code: String,
    pub language: String,
    pub verdict: Verdict,
    /// Detail of the first failure, empty when accepted
    pub diagnostic: String,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    pub fn from_new(id: i64, record: NewSubmission) -> Self {
        Self {
            id,
            problem_id: record.problem_id,
            user_id: record.user_id,
            code: record.code,
            language: record.language,
            verdict: record.verdict,
            diagnostic: record.diagnostic,
            created_at: record.created_at,
        }
    }
}
