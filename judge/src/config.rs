//! Worker configuration from environment variables

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::languages::LanguageRegistry;
use crate::sandbox::piston::DEFAULT_PISTON_URL;

const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
const DEFAULT_WORKER_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeConfig {
    /// Base URL of the Piston API
    pub sandbox_url: String,
    /// `None` waits for the sandbox indefinitely
    pub sandbox_timeout: Option<Duration>,
    pub redis_url: String,
    /// Languages TOML; the bundled file is used when unset
    pub languages_config: Option<PathBuf>,
    /// JSON problem catalog seeded into the store at startup
    pub problems_path: Option<PathBuf>,
    /// Maximum jobs judged at once
    pub worker_concurrency: usize,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            sandbox_url: DEFAULT_PISTON_URL.to_string(),
            sandbox_timeout: None,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            languages_config: None,
            problems_path: None,
            worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
        }
    }
}

impl JudgeConfig {
    /// Read the process environment. Call `dotenvy::dotenv()` first to
    /// pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let sandbox_timeout = match get("SANDBOX_TIMEOUT_SECS") {
            Some(secs) => {
                let secs: u64 = secs
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid SANDBOX_TIMEOUT_SECS: {}", secs))?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let worker_concurrency = match get("WORKER_CONCURRENCY") {
            Some(n) => {
                let n: usize = n
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid WORKER_CONCURRENCY: {}", n))?;
                if n == 0 {
                    anyhow::bail!("WORKER_CONCURRENCY must be at least 1");
                }
                n
            }
            None => defaults.worker_concurrency,
        };

        Ok(Self {
            sandbox_url: get("SANDBOX_URL").unwrap_or(defaults.sandbox_url),
            sandbox_timeout,
            redis_url: get("REDIS_URL").unwrap_or(defaults.redis_url),
            languages_config: get("LANGUAGES_CONFIG").map(PathBuf::from),
            problems_path: get("PROBLEMS_PATH").map(PathBuf::from),
            worker_concurrency,
        })
    }

    /// Registry from `languages_config`, or the bundled one
    pub fn load_languages(&self) -> Result<LanguageRegistry> {
        match &self.languages_config {
            Some(path) => LanguageRegistry::from_file(path),
            None => LanguageRegistry::builtin(),
        }
    }
}
