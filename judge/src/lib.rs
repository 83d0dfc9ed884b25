//! DSA Judge - judges `Solution` submissions against stored test cases
//! through a remote sandbox.

pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod jobs;
pub mod judger;
pub mod languages;
pub mod models;
pub mod redis_manager;
pub mod sandbox;
pub mod store;
pub mod verdict;
pub mod worker;

pub use config::JudgeConfig;
pub use dispatcher::{DispatchError, Dispatcher, ExecutionResult};
pub use judger::{Judge, JudgeError};
pub use languages::LanguageRegistry;
pub use models::{CallerIdentity, Problem, ProblemRef, Submission};
pub use store::{MemoryStore, RedisStore, StoreError, SubmissionStore};
pub use verdict::{Evaluation, Verdict};
