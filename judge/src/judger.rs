//! Judger module - Submission orchestration
//!
//! This module sequences one submission through the pipeline:
//! - Resolve the language and the problem
//! - Synthesize the harness once
//! - Dispatch and evaluate test cases in order, stopping at the first failure
//! - Persist the resulting submission
//!
//! The judger module does NOT:
//! - Talk HTTP or Redis directly (see `sandbox` and `store`)
//! - Retry failed dispatches

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{self, ValueKind};
use crate::dispatcher::{DispatchError, Dispatcher, ExecutionResult};
use crate::languages::{LanguageConfig, LanguageRegistry};
use crate::models::{CallerIdentity, MethodSignature, NewSubmission, Problem, ProblemRef, Submission, TestCase};
use crate::store::{StoreError, SubmissionStore};
use crate::verdict::{evaluate, Evaluation, Verdict};

/// Prefix of the diagnostic recorded when the sandbox could not be used
pub const EXECUTION_ERROR_PREFIX: &str = "Execution Error:";

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Problem not found: {0}")]
    ProblemNotFound(String),

    #[error("Problem {0} has no test cases")]
    NoTestCases(String),

    /// `position` is 1-based
    #[error("Test case {position} is invalid: {reason}")]
    InvalidTestCase { position: usize, reason: String },

    #[error("Execution failed: {0}")]
    ExecutionFault(#[source] DispatchError),

    #[error("Failed to look up problem: {0}")]
    Lookup(#[source] StoreError),

    /// The verdict was computed but could not be saved
    #[error("Failed to persist {} submission: {source}", .outcome.verdict)]
    Persistence {
        outcome: Evaluation,
        #[source]
        source: StoreError,
    },
}

/// Orchestrates judging against an injected sandbox and store
#[derive(Clone)]
pub struct Judge {
    languages: Arc<LanguageRegistry>,
    dispatcher: Dispatcher,
    store: Arc<dyn SubmissionStore>,
    cancel: CancellationToken,
}

impl Judge {
    pub fn new(
        languages: LanguageRegistry,
        dispatcher: Dispatcher,
        store: Arc<dyn SubmissionStore>,
    ) -> Self {
        Self {
            languages: Arc::new(languages),
            dispatcher,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight dispatches when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Judge `code` against every test case of `problem` and store the result
    pub async fn judge(
        &self,
        problem: &ProblemRef,
        language: &str,
        code: &str,
        caller: Option<&CallerIdentity>,
    ) -> Result<Submission, JudgeError> {
        let config = self.language(language)?;
        let problem = self.load_problem(problem).await?;

        if let Some(signature) = &problem.signature {
            validate_test_cases(&problem.test_cases, signature)?;
        }

        let program = config.synthesize(code, problem.signature.as_ref());
        let (outcome, executed) = self.run_test_cases(&program, config, &problem.test_cases).await;

        info!(
            "Judge summary: problem={}, language={}, verdict={}, executed={}/{}",
            problem.slug,
            config.name,
            outcome.verdict,
            executed,
            problem.test_cases.len()
        );

        self.persist(&problem, config, code, caller, outcome).await
    }

    /// Execute `code` as-is with `stdin`; no harness, no verdict
    pub async fn run_raw(
        &self,
        language: &str,
        code: &str,
        stdin: &str,
    ) -> Result<ExecutionResult, JudgeError> {
        let config = self.language(language)?;
        self.dispatcher
            .dispatch_with_cancel(code, stdin, &config.runtime, &self.cancel)
            .await
            .map_err(JudgeError::ExecutionFault)
    }

    /// Run the harnessed `code` against the problem's first test case
    pub async fn run_sample(
        &self,
        problem: &ProblemRef,
        language: &str,
        code: &str,
    ) -> Result<ExecutionResult, JudgeError> {
        let config = self.language(language)?;
        let problem = self.load_problem(problem).await?;
        let sample = &problem.test_cases[..1];

        if let Some(signature) = &problem.signature {
            validate_test_cases(sample, signature)?;
        }

        let program = config.synthesize(code, problem.signature.as_ref());
        self.dispatcher
            .dispatch_with_cancel(&program, &sample[0].input_data, &config.runtime, &self.cancel)
            .await
            .map_err(JudgeError::ExecutionFault)
    }

    fn language(&self, language: &str) -> Result<&LanguageConfig, JudgeError> {
        self.languages
            .get(language)
            .ok_or_else(|| JudgeError::UnsupportedLanguage(language.to_string()))
    }

    /// Problem with at least one test case
    async fn load_problem(&self, reference: &ProblemRef) -> Result<Problem, JudgeError> {
        let problem = self
            .store
            .find_problem(reference)
            .await
            .map_err(JudgeError::Lookup)?
            .ok_or_else(|| JudgeError::ProblemNotFound(reference.to_string()))?;

        if problem.test_cases.is_empty() {
            return Err(JudgeError::NoTestCases(reference.to_string()));
        }

        Ok(problem)
    }

    /// Final evaluation plus the number of test cases dispatched
    async fn run_test_cases(
        &self,
        program: &str,
        config: &LanguageConfig,
        test_cases: &[TestCase],
    ) -> (Evaluation, usize) {
        let mut executed = 0;

        for (idx, tc) in test_cases.iter().enumerate() {
            executed += 1;

            let result = match self
                .dispatcher
                .dispatch_with_cancel(program, &tc.input_data, &config.runtime, &self.cancel)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    warn!("Dispatch failed on test case {}: {}", idx + 1, e);
                    let outcome = Evaluation::new(
                        Verdict::ExecutionFault,
                        format!("{} {}", EXECUTION_ERROR_PREFIX, e),
                    );
                    return (outcome, executed);
                }
            };

            let evaluation = evaluate(&result, &tc.input_data, &tc.expected_output);
            debug!("Test case {}: {}", idx + 1, evaluation.verdict);

            if !evaluation.verdict.is_accepted() {
                return (evaluation, executed);
            }
        }

        (Evaluation::accepted(), executed)
    }

    async fn persist(
        &self,
        problem: &Problem,
        config: &LanguageConfig,
        code: &str,
        caller: Option<&CallerIdentity>,
        outcome: Evaluation,
    ) -> Result<Submission, JudgeError> {
        let user_id = match caller {
            Some(caller) => match self.store.upsert_user(caller).await {
                Ok(id) => Some(id),
                Err(source) => return Err(JudgeError::Persistence { outcome, source }),
            },
            None => None,
        };

        let record = NewSubmission {
            problem_id: problem.id,
            user_id,
            code: code.to_string(),
            language: config.name.clone(),
            verdict: outcome.verdict,
            diagnostic: outcome.diagnostic.clone(),
            created_at: Utc::now(),
        };

        self.store
            .create_submission(record)
            .await
            .map_err(|source| JudgeError::Persistence { outcome, source })
    }
}

/// Check every test case decodes to the declared parameter kinds
pub fn validate_test_cases(
    test_cases: &[TestCase],
    signature: &MethodSignature,
) -> Result<(), JudgeError> {
    for (idx, tc) in test_cases.iter().enumerate() {
        let invalid = |reason: String| JudgeError::InvalidTestCase {
            position: idx + 1,
            reason,
        };

        let values = codec::decode_lines(&tc.input_data).map_err(|e| invalid(e.to_string()))?;
        if values.len() != signature.params.len() {
            return Err(invalid(format!(
                "{} takes {} arguments, input has {}",
                signature.method,
                signature.params.len(),
                values.len()
            )));
        }

        for (position, (value, declared)) in values.iter().zip(&signature.params).enumerate() {
            if !kind_accepts(*declared, value.kind()) {
                return Err(invalid(format!(
                    "argument {} is {}, expected {}",
                    position + 1,
                    value.kind(),
                    declared
                )));
            }
        }
    }

    Ok(())
}

/// Harnesses convert integers to strings, nothing else
fn kind_accepts(declared: ValueKind, actual: ValueKind) -> bool {
    declared == actual || (declared == ValueKind::String && actual == ValueKind::Integer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::sandbox::{ExecuteRequest, ExecuteResponse, Sandbox, SandboxError, StageOutput};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every request
    struct ScriptedSandbox {
        script: Mutex<VecDeque<Result<ExecuteResponse, SandboxError>>>,
        requests: Mutex<Vec<ExecuteRequest>>,
    }

    impl ScriptedSandbox {
        fn new(script: Vec<Result<ExecuteResponse, SandboxError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn dispatches(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Sandbox for ScriptedSandbox {
        async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResponse, SandboxError> {
            self.requests.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(run_ok("")))
        }
    }

    /// Store whose writes always fail
    struct ReadOnlyStore(MemoryStore);

    #[async_trait]
    impl SubmissionStore for ReadOnlyStore {
        async fn find_problem(&self, problem: &ProblemRef) -> Result<Option<Problem>, StoreError> {
            self.0.find_problem(problem).await
        }

        async fn create_submission(&self, _: NewSubmission) -> Result<Submission, StoreError> {
            Err(StoreError::Unavailable("read-only replica".into()))
        }

        async fn upsert_user(&self, caller: &CallerIdentity) -> Result<i64, StoreError> {
            self.0.upsert_user(caller).await
        }
    }

    fn run_ok(stdout: &str) -> ExecuteResponse {
        run_with(Some(0), stdout, "")
    }

    fn run_with(code: Option<i32>, stdout: &str, stderr: &str) -> ExecuteResponse {
        ExecuteResponse {
            compile: None,
            run: Some(StageOutput {
                code,
                signal: None,
                stdout: Some(stdout.into()),
                stderr: Some(stderr.into()),
            }),
            message: None,
        }
    }

    fn compile_failed(stderr: &str) -> ExecuteResponse {
        ExecuteResponse {
            compile: Some(StageOutput {
                code: Some(1),
                signal: None,
                stdout: None,
                stderr: Some(stderr.into()),
            }),
            run: None,
            message: None,
        }
    }

    fn two_sum() -> Problem {
        Problem {
            id: 1,
            slug: "two-sum".into(),
            title: "Two Sum".into(),
            test_cases: vec![
                TestCase {
                    input_data: "[2,7,11,15]\n9".into(),
                    expected_output: "[0, 1]".into(),
                    is_hidden: false,
                },
                TestCase {
                    input_data: "[3,2,4]\n6".into(),
                    expected_output: "[1, 2]".into(),
                    is_hidden: true,
                },
                TestCase {
                    input_data: "[3,3]\n6".into(),
                    expected_output: "[0, 1]".into(),
                    is_hidden: true,
                },
            ],
            signature: None,
        }
    }

    fn judge_with(
        sandbox: Arc<ScriptedSandbox>,
        store: Arc<dyn SubmissionStore>,
    ) -> Judge {
        let languages = LanguageRegistry::builtin().unwrap();
        Judge::new(languages, Dispatcher::new(sandbox), store)
    }

    fn memory_judge(sandbox: Arc<ScriptedSandbox>) -> (Judge, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_problems(vec![two_sum()]));
        (judge_with(sandbox, store.clone()), store)
    }

    const CODE: &str = "class Solution:\n    def twoSum(self, nums, target):\n        return [0, 1]\n";

    #[tokio::test]
    async fn test_all_cases_pass() {
        let sandbox = ScriptedSandbox::new(vec![
            Ok(run_ok("[0, 1]\n")),
            Ok(run_ok("[1, 2]\n")),
            Ok(run_ok("[0, 1]\n")),
        ]);
        let (judge, store) = memory_judge(sandbox.clone());

        let submission = judge
            .judge(&ProblemRef::parse("two-sum"), "python", CODE, None)
            .await
            .unwrap();

        assert_eq!(submission.verdict, Verdict::Accepted);
        assert_eq!(submission.diagnostic, "");
        assert_eq!(submission.problem_id, 1);
        assert_eq!(submission.language, "python");
        assert_eq!(sandbox.dispatches(), 3);
        assert_eq!(store.submissions().await.len(), 1);

        let requests = sandbox.requests.lock().unwrap();
        assert_eq!(requests[1].stdin, "[3,2,4]\n6");
        // Same harness for every case
        assert_eq!(requests[0].files[0].content, requests[2].files[0].content);
        assert!(requests[0].files[0].content.contains("def twoSum"));
    }

    #[tokio::test]
    async fn test_short_circuits_after_first_failure() {
        let sandbox = ScriptedSandbox::new(vec![
            Ok(run_ok("[0, 1]")),
            Ok(run_ok("[0, 2]")),
            Ok(run_ok("[0, 1]")),
        ]);
        let (judge, _) = memory_judge(sandbox.clone());

        let submission = judge
            .judge(&ProblemRef::Id(1), "py", CODE, None)
            .await
            .unwrap();

        assert_eq!(submission.verdict, Verdict::WrongAnswer);
        assert_eq!(
            submission.diagnostic,
            "Input: [3,2,4]\n6\nExpected: [1, 2]\nGot: [0, 2]"
        );
        assert_eq!(sandbox.dispatches(), 2);
    }

    #[tokio::test]
    async fn test_runtime_error_keeps_stderr() {
        let sandbox = ScriptedSandbox::new(vec![Ok(run_with(
            Some(1),
            "",
            "Traceback (most recent call last):\nIndexError: list index out of range\n",
        ))]);
        let (judge, _) = memory_judge(sandbox.clone());

        let submission = judge
            .judge(&ProblemRef::Id(1), "python", CODE, None)
            .await
            .unwrap();

        assert_eq!(submission.verdict, Verdict::RuntimeError);
        assert!(submission.diagnostic.contains("IndexError"));
        assert_eq!(sandbox.dispatches(), 1);
    }

    #[tokio::test]
    async fn test_compile_failure_wins_over_output() {
        let mut response = compile_failed("Main.java:3: error: ';' expected");
        response.run = Some(StageOutput {
            code: Some(0),
            signal: None,
            stdout: Some("[0, 1]".into()),
            stderr: None,
        });
        let sandbox = ScriptedSandbox::new(vec![Ok(response)]);
        let (judge, _) = memory_judge(sandbox.clone());

        let submission = judge
            .judge(&ProblemRef::Id(1), "java", "class Solution {", None)
            .await
            .unwrap();

        assert_eq!(submission.verdict, Verdict::CompilationError);
        assert_eq!(submission.diagnostic, "Main.java:3: error: ';' expected");
        assert_eq!(submission.language, "java");
    }

    #[tokio::test]
    async fn test_unsupported_language_never_dispatches() {
        let sandbox = ScriptedSandbox::new(vec![]);
        let (judge, store) = memory_judge(sandbox.clone());

        let err = judge
            .judge(&ProblemRef::Id(1), "brainfuck", CODE, None)
            .await
            .unwrap_err();

        assert!(matches!(err, JudgeError::UnsupportedLanguage(ref l) if l == "brainfuck"));
        assert_eq!(sandbox.dispatches(), 0);
        assert!(store.submissions().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_problem_and_empty_problem() {
        let sandbox = ScriptedSandbox::new(vec![]);
        let store = Arc::new(MemoryStore::with_problems(vec![Problem {
            test_cases: Vec::new(),
            ..two_sum()
        }]));
        let judge = judge_with(sandbox.clone(), store);

        let err = judge
            .judge(&ProblemRef::parse("42"), "python", CODE, None)
            .await
            .unwrap_err();
        assert!(matches!(err, JudgeError::ProblemNotFound(ref r) if r == "42"));

        let err = judge
            .judge(&ProblemRef::parse("two-sum"), "python", CODE, None)
            .await
            .unwrap_err();
        assert!(matches!(err, JudgeError::NoTestCases(_)));
        assert_eq!(sandbox.dispatches(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_is_execution_fault() {
        let sandbox = ScriptedSandbox::new(vec![
            Ok(run_ok("[0, 1]")),
            Err(SandboxError::Transport {
                message: "connection refused".into(),
            }),
        ]);
        let (judge, store) = memory_judge(sandbox.clone());

        let submission = judge
            .judge(&ProblemRef::Id(1), "python", CODE, None)
            .await
            .unwrap();

        assert_eq!(submission.verdict, Verdict::ExecutionFault);
        assert!(submission.diagnostic.starts_with(EXECUTION_ERROR_PREFIX));
        assert!(submission.diagnostic.contains("connection refused"));
        assert_eq!(sandbox.dispatches(), 2);
        assert_eq!(store.submissions().await[0].verdict, Verdict::ExecutionFault);
    }

    #[tokio::test]
    async fn test_cancelled_judge_is_execution_fault() {
        let sandbox = ScriptedSandbox::new(vec![]);
        let (judge, _) = memory_judge(sandbox);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let judge = judge.with_cancellation(cancel);

        let submission = judge
            .judge(&ProblemRef::Id(1), "python", CODE, None)
            .await
            .unwrap();
        assert_eq!(submission.verdict, Verdict::ExecutionFault);
        assert_eq!(submission.diagnostic, "Execution Error: dispatch cancelled");
    }

    #[tokio::test]
    async fn test_store_failure_keeps_verdict() {
        let sandbox = ScriptedSandbox::new(vec![Ok(run_ok("wrong"))]);
        let store = Arc::new(ReadOnlyStore(MemoryStore::with_problems(vec![two_sum()])));
        let judge = judge_with(sandbox, store);

        let err = judge
            .judge(&ProblemRef::Id(1), "python", CODE, None)
            .await
            .unwrap_err();

        match err {
            JudgeError::Persistence { outcome, source } => {
                assert_eq!(outcome.verdict, Verdict::WrongAnswer);
                assert!(outcome.diagnostic.contains("Got: wrong"));
                assert!(matches!(source, StoreError::Unavailable(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_caller_is_upserted_once() {
        let sandbox = ScriptedSandbox::new(vec![]);
        let (judge, store) = memory_judge(sandbox);
        let caller = CallerIdentity {
            external_id: "github|7".into(),
            email: Some("ada@example.com".into()),
            username: None,
        };

        let first = judge
            .judge(&ProblemRef::Id(1), "python", CODE, Some(&caller))
            .await
            .unwrap();
        let second = judge
            .judge(&ProblemRef::Id(1), "python", CODE, Some(&caller))
            .await
            .unwrap();

        assert_eq!(first.user_id, Some(1));
        assert_eq!(second.user_id, Some(1));
        assert_ne!(first.id, second.id);

        let users: Vec<User> = store.users().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "ada@example.com");
        assert_eq!(users[0].username, "Anonymous");
    }

    #[tokio::test]
    async fn test_invalid_test_case_rejected_before_dispatch() {
        let sandbox = ScriptedSandbox::new(vec![]);
        let mut problem = two_sum();
        problem.signature = Some(MethodSignature {
            method: "twoSum".into(),
            params: vec![ValueKind::IntegerArray, ValueKind::Integer],
            returns: ValueKind::IntegerArray,
        });
        problem.test_cases[1].input_data = "[3,x,4]\n6".into();
        let judge = judge_with(sandbox.clone(), Arc::new(MemoryStore::with_problems(vec![problem])));

        let err = judge
            .judge(&ProblemRef::Id(1), "python", CODE, None)
            .await
            .unwrap_err();

        assert!(matches!(err, JudgeError::InvalidTestCase { position: 2, .. }));
        assert_eq!(sandbox.dispatches(), 0);
    }

    #[test]
    fn test_validate_test_cases_checks_arity_and_kinds() {
        let signature = MethodSignature {
            method: "repeat".into(),
            params: vec![ValueKind::String, ValueKind::Integer],
            returns: ValueKind::String,
        };
        let case = |input: &str| TestCase {
            input_data: input.into(),
            expected_output: String::new(),
            is_hidden: true,
        };

        assert!(validate_test_cases(&[case("\"ab\"\n3")], &signature).is_ok());
        // Integers are accepted where strings are declared
        assert!(validate_test_cases(&[case("12\n3")], &signature).is_ok());

        let err = validate_test_cases(&[case("\"ab\"")], &signature).unwrap_err();
        assert!(err.to_string().contains("repeat takes 2 arguments, input has 1"));

        let err = validate_test_cases(&[case("\"ab\"\n[1]")], &signature).unwrap_err();
        assert!(err.to_string().contains("argument 2 is integer_array, expected integer"));
    }

    #[tokio::test]
    async fn test_run_raw_skips_harness() {
        let sandbox = ScriptedSandbox::new(vec![Ok(run_ok("hello\n"))]);
        let (judge, store) = memory_judge(sandbox.clone());

        let result = judge.run_raw("js", "console.log('hello')", "").await.unwrap();
        assert_eq!(result.run_stdout, "hello\n");

        let requests = sandbox.requests.lock().unwrap();
        assert_eq!(requests[0].language, "javascript");
        assert_eq!(requests[0].files[0].content, "console.log('hello')");
        assert!(store.submissions().await.is_empty());
    }

    #[tokio::test]
    async fn test_run_raw_transport_failure() {
        let sandbox = ScriptedSandbox::new(vec![Err(SandboxError::Status {
            status: 503,
            body: "busy".into(),
        })]);
        let (judge, _) = memory_judge(sandbox);

        let err = judge.run_raw("python", "print(1)", "").await.unwrap_err();
        assert!(matches!(
            err,
            JudgeError::ExecutionFault(DispatchError::Sandbox(SandboxError::Status { status: 503, .. }))
        ));
    }

    #[tokio::test]
    async fn test_run_sample_uses_first_case_only() {
        let sandbox = ScriptedSandbox::new(vec![Ok(run_ok("[0, 1]\n"))]);
        let (judge, store) = memory_judge(sandbox.clone());

        let result = judge
            .run_sample(&ProblemRef::parse("two-sum"), "python", CODE)
            .await
            .unwrap();

        assert_eq!(result.run_stdout, "[0, 1]\n");
        assert_eq!(sandbox.dispatches(), 1);
        let requests = sandbox.requests.lock().unwrap();
        assert_eq!(requests[0].stdin, "[2,7,11,15]\n9");
        assert!(requests[0].files[0].content.contains("def _main():"));
        assert!(store.submissions().await.is_empty());
    }
}
