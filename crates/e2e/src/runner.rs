//! Test runner: owns the fixture graph and runs test cases one at a time
//!
//! Each test gets its own [`TestScope`], bounded by a timeout and always torn
//! down, whatever the body did. Worker fixtures live until [`TestRunner::shutdown`].

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::fixture::{FixtureGraph, FixtureRegistry, TeardownReport, TestScope, WorkerScope};

type TestBody = Arc<dyn Fn(Arc<TestScope>) -> BoxFuture<'static, E2eResult<()>> + Send + Sync>;

/// A named test body. Fixtures are requested from the scope it receives.
#[derive(Clone)]
pub struct TestCase {
    name: String,
    tags: Vec<String>,
    body: TestBody,
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .finish()
    }
}

impl TestCase {
    pub fn new<F, Fut>(name: &str, body: F) -> Self
    where
        F: Fn(Arc<TestScope>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = E2eResult<()>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            tags: Vec::new(),
            body: Arc::new(move |scope: Arc<TestScope>| body(scope).boxed()),
        }
    }

    pub fn tagged(mut self, tags: &[&str]) -> Self {
        self.tags.extend(tags.iter().map(|t| t.to_string()));
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
    /// A shared fixture the test needs failed earlier in the run
    Skipped,
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub outcome: TestOutcome,
    pub duration_ms: u64,
    pub error: Option<String>,
    /// Test fixtures constructed, in construction order
    pub fixtures: Vec<String>,
    pub teardown_errors: Vec<String>,
}

impl TestResult {
    pub fn success(&self) -> bool {
        self.outcome != TestOutcome::Failed
    }
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    /// Failure of an eagerly resolved setup fixture
    pub setup_error: Option<String>,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.setup_error.is_none()
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Upper bound for one test, fixture setup included
    pub test_timeout: Duration,
    /// Worker fixtures resolved before the first test
    pub setup_fixtures: Vec<String>,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            test_timeout: Duration::from_secs(120),
            setup_fixtures: Vec::new(),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Runs test cases against one worker scope
pub struct TestRunner {
    worker: Arc<WorkerScope>,
    config: RunnerConfig,
    cases: Vec<TestCase>,
}

impl TestRunner {
    /// Build the fixture graph. Graph errors surface here, before any test runs.
    pub fn new(registry: FixtureRegistry, config: RunnerConfig) -> E2eResult<Self> {
        let graph = Arc::new(registry.build()?);
        for name in &config.setup_fixtures {
            if !graph.contains(name) {
                return Err(E2eError::Configuration(format!("unknown setup fixture '{}'", name)));
            }
        }
        Ok(Self {
            worker: graph.worker_scope(),
            config,
            cases: Vec::new(),
        })
    }

    pub fn graph(&self) -> &Arc<FixtureGraph> {
        self.worker.graph()
    }

    pub fn worker(&self) -> &Arc<WorkerScope> {
        &self.worker
    }

    pub fn add(&mut self, case: TestCase) -> &mut Self {
        self.cases.push(case);
        self
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Resolve the setup fixtures. The first failure is returned; fixtures
    /// that depend on it fail fast for the rest of the run.
    pub async fn setup(&self) -> E2eResult<()> {
        for name in &self.config.setup_fixtures {
            info!(fixture = %name, "resolving setup fixture");
            if let Err(e) = self.worker.resolve(name).await {
                error!(fixture = %name, error = %e, "setup fixture failed");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Run every registered test
    pub async fn run_all(&self) -> TestSuiteResult {
        let cases: Vec<&TestCase> = self.cases.iter().collect();
        self.run_cases(&cases).await
    }

    /// Run tests carrying `tag`
    pub async fn run_tagged(&self, tag: &str) -> TestSuiteResult {
        let cases: Vec<&TestCase> = self.cases.iter().filter(|c| c.has_tag(tag)).collect();
        self.run_cases(&cases).await
    }

    /// Run a specific test by name
    pub async fn run_test(&self, name: &str) -> E2eResult<TestSuiteResult> {
        let case = self
            .cases
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| E2eError::Configuration(format!("Test not found: {}", name)))?;
        Ok(self.run_cases(&[case]).await)
    }

    async fn run_cases(&self, cases: &[&TestCase]) -> TestSuiteResult {
        let start = Instant::now();
        let setup_error = self.setup().await.err().map(|e| e.to_string());

        info!("Running {} test(s)...", cases.len());

        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let result = self.run_case(case).await;
            match result.outcome {
                TestOutcome::Passed => info!("✓ {} ({} ms)", result.name, result.duration_ms),
                TestOutcome::Skipped => warn!(
                    "- {} skipped: {}",
                    result.name,
                    result.error.as_deref().unwrap_or("shared fixture unavailable")
                ),
                TestOutcome::Failed => error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                ),
            }
            results.push(result);
        }

        let count = |outcome: TestOutcome| results.iter().filter(|r| r.outcome == outcome).count();
        let (passed, failed, skipped) = (
            count(TestOutcome::Passed),
            count(TestOutcome::Failed),
            count(TestOutcome::Skipped),
        );
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        TestSuiteResult {
            total: cases.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            setup_error,
            results,
        }
    }

    /// Run one test in a fresh scope, then tear the scope down
    pub async fn run_case(&self, case: &TestCase) -> TestResult {
        let start = Instant::now();
        debug!("Running test: {}", case.name);

        let scope = self.worker.test_scope(&case.name);
        let error = match tokio::time::timeout(self.config.test_timeout, (case.body)(Arc::clone(&scope))).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => Some(E2eError::Timeout(format!(
                "test '{}' after {:?}",
                case.name, self.config.test_timeout
            ))),
        };

        let fixtures = scope.constructed();
        let report: TeardownReport = scope.teardown().await;
        let teardown_errors: Vec<String> = report
            .errors
            .iter()
            .map(|(fixture, e)| format!("{}: {}", fixture, e))
            .collect();

        let (outcome, error) = match error {
            Some(e) if e.is_aborted() => (TestOutcome::Skipped, Some(e.to_string())),
            Some(e) => (TestOutcome::Failed, Some(e.to_string())),
            None if !teardown_errors.is_empty() => (
                TestOutcome::Failed,
                Some(format!("teardown failed: {}", teardown_errors.join("; "))),
            ),
            None => (TestOutcome::Passed, None),
        };

        TestResult {
            name: case.name.clone(),
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
            error,
            fixtures,
            teardown_errors,
        }
    }

    /// Dispose worker fixtures. Call once after the last test.
    pub async fn shutdown(&self) -> TeardownReport {
        self.worker.teardown().await
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
