//! Fixture graph - named, scoped test resources with dependency injection
//!
//! A [`FixtureRegistry`] collects [`FixtureDescriptor`]s and is frozen into a
//! [`FixtureGraph`] by [`FixtureRegistry::build`], which rejects unknown
//! dependencies, duplicate names, scope violations and cycles before any
//! fixture is constructed.
//!
//! Resources live in one of two scopes:
//!
//! ```text
//! FixtureGraph ──worker_scope()──▶ WorkerScope   (one per worker process)
//!                                     │   session, config, ...
//!                                     └─test_scope()──▶ TestScope (one per test)
//!                                                          page, api_key, ...
//! ```
//!
//! Resolution is lazy and memoized per scope instance: dependencies are built
//! depth-first, each at most once, and teardown callbacks run in exact reverse
//! order of construction when the scope is torn down.

use std::any::{type_name, Any};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Type-erased fixture value
pub type Handle = Arc<dyn Any + Send + Sync>;

/// Disposal callback registered by a factory
pub type Teardown = Box<dyn FnOnce() -> BoxFuture<'static, E2eResult<()>> + Send>;

type Factory = Arc<dyn Fn(Deps) -> BoxFuture<'static, E2eResult<Setup>> + Send + Sync>;

/// Lifetime boundary of a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Built for one test, torn down when it ends
    Test,
    /// Built once per worker process and shared by every test it runs
    Worker,
}

/// What a factory produces: the value plus an optional disposal callback
pub struct Setup {
    value: Handle,
    teardown: Option<Teardown>,
}

impl Setup {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            teardown: None,
        }
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            teardown: None,
        }
    }

    /// Run `teardown` when the owning scope ends
    pub fn with_teardown<F, Fut>(mut self, teardown: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = E2eResult<()>> + Send + 'static,
    {
        self.teardown = Some(Box::new(move || teardown().boxed()));
        self
    }
}

/// Resolved dependencies handed to a factory
pub struct Deps {
    fixture: String,
    handles: HashMap<String, Handle>,
}

impl Deps {
    /// Typed access to a declared dependency
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> E2eResult<Arc<T>> {
        let handle = self.handles.get(name).cloned().ok_or_else(|| {
            E2eError::Configuration(format!(
                "fixture '{}' did not declare a dependency on '{}'",
                self.fixture, name
            ))
        })?;
        downcast(name, handle)
    }

    /// Typed access for cheaply cloneable values such as `Arc<dyn Page>`
    pub fn cloned<T: Any + Send + Sync + Clone>(&self, name: &str) -> E2eResult<T> {
        self.get::<T>(name).map(|v| (*v).clone())
    }
}

fn downcast<T: Any + Send + Sync>(name: &str, handle: Handle) -> E2eResult<Arc<T>> {
    handle.downcast::<T>().map_err(|_| E2eError::TypeMismatch {
        name: name.to_string(),
        expected: type_name::<T>(),
    })
}

/// Declaration of one named fixture
#[derive(Clone)]
pub struct FixtureDescriptor {
    name: String,
    scope: Scope,
    deps: Vec<String>,
    factory: Factory,
}

impl std::fmt::Debug for FixtureDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureDescriptor")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("deps", &self.deps)
            .finish()
    }
}

impl FixtureDescriptor {
    pub fn new<F, Fut>(name: &str, scope: Scope, deps: &[&str], factory: F) -> Self
    where
        F: Fn(Deps) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = E2eResult<Setup>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            scope,
            deps: deps.iter().map(|d| d.to_string()).collect(),
            factory: Arc::new(move |deps: Deps| factory(deps).boxed()),
        }
    }

    /// A test-scoped fixture
    pub fn test<F, Fut>(name: &str, deps: &[&str], factory: F) -> Self
    where
        F: Fn(Deps) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = E2eResult<Setup>> + Send + 'static,
    {
        Self::new(name, Scope::Test, deps, factory)
    }

    /// A worker-scoped fixture
    pub fn worker<F, Fut>(name: &str, deps: &[&str], factory: F) -> Self
    where
        F: Fn(Deps) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = E2eResult<Setup>> + Send + 'static,
    {
        Self::new(name, Scope::Worker, deps, factory)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

/// Mutable collection of descriptors, validated by [`build`](Self::build)
#[derive(Default)]
pub struct FixtureRegistry {
    descriptors: Vec<FixtureDescriptor>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: FixtureDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn with(mut self, descriptor: FixtureDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Freeze into an immutable graph.
    ///
    /// Fails with [`E2eError::Configuration`] on duplicate names, unknown
    /// dependencies, worker fixtures depending on test fixtures, or cycles.
    pub fn build(self) -> E2eResult<FixtureGraph> {
        let mut descriptors: HashMap<String, Arc<FixtureDescriptor>> = HashMap::new();
        for descriptor in self.descriptors {
            let name = descriptor.name.clone();
            if descriptors.insert(name.clone(), Arc::new(descriptor)).is_some() {
                return Err(E2eError::Configuration(format!(
                    "fixture '{}' is registered more than once",
                    name
                )));
            }
        }

        let mut names: Vec<&String> = descriptors.keys().collect();
        names.sort();

        for name in &names {
            let descriptor = &descriptors[*name];
            for dep in &descriptor.deps {
                let Some(target) = descriptors.get(dep) else {
                    return Err(E2eError::Configuration(format!(
                        "fixture '{}' depends on unregistered fixture '{}'",
                        name, dep
                    )));
                };
                if descriptor.scope == Scope::Worker && target.scope == Scope::Test {
                    return Err(E2eError::Configuration(format!(
                        "worker fixture '{}' cannot depend on test fixture '{}'",
                        name, dep
                    )));
                }
            }
        }

        let mut order = Vec::with_capacity(names.len());
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        for name in &names {
            visit(name, &descriptors, &mut visited, &mut stack, &mut order)?;
        }

        debug!(fixtures = order.len(), "fixture graph built");
        Ok(FixtureGraph { descriptors, order })
    }
}

/// Depth-first post-order walk. `stack` holds the current path so a back edge
/// can be reported as the full cycle.
fn visit(
    name: &str,
    descriptors: &HashMap<String, Arc<FixtureDescriptor>>,
    visited: &mut HashSet<String>,
    stack: &mut Vec<String>,
    order: &mut Vec<String>,
) -> E2eResult<()> {
    if let Some(start) = stack.iter().position(|n| n == name) {
        let mut cycle = stack[start..].to_vec();
        cycle.push(name.to_string());
        return Err(E2eError::Configuration(format!(
            "fixture dependency cycle: {}",
            cycle.join(" -> ")
        )));
    }
    if visited.contains(name) {
        return Ok(());
    }

    stack.push(name.to_string());
    for dep in &descriptors[name].deps {
        visit(dep, descriptors, visited, stack, order)?;
    }
    stack.pop();

    visited.insert(name.to_string());
    order.push(name.to_string());
    Ok(())
}

/// Validated, immutable fixture declarations
pub struct FixtureGraph {
    descriptors: HashMap<String, Arc<FixtureDescriptor>>,
    order: Vec<String>,
}

impl FixtureGraph {
    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Every fixture, dependencies before dependents
    pub fn topological_order(&self) -> &[String] {
        &self.order
    }

    fn lookup(&self, name: &str) -> E2eResult<Arc<FixtureDescriptor>> {
        self.descriptors
            .get(name)
            .cloned()
            .ok_or_else(|| E2eError::Configuration(format!("unknown fixture '{}'", name)))
    }

    /// Open the scope shared by every test in this worker
    pub fn worker_scope(self: &Arc<Self>) -> Arc<WorkerScope> {
        Arc::new(WorkerScope {
            graph: Arc::clone(self),
            slots: Mutex::new(HashMap::new()),
            teardowns: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        })
    }
}

/// Names of fixtures disposed, and teardown failures, in disposal order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeardownReport {
    pub disposed: Vec<String>,
    pub errors: Vec<(String, String)>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

async fn run_teardowns(scope: &str, mut teardowns: Vec<(String, Teardown)>) -> TeardownReport {
    let mut report = TeardownReport::default();
    while let Some((name, teardown)) = teardowns.pop() {
        debug!(scope, fixture = %name, "tearing down");
        if let Err(e) = teardown().await {
            warn!(scope, fixture = %name, error = %e, "teardown failed");
            report.errors.push((name.clone(), e.to_string()));
        }
        report.disposed.push(name);
    }
    report
}

type WorkerSlot = Arc<OnceCell<Result<Handle, String>>>;

fn cached_outcome(name: &str, outcome: &Result<Handle, String>) -> E2eResult<Handle> {
    match outcome {
        Ok(handle) => Ok(Arc::clone(handle)),
        Err(reason) => Err(E2eError::Aborted {
            name: name.to_string(),
            reason: reason.clone(),
        }),
    }
}

/// Fixtures shared by all tests of one worker process.
///
/// Each worker fixture is built at most once. Concurrent requests wait for the
/// first construction; a failed construction is remembered and every later
/// request fails fast with [`E2eError::Aborted`] instead of retrying.
pub struct WorkerScope {
    graph: Arc<FixtureGraph>,
    slots: Mutex<HashMap<String, WorkerSlot>>,
    teardowns: Mutex<Vec<(String, Teardown)>>,
    disposed: AtomicBool,
}

impl WorkerScope {
    pub fn graph(&self) -> &Arc<FixtureGraph> {
        &self.graph
    }

    /// Open a fresh scope for one test
    pub fn test_scope(self: &Arc<Self>, test_name: &str) -> Arc<TestScope> {
        Arc::new(TestScope {
            test_name: test_name.to_string(),
            worker: Arc::clone(self),
            state: Mutex::new(TestState::default()),
            resolve_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Resolve a worker-scoped fixture
    pub async fn resolve(self: &Arc<Self>, name: &str) -> E2eResult<Handle> {
        self.resolve_inner(name, Vec::new()).await
    }

    pub async fn get<T: Any + Send + Sync>(self: &Arc<Self>, name: &str) -> E2eResult<Arc<T>> {
        downcast(name, self.resolve(name).await?)
    }

    /// Whether `name` has been constructed successfully in this scope
    pub fn is_ready(&self, name: &str) -> bool {
        self.slots
            .lock()
            .get(name)
            .and_then(|cell| cell.get())
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }

    fn resolve_inner(self: &Arc<Self>, name: &str, path: Vec<String>) -> BoxFuture<'static, E2eResult<Handle>> {
        let scope = Arc::clone(self);
        let name = name.to_string();
        async move {
            if scope.disposed.load(Ordering::Acquire) {
                return Err(E2eError::Lifecycle(format!(
                    "worker scope is disposed; cannot resolve '{}'",
                    name
                )));
            }
            let descriptor = scope.graph.lookup(&name)?;
            if descriptor.scope != Scope::Worker {
                return Err(E2eError::Configuration(format!(
                    "test fixture '{}' cannot be resolved in the worker scope",
                    name
                )));
            }
            if path.iter().any(|p| *p == name) {
                return Err(E2eError::Lifecycle(format!(
                    "re-entrant resolution of '{}' via {}",
                    name,
                    path.join(" -> ")
                )));
            }

            let cell = scope.slots.lock().entry(name.clone()).or_default().clone();
            if let Some(outcome) = cell.get() {
                return cached_outcome(&name, outcome);
            }

            // Construction owns its own task: a caller cancelled by a test
            // timeout stops waiting but never leaves the slot half-built.
            let task = tokio::spawn(async move {
                let mut first_failure: Option<E2eError> = None;
                let failure = &mut first_failure;
                let outcome = cell
                    .get_or_init(move || async move {
                        match scope.construct(&descriptor, path).await {
                            Ok(handle) => Ok(handle),
                            Err(e) => {
                                let reason = e.to_string();
                                *failure = Some(e);
                                Err(reason)
                            }
                        }
                    })
                    .await
                    .clone();
                (outcome, first_failure)
            });

            let (outcome, first_failure) = task.await.map_err(|e| E2eError::FixtureFailed {
                name: name.clone(),
                source: Box::new(E2eError::Lifecycle(format!("construction task failed: {}", e))),
            })?;
            if let Some(e) = first_failure {
                return Err(e);
            }
            cached_outcome(&name, &outcome)
        }
        .boxed()
    }

    async fn construct(self: &Arc<Self>, descriptor: &FixtureDescriptor, mut path: Vec<String>) -> E2eResult<Handle> {
        path.push(descriptor.name.clone());

        let mut handles = HashMap::new();
        for dep in &descriptor.deps {
            let handle = self.resolve_inner(dep, path.clone()).await?;
            handles.insert(dep.clone(), handle);
        }

        info!(fixture = %descriptor.name, "constructing worker fixture");
        let deps = Deps {
            fixture: descriptor.name.clone(),
            handles,
        };
        let setup = (descriptor.factory)(deps)
            .await
            .map_err(|e| E2eError::FixtureFailed {
                name: descriptor.name.clone(),
                source: Box::new(e),
            })?;

        if let Some(teardown) = setup.teardown {
            self.teardowns.lock().push((descriptor.name.clone(), teardown));
        }
        Ok(setup.value)
    }

    /// Dispose every constructed worker fixture in reverse construction order
    pub async fn teardown(&self) -> TeardownReport {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return TeardownReport::default();
        }
        let teardowns = std::mem::take(&mut *self.teardowns.lock());
        let report = run_teardowns("worker", teardowns).await;
        info!(disposed = report.disposed.len(), errors = report.errors.len(), "worker scope torn down");
        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Resolving,
    Ready,
    Disposed,
}

#[derive(Default)]
struct TestState {
    slots: HashMap<String, (SlotState, Option<Handle>)>,
    teardowns: Vec<(String, Teardown)>,
    constructed: Vec<String>,
    aborted: Option<String>,
    disposed: bool,
}

/// Fixtures owned by a single test.
///
/// Resolution within one test is serialized; a failing factory aborts the
/// scope so later requests fail, while fixtures already built are still torn
/// down by [`teardown`](Self::teardown).
pub struct TestScope {
    test_name: String,
    worker: Arc<WorkerScope>,
    state: Mutex<TestState>,
    resolve_lock: tokio::sync::Mutex<()>,
}

impl TestScope {
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn worker(&self) -> &Arc<WorkerScope> {
        &self.worker
    }

    /// Resolve any fixture; worker fixtures are delegated to the worker scope
    pub async fn resolve(&self, name: &str) -> E2eResult<Handle> {
        let _guard = self.resolve_lock.lock().await;
        self.resolve_inner(name, Vec::new()).await
    }

    pub async fn get<T: Any + Send + Sync>(&self, name: &str) -> E2eResult<Arc<T>> {
        downcast(name, self.resolve(name).await?)
    }

    pub async fn cloned<T: Any + Send + Sync + Clone>(&self, name: &str) -> E2eResult<T> {
        self.get::<T>(name).await.map(|v| (*v).clone())
    }

    /// Test-scoped fixtures constructed so far, in construction order
    pub fn constructed(&self) -> Vec<String> {
        self.state.lock().constructed.clone()
    }

    fn resolve_inner<'a>(&'a self, name: &'a str, path: Vec<String>) -> BoxFuture<'a, E2eResult<Handle>> {
        async move {
            let descriptor = self.worker.graph.lookup(name)?;

            {
                let state = self.state.lock();
                if state.disposed {
                    return Err(E2eError::Lifecycle(format!(
                        "test scope '{}' is disposed; cannot resolve '{}'",
                        self.test_name, name
                    )));
                }
                if let Some(failed) = &state.aborted {
                    return Err(E2eError::Lifecycle(format!(
                        "test scope '{}' was aborted by fixture '{}'",
                        self.test_name, failed
                    )));
                }
            }

            if descriptor.scope == Scope::Worker {
                return self.worker.resolve_inner(name, path).await;
            }

            {
                let mut state = self.state.lock();
                match state.slots.get(name) {
                    Some((SlotState::Ready, Some(handle))) => return Ok(Arc::clone(handle)),
                    Some((SlotState::Resolving, _)) => {
                        return Err(E2eError::Lifecycle(format!(
                            "re-entrant resolution of '{}' via {}",
                            name,
                            path.join(" -> ")
                        )));
                    }
                    Some((SlotState::Disposed, _)) => {
                        return Err(E2eError::Lifecycle(format!("fixture '{}' is disposed", name)));
                    }
                    _ => {}
                }
                state.slots.insert(name.to_string(), (SlotState::Resolving, None));
            }

            let mut child_path = path;
            child_path.push(name.to_string());

            let mut handles = HashMap::new();
            for dep in &descriptor.deps {
                match self.resolve_inner(dep, child_path.clone()).await {
                    Ok(handle) => {
                        handles.insert(dep.clone(), handle);
                    }
                    Err(e) => {
                        self.abort(name);
                        return Err(e);
                    }
                }
            }

            debug!(test = %self.test_name, fixture = %name, "constructing test fixture");
            let deps = Deps {
                fixture: name.to_string(),
                handles,
            };
            let setup = match (descriptor.factory)(deps).await {
                Ok(setup) => setup,
                Err(e) => {
                    self.abort(name);
                    return Err(E2eError::FixtureFailed {
                        name: name.to_string(),
                        source: Box::new(e),
                    });
                }
            };

            let mut state = self.state.lock();
            state
                .slots
                .insert(name.to_string(), (SlotState::Ready, Some(Arc::clone(&setup.value))));
            state.constructed.push(name.to_string());
            if let Some(teardown) = setup.teardown {
                state.teardowns.push((name.to_string(), teardown));
            }
            Ok(setup.value)
        }
        .boxed()
    }

    fn abort(&self, name: &str) {
        let mut state = self.state.lock();
        state.slots.remove(name);
        if state.aborted.is_none() {
            warn!(test = %self.test_name, fixture = %name, "fixture resolution aborted");
            state.aborted = Some(name.to_string());
        }
    }

    /// Dispose every test fixture in reverse construction order. Idempotent.
    pub async fn teardown(&self) -> TeardownReport {
        let _guard = self.resolve_lock.lock().await;
        let teardowns = {
            let mut state = self.state.lock();
            if state.disposed {
                return TeardownReport::default();
            }
            state.disposed = true;
            for slot in state.slots.values_mut() {
                *slot = (SlotState::Disposed, None);
            }
            std::mem::take(&mut state.teardowns)
        };
        run_teardowns(&self.test_name, teardowns).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, scope: Scope) -> FixtureDescriptor {
        let value = name.to_string();
        FixtureDescriptor::new(name, scope, &[], move |_| {
            let value = value.clone();
            async move { Ok(Setup::new(value)) }
        })
    }

    fn node(name: &str, scope: Scope, deps: &[&str]) -> FixtureDescriptor {
        FixtureDescriptor::new(name, scope, deps, |_| async { Ok(Setup::new(())) })
    }

    #[test]
    fn test_topological_order_puts_dependencies_first() {
        let graph = FixtureRegistry::new()
            .with(node("c", Scope::Test, &["b"]))
            .with(node("b", Scope::Test, &["a"]))
            .with(leaf("a", Scope::Test))
            .build()
            .unwrap();
        assert_eq!(graph.topological_order(), ["a", "b", "c"]);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let err = FixtureRegistry::new()
            .with(node("a", Scope::Test, &["a"]))
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("a -> a"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = FixtureRegistry::new()
            .with(leaf("a", Scope::Test))
            .with(leaf("a", Scope::Worker))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, E2eError::Configuration(_)));
    }

    #[test]
    fn test_worker_cannot_depend_on_test_fixture() {
        let err = FixtureRegistry::new()
            .with(leaf("page", Scope::Test))
            .with(node("session", Scope::Worker, &["page"]))
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("cannot depend on test fixture"));
    }

    #[tokio::test]
    async fn test_deps_get_reports_type_mismatch() {
        let graph = Arc::new(
            FixtureRegistry::new()
                .with(leaf("a", Scope::Test))
                .with(FixtureDescriptor::test("b", &["a"], |deps| async move {
                    let n = deps.get::<u32>("a")?;
                    Ok(Setup::new(*n))
                }))
                .build()
                .unwrap(),
        );
        let scope = graph.worker_scope().test_scope("t");
        let err = scope.resolve("b").await.err().unwrap();
        match err {
            E2eError::FixtureFailed { name, source } => {
                assert_eq!(name, "b");
                assert!(matches!(*source, E2eError::TypeMismatch { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
