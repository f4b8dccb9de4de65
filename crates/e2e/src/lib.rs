//! stormcheck E2E harness
//!
//! Drives the weather HTTP API and the account web UI against shared,
//! composable test resources:
//! - a fixture graph that builds, scopes, shares and tears down resources
//! - page objects over a Playwright-backed browser page
//! - a weather API client whose responses go through contract validation
//! - a one-time authenticated session reused by every browser page
//! - declarative YAML API cases and a runner that executes test cases
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TestRunner                             │
//! │    ├── FixtureGraph ──▶ WorkerScope ──▶ TestScope (per test)│
//! │    ├── run_case(TestCase) -> TestResult                     │
//! │    └── write_results(TestSuiteResult)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  standard_fixtures(config, launcher)                        │
//! │    ├── config, session                 (worker scope)       │
//! │    ├── page, page objects, api_key     (test scope)         │
//! │    └── weather_client                  (test scope)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PlaywrightPage ── JSON lines ──▶ node driver.js            │
//! │  WeatherClient  ── reqwest ─────▶ /data/2.5/weather         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod fixture;
pub mod pages;
pub mod playwright;
pub mod runner;
pub mod session;
pub mod spec;
pub mod suite;
pub mod testdata;

pub use api::{ApiKeyMode, ApiResponse, Location, Units, WeatherClient, WeatherQuery};
pub use browser::{Locator, Page, PageLauncher};
pub use config::{Credentials, HarnessConfig};
pub use error::{E2eError, E2eResult};
pub use fixture::{FixtureDescriptor, FixtureGraph, FixtureRegistry, Scope, Setup, TestScope, WorkerScope};
pub use runner::{RunnerConfig, TestCase, TestOutcome, TestResult, TestRunner, TestSuiteResult};
pub use session::{SessionArtifact, SessionProvider};
pub use spec::ApiCaseSpec;
pub use suite::{standard_fixtures, ApiKey};
