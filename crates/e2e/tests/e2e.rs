//! Live suite entry point
//!
//! Runs the weather API cases from YAML specs and the account UI scenarios
//! against the real service. Exits successfully with a notice when the live
//! environment is not configured.
//! Run with: cargo test --package stormcheck-e2e --test e2e

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stormcheck_e2e::config::load_dotenv;
use stormcheck_e2e::pages::{message, url_path, ApiKeyTable, EditApiKeyModal, NavigationBar, SignInForm};
use stormcheck_e2e::playwright::{Browser, PlaywrightLauncher};
use stormcheck_e2e::suite::{names, PageHandle};
use stormcheck_e2e::{
    standard_fixtures, testdata, ApiCaseSpec, ApiKey, E2eError, E2eResult, HarnessConfig, RunnerConfig, TestCase,
    TestRunner, TestSuiteResult,
};

#[derive(Parser, Debug)]
#[command(name = "stormcheck-e2e")]
#[command(about = "Live suite for the weather API and account UI")]
struct Args {
    /// Web UI origin
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Weather API origin
    #[arg(long, env = "BASE_API_URL")]
    base_api_url: Option<String>,

    /// Activated API key
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "USER_EMAIL")]
    user_email: Option<String>,

    #[arg(long, env = "USER_PASSWORD", hide_env_values = true)]
    user_password: Option<String>,

    /// Running under CI
    #[arg(long, env = "CI")]
    ci: Option<String>,

    /// Session artifact path
    #[arg(long, env = "AUTH_FILE")]
    auth_file: Option<PathBuf>,

    /// Load the stored session instead of signing in again
    #[arg(long)]
    reuse_session: bool,

    /// Path to API case specs directory
    #[arg(short, long, default_value = "specs")]
    specs: PathBuf,

    /// Run only tests matching this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only a specific test by name
    #[arg(short, long)]
    name: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    browser: String,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Per-test timeout in seconds
    #[arg(long, default_value = "120")]
    test_timeout: u64,

    /// Output directory for results
    #[arg(short, long, default_value = "test-results")]
    output: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // `.env` only fills variables the environment leaves unset
    match load_dotenv() {
        Ok(Some(path)) => info!(path = %path.display(), "loaded .env"),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }

    let args = Args::parse();

    if args.base_url.is_none() || args.base_api_url.is_none() || args.api_key.is_none() {
        println!("skipping live suite: BASE_URL, BASE_API_URL and API_KEY must be set");
        return;
    }

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

fn harness_config(args: &Args) -> E2eResult<HarnessConfig> {
    let mut config = HarnessConfig::from_lookup(|key| match key {
        "BASE_URL" => args.base_url.clone(),
        "BASE_API_URL" => args.base_api_url.clone(),
        "API_KEY" => args.api_key.clone(),
        "USER_EMAIL" => args.user_email.clone(),
        "USER_PASSWORD" => args.user_password.clone(),
        "CI" => args.ci.clone(),
        "AUTH_FILE" => args.auth_file.as_ref().map(|p| p.display().to_string()),
        _ => None,
    })?;

    config.reuse_session = args.reuse_session;
    config.playwright.browser = match args.browser.as_str() {
        "firefox" => Browser::Firefox,
        "webkit" => Browser::Webkit,
        _ => Browser::Chromium,
    };
    if args.headed && !config.ci {
        config.playwright.headless = false;
    }
    config.validate()?;
    Ok(config)
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let config = Arc::new(harness_config(&args)?);

    let launcher = match PlaywrightLauncher::new(config.playwright.clone()) {
        Ok(launcher) => Some(launcher),
        Err(e) => {
            warn!("UI scenarios disabled: {}", e);
            None
        }
    };
    let browser_available = launcher.is_some();
    let signed_in_available = browser_available && config.credentials.is_some();
    if browser_available && !signed_in_available {
        warn!("USER_EMAIL/USER_PASSWORD not set; authenticated scenarios disabled");
    }

    let launcher: Arc<dyn stormcheck_e2e::PageLauncher> = match launcher {
        Some(launcher) => Arc::new(launcher),
        None => Arc::new(Unavailable),
    };

    let mut runner = TestRunner::new(
        standard_fixtures(Arc::clone(&config), launcher),
        RunnerConfig {
            test_timeout: Duration::from_secs(args.test_timeout),
            setup_fixtures: if signed_in_available {
                vec![names::SESSION.to_string()]
            } else {
                Vec::new()
            },
            output_dir: args.output.clone(),
        },
    )?;

    for spec in ApiCaseSpec::load_all(&args.specs)? {
        if spec.needs_api_key_fixture() && !signed_in_available {
            info!("skipping '{}': needs a signed-in browser", spec.name);
            continue;
        }
        runner.add(spec.into_test_case());
    }
    if browser_available {
        runner.add(sign_in_scenario());
    }
    if signed_in_available {
        runner.add(navigation_scenario());
        runner.add(rename_api_key_scenario());
    }

    let results: TestSuiteResult = if let Some(name) = &args.name {
        runner.run_test(name).await?
    } else if let Some(tag) = &args.tag {
        runner.run_tagged(tag).await
    } else {
        runner.run_all().await
    };

    let report = runner.shutdown().await;
    if !report.is_clean() {
        warn!("worker teardown errors: {:?}", report.errors);
    }

    runner.write_results(&results)?;
    Ok(results.is_success())
}

/// Stand-in launcher when Playwright is not installed
struct Unavailable;

#[async_trait::async_trait]
impl stormcheck_e2e::PageLauncher for Unavailable {
    async fn launch(&self, _storage_state: Option<&std::path::Path>) -> E2eResult<PageHandle> {
        Err(E2eError::PlaywrightNotFound)
    }
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> E2eResult<()> {
    if condition {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(message()))
    }
}

fn sign_in_scenario() -> TestCase {
    TestCase::new("sign in: remember-me checkbox is unchecked", |scope| async move {
        let config = scope.get::<HarnessConfig>(names::CONFIG).await?;
        let page = scope.cloned::<PageHandle>(names::GUEST_PAGE).await?;
        let form = scope.get::<SignInForm>(names::GUEST_SIGN_IN_FORM).await?;

        page.goto(url_path::HOME).await?;
        page.wait_for_text(message::SIGN_IN_OR_SIGN_UP, config.playwright.action_timeout)
            .await?;
        ensure(!form.is_remember_me_checked().await?, || {
            "remember-me checkbox is checked".to_string()
        })
    })
    .tagged(&["ui", "auth"])
}

fn navigation_scenario() -> TestCase {
    TestCase::new("navigation: redirects user to the API keys page", |scope| async move {
        let page = scope.cloned::<PageHandle>(names::PAGE).await?;
        page.goto(url_path::HOME).await?;

        let navigation_bar = scope.get::<NavigationBar>(names::NAVIGATION_BAR).await?;
        navigation_bar.go_to_user_api_keys().await?;

        let url = page.current_url().await?;
        let path = Url::parse(&url)
            .map(|u| u.path().to_string())
            .map_err(|e| E2eError::AssertionFailed(format!("page URL {} is invalid: {}", url, e)))?;
        ensure(path == url_path::API_KEYS, || {
            format!("expected {}, got {}", url_path::API_KEYS, url)
        })
    })
    .tagged(&["ui", "navigation"])
}

fn rename_api_key_scenario() -> TestCase {
    TestCase::new("api keys: renaming keeps the secret", |scope| async move {
        let config = scope.get::<HarnessConfig>(names::CONFIG).await?;
        let api_key = scope.get::<ApiKey>(names::API_KEY).await?;
        let page = scope.cloned::<PageHandle>(names::PAGE).await?;
        let table = scope.get::<ApiKeyTable>(names::API_KEY_TABLE).await?;
        let modal = scope.get::<EditApiKeyModal>(names::EDIT_API_KEY_MODAL).await?;

        let new_name = testdata::api_key_name();
        table.click_edit_key_name(&api_key.name).await?;
        modal.update_api_key_name(&new_name).await?;
        page.wait_for_text(message::API_KEY_EDITED, config.playwright.action_timeout)
            .await?;

        let renamed = table.get_api_key_by_name(&new_name).await?;
        ensure(renamed.as_deref() == Some(api_key.value.as_str()), || {
            format!("key renamed to '{}' has secret {:?}", new_name, renamed)
        })
    })
    .tagged(&["ui", "api-keys"])
}
