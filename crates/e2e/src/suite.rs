//! Standard fixtures of the weather account suite
//!
//! ```text
//! config ──▶ session ──▶ page ──┬─▶ sign_in_form
//!    │                          ├─▶ user_menu ──▶ navigation_bar
//!    │                          ├─▶ api_key_form ─┐
//!    │                          ├─▶ api_key_table ┴─▶ api_key
//!    │                          └─▶ edit_api_key_modal
//!    └─▶ weather_client
//! guest_page ──▶ guest_sign_in_form
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::WeatherClient;
use crate::browser::{Page, PageLauncher};
use crate::config::HarnessConfig;
use crate::error::{E2eError, E2eResult};
use crate::fixture::{Deps, FixtureDescriptor, FixtureRegistry, Setup};
use crate::pages::{
    url_path, ApiKeyForm, ApiKeyTable, EditApiKeyModal, NavigationBar, SignInForm, UserDropdownMenu,
};
use crate::session::{SessionArtifact, SessionProvider};
use crate::testdata;

/// Fixture names registered by [`standard_fixtures`]
pub mod names {
    pub const CONFIG: &str = "config";
    pub const SESSION: &str = "session";
    pub const PAGE: &str = "page";
    pub const GUEST_PAGE: &str = "guest_page";
    pub const SIGN_IN_FORM: &str = "sign_in_form";
    pub const GUEST_SIGN_IN_FORM: &str = "guest_sign_in_form";
    pub const USER_MENU: &str = "user_menu";
    pub const NAVIGATION_BAR: &str = "navigation_bar";
    pub const API_KEY_FORM: &str = "api_key_form";
    pub const API_KEY_TABLE: &str = "api_key_table";
    pub const EDIT_API_KEY_MODAL: &str = "edit_api_key_modal";
    pub const API_KEY: &str = "api_key";
    pub const WEATHER_CLIENT: &str = "weather_client";
}

/// Browser page as stored in the graph
pub type PageHandle = Arc<dyn Page>;

/// A key created through the UI for the current test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub name: String,
    pub value: String,
}

fn page_object<T, F>(name: &str, page_fixture: &'static str, build: F) -> FixtureDescriptor
where
    T: Send + Sync + 'static,
    F: Fn(PageHandle) -> T + Send + Sync + Copy + 'static,
{
    FixtureDescriptor::test(name, &[page_fixture], move |deps: Deps| async move {
        let page = deps.cloned::<PageHandle>(page_fixture)?;
        Ok(Setup::new(build(page)))
    })
}

/// A launched page, closed when its test ends
fn launched_page(page: PageHandle) -> Setup {
    let closing = Arc::clone(&page);
    Setup::new(page).with_teardown(move || async move { closing.close().await })
}

/// Every fixture the live suite uses
pub fn standard_fixtures(config: Arc<HarnessConfig>, launcher: Arc<dyn PageLauncher>) -> FixtureRegistry {
    let provider = Arc::new(SessionProvider::new(Arc::clone(&config), Arc::clone(&launcher)));
    let page_launcher = Arc::clone(&launcher);
    let guest_launcher = Arc::clone(&launcher);
    let api_timeout = config.playwright.action_timeout;

    FixtureRegistry::new()
        .with(FixtureDescriptor::worker(names::CONFIG, &[], move |_| {
            let config = Arc::clone(&config);
            async move { Ok(Setup::from_arc(config)) }
        }))
        .with(FixtureDescriptor::worker(names::SESSION, &[names::CONFIG], move |_| {
            let provider = Arc::clone(&provider);
            async move { Ok(Setup::from_arc(provider.ensure().await?)) }
        }))
        .with(FixtureDescriptor::test(names::PAGE, &[names::SESSION], move |deps| {
            let launcher = Arc::clone(&page_launcher);
            async move {
                let session = deps.get::<SessionArtifact>(names::SESSION)?;
                let page = launcher.launch(Some(session.path())).await?;
                Ok(launched_page(page))
            }
        }))
        .with(FixtureDescriptor::test(names::GUEST_PAGE, &[], move |_| {
            let launcher = Arc::clone(&guest_launcher);
            async move {
                let page = launcher.launch(None).await?;
                Ok(launched_page(page))
            }
        }))
        .with(page_object(names::SIGN_IN_FORM, names::PAGE, SignInForm::new))
        .with(page_object(names::GUEST_SIGN_IN_FORM, names::GUEST_PAGE, SignInForm::new))
        .with(page_object(names::USER_MENU, names::PAGE, UserDropdownMenu::new))
        .with(page_object(names::API_KEY_FORM, names::PAGE, ApiKeyForm::new))
        .with(page_object(names::API_KEY_TABLE, names::PAGE, ApiKeyTable::new))
        .with(page_object(names::EDIT_API_KEY_MODAL, names::PAGE, EditApiKeyModal::new))
        .with(FixtureDescriptor::test(
            names::NAVIGATION_BAR,
            &[names::PAGE, names::USER_MENU],
            |deps| async move {
                let page = deps.cloned::<PageHandle>(names::PAGE)?;
                let user_menu = deps.get::<UserDropdownMenu>(names::USER_MENU)?;
                Ok(Setup::new(NavigationBar::new(page, user_menu)))
            },
        ))
        .with(FixtureDescriptor::test(
            names::API_KEY,
            &[names::PAGE, names::API_KEY_FORM, names::API_KEY_TABLE],
            move |deps| async move {
                let page = deps.cloned::<PageHandle>(names::PAGE)?;
                let form = deps.get::<ApiKeyForm>(names::API_KEY_FORM)?;
                let table = deps.get::<ApiKeyTable>(names::API_KEY_TABLE)?;
                let key = create_api_key(page.as_ref(), &form, &table, api_timeout).await?;
                Ok(Setup::new(key))
            },
        ))
        .with(FixtureDescriptor::test(names::WEATHER_CLIENT, &[names::CONFIG], |deps| async move {
            let config = deps.get::<HarnessConfig>(names::CONFIG)?;
            Ok(Setup::new(WeatherClient::from_config(&config)?))
        }))
}

/// Create a key with a fresh name on the API keys page and read back its secret
pub async fn create_api_key(
    page: &dyn Page,
    form: &ApiKeyForm,
    table: &ApiKeyTable,
    timeout: std::time::Duration,
) -> E2eResult<ApiKey> {
    page.goto(url_path::API_KEYS).await?;
    let name = testdata::api_key_name();
    form.create_api_key(&name).await?;
    page.wait_for_text(&name, timeout).await?;

    let value = table
        .get_api_key_by_name(&name)
        .await?
        .ok_or_else(|| E2eError::AssertionFailed(format!("API key '{}' not listed after creation", name)))?;
    info!(name = %name, "api key created");
    Ok(ApiKey { name, value })
}
