use std::sync::Arc;

use crate::browser::{Locator, Page};
use crate::error::{E2eError, E2eResult};
use crate::pages::url_path;

/// Account dropdown in the page header
pub struct UserDropdownMenu {
    page: Arc<dyn Page>,
}

impl UserDropdownMenu {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    pub fn toggle() -> Locator {
        Locator::css("#user-dropdown")
    }

    pub fn my_api_keys_link() -> Locator {
        Locator::role("link", "My API keys")
    }

    pub async fn open(&self) -> E2eResult<()> {
        self.page.click(&Self::toggle()).await
    }

    pub async fn go_to_my_api_keys(&self) -> E2eResult<()> {
        self.open().await?;
        self.page.click(&Self::my_api_keys_link()).await
    }
}

/// Top navigation bar
pub struct NavigationBar {
    page: Arc<dyn Page>,
    user_menu: Arc<UserDropdownMenu>,
}

impl NavigationBar {
    pub fn new(page: Arc<dyn Page>, user_menu: Arc<UserDropdownMenu>) -> Self {
        Self { page, user_menu }
    }

    /// Navigate to the "My API keys" page through the user menu.
    ///
    /// Fails when the browser ends up anywhere other than the API keys page.
    pub async fn go_to_user_api_keys(&self) -> E2eResult<()> {
        self.user_menu.go_to_my_api_keys().await?;
        let url = self.page.current_url().await?;
        let path = url.split(['?', '#']).next().unwrap_or_default();
        if path.ends_with(url_path::API_KEYS) {
            Ok(())
        } else {
            Err(E2eError::AssertionFailed(format!(
                "expected the API keys page, landed on {}",
                url
            )))
        }
    }
}
