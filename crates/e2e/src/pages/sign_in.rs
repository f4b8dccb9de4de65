use std::sync::Arc;

use tracing::debug;

use crate::browser::{Locator, Page};
use crate::config::Credentials;
use crate::error::E2eResult;

/// Email/password sign-in form
pub struct SignInForm {
    page: Arc<dyn Page>,
}

impl SignInForm {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    pub fn email_field() -> Locator {
        Locator::css("#user_email")
    }

    pub fn password_field() -> Locator {
        Locator::css("#user_password")
    }

    pub fn remember_me_checkbox() -> Locator {
        Locator::css("#user_remember_me")
    }

    pub fn submit_button() -> Locator {
        Locator::css("#new_user input[type=submit]")
    }

    pub async fn enter_email(&self, email: &str) -> E2eResult<()> {
        self.page.fill(&Self::email_field(), email).await
    }

    pub async fn enter_password(&self, password: &str) -> E2eResult<()> {
        self.page.fill(&Self::password_field(), password).await
    }

    pub async fn is_remember_me_checked(&self) -> E2eResult<bool> {
        self.page.is_checked(&Self::remember_me_checkbox()).await
    }

    pub async fn check_remember_me(&self) -> E2eResult<()> {
        self.page.check(&Self::remember_me_checkbox()).await
    }

    pub async fn click_submit(&self) -> E2eResult<()> {
        self.page.click(&Self::submit_button()).await
    }

    /// Fill both fields and submit
    pub async fn login(&self, credentials: &Credentials) -> E2eResult<()> {
        debug!(email = %credentials.email, "signing in");
        self.enter_email(&credentials.email).await?;
        self.enter_password(&credentials.password).await?;
        self.click_submit().await
    }
}
