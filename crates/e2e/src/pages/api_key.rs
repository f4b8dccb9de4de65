use std::sync::Arc;

use tracing::debug;

use crate::browser::{Locator, Page};
use crate::error::E2eResult;

/// Listing table on the API keys page
pub const API_KEYS_TABLE: &str = "table.material_table";

/// "Create key" form on the API keys page
pub struct ApiKeyForm {
    page: Arc<dyn Page>,
}

impl ApiKeyForm {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    pub fn name_field() -> Locator {
        Locator::css("#api_key_form_name")
    }

    pub fn generate_button() -> Locator {
        Locator::role("button", "Generate")
    }

    pub async fn enter_api_key_name(&self, name: &str) -> E2eResult<()> {
        self.page.fill(&Self::name_field(), name).await
    }

    pub async fn click_generate(&self) -> E2eResult<()> {
        self.page.click(&Self::generate_button()).await
    }

    pub async fn create_api_key(&self, name: &str) -> E2eResult<()> {
        debug!(name, "creating api key");
        self.enter_api_key_name(name).await?;
        self.click_generate().await
    }
}

/// Listing of existing keys: key, name, status, actions
pub struct ApiKeyTable {
    page: Arc<dyn Page>,
}

impl ApiKeyTable {
    const KEY_COLUMN: usize = 0;
    const NAME_COLUMN: usize = 1;

    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    /// Row whose name column is exactly `name`
    pub fn row(name: &str) -> Locator {
        Locator::row_with_cell(API_KEYS_TABLE, Self::NAME_COLUMN, name)
    }

    pub fn edit_name_link(name: &str) -> Locator {
        Self::row(name).within("td:nth-child(2) a")
    }

    /// Secret of the key displayed as `name`, `None` when no row carries that exact name
    pub async fn get_api_key_by_name(&self, name: &str) -> E2eResult<Option<String>> {
        let Some(cells) = self.page.row_cells(&Self::row(name)).await? else {
            return Ok(None);
        };
        let name_matches = cells
            .get(Self::NAME_COLUMN)
            .map(|cell| cell.trim() == name)
            .unwrap_or(false);
        if !name_matches {
            return Ok(None);
        }
        Ok(cells
            .get(Self::KEY_COLUMN)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty()))
    }

    pub async fn click_edit_key_name(&self, name: &str) -> E2eResult<()> {
        self.page.click(&Self::edit_name_link(name)).await
    }
}

/// Modal opened from the edit link of a key's name
pub struct EditApiKeyModal {
    page: Arc<dyn Page>,
}

impl EditApiKeyModal {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    pub fn name_field() -> Locator {
        Locator::label("API key name")
    }

    pub fn save_button() -> Locator {
        Locator::role("button", "Save")
    }

    pub async fn enter_api_key_name(&self, name: &str) -> E2eResult<()> {
        self.page.fill(&Self::name_field(), name).await
    }

    pub async fn click_save(&self) -> E2eResult<()> {
        self.page.click(&Self::save_button()).await
    }

    pub async fn update_api_key_name(&self, name: &str) -> E2eResult<()> {
        debug!(name, "renaming api key");
        self.enter_api_key_name(name).await?;
        self.click_save().await
    }
}
