//! Browser page abstraction used by page objects

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// How an element is found on the page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    Css { selector: String },
    Label { label: String },
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Text { text: String },
    /// First table row containing `has_text`, optionally narrowed to `inner`.
    /// With `column` set, only a row whose cell at that zero-based index reads
    /// exactly `has_text` matches.
    Row {
        table: String,
        has_text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        column: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inner: Option<String>,
    },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css {
            selector: selector.into(),
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        Locator::Label { label: label.into() }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Locator::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Locator::Text { text: text.into() }
    }

    pub fn row(table: impl Into<String>, has_text: impl Into<String>) -> Self {
        Locator::Row {
            table: table.into(),
            has_text: has_text.into(),
            column: None,
            inner: None,
        }
    }

    /// Row whose cell in `column` is exactly `text`
    pub fn row_with_cell(table: impl Into<String>, column: usize, text: impl Into<String>) -> Self {
        Locator::Row {
            table: table.into(),
            has_text: text.into(),
            column: Some(column),
            inner: None,
        }
    }

    /// Narrow a row locator to an element inside the row
    pub fn within(self, inner: impl Into<String>) -> Self {
        match self {
            Locator::Row {
                table,
                has_text,
                column,
                ..
            } => Locator::Row {
                table,
                has_text,
                column,
                inner: Some(inner.into()),
            },
            other => other,
        }
    }

    /// Short description for logs and step names
    pub fn describe(&self) -> String {
        match self {
            Locator::Css { selector } => selector.clone(),
            Locator::Label { label } => format!("label={}", label),
            Locator::Role { role, name: Some(name) } => format!("role={}[name={}]", role, name),
            Locator::Role { role, name: None } => format!("role={}", role),
            Locator::Text { text } => format!("text={}", text),
            Locator::Row {
                table,
                has_text,
                column,
                inner,
            } => {
                let row = match column {
                    Some(column) => format!("{} tr:has(td:nth-child({}):text-is({}))", table, column + 1, has_text),
                    None => format!("{} tr:has-text({})", table, has_text),
                };
                match inner {
                    Some(inner) => format!("{} {}", row, inner),
                    None => row,
                }
            }
        }
    }
}

/// One browser page. Actions return once the browser reports the action done.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to a path relative to the base URL
    async fn goto(&self, path: &str) -> E2eResult<()>;

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()>;

    async fn click(&self, locator: &Locator) -> E2eResult<()>;

    async fn check(&self, locator: &Locator) -> E2eResult<()>;

    async fn is_checked(&self, locator: &Locator) -> E2eResult<bool>;

    /// Wait until `text` appears anywhere in the page body
    async fn wait_for_text(&self, text: &str, timeout: Duration) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    /// Cell texts of the row matched by `row`, `None` when no row matches
    async fn row_cells(&self, row: &Locator) -> E2eResult<Option<Vec<String>>>;

    /// Persist cookies and local storage as a storage-state file
    async fn save_storage_state(&self, path: &Path) -> E2eResult<()>;

    async fn close(&self) -> E2eResult<()>;
}

/// Creates pages, optionally pre-loaded with a stored session
#[async_trait]
pub trait PageLauncher: Send + Sync {
    async fn launch(&self, storage_state: Option<&Path>) -> E2eResult<Arc<dyn Page>>;
}
