//! Harness configuration loaded from the environment

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use reqwest::Url;

use crate::error::{E2eError, E2eResult};
use crate::playwright::PlaywrightConfig;

/// Sign-in credentials for the authenticated session
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Settings shared by every fixture in a run
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Web UI origin, e.g. `https://home.openweathermap.org`
    pub base_url: String,

    /// Weather API origin, e.g. `https://api.openweathermap.org`
    pub base_api_url: String,

    /// Activated API key used by default for API requests
    pub api_key: String,

    /// Only required by fixtures that sign in
    pub credentials: Option<Credentials>,

    /// Running under CI
    pub ci: bool,

    /// Where the session artifact is persisted
    pub auth_file: PathBuf,

    /// Load an existing session artifact instead of signing in again
    pub reuse_session: bool,

    /// Timeout for a single API request
    pub request_timeout: Duration,

    pub playwright: PlaywrightConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "https://home.openweathermap.org".to_string(),
            base_api_url: "https://api.openweathermap.org".to_string(),
            api_key: String::new(),
            credentials: None,
            ci: false,
            auth_file: PathBuf::from(".auth/user.json"),
            reuse_session: false,
            request_timeout: Duration::from_secs(15),
            playwright: PlaywrightConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Build from process environment variables
    pub fn from_env() -> E2eResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    ///
    /// Reads `BASE_URL`, `BASE_API_URL`, `API_KEY`, `USER_EMAIL`,
    /// `USER_PASSWORD`, `CI` and `AUTH_FILE`.
    pub fn from_lookup<F>(lookup: F) -> E2eResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| E2eError::Configuration(format!("{} is not set", key)))
        };

        let ci = match lookup("CI").as_deref() {
            None | Some("") => false,
            Some(v) => parse_bool("CI", v)?,
        };

        let credentials = match (lookup("USER_EMAIL"), lookup("USER_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(Credentials { email, password })
            }
            _ => None,
        };

        let mut config = Self {
            base_url: required("BASE_URL")?,
            base_api_url: required("BASE_API_URL")?,
            api_key: required("API_KEY")?,
            credentials,
            ci,
            ..Default::default()
        };

        if let Some(path) = lookup("AUTH_FILE").filter(|p| !p.is_empty()) {
            config.auth_file = PathBuf::from(path);
        }
        config.playwright.base_url = config.base_url.clone();
        if ci {
            config.playwright.headless = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check URLs, API key format and flag combinations
    pub fn validate(&self) -> E2eResult<()> {
        for (key, value) in [("BASE_URL", &self.base_url), ("BASE_API_URL", &self.base_api_url)] {
            let url = Url::parse(value)
                .map_err(|e| E2eError::Configuration(format!("{} is not a valid URL: {}", key, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(E2eError::Configuration(format!(
                    "{} must use http or https, got {}",
                    key,
                    url.scheme()
                )));
            }
        }

        validate_api_key(&self.api_key)?;

        if self.ci && self.reuse_session {
            return Err(E2eError::Configuration(
                "reusing a stored session is not allowed under CI".to_string(),
            ));
        }

        Ok(())
    }

    /// Credentials, or a configuration error naming the missing variables
    pub fn credentials(&self) -> E2eResult<&Credentials> {
        self.credentials.as_ref().ok_or_else(|| {
            E2eError::Configuration("USER_EMAIL and USER_PASSWORD must be set to sign in".to_string())
        })
    }
}

/// Load `.env` into the process environment. Variables that are already set
/// keep their value.
///
/// `STORMCHECK_ENV_FILE` names the file explicitly; otherwise `.env` is looked
/// up from the working directory upwards. Returns the file loaded, `None` when
/// there is none.
pub fn load_dotenv() -> E2eResult<Option<PathBuf>> {
    if let Some(path) = std::env::var_os("STORMCHECK_ENV_FILE") {
        let path = PathBuf::from(path);
        load_dotenv_from(&path)?;
        return Ok(Some(path));
    }
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(E2eError::Configuration(format!("cannot load .env: {}", e))),
    }
}

/// Load a specific `.env`-style file, keeping variables that are already set
pub fn load_dotenv_from(path: &Path) -> E2eResult<()> {
    dotenvy::from_path(path)
        .map_err(|e| E2eError::Configuration(format!("cannot load {}: {}", path.display(), e)))
}

/// API keys are 32 ASCII alphanumerics
pub fn validate_api_key(key: &str) -> E2eResult<()> {
    let pattern = Regex::new(r"^[a-zA-Z0-9]{32}$")
        .map_err(|e| E2eError::Configuration(e.to_string()))?;
    if pattern.is_match(key) {
        Ok(())
    } else {
        Err(E2eError::Configuration("Invalid API key provided".to_string()))
    }
}

fn parse_bool(key: &str, value: &str) -> E2eResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(E2eError::Configuration(format!("{} is not a boolean: {}", key, other))),
    }
}
