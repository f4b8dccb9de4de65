//! Authenticated-session provider
//!
//! Signs in once per run and persists the browser storage state. Every page
//! that needs an authenticated context is launched from that file; nothing
//! writes to it after the provider has produced it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::browser::{Page, PageLauncher};
use crate::config::{Credentials, HarnessConfig};
use crate::error::{E2eError, E2eResult};
use crate::pages::{message, url_path, SignInForm};

/// Browser storage state as written by Playwright
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<serde_json::Value>,
    #[serde(default)]
    pub origins: Vec<serde_json::Value>,
}

/// The persisted session, consumed by path
#[derive(Debug, Clone)]
pub struct SessionArtifact {
    path: PathBuf,
    state: StorageState,
}

impl SessionArtifact {
    /// Read and check a storage-state file
    pub fn load(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            E2eError::SessionSetup(format!("cannot read session artifact {}: {}", path.display(), e))
        })?;
        let state: StorageState = serde_json::from_str(&content)?;
        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cookie_count(&self) -> usize {
        self.state.cookies.len()
    }
}

fn cached_outcome(outcome: &Result<Arc<SessionArtifact>, String>) -> E2eResult<Arc<SessionArtifact>> {
    match outcome {
        Ok(artifact) => Ok(Arc::clone(artifact)),
        Err(reason) => Err(E2eError::Aborted {
            name: "session".to_string(),
            reason: reason.clone(),
        }),
    }
}

/// Produces the [`SessionArtifact`] at most once.
///
/// The outcome, success or failure, is kept for the rest of the run: a failed
/// sign-in is reported to every later caller without another attempt.
pub struct SessionProvider {
    config: Arc<HarnessConfig>,
    launcher: Arc<dyn PageLauncher>,
    outcome: OnceCell<Result<Arc<SessionArtifact>, String>>,
    attempts: AtomicUsize,
}

impl SessionProvider {
    pub fn new(config: Arc<HarnessConfig>, launcher: Arc<dyn PageLauncher>) -> Self {
        Self {
            config,
            launcher,
            outcome: OnceCell::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of sign-in flows started so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Acquire)
    }

    /// The session artifact, signing in on first use.
    ///
    /// Sign-in runs on its own task, so a caller that gives up waiting does
    /// not cancel it and the next caller gets the same outcome.
    pub async fn ensure(self: &Arc<Self>) -> E2eResult<Arc<SessionArtifact>> {
        if let Some(outcome) = self.outcome.get() {
            return cached_outcome(outcome);
        }

        let provider = Arc::clone(self);
        let task = tokio::spawn(async move {
            let this: &SessionProvider = &provider;
            let mut first_failure = None;
            let failure = &mut first_failure;
            let outcome = this
                .outcome
                .get_or_init(move || async move {
                    match this.establish().await {
                        Ok(artifact) => Ok(Arc::new(artifact)),
                        Err(e) => {
                            error!(error = %e, "session setup failed");
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

        let (outcome, first_failure) = task
            .await
            .map_err(|e| E2eError::SessionSetup(format!("sign-in task failed: {}", e)))?;
        match first_failure {
            Some(e) => Err(e),
            None => cached_outcome(&outcome),
        }
    }

    async fn establish(&self) -> E2eResult<SessionArtifact> {
        let path = &self.config.auth_file;
        if self.config.reuse_session && path.exists() {
            info!(path = %path.display(), "reusing stored session");
            return SessionArtifact::load(path);
        }

        let credentials = self.config.credentials()?;
        self.attempts.fetch_add(1, Ordering::AcqRel);
        info!(email = %credentials.email, "signing in");

        let page = self.launcher.launch(None).await?;
        let signed_in = self.sign_in(&page, credentials, path).await;
        let closed = page.close().await;
        signed_in?;
        closed?;

        let artifact = SessionArtifact::load(path)?;
        info!(path = %path.display(), cookies = artifact.cookie_count(), "session stored");
        Ok(artifact)
    }

    async fn sign_in(&self, page: &Arc<dyn Page>, credentials: &Credentials, path: &Path) -> E2eResult<()> {
        let timeout = self.config.playwright.action_timeout;

        page.goto(url_path::HOME).await?;
        page.wait_for_text(message::SIGN_IN_OR_SIGN_UP, timeout)
            .await
            .map_err(|e| E2eError::SessionSetup(format!("sign-in prompt not shown: {}", e)))?;

        let form = SignInForm::new(Arc::clone(page));
        if form.is_remember_me_checked().await? {
            return Err(E2eError::SessionSetup(
                "remember-me checkbox is checked before sign-in".to_string(),
            ));
        }
        form.login(credentials).await?;

        page.wait_for_text(message::SIGNED_IN_SUCCESSFULLY, timeout)
            .await
            .map_err(|e| E2eError::SessionSetup(format!("sign-in was not confirmed: {}", e)))?;

        page.save_storage_state(path).await
    }
}
