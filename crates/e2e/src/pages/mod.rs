//! Page objects for the account web UI
//!
//! Each page object wraps one region of the UI and exposes only the actions
//! and queries tests need. Actions return once the browser has performed
//! them; apart from navigation, confirming the resulting state is up to
//! the caller.

pub mod api_key;
pub mod navigation;
pub mod sign_in;

pub use api_key::{ApiKeyForm, ApiKeyTable, EditApiKeyModal};
pub use navigation::{NavigationBar, UserDropdownMenu};
pub use sign_in::SignInForm;

/// Paths relative to the UI base URL
pub mod url_path {
    pub const HOME: &str = "/";
    pub const SIGN_IN: &str = "/users/sign_in";
    pub const API_KEYS: &str = "/api_keys";
}

/// Flash messages shown by the UI
pub mod message {
    pub const SIGN_IN_OR_SIGN_UP: &str = "You need to sign in or sign up before continuing.";
    pub const SIGNED_IN_SUCCESSFULLY: &str = "Signed in successfully.";
    pub const API_KEY_EDITED: &str = "API key was edited successfully";
}
