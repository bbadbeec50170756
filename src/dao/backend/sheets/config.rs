use std::time::Duration;

use crate::dao::{
    backend::error::{InitError, InitErrorKind},
    models::SignInMode,
};

/// Google Sheets REST root.
pub const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com";
/// Sheets API discovery document, loaded once to prove the client API is reachable.
pub const DEFAULT_DISCOVERY_URL: &str = "https://sheets.googleapis.com/$discovery/rest?version=v4";
/// Google's OpenID configuration, listing the OAuth endpoints.
pub const DEFAULT_OPENID_CONFIG_URL: &str =
    "https://accounts.google.com/.well-known/openid-configuration";
/// Scopes requested at sign-in.
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets openid email profile";
pub const DEFAULT_USERS_RANGE: &str = "Users!A:F";
pub const DEFAULT_SCORES_RANGE: &str = "Scores!A:X";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// OAuth client settings for the Google sign-in flow.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Needed only to exchange authorization codes in redirect mode.
    pub client_secret: Option<String>,
    pub scope: String,
    pub mode: SignInMode,
    pub redirect_uri: Option<String>,
    pub openid_config_url: String,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            scope: DEFAULT_SCOPE.into(),
            mode: SignInMode::default(),
            redirect_uri: None,
            openid_config_url: DEFAULT_OPENID_CONFIG_URL.into(),
        }
    }

    /// Switch to the redirect flow, exchanging codes with the given secret.
    pub fn with_redirect(
        mut self,
        redirect_uri: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.mode = SignInMode::Redirect;
        self.redirect_uri = Some(redirect_uri.into());
        self.client_secret = Some(client_secret.into());
        self
    }
}

/// Runtime configuration describing which spreadsheets hold the data and how to reach them.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub api_base_url: String,
    pub discovery_url: String,
    /// Spreadsheet holding the `Scores` table.
    pub scores_spreadsheet_id: String,
    /// Spreadsheet holding the `Users` table. Usually the same as the scores one.
    pub users_spreadsheet_id: String,
    pub scores_range: String,
    pub users_range: String,
    /// Per-request timeout applied by the HTTP client.
    pub request_timeout: Duration,
    pub oauth: OAuthConfig,
}

impl SheetsConfig {
    /// Configuration with both tables living in `spreadsheet_id`.
    pub fn new(spreadsheet_id: impl Into<String>, oauth: OAuthConfig) -> Self {
        let spreadsheet_id = spreadsheet_id.into();
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            discovery_url: DEFAULT_DISCOVERY_URL.into(),
            users_spreadsheet_id: spreadsheet_id.clone(),
            scores_spreadsheet_id: spreadsheet_id,
            scores_range: DEFAULT_SCORES_RANGE.into(),
            users_range: DEFAULT_USERS_RANGE.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            oauth,
        }
    }

    /// Keep the `Users` table in a separate spreadsheet.
    pub fn with_users_spreadsheet(mut self, spreadsheet_id: impl Into<String>) -> Self {
        self.users_spreadsheet_id = spreadsheet_id.into();
        self
    }

    /// Reject deployments that can never initialize.
    pub fn validate(&self) -> Result<(), InitError> {
        let missing = |what: &str| InitError::new(InitErrorKind::Misconfigured, format!("{what} is not set"));

        if self.scores_spreadsheet_id.trim().is_empty() {
            return Err(missing("spreadsheet id"));
        }
        if self.users_spreadsheet_id.trim().is_empty() {
            return Err(missing("users spreadsheet id"));
        }
        if self.oauth.client_id.trim().is_empty() {
            return Err(missing("OAuth client id"));
        }
        if self.oauth.mode == SignInMode::Redirect {
            if self.oauth.redirect_uri.as_deref().is_none_or(str::is_empty) {
                return Err(missing("OAuth redirect URI"));
            }
            if self.oauth.client_secret.as_deref().is_none_or(str::is_empty) {
                return Err(missing("OAuth client secret"));
            }
        }
        Ok(())
    }
}
