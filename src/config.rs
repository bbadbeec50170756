//! Application-level configuration loading: JSON file first, environment variables on top.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    dao::{backend::error::InitError, backend::local::DEFAULT_NAMESPACE, models::SignInMode},
    services::retry::{Backoff, RetryPolicy},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "GOLF_SCORE_BACK_CONFIG_PATH";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub port: u16,
    /// Directory holding the local fallback documents.
    pub data_dir: PathBuf,
    /// Prefix of every local document name.
    pub namespace: String,
    pub google: GoogleConfig,
    pub init: InitConfig,
}

/// Google Sheets and OAuth deployment settings.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub spreadsheet_id: String,
    /// Separate spreadsheet for the `Users` table, when not shared with scores.
    pub users_spreadsheet_id: Option<String>,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub sign_in_mode: SignInMode,
    pub request_timeout: Duration,
    /// Endpoint overrides, mainly for tests and proxies.
    pub api_base_url: Option<String>,
    pub discovery_url: Option<String>,
    pub openid_config_url: Option<String>,
}

/// Settings of the remote backend start-up.
#[derive(Debug, Clone, Copy)]
pub struct InitConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound on a single initialization attempt.
    pub readiness_timeout: Duration,
}

impl InitConfig {
    pub fn retry_policy(&self) -> RetryPolicy<InitError> {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Backoff::Doubling {
                initial: self.initial_delay,
                max: self.max_delay,
            },
            ..RetryPolicy::default()
        }
    }
}

impl Default for InitConfig {
    fn default() -> Self {
        let policy = RetryPolicy::<InitError>::default();
        let (initial_delay, max_delay) = match policy.backoff {
            Backoff::Doubling { initial, max } => (initial, max),
            Backoff::Fixed(delay) => (delay, delay),
        };
        Self {
            max_attempts: policy.max_attempts,
            initial_delay,
            max_delay,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
        }
    }
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        config.apply_env(|key| env::var(key).ok());
        config
    }

    fn load_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Override file values with whatever `lookup` finds. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("GOOGLE_SPREADSHEET_ID") {
            self.google.spreadsheet_id = value;
        }
        if let Some(value) = get("GOOGLE_USERS_SHEET_ID") {
            self.google.users_spreadsheet_id = Some(value);
        }
        if let Some(value) = get("GOOGLE_CLIENT_ID") {
            self.google.client_id = value;
        }
        if let Some(value) = get("GOOGLE_CLIENT_SECRET") {
            self.google.client_secret = Some(value);
        }
        if let Some(value) = get("GOOGLE_REDIRECT_URI") {
            self.google.redirect_uri = Some(value);
        }
        if let Some(value) = get("GOLF_SCORE_DATA_DIR") {
            self.data_dir = PathBuf::from(value);
        }
        match get("PORT").map(|value| value.parse::<u16>()) {
            Some(Ok(port)) => self.port = port,
            Some(Err(err)) => warn!(error = %err, "ignoring invalid PORT"),
            None => {}
        }
    }

    /// Settings for the Google Sheets backend.
    #[cfg(feature = "sheets-store")]
    pub fn sheets_config(&self) -> crate::dao::backend::sheets::SheetsConfig {
        use crate::dao::backend::sheets::{OAuthConfig, SheetsConfig};

        let google = &self.google;
        let oauth = OAuthConfig {
            client_secret: google.client_secret.clone(),
            mode: google.sign_in_mode,
            redirect_uri: google.redirect_uri.clone(),
            ..OAuthConfig::new(google.client_id.clone())
        };
        let mut sheets = SheetsConfig::new(google.spreadsheet_id.clone(), oauth);
        if let Some(users) = &google.users_spreadsheet_id {
            sheets = sheets.with_users_spreadsheet(users.clone());
        }
        if let Some(url) = &google.api_base_url {
            sheets.api_base_url = url.clone();
        }
        if let Some(url) = &google.discovery_url {
            sheets.discovery_url = url.clone();
        }
        if let Some(url) = &google.openid_config_url {
            sheets.oauth.openid_config_url = url.clone();
        }
        sheets.request_timeout = google.request_timeout;
        sheets
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: default_data_dir(),
            namespace: DEFAULT_NAMESPACE.into(),
            google: GoogleConfig::default(),
            init: InitConfig::default(),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            users_spreadsheet_id: None,
            client_id: String::new(),
            client_secret: None,
            redirect_uri: None,
            sign_in_mode: SignInMode::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            api_base_url: None,
            discovery_url: None,
            openid_config_url: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    data_dir: Option<PathBuf>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    google: RawGoogle,
    #[serde(default)]
    init: RawInit,
}

#[derive(Debug, Default, Deserialize)]
struct RawGoogle {
    #[serde(default)]
    spreadsheet_id: Option<String>,
    #[serde(default)]
    users_spreadsheet_id: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    redirect_uri: Option<String>,
    #[serde(default)]
    sign_in_mode: Option<SignInMode>,
    #[serde(default)]
    request_timeout_ms: Option<u64>,
    #[serde(default)]
    api_base_url: Option<String>,
    #[serde(default)]
    discovery_url: Option<String>,
    #[serde(default)]
    openid_config_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawInit {
    #[serde(default)]
    max_attempts: Option<u32>,
    #[serde(default)]
    initial_delay_ms: Option<u64>,
    #[serde(default)]
    max_delay_ms: Option<u64>,
    #[serde(default)]
    readiness_timeout_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = Self::default();
        let google = GoogleConfig {
            spreadsheet_id: raw.google.spreadsheet_id.unwrap_or_default(),
            users_spreadsheet_id: raw.google.users_spreadsheet_id,
            client_id: raw.google.client_id.unwrap_or_default(),
            client_secret: raw.google.client_secret,
            redirect_uri: raw.google.redirect_uri,
            sign_in_mode: raw.google.sign_in_mode.unwrap_or_default(),
            request_timeout: raw
                .google
                .request_timeout_ms
                .map_or(defaults.google.request_timeout, Duration::from_millis),
            api_base_url: raw.google.api_base_url,
            discovery_url: raw.google.discovery_url,
            openid_config_url: raw.google.openid_config_url,
        };
        let init = InitConfig {
            max_attempts: raw.init.max_attempts.unwrap_or(defaults.init.max_attempts),
            initial_delay: raw
                .init
                .initial_delay_ms
                .map_or(defaults.init.initial_delay, Duration::from_millis),
            max_delay: raw
                .init
                .max_delay_ms
                .map_or(defaults.init.max_delay, Duration::from_millis),
            readiness_timeout: raw
                .init
                .readiness_timeout_ms
                .map_or(defaults.init.readiness_timeout, Duration::from_millis),
        };

        Self {
            port: raw.port.unwrap_or(defaults.port),
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
            namespace: raw.namespace.unwrap_or(defaults.namespace),
            google,
            init,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Per-user data directory, or `./data` when the platform has none.
fn default_data_dir() -> PathBuf {
    ProjectDirs::from("dev", "golf-score", "golf-score-back")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn file_values_fill_in_over_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "port": 9000,
                "google": { "spreadsheet_id": "sheet-1", "client_id": "client", "sign_in_mode": "redirect" },
                "init": { "max_attempts": 5, "readiness_timeout_ms": 2000 }
            }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.port, 9000);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.google.spreadsheet_id, "sheet-1");
        assert_eq!(config.google.sign_in_mode, SignInMode::Redirect);
        assert_eq!(config.init.max_attempts, 5);
        assert_eq!(config.init.readiness_timeout, Duration::from_secs(2));
        assert_eq!(config.init.initial_delay, InitConfig::default().initial_delay);
    }

    #[test]
    fn environment_overrides_file() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("GOOGLE_SPREADSHEET_ID", "from-env"),
            ("GOOGLE_USERS_SHEET_ID", "users-env"),
            ("GOOGLE_CLIENT_ID", ""),
            ("GOLF_SCORE_DATA_DIR", "/tmp/golf"),
            ("PORT", "not-a-port"),
        ]);
        let mut config = AppConfig::default();
        config.google.client_id = "from-file".into();
        config.apply_env(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.google.spreadsheet_id, "from-env");
        assert_eq!(config.google.users_spreadsheet_id.as_deref(), Some("users-env"));
        assert_eq!(config.google.client_id, "from-file");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/golf"));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn retry_policy_follows_init_settings() {
        let init = InitConfig {
            max_attempts: 4,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(15),
            readiness_timeout: Duration::from_secs(1),
        };
        let policy = init.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_after(2), Duration::from_millis(15));
    }

    #[cfg(feature = "sheets-store")]
    #[test]
    fn sheets_config_uses_separate_users_sheet() {
        let mut config = AppConfig::default();
        config.google.spreadsheet_id = "scores".into();
        config.google.users_spreadsheet_id = Some("users".into());
        config.google.client_id = "client".into();

        let sheets = config.sheets_config();
        assert_eq!(sheets.scores_spreadsheet_id, "scores");
        assert_eq!(sheets.users_spreadsheet_id, "users");
        assert_eq!(sheets.oauth.client_id, "client");
    }
}
