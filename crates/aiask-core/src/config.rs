//! Application configuration.
//!
//! A `Config` is built once at startup and handed to every component by
//! reference. The only environment input is `DATA_DIR`, which relocates
//! both the cached token (`<DATA_DIR>/token`) and the interaction logs
//! (`<DATA_DIR>/logs`). Without it both live under the working directory.

use std::path::{Path, PathBuf};

/// Environment variable that relocates persisted state
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Token file name inside the data directory
const TOKEN_FILE: &str = "token";

/// Log directory name inside the data directory
const LOG_DIR: &str = "logs";

/// OAuth app registered for the device flow
const CLIENT_ID: &str = "01ab8ac9400c4e429b23";

/// OAuth scope requested during the device flow
const OAUTH_SCOPE: &str = "repo";

const SYSTEM_PROMPT: &str = "Answer shortly as an engineer would.";

const MODEL: &str = "gpt-4";

const TEMPERATURE: f32 = 0.7;

const MAX_TOKENS: u32 = 1000;

/// Poll attempts before the device flow gives up
const MAX_POLL_ATTEMPTS: u32 = 30;

const GITHUB_BASE_URL: &str = "https://github.com";
const GITHUB_API_BASE_URL: &str = "https://api.github.com";
const COPILOT_API_BASE_URL: &str = "https://api.githubcopilot.com";

/// Remote endpoints consumed by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub device_code_url: String,
    pub access_token_url: String,
    pub service_token_url: String,
    pub chat_completions_url: String,
}

impl Endpoints {
    /// Build endpoints from the three hosts involved in a run.
    ///
    /// Tests point all three at one mock server.
    pub fn with_bases(github: &str, api: &str, completions: &str) -> Self {
        let github = github.trim_end_matches('/');
        let api = api.trim_end_matches('/');
        let completions = completions.trim_end_matches('/');
        Self {
            device_code_url: format!("{}/login/device/code", github),
            access_token_url: format!("{}/login/oauth/access_token", github),
            service_token_url: format!("{}/copilot_internal/v2/token", api),
            chat_completions_url: format!("{}/chat/completions", completions),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::with_bases(GITHUB_BASE_URL, GITHUB_API_BASE_URL, COPILOT_API_BASE_URL)
    }
}

/// How this client identifies itself to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub machine_id: String,
    pub session_id: String,
    pub editor_version: String,
    pub plugin_version: String,
    pub integration_id: String,
    pub user_agent: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            machine_id: "cli".to_string(),
            session_id: "cli-session".to_string(),
            editor_version: "vscode/cli-vscode".to_string(),
            plugin_version: "AiAsk/1.0.0".to_string(),
            integration_id: "vscode-chat".to_string(),
            user_agent: format!("AiAsk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub scope: String,
    pub system_prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_poll_attempts: u32,
    pub token_path: PathBuf,
    pub log_dir: PathBuf,
    pub endpoints: Endpoints,
    pub identity: ClientIdentity,
}

impl Config {
    /// Build the configuration from the process environment
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os(DATA_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::for_data_dir(data_dir)
    }

    /// Build the configuration with persisted state rooted at `data_dir`,
    /// or at the working directory when `None`.
    pub fn for_data_dir(data_dir: Option<PathBuf>) -> Self {
        let root = data_dir.unwrap_or_else(|| PathBuf::from("."));
        Self {
            client_id: CLIENT_ID.to_string(),
            scope: OAUTH_SCOPE.to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            model: MODEL.to_string(),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            max_poll_attempts: MAX_POLL_ATTEMPTS,
            token_path: root.join(TOKEN_FILE),
            log_dir: root.join(LOG_DIR),
            endpoints: Endpoints::default(),
            identity: ClientIdentity::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_data_dir(None)
    }
}
