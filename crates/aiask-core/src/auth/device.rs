//! OAuth device authorization flow.
//!
//! 1. Request a device code and a user code.
//! 2. Show the user code and verification URL to the human.
//! 3. Poll the access-token endpoint every `interval` seconds until the
//!    provider returns a credential, reports a terminal error, or the
//!    attempt ceiling is reached.
//!
//! Polling is strictly sequential: one request in flight at a time.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::config::Config;

use super::{AuthError, PlatformToken, TokenStore};

/// Grant type for the device code token request
pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Error code: user has not approved yet, keep polling
pub const ERROR_AUTHORIZATION_PENDING: &str = "authorization_pending";

const ERROR_ACCESS_DENIED: &str = "access_denied";
const ERROR_EXPIRED_TOKEN: &str = "expired_token";

/// Interval used when the provider omits one
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

fn default_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

#[derive(Debug, Serialize)]
struct DeviceCodeRequest<'a> {
    client_id: &'a str,
    scope: &'a str,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default = "default_interval")]
    interval: u64,
}

impl DeviceCodeResponse {
    fn into_session(self) -> DeviceSession {
        DeviceSession {
            device_code: self.device_code,
            user_code: self.user_code,
            verification_uri: self.verification_uri,
            interval: self.interval,
        }
    }
}

#[derive(Debug, Serialize)]
struct AccessTokenRequest<'a> {
    client_id: &'a str,
    device_code: &'a str,
    grant_type: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct AccessTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl AccessTokenResponse {
    fn into_outcome(self) -> Result<PollOutcome, AuthError> {
        if let Some(token) = self.access_token.filter(|t| !t.is_empty()) {
            return Ok(PollOutcome::Authorized(PlatformToken::new(token)));
        }

        match self.error.as_deref() {
            Some(ERROR_AUTHORIZATION_PENDING) => Ok(PollOutcome::Pending),
            Some(ERROR_ACCESS_DENIED) => Err(AuthError::AccessDenied),
            Some(ERROR_EXPIRED_TOKEN) => Err(AuthError::ExpiredToken),
            Some(code) => Err(AuthError::Provider {
                code: code.to_string(),
                description: self.error_description,
            }),
            None => Err(AuthError::MalformedResponse),
        }
    }
}

/// Transient state of one authorization attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Seconds to wait before each poll
    pub interval: u64,
}

impl DeviceSession {
    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

/// Result of a single poll that did not end the flow with an error.
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Pending,
    Authorized(PlatformToken),
}

/// Presents the device flow to the human approving it.
pub trait DevicePrompt: Send + Sync {
    fn show_code(&self, session: &DeviceSession);

    fn authorized(&self) {}
}

/// Prints instructions to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompt;

impl DevicePrompt for ConsolePrompt {
    fn show_code(&self, session: &DeviceSession) {
        println!("\nGo to: {}", session.verification_uri);
        println!("Enter code: {}", session.user_code);
    }

    fn authorized(&self) {
        println!("Authentication successful!");
    }
}

pub struct DeviceFlow {
    api: ApiClient,
    client_id: String,
    scope: String,
    device_code_url: String,
    access_token_url: String,
    max_attempts: u32,
    prompt: Arc<dyn DevicePrompt>,
}

impl DeviceFlow {
    /// `api` must be unauthenticated; the device endpoints take no credential.
    pub fn new(api: ApiClient, config: &Config, prompt: Arc<dyn DevicePrompt>) -> Self {
        Self {
            api,
            client_id: config.client_id.clone(),
            scope: config.scope.clone(),
            device_code_url: config.endpoints.device_code_url.clone(),
            access_token_url: config.endpoints.access_token_url.clone(),
            max_attempts: config.max_poll_attempts,
            prompt,
        }
    }

    /// Request a device code. No retry: any failure is fatal.
    pub async fn request_code(&self) -> Result<DeviceSession, AuthError> {
        info!("Starting device authorization");

        let body = DeviceCodeRequest {
            client_id: &self.client_id,
            scope: &self.scope,
        };
        let response: DeviceCodeResponse = self.api.post_json(&self.device_code_url, &body).await?;

        debug!(
            user_code = %response.user_code,
            verification_uri = %response.verification_uri,
            interval = response.interval,
            "Device code issued"
        );
        Ok(response.into_session())
    }

    /// Ask the provider once whether the session has been approved.
    pub async fn poll_once(&self, session: &DeviceSession) -> Result<PollOutcome, AuthError> {
        let body = AccessTokenRequest {
            client_id: &self.client_id,
            device_code: &session.device_code,
            grant_type: DEVICE_CODE_GRANT_TYPE,
        };
        // Error codes arrive in the body, often with a 400 status
        let (status, response): (_, AccessTokenResponse) = self
            .api
            .post_json_any_status(&self.access_token_url, &body)
            .await?;

        if !status.is_success() && response.access_token.is_none() && response.error.is_none() {
            return Err(ApiError::from_status(status, "response carried no error code").into());
        }
        response.into_outcome()
    }

    /// Poll until approval, a terminal provider error, or the attempt ceiling.
    pub async fn poll_until_complete(&self, session: &DeviceSession) -> Result<PlatformToken, AuthError> {
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(session.poll_delay()).await;

            match self.poll_once(session).await {
                Ok(PollOutcome::Authorized(token)) => {
                    info!(attempt, token = ?token, "Device authorization approved");
                    return Ok(token);
                }
                Ok(PollOutcome::Pending) => {
                    debug!(attempt, max_attempts = self.max_attempts, "Authorization pending");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Device authorization failed");
                    return Err(e);
                }
            }
        }

        warn!(attempts = self.max_attempts, "Device authorization timed out");
        Err(AuthError::Timeout {
            attempts: self.max_attempts,
        })
    }

    /// Run the whole flow without persisting the result
    pub async fn run(&self) -> Result<PlatformToken, AuthError> {
        let session = self.request_code().await?;
        self.prompt.show_code(&session);
        self.poll_until_complete(&session).await
    }

    /// Run the flow and persist the resulting token to `store`
    pub async fn authorize(&self, store: &TokenStore) -> Result<PlatformToken> {
        let token = self.run().await?;
        store.save(&token)?;
        self.prompt.authorized();
        Ok(token)
    }
}
