//! Service token exchange.
//!
//! Trades the long-lived platform token for a short-lived service token.
//! The service token is only ever held in memory for the current run.

use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::{PlatformToken, ServiceToken};

use super::{ApiClient, ApiError, AuthScheme};

#[derive(Debug, Deserialize)]
struct ServiceTokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

impl ServiceTokenResponse {
    fn into_token(self) -> Result<ServiceToken, ApiError> {
        self.token
            .filter(|t| !t.is_empty())
            .map(ServiceToken::new)
            .ok_or(ApiError::MissingField("token"))
    }
}

/// Exchange `platform` for a service token. No retry.
pub async fn exchange_token(
    api: &ApiClient,
    url: &str,
    platform: &PlatformToken,
) -> Result<ServiceToken, ApiError> {
    debug!(token = ?platform, "Exchanging platform token for service token");

    let response: ServiceTokenResponse = api
        .with_credential(AuthScheme::Token, platform.as_str())
        .get_json(url)
        .await?;

    let expires_at = response.expires_at;
    let token = response.into_token()?;
    info!(token = ?token, expires_at = ?expires_at, "Service token obtained");
    Ok(token)
}
