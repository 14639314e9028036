//! Authenticated HTTP transport shared by every remote call.
//!
//! One `reqwest::Client` carries the client identity headers. Callers derive
//! credentialed copies with [`ApiClient::with_credential`]; the copies share
//! the connection pool.

use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Client, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::config::ClientIdentity;
use crate::utils::mask_token;

use super::ApiError;

/// How a credential is presented in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <credential>`
    Bearer,
    /// Legacy `Authorization: token <credential>`, used by the token issuance endpoint
    Token,
}

impl AuthScheme {
    fn header_value(self, credential: &str) -> String {
        match self {
            AuthScheme::Bearer => format!("Bearer {}", credential),
            AuthScheme::Token => format!("token {}", credential),
        }
    }
}

#[derive(Clone)]
struct Credential {
    scheme: AuthScheme,
    secret: String,
}

/// HTTP client for the platform endpoints.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    credential: Option<Credential>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("scheme", &self.credential.as_ref().map(|c| c.scheme))
            .field("credential", &self.credential.as_ref().map(|c| mask_token(&c.secret)))
            .finish()
    }
}

impl ApiClient {
    /// Create an unauthenticated client that reports `identity` on every request
    pub fn new(identity: &ClientIdentity) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(identity.user_agent.as_str())
            .default_headers(identity_headers(identity)?)
            .build()?;

        Ok(Self {
            client,
            credential: None,
        })
    }

    /// Create a copy that authenticates with `credential`, sharing the connection pool.
    pub fn with_credential(&self, scheme: AuthScheme, credential: &str) -> Self {
        Self {
            client: self.client.clone(),
            credential: Some(Credential {
                scheme,
                secret: credential.to_string(),
            }),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    fn auth_headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(ref credential) = self.credential {
            let value = HeaderValue::from_str(&credential.scheme.header_value(&credential.secret))
                .map_err(|e| ApiError::InvalidHeader(e.to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
        let response = Self::check_response(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e)))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        debug!(url = url, authenticated = self.is_authenticated(), "GET");
        let response = self
            .client
            .get(url)
            .headers(self.auth_headers()?)
            .send()
            .await?;
        Self::parse(response, url).await
    }

    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(url = url, authenticated = self.is_authenticated(), "POST");
        let response = self
            .client
            .post(url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await?;
        Self::parse(response, url).await
    }

    /// POST and parse the JSON body whatever the status.
    ///
    /// For endpoints that report protocol errors in the body of a non-2xx
    /// response. A body that does not parse falls back to the status mapping.
    pub async fn post_json_any_status<B, T>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<(StatusCode, T), ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(url = url, authenticated = self.is_authenticated(), "POST");
        let response = self
            .client
            .post(url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        match serde_json::from_str(&text) {
            Ok(parsed) => Ok((status, parsed)),
            Err(_) if !status.is_success() => Err(ApiError::from_status(status, &text)),
            Err(e) => Err(ApiError::InvalidResponse(format!(
                "Failed to parse JSON from {}: {}",
                url, e
            ))),
        }
    }
}

fn identity_headers(identity: &ClientIdentity) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

    let pairs = [
        ("vscode-machineid", &identity.machine_id),
        ("vscode-sessionid", &identity.session_id),
        ("editor-version", &identity.editor_version),
        ("editor-plugin-version", &identity.plugin_version),
        ("copilot-integration-id", &identity.integration_id),
    ];
    for (name, value) in pairs {
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
        headers.insert(HeaderName::from_static(name), value);
    }
    Ok(headers)
}
