use thiserror::Error;

use crate::api::ApiError;

/// Failures of the device authorization flow.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Auth error: access_denied - the request was declined")]
    AccessDenied,

    #[error("Auth error: expired_token - the device code expired, please try again")]
    ExpiredToken,

    #[error("Auth error: {code}{}", describe(.description))]
    Provider {
        code: String,
        description: Option<String>,
    },

    #[error("Auth error: response carried neither a credential nor an error code")]
    MalformedResponse,

    #[error("Authentication timeout after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error(transparent)]
    Api(#[from] ApiError),
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" - {}", d))
        .unwrap_or_default()
}

impl AuthError {
    /// The provider error code surfaced to the caller, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            AuthError::AccessDenied => Some("access_denied"),
            AuthError::ExpiredToken => Some("expired_token"),
            AuthError::Provider { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}
