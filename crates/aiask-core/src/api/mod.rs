//! REST API module for the platform and completion services.
//!
//! `ApiClient` is the single authenticated transport. The token exchange and
//! the chat request are thin calls on top of it: the first presents the
//! platform token with the legacy `token` scheme, the second presents the
//! service token as a bearer credential.

pub mod chat;
pub mod client;
pub mod error;
pub mod token;

pub use chat::{ask, ChatMessage, ChatRequest, ChatResponse, NO_RESPONSE};
pub use client::{ApiClient, AuthScheme};
pub use error::ApiError;
pub use token::exchange_token;
