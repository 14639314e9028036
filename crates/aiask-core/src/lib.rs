//! aiask - ask a hosted chat model one question from the terminal.
//!
//! A run is four sequential network calls:
//!
//! 1. device authorization (only when no platform token is cached),
//! 2. exchange of the platform token for a short-lived service token,
//! 3. one chat completion request,
//!
//! followed by an append to the daily interaction log.
//!
//! ```rust,no_run
//! use aiask_core::{App, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::new(Config::from_env())?;
//!     let answer = app.ask("What is 2+2?").await?;
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod history;
pub mod utils;

pub use api::{ApiClient, ApiError, AuthScheme, NO_RESPONSE};
pub use app::App;
pub use auth::{
    AuthError, ConsolePrompt, DeviceFlow, DevicePrompt, DeviceSession, PlatformToken,
    ServiceToken, TokenStore,
};
pub use config::{ClientIdentity, Config, Endpoints, DATA_DIR_ENV};
pub use history::{InteractionLog, LogEntry};
