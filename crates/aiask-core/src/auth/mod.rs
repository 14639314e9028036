//! Authentication module for the platform credential.
//!
//! This module provides:
//! - `TokenStore`: file cache for the long-lived platform token
//! - `DeviceFlow`: OAuth device authorization that fills the cache on a miss
//! - `PlatformToken` / `ServiceToken`: the two credential kinds

pub mod credential;
pub mod device;
pub mod error;
pub mod store;

pub use credential::{PlatformToken, ServiceToken};
pub use device::{ConsolePrompt, DeviceFlow, DevicePrompt, DeviceSession, PollOutcome};
pub use error::AuthError;
pub use store::TokenStore;
