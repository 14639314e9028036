use std::fmt;

use crate::utils::mask_token;

/// Long-lived platform credential, persisted across runs by the token store.
#[derive(Clone, PartialEq, Eq)]
pub struct PlatformToken(String);

/// Short-lived service credential, held in memory for a single run.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceToken(String);

macro_rules! credential_impls {
    ($name:ident) => {
        impl $name {
            pub fn new(token: impl Into<String>) -> Self {
                Self(token.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name))
                    .field(&mask_token(&self.0))
                    .finish()
            }
        }
    };
}

credential_impls!(PlatformToken);
credential_impls!(ServiceToken);
