//! Authgate Core Library
//!
//! Configuration, error types, and shared constants for the authgate
//! Basic-Auth gateway.

pub mod config;
pub mod error;
pub mod metrics;

pub use config::AuthgateConfig;
pub use error::{Error, Result};

/// Authgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default realm announced in `WWW-Authenticate` challenges
pub const DEFAULT_REALM: &str = "authgate";

/// Default LDAPS port
pub const LDAPS_PORT: u16 = 636;

/// Default plaintext LDAP port
pub const LDAP_PORT: u16 = 389;

/// Placeholder substituted with the username in the user search filter
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Placeholder substituted with the group name in the group search filter
pub const GROUP_PLACEHOLDER: &str = "{group}";
