//! LDAP directory authentication
//!
//! Provides:
//! - User lookup by search filter
//! - Group membership checks against mandatory and requested groups
//! - Password verification by binding as the resolved entry
//! - LDAPS, plaintext, and STARTTLS connections

mod authenticator;
mod client;
mod types;

pub use authenticator::LdapAuthenticator;
pub use client::LdapConnector;
pub use types::*;
