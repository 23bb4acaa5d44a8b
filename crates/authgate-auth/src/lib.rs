//! Authentication pipeline for Authgate
//!
//! A request's Basic credentials and requested groups flow through an
//! [`Authenticator`]: usually a [`CachedAuthenticator`] wrapping an
//! [`LdapAuthenticator`].

pub mod authenticator;
pub mod cache;
pub mod ldap;

pub use authenticator::{Authenticator, Verdict};
pub use cache::{cache_key, CachedAuthenticator};
pub use ldap::{
    DirectoryConnector, DirectoryEntry, DirectoryError, DirectorySession, LdapAuthenticator,
    LdapConnector, SearchScope,
};
