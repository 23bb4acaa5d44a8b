//! Directory types and the protocol seam
//!
//! The authenticator talks to the directory through [`DirectoryConnector`]
//! and [`DirectorySession`]; [`super::LdapConnector`] implements them on
//! top of ldap3.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Entries
// ============================================================================

/// A directory entry returned by a search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished Name
    pub dn: String,

    /// Attribute values by attribute name
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    pub fn with_attr<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// First value of an attribute
    pub fn first_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .get(name)
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }

    /// All values of an attribute, empty when absent
    pub fn attr_values(&self, name: &str) -> &[String] {
        self.attrs.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Search scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// The base entry only
    Base,
    /// Immediate children of the base entry
    OneLevel,
    /// The base entry and everything below it
    Subtree,
}

impl From<SearchScope> for ldap3::Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => ldap3::Scope::Base,
            SearchScope::OneLevel => ldap3::Scope::OneLevel,
            SearchScope::Subtree => ldap3::Scope::Subtree,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Why a directory authentication did not succeed
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("could not connect to directory server: {0}")]
    Connect(String),

    #[error("directory did not answer within {0:?}")]
    Timeout(Duration),

    #[error("directory search failed: {0}")]
    Search(String),

    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("found {count} entries for user '{user}', expected only one")]
    AmbiguousUser { user: String, count: usize },

    #[error("group '{0}' not found")]
    GroupNotFound(String),

    #[error("found {count} entries for group '{group}', expected only one")]
    AmbiguousGroup { group: String, count: usize },

    #[error("user '{user}' is not a member of '{group}'")]
    NotMember { user: String, group: String },

    #[error("empty password")]
    EmptyPassword,

    #[error("bind failed for '{dn}': {reason}")]
    Bind { dn: String, reason: String },
}

impl DirectoryError {
    /// True when the directory itself is unusable, as opposed to the
    /// credentials being rejected.
    pub fn is_backend_fault(&self) -> bool {
        matches!(self, DirectoryError::Connect(_) | DirectoryError::Timeout(_))
    }
}

// ============================================================================
// Protocol seam
// ============================================================================

/// Opens sessions against a directory server
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DirectorySession>, DirectoryError>;
}

/// One open directory connection
#[async_trait]
pub trait DirectorySession: Send {
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError>;

    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_attributes() {
        let entry = DirectoryEntry::new("cn=admins,ou=groups,dc=example,dc=com")
            .with_attr("cn", ["admins"])
            .with_attr("memberUid", ["alice", "bob"]);

        assert_eq!(entry.first_attr("cn"), Some("admins"));
        assert_eq!(entry.attr_values("memberUid"), ["alice", "bob"]);
        assert!(entry.first_attr("mail").is_none());
        assert!(entry.attr_values("mail").is_empty());
    }

    #[test]
    fn test_backend_faults() {
        assert!(DirectoryError::Connect("refused".into()).is_backend_fault());
        assert!(DirectoryError::Timeout(Duration::from_secs(1)).is_backend_fault());
        assert!(!DirectoryError::Search("busy".into()).is_backend_fault());
        assert!(!DirectoryError::UserNotFound("alice".into()).is_backend_fault());
        assert!(!DirectoryError::EmptyPassword.is_backend_fault());
        assert!(!DirectoryError::Bind {
            dn: "uid=alice".into(),
            reason: "invalid credentials".into()
        }
        .is_backend_fault());
    }
}
