//! Directory-backed authenticator
//!
//! One authentication opens one connection and runs, in order:
//! 1. user lookup (exactly one entry below `base_dn`)
//! 2. canonical username check (logged, never fatal)
//! 3. membership in every mandatory group, then every requested group
//! 4. a bind as the resolved entry with the supplied password

use async_trait::async_trait;
use authgate_core::config::LdapConfig;
use authgate_core::{GROUP_PLACEHOLDER, USERNAME_PLACEHOLDER};
use ldap3::ldap_escape;
use tracing::{debug, error};

use crate::authenticator::{Authenticator, Verdict};
use crate::ldap::client::LdapConnector;
use crate::ldap::types::*;

/// Authenticates Basic credentials against an LDAP directory
pub struct LdapAuthenticator<C = LdapConnector> {
    config: LdapConfig,
    connector: C,
}

impl LdapAuthenticator<LdapConnector> {
    pub fn new(config: LdapConfig) -> Self {
        let connector = LdapConnector::new(config.clone());
        Self { config, connector }
    }
}

impl<C: DirectoryConnector> LdapAuthenticator<C> {
    pub fn with_connector(config: LdapConfig, connector: C) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// User search filter with the escaped username substituted
    pub fn user_filter(&self, user: &str) -> String {
        self.config
            .filter
            .replace(USERNAME_PLACEHOLDER, &ldap_escape(user))
    }

    /// Group search filter with the escaped group name substituted
    pub fn group_filter(&self, group: &str) -> String {
        self.config
            .group
            .filter
            .replace(GROUP_PLACEHOLDER, &ldap_escape(group))
    }

    async fn verify(
        &self,
        user: &str,
        pass: &str,
        extra_groups: &[String],
    ) -> Result<(), DirectoryError> {
        let mut session = self.connector.connect().await?;
        let result = self
            .verify_with_session(session.as_mut(), user, pass, extra_groups)
            .await;
        session.close().await;
        result
    }

    async fn verify_with_session(
        &self,
        session: &mut dyn DirectorySession,
        user: &str,
        pass: &str,
        extra_groups: &[String],
    ) -> Result<(), DirectoryError> {
        let entry = self.find_user(session, user).await?;

        let name_attribute = &self.config.name_attribute;
        match entry.first_attr(name_attribute) {
            Some(uid) if uid == user => {}
            actual => error!(
                user = %user,
                attribute = %name_attribute,
                actual = ?actual,
                "directory entry does not carry the requested username"
            ),
        }

        self.check_groups(session, user, &self.config.groups)
            .await
            .inspect_err(|e| debug!("user '{}' lacks a mandatory group: {}", user, e))?;

        self.check_groups(session, user, extra_groups)
            .await
            .inspect_err(|e| debug!("user '{}' lacks a requested group: {}", user, e))?;

        if pass.is_empty() {
            return Err(DirectoryError::EmptyPassword);
        }

        session.bind(&entry.dn, pass).await
    }

    async fn find_user(
        &self,
        session: &mut dyn DirectorySession,
        user: &str,
    ) -> Result<DirectoryEntry, DirectoryError> {
        let mut entries = session
            .search(
                &self.config.base_dn,
                SearchScope::Subtree,
                &self.user_filter(user),
                &[self.config.name_attribute.as_str()],
            )
            .await?;

        match entries.len() {
            1 => Ok(entries.remove(0)),
            0 => Err(DirectoryError::UserNotFound(user.to_string())),
            count => Err(DirectoryError::AmbiguousUser {
                user: user.to_string(),
                count,
            }),
        }
    }

    /// Stops at the first group that is missing or does not list `user`
    async fn check_groups(
        &self,
        session: &mut dyn DirectorySession,
        user: &str,
        groups: &[String],
    ) -> Result<(), DirectoryError> {
        let member_attribute = self.config.group.member_attribute.as_str();

        for group in groups {
            let mut entries = session
                .search(
                    &self.config.group.base_dn,
                    SearchScope::OneLevel,
                    &self.group_filter(group),
                    &[member_attribute],
                )
                .await?;

            let entry = match entries.len() {
                1 => entries.remove(0),
                0 => return Err(DirectoryError::GroupNotFound(group.clone())),
                count => {
                    return Err(DirectoryError::AmbiguousGroup {
                        group: group.clone(),
                        count,
                    })
                }
            };

            if !entry.attr_values(member_attribute).iter().any(|m| m == user) {
                return Err(DirectoryError::NotMember {
                    user: user.to_string(),
                    group: group.clone(),
                });
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<C: DirectoryConnector> Authenticator for LdapAuthenticator<C> {
    async fn authenticate(&self, user: &str, pass: &str, extra_groups: &[String]) -> Verdict {
        let outcome = match self.config.timeout() {
            Some(deadline) => tokio::time::timeout(deadline, self.verify(user, pass, extra_groups))
                .await
                .unwrap_or_else(|_| Err(DirectoryError::Timeout(deadline))),
            None => self.verify(user, pass, extra_groups).await,
        };

        match outcome {
            Ok(()) => {
                debug!(user = %user, "directory authentication succeeded");
                Verdict::Success
            }
            Err(e) if e.is_backend_fault() => {
                error!(user = %user, "directory unavailable: {}", e);
                Verdict::Error
            }
            Err(e) => {
                debug!(user = %user, "directory authentication denied: {}", e);
                Verdict::Failed
            }
        }
    }
}
