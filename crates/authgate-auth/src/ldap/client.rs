//! LDAP client on top of ldap3
//!
//! Opens one connection per authentication. Supports LDAPS, plaintext LDAP
//! and STARTTLS upgrades.

use async_trait::async_trait;
use authgate_core::config::LdapConfig;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, SearchEntry};
use tracing::{debug, warn};

use crate::ldap::types::*;

/// Connects to the configured directory server
pub struct LdapConnector {
    config: LdapConfig,
}

impl LdapConnector {
    pub fn new(config: LdapConfig) -> Self {
        Self { config }
    }

    pub fn url(&self) -> String {
        self.config.url()
    }

    fn settings(&self) -> LdapConnSettings {
        let mut settings = LdapConnSettings::new()
            .set_starttls(self.config.start_tls)
            .set_no_tls_verify(self.config.insecure);

        if let Some(timeout) = self.config.timeout() {
            settings = settings.set_conn_timeout(timeout);
        }

        settings
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let url = self.url();
        debug!("Connecting to LDAP server: {}", url);

        let (conn, ldap) = LdapConnAsync::with_settings(self.settings(), &url)
            .await
            .map_err(|e| DirectoryError::Connect(format!("{}: {}", url, e)))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection error: {}", e);
            }
        });

        Ok(Box::new(LdapSession { ldap }))
    }
}

struct LdapSession {
    ldap: Ldap,
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        debug!(base = %base, scope = ?scope, filter = %filter, "ldap search");

        let (rs, _res) = self
            .ldap
            .search(base, scope.into(), filter, attrs.to_vec())
            .await
            .map_err(|e| DirectoryError::Search(e.to_string()))?
            .success()
            .map_err(|e| DirectoryError::Search(e.to_string()))?;

        Ok(rs
            .into_iter()
            .map(|result| {
                let entry = SearchEntry::construct(result);
                DirectoryEntry {
                    dn: entry.dn,
                    attrs: entry.attrs,
                }
            })
            .collect())
    }

    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        let bind_error = |reason: String| DirectoryError::Bind {
            dn: dn.to_string(),
            reason,
        };

        self.ldap
            .simple_bind(dn, password)
            .await
            .map_err(|e| bind_error(e.to_string()))?
            .success()
            .map_err(|e| bind_error(e.to_string()))?;

        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            debug!("LDAP unbind failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_connector_url() {
        let config = LdapConfig {
            hostname: "ldap.example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(LdapConnector::new(config).url(), "ldaps://ldap.example.com:636");

        let config = LdapConfig {
            hostname: "ldap.example.com".to_string(),
            tls: false,
            start_tls: true,
            ..Default::default()
        };
        assert_eq!(LdapConnector::new(config).url(), "ldap://ldap.example.com:389");
    }

    #[test]
    fn test_connector_settings() {
        let config = LdapConfig {
            hostname: "ldap.example.com".to_string(),
            tls: false,
            start_tls: true,
            insecure: true,
            timeout_seconds: 0,
            ..Default::default()
        };
        let connector = LdapConnector::new(config);
        assert!(connector.settings().starttls());
        assert_eq!(connector.config.timeout(), None);

        let connector = LdapConnector::new(LdapConfig {
            hostname: "ldap.example.com".to_string(),
            ..Default::default()
        });
        assert!(!connector.settings().starttls());
        assert_eq!(connector.config.timeout(), Some(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_refused_connection_is_backend_fault() {
        // Nothing listens on port 1
        let config = LdapConfig {
            hostname: "127.0.0.1".to_string(),
            port: Some(1),
            tls: false,
            timeout_seconds: 2,
            ..Default::default()
        };

        let err = LdapConnector::new(config).connect().await.err().unwrap();
        assert!(matches!(err, DirectoryError::Connect(_)));
        assert!(err.is_backend_fault());
    }
}
