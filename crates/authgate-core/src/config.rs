//! Configuration for Authgate

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthgateConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub ldap: LdapConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AuthgateConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("Failed to read config {}: {}", path, e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse config: {}", e)))
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `AUTHGATE_*` overrides resolved through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("AUTHGATE_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }
        if let Some(port) = lookup("AUTHGATE_PORT") {
            self.server.port = parse_env("AUTHGATE_PORT", &port)?;
        }
        if let Some(realm) = lookup("AUTHGATE_REALM") {
            self.server.realm = realm;
        }

        if let Some(level) = lookup("AUTHGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("AUTHGATE_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Some(enabled) = lookup("AUTHGATE_CACHE_ENABLED") {
            self.cache.enabled = parse_bool("AUTHGATE_CACHE_ENABLED", &enabled)?;
        }
        if let Some(ttl) = lookup("AUTHGATE_CACHE_TTL") {
            self.cache.ttl_seconds = parse_env("AUTHGATE_CACHE_TTL", &ttl)?;
        }

        // LDAP transport
        if let Some(tls) = lookup("AUTHGATE_LDAP_TLS") {
            self.ldap.tls = parse_bool("AUTHGATE_LDAP_TLS", &tls)?;
        }
        if let Some(hostname) = lookup("AUTHGATE_LDAP_HOSTNAME") {
            self.ldap.hostname = hostname;
        }
        if let Some(port) = lookup("AUTHGATE_LDAP_PORT") {
            self.ldap.port = Some(parse_env("AUTHGATE_LDAP_PORT", &port)?);
        }
        if let Some(insecure) = lookup("AUTHGATE_LDAP_INSECURE") {
            self.ldap.insecure = parse_bool("AUTHGATE_LDAP_INSECURE", &insecure)?;
        }
        if let Some(start_tls) = lookup("AUTHGATE_LDAP_START_TLS") {
            self.ldap.start_tls = parse_bool("AUTHGATE_LDAP_START_TLS", &start_tls)?;
        }
        if let Some(timeout) = lookup("AUTHGATE_LDAP_TIMEOUT") {
            self.ldap.timeout_seconds = parse_env("AUTHGATE_LDAP_TIMEOUT", &timeout)?;
        }

        // LDAP user lookup
        if let Some(base_dn) = lookup("AUTHGATE_LDAP_BASE_DN") {
            self.ldap.base_dn = base_dn;
        }
        if let Some(filter) = lookup("AUTHGATE_LDAP_FILTER") {
            self.ldap.filter = filter;
        }
        if let Some(attr) = lookup("AUTHGATE_LDAP_NAME_ATTRIBUTE") {
            self.ldap.name_attribute = attr;
        }

        // LDAP groups
        if let Some(base_dn) = lookup("AUTHGATE_LDAP_GROUP_BASE_DN") {
            self.ldap.group.base_dn = base_dn;
        }
        if let Some(filter) = lookup("AUTHGATE_LDAP_GROUP_FILTER") {
            self.ldap.group.filter = filter;
        }
        if let Some(attr) = lookup("AUTHGATE_LDAP_GROUP_MEMBER_ATTRIBUTE") {
            self.ldap.group.member_attribute = attr;
        }
        if let Some(groups) = lookup("AUTHGATE_LDAP_GROUPS") {
            self.ldap.groups = split_list(&groups);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.ldap.validate()?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("Failed to render config: {}", e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Realm announced in `WWW-Authenticate: Basic realm="..."`
    pub realm: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            realm: crate::DEFAULT_REALM.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.realm.chars().any(|c| c == '"' || c.is_control()) {
            return Err(Error::invalid_config(
                "Realm must not contain quotes or control characters",
            ));
        }
        Ok(())
    }
}

/// Directory (LDAP) connection and lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LdapConfig {
    /// Connect with LDAPS
    pub tls: bool,

    /// Directory server hostname
    pub hostname: String,

    /// Server port, defaults to 636 with TLS and 389 without
    pub port: Option<u16>,

    /// Skip TLS certificate verification
    pub insecure: bool,

    /// Upgrade a plaintext connection with STARTTLS
    pub start_tls: bool,

    /// Base DN for user searches
    /// Example: "ou=users,dc=example,dc=com"
    pub base_dn: String,

    /// User search filter, `{username}` is substituted
    pub filter: String,

    /// Attribute expected to carry the canonical username
    pub name_attribute: String,

    /// Groups every user must be a member of
    pub groups: Vec<String>,

    /// Deadline for a whole authentication round-trip, 0 disables it
    pub timeout_seconds: u64,

    pub group: GroupConfig,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            tls: true,
            hostname: String::new(),
            port: None,
            insecure: false,
            start_tls: false,
            base_dn: String::new(),
            filter: "(uid={username})".to_string(),
            name_attribute: "uid".to_string(),
            groups: Vec::new(),
            timeout_seconds: 10,
            group: GroupConfig::default(),
        }
    }
}

impl LdapConfig {
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.tls {
            crate::LDAPS_PORT
        } else {
            crate::LDAP_PORT
        })
    }

    /// Server URL in the form ldap3 expects
    pub fn url(&self) -> String {
        let scheme = if self.tls { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.hostname, self.effective_port())
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hostname.is_empty() {
            return Err(Error::invalid_config("LDAP hostname is required"));
        }

        if self.tls && self.start_tls {
            return Err(Error::invalid_config(
                "LDAP tls and start_tls are mutually exclusive",
            ));
        }

        if !self.filter.contains(crate::USERNAME_PLACEHOLDER) {
            return Err(Error::invalid_config(format!(
                "LDAP filter must contain {} placeholder",
                crate::USERNAME_PLACEHOLDER
            )));
        }

        if !self.group.filter.contains(crate::GROUP_PLACEHOLDER) {
            return Err(Error::invalid_config(format!(
                "LDAP group filter must contain {} placeholder",
                crate::GROUP_PLACEHOLDER
            )));
        }

        if self.name_attribute.is_empty() {
            return Err(Error::invalid_config("LDAP name attribute is required"));
        }

        if self.group.member_attribute.is_empty() {
            return Err(Error::invalid_config("LDAP group member attribute is required"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Base DN for group searches, only immediate children are searched
    pub base_dn: String,

    /// Group search filter, `{group}` is substituted
    pub filter: String,

    /// Attribute listing the usernames of group members
    pub member_attribute: String,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            base_dn: String::new(),
            filter: "(cn={group})".to_string(),
            member_attribute: "memberUid".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 300, // 5 minutes
        }
    }
}

impl CacheConfig {
    /// TTL for cached verdicts, `None` when caching is off
    pub fn ttl(&self) -> Option<Duration> {
        if !self.enabled || self.ttl_seconds == 0 {
            return None;
        }
        Some(Duration::from_secs(self.ttl_seconds))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Split a comma separated list, dropping empty items
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::InvalidConfig(format!("{}: invalid value '{}': {}", key, value, e)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidConfig(format!(
            "{}: invalid boolean '{}'",
            key, value
        ))),
    }
}
