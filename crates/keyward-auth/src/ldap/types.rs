//! LDAP configuration and search types

use crate::ldap::error::LdapError;
use crate::ldap::resolver::resolve_attribute;
use keyward_core::config::LdapConfigSection;
use keyward_core::types::directory_attribute_for;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use url::Url;

// ============================================================================
// LDAP Configuration
// ============================================================================

/// Validated directory settings, immutable for the process lifetime
#[derive(Debug, Clone)]
pub struct LdapConfig {
    /// Full server URL, e.g. "ldap://ldap.example.org:389"
    pub server_url: String,

    /// Base DN for user searches
    pub base_dn: String,

    /// Upgrade to TLS before any bind
    pub start_tls: bool,

    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,

    /// Service credentials for the initial bind; anonymous when `None`
    pub service_bind: Option<ServiceBind>,

    /// Applied to connect and to every directory operation
    pub timeout: Duration,

    pub search_scope: SearchScope,
}

/// Service account credentials
#[derive(Clone)]
pub struct ServiceBind {
    pub bind_dn: String,
    pub bind_password: String,
}

impl fmt::Debug for ServiceBind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBind")
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"<redacted>")
            .finish()
    }
}

impl LdapConfig {
    /// Validate a configuration section.
    ///
    /// `host` may be a bare host name (then `port` is required) or a full
    /// `ldap://` / `ldaps://` URL. `basedn` is always required.
    pub fn from_section(section: &LdapConfigSection) -> Result<Self, LdapError> {
        let host = section
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| LdapError::config("LDAP host is required"))?;

        let server_url = if host.contains("://") {
            let mut url = Url::parse(host)
                .map_err(|e| LdapError::config(format!("Invalid LDAP URL {}: {}", host, e)))?;
            if url.port().is_none() {
                if let Some(port) = section.port {
                    url.set_port(Some(port))
                        .map_err(|_| LdapError::config(format!("Cannot set port on {}", host)))?;
                }
            }
            url
        } else {
            let port = section
                .port
                .ok_or_else(|| LdapError::config("LDAP port is required"))?;
            Url::parse(&format!("ldap://{}:{}", host, port))
                .map_err(|e| LdapError::config(format!("Invalid LDAP host {}: {}", host, e)))?
        };

        match server_url.scheme() {
            "ldap" | "ldaps" => {}
            other => {
                return Err(LdapError::config(format!(
                    "LDAP URL scheme must be ldap or ldaps, got {}",
                    other
                )))
            }
        }

        if section.starttls && server_url.scheme() == "ldaps" {
            return Err(LdapError::config(
                "starttls cannot be combined with an ldaps:// URL",
            ));
        }

        let base_dn = section
            .basedn
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| LdapError::config("LDAP basedn is required"))?
            .to_string();

        let service_bind = match (&section.bind_dn, &section.bind_password) {
            (Some(dn), Some(password)) => Some(ServiceBind {
                bind_dn: dn.clone(),
                bind_password: password.clone(),
            }),
            (None, None) => None,
            _ => {
                return Err(LdapError::config(
                    "bind_dn and bind_password must be configured together",
                ))
            }
        };

        let search_scope: SearchScope = section.search_scope.parse()?;

        Ok(Self {
            server_url: server_url.to_string(),
            base_dn,
            start_tls: section.starttls,
            skip_tls_verify: section.skip_tls_verify,
            service_bind,
            timeout: Duration::from_secs(section.timeout_seconds.max(1)),
            search_scope,
        })
    }
}

/// Depth of a user search below the base DN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// Entries directly below the base DN
    #[default]
    OneLevel,
    /// The whole subtree under the base DN
    Subtree,
}

impl std::str::FromStr for SearchScope {
    type Err = LdapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one" | "onelevel" => Ok(SearchScope::OneLevel),
            "sub" | "subtree" => Ok(SearchScope::Subtree),
            other => Err(LdapError::config(format!(
                "search_scope must be \"one\" or \"sub\", got {:?}",
                other
            ))),
        }
    }
}

impl From<SearchScope> for ldap3::Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::OneLevel => ldap3::Scope::OneLevel,
            SearchScope::Subtree => ldap3::Scope::Subtree,
        }
    }
}

// ============================================================================
// Search Filter
// ============================================================================

/// Single-attribute equality filter.
///
/// The attribute always comes from a fixed set; only the value is caller
/// supplied, and it is escaped when the filter is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    attribute: &'static str,
    value: String,
}

impl SearchFilter {
    /// Filter for a login identifier (`mail` when it contains `@`, else `uid`)
    pub fn for_identifier(identifier: &str) -> Self {
        Self {
            attribute: resolve_attribute(identifier).as_str(),
            value: identifier.to_string(),
        }
    }

    /// Filter on the directory attribute that populates a record path.
    ///
    /// Returns `None` for paths no directory attribute maps to.
    pub fn for_record_path(path: &str, value: &str) -> Option<Self> {
        let attribute = directory_attribute_for(path).filter(|attr| *attr != "dn")?;
        Some(Self {
            attribute,
            value: value.to_string(),
        })
    }

    pub fn attribute(&self) -> &str {
        self.attribute
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// RFC 4515 string form, e.g. `(uid=alice)`
    pub fn to_ldap_string(&self) -> String {
        format!("({}={})", self.attribute, ldap3::ldap_escape(self.value.as_str()))
    }
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attribute, self.value)
    }
}

// ============================================================================
// Search Results
// ============================================================================

/// A matched directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    /// First value of an attribute
    pub fn first(&self, name: &str) -> Option<&str> {
        self.attrs
            .get(name)
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }
}

impl From<ldap3::SearchEntry> for DirectoryEntry {
    fn from(entry: ldap3::SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
        }
    }
}

/// Classified result of a user search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// No entry matched
    NotFound,
    /// More than one entry matched; never resolved by picking one
    Ambiguous(usize),
    /// Exactly one entry matched
    Found(DirectoryEntry),
}

impl SearchOutcome {
    pub fn into_entry(self) -> Option<DirectoryEntry> {
        match self {
            SearchOutcome::Found(entry) => Some(entry),
            _ => None,
        }
    }
}

/// Result of a bind attempt that reached the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindStatus {
    Accepted,
    /// Directory answered with a non-zero result code (49 = invalid credentials)
    Rejected { code: u32, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(host: &str, port: Option<u16>, basedn: Option<&str>) -> LdapConfigSection {
        LdapConfigSection {
            host: Some(host.to_string()),
            port,
            basedn: basedn.map(|s| s.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_host_and_port() {
        let config =
            LdapConfig::from_section(&section("localhost", Some(389), Some("dc=example,dc=org")))
                .unwrap();

        assert_eq!(config.server_url, "ldap://localhost:389");
        assert_eq!(config.base_dn, "dc=example,dc=org");
        assert!(config.service_bind.is_none());
        assert_eq!(config.search_scope, SearchScope::OneLevel);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_full_url_host() {
        let config = LdapConfig::from_section(&section(
            "ldaps://ldap.example.org:636",
            None,
            Some("dc=example,dc=org"),
        ))
        .unwrap();

        assert_eq!(config.server_url, "ldaps://ldap.example.org:636");
    }

    #[test]
    fn test_missing_parameters_are_config_errors() {
        let mut missing_host = section("", Some(389), Some("dc=example,dc=org"));
        assert!(matches!(
            LdapConfig::from_section(&missing_host),
            Err(LdapError::Config(_))
        ));
        missing_host.host = None;
        assert!(LdapConfig::from_section(&missing_host).is_err());

        let missing_port = section("localhost", None, Some("dc=example,dc=org"));
        assert!(matches!(
            LdapConfig::from_section(&missing_port),
            Err(LdapError::Config(_))
        ));

        let missing_base = section("localhost", Some(389), None);
        assert!(matches!(
            LdapConfig::from_section(&missing_base),
            Err(LdapError::Config(_))
        ));
    }

    #[test]
    fn test_starttls_with_ldaps_is_rejected() {
        let mut s = section("ldaps://ldap.example.org", None, Some("dc=example,dc=org"));
        s.starttls = true;
        assert!(LdapConfig::from_section(&s).is_err());
    }

    #[test]
    fn test_half_configured_service_bind_is_rejected() {
        let mut s = section("localhost", Some(389), Some("dc=example,dc=org"));
        s.bind_dn = Some("cn=reader,dc=example,dc=org".to_string());
        assert!(LdapConfig::from_section(&s).is_err());

        s.bind_password = Some("reader-secret".to_string());
        let config = LdapConfig::from_section(&s).unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("cn=reader"));
        assert!(!debug.contains("reader-secret"));
    }

    #[test]
    fn test_search_scope_parsing() {
        assert_eq!("sub".parse::<SearchScope>().unwrap(), SearchScope::Subtree);
        assert_eq!("one".parse::<SearchScope>().unwrap(), SearchScope::OneLevel);
        assert!("base".parse::<SearchScope>().is_err());
    }

    #[test]
    fn test_filter_escapes_value() {
        let filter = SearchFilter::for_identifier("alice)(uid=*");
        assert_eq!(filter.attribute(), "uid");
        assert_eq!(filter.to_ldap_string(), "(uid=alice\\29\\28uid=\\2a)");
    }

    #[test]
    fn test_filter_for_record_path() {
        let filter = SearchFilter::for_record_path("email", "bob@example.org").unwrap();
        assert_eq!(filter.to_ldap_string(), "(mail=bob@example.org)");
        assert_eq!(filter.to_string(), "mail=bob@example.org");

        assert!(SearchFilter::for_record_path("ldap.dn", "x").is_none());
        assert!(SearchFilter::for_record_path("roles", "admin").is_none());
    }
}
