//! Configuration for Keyward

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywardConfig {
    #[serde(default)]
    pub ldap: LdapConfigSection,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KeywardConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("KEYWARD_LDAP_HOST") {
            config.ldap.host = Some(host);
        }
        if let Ok(port) = std::env::var("KEYWARD_LDAP_PORT") {
            if let Ok(p) = port.parse() {
                config.ldap.port = Some(p);
            }
        }
        if let Ok(basedn) = std::env::var("KEYWARD_LDAP_BASEDN") {
            config.ldap.basedn = Some(basedn);
        }
        if std::env::var("KEYWARD_LDAP_STARTTLS").map(|v| v == "true").unwrap_or(false) {
            config.ldap.starttls = true;
        }
        if let Ok(dn) = std::env::var("KEYWARD_LDAP_BIND_DN") {
            config.ldap.bind_dn = Some(dn);
        }
        if let Ok(password) = std::env::var("KEYWARD_LDAP_BIND_PASSWORD") {
            config.ldap.bind_password = Some(password);
        }

        if let Ok(backend) = std::env::var("KEYWARD_STORE_BACKEND") {
            match backend.as_str() {
                "ldap" => config.store.backend = StoreBackend::Ldap,
                "file" => config.store.backend = StoreBackend::File,
                _ => {}
            }
        }
        if let Ok(dir) = std::env::var("KEYWARD_IDENTITIES_DIR") {
            config.store.identities_dir = PathBuf::from(dir);
        }
        if let Ok(level) = std::env::var("KEYWARD_LOG_LEVEL") {
            config.logging.level = level;
        }

        config
    }
}

/// Directory settings as they appear in the configuration file.
///
/// Every field is optional here; `keyward_auth::LdapConfig::from_section`
/// decides which omissions are fatal.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConfigSection {
    /// Host name, or a full URL such as "ldaps://ldap.example.org:636"
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Base DN for user searches, e.g. "dc=example,dc=org"
    #[serde(default)]
    pub basedn: Option<String>,

    /// Upgrade the connection with STARTTLS before binding
    #[serde(default)]
    pub starttls: bool,

    /// Skip TLS certificate verification (not recommended for production)
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Service account DN; anonymous bind when absent
    #[serde(default)]
    pub bind_dn: Option<String>,

    #[serde(default)]
    pub bind_password: Option<String>,

    /// Connect and per-operation timeout in seconds
    #[serde(default = "default_ldap_timeout")]
    pub timeout_seconds: u64,

    /// "one" (entries directly below basedn) or "sub" (whole subtree)
    #[serde(default = "default_search_scope")]
    pub search_scope: String,
}

fn default_ldap_timeout() -> u64 {
    10
}

fn default_search_scope() -> String {
    "one".to_string()
}

impl Default for LdapConfigSection {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            basedn: None,
            starttls: false,
            skip_tls_verify: false,
            bind_dn: None,
            bind_password: None,
            timeout_seconds: default_ldap_timeout(),
            search_scope: default_search_scope(),
        }
    }
}

impl fmt::Debug for LdapConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdapConfigSection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("basedn", &self.basedn)
            .field("starttls", &self.starttls)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &self.bind_password.as_ref().map(|_| "<redacted>"))
            .field("timeout_seconds", &self.timeout_seconds)
            .field("search_scope", &self.search_scope)
            .finish()
    }
}

/// Which backend answers user store requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Per-user YAML files under `identities_dir`
    #[default]
    File,
    /// Live directory lookups
    Ldap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_identities_dir")]
    pub identities_dir: PathBuf,

    /// Lifetime of a cached attribute index; 0 keeps indexes until invalidated
    #[serde(default = "default_index_ttl")]
    pub index_ttl_seconds: u64,
}

fn default_identities_dir() -> PathBuf {
    PathBuf::from("identities")
}

fn default_index_ttl() -> u64 {
    300 // 5 minutes
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            identities_dir: default_identities_dir(),
            index_ttl_seconds: default_index_ttl(),
        }
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
