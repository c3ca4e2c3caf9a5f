//! Cache configuration types.
//!
//! A [`CacheConfig`] names the backend kind and its location. It is read once
//! at bootstrap, from a `[cache]` TOML section or from `MEMORA_CACHE_*`
//! environment variables, and is read-only afterwards.

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Environment variable naming the backend kind.
pub const ENV_BACKEND: &str = "MEMORA_CACHE_BACKEND";
/// Environment variable naming the backend location.
pub const ENV_LOCATION: &str = "MEMORA_CACHE_LOCATION";
/// Environment variable holding the key prefix.
pub const ENV_KEY_PREFIX: &str = "MEMORA_CACHE_KEY_PREFIX";
/// Environment variable holding a `host:port,host:port` server list.
pub const ENV_SERVERS: &str = "MEMORA_CACHE_SERVERS";

/// Cache backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process map
    Memory,
    /// Redis backend
    Redis,
    /// Memcached backend
    Memcached,
    /// Caching disabled: every lookup misses
    Null,
}

impl BackendKind {
    /// Configuration identifier of the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Redis => "redis",
            BackendKind::Memcached => "memcached",
            BackendKind::Null => "null",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Memory => "Memory",
            BackendKind::Redis => "Redis",
            BackendKind::Memcached => "Memcached",
            BackendKind::Null => "Null",
        };
        f.write_str(name)
    }
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" | "inmemory" => Ok(BackendKind::Memory),
            "redis" => Ok(BackendKind::Redis),
            "memcached" | "memcache" => Ok(BackendKind::Memcached),
            "null" | "none" | "disabled" => Ok(BackendKind::Null),
            other => Err(CacheError::Config(format!(
                "Unknown cache backend '{}'. Expected one of: memory, redis, memcached, null",
                other
            ))),
        }
    }
}

/// A single `host:port` server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAddress {
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl ServerAddress {
    /// Create a server address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerAddress {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| CacheError::InvalidUrl(format!("Expected host:port, got '{}'", s)))?;

        let port = port
            .parse::<u16>()
            .map_err(|_| CacheError::InvalidUrl(format!("Invalid port in '{}'", s)))?;

        if host.is_empty() {
            return Err(CacheError::InvalidUrl(format!("Missing host in '{}'", s)));
        }

        Ok(Self::new(host, port))
    }
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache backend type
    pub backend: BackendKind,

    /// Connection URL or location identifier of the backend
    #[serde(default)]
    pub location: Option<String>,

    /// Key prefix for all cache keys
    #[serde(default)]
    pub key_prefix: Option<String>,

    /// Server list for backends that shard over several hosts
    #[serde(default)]
    pub servers: Vec<ServerAddress>,
}

#[derive(Deserialize)]
struct ConfigDocument {
    cache: Option<CacheConfig>,
}

impl CacheConfig {
    fn with_backend(backend: BackendKind, location: Option<String>) -> Self {
        Self {
            backend,
            location,
            key_prefix: None,
            servers: Vec::new(),
        }
    }

    /// Create an in-process cache configuration.
    pub fn memory() -> Self {
        Self::with_backend(BackendKind::Memory, None)
    }

    /// Create a configuration that disables caching.
    pub fn null() -> Self {
        Self::with_backend(BackendKind::Null, None)
    }

    /// Create a new Redis cache configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use memora_cache::CacheConfig;
    ///
    /// let config = CacheConfig::redis("redis://localhost:6379");
    /// assert_eq!(config.location.as_deref(), Some("redis://localhost:6379"));
    /// ```
    pub fn redis(url: impl Into<String>) -> Self {
        Self::with_backend(BackendKind::Redis, Some(url.into()))
    }

    /// Create a new Memcached cache configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use memora_cache::CacheConfig;
    ///
    /// let config = CacheConfig::memcached("memcache://localhost:11211");
    /// assert_eq!(config.memcached_targets().unwrap().len(), 1);
    /// ```
    pub fn memcached(url: impl Into<String>) -> Self {
        Self::with_backend(BackendKind::Memcached, Some(url.into()))
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Add a server to the server list.
    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.servers.push(ServerAddress::new(host, port));
        self
    }

    /// Build the final key with prefix if configured.
    pub fn build_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// Strip the configured prefix from a backend key.
    pub fn strip_key<'a>(&self, key: &'a str) -> &'a str {
        match &self.key_prefix {
            Some(prefix) => key
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix(':'))
                .unwrap_or(key),
            None => key,
        }
    }

    /// Check that the backend has what it needs to connect.
    pub fn validate(&self) -> CacheResult<()> {
        match self.backend {
            BackendKind::Redis if self.location.is_none() => Err(CacheError::Config(
                "Redis backend requires a location (e.g. redis://localhost:6379)".to_string(),
            )),
            BackendKind::Memcached if self.location.is_none() && self.servers.is_empty() => {
                Err(CacheError::Config(
                    "Memcached backend requires a location or at least one server".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Memcached connection URLs for the location and every listed server.
    pub fn memcached_targets(&self) -> CacheResult<Vec<String>> {
        let mut targets = Vec::with_capacity(self.servers.len() + 1);

        if let Some(location) = &self.location {
            targets.push(parse_memcached_url(location)?);
        }

        for server in &self.servers {
            targets.push(format!("memcache://{}", server));
        }

        Ok(targets)
    }

    /// Parse the `[cache]` section of a TOML document.
    ///
    /// # Examples
    ///
    /// ```
    /// use memora_cache::{BackendKind, CacheConfig};
    ///
    /// let config = CacheConfig::from_toml_str(r#"
    ///     [cache]
    ///     backend = "memory"
    /// "#).unwrap();
    /// assert_eq!(config.backend, BackendKind::Memory);
    /// ```
    pub fn from_toml_str(content: &str) -> CacheResult<Self> {
        let document: ConfigDocument = toml::from_str(content)
            .map_err(|e| CacheError::Config(format!("TOML parse error: {}", e)))?;

        let config = document.cache.ok_or_else(|| {
            CacheError::ConfigurationMissing("no [cache] section in configuration".to_string())
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load the `[cache]` section from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CacheError::ConfigurationMissing(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&content)
    }

    /// Load configuration from `MEMORA_CACHE_*` environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load a `.env` file (if present) and then read the environment.
    pub fn from_dotenv(path: Option<&Path>) -> CacheResult<Self> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    CacheError::ConfigurationMissing(format!(
                        "failed to load {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            }
            None => {
                dotenvy::dotenv().ok(); // Ignore if .env doesn't exist
            }
        }
        Self::from_env()
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> CacheResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = lookup(ENV_BACKEND)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                CacheError::ConfigurationMissing(format!("{} is not set", ENV_BACKEND))
            })?
            .parse::<BackendKind>()?;

        let servers = match lookup(ENV_SERVERS) {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(ServerAddress::from_str)
                .collect::<CacheResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        let config = Self {
            backend,
            location: lookup(ENV_LOCATION).filter(|value| !value.is_empty()),
            key_prefix: lookup(ENV_KEY_PREFIX).filter(|value| !value.is_empty()),
            servers,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Normalize a Memcached location to `memcache://host:port`.
pub(crate) fn parse_memcached_url(url: &str) -> CacheResult<String> {
    if url.starts_with("memcache://") {
        Ok(url.to_string())
    } else if url.contains(':') {
        Ok(format!("memcache://{}", url))
    } else {
        Err(CacheError::InvalidUrl(format!(
            "Invalid Memcached URL: {}. Expected format: 'memcache://host:port' or 'host:port'",
            url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_redis_config() {
        let config = CacheConfig::redis("redis://localhost:6379");
        assert_eq!(config.backend, BackendKind::Redis);
        assert_eq!(config.location.as_deref(), Some("redis://localhost:6379"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_kind_parse_and_display() {
        assert_eq!("Redis".parse::<BackendKind>().unwrap(), BackendKind::Redis);
        assert_eq!("memcache".parse::<BackendKind>().unwrap(), BackendKind::Memcached);
        assert_eq!("in-memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert_eq!("disabled".parse::<BackendKind>().unwrap(), BackendKind::Null);
        assert!("couchbase".parse::<BackendKind>().is_err());

        assert_eq!(format!("{}", BackendKind::Redis), "Redis");
        assert_eq!(BackendKind::Memcached.as_str(), "memcached");
    }

    #[test]
    fn test_build_key_with_prefix() {
        let config = CacheConfig::redis("redis://localhost:6379").with_key_prefix("myapp");

        assert_eq!(config.build_key("user:123"), "myapp:user:123");
        assert_eq!(config.strip_key("myapp:user:123"), "user:123");
    }

    #[test]
    fn test_build_key_without_prefix() {
        let config = CacheConfig::redis("redis://localhost:6379");
        assert_eq!(config.build_key("user:123"), "user:123");
        assert_eq!(config.strip_key("user:123"), "user:123");
    }

    #[test]
    fn test_toml_section() {
        let config = CacheConfig::from_toml_str(
            r#"
            [cache]
            backend = "memcached"
            key_prefix = "shop"

            [[cache.servers]]
            host = "10.0.0.5"
            port = 11211

            [[cache.servers]]
            host = "10.0.0.6"
            port = 11212
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, BackendKind::Memcached);
        assert_eq!(config.key_prefix.as_deref(), Some("shop"));
        assert_eq!(
            config.memcached_targets().unwrap(),
            vec![
                "memcache://10.0.0.5:11211".to_string(),
                "memcache://10.0.0.6:11212".to_string()
            ]
        );
    }

    #[test]
    fn test_toml_missing_section() {
        let err = CacheConfig::from_toml_str("[logging]\nlevel = \"info\"\n").unwrap_err();
        assert!(matches!(err, CacheError::ConfigurationMissing(_)));
    }

    #[test]
    fn test_toml_redis_without_location() {
        let err = CacheConfig::from_toml_str("[cache]\nbackend = \"redis\"\n").unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_configuration_missing() {
        let err = CacheConfig::from_file("/definitely/not/here/memora.toml").unwrap_err();
        assert!(matches!(err, CacheError::ConfigurationMissing(_)));
    }

    #[test]
    fn test_lookup_requires_backend() {
        let err = CacheConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, CacheError::ConfigurationMissing(_)));
    }

    #[test]
    fn test_lookup_full() {
        let config = CacheConfig::from_lookup(lookup_from(&[
            (ENV_BACKEND, "memcached"),
            (ENV_KEY_PREFIX, "api"),
            (ENV_SERVERS, "127.0.0.1:11211, 127.0.0.2:11211"),
        ]))
        .unwrap();

        assert_eq!(config.backend, BackendKind::Memcached);
        assert_eq!(config.location, None);
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[1], ServerAddress::new("127.0.0.2", 11211));
    }

    #[test]
    fn test_lookup_bad_server() {
        let err = CacheConfig::from_lookup(lookup_from(&[
            (ENV_BACKEND, "memcached"),
            (ENV_SERVERS, "localhost"),
        ]))
        .unwrap_err();
        assert!(matches!(err, CacheError::InvalidUrl(_)));
    }

    #[test]
    fn test_parse_memcached_url() {
        assert_eq!(
            parse_memcached_url("memcache://localhost:11211").unwrap(),
            "memcache://localhost:11211"
        );
        assert_eq!(
            parse_memcached_url("localhost:11211").unwrap(),
            "memcache://localhost:11211"
        );
        assert!(parse_memcached_url("invalid").is_err());
    }
}
