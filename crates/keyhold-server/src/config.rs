//! Server configuration for Keyhold.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `KEYHOLD_*` environment variables.

use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Storage backend type.
    pub storage_backend: StorageBackendType,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// HS256 signing secret. `None` means generate one at startup.
    pub jwt_secret: Option<String>,
    /// Lifetime of issued bearer tokens.
    pub token_ttl: Duration,
    /// Upper bound on handling a single request.
    pub request_timeout: Duration,
    /// Argon2id cost for login password hashes.
    pub argon2: Argon2Config,
    /// First super admin, created at startup if none exists.
    pub bootstrap: Option<BootstrapConfig>,
    /// Shared secret presented by the trusted OAuth callback service.
    /// `None` disables `POST /api/auth/oauth`.
    pub oauth_bridge_secret: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("storage_backend", &self.storage_backend)
            .field("log_level", &self.log_level)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("token_ttl", &self.token_ttl)
            .field("request_timeout", &self.request_timeout)
            .field("argon2", &self.argon2)
            .field("bootstrap", &self.bootstrap)
            .field(
                "oauth_bridge_secret",
                &self.oauth_bridge_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Config {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Credentials for the bootstrap super admin.
#[derive(Clone)]
pub struct BootstrapConfig {
    pub email: String,
    pub name: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Supported storage backend types.
#[derive(Clone, PartialEq, Eq)]
pub enum StorageBackendType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// `PostgreSQL` persistent storage.
    Postgres { url: String },
}

impl std::fmt::Debug for StorageBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The URL may carry a password.
        match self {
            Self::Memory => write!(f, "Memory"),
            Self::Postgres { .. } => write!(f, "Postgres"),
        }
    }
}

const DEFAULT_PORT: u16 = 8080;

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT` — port to bind on (binds to `0.0.0.0`)
    /// - `KEYHOLD_BIND_ADDR` — full bind address (overrides `PORT`, default: `127.0.0.1:8080`)
    /// - `KEYHOLD_STORAGE` — `memory` or `postgres` (default: `memory`)
    /// - `DATABASE_URL` — `PostgreSQL` connection string (used when `KEYHOLD_STORAGE=postgres`)
    /// - `KEYHOLD_LOG_LEVEL` — log filter (default: `info`)
    /// - `KEYHOLD_JWT_SECRET` — token signing secret (default: random per process)
    /// - `KEYHOLD_TOKEN_TTL_HOURS` — bearer token lifetime (default: `24`)
    /// - `KEYHOLD_REQUEST_TIMEOUT_SECS` — per-request timeout (default: `30`)
    /// - `KEYHOLD_ARGON2_MEMORY_KIB` / `KEYHOLD_ARGON2_ITERATIONS` / `KEYHOLD_ARGON2_PARALLELISM`
    /// - `KEYHOLD_BOOTSTRAP_EMAIL` / `KEYHOLD_BOOTSTRAP_PASSWORD` / `KEYHOLD_BOOTSTRAP_NAME`
    /// - `KEYHOLD_OAUTH_BRIDGE_SECRET` — enables OAuth sign-in from a trusted callback service
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    #[must_use]
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let default_addr = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT));
        let bind_addr = if let Some(addr) = var("KEYHOLD_BIND_ADDR") {
            addr.parse().unwrap_or(default_addr)
        } else if let Some(port) = var("PORT") {
            let port: u16 = port.parse().unwrap_or(DEFAULT_PORT);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            default_addr
        };

        let storage_backend = match var("KEYHOLD_STORAGE")
            .unwrap_or_else(|| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => {
                let url = var("DATABASE_URL")
                    .unwrap_or_else(|| "postgres://localhost/keyhold".to_owned());
                StorageBackendType::Postgres { url }
            }
            _ => StorageBackendType::Memory,
        };

        let log_level = var("KEYHOLD_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let jwt_secret = var("KEYHOLD_JWT_SECRET").filter(|s| !s.is_empty());
        let oauth_bridge_secret = var("KEYHOLD_OAUTH_BRIDGE_SECRET").filter(|s| !s.is_empty());

        let parse_u64 = |key: &str, default: u64| {
            var(key)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };
        let parse_u32 = |key: &str, default: u32| {
            var(key)
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };

        let token_ttl = Duration::from_secs(parse_u64("KEYHOLD_TOKEN_TTL_HOURS", 24).saturating_mul(3600));
        let request_timeout = Duration::from_secs(parse_u64("KEYHOLD_REQUEST_TIMEOUT_SECS", 30));

        let defaults = Argon2Config::default();
        let argon2 = Argon2Config {
            memory_kib: parse_u32("KEYHOLD_ARGON2_MEMORY_KIB", defaults.memory_kib),
            iterations: parse_u32("KEYHOLD_ARGON2_ITERATIONS", defaults.iterations),
            parallelism: parse_u32("KEYHOLD_ARGON2_PARALLELISM", defaults.parallelism),
        };

        // Bootstrap only when both email and password are present.
        let bootstrap = match (var("KEYHOLD_BOOTSTRAP_EMAIL"), var("KEYHOLD_BOOTSTRAP_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(BootstrapConfig {
                    email,
                    name: var("KEYHOLD_BOOTSTRAP_NAME").unwrap_or_else(|| "Super Admin".to_owned()),
                    password,
                })
            }
            _ => None,
        };

        Self {
            bind_addr,
            storage_backend,
            log_level,
            jwt_secret,
            token_ttl,
            request_timeout,
            argon2,
            bootstrap,
            oauth_bridge_secret,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let c = config(&[]);
        assert_eq!(c.bind_addr, SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert_eq!(c.storage_backend, StorageBackendType::Memory);
        assert_eq!(c.log_level, "info");
        assert!(c.jwt_secret.is_none());
        assert_eq!(c.token_ttl, Duration::from_secs(24 * 3600));
        assert_eq!(c.request_timeout, Duration::from_secs(30));
        assert_eq!(c.argon2, Argon2Config::default());
        assert!(c.bootstrap.is_none());
        assert!(c.oauth_bridge_secret.is_none());
    }

    #[test]
    fn bind_addr_overrides_port() {
        let c = config(&[("PORT", "9000"), ("KEYHOLD_BIND_ADDR", "10.0.0.1:7000")]);
        assert_eq!(c.bind_addr, SocketAddr::from(([10, 0, 0, 1], 7000)));
        let c = config(&[("PORT", "9000")]);
        assert_eq!(c.bind_addr, SocketAddr::from(([0, 0, 0, 0], 9000)));
    }

    #[test]
    fn postgres_storage_reads_database_url() {
        let c = config(&[
            ("KEYHOLD_STORAGE", "Postgres"),
            ("DATABASE_URL", "postgres://u:p@db/keyhold"),
        ]);
        assert_eq!(
            c.storage_backend,
            StorageBackendType::Postgres {
                url: "postgres://u:p@db/keyhold".to_owned()
            }
        );
        assert!(!format!("{c:?}").contains("u:p@"));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let c = config(&[
            ("KEYHOLD_TOKEN_TTL_HOURS", "soon"),
            ("KEYHOLD_REQUEST_TIMEOUT_SECS", "0"),
            ("KEYHOLD_ARGON2_ITERATIONS", "3"),
        ]);
        assert_eq!(c.token_ttl, Duration::from_secs(24 * 3600));
        assert_eq!(c.request_timeout, Duration::from_secs(30));
        assert_eq!(c.argon2.iterations, 3);
    }

    #[test]
    fn bootstrap_needs_email_and_password() {
        assert!(config(&[("KEYHOLD_BOOTSTRAP_EMAIL", "root@example.com")]).bootstrap.is_none());
        let c = config(&[
            ("KEYHOLD_BOOTSTRAP_EMAIL", "root@example.com"),
            ("KEYHOLD_BOOTSTRAP_PASSWORD", "hunter2hunter2"),
            ("KEYHOLD_JWT_SECRET", "s3cret"),
            ("KEYHOLD_OAUTH_BRIDGE_SECRET", "bridge-key"),
        ]);
        let bootstrap = c.bootstrap.as_ref().map(|b| b.name.as_str());
        assert_eq!(bootstrap, Some("Super Admin"));
        let debug = format!("{c:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("bridge-key"));
    }
}
