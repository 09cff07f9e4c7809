//! Configuration loading and types for GroceryStore.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! system: networking, TLS, authentication, logging and observability.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// TLS termination settings.
    #[serde(default)]
    pub tls: TlsConfig,

    /// Authentication settings for the create endpoint.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings (metrics).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// TLS configuration. Certificate and key are PEM files.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// Serve HTTPS. When false the listener speaks plain HTTP.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Certificate chain PEM file.
    #[serde(alias = "certfile", default = "default_cert_file")]
    pub cert_file: String,

    /// Private key PEM file.
    #[serde(alias = "keyfile", default = "default_key_file")]
    pub key_file: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cert_file: default_cert_file(),
            key_file: default_key_file(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}

/// Authentication settings.
///
/// `POST /food/` requires HTTP Basic credentials matching one of `users`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Realm advertised in the `WWW-Authenticate` challenge.
    #[serde(default = "default_realm")]
    pub realm: String,

    /// Accepted user/password pairs. Empty by default, which rejects
    /// every create.
    #[serde(default)]
    pub users: Vec<UserCredential>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            users: Vec::new(),
        }
    }
}

/// A single user/password pair.
#[derive(Debug, Clone, Deserialize)]
pub struct UserCredential {
    #[serde(alias = "user")]
    pub username: String,
    #[serde(alias = "pass")]
    pub password: String,
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_cert_file() -> String {
    "cert.pem".to_string()
}

fn default_key_file() -> String {
    "key.pem".to_string()
}

fn default_realm() -> String {
    "api".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    parse_config(&contents)
}

/// Parse configuration from YAML text. An empty document yields defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.shutdown_timeout, 30);
        assert!(config.tls.enabled);
        assert_eq!(config.tls.cert_file, "cert.pem");
        assert_eq!(config.tls.key_file, "key.pem");
        assert_eq!(config.auth.realm, "api");
        assert!(config.auth.users.is_empty());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
        assert!(config.observability.metrics);
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
server:
  port: 9443
tls:
  certfile: /etc/grocery/cert.pem
auth:
  users:
    - username: alice
      password: wonderland
    - user: bob
      pass: builder
logging:
  format: json
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 9443);
        assert_eq!(config.tls.cert_file, "/etc/grocery/cert.pem");
        assert_eq!(config.tls.key_file, "key.pem");
        assert_eq!(config.auth.realm, "api");
        assert_eq!(config.auth.users.len(), 2);
        assert_eq!(config.auth.users[1].username, "bob");
        assert_eq!(config.auth.users[1].password, "builder");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(parse_config("server: [not, a, map]").is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tls:\n  enabled: false\nobservability:\n  metrics: false").unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(!config.tls.enabled);
        assert!(!config.observability.metrics);
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/grocerystore.yaml").is_err());
    }
}
