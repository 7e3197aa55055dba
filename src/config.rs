//! Configuration management for Treasure
//!
//! Loads settings from a TOML file at ~/.treasure/config.toml, then applies
//! environment overrides (`DATABASE_URL`, `PORT`, `HOST`, `APP_ENV`, ...).

use crate::error::{CoreError, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Game session configuration
    #[serde(default)]
    pub game: GameConfig,
}

/// Process environment mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Binds a local listener on 127.0.0.1 unless a host is set
    #[default]
    Development,
    /// Binds 0.0.0.0 unless a host is set. Host platforms that drive the
    /// service themselves mount `Core::router()` instead of binding a port.
    Production,
}

impl FromStr for Environment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(CoreError::Config(format!("Unknown environment: {}", other))),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server port (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to. When unset, development binds 127.0.0.1 and
    /// production binds 0.0.0.0.
    #[serde(default)]
    pub host: Option<String>,

    /// Environment mode
    #[serde(default)]
    pub environment: Environment,
}

fn default_port() -> u16 {
    3000
}

impl ServerConfig {
    /// Host the server will actually bind to
    pub fn bind_host(&self) -> &str {
        match (&self.host, self.environment) {
            (Some(host), _) => host,
            (None, Environment::Development) => "127.0.0.1",
            (None, Environment::Production) => "0.0.0.0",
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            host: None,
            environment: Environment::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string: `sqlite://<path>`, a bare path, or `:memory:`
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "sqlite://~/.treasure/treasure.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: default_database_url(),
        }
    }
}

/// Game session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Name of the single session record every request operates on
    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// Secondary participant code that always reveals the target.
    /// `None` disables the bypass.
    #[serde(default = "default_bypass_code")]
    pub bypass_code: Option<String>,

    /// Values used when the session record is first created
    #[serde(default)]
    pub seed: SeedConfig,
}

fn default_session_name() -> String {
    "magelang_2026".to_string()
}

fn default_bypass_code() -> Option<String> {
    Some("idaindarwati".to_string())
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            session_name: default_session_name(),
            bypass_code: default_bypass_code(),
            seed: SeedConfig::default(),
        }
    }
}

/// Initial values for a freshly created session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_unlock_code")]
    pub unlock_code: String,

    #[serde(default = "default_admin_code")]
    pub admin_code: String,

    #[serde(default = "default_lat")]
    pub lat: f64,

    #[serde(default = "default_lng")]
    pub lng: f64,

    /// RFC 3339 timestamp, written as a quoted string in TOML
    #[serde(default = "default_release_time")]
    pub release_time: DateTime<FixedOffset>,
}

fn default_unlock_code() -> String {
    "4913".to_string()
}

fn default_admin_code() -> String {
    "fendisayangida".to_string()
}

fn default_lat() -> f64 {
    -7.7956
}

fn default_lng() -> f64 {
    110.3695
}

fn default_release_time() -> DateTime<FixedOffset> {
    // 2026-02-08T09:00:00+07:00
    FixedOffset::east_opt(7 * 3600)
        .and_then(|tz| {
            chrono::NaiveDate::from_ymd_opt(2026, 2, 8)
                .and_then(|d| d.and_hms_opt(9, 0, 0))
                .and_then(|dt| dt.and_local_timezone(tz).single())
        })
        .unwrap_or_default()
}

impl Default for SeedConfig {
    fn default() -> Self {
        SeedConfig {
            unlock_code: default_unlock_code(),
            admin_code: default_admin_code(),
            lat: default_lat(),
            lng: default_lng(),
            release_time: default_release_time(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_path(path.as_ref());

        if !expanded_path.exists() {
            return Err(CoreError::Config(format!(
                "Configuration file not found: {}",
                expanded_path.display()
            )));
        }

        let content = std::fs::read_to_string(&expanded_path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config)
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|p| p.join(".treasure").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".treasure/config.toml"))
    }

    /// Get the server socket address
    pub fn server_addr(&self) -> SocketAddr {
        use std::net::ToSocketAddrs;

        format!("{}:{}", self.server.bind_host(), self.server.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], self.server.port)))
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| CoreError::Config(format!("Invalid PORT: {}", port)))?;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = if host.is_empty() { None } else { Some(host) };
        }
        if let Some(env) = lookup("APP_ENV") {
            self.server.environment = env.parse()?;
        }
        if let Some(name) = lookup("TREASURE_SESSION_NAME") {
            self.game.session_name = name;
        }
        if let Some(code) = lookup("TREASURE_BYPASS_CODE") {
            self.game.bypass_code = if code.is_empty() { None } else { Some(code) };
        }
        Ok(())
    }

    /// Create a default configuration file at the given path
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let content = r#"# Treasure Configuration

[server]
# Port to listen on (default: 3000)
port = 3000

# Host to bind to. Leave unset to pick by environment:
# development = 127.0.0.1, production = 0.0.0.0
# host = "127.0.0.1"

# "development" or "production"
environment = "development"

[database]
# sqlite://<path>, a bare path, or :memory:
url = "sqlite://~/.treasure/treasure.db"

[game]
session_name = "magelang_2026"

# Secondary participant code that always reveals the target.
# Remove the line to disable the bypass.
bypass_code = "idaindarwati"

[game.seed]
# Used once, when GET /init creates the session record
unlock_code = "4913"
admin_code = "fendisayangida"
lat = -7.7956
lng = 110.3695
release_time = "2026-02-08T09:00:00+07:00"
"#;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        Ok(())
    }
}

/// Expand ~ to home directory in paths
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.bind_host(), "127.0.0.1");
        assert_eq!(config.game.session_name, "magelang_2026");
        assert_eq!(config.game.bypass_code.as_deref(), Some("idaindarwati"));
        assert_eq!(config.game.seed.unlock_code, "4913");
        assert_eq!(
            config.game.seed.release_time.to_rfc3339(),
            "2026-02-08T09:00:00+07:00"
        );
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
port = 8080
environment = "production"

[database]
url = ":memory:"

[game]
session_name = "jogja_2026"

[game.seed]
unlock_code = "1111"
release_time = "2030-01-01T00:00:00Z"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Production);
        assert_eq!(config.server.bind_host(), "0.0.0.0");
        assert_eq!(config.database.url, ":memory:");
        assert_eq!(config.game.session_name, "jogja_2026");
        assert_eq!(config.game.seed.unlock_code, "1111");
        // Unspecified seed fields keep their defaults
        assert_eq!(config.game.seed.admin_code, "fendisayangida");
        assert_eq!(config.game.seed.release_time.timestamp(), 1_893_456_000);
    }

    #[test]
    fn test_default_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::create_default(&path).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.game.seed.lat, -7.7956);
        assert_eq!(config.game.seed.release_time, default_release_time());
    }

    #[test]
    fn test_default_path_is_under_treasure_dir() {
        let path = Config::default_path();
        assert!(path.ends_with(".treasure/config.toml"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite:///tmp/hunt.db"),
            ("PORT", "4000"),
            ("APP_ENV", "production"),
            ("TREASURE_BYPASS_CODE", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.url, "sqlite:///tmp/hunt.db");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.environment, Environment::Production);
        assert!(config.game.bypass_code.is_none());
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = Config::default();
        let result =
            config.apply_overrides_from(|key| (key == "PORT").then(|| "abc".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_host_wins() {
        let mut server = ServerConfig {
            host: Some("10.0.0.5".to_string()),
            ..ServerConfig::default()
        };
        server.environment = Environment::Production;
        assert_eq!(server.bind_host(), "10.0.0.5");
    }
}
