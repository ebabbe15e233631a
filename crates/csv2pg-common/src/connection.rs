//! PostgreSQL connection settings
//!
//! Resolved once before a run and passed by value into the engine; nothing
//! mutates it afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CommonError, Result};

// ============================================================================
// Connection Defaults
// ============================================================================

/// Default database host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default PostgreSQL port.
pub const DEFAULT_PORT: u16 = 5432;

/// Default database name.
pub const DEFAULT_DATABASE: &str = "postgres";

/// Default login role.
pub const DEFAULT_USER: &str = "postgres";

/// Where to connect and as whom.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: DEFAULT_DATABASE.to_string(),
            user: DEFAULT_USER.to_string(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ConnectionConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the libpq environment variables
    ///
    /// Environment variables:
    /// - `PGHOST`: server host
    /// - `PGPORT`: server port (1-65535)
    /// - `PGDATABASE`: database name
    /// - `PGUSER`: login role
    /// - `PGPASSWORD`: password
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("PGHOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("PGPORT") {
            config.port = parse_port(&port)?;
        }

        if let Ok(database) = std::env::var("PGDATABASE") {
            config.database = database;
        }

        if let Ok(user) = std::env::var("PGUSER") {
            config.user = user;
        }

        if let Ok(password) = std::env::var("PGPASSWORD") {
            config.password = password;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(CommonError::config("host cannot be empty"));
        }

        if self.port == 0 {
            return Err(CommonError::config("port must be between 1 and 65535"));
        }

        if self.database.trim().is_empty() {
            return Err(CommonError::config("database name cannot be empty"));
        }

        if self.user.trim().is_empty() {
            return Err(CommonError::config("user cannot be empty"));
        }

        Ok(())
    }

    /// `host:port/database`, for status messages. Never includes the password.
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

/// Parse a port number, rejecting 0 and anything outside `u16`.
pub fn parse_port(raw: &str) -> Result<u16> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(CommonError::config(format!(
            "invalid port '{raw}': expected an integer between 1 and 65535"
        ))),
        Ok(port) => Ok(port),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const PG_VARS: [&str; 5] = ["PGHOST", "PGPORT", "PGDATABASE", "PGUSER", "PGPASSWORD"];

    fn clear_pg_env() {
        for var in PG_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ConnectionConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_setters() {
        let config = ConnectionConfig::new()
            .with_host("db.internal")
            .with_port(6543)
            .with_database("warehouse")
            .with_user("loader")
            .with_password("secret");

        assert_eq!(config.display_target(), "db.internal:6543/warehouse");
        assert_eq!(config.user, "loader");
        assert_eq!(config.password, "secret");
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        assert!(ConnectionConfig::new().with_host(" ").validate().is_err());
        assert!(ConnectionConfig::new().with_port(0).validate().is_err());
        assert!(ConnectionConfig::new().with_database("").validate().is_err());
        assert!(ConnectionConfig::new().with_user("").validate().is_err());
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("5432").unwrap(), 5432);
        assert_eq!(parse_port(" 65535 ").unwrap(), 65535);
        assert!(parse_port("0").is_err());
        assert!(parse_port("65536").is_err());
        assert!(parse_port("abc").is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectionConfig::new().with_password("hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_libpq_variables() {
        clear_pg_env();
        std::env::set_var("PGHOST", "db.internal");
        std::env::set_var("PGPORT", "6543");
        std::env::set_var("PGDATABASE", "warehouse");
        std::env::set_var("PGUSER", "loader");
        std::env::set_var("PGPASSWORD", "secret");

        let config = ConnectionConfig::from_env().unwrap();
        assert_eq!(config.display_target(), "db.internal:6543/warehouse");
        assert_eq!(config.user, "loader");
        assert_eq!(config.password, "secret");

        clear_pg_env();
    }

    #[test]
    #[serial]
    fn test_from_env_falls_back_to_defaults() {
        clear_pg_env();
        assert_eq!(ConnectionConfig::from_env().unwrap(), ConnectionConfig::default());
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_values() {
        clear_pg_env();
        std::env::set_var("PGPORT", "0");
        assert!(ConnectionConfig::from_env().is_err());

        clear_pg_env();
        std::env::set_var("PGUSER", "");
        assert!(ConnectionConfig::from_env().is_err());

        clear_pg_env();
    }
}
