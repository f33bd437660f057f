//! Runtime configuration.
//!
//! [`Config`] carries the connection source settings: URL, credentials, the
//! identifier of the driver to use, and the pool size. All connection
//! properties are required; [`Config::validate`] rejects the first missing
//! one by name, since every one of them is needed to initialize a
//! connection source.

use rowmap_core::{Error, Result};

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Connection source configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL.
    pub url: String,
    /// Username for authentication.
    pub username: String,
    /// Password for authentication.
    pub password: String,
    /// Identifier of the storage driver (e.g. `"memory"`).
    pub driver: String,
    /// Number of physical connections the pool opens eagerly.
    pub pool_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            driver: String::new(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl Config {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the username.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the driver identifier.
    #[must_use]
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    /// Set the pool size.
    #[must_use]
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Check that every property needed to initialize a connection source is
    /// present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("url", &self.url),
            ("username", &self.username),
            ("password", &self.password),
            ("driver", &self.driver),
        ];
        for (name, value) in required {
            if value.is_empty() {
                return Err(Error::Configuration(format!(
                    "'{name}' property is not set; set up your configuration properly"
                )));
            }
        }
        if self.pool_size == 0 {
            return Err(Error::Configuration(
                "'pool_size' must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
