use crate::protocol::FLASH_VERSION;
use crate::{Error, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// TCP connection timeout
    pub connect_timeout: Duration,

    /// Flash player version string reported in the connect command
    pub flash_version: String,

    /// SWF URL reported in the connect command
    pub swf_url: String,

    /// Page URL reported in the connect command
    pub page_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            connect_timeout: Duration::from_secs(3),
            flash_version: FLASH_VERSION.to_string(),
            swf_url: "http://localhost:5080/demos/ofla_demo.swf".to_string(),
            page_url: "http://localhost:5080".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(Error::config("Connect timeout must be non-zero"));
        }
        if self.flash_version.is_empty() {
            return Err(Error::config("Flash version must not be empty"));
        }
        Ok(())
    }
}

/// Builder for ClientConfig
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        ClientConfigBuilder {
            config: ClientConfig::default(),
        }
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the reported flash version
    pub fn flash_version(mut self, version: impl Into<String>) -> Self {
        self.config.flash_version = version.into();
        self
    }

    /// Set the reported SWF URL
    pub fn swf_url(mut self, url: impl Into<String>) -> Self {
        self.config.swf_url = url.into();
        self
    }

    /// Set the reported page URL
    pub fn page_url(mut self, url: impl Into<String>) -> Self {
        self.config.page_url = url.into();
        self
    }

    /// Build configuration
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        ClientConfigBuilder::new()
    }
}
