//! Engine configuration.

use crate::result::{ElegirError, ElegirResult};
use serde::{Deserialize, Serialize};

/// Default application URL for local development tenants
pub const DEFAULT_APP_URL: &str = "https://localhost:8443";

/// Configuration for a capability engine session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the application under test
    pub app_url: String,
    /// Tenant display name, used in logs only
    pub tenant: Option<String>,
    /// App identifier inside the tenant (multi-app tenants)
    pub app_id: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_url: DEFAULT_APP_URL.to_string(),
            tenant: None,
            app_id: None,
        }
    }
}

impl EngineConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application URL
    #[must_use]
    pub fn with_app_url(mut self, url: impl Into<String>) -> Self {
        self.app_url = url.into();
        self
    }

    /// Set the tenant display name
    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Set the app identifier
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Parse a config from a JSON document
    ///
    /// # Errors
    ///
    /// `Configuration` when the document does not describe a config.
    pub fn from_json(json: &str) -> ElegirResult<Self> {
        serde_json::from_str(json).map_err(|err| ElegirError::Configuration {
            message: format!("invalid engine config: {err}"),
        })
    }
}
