//! Environment snapshot: live version and settings data for one
//! logged-in session.
//!
//! The remote tenant reports three things the engine cares about: the
//! platform build, the installed version of every named custom widget,
//! and the layered tenant/app/user settings that drive redirection.
//! All of it is fetched once, after the application has loaded, and is
//! immutable afterward; a new login produces a new snapshot.

use crate::result::{ElegirError, ElegirResult};
use crate::version::Version;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, RwLock};

/// Release channel a tenant, app or user can sit on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReleaseChannel {
    /// No explicit choice; inherit from the next layer down
    #[default]
    Auto,
    /// Semi-annual release channel
    SemiAnnual,
    /// Any other explicit channel (monthly, inner, ...)
    Other,
}

impl ReleaseChannel {
    /// All channel values, for exhaustive table tests
    pub const ALL: [Self; 3] = [Self::Auto, Self::SemiAnnual, Self::Other];

    /// Channel as a static string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::SemiAnnual => "semi-annual",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ReleaseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tenant-level settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    /// Channel the tenant is provisioned on
    pub release_channel: ReleaseChannel,
}

/// App-level settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Channel the app module pins, `Auto` to inherit the tenant's
    pub release_channel: ReleaseChannel,
    /// Modernized look is forced on for every user of this app
    pub new_look_always_on: bool,
    /// Users of this app may opt out of the modernized look
    pub new_look_opt_out: bool,
}

/// Per-user settings and toggle overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// User's channel override, `Auto` when the user made no choice
    pub channel_override: ReleaseChannel,
    /// User's modernized-look toggle; `None` when never touched
    pub modernization_override: Option<bool>,
}

/// The three settings layers, precedence user > app > tenant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsLayers {
    /// Tenant layer
    pub tenant: TenantSettings,
    /// App layer
    pub app: AppSettings,
    /// User layer
    pub user: UserSettings,
}

/// Immutable, session-scoped bundle of live version and settings data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSnapshot {
    platform_version: Version,
    widget_versions: HashMap<String, Version>,
    settings: SettingsLayers,
}

impl EnvironmentSnapshot {
    /// Assemble a snapshot from its three fragments
    #[must_use]
    pub fn new(
        platform_version: Version,
        widget_versions: HashMap<String, Version>,
        settings: SettingsLayers,
    ) -> Self {
        Self {
            platform_version,
            widget_versions,
            settings,
        }
    }

    /// Live platform build
    #[must_use]
    pub const fn platform_version(&self) -> Version {
        self.platform_version
    }

    /// Installed version of a named widget, `None` when not installed
    #[must_use]
    pub fn widget_version(&self, name: &str) -> Option<Version> {
        self.widget_versions.get(name).copied()
    }

    /// The layered settings
    #[must_use]
    pub const fn settings(&self) -> &SettingsLayers {
        &self.settings
    }
}

/// Supplies the live environment data, once available
///
/// Each operation corresponds to one remote call; a non-success status
/// is fatal for the session (`RemoteFetch`), never retried here.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Fetch the live platform build
    async fn fetch_platform_version(&self) -> ElegirResult<Version>;

    /// Fetch the installed-version table for named custom widgets
    async fn fetch_widget_versions(&self) -> ElegirResult<HashMap<String, Version>>;

    /// Fetch the layered tenant/app/user settings
    async fn fetch_settings(&self) -> ElegirResult<SettingsLayers>;
}

/// Shared accessor for the snapshot fragments as they arrive
///
/// Resolvers store the fragment they own during their readiness
/// transition; redirection rules read the settings fragment through
/// this accessor. Each fragment is written at most once per session.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    platform: RwLock<Option<Version>>,
    widgets: RwLock<Option<HashMap<String, Version>>>,
    settings: RwLock<Option<SettingsLayers>>,
}

impl SnapshotStore {
    /// Create an empty store for a new session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the platform fragment
    pub fn set_platform_version(&self, version: Version) {
        if let Ok(mut slot) = self.platform.write() {
            *slot = Some(version);
        }
    }

    /// Store the widget-version fragment
    pub fn set_widget_versions(&self, versions: HashMap<String, Version>) {
        if let Ok(mut slot) = self.widgets.write() {
            *slot = Some(versions);
        }
    }

    /// Store the settings fragment
    pub fn set_settings(&self, settings: SettingsLayers) {
        if let Ok(mut slot) = self.settings.write() {
            *slot = Some(settings);
        }
    }

    /// Live platform build
    ///
    /// # Errors
    ///
    /// `Configuration` when the platform fragment has not arrived yet.
    pub fn platform_version(&self) -> ElegirResult<Version> {
        self.platform
            .read()
            .ok()
            .and_then(|slot| *slot)
            .ok_or_else(|| ElegirError::Configuration {
                message: "platform version accessed before it was fetched".to_string(),
            })
    }

    /// Installed version of a named widget
    ///
    /// `Ok(None)` means the tenant does not have the widget installed.
    ///
    /// # Errors
    ///
    /// `Configuration` when the widget fragment has not arrived yet.
    pub fn widget_version(&self, name: &str) -> ElegirResult<Option<Version>> {
        let guard = self.widgets.read().map_err(|_| ElegirError::Configuration {
            message: "widget version table lock poisoned".to_string(),
        })?;
        match guard.as_ref() {
            Some(table) => Ok(table.get(name).copied()),
            None => Err(ElegirError::Configuration {
                message: "widget versions accessed before they were fetched".to_string(),
            }),
        }
    }

    /// The layered settings
    ///
    /// # Errors
    ///
    /// `Configuration` when the settings fragment has not arrived yet.
    pub fn settings(&self) -> ElegirResult<SettingsLayers> {
        self.settings
            .read()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or_else(|| ElegirError::Configuration {
                message: "settings accessed before they were fetched".to_string(),
            })
    }

    /// Assemble the immutable snapshot once every fragment is present
    ///
    /// # Errors
    ///
    /// `Configuration` when any fragment is still missing.
    pub fn assemble(&self) -> ElegirResult<EnvironmentSnapshot> {
        let widgets = self
            .widgets
            .read()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or_else(|| ElegirError::Configuration {
                message: "snapshot assembled before widget versions were fetched".to_string(),
            })?;
        Ok(EnvironmentSnapshot::new(
            self.platform_version()?,
            widgets,
            self.settings()?,
        ))
    }
}

/// In-memory snapshot provider for tests
///
/// Records every fetch so tests can verify what the engine asked for,
/// and can be told to fail a single operation to exercise the
/// remote-fetch error path.
#[derive(Debug, Default)]
pub struct MockSnapshotProvider {
    platform_version: Version,
    widget_versions: HashMap<String, Version>,
    settings: SettingsLayers,
    fail_operation: Option<String>,
    call_history: Mutex<Vec<String>>,
}

impl MockSnapshotProvider {
    /// Create a mock reporting `platform_version`
    #[must_use]
    pub fn new(platform_version: Version) -> Self {
        Self {
            platform_version,
            ..Self::default()
        }
    }

    /// Report `version` for widget `name`
    #[must_use]
    pub fn with_widget(mut self, name: impl Into<String>, version: Version) -> Self {
        self.widget_versions.insert(name.into(), version);
        self
    }

    /// Report these settings layers
    #[must_use]
    pub fn with_settings(mut self, settings: SettingsLayers) -> Self {
        self.settings = settings;
        self
    }

    /// Fail the named operation ("platform", "widgets" or "settings")
    #[must_use]
    pub fn failing(mut self, operation: impl Into<String>) -> Self {
        self.fail_operation = Some(operation.into());
        self
    }

    /// Fetches performed so far
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.call_history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Whether the named operation was fetched
    #[must_use]
    pub fn was_called(&self, operation: &str) -> bool {
        self.history().iter().any(|c| c == operation)
    }

    fn record(&self, operation: &str) -> ElegirResult<()> {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(operation.to_string());
        }
        if self.fail_operation.as_deref() == Some(operation) {
            return Err(ElegirError::RemoteFetch {
                operation: operation.to_string(),
                message: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotProvider for MockSnapshotProvider {
    async fn fetch_platform_version(&self) -> ElegirResult<Version> {
        self.record("platform")?;
        Ok(self.platform_version)
    }

    async fn fetch_widget_versions(&self) -> ElegirResult<HashMap<String, Version>> {
        self.record("widgets")?;
        Ok(self.widget_versions.clone())
    }

    async fn fetch_settings(&self) -> ElegirResult<SettingsLayers> {
        self.record("settings")?;
        Ok(self.settings.clone())
    }
}
