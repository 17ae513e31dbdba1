//! Session wiring: composing the engine for one logged-in application
//! session.
//!
//! [`SessionBuilder`] assembles the catalog, snapshot provider,
//! resolvers, redirection rules and factory into an [`AppSession`].
//! Calling [`AppSession::initialize`] after login fetches the settings
//! layers and announces `AppInitialized`, which drives every
//! subscribed resolver through its one-time readiness transition
//! before the call returns. A new login means a new session; snapshots
//! are never refreshed in place.

use crate::activator::{ConstructorActivator, InstanceActivator, SessionHandle};
use crate::catalog::CapabilityCatalog;
use crate::config::EngineConfig;
use crate::factory::CapabilityFactory;
use crate::readiness::{AppInitialized, ReadinessBus};
use crate::redirect::RedirectRegistry;
use crate::resolver::{
    CapabilityResolver, ExternalResolver, PlatformResolver, ResolutionMap, WidgetResolver,
};
use crate::result::{ElegirError, ElegirResult};
use crate::snapshot::{EnvironmentSnapshot, SnapshotProvider, SnapshotStore};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Builder for an [`AppSession`]
#[derive(Default)]
pub struct SessionBuilder {
    config: EngineConfig,
    catalog: Option<CapabilityCatalog>,
    provider: Option<Arc<dyn SnapshotProvider>>,
    activator: Option<Arc<dyn InstanceActivator>>,
}

impl SessionBuilder {
    /// Start a builder with the default config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this engine configuration
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this implementation catalog
    #[must_use]
    pub fn with_catalog(mut self, catalog: CapabilityCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Use this environment snapshot provider
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn SnapshotProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use a custom instance activator instead of the registered
    /// constructors
    #[must_use]
    pub fn with_activator(mut self, activator: Arc<dyn InstanceActivator>) -> Self {
        self.activator = Some(activator);
        self
    }

    /// Wire the engine for one session
    ///
    /// # Errors
    ///
    /// `Configuration` when the catalog or provider is missing.
    pub fn build(self) -> ElegirResult<AppSession> {
        let catalog = Arc::new(self.catalog.ok_or_else(|| ElegirError::Configuration {
            message: "session built without a capability catalog".to_string(),
        })?);
        let provider = self.provider.ok_or_else(|| ElegirError::Configuration {
            message: "session built without a snapshot provider".to_string(),
        })?;
        let activator = self
            .activator
            .unwrap_or_else(|| Arc::new(ConstructorActivator));

        let bus = Arc::new(ReadinessBus::new());
        let snapshot = Arc::new(SnapshotStore::new());
        let map = Arc::new(ResolutionMap::new());

        let widget = WidgetResolver::new(
            catalog.clone(),
            provider.clone(),
            snapshot.clone(),
            map.clone(),
            &bus,
        );
        let platform = PlatformResolver::new(
            catalog.clone(),
            provider.clone(),
            snapshot.clone(),
            map.clone(),
            &bus,
        );
        let external = ExternalResolver::new(catalog.clone(), map);
        let resolvers: Vec<Arc<dyn CapabilityResolver>> = vec![widget, platform, external];

        // Each registered rule is instantiated once per factory, with
        // the live snapshot accessor injected
        let rules = catalog
            .redirectors()
            .iter()
            .map(|ctor| ctor(snapshot.clone()))
            .collect();
        let redirects = RedirectRegistry::from_rules(rules);

        let session = SessionHandle::new(&self.config);
        let factory = Arc::new(CapabilityFactory::new(
            catalog,
            resolvers,
            redirects,
            activator,
            session,
        ));

        Ok(AppSession {
            config: self.config,
            bus,
            snapshot,
            provider,
            factory,
            initialized: AtomicBool::new(false),
        })
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("config", &self.config)
            .field("catalog", &self.catalog.is_some())
            .field("provider", &self.provider.is_some())
            .field("activator", &self.activator.is_some())
            .finish()
    }
}

/// One logged-in application session and its capability engine
pub struct AppSession {
    config: EngineConfig,
    bus: Arc<ReadinessBus>,
    snapshot: Arc<SnapshotStore>,
    provider: Arc<dyn SnapshotProvider>,
    factory: Arc<CapabilityFactory>,
    initialized: AtomicBool,
}

impl AppSession {
    /// Announce that the application has finished loading
    ///
    /// Fetches the settings layers, then publishes `AppInitialized`
    /// and suspends until every resolver completes its readiness
    /// transition. Runs at most once per session; a failed
    /// initialization leaves the session unusable rather than
    /// retryable.
    ///
    /// # Errors
    ///
    /// `Configuration` on a second call, `RemoteFetch` when a live
    /// fetch fails, and any resolver readiness failure.
    pub async fn initialize(&self) -> ElegirResult<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(ElegirError::Configuration {
                message: "session already initialized".to_string(),
            });
        }
        let settings = self.provider.fetch_settings().await?;
        self.snapshot.set_settings(settings);
        self.bus.publish(AppInitialized).await?;
        info!(
            app_url = %self.config.app_url,
            tenant = self.config.tenant.as_deref().unwrap_or("-"),
            "application initialized, capability engine ready"
        );
        Ok(())
    }

    /// Whether [`Self::initialize`] has been called
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// The capability factory page objects create controls through
    #[must_use]
    pub fn factory(&self) -> &Arc<CapabilityFactory> {
        &self.factory
    }

    /// The readiness bus, for components that want resolver-ready
    /// announcements
    #[must_use]
    pub fn readiness(&self) -> &Arc<ReadinessBus> {
        &self.bus
    }

    /// The assembled environment snapshot
    ///
    /// # Errors
    ///
    /// `Configuration` until every fragment has been fetched.
    pub fn snapshot(&self) -> ElegirResult<EnvironmentSnapshot> {
        self.snapshot.assemble()
    }
}

impl fmt::Debug for AppSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSession")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
