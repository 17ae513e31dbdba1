//! Elegir: Capability Resolution for Version-Aware Page Objects
//!
//! Elegir (Spanish: "to choose/elect") is the page-object-model layer
//! that decides *which* concrete UI implementation a test talks to in
//! a versioned, multi-tenant web application. Page objects request an
//! abstract capability ("a read-only grid", "a currency field"); the
//! engine redirects the request by live feature-flag state, selects
//! the implementation variant for the tenant's live version, and
//! caches the activated instance for the session.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      ELEGIR Architecture                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌───────────┐   ┌────────────────────────────┐  │
//! │  │ Snapshot  │   │ Catalog   │   │ Readiness bus              │  │
//! │  │ provider  │──►│ (closed   │──►│ AppInitialized ─► barrier  │  │
//! │  │ (remote)  │   │  registry)│   │ ResolverReady(kind)        │  │
//! │  └───────────┘   └───────────┘   └─────────────┬──────────────┘  │
//! │                                                ▼                 │
//! │  ┌──────────────────────────┐   ┌────────────────────────────┐   │
//! │  │ Redirection (settings-   │──►│ Resolvers (widget /        │   │
//! │  │ driven contract rewrite) │   │ platform / external)       │   │
//! │  └──────────────────────────┘   └─────────────┬──────────────┘   │
//! │                                               ▼                  │
//! │              ┌──────────────────────────────────────┐            │
//! │              │ CapabilityFactory::create_instance   │            │
//! │              │ (cache → redirect → resolve → build) │            │
//! │              └──────────────────────────────────────┘            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use elegir::{
//!     CapabilityContract, CatalogBuilder, ContractId, MockSnapshotProvider, SessionBuilder,
//!     Version,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> elegir::ElegirResult<()> {
//! let catalog = CatalogBuilder::new()
//!     .with_contract(CapabilityContract::custom_widget("grid.modern", "pcf_grid_control"))
//!     .with_candidate(elegir::testing::fake_candidate(
//!         "ModernGrid",
//!         "grid.modern",
//!         Version::new(1, 0, 0),
//!     ))
//!     .build()?;
//!
//! let provider = Arc::new(
//!     MockSnapshotProvider::new(Version::with_build(9, 2, 24091, 92))
//!         .with_widget("pcf_grid_control", Version::new(1, 5, 0)),
//! );
//!
//! let session = SessionBuilder::new()
//!     .with_catalog(catalog)
//!     .with_provider(provider)
//!     .build()?;
//! session.initialize().await?;
//!
//! let grid = session
//!     .factory()
//!     .create_instance(&ContractId::of("grid.modern"), None, None)?;
//! assert_eq!(grid.contract_id().as_str(), "grid.modern");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Instance activation and the capability trait
pub mod activator;
/// Implementation catalog and plugin registration
pub mod catalog;
/// Engine configuration
pub mod config;
/// Capability contracts and kind tags
pub mod contract;
/// The capability factory
pub mod factory;
/// Readiness coordination (typed pub/sub barrier)
pub mod readiness;
/// Settings-driven contract redirection
pub mod redirect;
/// Version-aware resolvers
pub mod resolver;
mod result;
/// Session wiring
pub mod session;
/// Environment snapshot and settings layers
pub mod snapshot;
/// Test doubles for engine consumers
pub mod testing;
/// Version ordering
pub mod version;

pub use activator::{
    ActivationContext, BoundCapability, Capability, ConstructorActivator, InstanceActivator,
    SessionHandle,
};
pub use catalog::{
    CapabilityCatalog, CapabilityModule, CatalogBuilder, CatalogSummary, ImplementationCandidate,
};
pub use config::EngineConfig;
pub use contract::{CapabilityContract, ContractId, ContractKind};
pub use factory::CapabilityFactory;
pub use readiness::{AppInitialized, ReadinessBus, ReadyState, ResolverReady};
pub use redirect::{
    new_look_enabled, semi_annual_channel_active, FixedRedirector, GridRedirector,
    RedirectRegistry, RedirectionRule,
};
pub use resolver::{
    CapabilityResolver, ExternalResolver, PlatformResolver, Resolution, ResolutionMap,
    WidgetResolver,
};
pub use result::{ElegirError, ElegirResult};
pub use session::{AppSession, SessionBuilder};
pub use snapshot::{
    AppSettings, EnvironmentSnapshot, MockSnapshotProvider, ReleaseChannel, SettingsLayers,
    SnapshotProvider, SnapshotStore, TenantSettings, UserSettings,
};
pub use version::Version;
