//! Version-aware resolvers: selecting the implementation candidate for
//! a contract, gated by one-time asynchronous readiness.
//!
//! Three resolvers run side by side, one per contract kind. Each owns
//! the same matching rule (the highest declared minimum version not
//! exceeding the live version the environment reports), applied to its
//! own slice of the contract set. A resolver subscribes to
//! [`AppInitialized`](crate::readiness::AppInitialized) at
//! construction, fetches the snapshot fragment it owns when that
//! signal arrives, builds its entire slice of the [`ResolutionMap`],
//! and only then flips to `Ready` and announces itself. A fetch
//! failure is fatal; the resolver never silently stays pending.
//!
//! Cross-resolver ordering is not guaranteed. A request for a contract
//! whose owning resolver has not become ready fails with `NotReady`
//! rather than blocking, since no timeout layer exists above this
//! component.

use crate::catalog::{CapabilityCatalog, ImplementationCandidate};
use crate::contract::{CapabilityContract, ContractId, ContractKind};
use crate::readiness::{AppInitialized, ReadinessBus, ReadyState, ResolverReady};
use crate::result::{ElegirError, ElegirResult};
use crate::snapshot::{SnapshotProvider, SnapshotStore};
use crate::version::Version;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};
use tracing::{debug, info, warn};

/// Outcome recorded for one contract after its resolver's map build
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The active candidate for the live version
    Resolved(Arc<ImplementationCandidate>),
    /// No candidate qualifies in this tenant
    Unresolved,
}

/// Contract → resolution, filled incrementally by resolvers
///
/// Each resolver fills only the entries for contracts it owns, during
/// its readiness transition. Entries already present are never
/// overwritten.
#[derive(Debug, Default)]
pub struct ResolutionMap {
    entries: RwLock<HashMap<ContractId, Resolution>>,
}

impl ResolutionMap {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `resolution` unless an entry already exists
    ///
    /// Returns false (and logs) when the entry was already filled.
    pub fn fill_if_absent(&self, id: ContractId, resolution: Resolution) -> bool {
        let Ok(mut entries) = self.entries.write() else {
            return false;
        };
        if entries.contains_key(&id) {
            warn!(contract = %id, "resolution already recorded, keeping the existing entry");
            return false;
        }
        entries.insert(id, resolution);
        true
    }

    /// Recorded resolution for a contract
    #[must_use]
    pub fn get(&self, id: &ContractId) -> Option<Resolution> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(id).cloned())
    }

    /// Number of recorded entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether no entries have been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Highest declared version not exceeding `live`, or `None`
pub(crate) fn select_highest_at_most(
    candidates: &[Arc<ImplementationCandidate>],
    live: Version,
) -> Option<Arc<ImplementationCandidate>> {
    candidates
        .iter()
        .filter(|c| c.min_version() <= live)
        .max_by_key(|c| c.min_version())
        .cloned()
}

/// Highest declared version unconditionally, or `None`
pub(crate) fn select_highest(
    candidates: &[Arc<ImplementationCandidate>],
) -> Option<Arc<ImplementationCandidate>> {
    candidates.iter().max_by_key(|c| c.min_version()).cloned()
}

/// A resolver owning one contract kind
pub trait CapabilityResolver: Send + Sync {
    /// The kind this resolver owns
    fn kind(&self) -> ContractKind;

    /// Current readiness state
    fn state(&self) -> ReadyState;

    /// Whether this resolver owns `contract`; pure, callable before
    /// readiness
    fn is_resolvable(&self, contract: &CapabilityContract) -> bool {
        contract.kind() == self.kind()
    }

    /// The active candidate for `contract`
    ///
    /// `Ok(None)` means no implementation is available in this tenant;
    /// the caller decides how to surface that.
    ///
    /// # Errors
    ///
    /// `NotReady` before the readiness transition completes,
    /// `Configuration` when asked about a contract of a foreign kind.
    fn resolve(
        &self,
        contract: &CapabilityContract,
    ) -> ElegirResult<Option<Arc<ImplementationCandidate>>>;
}

/// State and map plumbing shared by the three resolver variants
struct ResolverCore {
    kind: ContractKind,
    catalog: Arc<CapabilityCatalog>,
    map: Arc<ResolutionMap>,
    state: RwLock<ReadyState>,
}

impl ResolverCore {
    fn new(kind: ContractKind, catalog: Arc<CapabilityCatalog>, map: Arc<ResolutionMap>) -> Self {
        Self {
            kind,
            catalog,
            map,
            state: RwLock::new(ReadyState::Pending),
        }
    }

    fn state(&self) -> ReadyState {
        self.state.read().map(|s| *s).unwrap_or(ReadyState::Failed)
    }

    fn set_state(&self, state: ReadyState) {
        if let Ok(mut slot) = self.state.write() {
            *slot = state;
        }
    }

    fn record(&self, contract: &CapabilityContract, resolution: Resolution) {
        if let Resolution::Resolved(candidate) = &resolution {
            debug!(
                contract = %contract.id(),
                candidate = candidate.type_name(),
                version = %candidate.min_version(),
                "resolution recorded"
            );
        } else {
            debug!(contract = %contract.id(), "no qualifying candidate");
        }
        self.map.fill_if_absent(contract.id().clone(), resolution);
    }

    fn resolve(
        &self,
        contract: &CapabilityContract,
    ) -> ElegirResult<Option<Arc<ImplementationCandidate>>> {
        if contract.kind() != self.kind {
            return Err(ElegirError::Configuration {
                message: format!(
                    "{} resolver asked to resolve '{}' of kind {}",
                    self.kind,
                    contract.id(),
                    contract.kind()
                ),
            });
        }
        match self.state() {
            ReadyState::Ready => {}
            ReadyState::Pending | ReadyState::Failed => {
                return Err(ElegirError::NotReady {
                    contract: contract.id().to_string(),
                    kind: self.kind.to_string(),
                });
            }
        }
        match self.map.get(contract.id()) {
            Some(Resolution::Resolved(candidate)) => Ok(Some(candidate)),
            Some(Resolution::Unresolved) | None => Ok(None),
        }
    }
}

/// Resolver for tenant-installed custom widgets
///
/// Correlates each contract's declared widget name with the live
/// per-widget version table.
pub struct WidgetResolver {
    core: ResolverCore,
    provider: Arc<dyn SnapshotProvider>,
    snapshot: Arc<SnapshotStore>,
}

impl WidgetResolver {
    /// Create the resolver and subscribe it to `AppInitialized`
    #[must_use]
    pub fn new(
        catalog: Arc<CapabilityCatalog>,
        provider: Arc<dyn SnapshotProvider>,
        snapshot: Arc<SnapshotStore>,
        map: Arc<ResolutionMap>,
        bus: &Arc<ReadinessBus>,
    ) -> Arc<Self> {
        let resolver = Arc::new(Self {
            core: ResolverCore::new(ContractKind::CustomWidget, catalog, map),
            provider,
            snapshot,
        });
        let subscriber = Arc::clone(&resolver);
        let bus_ref = Arc::downgrade(bus);
        bus.subscribe::<AppInitialized, _, _>(move |_| {
            let resolver = Arc::clone(&subscriber);
            let bus_ref = bus_ref.clone();
            async move { resolver.on_app_initialized(&bus_ref).await }
        });
        resolver
    }

    async fn on_app_initialized(&self, bus: &Weak<ReadinessBus>) -> ElegirResult<()> {
        if self.core.state() != ReadyState::Pending {
            return Ok(());
        }
        let versions = match self.provider.fetch_widget_versions().await {
            Ok(versions) => versions,
            Err(err) => {
                self.core.set_state(ReadyState::Failed);
                return Err(err);
            }
        };
        self.snapshot.set_widget_versions(versions.clone());
        if let Err(err) = self.build_resolutions(&versions) {
            self.core.set_state(ReadyState::Failed);
            return Err(err);
        }
        self.core.set_state(ReadyState::Ready);
        info!(kind = %ContractKind::CustomWidget, "resolver ready");
        if let Some(bus) = bus.upgrade() {
            bus.publish(ResolverReady {
                kind: ContractKind::CustomWidget,
            })
            .await?;
        }
        Ok(())
    }

    fn build_resolutions(&self, versions: &HashMap<String, Version>) -> ElegirResult<()> {
        for contract in self
            .core
            .catalog
            .contracts_of_kind(ContractKind::CustomWidget)
        {
            let Some(name) = contract.widget_name() else {
                return Err(ElegirError::Configuration {
                    message: format!(
                        "custom-widget contract '{}' declares no widget name",
                        contract.id()
                    ),
                });
            };
            let resolution = match versions.get(name) {
                Some(live) => select_highest_at_most(
                    self.core.catalog.candidates_for(contract.id()),
                    *live,
                )
                .map_or(Resolution::Unresolved, Resolution::Resolved),
                // Widget not installed in this tenant
                None => Resolution::Unresolved,
            };
            self.core.record(contract, resolution);
        }
        Ok(())
    }
}

impl fmt::Debug for WidgetResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetResolver")
            .field("state", &self.core.state())
            .finish_non_exhaustive()
    }
}

impl CapabilityResolver for WidgetResolver {
    fn kind(&self) -> ContractKind {
        ContractKind::CustomWidget
    }

    fn state(&self) -> ReadyState {
        self.core.state()
    }

    fn resolve(
        &self,
        contract: &CapabilityContract,
    ) -> ElegirResult<Option<Arc<ImplementationCandidate>>> {
        self.core.resolve(contract)
    }
}

/// Resolver for native platform controls
///
/// Every native contract correlates with the single live platform
/// build, so one fetch covers the whole slice.
pub struct PlatformResolver {
    core: ResolverCore,
    provider: Arc<dyn SnapshotProvider>,
    snapshot: Arc<SnapshotStore>,
}

impl PlatformResolver {
    /// Create the resolver and subscribe it to `AppInitialized`
    #[must_use]
    pub fn new(
        catalog: Arc<CapabilityCatalog>,
        provider: Arc<dyn SnapshotProvider>,
        snapshot: Arc<SnapshotStore>,
        map: Arc<ResolutionMap>,
        bus: &Arc<ReadinessBus>,
    ) -> Arc<Self> {
        let resolver = Arc::new(Self {
            core: ResolverCore::new(ContractKind::NativePlatform, catalog, map),
            provider,
            snapshot,
        });
        let subscriber = Arc::clone(&resolver);
        let bus_ref = Arc::downgrade(bus);
        bus.subscribe::<AppInitialized, _, _>(move |_| {
            let resolver = Arc::clone(&subscriber);
            let bus_ref = bus_ref.clone();
            async move { resolver.on_app_initialized(&bus_ref).await }
        });
        resolver
    }

    async fn on_app_initialized(&self, bus: &Weak<ReadinessBus>) -> ElegirResult<()> {
        if self.core.state() != ReadyState::Pending {
            return Ok(());
        }
        let live = match self.provider.fetch_platform_version().await {
            Ok(version) => version,
            Err(err) => {
                self.core.set_state(ReadyState::Failed);
                return Err(err);
            }
        };
        self.snapshot.set_platform_version(live);
        for contract in self
            .core
            .catalog
            .contracts_of_kind(ContractKind::NativePlatform)
        {
            let resolution =
                select_highest_at_most(self.core.catalog.candidates_for(contract.id()), live)
                    .map_or(Resolution::Unresolved, Resolution::Resolved);
            self.core.record(contract, resolution);
        }
        self.core.set_state(ReadyState::Ready);
        info!(kind = %ContractKind::NativePlatform, platform = %live, "resolver ready");
        if let Some(bus) = bus.upgrade() {
            bus.publish(ResolverReady {
                kind: ContractKind::NativePlatform,
            })
            .await?;
        }
        Ok(())
    }
}

impl fmt::Debug for PlatformResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformResolver")
            .field("state", &self.core.state())
            .finish_non_exhaustive()
    }
}

impl CapabilityResolver for PlatformResolver {
    fn kind(&self) -> ContractKind {
        ContractKind::NativePlatform
    }

    fn state(&self) -> ReadyState {
        self.core.state()
    }

    fn resolve(
        &self,
        contract: &CapabilityContract,
    ) -> ElegirResult<Option<Arc<ImplementationCandidate>>> {
        self.core.resolve(contract)
    }
}

/// Resolver for login/external surfaces
///
/// External UI is not tenant-versioned, so this resolver needs no live
/// data: it is ready from construction and selects the single highest
/// declared version unconditionally.
pub struct ExternalResolver {
    core: ResolverCore,
}

impl ExternalResolver {
    /// Create the resolver, ready immediately
    #[must_use]
    pub fn new(catalog: Arc<CapabilityCatalog>, map: Arc<ResolutionMap>) -> Arc<Self> {
        let core = ResolverCore::new(ContractKind::External, catalog, map);
        for contract in core.catalog.contracts_of_kind(ContractKind::External) {
            let resolution = select_highest(core.catalog.candidates_for(contract.id()))
                .map_or(Resolution::Unresolved, Resolution::Resolved);
            core.record(contract, resolution);
        }
        core.set_state(ReadyState::Ready);
        Arc::new(Self { core })
    }
}

impl fmt::Debug for ExternalResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalResolver")
            .field("state", &self.core.state())
            .finish_non_exhaustive()
    }
}

impl CapabilityResolver for ExternalResolver {
    fn kind(&self) -> ContractKind {
        ContractKind::External
    }

    fn state(&self) -> ReadyState {
        self.core.state()
    }

    fn resolve(
        &self,
        contract: &CapabilityContract,
    ) -> ElegirResult<Option<Arc<ImplementationCandidate>>> {
        self.core.resolve(contract)
    }
}
