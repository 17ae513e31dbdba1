//! Implementation catalog: the closed set of contracts, candidates and
//! redirection rules known to the engine.
//!
//! There is no runtime type scanning. Each implementation module
//! registers its contracts and candidates through [`CatalogBuilder`]
//! at startup, and the built catalog is read-only for the process
//! lifetime. Duplicate (contract, version) candidate pairs are rejected
//! at build time so resolver selection stays deterministic.

use crate::activator::{ActivationContext, Capability};
use crate::contract::{CapabilityContract, ContractId, ContractKind};
use crate::redirect::RedirectionRule;
use crate::result::{ElegirError, ElegirResult};
use crate::snapshot::SnapshotStore;
use crate::version::Version;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Constructor registered for a concrete candidate
pub type Constructor =
    Arc<dyn Fn(&ActivationContext) -> ElegirResult<Arc<dyn Capability>> + Send + Sync>;

/// Constructor for a redirection rule, invoked once per factory with
/// the live snapshot accessor injected
pub type RedirectorCtor = Arc<dyn Fn(Arc<SnapshotStore>) -> Box<dyn RedirectionRule> + Send + Sync>;

/// A concrete, versioned implementation of a capability contract
///
/// A type implementing several contracts registers one candidate per
/// contract. The declared version is the minimum environment version
/// this implementation applies to.
#[derive(Clone)]
pub struct ImplementationCandidate {
    type_name: String,
    contract: ContractId,
    min_version: Version,
    constructor: Constructor,
}

impl ImplementationCandidate {
    /// Register a candidate for `contract`, applicable from
    /// `min_version` onward
    #[must_use]
    pub fn new(
        type_name: impl Into<String>,
        contract: ContractId,
        min_version: Version,
        constructor: impl Fn(&ActivationContext) -> ElegirResult<Arc<dyn Capability>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            contract,
            min_version,
            constructor: Arc::new(constructor),
        }
    }

    /// Diagnostic name of the concrete type
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Contract this candidate implements
    #[must_use]
    pub fn contract(&self) -> &ContractId {
        &self.contract
    }

    /// Minimum environment version this candidate applies to
    #[must_use]
    pub const fn min_version(&self) -> Version {
        self.min_version
    }

    /// The registered constructor
    #[must_use]
    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }
}

impl fmt::Debug for ImplementationCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplementationCandidate")
            .field("type_name", &self.type_name)
            .field("contract", &self.contract)
            .field("min_version", &self.min_version)
            .finish_non_exhaustive()
    }
}

/// An implementation module that contributes registrations at startup
pub trait CapabilityModule {
    /// Register this module's contracts, candidates and redirectors
    fn register(&self, builder: CatalogBuilder) -> CatalogBuilder;
}

/// Builder collecting registrations before validation
#[derive(Default)]
pub struct CatalogBuilder {
    contracts: Vec<CapabilityContract>,
    candidates: Vec<ImplementationCandidate>,
    redirectors: Vec<RedirectorCtor>,
}

impl CatalogBuilder {
    /// Start an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability contract
    #[must_use]
    pub fn with_contract(mut self, contract: CapabilityContract) -> Self {
        self.contracts.push(contract);
        self
    }

    /// Register an implementation candidate
    #[must_use]
    pub fn with_candidate(mut self, candidate: ImplementationCandidate) -> Self {
        self.candidates.push(candidate);
        self
    }

    /// Register a redirection rule constructor
    #[must_use]
    pub fn with_redirector(
        mut self,
        ctor: impl Fn(Arc<SnapshotStore>) -> Box<dyn RedirectionRule> + Send + Sync + 'static,
    ) -> Self {
        self.redirectors.push(Arc::new(ctor));
        self
    }

    /// Let an implementation module register everything it provides
    #[must_use]
    pub fn with_module(self, module: &dyn CapabilityModule) -> Self {
        module.register(self)
    }

    /// Validate registrations and freeze the catalog
    ///
    /// # Errors
    ///
    /// `Configuration` for a duplicate contract id or a candidate whose
    /// contract was never registered; `DuplicateCandidate` for two
    /// candidates declaring the same (contract, version) pair.
    pub fn build(self) -> ElegirResult<CapabilityCatalog> {
        let mut contracts: HashMap<ContractId, CapabilityContract> = HashMap::new();
        for contract in self.contracts {
            let id = contract.id().clone();
            if contracts.insert(id.clone(), contract).is_some() {
                return Err(ElegirError::Configuration {
                    message: format!("contract '{id}' registered twice"),
                });
            }
        }

        let mut candidates: HashMap<ContractId, Vec<Arc<ImplementationCandidate>>> =
            HashMap::new();
        for candidate in self.candidates {
            let contract = candidate.contract().clone();
            if !contracts.contains_key(&contract) {
                return Err(ElegirError::Configuration {
                    message: format!(
                        "candidate '{}' targets unregistered contract '{contract}'",
                        candidate.type_name()
                    ),
                });
            }
            let entry = candidates.entry(contract.clone()).or_default();
            if entry
                .iter()
                .any(|existing| existing.min_version() == candidate.min_version())
            {
                return Err(ElegirError::DuplicateCandidate {
                    contract: contract.to_string(),
                    version: candidate.min_version().to_string(),
                });
            }
            entry.push(Arc::new(candidate));
        }

        let catalog = CapabilityCatalog {
            contracts,
            candidates,
            redirectors: self.redirectors,
        };
        let summary = catalog.summary();
        info!(
            contracts = summary.contracts,
            candidates = summary.candidates,
            redirectors = summary.redirectors,
            "capability catalog built"
        );
        Ok(catalog)
    }
}

impl fmt::Debug for CatalogBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogBuilder")
            .field("contracts", &self.contracts.len())
            .field("candidates", &self.candidates.len())
            .field("redirectors", &self.redirectors.len())
            .finish()
    }
}

/// Counts for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSummary {
    /// Registered contracts
    pub contracts: usize,
    /// Registered candidates
    pub candidates: usize,
    /// Registered redirection rules
    pub redirectors: usize,
}

/// The frozen registry of contracts, candidates and redirectors
pub struct CapabilityCatalog {
    contracts: HashMap<ContractId, CapabilityContract>,
    candidates: HashMap<ContractId, Vec<Arc<ImplementationCandidate>>>,
    redirectors: Vec<RedirectorCtor>,
}

impl CapabilityCatalog {
    /// Look up a contract by id
    #[must_use]
    pub fn contract(&self, id: &ContractId) -> Option<&CapabilityContract> {
        self.contracts.get(id)
    }

    /// All contracts owned by `kind`
    #[must_use]
    pub fn contracts_of_kind(&self, kind: ContractKind) -> Vec<&CapabilityContract> {
        let mut owned: Vec<&CapabilityContract> = self
            .contracts
            .values()
            .filter(|c| c.kind() == kind)
            .collect();
        owned.sort_by(|a, b| a.id().cmp(b.id()));
        owned
    }

    /// Candidates registered for a contract (empty when none)
    #[must_use]
    pub fn candidates_for(&self, id: &ContractId) -> &[Arc<ImplementationCandidate>] {
        self.candidates.get(id).map_or(&[], Vec::as_slice)
    }

    /// Registered redirection rule constructors
    #[must_use]
    pub fn redirectors(&self) -> &[RedirectorCtor] {
        &self.redirectors
    }

    /// Registration counts
    #[must_use]
    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            contracts: self.contracts.len(),
            candidates: self.candidates.values().map(Vec::len).sum(),
            redirectors: self.redirectors.len(),
        }
    }
}

impl fmt::Debug for CapabilityCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.summary();
        f.debug_struct("CapabilityCatalog")
            .field("contracts", &summary.contracts)
            .field("candidates", &summary.candidates)
            .field("redirectors", &summary.redirectors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_candidate;

    fn grid_contract() -> CapabilityContract {
        CapabilityContract::custom_widget("grid.read-only", "pcf_grid_control")
    }

    #[test]
    fn test_build_empty_catalog() {
        let catalog = CatalogBuilder::new().build().unwrap();
        assert_eq!(catalog.summary().contracts, 0);
    }

    #[test]
    fn test_candidates_sorted_lookup() {
        let catalog = CatalogBuilder::new()
            .with_contract(grid_contract())
            .with_candidate(fake_candidate(
                "GridV1",
                "grid.read-only",
                Version::new(1, 0, 0),
            ))
            .with_candidate(fake_candidate(
                "GridV2",
                "grid.read-only",
                Version::new(2, 0, 0),
            ))
            .build()
            .unwrap();
        let id = ContractId::of("grid.read-only");
        assert_eq!(catalog.candidates_for(&id).len(), 2);
        assert!(catalog.contract(&id).is_some());
    }

    #[test]
    fn test_duplicate_contract_rejected() {
        let result = CatalogBuilder::new()
            .with_contract(grid_contract())
            .with_contract(grid_contract())
            .build();
        assert!(matches!(
            result,
            Err(ElegirError::Configuration { .. })
        ));
    }

    #[test]
    fn test_duplicate_candidate_version_rejected() {
        let result = CatalogBuilder::new()
            .with_contract(grid_contract())
            .with_candidate(fake_candidate(
                "GridA",
                "grid.read-only",
                Version::new(1, 0, 0),
            ))
            .with_candidate(fake_candidate(
                "GridB",
                "grid.read-only",
                Version::new(1, 0, 0),
            ))
            .build();
        assert!(matches!(
            result,
            Err(ElegirError::DuplicateCandidate { .. })
        ));
    }

    #[test]
    fn test_candidate_for_unregistered_contract_rejected() {
        let result = CatalogBuilder::new()
            .with_candidate(fake_candidate(
                "Orphan",
                "grid.read-only",
                Version::new(1, 0, 0),
            ))
            .build();
        assert!(matches!(
            result,
            Err(ElegirError::Configuration { .. })
        ));
    }

    #[test]
    fn test_contracts_of_kind_filters_and_sorts() {
        let catalog = CatalogBuilder::new()
            .with_contract(grid_contract())
            .with_contract(CapabilityContract::native_platform("field.currency"))
            .with_contract(CapabilityContract::native_platform("field.date"))
            .build()
            .unwrap();
        let native = catalog.contracts_of_kind(ContractKind::NativePlatform);
        assert_eq!(native.len(), 2);
        assert_eq!(native[0].id().as_str(), "field.currency");
        assert!(catalog
            .contracts_of_kind(ContractKind::External)
            .is_empty());
    }

    #[test]
    fn test_module_registration() {
        struct GridModule;
        impl CapabilityModule for GridModule {
            fn register(&self, builder: CatalogBuilder) -> CatalogBuilder {
                builder
                    .with_contract(grid_contract())
                    .with_candidate(fake_candidate(
                        "GridV1",
                        "grid.read-only",
                        Version::new(1, 0, 0),
                    ))
            }
        }

        let catalog = CatalogBuilder::new()
            .with_module(&GridModule)
            .build()
            .unwrap();
        assert_eq!(catalog.summary().contracts, 1);
        assert_eq!(catalog.summary().candidates, 1);
    }
}
