//! Capability factory: the single entry point page objects use.
//!
//! One call composes redirection, resolution, activation and caching:
//! look the request up in the instance cache, apply at most one
//! redirection hop, hand the effective contract to the resolver owning
//! its kind, activate the selected candidate, cache and return. There
//! are no retries anywhere: resolution is either immediately
//! satisfiable from already-fetched state or a hard failure.

use crate::activator::{
    ActivationContext, BoundCapability, Capability, InstanceActivator, SessionHandle,
};
use crate::catalog::CapabilityCatalog;
use crate::contract::ContractId;
use crate::redirect::RedirectRegistry;
use crate::resolver::CapabilityResolver;
use crate::result::{ElegirError, ElegirResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Cache key: the contract as requested, before redirection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    contract: ContractId,
    name: Option<String>,
    parent: Option<Uuid>,
}

/// Orchestrates redirection, resolution, activation and caching
pub struct CapabilityFactory {
    catalog: Arc<CapabilityCatalog>,
    resolvers: Vec<Arc<dyn CapabilityResolver>>,
    redirects: RedirectRegistry,
    activator: Arc<dyn InstanceActivator>,
    session: SessionHandle,
    cache: Mutex<HashMap<CacheKey, Arc<dyn Capability>>>,
}

impl CapabilityFactory {
    /// Compose a factory from its collaborators
    #[must_use]
    pub fn new(
        catalog: Arc<CapabilityCatalog>,
        resolvers: Vec<Arc<dyn CapabilityResolver>>,
        redirects: RedirectRegistry,
        activator: Arc<dyn InstanceActivator>,
        session: SessionHandle,
    ) -> Self {
        Self {
            catalog,
            resolvers,
            redirects,
            activator,
            session,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The page/session context this factory injects into activations
    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Number of live cached instances
    #[must_use]
    pub fn cached_instances(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Create (or return the cached) instance for `contract`
    ///
    /// Instances are cached per (contract as requested, name, parent
    /// identity) and live until this factory is dropped with its
    /// owning session.
    ///
    /// # Errors
    ///
    /// `Configuration` for an unknown contract, `UnknownKind` when no
    /// resolver owns the contract's kind, `NotReady` when the owning
    /// resolver has not finished its readiness transition,
    /// `Unsupported` when no implementation qualifies in this tenant,
    /// and activation failures unchanged.
    pub fn create_instance(
        &self,
        contract: &ContractId,
        name: Option<&str>,
        parent: Option<&Arc<dyn Capability>>,
    ) -> ElegirResult<Arc<dyn Capability>> {
        let key = CacheKey {
            contract: contract.clone(),
            name: name.map(str::to_string),
            parent: parent.map(|p| p.instance_id()),
        };
        if let Ok(cache) = self.cache.lock() {
            if let Some(instance) = cache.get(&key) {
                debug!(contract = %contract, "instance cache hit");
                return Ok(Arc::clone(instance));
            }
        }

        // One redirection hop; the target is resolved as-is
        let effective = match self.redirects.redirect(contract)? {
            Some(target) => {
                debug!(requested = %contract, target = %target, "request redirected");
                target
            }
            None => contract.clone(),
        };

        let definition =
            self.catalog
                .contract(&effective)
                .ok_or_else(|| ElegirError::Configuration {
                    message: format!("contract '{effective}' is not registered"),
                })?;

        let resolver = self
            .resolvers
            .iter()
            .find(|r| r.is_resolvable(definition))
            .ok_or_else(|| ElegirError::UnknownKind {
                kind: definition.kind().to_string(),
            })?;

        let candidate =
            resolver
                .resolve(definition)?
                .ok_or_else(|| ElegirError::Unsupported {
                    contract: effective.to_string(),
                })?;

        let ctx = ActivationContext::new(
            self.session.clone(),
            name.map(str::to_string),
            parent.cloned(),
        );
        let instance = self.activator.activate(&candidate, ctx)?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, Arc::clone(&instance));
        }
        Ok(instance)
    }

    /// Typed entry point: create the capability bound to `T`
    ///
    /// # Errors
    ///
    /// As [`Self::create_instance`], plus `Configuration` when the
    /// activated instance is not a `T`.
    pub fn create<T: BoundCapability>(
        &self,
        name: Option<&str>,
        parent: Option<&Arc<dyn Capability>>,
    ) -> ElegirResult<Arc<T>> {
        let contract = T::bound_contract();
        let instance = self.create_instance(&contract, name, parent)?;
        instance
            .as_any()
            .downcast::<T>()
            .map_err(|_| ElegirError::Configuration {
                message: format!(
                    "instance for contract '{contract}' is not a {}",
                    std::any::type_name::<T>()
                ),
            })
    }
}

impl fmt::Debug for CapabilityFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityFactory")
            .field("session", &self.session.session_id())
            .field("resolvers", &self.resolvers.len())
            .field("redirects", &self.redirects)
            .field("cached_instances", &self.cached_instances())
            .finish()
    }
}
