//! Instance activation: turning a selected candidate into a live
//! capability instance.
//!
//! The factory never constructs concrete controls itself. It hands the
//! selected candidate and an [`ActivationContext`] to an
//! [`InstanceActivator`], which invokes the constructor the candidate
//! registered with the catalog. Only the context parts that are present
//! (name, parent) are supplied, so implementations with optional
//! parent/name work unchanged.

use crate::catalog::ImplementationCandidate;
use crate::config::EngineConfig;
use crate::contract::ContractId;
use crate::result::ElegirResult;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A live capability instance returned by the factory
///
/// Concrete page controls implement this. `as_any` enables the typed
/// [`crate::factory::CapabilityFactory::create`] surface to downcast a
/// shared instance without consuming it.
pub trait Capability: fmt::Debug + Send + Sync + 'static {
    /// Unique identity of this instance, used for parent-keyed caching
    fn instance_id(&self) -> Uuid;

    /// The contract this instance was created for
    fn contract_id(&self) -> &ContractId;

    /// Upcast for downcasting to the concrete type
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A capability type statically bound to the contract it satisfies
///
/// Page objects implement this on their control wrappers so they can
/// request capabilities by type alone.
pub trait BoundCapability: Capability + Sized {
    /// The contract this type is requested under
    fn bound_contract() -> ContractId;
}

/// Opaque page/session context injected into every activation
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: Uuid,
    app_url: String,
    tenant: Option<String>,
}

impl SessionHandle {
    /// Create a handle for a new logged-in session
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            app_url: config.app_url.clone(),
            tenant: config.tenant.clone(),
        }
    }

    /// Session identity
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Base URL of the application under test
    #[must_use]
    pub fn app_url(&self) -> &str {
        &self.app_url
    }

    /// Tenant display name, when configured
    #[must_use]
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }
}

/// Everything a candidate constructor may consume
#[derive(Clone)]
pub struct ActivationContext {
    session: SessionHandle,
    name: Option<String>,
    parent: Option<Arc<dyn Capability>>,
}

impl ActivationContext {
    /// Build a context; `name` and `parent` stay absent when the caller
    /// did not supply them
    #[must_use]
    pub fn new(
        session: SessionHandle,
        name: Option<String>,
        parent: Option<Arc<dyn Capability>>,
    ) -> Self {
        Self {
            session,
            name,
            parent,
        }
    }

    /// The page/session context
    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Disambiguating control name, when requested with one
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Parent capability instance, when requested with one
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<dyn Capability>> {
        self.parent.as_ref()
    }
}

impl fmt::Debug for ActivationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationContext")
            .field("session", &self.session.session_id())
            .field("name", &self.name)
            .field(
                "parent",
                &self.parent.as_ref().map(|p| p.instance_id()),
            )
            .finish()
    }
}

/// Seam between the factory and concrete construction
pub trait InstanceActivator: Send + Sync {
    /// Instantiate `candidate` with `ctx`; construction failures
    /// propagate unchanged
    fn activate(
        &self,
        candidate: &ImplementationCandidate,
        ctx: ActivationContext,
    ) -> ElegirResult<Arc<dyn Capability>>;
}

/// Default activator: invokes the constructor the candidate registered
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstructorActivator;

impl InstanceActivator for ConstructorActivator {
    fn activate(
        &self,
        candidate: &ImplementationCandidate,
        ctx: ActivationContext,
    ) -> ElegirResult<Arc<dyn Capability>> {
        tracing::debug!(
            candidate = candidate.type_name(),
            contract = %candidate.contract(),
            "activating candidate"
        );
        (candidate.constructor())(&ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_handle_from_config() {
        let config = EngineConfig::new()
            .with_app_url("https://contoso.crm.example.com")
            .with_tenant("contoso");
        let handle = SessionHandle::new(&config);
        assert_eq!(handle.app_url(), "https://contoso.crm.example.com");
        assert_eq!(handle.tenant(), Some("contoso"));
    }

    #[test]
    fn test_each_session_handle_is_unique() {
        let config = EngineConfig::default();
        let a = SessionHandle::new(&config);
        let b = SessionHandle::new(&config);
        assert_ne!(a.session_id(), b.session_id());
    }

    #[test]
    fn test_activation_context_optional_parts() {
        let session = SessionHandle::new(&EngineConfig::default());
        let ctx = ActivationContext::new(session, Some("owner".to_string()), None);
        assert_eq!(ctx.name(), Some("owner"));
        assert!(ctx.parent().is_none());
    }
}
