//! Test doubles for engine consumers.
//!
//! Page-object suites need a way to exercise catalog wiring without a
//! real browser session behind the activator. [`FakeControl`] is a
//! capability instance that records what it was constructed with, and
//! [`fake_candidate`] registers one under any contract and version.

use crate::activator::{ActivationContext, Capability};
use crate::catalog::ImplementationCandidate;
use crate::contract::ContractId;
use crate::version::Version;
use std::any::Any;
use std::sync::Arc;
use uuid::Uuid;

/// A capability instance that records its activation context
#[derive(Debug)]
pub struct FakeControl {
    instance_id: Uuid,
    contract: ContractId,
    type_name: String,
    name: Option<String>,
    parent_id: Option<Uuid>,
    session_id: Uuid,
}

impl FakeControl {
    /// Construct from an activation context, as a registered
    /// constructor would
    #[must_use]
    pub fn from_context(
        type_name: impl Into<String>,
        contract: ContractId,
        ctx: &ActivationContext,
    ) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            contract,
            type_name: type_name.into(),
            name: ctx.name().map(str::to_string),
            parent_id: ctx.parent().map(|p| p.instance_id()),
            session_id: ctx.session().session_id(),
        }
    }

    /// Concrete type name this fake stands in for
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Name the control was requested with
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Instance id of the requested parent, when one was supplied
    #[must_use]
    pub const fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    /// Session the control was activated in
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }
}

impl Capability for FakeControl {
    fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    fn contract_id(&self) -> &ContractId {
        &self.contract
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Register a [`FakeControl`]-producing candidate for `contract`
#[must_use]
pub fn fake_candidate(
    type_name: &str,
    contract: &str,
    min_version: Version,
) -> ImplementationCandidate {
    let contract_id = ContractId::of(contract);
    let ctor_contract = contract_id.clone();
    let ctor_name = type_name.to_string();
    ImplementationCandidate::new(type_name, contract_id, min_version, move |ctx| {
        Ok(Arc::new(FakeControl::from_context(
            ctor_name.clone(),
            ctor_contract.clone(),
            ctx,
        )))
    })
}
