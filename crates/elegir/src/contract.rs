//! Capability contracts: the abstract capabilities page objects request.
//!
//! A contract identifies *what* a test author wants ("a read-only
//! grid") without naming the concrete control present in the tenant.
//! The full contract set is registered once at catalog build and is
//! closed for the process lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a capability contract
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractId(String);

impl ContractId {
    /// Create a contract id
    #[must_use]
    pub fn of(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContractId {
    fn from(s: &str) -> Self {
        Self::of(s)
    }
}

/// Kind tag deciding which resolver owns a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractKind {
    /// Tenant-installed custom widget, versioned per widget name
    CustomWidget,
    /// Native platform control, versioned by the platform build
    NativePlatform,
    /// Login/external surface, not tenant-versioned
    External,
}

impl ContractKind {
    /// Kind tag as a static string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CustomWidget => "CustomWidget",
            Self::NativePlatform => "NativePlatform",
            Self::External => "External",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An abstract capability a caller can request
///
/// Immutable once registered. For `CustomWidget` contracts the
/// `widget_name` correlates the contract with the live per-widget
/// version table; a widget contract registered without one is a
/// configuration error surfaced during resolver readiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityContract {
    id: ContractId,
    kind: ContractKind,
    widget_name: Option<String>,
}

impl CapabilityContract {
    /// General constructor used by catalog registration
    #[must_use]
    pub fn new(id: ContractId, kind: ContractKind, widget_name: Option<String>) -> Self {
        Self {
            id,
            kind,
            widget_name,
        }
    }

    /// A custom-widget contract correlated with `widget_name`
    #[must_use]
    pub fn custom_widget(id: impl Into<String>, widget_name: impl Into<String>) -> Self {
        Self::new(
            ContractId::of(id),
            ContractKind::CustomWidget,
            Some(widget_name.into()),
        )
    }

    /// A native platform-control contract
    #[must_use]
    pub fn native_platform(id: impl Into<String>) -> Self {
        Self::new(ContractId::of(id), ContractKind::NativePlatform, None)
    }

    /// A login/external contract
    #[must_use]
    pub fn external(id: impl Into<String>) -> Self {
        Self::new(ContractId::of(id), ContractKind::External, None)
    }

    /// Contract identity
    #[must_use]
    pub fn id(&self) -> &ContractId {
        &self.id
    }

    /// Which resolver owns this contract
    #[must_use]
    pub const fn kind(&self) -> ContractKind {
        self.kind
    }

    /// Declared external widget name, when the kind carries one
    #[must_use]
    pub fn widget_name(&self) -> Option<&str> {
        self.widget_name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_widget_carries_name() {
        let contract = CapabilityContract::custom_widget("grid.read-only", "pcf_grid_control");
        assert_eq!(contract.kind(), ContractKind::CustomWidget);
        assert_eq!(contract.widget_name(), Some("pcf_grid_control"));
        assert_eq!(contract.id().as_str(), "grid.read-only");
    }

    #[test]
    fn test_native_platform_has_no_widget_name() {
        let contract = CapabilityContract::native_platform("field.currency");
        assert_eq!(contract.kind(), ContractKind::NativePlatform);
        assert_eq!(contract.widget_name(), None);
    }

    #[test]
    fn test_widget_contract_without_name_is_constructible() {
        // The misconfiguration must be representable so the resolver can
        // reject it during readiness rather than here
        let contract = CapabilityContract::new(
            ContractId::of("grid.unnamed"),
            ContractKind::CustomWidget,
            None,
        );
        assert_eq!(contract.widget_name(), None);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ContractKind::CustomWidget.to_string(), "CustomWidget");
        assert_eq!(ContractKind::External.to_string(), "External");
    }

    #[test]
    fn test_contract_id_equality_and_display() {
        let a = ContractId::of("grid.read-only");
        let b: ContractId = "grid.read-only".into();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "grid.read-only");
    }
}
