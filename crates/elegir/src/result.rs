//! Result and error types for Elegir.

use thiserror::Error;

/// Result type for Elegir operations
pub type ElegirResult<T> = Result<T, ElegirError>;

/// Errors that can occur in Elegir
///
/// The taxonomy is deliberately flat: every failure in the engine is
/// surfaced to the caller as one of these variants, and none of them is
/// recovered from internally. Resolution is either immediately
/// satisfiable from already-fetched state or it is a hard failure.
#[derive(Debug, Error)]
pub enum ElegirError {
    /// Catalog or contract metadata is wrong (missing correlation
    /// metadata, unknown contract, bad wiring)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// No implementation qualifies for the live version in this tenant
    #[error("Capability '{contract}' is unsupported in this tenant")]
    Unsupported {
        /// Contract that could not be satisfied
        contract: String,
    },

    /// A contract was requested whose kind no resolver owns
    #[error("No resolver owns capability kind '{kind}'")]
    UnknownKind {
        /// The orphaned kind tag
        kind: String,
    },

    /// Two candidates declared the same minimum version for one contract
    #[error("Duplicate candidate version {version} for contract '{contract}'")]
    DuplicateCandidate {
        /// Contract with the colliding candidates
        contract: String,
        /// The colliding declared version
        version: String,
    },

    /// A capability was requested before its owning resolver finished
    /// its readiness transition
    #[error("Capability '{contract}' requested before the {kind} resolver was ready")]
    NotReady {
        /// Contract that was requested too early
        contract: String,
        /// Kind of the not-yet-ready resolver
        kind: String,
    },

    /// The environment snapshot provider's remote call failed
    #[error("Remote fetch '{operation}' failed: {message}")]
    RemoteFetch {
        /// Which fetch failed (settings, widget versions, platform version)
        operation: String,
        /// Error message from the provider
        message: String,
    },

    /// Instantiating a selected candidate failed
    #[error("Activation of '{candidate}' failed: {message}")]
    Activation {
        /// Type name of the candidate being activated
        candidate: String,
        /// Error message
        message: String,
    },

    /// A version string could not be parsed
    #[error("Invalid version string: '{input}'")]
    VersionParse {
        /// The offending input
        input: String,
    },
}

impl ElegirError {
    /// True for errors caused by wrong catalog/contract metadata rather
    /// than by live tenant state
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::DuplicateCandidate { .. } | Self::UnknownKind { .. }
        )
    }

    /// True when the failure means "this tenant does not support the
    /// capability" and the enclosing test should skip/report cleanly
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}
