//! Redirection: rewriting a requested contract to a different one
//! before resolution, driven by live feature-flag state.
//!
//! A small set of contracts is never resolved directly. A redirection
//! rule, registered in the catalog and instantiated once per factory
//! with the snapshot accessor injected, rewrites the request to a more
//! specific contract. Rules are cheap, synchronous functions of the
//! settings layers and run on every request for their source contract.
//! Redirection is a single hop, never chained.

use crate::contract::ContractId;
use crate::result::ElegirResult;
use crate::snapshot::{ReleaseChannel, SettingsLayers, SnapshotStore};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Contract ids the stock redirectors rewrite between
pub mod contracts {
    /// Grid capability as page objects request it
    pub const READ_ONLY_GRID: &str = "grid.read-only";
    /// Modernized grid implementation contract
    pub const MODERN_GRID: &str = "grid.modern";
    /// Legacy PCF grid implementation contract
    pub const LEGACY_PCF_GRID: &str = "grid.legacy-pcf";
    /// Lookup field as page objects request it
    pub const LOOKUP_FIELD: &str = "field.lookup";
    /// Advanced lookup dialog contract every lookup resolves to
    pub const ADVANCED_LOOKUP: &str = "field.lookup.advanced";
}

/// Whether the semi-annual release channel is active for this session
///
/// Precedence is user > app > tenant: an explicit user override wins
/// outright, a user on `Auto` defers to the app, and an app on `Auto`
/// defers to the tenant. A user override of `Other` suppresses the
/// channel regardless of the app and tenant choices.
#[must_use]
pub const fn semi_annual_channel_active(
    user_override: ReleaseChannel,
    app_channel: ReleaseChannel,
    tenant_channel: ReleaseChannel,
) -> bool {
    match user_override {
        ReleaseChannel::SemiAnnual => true,
        ReleaseChannel::Other => false,
        ReleaseChannel::Auto => match app_channel {
            ReleaseChannel::SemiAnnual => true,
            ReleaseChannel::Other => false,
            ReleaseChannel::Auto => matches!(tenant_channel, ReleaseChannel::SemiAnnual),
        },
    }
}

/// Whether the modernized look is enabled for this session
///
/// `app_always_on` forces it on for everyone. When the app does not
/// allow opting out, the look stays disabled. When it does, the user's
/// own toggle decides, and a user who never touched the toggle gets
/// the modernized look.
#[must_use]
pub const fn new_look_enabled(
    app_always_on: bool,
    app_opt_out: bool,
    user_override: Option<bool>,
) -> bool {
    if app_always_on {
        true
    } else if !app_opt_out {
        false
    } else if let Some(choice) = user_override {
        choice
    } else {
        true
    }
}

/// A rule rewriting one source contract before resolution
pub trait RedirectionRule: Send + Sync {
    /// The contract this rule intercepts
    fn source(&self) -> &ContractId;

    /// The contract to resolve instead
    ///
    /// # Errors
    ///
    /// `Configuration` when the settings the rule depends on have not
    /// been fetched yet.
    fn redirect(&self) -> ElegirResult<ContractId>;
}

/// Redirects the read-only grid to the legacy PCF grid or the modern
/// grid, composing the channel and new-look policies
pub struct GridRedirector {
    snapshot: Arc<SnapshotStore>,
    source: ContractId,
    legacy: ContractId,
    modern: ContractId,
}

impl GridRedirector {
    /// Create the stock grid redirector over `snapshot`
    #[must_use]
    pub fn new(snapshot: Arc<SnapshotStore>) -> Self {
        Self {
            snapshot,
            source: ContractId::of(contracts::READ_ONLY_GRID),
            legacy: ContractId::of(contracts::LEGACY_PCF_GRID),
            modern: ContractId::of(contracts::MODERN_GRID),
        }
    }

    /// The target contract for the given settings
    ///
    /// Legacy PCF grid only when the semi-annual channel is active and
    /// the modernized look is off; the modern grid otherwise.
    #[must_use]
    pub fn target_for(&self, settings: &SettingsLayers) -> &ContractId {
        let channel_active = semi_annual_channel_active(
            settings.user.channel_override,
            settings.app.release_channel,
            settings.tenant.release_channel,
        );
        let modern_look = new_look_enabled(
            settings.app.new_look_always_on,
            settings.app.new_look_opt_out,
            settings.user.modernization_override,
        );
        if channel_active && !modern_look {
            &self.legacy
        } else {
            &self.modern
        }
    }
}

impl RedirectionRule for GridRedirector {
    fn source(&self) -> &ContractId {
        &self.source
    }

    fn redirect(&self) -> ElegirResult<ContractId> {
        let settings = self.snapshot.settings()?;
        let target = self.target_for(&settings).clone();
        debug!(source = %self.source, target = %target, "grid redirection");
        Ok(target)
    }
}

impl fmt::Debug for GridRedirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridRedirector")
            .field("source", &self.source)
            .field("legacy", &self.legacy)
            .field("modern", &self.modern)
            .finish_non_exhaustive()
    }
}

/// Redirects a source contract to one fixed target, regardless of
/// settings
///
/// The lookup field uses this: every lookup opens the advanced lookup
/// dialog, so the rewrite never varies.
#[derive(Debug, Clone)]
pub struct FixedRedirector {
    source: ContractId,
    target: ContractId,
}

impl FixedRedirector {
    /// Redirect `source` to `target` unconditionally
    #[must_use]
    pub fn new(source: ContractId, target: ContractId) -> Self {
        Self { source, target }
    }

    /// The stock lookup-to-advanced-lookup rewrite
    #[must_use]
    pub fn lookup() -> Self {
        Self::new(
            ContractId::of(contracts::LOOKUP_FIELD),
            ContractId::of(contracts::ADVANCED_LOOKUP),
        )
    }
}

impl RedirectionRule for FixedRedirector {
    fn source(&self) -> &ContractId {
        &self.source
    }

    fn redirect(&self) -> ElegirResult<ContractId> {
        Ok(self.target.clone())
    }
}

/// Rules keyed by source contract, at most one per source
pub struct RedirectRegistry {
    rules: HashMap<ContractId, Box<dyn RedirectionRule>>,
}

impl RedirectRegistry {
    /// Index `rules` by source contract
    ///
    /// When two rules claim the same source, the first discovered is
    /// kept and the others are dropped with a warning.
    #[must_use]
    pub fn from_rules(rules: Vec<Box<dyn RedirectionRule>>) -> Self {
        let mut indexed: HashMap<ContractId, Box<dyn RedirectionRule>> = HashMap::new();
        for rule in rules {
            let source = rule.source().clone();
            if indexed.contains_key(&source) {
                warn!(source = %source, "duplicate redirection rule dropped");
                continue;
            }
            indexed.insert(source, rule);
        }
        Self { rules: indexed }
    }

    /// Apply the rule for `source`, when one exists
    ///
    /// # Errors
    ///
    /// Whatever the rule returns.
    pub fn redirect(&self, source: &ContractId) -> ElegirResult<Option<ContractId>> {
        match self.rules.get(source) {
            Some(rule) => rule.redirect().map(Some),
            None => Ok(None),
        }
    }

    /// Number of registered rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Debug for RedirectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sources: Vec<&ContractId> = self.rules.keys().collect();
        sources.sort();
        f.debug_struct("RedirectRegistry")
            .field("sources", &sources)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{AppSettings, TenantSettings, UserSettings};

    fn settings(
        user_channel: ReleaseChannel,
        app_channel: ReleaseChannel,
        tenant_channel: ReleaseChannel,
        always_on: bool,
        opt_out: bool,
        user_modern: Option<bool>,
    ) -> SettingsLayers {
        SettingsLayers {
            tenant: TenantSettings {
                release_channel: tenant_channel,
            },
            app: AppSettings {
                release_channel: app_channel,
                new_look_always_on: always_on,
                new_look_opt_out: opt_out,
            },
            user: UserSettings {
                channel_override: user_channel,
                modernization_override: user_modern,
            },
        }
    }

    // ========================================================================
    // Release-channel precedence: full truth table
    // ========================================================================

    mod channel_tests {
        use super::*;
        use ReleaseChannel::{Auto, Other, SemiAnnual};

        /// The triples for which the channel must be active
        const ACTIVE: &[(ReleaseChannel, ReleaseChannel, ReleaseChannel)] = &[
            // User override wins outright, app and tenant irrelevant
            (SemiAnnual, Auto, Auto),
            (SemiAnnual, Auto, SemiAnnual),
            (SemiAnnual, Auto, Other),
            (SemiAnnual, SemiAnnual, Auto),
            (SemiAnnual, SemiAnnual, SemiAnnual),
            (SemiAnnual, SemiAnnual, Other),
            (SemiAnnual, Other, Auto),
            (SemiAnnual, Other, SemiAnnual),
            (SemiAnnual, Other, Other),
            // No user choice, app pins the channel
            (Auto, SemiAnnual, Auto),
            (Auto, SemiAnnual, SemiAnnual),
            (Auto, SemiAnnual, Other),
            // No user or app choice, tenant decides
            (Auto, Auto, SemiAnnual),
        ];

        #[test]
        fn test_exhaustive_channel_table() {
            for user in ReleaseChannel::ALL {
                for app in ReleaseChannel::ALL {
                    for tenant in ReleaseChannel::ALL {
                        let expected = ACTIVE.contains(&(user, app, tenant));
                        assert_eq!(
                            semi_annual_channel_active(user, app, tenant),
                            expected,
                            "user={user} app={app} tenant={tenant}"
                        );
                    }
                }
            }
        }

        #[test]
        fn test_user_other_suppresses_everything() {
            assert!(!semi_annual_channel_active(Other, SemiAnnual, SemiAnnual));
        }

        #[test]
        fn test_app_other_blocks_tenant_channel() {
            assert!(!semi_annual_channel_active(Auto, Other, SemiAnnual));
        }
    }

    // ========================================================================
    // New-look precedence: full truth table
    // ========================================================================

    mod new_look_tests {
        use super::*;

        #[test]
        fn test_exhaustive_new_look_table() {
            for always_on in [false, true] {
                for opt_out in [false, true] {
                    for user in [None, Some(false), Some(true)] {
                        let expected = if always_on {
                            true
                        } else if !opt_out {
                            false
                        } else {
                            // App allows opting out: the user's toggle
                            // decides, defaulting to the modern look
                            user.unwrap_or(true)
                        };
                        assert_eq!(
                            new_look_enabled(always_on, opt_out, user),
                            expected,
                            "always_on={always_on} opt_out={opt_out} user={user:?}"
                        );
                    }
                }
            }
        }

        #[test]
        fn test_always_on_beats_user_opt_out() {
            assert!(new_look_enabled(true, true, Some(false)));
        }

        #[test]
        fn test_untouched_toggle_defaults_to_modern() {
            assert!(new_look_enabled(false, true, None));
        }
    }

    // ========================================================================
    // Grid redirection: product of both tables
    // ========================================================================

    mod grid_tests {
        use super::*;
        use ReleaseChannel::{Auto, Other, SemiAnnual};

        fn redirector() -> GridRedirector {
            GridRedirector::new(Arc::new(SnapshotStore::new()))
        }

        #[test]
        fn test_exhaustive_grid_table() {
            let redirector = redirector();
            for user_channel in ReleaseChannel::ALL {
                for app_channel in ReleaseChannel::ALL {
                    for tenant_channel in ReleaseChannel::ALL {
                        for always_on in [false, true] {
                            for opt_out in [false, true] {
                                for user_modern in [None, Some(false), Some(true)] {
                                    let layers = settings(
                                        user_channel,
                                        app_channel,
                                        tenant_channel,
                                        always_on,
                                        opt_out,
                                        user_modern,
                                    );
                                    let active = semi_annual_channel_active(
                                        user_channel,
                                        app_channel,
                                        tenant_channel,
                                    );
                                    let modern_look =
                                        new_look_enabled(always_on, opt_out, user_modern);
                                    let expected = if active && !modern_look {
                                        contracts::LEGACY_PCF_GRID
                                    } else {
                                        contracts::MODERN_GRID
                                    };
                                    assert_eq!(
                                        redirector.target_for(&layers).as_str(),
                                        expected,
                                        "user={user_channel} app={app_channel} \
                                         tenant={tenant_channel} always_on={always_on} \
                                         opt_out={opt_out} user_modern={user_modern:?}"
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }

        #[test]
        fn test_legacy_grid_needs_channel_and_classic_look() {
            let redirector = redirector();
            // Semi-annual via the tenant, user opted back to classic
            let layers = settings(Auto, Auto, SemiAnnual, false, true, Some(false));
            assert_eq!(
                redirector.target_for(&layers).as_str(),
                contracts::LEGACY_PCF_GRID
            );
        }

        #[test]
        fn test_user_channel_override_with_default_look_stays_modern() {
            let redirector = redirector();
            // Channel active via user override, but the untouched
            // modernization toggle defaults the look to enabled, so the
            // modern grid wins
            let layers = settings(SemiAnnual, Auto, Other, false, true, None);
            assert_eq!(
                redirector.target_for(&layers).as_str(),
                contracts::MODERN_GRID
            );
        }

        #[test]
        fn test_redirect_reads_live_settings() {
            let store = Arc::new(SnapshotStore::new());
            let redirector = GridRedirector::new(store.clone());
            // Settings not fetched yet: redirection cannot run
            assert!(redirector.redirect().is_err());

            store.set_settings(settings(Auto, Auto, Auto, true, false, None));
            let target = redirector.redirect().unwrap();
            assert_eq!(target.as_str(), contracts::MODERN_GRID);
        }
    }

    // ========================================================================
    // Registry and fixed rules
    // ========================================================================

    mod registry_tests {
        use super::*;

        #[test]
        fn test_fixed_redirector_ignores_settings() {
            let rule = FixedRedirector::lookup();
            assert_eq!(rule.source().as_str(), contracts::LOOKUP_FIELD);
            assert_eq!(rule.redirect().unwrap().as_str(), contracts::ADVANCED_LOOKUP);
        }

        #[test]
        fn test_registry_first_rule_wins() {
            let first = FixedRedirector::new(
                ContractId::of(contracts::LOOKUP_FIELD),
                ContractId::of("target.first"),
            );
            let second = FixedRedirector::new(
                ContractId::of(contracts::LOOKUP_FIELD),
                ContractId::of("target.second"),
            );
            let registry =
                RedirectRegistry::from_rules(vec![Box::new(first), Box::new(second)]);
            assert_eq!(registry.len(), 1);
            let target = registry
                .redirect(&ContractId::of(contracts::LOOKUP_FIELD))
                .unwrap()
                .unwrap();
            assert_eq!(target.as_str(), "target.first");
        }

        #[test]
        fn test_registry_passes_through_unruled_contracts() {
            let registry = RedirectRegistry::from_rules(vec![]);
            assert!(registry
                .redirect(&ContractId::of("field.currency"))
                .unwrap()
                .is_none());
        }
    }
}
