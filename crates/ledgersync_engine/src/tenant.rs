//! Verification that the source has the expected tenant open.

use crate::config::TenantPolicy;
use crate::context::SyncRunContext;
use crate::destination::DestinationTransport;
use crate::error::{SyncError, SyncResult};
use crate::source::SourceTransport;
use ledgersync_codec::{decode_tenants, QueryDocument};
use std::borrow::Cow;
use tracing::{debug, warn};

/// How the expected tenant was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantMatch {
    /// Same name, ignoring case.
    Exact(String),
    /// One name contains the other.
    Partial(String),
    /// Not among the active tenants.
    Absent,
    /// The check could not run and the policy let the run proceed.
    Unverified,
}

/// Result of a tenant check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantCheck {
    /// Whether the run may proceed.
    pub is_active: bool,
    /// Tenants the source reported.
    pub active_tenants: Vec<String>,
    /// How the match was made.
    pub matched_by: TenantMatch,
}

/// Matches `expected` against the active tenant names.
pub fn match_tenant(expected: &str, active: &[String]) -> TenantMatch {
    let wanted = expected.trim().to_lowercase();
    if let Some(name) = active.iter().find(|a| a.trim().to_lowercase() == wanted) {
        return TenantMatch::Exact(name.clone());
    }
    if wanted.is_empty() {
        return TenantMatch::Absent;
    }
    active
        .iter()
        .find(|a| {
            let candidate = a.trim().to_lowercase();
            !candidate.is_empty() && (candidate.contains(&wanted) || wanted.contains(&candidate))
        })
        .map_or(TenantMatch::Absent, |name| TenantMatch::Partial(name.clone()))
}

/// Returns `ctx` with its tenant name filled in.
///
/// A context without a name takes the one the destination registered for
/// its tenant id. If the destination cannot be asked or does not know the
/// id, the run fails with [`SyncError::TenantCheckUnavailable`] whatever
/// the policy: without a name the source cannot be scoped.
pub fn scope_tenant<'c, D: DestinationTransport + ?Sized>(
    destination: &D,
    ctx: &'c SyncRunContext,
) -> SyncResult<Cow<'c, SyncRunContext>> {
    if ctx.tenant.name.is_some() {
        return Ok(Cow::Borrowed(ctx));
    }

    let id = ctx.tenant.id;
    let tenants = destination.list_tenants(ctx).map_err(|e| {
        SyncError::TenantCheckUnavailable(format!("cannot look up tenant {id}: {e}"))
    })?;
    let name = tenants
        .into_iter()
        .find(|t| t.id == id)
        .map(|t| t.name)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| {
            SyncError::TenantCheckUnavailable(format!("tenant {id} is not registered at the destination"))
        })?;
    debug!(run_id = %ctx.run_id, tenant = id, name = %name, "tenant name taken from destination");
    Ok(Cow::Owned(ctx.clone().with_tenant_name(name)))
}

/// Guards every run against writing one tenant's records under another.
pub struct TenantContextGuard<'a, S: SourceTransport + ?Sized> {
    source: &'a S,
    policy: TenantPolicy,
}

impl<'a, S: SourceTransport + ?Sized> TenantContextGuard<'a, S> {
    /// Creates a guard over `source`.
    pub fn new(source: &'a S, policy: TenantPolicy) -> Self {
        Self { source, policy }
    }

    /// Lists the tenants the source reports as open.
    pub fn active_tenants(&self) -> SyncResult<Vec<String>> {
        let document = self.source.fetch(&QueryDocument::active_tenants())?;
        Ok(decode_tenants(&document)?)
    }

    /// Checks whether `expected` is open in the source.
    pub fn verify(&self, expected: &str) -> SyncResult<TenantCheck> {
        let active = match self.active_tenants() {
            Ok(active) => active,
            Err(e) => {
                return match self.policy {
                    TenantPolicy::FailOpen => {
                        warn!(tenant = expected, error = %e, "tenant check unavailable; proceeding");
                        Ok(TenantCheck {
                            is_active: true,
                            active_tenants: Vec::new(),
                            matched_by: TenantMatch::Unverified,
                        })
                    }
                    TenantPolicy::FailClosed => Err(SyncError::TenantCheckUnavailable(e.to_string())),
                };
            }
        };

        let matched_by = match_tenant(expected, &active);
        match &matched_by {
            TenantMatch::Exact(name) => debug!(tenant = %name, "tenant verified"),
            TenantMatch::Partial(name) => {
                warn!(expected, found = %name, "tenant matched by partial name")
            }
            TenantMatch::Absent => warn!(expected, active = ?active, "tenant not active in source"),
            TenantMatch::Unverified => {}
        }
        Ok(TenantCheck {
            is_active: !matches!(matched_by, TenantMatch::Absent),
            active_tenants: active,
            matched_by,
        })
    }

    /// Fails with [`SyncError::TenantMismatch`] unless `expected` is open.
    pub fn enforce(&self, expected: &str) -> SyncResult<TenantCheck> {
        let check = self.verify(expected)?;
        if !check.is_active {
            return Err(SyncError::TenantMismatch {
                expected: expected.to_owned(),
                active: check.active_tenants,
            });
        }
        Ok(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::MemoryDestination;
    use crate::source::MockSource;
    use ledgersync_protocol::TenantSummary;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn exact_match_ignores_case() {
        let active = names(&["Acme Traders", "Beta"]);
        assert_eq!(
            match_tenant("ACME TRADERS", &active),
            TenantMatch::Exact("Acme Traders".into())
        );
    }

    #[test]
    fn partial_match_either_direction() {
        let active = names(&["Acme Traders (2024-25)"]);
        assert_eq!(
            match_tenant("acme traders", &active),
            TenantMatch::Partial("Acme Traders (2024-25)".into())
        );
        let active = names(&["Acme"]);
        assert!(matches!(
            match_tenant("Acme Traders", &active),
            TenantMatch::Partial(_)
        ));
        assert_eq!(match_tenant("Gamma", &active), TenantMatch::Absent);
        assert_eq!(match_tenant("", &active), TenantMatch::Absent);
    }

    #[test]
    fn enforce_rejects_absent_tenant() {
        let source = MockSource::new();
        source.set_tenants(Some(&["Beta"]));
        let guard = TenantContextGuard::new(&source, TenantPolicy::FailOpen);
        match guard.enforce("Acme") {
            Err(SyncError::TenantMismatch { expected, active }) => {
                assert_eq!(expected, "Acme");
                assert_eq!(active, vec!["Beta"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(guard.enforce("beta").is_ok());
    }

    #[test]
    fn unavailable_check_follows_policy() {
        let source = MockSource::new();
        source.set_tenants(None);

        let open = TenantContextGuard::new(&source, TenantPolicy::FailOpen);
        let check = open.enforce("Acme").unwrap();
        assert_eq!(check.matched_by, TenantMatch::Unverified);

        let closed = TenantContextGuard::new(&source, TenantPolicy::FailClosed);
        assert!(matches!(
            closed.verify("Acme"),
            Err(SyncError::TenantCheckUnavailable(_))
        ));
    }

    #[test]
    fn given_name_is_kept() {
        let destination = MemoryDestination::new();
        let ctx = SyncRunContext::new(4, 1).with_tenant_name("Acme");
        let scoped = scope_tenant(&destination, &ctx).unwrap();
        assert!(matches!(scoped, Cow::Borrowed(_)));
    }

    #[test]
    fn missing_name_comes_from_destination() {
        let destination = MemoryDestination::new();
        destination.add_tenant(TenantSummary::imported(3, "Beta"));
        destination.add_tenant(TenantSummary::imported(4, "Acme Traders"));

        let ctx = SyncRunContext::new(4, 1);
        let scoped = scope_tenant(&destination, &ctx).unwrap();
        assert_eq!(scoped.tenant.name.as_deref(), Some("Acme Traders"));
        assert_eq!(scoped.run_id, ctx.run_id);
    }

    #[test]
    fn unknown_tenant_id_fails_closed() {
        let destination = MemoryDestination::new();
        destination.add_tenant(TenantSummary::imported(3, "Beta"));
        assert!(matches!(
            scope_tenant(&destination, &SyncRunContext::new(4, 1)),
            Err(SyncError::TenantCheckUnavailable(_))
        ));
    }
}
