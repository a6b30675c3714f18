//! Full comparison of source and destination, with repair.
//!
//! Reconciliation fetches every record of a type from the source, lists what
//! the destination holds, and re-sends whatever is missing or stale. It is
//! the safety net behind incremental sync and never moves the cursor.

use crate::batch::BatchTransmitter;
use crate::config::SyncConfig;
use crate::context::SyncRunContext;
use crate::destination::DestinationTransport;
use crate::error::{SyncError, SyncResult};
use crate::source::SourceTransport;
use crate::tenant::{scope_tenant, TenantContextGuard};
use ledgersync_codec::{decode, EntityType, NaturalKey, SourceRecord};
use ledgersync_protocol::{ReconciliationReport, RecordPayload, RecordSample, Transformer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Keys sorted into the four reconciliation categories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Present on both sides, destination up to date.
    pub matched: Vec<NaturalKey>,
    /// Only in the source.
    pub missing: Vec<NaturalKey>,
    /// Destination revision lags the source.
    pub stale: Vec<NaturalKey>,
    /// Only in the destination.
    pub extra: Vec<NaturalKey>,
}

/// Classifies `(key, revision)` pairs from both sides.
///
/// Source order is preserved for matched, missing and stale keys; extra
/// keys come out sorted. A key listed twice on one side counts once, at its
/// highest revision for the destination and its first occurrence for the
/// source.
pub fn classify<S, D>(source: S, destination: D) -> Classification
where
    S: IntoIterator<Item = (NaturalKey, u64)>,
    D: IntoIterator<Item = (NaturalKey, u64)>,
{
    let mut held: BTreeMap<NaturalKey, u64> = BTreeMap::new();
    for (key, revision) in destination {
        let entry = held.entry(key).or_insert(revision);
        *entry = (*entry).max(revision);
    }

    let mut out = Classification::default();
    let mut seen = HashSet::new();
    for (key, revision) in source {
        if !seen.insert(key.clone()) {
            continue;
        }
        match held.get(&key) {
            None => out.missing.push(key),
            Some(&held_revision) if revision > held_revision => out.stale.push(key),
            Some(_) => out.matched.push(key),
        }
    }
    out.extra = held.into_keys().filter(|k| !seen.contains(k)).collect();
    out
}

/// Compares and repairs one entity type of one tenant.
pub struct ReconciliationEngine<S: SourceTransport, D: DestinationTransport> {
    config: SyncConfig,
    source: Arc<S>,
    destination: Arc<D>,
}

impl<S: SourceTransport, D: DestinationTransport> ReconciliationEngine<S, D> {
    /// Creates a new reconciliation engine.
    pub fn new(config: SyncConfig, source: Arc<S>, destination: Arc<D>) -> Self {
        Self {
            config,
            source,
            destination,
        }
    }

    /// Reconciles `entity` for the tenant in `ctx`.
    pub fn reconcile(
        &self,
        ctx: &SyncRunContext,
        entity: EntityType,
    ) -> SyncResult<ReconciliationReport> {
        let scoped = scope_tenant(&*self.destination, ctx)?;
        let ctx: &SyncRunContext = &scoped;
        TenantContextGuard::new(&*self.source, self.config.tenant_policy)
            .enforce(ctx.tenant.name.as_deref().unwrap_or_default())?;

        let document = self.source.fetch(&ctx.query(entity, None))?;
        let records = decode(&document, entity)?;
        let held = self.destination.list_records(ctx, entity)?;

        if records.is_empty() && !held.is_empty() {
            warn!(
                run_id = %ctx.run_id,
                tenant = ctx.tenant.id,
                entity = %entity,
                destination = held.len(),
                "source returned nothing; skipping repair"
            );
            return Err(SyncError::EmptySource {
                destination_count: held.len(),
            });
        }

        let classification = classify(
            records.iter().map(|r| (r.identity().natural_key(), r.identity().revision)),
            held.iter().map(|h| (h.key.clone(), h.revision)),
        );

        let by_key: HashMap<NaturalKey, &SourceRecord> = records
            .iter()
            .map(|r| (r.identity().natural_key(), r))
            .collect();
        let held_revisions: HashMap<&NaturalKey, u64> =
            held.iter().map(|h| (&h.key, h.revision)).collect();
        let sample = |keys: &[NaturalKey]| -> Vec<RecordSample> {
            keys.iter()
                .take(self.config.sample_limit)
                .map(|key| {
                    let record = by_key.get(key);
                    RecordSample {
                        master_id: key.master_id,
                        guid: key.guid.clone(),
                        name: record.map(|r| r.label().to_owned()),
                        source_revision: record.map(|r| r.identity().revision),
                        destination_revision: held_revisions.get(key).copied(),
                    }
                })
                .collect()
        };

        let mut report = ReconciliationReport::new(ctx.tenant.id, entity.as_str());
        report.source_count = by_key.len();
        report.destination_count = held.len();
        report.matched = classification.matched.len();
        report.missing = classification.missing.len();
        report.stale = classification.stale.len();
        report.extra = classification.extra.len();
        report.missing_sample = sample(&classification.missing);
        report.stale_sample = sample(&classification.stale);
        report.extra_sample = sample(&classification.extra);

        if report.extra > 0 {
            warn!(
                run_id = %ctx.run_id,
                entity = %entity,
                extra = report.extra,
                "destination holds records the source does not; leaving them in place"
            );
        }

        let repair: Vec<&SourceRecord> = classification
            .missing
            .iter()
            .chain(&classification.stale)
            .filter_map(|key| by_key.get(key).copied())
            .collect();
        if !repair.is_empty() {
            ctx.check_cancelled()?;
            let transformer = Transformer::new(ctx.transform_context());
            let payloads: Vec<RecordPayload> =
                repair.iter().map(|r| transformer.transform(r)).collect();
            let outcome = BatchTransmitter::new(&*self.destination).send(
                ctx,
                entity,
                &payloads,
                ctx.pacing.batch_size(entity),
                ctx.pacing.batch_delay(entity),
            );
            report.repaired = usize::try_from(outcome.committed).unwrap_or(usize::MAX);
            report.repair_error = outcome.first_error.map(|e| e.to_string());
        }

        info!(
            run_id = %ctx.run_id,
            tenant = ctx.tenant.id,
            entity = %entity,
            matched = report.matched,
            missing = report.missing,
            stale = report.stale,
            extra = report.extra,
            repaired = report.repaired,
            "reconciliation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: u64, guid: &str) -> NaturalKey {
        NaturalKey::new(id, guid)
    }

    #[test]
    fn classification_categories() {
        let (a, b, c) = (key(1, "A"), key(2, "B"), key(3, "C"));
        let out = classify(
            [(a.clone(), 5), (b.clone(), 3)],
            [(a.clone(), 5), (c.clone(), 1)],
        );
        assert_eq!(out.matched, vec![a]);
        assert_eq!(out.missing, vec![b]);
        assert!(out.stale.is_empty());
        assert_eq!(out.extra, vec![c]);
    }

    #[test]
    fn stale_only_when_source_is_newer() {
        let out = classify(
            [(key(1, "A"), 7), (key(2, "B"), 2)],
            [(key(1, "A"), 6), (key(2, "B"), 4)],
        );
        assert_eq!(out.stale, vec![key(1, "A")]);
        assert_eq!(out.matched, vec![key(2, "B")], "destination ahead counts as matched");
    }

    #[test]
    fn same_guid_different_master_id_is_a_different_record() {
        let out = classify([(key(1, "A"), 1)], [(key(2, "A"), 1)]);
        assert_eq!(out.missing.len(), 1);
        assert_eq!(out.extra.len(), 1);
    }

    #[test]
    fn duplicates_count_once() {
        let out = classify(
            [(key(1, "A"), 3), (key(1, "A"), 9)],
            [(key(1, "A"), 2), (key(1, "A"), 3)],
        );
        assert_eq!(out.matched, vec![key(1, "A")]);
        assert!(out.stale.is_empty());
    }
}
