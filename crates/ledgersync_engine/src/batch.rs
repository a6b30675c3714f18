//! Paced, sequential batch upload.

use crate::context::SyncRunContext;
use crate::destination::DestinationTransport;
use crate::error::SyncError;
use ledgersync_codec::EntityType;
use ledgersync_protocol::RecordPayload;
use std::time::Duration;
use tracing::{debug, warn};

/// What a transmission achieved.
#[derive(Debug, Default)]
pub struct TransmitOutcome {
    /// Records the destination confirmed.
    pub committed: u64,
    /// Batches the destination confirmed.
    pub batches_sent: usize,
    /// Error that stopped the transmission, if any.
    pub first_error: Option<SyncError>,
}

impl TransmitOutcome {
    /// True when every batch was confirmed.
    pub fn is_complete(&self) -> bool {
        self.first_error.is_none()
    }
}

/// Sends records in fixed-size batches, one after another.
pub struct BatchTransmitter<'a, D: DestinationTransport + ?Sized> {
    destination: &'a D,
}

impl<'a, D: DestinationTransport + ?Sized> BatchTransmitter<'a, D> {
    /// Creates a transmitter over `destination`.
    pub fn new(destination: &'a D) -> Self {
        Self { destination }
    }

    /// Sends `records` and stops at the first rejected batch.
    ///
    /// Pauses `delay` between batches. The cancellation flag is checked
    /// before each batch, never during one.
    pub fn send(
        &self,
        ctx: &SyncRunContext,
        entity: EntityType,
        records: &[RecordPayload],
        batch_size: usize,
        delay: Duration,
    ) -> TransmitOutcome {
        let mut outcome = TransmitOutcome::default();
        let batch_size = batch_size.max(1);
        let total = records.len().div_ceil(batch_size);

        for (index, batch) in records.chunks(batch_size).enumerate() {
            if index > 0 && !delay.is_zero() {
                std::thread::sleep(delay);
            }
            if ctx.is_cancelled() {
                outcome.first_error = Some(SyncError::Cancelled);
                break;
            }

            match self.destination.send_batch(ctx, entity, batch) {
                Ok(response) if response.success => {
                    let committed = response.committed(batch.len());
                    outcome.committed += committed;
                    outcome.batches_sent += 1;
                    debug!(
                        run_id = %ctx.run_id,
                        entity = %entity,
                        batch = index + 1,
                        total,
                        committed,
                        "batch confirmed"
                    );
                }
                Ok(response) => {
                    let body = response.message.unwrap_or_else(|| "batch refused".into());
                    warn!(run_id = %ctx.run_id, entity = %entity, batch = index + 1, %body, "batch refused");
                    outcome.first_error = Some(SyncError::DestinationRejected { status: 200, body });
                    break;
                }
                Err(e) => {
                    warn!(run_id = %ctx.run_id, entity = %entity, batch = index + 1, error = %e, "batch failed");
                    outcome.first_error = Some(e);
                    break;
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::MemoryDestination;
    use crate::error::SyncResult;
    use ledgersync_codec::NaturalKey;
    use ledgersync_protocol::{
        DestinationRecord, MasterPayload, SyncBatchResponse, SyncStatusUpdate, TenantSummary,
    };
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    fn records(n: u64) -> Vec<RecordPayload> {
        (1..=n)
            .map(|i| {
                RecordPayload::Master(MasterPayload {
                    cmp_id: 1,
                    user_id: 1,
                    guid: format!("g{i}"),
                    master_id: i,
                    alter_id: i,
                    is_active: true,
                    sync_status: ledgersync_protocol::SYNCED,
                    fields: BTreeMap::new(),
                })
            })
            .collect()
    }

    /// Answers from a script of responses.
    struct Scripted {
        responses: Mutex<Vec<SyncBatchResponse>>,
        sizes: Mutex<Vec<usize>>,
    }

    impl DestinationTransport for Scripted {
        fn send_batch(
            &self,
            _ctx: &SyncRunContext,
            _entity: EntityType,
            records: &[RecordPayload],
        ) -> SyncResult<SyncBatchResponse> {
            self.sizes.lock().push(records.len());
            Ok(self.responses.lock().remove(0))
        }

        fn list_records(
            &self,
            _ctx: &SyncRunContext,
            _entity: EntityType,
        ) -> SyncResult<Vec<DestinationRecord>> {
            Ok(Vec::new())
        }

        fn list_tenants(&self, _ctx: &SyncRunContext) -> SyncResult<Vec<TenantSummary>> {
            Ok(Vec::new())
        }

        fn report_status(&self, _ctx: &SyncRunContext, _u: &SyncStatusUpdate) -> SyncResult<()> {
            Ok(())
        }
    }

    #[test]
    fn sends_fixed_size_batches() {
        let dest = MemoryDestination::new();
        let ctx = SyncRunContext::new(1, 1);
        let outcome = BatchTransmitter::new(&dest).send(
            &ctx,
            EntityType::Unit,
            &records(5),
            2,
            Duration::ZERO,
        );
        assert!(outcome.is_complete());
        assert_eq!(outcome.committed, 5);
        assert_eq!(outcome.batches_sent, 3);
        assert_eq!(dest.batches_received(), 3);
    }

    #[test]
    fn stops_at_first_rejection() {
        let dest = MemoryDestination::new();
        dest.fail_on_batch(2);
        let ctx = SyncRunContext::new(1, 1);
        let outcome = BatchTransmitter::new(&dest).send(
            &ctx,
            EntityType::Unit,
            &records(6),
            2,
            Duration::ZERO,
        );
        assert_eq!(outcome.committed, 2);
        assert_eq!(outcome.batches_sent, 1);
        assert_eq!(dest.batches_received(), 2, "third batch never sent");
        assert!(matches!(
            outcome.first_error,
            Some(SyncError::DestinationRejected { .. })
        ));
        assert!(dest.revision(1, EntityType::Unit, &NaturalKey::new(3, "g3")).is_none());
    }

    #[test]
    fn committed_follows_destination_counts() {
        let dest = Scripted {
            responses: Mutex::new(vec![
                SyncBatchResponse::success(1),
                SyncBatchResponse::error("duplicate guid"),
            ]),
            sizes: Mutex::new(Vec::new()),
        };
        let ctx = SyncRunContext::new(1, 1);
        let outcome = BatchTransmitter::new(&dest).send(
            &ctx,
            EntityType::Unit,
            &records(4),
            2,
            Duration::ZERO,
        );
        assert_eq!(outcome.committed, 1);
        assert_eq!(*dest.sizes.lock(), vec![2, 2]);
        match outcome.first_error {
            Some(SyncError::DestinationRejected { body, .. }) => assert_eq!(body, "duplicate guid"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cancellation_is_checked_before_each_batch() {
        let dest = MemoryDestination::new();
        let ctx = SyncRunContext::new(1, 1);
        ctx.cancel();
        let outcome = BatchTransmitter::new(&dest).send(
            &ctx,
            EntityType::Unit,
            &records(3),
            1,
            Duration::ZERO,
        );
        assert_eq!(outcome.committed, 0);
        assert_eq!(dest.batches_received(), 0);
        assert!(matches!(outcome.first_error, Some(SyncError::Cancelled)));
    }

    #[test]
    fn empty_input_sends_nothing() {
        let dest = MemoryDestination::new();
        let outcome = BatchTransmitter::new(&dest).send(
            &SyncRunContext::new(1, 1),
            EntityType::Unit,
            &[],
            10,
            Duration::from_secs(5),
        );
        assert!(outcome.is_complete());
        assert_eq!(dest.batches_received(), 0);
    }
}
