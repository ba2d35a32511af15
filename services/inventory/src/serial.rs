//! Tenant-scoped serial number allocation.
//!
//! # Purpose
//! Assigns gap-free, strictly increasing serial numbers to batches of new
//! inventory variants and commits them through the [`VariantStore`].
//!
//! # Concurrency model
//! Allocation is optimistic: read the tenant's current maximum, stamp the
//! batch, and let the store's `(tenant_id, serial_number)` uniqueness
//! constraint catch the case where a concurrent allocation committed an
//! overlapping range first. A collision surfaces as `StoreError::Conflict`
//! and is retried with a fresh read, bounded by [`RetryPolicy::max_attempts`]
//! with a linearly increasing backoff. The allocator holds no locks and keeps
//! no state between calls; all state lives in the store.
//!
//! # Failure handling
//! Non-collision failures of the bulk insert abandon the batch strategy and
//! degrade to per-record inserts, so records unaffected by the fault still
//! commit and the count of durably written rows stays honest. A failing
//! individual insert stops the fallback immediately; collisions inside the
//! fallback are retried under the same bounded budget.
use crate::model::{Variant, VariantDraft};
use crate::store::{StoreError, VariantStore};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Largest serial number the persisted schema can hold (`SMALLINT`).
pub const SERIAL_CEILING: i16 = i16::MAX;

/// Last serial the allocator will hand out. Once a tenant's maximum reaches
/// this value the sequence is full and allocation refuses to proceed.
pub const LAST_ASSIGNABLE: i16 = SERIAL_CEILING - 1;

#[derive(Debug, Error)]
pub enum SerialError {
    #[error("tenant serial sequence is full (ceiling {SERIAL_CEILING})")]
    LimitExceeded,
    #[error("allocation conflicted {attempts} times without success")]
    RetriesExhausted { attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Batch failure carrying the honest count of rows that were durably
/// committed before the error. Nothing is rolled back: a later call simply
/// resumes the sequence from the new maximum.
#[derive(Debug, Error)]
#[error("inserted {inserted} of {requested} variants: {source}")]
pub struct BatchError {
    pub inserted: usize,
    pub requested: usize,
    #[source]
    pub source: SerialError,
}

/// Successful allocation result: how many rows were committed and which
/// serial numbers they received, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReceipt {
    pub inserted: usize,
    pub serials: Vec<i16>,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(25),
        }
    }
}

/// Backoff before the next collision retry: base delay scaled by the attempt
/// count, so repeated collisions between the same two writers spread out.
fn conflict_backoff(policy: &RetryPolicy, attempt: u32) -> Duration {
    policy.base_backoff.saturating_mul(attempt)
}

#[derive(Clone)]
pub struct SerialAllocator {
    store: Arc<dyn VariantStore>,
    retry: RetryPolicy,
}

impl SerialAllocator {
    pub fn new(store: Arc<dyn VariantStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Next unused serial for the tenant.
    ///
    /// Read-only and intentionally not atomic with the subsequent insert: the
    /// no-duplicate invariant is established by the store's uniqueness
    /// constraint plus the retry loop in [`allocate_batch`], not here. A
    /// stored maximum that is missing or non-positive is treated as "no valid
    /// history" and the sequence restarts at 1.
    ///
    /// [`allocate_batch`]: SerialAllocator::allocate_batch
    pub async fn next_serial(&self, tenant_id: &str) -> Result<i16, SerialError> {
        match self.store.max_serial(tenant_id).await? {
            None => Ok(1),
            Some(max) if max <= 0 => Ok(1),
            Some(max) if max >= LAST_ASSIGNABLE => Err(SerialError::LimitExceeded),
            Some(max) => Ok(max + 1),
        }
    }

    /// Stamp and commit a batch of drafts with consecutive serial numbers.
    ///
    /// The drafts keep their input order; the serials assigned within one
    /// successful call are consecutive with no gaps. Between two concurrent
    /// calls for the same tenant no ordering is guaranteed: whichever commits
    /// first gets the lower range.
    pub async fn allocate_batch(
        &self,
        drafts: &[VariantDraft],
        tenant_id: &str,
    ) -> Result<BatchReceipt, BatchError> {
        if drafts.is_empty() {
            return Ok(BatchReceipt::default());
        }
        let requested = drafts.len();
        let mut inserted = 0usize;
        let mut serials: Vec<i16> = Vec::with_capacity(requested);

        for attempt in 1..=self.retry.max_attempts {
            let start = match self.batch_start(tenant_id, requested - inserted).await {
                Ok(start) => start,
                Err(source) => {
                    return Err(BatchError {
                        inserted,
                        requested,
                        source,
                    })
                }
            };
            let batch: Vec<Variant> = drafts[inserted..]
                .iter()
                .enumerate()
                .map(|(offset, draft)| draft.stamp(tenant_id, start + offset as i16))
                .collect();

            match self.store.insert_variants(&batch).await {
                Ok(()) => {
                    inserted += batch.len();
                    serials.extend(batch.iter().map(|row| row.serial_number));
                    metrics::counter!("solestack_allocations_total", "path" => "bulk")
                        .increment(1);
                    return Ok(BatchReceipt { inserted, serials });
                }
                Err(StoreError::Conflict(reason)) => {
                    // A concurrent allocation committed an overlapping range
                    // first. Back off and re-read the new maximum.
                    metrics::counter!("solestack_serial_conflicts_total").increment(1);
                    tracing::warn!(
                        tenant_id,
                        attempt,
                        %reason,
                        "serial range contended, retrying"
                    );
                    tokio::time::sleep(conflict_backoff(&self.retry, attempt)).await;
                }
                Err(err) => {
                    metrics::counter!("solestack_serial_fallback_total").increment(1);
                    tracing::warn!(
                        tenant_id,
                        error = %err,
                        "bulk insert failed, degrading to per-record inserts"
                    );
                    return self.insert_singly(drafts, tenant_id, inserted, serials).await;
                }
            }
        }

        Err(BatchError {
            inserted,
            requested,
            source: SerialError::RetriesExhausted {
                attempts: self.retry.max_attempts,
            },
        })
    }

    /// Starting serial for a batch of `len` records, refusing ranges that
    /// would run past the ceiling.
    async fn batch_start(&self, tenant_id: &str, len: usize) -> Result<i16, SerialError> {
        let start = self.next_serial(tenant_id).await?;
        let last = i32::from(start) + len as i32 - 1;
        if last > i32::from(LAST_ASSIGNABLE) {
            return Err(SerialError::LimitExceeded);
        }
        Ok(start)
    }

    /// Degraded path: insert the remaining drafts one at a time, each with a
    /// freshly computed serial. Collisions are retried under the bounded
    /// budget; any other failure stops immediately with the accumulated count.
    async fn insert_singly(
        &self,
        drafts: &[VariantDraft],
        tenant_id: &str,
        mut inserted: usize,
        mut serials: Vec<i16>,
    ) -> Result<BatchReceipt, BatchError> {
        let requested = drafts.len();
        while inserted < requested {
            let draft = &drafts[inserted];
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                let serial = match self.next_serial(tenant_id).await {
                    Ok(serial) => serial,
                    Err(source) => {
                        return Err(BatchError {
                            inserted,
                            requested,
                            source,
                        })
                    }
                };
                match self.store.insert_variant(&draft.stamp(tenant_id, serial)).await {
                    Ok(()) => {
                        serials.push(serial);
                        inserted += 1;
                        break;
                    }
                    Err(StoreError::Conflict(_)) if attempt < self.retry.max_attempts => {
                        metrics::counter!("solestack_serial_conflicts_total").increment(1);
                        tokio::time::sleep(conflict_backoff(&self.retry, attempt)).await;
                    }
                    Err(StoreError::Conflict(_)) => {
                        return Err(BatchError {
                            inserted,
                            requested,
                            source: SerialError::RetriesExhausted { attempts: attempt },
                        });
                    }
                    Err(err) => {
                        return Err(BatchError {
                            inserted,
                            requested,
                            source: SerialError::Store(err),
                        });
                    }
                }
            }
        }
        metrics::counter!("solestack_allocations_total", "path" => "single").increment(1);
        Ok(BatchReceipt { inserted, serials })
    }
}
