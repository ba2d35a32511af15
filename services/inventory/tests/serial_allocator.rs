//! Allocation properties of the serial allocator, driven through a scripted
//! store double that injects conflicts and faults deterministically.
use async_trait::async_trait;
use inventory::model::{Variant, VariantDraft};
use inventory::serial::{BatchError, LAST_ASSIGNABLE, RetryPolicy, SerialAllocator, SerialError};
use inventory::store::memory::InMemoryStore;
use inventory::store::{StoreError, StoreResult, VariantStore};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Copy)]
enum Fault {
    Conflict,
    Io,
}

impl Fault {
    fn into_error(self) -> StoreError {
        match self {
            Fault::Conflict => StoreError::Conflict("scripted conflict".into()),
            Fault::Io => StoreError::Unexpected(anyhow::anyhow!("scripted io failure")),
        }
    }
}

/// Store double backed by the real in-memory store.
///
/// Each insert call first consumes the next scripted slot for its path:
/// `None` passes through to the inner store, `Some(fault)` fails without
/// touching it. Call counters let tests assert interaction patterns (fresh
/// max-serial reads per attempt, fallback stopping early, and so on).
#[derive(Default)]
struct ScriptedStore {
    inner: InMemoryStore,
    bulk_faults: Mutex<VecDeque<Option<Fault>>>,
    single_faults: Mutex<VecDeque<Option<Fault>>>,
    max_serial_calls: AtomicUsize,
    bulk_attempts: AtomicUsize,
    single_attempts: AtomicUsize,
}

impl ScriptedStore {
    fn script_bulk(&self, slots: impl IntoIterator<Item = Option<Fault>>) {
        self.bulk_faults.lock().expect("lock").extend(slots);
    }

    fn script_single(&self, slots: impl IntoIterator<Item = Option<Fault>>) {
        self.single_faults.lock().expect("lock").extend(slots);
    }
}

#[async_trait]
impl VariantStore for ScriptedStore {
    async fn max_serial(&self, tenant_id: &str) -> StoreResult<Option<i16>> {
        self.max_serial_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.max_serial(tenant_id).await
    }

    async fn insert_variants(&self, variants: &[Variant]) -> StoreResult<()> {
        self.bulk_attempts.fetch_add(1, Ordering::SeqCst);
        let fault = self.bulk_faults.lock().expect("lock").pop_front().flatten();
        match fault {
            Some(fault) => Err(fault.into_error()),
            None => self.inner.insert_variants(variants).await,
        }
    }

    async fn insert_variant(&self, variant: &Variant) -> StoreResult<()> {
        self.single_attempts.fetch_add(1, Ordering::SeqCst);
        let fault = self
            .single_faults
            .lock()
            .expect("lock")
            .pop_front()
            .flatten();
        match fault {
            Some(fault) => Err(fault.into_error()),
            None => self.inner.insert_variant(variant).await,
        }
    }

    async fn get_variant(&self, tenant_id: &str, serial_number: i16) -> StoreResult<Variant> {
        self.inner.get_variant(tenant_id, serial_number).await
    }

    async fn list_variants(&self, tenant_id: &str) -> StoreResult<Vec<Variant>> {
        self.inner.list_variants(tenant_id).await
    }

    async fn count_variants(&self, tenant_id: &str) -> StoreResult<u64> {
        self.inner.count_variants(tenant_id).await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}

fn drafts(skus: &[&str]) -> Vec<VariantDraft> {
    skus.iter()
        .map(|sku| VariantDraft {
            sku: sku.to_string(),
            size: None,
            cost_cents: None,
            location: None,
        })
        .collect()
}

fn allocator(store: Arc<dyn VariantStore>, max_attempts: u32) -> SerialAllocator {
    SerialAllocator::new(
        store,
        RetryPolicy {
            max_attempts,
            base_backoff: Duration::from_millis(1),
        },
    )
}

#[tokio::test]
async fn sequential_batches_continue_the_sequence() {
    let store = Arc::new(InMemoryStore::new());
    let alloc = allocator(store.clone(), 5);

    let receipt = alloc
        .allocate_batch(&drafts(&["A", "B"]), "t1")
        .await
        .expect("first batch");
    assert_eq!(receipt.inserted, 2);
    assert_eq!(receipt.serials, vec![1, 2]);

    let receipt = alloc
        .allocate_batch(&drafts(&["C"]), "t1")
        .await
        .expect("second batch");
    assert_eq!(receipt.inserted, 1);
    assert_eq!(receipt.serials, vec![3]);

    let rows = store.list_variants("t1").await.expect("list");
    let serials: Vec<i16> = rows.iter().map(|row| row.serial_number).collect();
    assert_eq!(serials, vec![1, 2, 3]);
    assert_eq!(rows[0].sku, "A");
    assert_eq!(rows[2].sku, "C");
}

#[tokio::test]
async fn empty_batch_issues_no_store_calls() {
    let store = Arc::new(ScriptedStore::default());
    let alloc = allocator(store.clone(), 5);

    let receipt = alloc
        .allocate_batch(&[], "t1")
        .await
        .expect("empty batch succeeds");
    assert_eq!(receipt.inserted, 0);
    assert!(receipt.serials.is_empty());
    assert_eq!(store.max_serial_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.bulk_attempts.load(Ordering::SeqCst), 0);
    assert_eq!(store.single_attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ceiling_blocks_allocation_without_inserting() {
    let store = Arc::new(ScriptedStore::default());
    store
        .inner
        .insert_variant(&drafts(&["OLD"])[0].stamp("t1", LAST_ASSIGNABLE))
        .await
        .expect("seed");
    let alloc = allocator(store.clone(), 5);

    let err = alloc
        .allocate_batch(&drafts(&["A"]), "t1")
        .await
        .expect_err("ceiling");
    assert_eq!(err.inserted, 0);
    assert!(matches!(err.source, SerialError::LimitExceeded));
    assert_eq!(store.bulk_attempts.load(Ordering::SeqCst), 0);
    assert_eq!(store.single_attempts.load(Ordering::SeqCst), 0);
    assert_eq!(store.inner.count_variants("t1").await.expect("count"), 1);
}

#[tokio::test]
async fn conflicts_retry_with_fresh_serial_reads() {
    let store = Arc::new(ScriptedStore::default());
    store.script_bulk([Some(Fault::Conflict), Some(Fault::Conflict), None]);
    let alloc = allocator(store.clone(), 5);

    let receipt = alloc
        .allocate_batch(&drafts(&["A", "B"]), "t1")
        .await
        .expect("third attempt succeeds");
    assert_eq!(receipt.inserted, 2);
    assert_eq!(receipt.serials, vec![1, 2]);
    assert_eq!(store.bulk_attempts.load(Ordering::SeqCst), 3);
    // The maximum must be re-queried before every attempt, so the retry sees
    // ranges committed by concurrent writers.
    assert_eq!(store.max_serial_calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.single_attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn persistent_conflicts_exhaust_the_retry_budget() {
    let store = Arc::new(ScriptedStore::default());
    store.script_bulk([
        Some(Fault::Conflict),
        Some(Fault::Conflict),
        Some(Fault::Conflict),
        Some(Fault::Conflict),
        Some(Fault::Conflict),
    ]);
    let alloc = allocator(store.clone(), 5);

    let err = alloc
        .allocate_batch(&drafts(&["A"]), "t1")
        .await
        .expect_err("retries exhausted");
    assert_eq!(err.inserted, 0);
    assert!(matches!(
        err.source,
        SerialError::RetriesExhausted { attempts: 5 }
    ));
    assert_eq!(store.bulk_attempts.load(Ordering::SeqCst), 5);
    assert_eq!(store.inner.count_variants("t1").await.expect("count"), 0);
}

#[tokio::test]
async fn fallback_stops_at_first_non_conflict_failure() {
    let store = Arc::new(ScriptedStore::default());
    store.script_bulk([Some(Fault::Io)]);
    // First individual insert passes, second fails hard. The third record
    // must never be attempted.
    store.script_single([None, Some(Fault::Io)]);
    let alloc = allocator(store.clone(), 5);

    let err = alloc
        .allocate_batch(&drafts(&["A", "B", "C"]), "t1")
        .await
        .expect_err("fallback failure");
    assert_eq!(err.inserted, 1);
    assert_eq!(err.requested, 3);
    assert!(matches!(err.source, SerialError::Store(_)));
    assert_eq!(store.bulk_attempts.load(Ordering::SeqCst), 1);
    assert_eq!(store.single_attempts.load(Ordering::SeqCst), 2);

    // The record that committed before the failure stays committed.
    let rows = store.inner.list_variants("t1").await.expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sku, "A");
    assert_eq!(rows[0].serial_number, 1);
}

#[tokio::test]
async fn fallback_retries_conflicts_under_the_same_budget() {
    let store = Arc::new(ScriptedStore::default());
    store.script_bulk([Some(Fault::Io)]);
    store.script_single([Some(Fault::Conflict), None]);
    let alloc = allocator(store.clone(), 5);

    let receipt = alloc
        .allocate_batch(&drafts(&["A"]), "t1")
        .await
        .expect("fallback conflict retried");
    assert_eq!(receipt.inserted, 1);
    assert_eq!(store.single_attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fallback_conflicts_exhaust_bounded_budget() {
    let store = Arc::new(ScriptedStore::default());
    store.script_bulk([Some(Fault::Io)]);
    store.script_single([
        Some(Fault::Conflict),
        Some(Fault::Conflict),
        Some(Fault::Conflict),
    ]);
    let alloc = allocator(store.clone(), 3);

    let err = alloc
        .allocate_batch(&drafts(&["A"]), "t1")
        .await
        .expect_err("fallback exhausted");
    assert_eq!(err.inserted, 0);
    assert!(matches!(
        err.source,
        SerialError::RetriesExhausted { attempts: 3 }
    ));
    assert_eq!(store.single_attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_allocations_never_share_serials() {
    let store = Arc::new(InMemoryStore::new());
    // A generous budget keeps the test deterministic under heavy interleaving;
    // production uses the bounded default.
    let alloc = allocator(store.clone(), 25);

    let mut handles = Vec::new();
    for task in 0..8 {
        let alloc = alloc.clone();
        handles.push(tokio::spawn(async move {
            let skus: Vec<String> = (0..4).map(|i| format!("SKU-{task}-{i}")).collect();
            let sku_refs: Vec<&str> = skus.iter().map(String::as_str).collect();
            alloc
                .allocate_batch(&drafts(&sku_refs), "t1")
                .await
                .expect("batch")
        }));
    }

    let mut all_serials: Vec<i16> = Vec::new();
    for handle in handles {
        let receipt = handle.await.expect("join");
        assert_eq!(receipt.inserted, 4);
        // Serials within one batch are consecutive in input order.
        for pair in receipt.serials.windows(2) {
            assert_eq!(pair[1], pair[0] + 1);
        }
        all_serials.extend(receipt.serials);
    }

    // No two successful allocations may share a serial, and with 8 batches of
    // 4 the union must be exactly 1..=32.
    let unique: HashSet<i16> = all_serials.iter().copied().collect();
    assert_eq!(unique.len(), 32);
    assert_eq!(*all_serials.iter().min().expect("min"), 1);
    assert_eq!(*all_serials.iter().max().expect("max"), 32);
    assert_eq!(store.count_variants("t1").await.expect("count"), 32);
}

#[tokio::test]
async fn batch_error_reports_partial_progress() {
    let err = BatchError {
        inserted: 2,
        requested: 5,
        source: SerialError::RetriesExhausted { attempts: 5 },
    };
    let text = err.to_string();
    assert!(text.contains("2 of 5"));
}
