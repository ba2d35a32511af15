//! In-memory implementation of the variant store.
//!
//! # Purpose
//! This store implements the `VariantStore` trait entirely in memory using a
//! `HashMap` guarded by `tokio::sync::RwLock`. It exists for:
//! - local development and tests (no external dependencies)
//! - deployments where durability is not required
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: the write lock serializes mutations, so a
//!   bulk insert is atomic-or-nothing exactly like the Postgres backend's
//!   transaction.
//!
//! # Uniqueness constraint
//! The `(tenant_id, serial_number)` constraint the serial allocator relies on
//! is enforced here by validating the whole batch against existing rows (and
//! against itself) before any row is written. Violations surface as
//! `StoreError::Conflict`, matching the durable backend's 23505 mapping.
use super::{StoreError, StoreResult, VariantStore};
use crate::model::Variant;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory variant store.
///
/// Rows are kept per tenant in insertion order; reads sort by serial number so
/// listings match the durable backend's `ORDER BY`.
#[derive(Default)]
pub struct InMemoryStore {
    variants: Arc<RwLock<HashMap<String, Vec<Variant>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VariantStore for InMemoryStore {
    async fn max_serial(&self, tenant_id: &str) -> StoreResult<Option<i16>> {
        let variants = self.variants.read().await;
        Ok(variants
            .get(tenant_id)
            .and_then(|rows| rows.iter().map(|row| row.serial_number).max()))
    }

    async fn insert_variants(&self, variants: &[Variant]) -> StoreResult<()> {
        if variants.is_empty() {
            return Ok(());
        }
        let mut store = self.variants.write().await;
        // Validate the full batch before mutating so a conflict leaves the
        // store untouched (atomic-or-nothing, like a rolled-back transaction).
        let mut batch_serials: HashSet<(&str, i16)> = HashSet::new();
        for variant in variants {
            let key = (variant.tenant_id.as_str(), variant.serial_number);
            let taken = store
                .get(variant.tenant_id.as_str())
                .map(|rows| {
                    rows.iter()
                        .any(|row| row.serial_number == variant.serial_number)
                })
                .unwrap_or(false);
            if taken || !batch_serials.insert(key) {
                return Err(StoreError::Conflict(format!(
                    "serial {} already taken for tenant {}",
                    variant.serial_number, variant.tenant_id
                )));
            }
        }
        for variant in variants {
            store
                .entry(variant.tenant_id.clone())
                .or_default()
                .push(variant.clone());
        }
        let total: usize = store.values().map(Vec::len).sum();
        metrics::gauge!("solestack_variants_total").set(total as f64);
        Ok(())
    }

    async fn insert_variant(&self, variant: &Variant) -> StoreResult<()> {
        self.insert_variants(std::slice::from_ref(variant)).await
    }

    async fn get_variant(&self, tenant_id: &str, serial_number: i16) -> StoreResult<Variant> {
        self.variants
            .read()
            .await
            .get(tenant_id)
            .and_then(|rows| {
                rows.iter()
                    .find(|row| row.serial_number == serial_number)
                    .cloned()
            })
            .ok_or_else(|| StoreError::NotFound("variant".into()))
    }

    async fn list_variants(&self, tenant_id: &str) -> StoreResult<Vec<Variant>> {
        let mut items = self
            .variants
            .read()
            .await
            .get(tenant_id)
            .cloned()
            .unwrap_or_default();
        items.sort_by_key(|row| row.serial_number);
        Ok(items)
    }

    async fn count_variants(&self, tenant_id: &str) -> StoreResult<u64> {
        Ok(self
            .variants
            .read()
            .await
            .get(tenant_id)
            .map(|rows| rows.len() as u64)
            .unwrap_or(0))
    }

    async fn health_check(&self) -> StoreResult<()> {
        // In-memory backend is always "healthy" if the process is running.
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VariantDraft;

    fn draft(sku: &str) -> VariantDraft {
        VariantDraft {
            sku: sku.to_string(),
            size: None,
            cost_cents: None,
            location: None,
        }
    }

    #[tokio::test]
    async fn max_serial_tracks_inserts_per_tenant() {
        let store = InMemoryStore::new();
        assert_eq!(store.max_serial("t1").await.expect("max"), None);

        store
            .insert_variant(&draft("A").stamp("t1", 1))
            .await
            .expect("insert");
        store
            .insert_variant(&draft("B").stamp("t1", 2))
            .await
            .expect("insert");
        store
            .insert_variant(&draft("C").stamp("t2", 9))
            .await
            .expect("insert");

        assert_eq!(store.max_serial("t1").await.expect("max"), Some(2));
        assert_eq!(store.max_serial("t2").await.expect("max"), Some(9));
        assert_eq!(store.max_serial("t3").await.expect("max"), None);
    }

    #[tokio::test]
    async fn duplicate_serial_conflicts_without_partial_write() {
        let store = InMemoryStore::new();
        store
            .insert_variant(&draft("A").stamp("t1", 1))
            .await
            .expect("insert");

        let batch = vec![draft("B").stamp("t1", 2), draft("C").stamp("t1", 1)];
        let err = store.insert_variants(&batch).await.expect_err("conflict");
        assert!(matches!(err, StoreError::Conflict(_)));

        // The conflicting batch must not have written its first row.
        assert_eq!(store.count_variants("t1").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn duplicate_serial_within_batch_conflicts() {
        let store = InMemoryStore::new();
        let batch = vec![draft("A").stamp("t1", 1), draft("B").stamp("t1", 1)];
        let err = store.insert_variants(&batch).await.expect_err("conflict");
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.count_variants("t1").await.expect("count"), 0);
    }

    #[tokio::test]
    async fn same_serial_across_tenants_is_allowed() {
        let store = InMemoryStore::new();
        let batch = vec![draft("A").stamp("t1", 1), draft("B").stamp("t2", 1)];
        store.insert_variants(&batch).await.expect("insert");
        assert_eq!(store.count_variants("t1").await.expect("count"), 1);
        assert_eq!(store.count_variants("t2").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn list_returns_serial_order() {
        let store = InMemoryStore::new();
        store
            .insert_variants(&[
                draft("C").stamp("t1", 3),
                draft("A").stamp("t1", 1),
                draft("B").stamp("t1", 2),
            ])
            .await
            .expect("insert");
        let items = store.list_variants("t1").await.expect("list");
        let serials: Vec<i16> = items.iter().map(|row| row.serial_number).collect();
        assert_eq!(serials, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn get_variant_not_found() {
        let store = InMemoryStore::new();
        let err = store.get_variant("t1", 1).await.expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn backend_health_and_identity() {
        let store = InMemoryStore::new();
        store.health_check().await.expect("health");
        assert!(!store.is_durable());
        assert_eq!(store.backend_name(), "memory");
    }
}
