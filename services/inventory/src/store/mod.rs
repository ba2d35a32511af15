use crate::model::Variant;
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract consumed by the serial allocator and the API layer.
///
/// `Conflict` must be returned for violations of the `(tenant_id,
/// serial_number)` uniqueness constraint, distinguishably from every other
/// failure; the allocator's retry loop depends on that signal.
#[async_trait]
pub trait VariantStore: Send + Sync {
    /// Largest serial number stored for the tenant, or `None` if the tenant
    /// has no variants yet.
    async fn max_serial(&self, tenant_id: &str) -> StoreResult<Option<i16>>;

    /// Atomic-or-nothing bulk insert. On `Conflict`, no row was written.
    async fn insert_variants(&self, variants: &[Variant]) -> StoreResult<()>;

    async fn insert_variant(&self, variant: &Variant) -> StoreResult<()>;

    async fn get_variant(&self, tenant_id: &str, serial_number: i16) -> StoreResult<Variant>;
    async fn list_variants(&self, tenant_id: &str) -> StoreResult<Vec<Variant>>;
    async fn count_variants(&self, tenant_id: &str) -> StoreResult<u64>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
