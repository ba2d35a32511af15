//! Postgres-backed implementation of the variant store.
//!
//! # What this module is
//! This module implements the `VariantStore` trait using Postgres (via `sqlx`)
//! as the durable backing store for tenant inventory rows.
//!
//! # Key invariants
//! - The `variants` table carries a composite primary key on
//!   `(tenant_id, serial_number)`; that key is the uniqueness constraint the
//!   serial allocator's optimistic write path depends on.
//! - Uniqueness violations (SQLSTATE 23505) are surfaced as
//!   `StoreError::Conflict`, distinguishably from every other failure. The
//!   allocator treats `Conflict` as "another allocation won the serial range,
//!   re-read and retry" and anything else as a non-retriable fault.
//! - Bulk inserts run inside a transaction; on any failure the transaction is
//!   dropped un-committed, so the batch is atomic-or-nothing.
//!
//! # Concurrency model
//! - The store is shared across async handlers; `sqlx::PgPool` manages
//!   concurrency. Each method acquires a pooled connection; pool sizing
//!   controls throughput.
//!
//! # Operational notes
//! - Migrations are executed at startup via `sqlx::migrate!("./migrations")`
//!   so handlers can assume the schema exists.
//! - Pool acquire timeouts are explicitly configured because hanging forever
//!   on DB failures is unacceptable for a request-serving service.
//! - Database URLs may contain credentials; avoid logging them.
use super::{StoreError, StoreResult, VariantStore};
use crate::config::PostgresConfig;
use crate::model::Variant;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;

/// Durable variant store backed by Postgres.
pub struct PostgresStore {
    pool: PgPool,
}

/// Row shape for the `variants` table.
///
/// Kept separate from the domain type to isolate schema details (column
/// names, storage widths) from the API model.
#[derive(Debug, Clone, FromRow)]
struct DbVariant {
    tenant_id: String,
    serial_number: i16,
    sku: String,
    size: Option<String>,
    cost_cents: Option<i64>,
    location: Option<String>,
}

impl From<DbVariant> for Variant {
    fn from(row: DbVariant) -> Self {
        Variant {
            tenant_id: row.tenant_id,
            serial_number: row.serial_number,
            sku: row.sku,
            size: row.size,
            cost_cents: row.cost_cents,
            location: row.location,
        }
    }
}

impl PostgresStore {
    /// Connect to Postgres and run migrations.
    ///
    /// Migrations run *before* serving requests so handlers can assume the
    /// schema exists. If migrations fail, startup fails rather than serving a
    /// partially functional service.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        let connect_options = PgConnectOptions::from_str(&pg.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;

        Ok(Self { pool })
    }

    async fn refresh_counts(&self) -> StoreResult<()> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM variants")
            .fetch_one(&self.pool)
            .await?;
        metrics::gauge!("solestack_variants_total").set(total as f64);
        Ok(())
    }
}

#[async_trait]
impl VariantStore for PostgresStore {
    async fn max_serial(&self, tenant_id: &str) -> StoreResult<Option<i16>> {
        let max: Option<i16> =
            sqlx::query_scalar("SELECT MAX(serial_number) FROM variants WHERE tenant_id = $1")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(max)
    }

    async fn insert_variants(&self, variants: &[Variant]) -> StoreResult<()> {
        if variants.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for variant in variants {
            let insert = sqlx::query(
                r#"INSERT INTO variants (tenant_id, serial_number, sku, size, cost_cents, location)
                   VALUES ($1, $2, $3, $4, $5, $6)"#,
            )
            .bind(&variant.tenant_id)
            .bind(variant.serial_number)
            .bind(&variant.sku)
            .bind(&variant.size)
            .bind(variant.cost_cents)
            .bind(&variant.location)
            .execute(&mut *tx)
            .await;
            if let Err(err) = insert {
                // Dropping the transaction rolls back rows already staged in
                // this batch, keeping the bulk insert atomic-or-nothing.
                if is_unique_violation(&err) {
                    return Err(StoreError::Conflict(format!(
                        "serial {} already taken for tenant {}",
                        variant.serial_number, variant.tenant_id
                    )));
                }
                return Err(StoreError::Unexpected(err.into()));
            }
        }
        tx.commit().await?;
        self.refresh_counts().await?;
        Ok(())
    }

    async fn insert_variant(&self, variant: &Variant) -> StoreResult<()> {
        let insert = sqlx::query(
            r#"INSERT INTO variants (tenant_id, serial_number, sku, size, cost_cents, location)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&variant.tenant_id)
        .bind(variant.serial_number)
        .bind(&variant.sku)
        .bind(&variant.size)
        .bind(variant.cost_cents)
        .bind(&variant.location)
        .execute(&self.pool)
        .await;
        if let Err(err) = insert {
            if is_unique_violation(&err) {
                return Err(StoreError::Conflict(format!(
                    "serial {} already taken for tenant {}",
                    variant.serial_number, variant.tenant_id
                )));
            }
            return Err(StoreError::Unexpected(err.into()));
        }
        self.refresh_counts().await?;
        Ok(())
    }

    async fn get_variant(&self, tenant_id: &str, serial_number: i16) -> StoreResult<Variant> {
        let row = sqlx::query_as::<_, DbVariant>(
            r#"SELECT tenant_id, serial_number, sku, size, cost_cents, location
               FROM variants WHERE tenant_id = $1 AND serial_number = $2"#,
        )
        .bind(tenant_id)
        .bind(serial_number)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(row.into()),
            None => Err(StoreError::NotFound("variant".into())),
        }
    }

    async fn list_variants(&self, tenant_id: &str) -> StoreResult<Vec<Variant>> {
        let rows = sqlx::query_as::<_, DbVariant>(
            r#"SELECT tenant_id, serial_number, sku, size, cost_cents, location
               FROM variants WHERE tenant_id = $1 ORDER BY serial_number"#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Variant::from).collect())
    }

    async fn count_variants(&self, tenant_id: &str) -> StoreResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM variants WHERE tenant_id = $1")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unexpected(err.into())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == "23505").unwrap_or(false);
    }
    false
}
