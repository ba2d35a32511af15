//! Variant model definitions.
//!
//! # Purpose
//! Defines the persisted inventory variant record and the caller-supplied
//! draft it is stamped from.
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One physical unit of inventory, stamped with a tenant-scoped serial number.
///
/// The serial number is unique within the owning tenant and assigned by the
/// allocator; every other field is caller-supplied payload the allocator does
/// not interpret.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct Variant {
    pub tenant_id: String,
    pub serial_number: i16,
    pub sku: String,
    pub size: Option<String>,
    pub cost_cents: Option<i64>,
    pub location: Option<String>,
}

/// Caller-supplied variant payload before a serial number is assigned.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct VariantDraft {
    pub sku: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub cost_cents: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
}

impl VariantDraft {
    /// Produce the persisted record for this draft.
    pub fn stamp(&self, tenant_id: &str, serial_number: i16) -> Variant {
        Variant {
            tenant_id: tenant_id.to_string(),
            serial_number,
            sku: self.sku.clone(),
            size: self.size.clone(),
            cost_cents: self.cost_cents,
            location: self.location.clone(),
        }
    }
}
