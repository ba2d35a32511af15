//! HTTP API request/response types.
//!
//! # Purpose
//! Defines shared payload shapes for the inventory REST API and OpenAPI
//! schema generation.
use crate::model::{Variant, VariantDraft};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct FeatureFlags {
    pub durable_storage: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SystemInfo {
    pub api_version: String,
    pub storage_backend: String,
    pub features: FeatureFlags,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    /// For allocation failures: rows durably committed before the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct VariantCreateRequest {
    pub items: Vec<VariantDraft>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AllocationResponse {
    pub inserted: u64,
    pub first_serial: Option<i16>,
    pub last_serial: Option<i16>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct VariantListResponse {
    pub items: Vec<Variant>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct NextSerialResponse {
    pub tenant_id: String,
    pub next_serial: i16,
}
