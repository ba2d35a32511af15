//! OpenAPI schema aggregation for the inventory API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document for
//! docs and client generation.
use crate::api::{
    system,
    types::{
        AllocationResponse, ErrorResponse, FeatureFlags, HealthStatus, NextSerialResponse,
        SystemInfo, VariantCreateRequest, VariantListResponse,
    },
    variants,
};
use crate::model::{Variant, VariantDraft};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "solestack-inventory",
        version = "v1",
        description = "Solestack inventory HTTP API"
    ),
    paths(
        system::system_info,
        system::system_health,
        variants::create_variants,
        variants::list_variants,
        variants::next_serial,
        variants::get_variant,
    ),
    components(schemas(
        AllocationResponse,
        ErrorResponse,
        FeatureFlags,
        HealthStatus,
        NextSerialResponse,
        SystemInfo,
        Variant,
        VariantDraft,
        VariantCreateRequest,
        VariantListResponse,
    ))
)]
pub struct ApiDoc;
