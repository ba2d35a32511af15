//! Variant API handlers.
//!
//! # Purpose
//! Implements batch allocation, listing, and serial-peek endpoints over the
//! serial allocator and variant store, with consistent error mapping.
//!
//! The allocation handler is deliberately thin: request validation happens
//! here, every correctness property (uniqueness, gap-free ranges, ceiling
//! enforcement, retry behavior) lives in [`crate::serial::SerialAllocator`].
use crate::api::error::{
    api_allocation_failed, api_conflict, api_internal, api_not_found, api_validation_error,
    ApiError,
};
use crate::api::types::{
    AllocationResponse, NextSerialResponse, VariantCreateRequest, VariantListResponse,
};
use crate::app::AppState;
use crate::auth::require_api_token;
use crate::model::Variant;
use crate::serial::SerialError;
use crate::store::StoreError;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

#[utoipa::path(
    post,
    path = "/v1/tenants/{tenant_id}/variants",
    tag = "variants",
    params(
        ("tenant_id" = String, Path, description = "Owning tenant")
    ),
    request_body = VariantCreateRequest,
    responses(
        (status = 201, description = "Variants committed with consecutive serials", body = AllocationResponse),
        (status = 400, description = "Invalid payload", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Missing or invalid API token", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Serial sequence full or persistently contended", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_variants(
    Path(tenant_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<VariantCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_token(&state, &headers)?;
    if tenant_id.trim().is_empty() {
        return Err(api_validation_error("tenant_id must not be empty"));
    }
    if body.items.iter().any(|draft| draft.sku.trim().is_empty()) {
        return Err(api_validation_error("sku must not be empty"));
    }

    let receipt = state
        .allocator
        .allocate_batch(&body.items, &tenant_id)
        .await
        .map_err(|err| api_allocation_failed(&err))?;
    Ok((
        StatusCode::CREATED,
        Json(AllocationResponse {
            inserted: receipt.inserted as u64,
            first_serial: receipt.serials.first().copied(),
            last_serial: receipt.serials.last().copied(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/tenants/{tenant_id}/variants",
    tag = "variants",
    params(
        ("tenant_id" = String, Path, description = "Owning tenant")
    ),
    responses(
        (status = 200, description = "Tenant inventory in serial order", body = VariantListResponse),
        (status = 401, description = "Missing or invalid API token", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_variants(
    Path(tenant_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<VariantListResponse>, ApiError> {
    require_api_token(&state, &headers)?;
    let items = state
        .store
        .list_variants(&tenant_id)
        .await
        .map_err(|err| api_internal("failed to list variants", &err))?;
    Ok(Json(VariantListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/v1/tenants/{tenant_id}/variants/next-serial",
    tag = "variants",
    params(
        ("tenant_id" = String, Path, description = "Owning tenant")
    ),
    responses(
        (status = 200, description = "Next unused serial for the tenant", body = NextSerialResponse),
        (status = 401, description = "Missing or invalid API token", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Serial sequence full", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn next_serial(
    Path(tenant_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<NextSerialResponse>, ApiError> {
    require_api_token(&state, &headers)?;
    match state.allocator.next_serial(&tenant_id).await {
        Ok(next) => Ok(Json(NextSerialResponse {
            tenant_id,
            next_serial: next,
        })),
        Err(SerialError::LimitExceeded) => {
            Err(api_conflict("serial_limit", "tenant serial sequence is full"))
        }
        Err(SerialError::Store(err)) => Err(api_internal("failed to read serial sequence", &err)),
        Err(SerialError::RetriesExhausted { .. }) => {
            // The read-only path never retries, so this arm is unreachable;
            // map it defensively anyway.
            Err(api_conflict("allocation_contended", "serial sequence contended"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/tenants/{tenant_id}/variants/{serial_number}",
    tag = "variants",
    params(
        ("tenant_id" = String, Path, description = "Owning tenant"),
        ("serial_number" = i16, Path, description = "Variant serial number")
    ),
    responses(
        (status = 200, description = "Variant record", body = Variant),
        (status = 401, description = "Missing or invalid API token", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Variant not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_variant(
    Path((tenant_id, serial_number)): Path<(String, i16)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Variant>, ApiError> {
    require_api_token(&state, &headers)?;
    match state.store.get_variant(&tenant_id, serial_number).await {
        Ok(variant) => Ok(Json(variant)),
        Err(StoreError::NotFound(_)) => Err(api_not_found("variant not found")),
        Err(err) => Err(api_internal("failed to load variant", &err)),
    }
}
