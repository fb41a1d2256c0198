//! Back-office catalog endpoints. Mounted behind the `admin` role.

use crate::{
    errors::{ErrorBody, ServiceError},
    handlers::common::{ApiPath, ValidatedJson},
    services::commerce::{CreateProductInput, ProductView},
    ApiResponse, AppState,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Signed stock correction
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct StockAdjustmentRequest {
    #[validate(custom = "validate_delta")]
    pub delta: i32,
}

const MAX_STOCK_DELTA: i32 = 100_000;

fn validate_delta(delta: i32) -> Result<(), validator::ValidationError> {
    if delta == 0 || delta.abs() > MAX_STOCK_DELTA {
        return Err(validator::ValidationError::new("delta"));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/admin/products",
    summary = "Create product",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductView>),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_product(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.create_product(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

#[utoipa::path(
    patch,
    path = "/api/admin/products/{id}/stock",
    summary = "Adjust stock",
    description = "Adds `delta` to the stock counter; the counter never drops below zero",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = StockAdjustmentRequest,
    responses(
        (status = 200, description = "Stock adjusted", body = ApiResponse<ProductView>),
        (status = 400, description = "insufficient_stock", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "product_not_found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<StockAdjustmentRequest>,
) -> Result<Json<ApiResponse<ProductView>>, ServiceError> {
    let catalog = &state.services.catalog;
    let product = catalog.adjust_stock(id, payload.delta).await?;
    let view = catalog.localize(&product, None, catalog.default_locale());
    Ok(Json(ApiResponse::success(view)))
}
