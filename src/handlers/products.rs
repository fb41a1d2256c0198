use crate::{
    errors::{ErrorBody, ServiceError},
    handlers::common::{ApiPath, ApiQuery, Locale},
    services::commerce::{ProductListFilter, ProductPage, ProductView},
    ApiResponse, AppState,
};
use axum::{extract::State, Json};

#[utoipa::path(
    get,
    path = "/api/products",
    summary = "List products",
    description = "Active catalog products, featured first, localized by `lang` or Accept-Language",
    params(
        ProductListFilter,
        ("lang" = Option<String>, Query, description = "Locale override")
    ),
    responses(
        (status = 200, description = "Products retrieved", body = ApiResponse<ProductPage>),
        (status = 400, description = "Invalid query parameters", body = ErrorBody)
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    locale: Locale,
    ApiQuery(filter): ApiQuery<ProductListFilter>,
) -> Result<Json<ApiResponse<ProductPage>>, ServiceError> {
    let page = state
        .services
        .catalog
        .list_active(&filter, locale.as_str())
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    get,
    path = "/api/products/{slug}",
    summary = "Get product",
    params(
        ("slug" = String, Path, description = "Product slug"),
        ("lang" = Option<String>, Query, description = "Locale override")
    ),
    responses(
        (status = 200, description = "Product retrieved", body = ApiResponse<ProductView>),
        (status = 404, description = "Product not found", body = ErrorBody)
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    locale: Locale,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<ApiResponse<ProductView>>, ServiceError> {
    let product = state
        .services
        .catalog
        .get_by_slug(&slug, locale.as_str())
        .await?;
    Ok(Json(ApiResponse::success(product)))
}
