use crate::{
    auth::AuthUser,
    errors::{ErrorBody, ServiceError},
    handlers::common::{ApiPath, ApiQuery, Locale, ValidatedJson},
    services::commerce::{OrderListQuery, OrderPage, OrderView, PlaceOrderInput},
    ApiResponse, AppState,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/api/orders",
    summary = "List orders",
    description = "Caller's orders, newest first, with nested items",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<OrderPage>),
        (status = 400, description = "Invalid query parameters", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<OrderListQuery>,
) -> Result<Json<ApiResponse<OrderPage>>, ServiceError> {
    let page = state.services.orders.list_orders(user.user_id, &query).await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderView>),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "order_not_found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state.services.orders.get_order(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    summary = "Place order",
    description = "Converts the caller's cart into an order",
    request_body = PlaceOrderInput,
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<OrderView>),
        (status = 400, description = "empty_cart, validation_failed, insufficient_stock or validation_error", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    locale: Locale,
    ValidatedJson(payload): ValidatedJson<PlaceOrderInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let placed = state
        .services
        .orders
        .place_order(user.user_id, payload, locale.as_str())
        .await?;

    let body = if placed.warnings.is_empty() {
        ApiResponse::success(placed.order)
    } else {
        ApiResponse::with_message(placed.order, placed.warnings.join(","))
    };
    Ok((StatusCode::CREATED, Json(body)))
}
