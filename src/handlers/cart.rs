use crate::{
    auth::AuthUser,
    errors::{ErrorBody, ServiceError},
    handlers::common::{ApiPath, Locale, ValidatedJson},
    services::commerce::{AddToCartInput, CartItemView, CartView, UpdateCartItemInput},
    ApiResponse, AppState,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/api/cart",
    summary = "Get cart",
    description = "Current user's cart with live product data and totals",
    params(("lang" = Option<String>, Query, description = "Locale for product names")),
    responses(
        (status = 200, description = "Cart retrieved", body = ApiResponse<CartView>),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
    locale: Locale,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state.services.cart.get(user.user_id, locale.as_str()).await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    summary = "Add to cart",
    description = "Adds a product, merging with an existing line for the same size",
    request_body = AddToCartInput,
    responses(
        (status = 201, description = "Item added", body = ApiResponse<CartItemView>),
        (status = 400, description = "size_required, invalid_size, insufficient_stock or validation_error", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "product_not_found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<AddToCartInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.cart.add(user.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item))))
}

#[utoipa::path(
    patch,
    path = "/api/cart/{item_id}",
    summary = "Update cart item",
    description = "Sets the quantity of a line; zero removes it",
    params(("item_id" = Uuid, Path, description = "Cart item id")),
    request_body = UpdateCartItemInput,
    responses(
        (status = 200, description = "Item updated", body = ApiResponse<CartItemView>),
        (status = 400, description = "Invalid quantity or insufficient stock", body = ErrorBody),
        (status = 404, description = "cart_item_not_found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(item_id): ApiPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateCartItemInput>,
) -> Result<Json<ApiResponse<CartItemView>>, ServiceError> {
    let updated = state
        .services
        .cart
        .update_quantity(user.user_id, item_id, payload.quantity)
        .await?;

    Ok(Json(match updated {
        Some(item) => ApiResponse::success(item),
        None => ApiResponse::message_only("Item removed from cart"),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{item_id}",
    summary = "Remove cart item",
    params(("item_id" = Uuid, Path, description = "Cart item id")),
    responses(
        (status = 200, description = "Item removed"),
        (status = 404, description = "cart_item_not_found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(item_id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.cart.remove(user.user_id, item_id).await?;
    Ok(Json(ApiResponse::message_only("Item removed from cart")))
}
