//! Atelier storefront API
//!
//! Catalog, cart and checkout backend for the Atelier storefront. The HTTP
//! surface lives in [`handlers`]; business rules live in
//! [`services::commerce`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    middleware,
    routing::{get, patch, post},
    Extension, Router,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{AuthConfig, AuthRouterExt, AuthService, ADMIN_ROLE};
use crate::config::AppConfig;
use crate::errors::ErrorBody;
use crate::events::EventSender;
use crate::handlers::AppServices;
use crate::services::commerce::{FlatRateShipping, ShippingRates};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let shipping = FlatRateShipping::shared(&config);
        Self::with_shipping(db, config, event_sender, shipping)
    }

    /// Same as [`AppState::new`] with a custom shipping collaborator
    pub fn with_shipping(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
        shipping: Arc<dyn ShippingRates>,
    ) -> Self {
        let services = AppServices::new(db.clone(), event_sender.clone(), config.clone(), shipping);
        let auth = Arc::new(AuthService::new(AuthConfig::from(config.as_ref())));
        Self {
            db,
            config,
            event_sender,
            services,
            auth,
        }
    }
}

/// Response envelope shared by every endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data)
        }
    }

    /// Success without a payload
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            message: Some(message.into()),
        }
    }

    pub fn failure(error: ErrorBody) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            message: None,
        }
    }
}

/// Routes mounted under `/api`
pub fn api_routes() -> Router<AppState> {
    let catalog = Router::new()
        .route("/products", get(handlers::products::list_products))
        .route("/products/:slug", get(handlers::products::get_product));

    let cart = Router::new()
        .route(
            "/cart",
            get(handlers::cart::get_cart).post(handlers::cart::add_to_cart),
        )
        .route(
            "/cart/:item_id",
            patch(handlers::cart::update_cart_item).delete(handlers::cart::remove_cart_item),
        )
        .with_auth();

    let orders = Router::new()
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::place_order),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .with_auth();

    let admin = Router::new()
        .route("/admin/products", post(handlers::admin::create_product))
        .route(
            "/admin/products/:id/stock",
            patch(handlers::admin::adjust_stock),
        )
        .with_role(ADMIN_ROLE);

    Router::new()
        .merge(catalog)
        .merge(cart)
        .merge(orders)
        .merge(admin)
}

/// Full application router with request-id, tracing and auth wiring.
/// Transport concerns (CORS, compression, timeouts) are added by the binary.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .nest("/health", health::health_routes())
        .merge(openapi::swagger_ui())
        .layer(Extension(state.auth.clone()))
        .layer(crate::tracing::configure_http_tracing())
        .layer(middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_omits_empty_fields() {
        let value = serde_json::to_value(ApiResponse::success(json!({"id": 1}))).unwrap();
        assert_eq!(value, json!({"success": true, "data": {"id": 1}}));
    }

    #[test]
    fn failure_envelope_carries_error_body() {
        let body = ErrorBody {
            code: "empty_cart".into(),
            message: "Cart is empty".into(),
            details: None,
        };
        let value = serde_json::to_value(ApiResponse::<()>::failure(body)).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"]["code"], json!("empty_cart"));
        assert!(value.get("data").is_none());
    }

    #[test]
    fn message_only_envelope_has_no_data() {
        let value =
            serde_json::to_value(ApiResponse::<u32>::message_only("Item removed from cart"))
                .unwrap();
        assert_eq!(
            value,
            json!({"success": true, "message": "Item removed from cart"})
        );
    }
}
