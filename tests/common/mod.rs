#![allow(dead_code)]

use std::sync::Arc;

use atelier_api::{
    auth::{ADMIN_ROLE, CUSTOMER_ROLE},
    config::AppConfig,
    db,
    entities::{order, product},
    events::{self, EventSender},
    services::commerce::{FlatRateShipping, PlaceOrderInput, ShippingAddress, ShippingRates},
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str =
    "atelier_test_signing_key_with_enough_entropy_for_hs256_0987654321ZYX";

/// Application harness backed by a private in-memory SQLite database.
///
/// The pool is pinned to one connection: every SQLite `:memory:` connection
/// is its own database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        TEST_JWT_SECRET.to_string(),
        3600,
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.db_acquire_timeout_secs = 30;
    cfg
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(|cfg, _db| FlatRateShipping::shared(cfg)).await
    }

    /// Builds the app with a shipping collaborator that may use the database
    pub async fn build<F>(shipping: F) -> Self
    where
        F: FnOnce(&AppConfig, Arc<DatabaseConnection>) -> Arc<dyn ShippingRates>,
    {
        let cfg = test_config();
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let shipping = shipping(&cfg, db_arc.clone());
        let state = AppState::with_shipping(db_arc, Arc::new(cfg), event_sender, shipping);
        let router = atelier_api::build_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    pub fn token_for(&self, user_id: Uuid, roles: &[&str]) -> String {
        self.state
            .auth
            .issue_token(
                user_id,
                None,
                roles.iter().map(|r| r.to_string()).collect(),
            )
            .expect("issue test token")
    }

    /// A fresh customer and their bearer token
    pub fn customer(&self) -> (Uuid, String) {
        let user_id = Uuid::new_v4();
        (user_id, self.token_for(user_id, &[CUSTOMER_ROLE]))
    }

    pub fn admin_token(&self) -> String {
        self.token_for(Uuid::new_v4(), &[CUSTOMER_ROLE, ADMIN_ROLE])
    }

    /// Inserts an active product; an empty `sizes` slice means one-size
    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        stock: i32,
        sizes: &[&str],
    ) -> product::Model {
        let id = Uuid::new_v4();
        let slug = format!(
            "{}-{}",
            name.to_ascii_lowercase().replace(' ', "-"),
            &id.simple().to_string()[..6]
        );
        let now = Utc::now();
        product::ActiveModel {
            id: Set(id),
            sku: Set(format!("SKU-{}", &id.simple().to_string()[..10])),
            slug: Set(slug),
            name: Set(name.to_string()),
            description: Set(Some(format!("{} description", name))),
            price: Set(price),
            currency: Set("EUR".to_string()),
            stock_quantity: Set(stock),
            images: Set(json!([format!("/images/{}.jpg", id)])),
            sizes: Set(if sizes.is_empty() {
                None
            } else {
                Some(json!(sizes))
            }),
            is_active: Set(true),
            featured: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .expect("seed product")
    }

    pub async fn deactivate(&self, product_id: Uuid) {
        let product = product::Entity::find_by_id(product_id)
            .one(self.db())
            .await
            .unwrap()
            .expect("product exists");
        let mut active: product::ActiveModel = product.into();
        active.is_active = Set(false);
        active.update(self.db()).await.expect("deactivate product");
    }

    pub async fn stock_of(&self, product_id: Uuid) -> i32 {
        product::Entity::find_by_id(product_id)
            .one(self.db())
            .await
            .unwrap()
            .expect("product exists")
            .stock_quantity
    }

    pub async fn order_count(&self) -> u64 {
        order::Entity::find().count(self.db()).await.unwrap()
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}

pub fn lisbon_address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Ana Sousa".to_string(),
        line1: "Rua Augusta 100".to_string(),
        line2: None,
        city: "Lisboa".to_string(),
        postal_code: "1100-053".to_string(),
        country: "PT".to_string(),
        phone: None,
    }
}

pub fn order_input() -> PlaceOrderInput {
    PlaceOrderInput {
        shipping_address: lisbon_address(),
        payment_method: "card".to_string(),
    }
}

pub fn order_body() -> Value {
    json!({
        "shippingAddress": {
            "fullName": "Ana Sousa",
            "line1": "Rua Augusta 100",
            "city": "Lisboa",
            "postalCode": "1100-053",
            "country": "PT"
        },
        "paymentMethod": "card"
    })
}
