pub mod admin;
pub mod cart;
pub mod common;
pub mod orders;
pub mod products;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::commerce::{
    CartService, OrderService, ProductCatalogService, ShippingRates,
};
use std::sync::Arc;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<ProductCatalogService>,
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
        shipping: Arc<dyn ShippingRates>,
    ) -> Self {
        let catalog = Arc::new(ProductCatalogService::new(
            db_pool.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let cart = Arc::new(CartService::new(
            db_pool.clone(),
            event_sender.clone(),
            catalog.clone(),
            shipping.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            db_pool,
            event_sender,
            config,
            catalog.clone(),
            shipping,
        ));

        Self {
            catalog,
            cart,
            orders,
        }
    }
}
