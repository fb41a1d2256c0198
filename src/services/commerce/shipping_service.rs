use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::pricing_service::money;
use super::order_service::ShippingAddress;
use crate::{config::AppConfig, errors::ServiceError};

/// Quotes the shipping charge for a cart. Called once per cart summary and
/// once per checkout, after validation and before the order is written.
#[async_trait]
pub trait ShippingRates: Send + Sync {
    async fn quote(
        &self,
        subtotal: Decimal,
        address: Option<&ShippingAddress>,
    ) -> Result<Decimal, ServiceError>;
}

/// Flat-rate shipping with an optional free-shipping threshold
#[derive(Debug, Clone)]
pub struct FlatRateShipping {
    flat_rate: Decimal,
    free_threshold: Option<Decimal>,
}

impl FlatRateShipping {
    pub fn new(flat_rate: Decimal, free_threshold: Option<Decimal>) -> Self {
        Self {
            flat_rate,
            free_threshold,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.shipping_flat_rate, config.free_shipping_threshold)
    }

    pub fn shared(config: &AppConfig) -> Arc<dyn ShippingRates> {
        Arc::new(Self::from_config(config))
    }
}

#[async_trait]
impl ShippingRates for FlatRateShipping {
    async fn quote(
        &self,
        subtotal: Decimal,
        _address: Option<&ShippingAddress>,
    ) -> Result<Decimal, ServiceError> {
        if subtotal <= Decimal::ZERO {
            return Ok(money(Decimal::ZERO));
        }
        match self.free_threshold {
            Some(threshold) if subtotal >= threshold => Ok(money(Decimal::ZERO)),
            _ => Ok(money(self.flat_rate)),
        }
    }
}
