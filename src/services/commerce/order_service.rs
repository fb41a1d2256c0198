use crate::{
    config::AppConfig,
    db::with_transaction,
    entities::{
        cart_item,
        order::{self, OrderStatus},
        order_item, product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::commerce::{
        pricing_service::{line_total, money, OrderTotals, PricedLine},
        product_catalog_service::ProductCatalogService,
        shipping_service::ShippingRates,
    },
};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

/// Warning attached to a placed order whose cart lines could not be deleted
pub const CART_NOT_CLEARED: &str = "cart_not_cleared";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    #[validate(length(max = 200))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    /// ISO 3166-1 alpha-2
    #[validate(length(equal = 2))]
    pub country: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderInput {
    #[validate]
    pub shipping_address: ShippingAddress,
    #[validate(length(min = 1, max = 40))]
    pub payment_method: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    /// 1..=100, defaults to 20
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    #[param(value_type = Option<String>)]
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub size: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String, example = "120.00")]
    pub price_at_time: Decimal,
    #[schema(value_type = String, example = "240.00")]
    pub line_total: Decimal,
}

impl From<order_item::Model> for OrderItemView {
    fn from(item: order_item::Model) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            sku: item.sku,
            product_name: item.product_name,
            size: item.size,
            quantity: item.quantity,
            price_at_time: money(item.price_at_time),
            line_total: money(item.line_total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    #[schema(value_type = String, example = "690.00")]
    pub subtotal: Decimal,
    #[schema(value_type = String, example = "25.00")]
    pub shipping: Decimal,
    #[schema(value_type = String, example = "715.00")]
    pub total: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub locale: String,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub items: Vec<OrderView>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Result of a successful checkout
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: OrderView,
    /// Non-fatal anomalies, e.g. [`CART_NOT_CLEARED`]
    pub warnings: Vec<String>,
}

/// Converts a user's cart into an order.
///
/// Validation runs against the products as read at the start of checkout and
/// rejects the whole cart with every reason found. The write phase is a
/// single transaction; stock is taken with a conditional decrement, so a
/// concurrent checkout that drained the stock in between makes this one fail
/// with `InsufficientStock` and roll back.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
    catalog: Arc<ProductCatalogService>,
    shipping: Arc<dyn ShippingRates>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
        catalog: Arc<ProductCatalogService>,
        shipping: Arc<dyn ShippingRates>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
            catalog,
            shipping,
        }
    }

    #[instrument(skip(self, input), fields(payment_method = %input.payment_method))]
    pub async fn place_order(
        &self,
        user_id: Uuid,
        input: PlaceOrderInput,
        locale: &str,
    ) -> Result<PlacedOrder, ServiceError> {
        let started = Instant::now();

        input.validate()?;
        let payment_method = input.payment_method.trim().to_ascii_lowercase();
        if !self.config.accepts_payment_method(&payment_method) {
            return Err(ServiceError::ValidationError(format!(
                "unsupported payment method '{}'",
                input.payment_method
            )));
        }
        let mut address = input.shipping_address;
        address.country = address.country.to_ascii_uppercase();

        let lines = cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::OrderId.is_null())
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        if lines.is_empty() {
            counter!("atelier_orders.rejected", 1, "reason" => "empty_cart");
            return Err(ServiceError::EmptyCart);
        }

        // Per-product demand across sizes, in first-seen order
        let mut demand: Vec<(Uuid, i32)> = Vec::new();
        for line in &lines {
            match demand.iter_mut().find(|(id, _)| *id == line.product_id) {
                Some((_, qty)) => *qty += line.quantity,
                None => demand.push((line.product_id, line.quantity)),
            }
        }
        let product_ids: Vec<Uuid> = demand.iter().map(|(id, _)| *id).collect();
        let products = self.catalog.find_products(&*self.db, &product_ids).await?;
        let names = self.catalog.localized_names(&products, locale).await?;

        let reasons = checkout_problems(&lines, &demand, &products, &names);
        if !reasons.is_empty() {
            counter!("atelier_orders.rejected", 1, "reason" => "validation_failed");
            warn!(%user_id, problems = reasons.len(), "checkout rejected");
            return Err(ServiceError::ValidationFailed(reasons));
        }

        let priced: Vec<PricedLine> = lines
            .iter()
            .filter_map(|line| {
                products.get(&line.product_id).map(|p| PricedLine {
                    unit_price: p.price,
                    quantity: line.quantity,
                })
            })
            .collect();
        let subtotal = money(OrderTotals::raw_subtotal(&priced));
        let shipping = self.shipping.quote(subtotal, Some(&address)).await?;
        let totals = OrderTotals::compute(&priced, shipping);

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_row = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number()),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending),
            subtotal: Set(totals.subtotal),
            shipping: Set(totals.shipping),
            total: Set(totals.total),
            currency: Set(self.config.default_currency.clone()),
            payment_method: Set(payment_method),
            shipping_address: Set(serde_json::to_value(&address)
                .map_err(|e| ServiceError::InternalError(e.to_string()))?),
            locale: Set(locale.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let mut item_rows = Vec::with_capacity(lines.len());
        for line in &lines {
            let Some(product) = products.get(&line.product_id) else {
                continue;
            };
            item_rows.push(order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                sku: Set(product.sku.clone()),
                product_name: Set(names
                    .get(&product.id)
                    .cloned()
                    .unwrap_or_else(|| product.name.clone())),
                size: Set(line.size.clone()),
                quantity: Set(line.quantity),
                price_at_time: Set(money(product.price)),
                line_total: Set(line_total(product.price, line.quantity)),
            });
        }
        let line_ids: Vec<Uuid> = lines.iter().map(|l| l.id).collect();
        let catalog = self.catalog.clone();
        let stock_demand = demand.clone();

        let (order, items) = with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let order = order_row.insert(txn).await?;

                let mut items = Vec::with_capacity(item_rows.len());
                for row in item_rows {
                    items.push(row.insert(txn).await?);
                }

                for (product_id, quantity) in stock_demand {
                    catalog.decrement_stock(txn, product_id, quantity).await?;
                }

                let expected = line_ids.len() as u64;
                let consumed = cart_item::Entity::update_many()
                    .col_expr(cart_item::Column::OrderId, Expr::value(Some(order_id)))
                    .filter(cart_item::Column::Id.is_in(line_ids))
                    .filter(cart_item::Column::OrderId.is_null())
                    .exec(txn)
                    .await?;
                if consumed.rows_affected != expected {
                    return Err(ServiceError::ValidationFailed(vec![
                        "Your cart changed during checkout; please review it and try again"
                            .to_string(),
                    ]));
                }

                Ok((order, items))
            })
        })
        .await
        .map_err(|err| {
            if matches!(err, ServiceError::InsufficientStock(_)) {
                counter!("atelier_orders.rejected", 1, "reason" => "stock_race");
            }
            err
        })?;

        let mut warnings = Vec::new();
        if let Err(err) = cart_item::Entity::delete_many()
            .filter(cart_item::Column::OrderId.eq(order_id))
            .exec(&*self.db)
            .await
        {
            counter!("atelier_orders.cart_not_cleared", 1);
            warn!(%order_id, error = %err, "order placed but cart lines were not deleted");
            warnings.push(CART_NOT_CLEARED.to_string());
        }

        let view = to_view(order, items)?;
        self.publish_placed(user_id, &view, &product_ids).await;

        counter!("atelier_orders.placed", 1);
        histogram!("atelier_orders.place_duration", started.elapsed());
        info!(
            %order_id,
            order_number = %view.order_number,
            total = %view.total,
            "Placed order"
        );

        Ok(PlacedOrder {
            order: view,
            warnings,
        })
    }

    /// Caller's orders, newest first
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        user_id: Uuid,
        query: &OrderListQuery,
    ) -> Result<OrderPage, ServiceError> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ServiceError::ValidationError(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        let offset = query.offset.unwrap_or(0);

        let mut select = order::Entity::find().filter(order::Column::UserId.eq(user_id));
        if let Some(status) = query.status {
            select = select.filter(order::Column::Status.eq(status));
        }

        let total = select.clone().count(&*self.db).await?;
        let orders = select
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&*self.db)
            .await?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items_by_order: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
        if !ids.is_empty() {
            for item in order_item::Entity::find()
                .filter(order_item::Column::OrderId.is_in(ids))
                .all(&*self.db)
                .await?
            {
                items_by_order.entry(item.order_id).or_default().push(item);
            }
        }

        let items = orders
            .into_iter()
            .map(|o| {
                let lines = items_by_order.remove(&o.id).unwrap_or_default();
                to_view(o, lines)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderPage {
            items,
            total,
            limit,
            offset,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        to_view(order, items)
    }

    async fn publish_placed(&self, user_id: Uuid, order: &OrderView, product_ids: &[Uuid]) {
        self.event_sender.send_or_log(Event::OrderPlaced {
            order_id: order.id,
            user_id,
            total: order.total,
            item_count: order.items.iter().map(|i| i.quantity).sum(),
        });

        let threshold = self.config.low_stock_threshold;
        match self.catalog.find_products(&*self.db, product_ids).await {
            Ok(products) => {
                for p in products.values().filter(|p| p.stock_quantity <= threshold) {
                    self.event_sender.send_or_log(Event::StockLow {
                        product_id: p.id,
                        sku: p.sku.clone(),
                        remaining: p.stock_quantity,
                    });
                }
            }
            Err(err) => warn!(error = %err, "could not reload stock after checkout"),
        }
    }
}

/// Human-readable reasons the cart cannot be ordered as-is
fn checkout_problems(
    lines: &[cart_item::Model],
    demand: &[(Uuid, i32)],
    products: &HashMap<Uuid, product::Model>,
    names: &HashMap<Uuid, String>,
) -> Vec<String> {
    let name_of = |p: &product::Model| names.get(&p.id).cloned().unwrap_or_else(|| p.name.clone());
    let mut reasons = Vec::new();

    for (product_id, _) in demand {
        match products.get(product_id) {
            None => reasons.push("A product in your cart is no longer available".to_string()),
            Some(p) if !p.is_active => {
                reasons.push(format!("{} is no longer available", name_of(p)))
            }
            Some(_) => {}
        }
    }

    for line in lines {
        let Some(p) = products.get(&line.product_id).filter(|p| p.is_active) else {
            continue;
        };
        if !p.requires_size() {
            continue;
        }
        match line.size.as_deref() {
            Some(size) if p.offers_size(size) => {}
            Some(size) => reasons.push(format!(
                "{}: size {} is no longer offered",
                name_of(p),
                size
            )),
            None => reasons.push(format!("{}: a size must be selected", name_of(p))),
        }
    }

    for (product_id, requested) in demand {
        let Some(p) = products.get(product_id).filter(|p| p.is_active) else {
            continue;
        };
        if *requested > p.stock_quantity {
            reasons.push(format!(
                "{}: only {} left in stock (requested {})",
                name_of(p),
                p.stock_quantity,
                requested
            ));
        }
    }

    reasons
}

fn to_view(order: order::Model, items: Vec<order_item::Model>) -> Result<OrderView, ServiceError> {
    let shipping_address: ShippingAddress = serde_json::from_value(order.shipping_address)
        .map_err(|e| ServiceError::InternalError(format!("corrupt address snapshot: {}", e)))?;

    let mut items: Vec<OrderItemView> = items.into_iter().map(OrderItemView::from).collect();
    items.sort_by(|a, b| a.sku.cmp(&b.sku).then_with(|| a.size.cmp(&b.size)));

    Ok(OrderView {
        id: order.id,
        order_number: order.order_number,
        status: order.status,
        subtotal: money(order.subtotal),
        shipping: money(order.shipping),
        total: money(order.total),
        currency: order.currency,
        payment_method: order.payment_method,
        locale: order.locale,
        shipping_address,
        created_at: order.created_at,
        items,
    })
}

/// `AT-` followed by eight upper-case hex digits
pub fn order_number() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("AT-{}", id[..8].to_ascii_uppercase())
}
