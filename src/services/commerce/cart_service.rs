use crate::{
    entities::{cart_item, product},
    errors::ServiceError,
    events::{Event, EventSender},
    services::commerce::{
        pricing_service::{line_total, money, OrderTotals, PricedLine, MAX_LINE_QUANTITY},
        product_catalog_service::ProductCatalogService,
        shipping_service::ShippingRates,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Per-user shopping cart backed by `cart_items`.
///
/// Lines are keyed by `(user, product, size)`. Re-adding an existing
/// combination increments the stored quantity in place. Lines stamped with
/// an `order_id` were consumed by checkout; they are never returned and are
/// purged the next time the cart is read.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    catalog: Arc<ProductCatalogService>,
    shipping: Arc<dyn ShippingRates>,
}

/// Input for adding an item to the cart
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 99))]
    pub quantity: i32,
    pub size: Option<String>,
}

/// A quantity of zero removes the line
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemInput {
    #[validate(range(min = 0, max = 99))]
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub size: Option<String>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<cart_item::Model> for CartItemView {
    fn from(item: cart_item::Model) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            size: item.size,
            quantity: item.quantity,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// Cart line joined with the live product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub slug: String,
    pub name: String,
    pub image: Option<String>,
    pub size: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String, example = "120.00")]
    pub unit_price: Decimal,
    #[schema(value_type = String, example = "240.00")]
    pub line_total: Decimal,
    pub stock_quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub item_count: i32,
    #[schema(value_type = String, example = "690.00")]
    pub subtotal: Decimal,
    #[schema(value_type = String, example = "25.00")]
    pub shipping: Decimal,
    #[schema(value_type = String, example = "715.00")]
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub summary: CartSummary,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        catalog: Arc<ProductCatalogService>,
        shipping: Arc<dyn ShippingRates>,
    ) -> Self {
        Self {
            db,
            event_sender,
            catalog,
            shipping,
        }
    }

    /// Current cart for `user_id`, enriched with live product data.
    ///
    /// Lines whose product is missing or inactive are left out of the result
    /// but stay stored.
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: Uuid, locale: &str) -> Result<CartView, ServiceError> {
        self.purge_consumed(user_id).await?;

        let items = cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::OrderId.is_null())
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let mut products = self.catalog.find_products(&*self.db, &ids).await?;
        products.retain(|_, p| p.is_active);
        let names = self.catalog.localized_names(&products, locale).await?;

        let mut lines = Vec::with_capacity(items.len());
        let mut priced = Vec::with_capacity(items.len());
        for item in items {
            let Some(product) = products.get(&item.product_id) else {
                debug!(item_id = %item.id, "hiding cart line for unavailable product");
                continue;
            };
            priced.push(PricedLine {
                unit_price: product.price,
                quantity: item.quantity,
            });
            lines.push(CartLineView {
                id: item.id,
                product_id: product.id,
                sku: product.sku.clone(),
                slug: product.slug.clone(),
                name: names
                    .get(&product.id)
                    .cloned()
                    .unwrap_or_else(|| product.name.clone()),
                image: product.primary_image(),
                size: item.size,
                quantity: item.quantity,
                unit_price: money(product.price),
                line_total: line_total(product.price, item.quantity),
                stock_quantity: product.stock_quantity,
            });
        }

        let subtotal = money(OrderTotals::raw_subtotal(&priced));
        let shipping = self.shipping.quote(subtotal, None).await?;
        let totals = OrderTotals::compute(&priced, shipping);

        Ok(CartView {
            summary: CartSummary {
                item_count: lines.iter().map(|l| l.quantity).sum(),
                subtotal: totals.subtotal,
                shipping: totals.shipping,
                total: totals.total,
            },
            items: lines,
        })
    }

    /// Adds a product to the cart, merging with an existing open line for the
    /// same size. Every check runs before the write; a rejected request leaves
    /// the cart untouched.
    #[instrument(skip(self, input), fields(product_id = %input.product_id, quantity = input.quantity))]
    pub async fn add(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartItemView, ServiceError> {
        input.validate()?;

        let product = self.catalog.find_active(input.product_id).await?;
        let size = if product.requires_size() {
            match input.size.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                None => return Err(ServiceError::SizeRequired(product.name.clone())),
                Some(size) if !product.offers_size(size) => {
                    return Err(ServiceError::InvalidSize {
                        product: product.name.clone(),
                        size: size.to_string(),
                    })
                }
                Some(size) => Some(size.to_string()),
            }
        } else {
            None
        };

        // A concurrent first add of the same line loses on the open-line unique
        // index; the second attempt finds that line and increments it.
        let item = match self
            .merge_line(user_id, &product, size.clone(), input.quantity)
            .await
        {
            Err(ServiceError::DatabaseError(err)) if is_unique_violation(&err) => {
                debug!(product_id = %product.id, "open cart line created concurrently, merging");
                self.merge_line(user_id, &product, size, input.quantity)
                    .await?
            }
            other => other?,
        };

        self.event_sender.send_or_log(Event::CartItemAdded {
            user_id,
            product_id: product.id,
            quantity: input.quantity,
        });
        info!(item_id = %item.id, quantity = item.quantity, "Added item to cart");
        Ok(item.into())
    }

    /// Sets the quantity of a line. Zero removes it and yields `None`.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItemView>, ServiceError> {
        UpdateCartItemInput { quantity }.validate()?;
        if quantity == 0 {
            self.remove(user_id, item_id).await?;
            return Ok(None);
        }

        let item = self.find_open_line(user_id, item_id).await?;
        let product = self.catalog.find_active(item.product_id).await?;
        if quantity > product.stock_quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "{}: only {} left in stock",
                product.name, product.stock_quantity
            )));
        }

        let mut line: cart_item::ActiveModel = item.into();
        line.quantity = Set(quantity);
        line.updated_at = Set(Utc::now());
        let updated = line.update(&*self.db).await?;

        info!(%item_id, quantity, "Updated cart item quantity");
        Ok(Some(updated.into()))
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let result = cart_item::Entity::delete_many()
            .filter(cart_item::Column::Id.eq(item_id))
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::OrderId.is_null())
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::CartItemNotFound(item_id));
        }

        self.event_sender
            .send_or_log(Event::CartItemRemoved { user_id, item_id });
        info!(%item_id, "Removed item from cart");
        Ok(())
    }

    /// Increments the open `(user, product, size)` line or inserts it, in one
    /// transaction. Dropping the transaction on an early return rolls it back.
    async fn merge_line(
        &self,
        user_id: Uuid,
        product: &product::Model,
        size: Option<String>,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let mut existing_query = cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product.id))
            .filter(cart_item::Column::OrderId.is_null());
        existing_query = match &size {
            Some(size) => existing_query.filter(cart_item::Column::Size.eq(size.as_str())),
            None => existing_query.filter(cart_item::Column::Size.is_null()),
        };
        let existing = existing_query.one(&txn).await?;

        let merged = existing.as_ref().map_or(0, |i| i.quantity) + quantity;
        if merged > MAX_LINE_QUANTITY {
            return Err(ServiceError::ValidationError(format!(
                "quantity for a single line cannot exceed {}",
                MAX_LINE_QUANTITY
            )));
        }
        if merged > product.stock_quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "{}: only {} left in stock",
                product.name, product.stock_quantity
            )));
        }

        let now = Utc::now();
        let item = match existing {
            Some(line) => {
                cart_item::Entity::update_many()
                    .col_expr(
                        cart_item::Column::Quantity,
                        Expr::col(cart_item::Column::Quantity).add(quantity),
                    )
                    .col_expr(cart_item::Column::UpdatedAt, Expr::value(now))
                    .filter(cart_item::Column::Id.eq(line.id))
                    .exec(&txn)
                    .await?;
                cart_item::Entity::find_by_id(line.id)
                    .one(&txn)
                    .await?
                    .ok_or(ServiceError::CartItemNotFound(line.id))?
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(product.id),
                    size: Set(size),
                    quantity: Set(quantity),
                    order_id: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?
            }
        };

        txn.commit().await?;
        Ok(item)
    }

    async fn find_open_line(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<cart_item::Model, ServiceError> {
        cart_item::Entity::find_by_id(item_id)
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::OrderId.is_null())
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::CartItemNotFound(item_id))
    }

    /// Deletes lines a committed checkout left behind
    async fn purge_consumed(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let result = cart_item::Entity::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::OrderId.is_not_null())
            .exec(&*self.db)
            .await?;
        if result.rows_affected > 0 {
            info!(%user_id, purged = result.rows_affected, "Purged consumed cart lines");
        }
        Ok(())
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
