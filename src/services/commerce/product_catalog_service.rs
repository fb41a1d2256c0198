use crate::{
    config::AppConfig,
    db::with_transaction,
    entities::{product, product_translation},
    errors::ServiceError,
    events::{Event, EventSender},
    services::commerce::pricing_service::money,
};
use chrono::Utc;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Condition, Expr},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap_or_else(|_| unreachable!()));

/// Product as shown to a shopper in one locale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: Uuid,
    pub sku: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "450.00")]
    pub price: Decimal,
    pub currency: String,
    pub stock_quantity: i32,
    pub in_stock: bool,
    pub images: Vec<String>,
    pub sizes: Vec<String>,
    pub featured: bool,
    /// Locale the copy was resolved to
    pub locale: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductListFilter {
    pub featured: Option<bool>,
    /// Substring match on name or SKU
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub items: Vec<ProductView>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranslationInput {
    #[validate(length(min = 2, max = 8))]
    pub locale: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[validate(length(min = 1, max = 120), custom = "validate_slug")]
    pub slug: String,
    /// Default-locale name
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "120.00")]
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub stock_quantity: i32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sizes: Option<Vec<String>>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    #[validate]
    pub translations: Vec<TranslationInput>,
}

fn default_true() -> bool {
    true
}

fn validate_slug(slug: &str) -> Result<(), validator::ValidationError> {
    if SLUG_PATTERN.is_match(slug) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("slug"))
    }
}

/// Catalog store: product lookup, localized listings and the stock counter.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl ProductCatalogService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.config.default_locale
    }

    /// Fetch a product by id regardless of its active flag
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::ProductNotFound(product_id))
    }

    /// Fetch a product that can currently be sold
    pub async fn find_active(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        let product = self.get_product(product_id).await?;
        if !product.is_active {
            return Err(ServiceError::ProductNotFound(product_id));
        }
        Ok(product)
    }

    /// Loads products by id on the given connection, keyed by id
    pub async fn find_products<C: ConnectionTrait>(
        &self,
        conn: &C,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, product::Model>, ServiceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let products = product::Entity::find()
            .filter(product::Column::Id.is_in(ids.to_vec()))
            .all(conn)
            .await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }

    /// Translations for `locale`, keyed by product id. Empty for the default locale.
    pub async fn translations_for(
        &self,
        ids: &[Uuid],
        locale: &str,
    ) -> Result<HashMap<Uuid, product_translation::Model>, ServiceError> {
        if ids.is_empty() || locale == self.config.default_locale {
            return Ok(HashMap::new());
        }
        let rows = product_translation::Entity::find()
            .filter(product_translation::Column::ProductId.is_in(ids.to_vec()))
            .filter(product_translation::Column::Locale.eq(locale))
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().map(|t| (t.product_id, t)).collect())
    }

    /// Localized display name, falling back to the default-locale copy
    pub async fn localized_names(
        &self,
        products: &HashMap<Uuid, product::Model>,
        locale: &str,
    ) -> Result<HashMap<Uuid, String>, ServiceError> {
        let ids: Vec<Uuid> = products.keys().copied().collect();
        let translations = self.translations_for(&ids, locale).await?;
        Ok(products
            .values()
            .map(|p| {
                let name = translations
                    .get(&p.id)
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| p.name.clone());
                (p.id, name)
            })
            .collect())
    }

    pub fn localize(
        &self,
        product: &product::Model,
        translation: Option<&product_translation::Model>,
        locale: &str,
    ) -> ProductView {
        let (name, description, resolved) = match translation {
            Some(t) => (
                t.name.clone(),
                t.description.clone().or_else(|| product.description.clone()),
                t.locale.clone(),
            ),
            None => (
                product.name.clone(),
                product.description.clone(),
                if locale == self.config.default_locale {
                    locale.to_string()
                } else {
                    self.config.default_locale.clone()
                },
            ),
        };

        ProductView {
            id: product.id,
            sku: product.sku.clone(),
            slug: product.slug.clone(),
            name,
            description,
            price: money(product.price),
            currency: product.currency.clone(),
            stock_quantity: product.stock_quantity,
            in_stock: product.stock_quantity > 0,
            images: product.image_urls(),
            sizes: product.size_options(),
            featured: product.featured,
            locale: resolved,
        }
    }

    /// Active product by slug, localized
    #[instrument(skip(self))]
    pub async fn get_by_slug(&self, slug: &str, locale: &str) -> Result<ProductView, ServiceError> {
        let product = product::Entity::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product '{}'", slug)))?;

        let translations = self.translations_for(&[product.id], locale).await?;
        Ok(self.localize(&product, translations.get(&product.id), locale))
    }

    /// Active products matching the filter, featured first then newest
    #[instrument(skip(self))]
    pub async fn list_active(
        &self,
        filter: &ProductListFilter,
        locale: &str,
    ) -> Result<ProductPage, ServiceError> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = filter.offset.unwrap_or(0);

        let mut query = product::Entity::find().filter(product::Column::IsActive.eq(true));
        if let Some(featured) = filter.featured {
            query = query.filter(product::Column::Featured.eq(featured));
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(product::Column::Name.contains(term))
                    .add(product::Column::Sku.contains(term)),
            );
        }

        let total = query.clone().count(&*self.db).await?;
        let products = query
            .order_by_desc(product::Column::Featured)
            .order_by_desc(product::Column::CreatedAt)
            .order_by_asc(product::Column::Name)
            .limit(limit)
            .offset(offset)
            .all(&*self.db)
            .await?;

        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let translations = self.translations_for(&ids, locale).await?;
        let items = products
            .iter()
            .map(|p| self.localize(p, translations.get(&p.id), locale))
            .collect();

        Ok(ProductPage {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Atomically takes `amount` units off the stock counter.
    ///
    /// Issues a single conditional `UPDATE ... WHERE stock_quantity >= amount`;
    /// when no row matches, nothing was written and the product is either gone
    /// or short on stock.
    #[instrument(skip(self, conn))]
    pub async fn decrement_stock<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        amount: i32,
    ) -> Result<(), ServiceError> {
        if amount <= 0 {
            return Err(ServiceError::ValidationError(
                "Stock decrement must be positive".to_string(),
            ));
        }

        let result = product::Entity::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).sub(amount),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::StockQuantity.gte(amount))
            .exec(conn)
            .await?;

        if result.rows_affected == 1 {
            return Ok(());
        }

        match product::Entity::find_by_id(product_id).one(conn).await? {
            None => Err(ServiceError::ProductNotFound(product_id)),
            Some(current) => {
                counter!("atelier_catalog.stock_conflicts", 1);
                warn!(
                    %product_id,
                    requested = amount,
                    available = current.stock_quantity,
                    "conditional stock decrement matched no row"
                );
                Err(ServiceError::InsufficientStock(format!(
                    "{}: only {} left in stock (requested {})",
                    current.name, current.stock_quantity, amount
                )))
            }
        }
    }

    /// Back-office stock correction. Negative deltas use the same conditional
    /// update as checkout, so the counter still never drops below zero.
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        delta: i32,
    ) -> Result<product::Model, ServiceError> {
        if delta < 0 {
            self.decrement_stock(&*self.db, product_id, -delta).await?;
        } else if delta > 0 {
            let result = product::Entity::update_many()
                .col_expr(
                    product::Column::StockQuantity,
                    Expr::col(product::Column::StockQuantity).add(delta),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(product::Column::Id.eq(product_id))
                .exec(&*self.db)
                .await?;
            if result.rows_affected == 0 {
                return Err(ServiceError::ProductNotFound(product_id));
            }
        }

        let product = self.get_product(product_id).await?;
        self.event_sender.send_or_log(Event::StockAdjusted {
            product_id,
            delta,
            stock_quantity: product.stock_quantity,
        });
        info!(%product_id, delta, stock = product.stock_quantity, "Adjusted stock");
        Ok(product)
    }

    /// Create a product and its translations in one transaction
    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductView, ServiceError> {
        input.validate()?;
        self.check_product_rules(&input)?;
        self.ensure_unique(&input.sku, &input.slug).await?;

        let product_id = Uuid::new_v4();
        let now = Utc::now();
        let currency = self.config.default_currency.clone();
        let sizes = input
            .sizes
            .clone()
            .filter(|s| !s.is_empty())
            .map(|s| json!(s));

        let model = product::ActiveModel {
            id: Set(product_id),
            sku: Set(input.sku.clone()),
            slug: Set(input.slug.clone()),
            name: Set(input.name.clone()),
            description: Set(input.description.clone()),
            price: Set(money(input.price)),
            currency: Set(currency),
            stock_quantity: Set(input.stock_quantity),
            images: Set(json!(input.images)),
            sizes: Set(sizes),
            is_active: Set(input.is_active),
            featured: Set(input.featured),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let translations = input.translations.clone();

        let product = with_transaction(&self.db, |txn| {
            Box::pin(async move {
                let product = model.insert(txn).await?;
                for t in translations {
                    product_translation::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        product_id: Set(product_id),
                        locale: Set(t.locale.to_ascii_lowercase()),
                        name: Set(t.name),
                        description: Set(t.description),
                    }
                    .insert(txn)
                    .await?;
                }
                Ok(product)
            })
        })
        .await?;

        info!(%product_id, "Created product");
        let locale = self.config.default_locale.clone();
        Ok(self.localize(&product, None, &locale))
    }

    fn check_product_rules(&self, input: &CreateProductInput) -> Result<(), ServiceError> {
        if input.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must be greater than zero".into(),
            ));
        }
        if input.price.normalize().scale() > 2 {
            return Err(ServiceError::ValidationError(
                "price must have at most two decimal places".into(),
            ));
        }
        if let Some(sizes) = &input.sizes {
            let mut seen = std::collections::HashSet::new();
            for size in sizes {
                if size.trim().is_empty() || !seen.insert(size.as_str()) {
                    return Err(ServiceError::ValidationError(
                        "sizes must be unique, non-empty labels".into(),
                    ));
                }
            }
        }
        let locales = self.config.locales();
        let mut translated = std::collections::HashSet::new();
        for t in &input.translations {
            let locale = t.locale.to_ascii_lowercase();
            if !locales.contains(&locale) {
                return Err(ServiceError::ValidationError(format!(
                    "unsupported locale '{}'",
                    t.locale
                )));
            }
            if locale == self.config.default_locale {
                return Err(ServiceError::ValidationError(
                    "default-locale copy belongs on the product itself".into(),
                ));
            }
            if !translated.insert(locale) {
                return Err(ServiceError::ValidationError(format!(
                    "duplicate translation for locale '{}'",
                    t.locale
                )));
            }
        }
        Ok(())
    }

    async fn ensure_unique(&self, sku: &str, slug: &str) -> Result<(), ServiceError> {
        let clash = product::Entity::find()
            .filter(
                Condition::any()
                    .add(product::Column::Sku.eq(sku))
                    .add(product::Column::Slug.eq(slug)),
            )
            .one(&*self.db)
            .await?;
        match clash {
            Some(existing) if existing.sku == sku => Err(ServiceError::ValidationError(format!(
                "SKU '{}' already exists",
                sku
            ))),
            Some(_) => Err(ServiceError::ValidationError(format!(
                "Slug '{}' already exists",
                slug
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_pattern_accepts_kebab_case_only() {
        assert!(validate_slug("linen-shirt").is_ok());
        assert!(validate_slug("coat-2024").is_ok());
        assert!(validate_slug("Linen Shirt").is_err());
        assert!(validate_slug("linen--shirt").is_err());
    }
}
