use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog product. `name` and `description` hold the default-locale copy;
/// other locales live in `product_translations`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub sku: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub price: Decimal,
    pub currency: String,
    pub stock_quantity: i32,
    /// Ordered list of image URIs
    #[sea_orm(column_type = "Json")]
    pub images: Json,
    /// Size labels; null or empty when the product is one-size
    #[sea_orm(column_type = "Json", nullable)]
    pub sizes: Option<Json>,
    pub is_active: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn size_options(&self) -> Vec<String> {
        string_list(self.sizes.as_ref())
    }

    pub fn requires_size(&self) -> bool {
        !self.size_options().is_empty()
    }

    pub fn offers_size(&self, size: &str) -> bool {
        self.size_options().iter().any(|s| s == size)
    }

    pub fn image_urls(&self) -> Vec<String> {
        string_list(Some(&self.images))
    }

    pub fn primary_image(&self) -> Option<String> {
        self.image_urls().into_iter().next()
    }
}

fn string_list(value: Option<&Json>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_translation::Entity")]
    Translations,
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
}

impl Related<super::product_translation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Translations.def()
    }
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn product(sizes: Option<Json>) -> Model {
        Model {
            id: Uuid::new_v4(),
            sku: "LIN-001".into(),
            slug: "linen-shirt".into(),
            name: "Linen Shirt".into(),
            description: None,
            price: dec!(120.00),
            currency: "EUR".into(),
            stock_quantity: 4,
            images: json!(["/img/linen-1.jpg", "/img/linen-2.jpg"]),
            sizes,
            is_active: true,
            featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_or_missing_sizes_mean_one_size() {
        assert!(!product(None).requires_size());
        assert!(!product(Some(json!([]))).requires_size());
        assert!(product(Some(json!(["S", "M"]))).requires_size());
    }

    #[test]
    fn size_membership_is_exact() {
        let p = product(Some(json!(["S", "M", "L"])));
        assert!(p.offers_size("M"));
        assert!(!p.offers_size("m"));
        assert!(!p.offers_size("XL"));
    }

    #[test]
    fn primary_image_is_first_in_order() {
        assert_eq!(
            product(None).primary_image().as_deref(),
            Some("/img/linen-1.jpg")
        );
    }
}
