//! Seed script - populates the catalog with the demo collection
//!
//! Run with: cargo run --bin seed-catalog -- --token <user-id> [--admin]
//!
//! Products whose SKU or slug already exists are skipped, so the script can
//! be re-run against a live database.

use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use atelier_api::{
    auth::{AuthConfig, AuthService, ADMIN_ROLE, CUSTOMER_ROLE},
    config, db,
    errors::ServiceError,
    events::EventSender,
    services::commerce::{CreateProductInput, ProductCatalogService, TranslationInput},
};

#[derive(Debug, Parser)]
#[command(name = "seed-catalog", about = "Seed the Atelier demo catalog")]
struct Args {
    /// Print a development JWT for this user id
    #[arg(long, value_name = "USER_ID")]
    token: Option<Uuid>,

    /// Issue the token with the admin role
    #[arg(long, requires = "token")]
    admin: bool,

    /// Only issue the token, leave the catalog untouched
    #[arg(long)]
    skip_catalog: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = Arc::new(config::load_config()?);
    config::init_tracing(cfg.log_level(), cfg.log_json);

    if !args.skip_catalog {
        let pool = db::establish_connection_from_app_config(&cfg).await?;
        db::run_migrations(&pool).await?;

        let (tx, _rx) = mpsc::channel(64);
        let catalog = ProductCatalogService::new(
            Arc::new(pool),
            Arc::new(EventSender::new(tx)),
            cfg.clone(),
        );

        let mut created = 0;
        for product in demo_collection() {
            let sku = product.sku.clone();
            match catalog.create_product(product).await {
                Ok(view) => {
                    created += 1;
                    info!(sku = %view.sku, slug = %view.slug, "seeded product");
                }
                Err(ServiceError::ValidationError(reason)) if reason.contains("already exists") => {
                    info!(%sku, "product already present, skipping");
                }
                Err(err) => {
                    warn!(%sku, error = %err, "failed to seed product");
                    return Err(err.into());
                }
            }
        }
        info!(created, "catalog seed complete");
    }

    if let Some(user_id) = args.token {
        let mut roles = vec![CUSTOMER_ROLE.to_string()];
        if args.admin {
            roles.push(ADMIN_ROLE.to_string());
        }
        let auth = AuthService::new(AuthConfig::from(cfg.as_ref()));
        let token = auth.issue_token(user_id, None, roles)?;
        println!("{}", token);
    }

    Ok(())
}

fn translation(locale: &str, name: &str, description: &str) -> TranslationInput {
    TranslationInput {
        locale: locale.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
    }
}

struct Seed<'a> {
    sku: &'a str,
    slug: &'a str,
    name: &'a str,
    description: &'a str,
    price: Decimal,
    stock: i32,
    sizes: Option<&'a [&'a str]>,
    featured: bool,
    translations: [(&'a str, &'a str, &'a str); 3],
}

fn demo_collection() -> Vec<CreateProductInput> {
    const APPAREL: &[&str] = &["XS", "S", "M", "L", "XL"];

    let seeds = [
        Seed {
            sku: "ATL-COAT-001",
            slug: "wool-overcoat",
            name: "Wool Overcoat",
            description: "Hand-finished overcoat in undyed merino wool.",
            price: dec!(450.00),
            stock: 6,
            sizes: Some(APPAREL),
            featured: true,
            translations: [
                ("pt", "Sobretudo de Lã", "Sobretudo acabado à mão em lã merino natural."),
                ("es", "Abrigo de Lana", "Abrigo acabado a mano en lana merino sin teñir."),
                ("fr", "Manteau en Laine", "Manteau fini main en laine mérinos non teinte."),
            ],
        },
        Seed {
            sku: "ATL-SHIRT-014",
            slug: "linen-shirt",
            name: "Linen Shirt",
            description: "Relaxed shirt woven from Portuguese linen.",
            price: dec!(120.00),
            stock: 24,
            sizes: Some(APPAREL),
            featured: true,
            translations: [
                ("pt", "Camisa de Linho", "Camisa descontraída em linho português."),
                ("es", "Camisa de Lino", "Camisa holgada tejida en lino portugués."),
                ("fr", "Chemise en Lin", "Chemise ample tissée en lin portugais."),
            ],
        },
        Seed {
            sku: "ATL-SCARF-003",
            slug: "cashmere-scarf",
            name: "Cashmere Scarf",
            description: "Lightweight scarf, one size.",
            price: dec!(95.00),
            stock: 15,
            sizes: None,
            featured: false,
            translations: [
                ("pt", "Cachecol de Caxemira", "Cachecol leve, tamanho único."),
                ("es", "Bufanda de Cachemira", "Bufanda ligera, talla única."),
                ("fr", "Écharpe en Cachemire", "Écharpe légère, taille unique."),
            ],
        },
        Seed {
            sku: "ATL-BAG-007",
            slug: "leather-tote",
            name: "Leather Tote",
            description: "Vegetable-tanned leather tote with cotton lining.",
            price: dec!(310.00),
            stock: 3,
            sizes: None,
            featured: false,
            translations: [
                ("pt", "Saco de Couro", "Saco em couro curtido vegetal com forro de algodão."),
                ("es", "Bolso de Cuero", "Bolso de cuero curtido vegetal con forro de algodón."),
                ("fr", "Cabas en Cuir", "Cabas en cuir tanné végétal doublé de coton."),
            ],
        },
    ];

    seeds
        .into_iter()
        .map(|seed| CreateProductInput {
            sku: seed.sku.to_string(),
            slug: seed.slug.to_string(),
            name: seed.name.to_string(),
            description: Some(seed.description.to_string()),
            price: seed.price,
            stock_quantity: seed.stock,
            images: vec![
                format!("/images/{}-1.jpg", seed.slug),
                format!("/images/{}-2.jpg", seed.slug),
            ],
            sizes: seed
                .sizes
                .map(|sizes| sizes.iter().map(|s| s.to_string()).collect()),
            featured: seed.featured,
            is_active: true,
            translations: seed
                .translations
                .iter()
                .map(|(locale, name, description)| translation(locale, name, description))
                .collect(),
        })
        .collect()
}
