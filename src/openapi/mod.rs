use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Atelier Storefront API",
        version = "0.1.0",
        description = r#"
Catalog, cart and checkout API for the Atelier storefront.

## Authentication

Cart, order and admin endpoints take a bearer JWT:

```
Authorization: Bearer <token>
```

## Envelope

Every response body has the shape
`{ "success": bool, "data"?: ..., "error"?: { "code", "message", "details"? }, "message"?: string }`.

## Localization

Catalog text is served in the locale given by `?lang=`, else the best
supported `Accept-Language` entry, else the store default.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Catalog", description = "Public product catalog"),
        (name = "Cart", description = "Shopping cart of the signed-in customer"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Admin", description = "Back-office catalog maintenance"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::cart::get_cart,
        crate::handlers::cart::add_to_cart,
        crate::handlers::cart::update_cart_item,
        crate::handlers::cart::remove_cart_item,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::place_order,
        crate::handlers::admin::create_product,
        crate::handlers::admin::adjust_stock,
        crate::health::liveness_check,
        crate::health::readiness_check,
    ),
    components(
        schemas(
            crate::errors::ErrorBody,
            crate::entities::order::OrderStatus,
            crate::services::commerce::ProductView,
            crate::services::commerce::ProductPage,
            crate::services::commerce::CreateProductInput,
            crate::services::commerce::TranslationInput,
            crate::services::commerce::AddToCartInput,
            crate::services::commerce::UpdateCartItemInput,
            crate::services::commerce::CartItemView,
            crate::services::commerce::CartLineView,
            crate::services::commerce::CartSummary,
            crate::services::commerce::CartView,
            crate::services::commerce::ShippingAddress,
            crate::services::commerce::PlaceOrderInput,
            crate::services::commerce::OrderItemView,
            crate::services::commerce::OrderView,
            crate::services::commerce::OrderPage,
            crate::handlers::admin::StockAdjustmentRequest,
            crate::health::HealthInfo,
            crate::health::HealthStatus,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
