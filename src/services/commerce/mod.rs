/// Storefront services: catalog, cart and checkout
pub mod cart_service;
pub mod order_service;
pub mod pricing_service;
pub mod product_catalog_service;
pub mod shipping_service;

pub use cart_service::{
    AddToCartInput, CartItemView, CartLineView, CartService, CartSummary, CartView,
    UpdateCartItemInput,
};
pub use order_service::{
    OrderItemView, OrderListQuery, OrderPage, OrderService, OrderView, PlaceOrderInput,
    PlacedOrder, ShippingAddress, CART_NOT_CLEARED,
};
pub use pricing_service::{line_total, money, OrderTotals, PricedLine, MAX_LINE_QUANTITY};
pub use product_catalog_service::{
    CreateProductInput, ProductCatalogService, ProductListFilter, ProductPage, ProductView,
    TranslationInput,
};
pub use shipping_service::{FlatRateShipping, ShippingRates};
