// Storefront services
pub mod commerce;
