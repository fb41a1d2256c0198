mod common;

use assert_matches::assert_matches;
use atelier_api::{
    entities::{cart_item, order_item},
    errors::ServiceError,
    services::commerce::{AddToCartInput, OrderListQuery, PlaceOrderInput, CART_NOT_CLEARED},
};
use common::{order_input, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
};
use uuid::Uuid;

async fn add(app: &TestApp, user: Uuid, product_id: Uuid, quantity: i32, size: Option<&str>) {
    app.state
        .services
        .cart
        .add(
            user,
            AddToCartInput {
                product_id,
                quantity,
                size: size.map(str::to_string),
            },
        )
        .await
        .expect("add to cart");
}

async fn open_lines(app: &TestApp, user: Uuid) -> u64 {
    cart_item::Entity::find()
        .filter(cart_item::Column::UserId.eq(user))
        .count(app.db())
        .await
        .unwrap()
}

#[tokio::test]
async fn storefront_example_order() {
    let app = TestApp::new().await;
    let coat = app.seed_product("Wool Coat", dec!(450.00), 5, &["M", "L"]).await;
    let shirt = app.seed_product("Linen Shirt", dec!(120.00), 8, &[]).await;
    let user = Uuid::new_v4();
    add(&app, user, coat.id, 1, Some("L")).await;
    add(&app, user, shirt.id, 2, None).await;

    let placed = app
        .state
        .services
        .orders
        .place_order(user, order_input(), "en")
        .await
        .unwrap();
    let order = placed.order;

    assert!(placed.warnings.is_empty());
    assert_eq!(order.subtotal, dec!(690.00));
    assert_eq!(order.shipping, dec!(25.00));
    assert_eq!(order.total, dec!(715.00));
    assert_eq!(order.items.len(), 2);
    assert!(order.order_number.starts_with("AT-"));
    assert_eq!(order.shipping_address.city, "Lisboa");

    assert_eq!(app.stock_of(coat.id).await, 4);
    assert_eq!(app.stock_of(shirt.id).await, 6);
    assert_eq!(open_lines(&app, user).await, 0);

    let items_total: Decimal = order
        .items
        .iter()
        .map(|i| i.price_at_time * Decimal::from(i.quantity))
        .sum();
    assert_eq!(items_total + order.shipping, order.total);
}

#[tokio::test]
async fn empty_cart_creates_no_order() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .orders
        .place_order(Uuid::new_v4(), order_input(), "en")
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::EmptyCart);
    assert_eq!(app.order_count().await, 0);
}

#[tokio::test]
async fn stale_cart_lists_every_problem_and_writes_nothing() {
    let app = TestApp::new().await;
    let coat = app.seed_product("Wool Coat", dec!(450.00), 2, &[]).await;
    let scarf = app.seed_product("Cashmere Scarf", dec!(95.00), 5, &[]).await;
    let user = Uuid::new_v4();
    add(&app, user, coat.id, 2, None).await;
    add(&app, user, scarf.id, 1, None).await;

    app.deactivate(scarf.id).await;
    app.state
        .services
        .catalog
        .adjust_stock(coat.id, -1)
        .await
        .unwrap();

    let err = app
        .state
        .services
        .orders
        .place_order(user, order_input(), "en")
        .await
        .unwrap_err();

    let details = err.details().expect("validation details");
    assert_eq!(err.code(), "validation_failed");
    assert_eq!(details.len(), 2);
    assert!(details.iter().any(|d| d.contains("Cashmere Scarf")));
    assert!(details.iter().any(|d| d.contains("Wool Coat") && d.contains("only 1 left")));

    assert_eq!(app.order_count().await, 0);
    assert_eq!(app.stock_of(coat.id).await, 1);
    assert_eq!(open_lines(&app, user).await, 2);
}

#[tokio::test]
async fn demand_is_aggregated_across_sizes() {
    let app = TestApp::new().await;
    let shirt = app.seed_product("Linen Shirt", dec!(120.00), 3, &["S", "M"]).await;
    let user = Uuid::new_v4();
    add(&app, user, shirt.id, 2, Some("S")).await;
    add(&app, user, shirt.id, 2, Some("M")).await;

    let err = app
        .state
        .services
        .orders
        .place_order(user, order_input(), "en")
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationFailed(_));
    assert_eq!(app.stock_of(shirt.id).await, 3);
}

#[tokio::test]
async fn malformed_input_is_rejected_before_reading_the_cart() {
    let app = TestApp::new().await;
    let orders = &app.state.services.orders;

    let mut bad_country = order_input();
    bad_country.shipping_address.country = "Portugal".into();
    assert_matches!(
        orders.place_order(Uuid::new_v4(), bad_country, "en").await,
        Err(ServiceError::ValidationError(_))
    );

    let unsupported = PlaceOrderInput {
        payment_method: "cheque".into(),
        ..order_input()
    };
    assert_matches!(
        orders.place_order(Uuid::new_v4(), unsupported, "en").await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn price_is_frozen_at_checkout() {
    let app = TestApp::new().await;
    let coat = app.seed_product("Wool Coat", dec!(450.00), 3, &[]).await;
    let user = Uuid::new_v4();
    add(&app, user, coat.id, 1, None).await;

    let placed = app
        .state
        .services
        .orders
        .place_order(user, order_input(), "en")
        .await
        .unwrap();

    let mut active: atelier_api::entities::product::ActiveModel = coat.clone().into();
    active.price = sea_orm::Set(dec!(500.00));
    sea_orm::ActiveModelTrait::update(active, app.db()).await.unwrap();

    let fetched = app
        .state
        .services
        .orders
        .get_order(user, placed.order.id)
        .await
        .unwrap();
    assert_eq!(fetched.items[0].price_at_time, dec!(450.00));
    assert_eq!(fetched.total, dec!(475.00));

    let stored = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(placed.order.id))
        .count(app.db())
        .await
        .unwrap();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn orders_are_private_and_listed_newest_first() {
    let app = TestApp::new().await;
    let scarf = app.seed_product("Cashmere Scarf", dec!(95.00), 10, &[]).await;
    let user = Uuid::new_v4();
    let orders = &app.state.services.orders;

    add(&app, user, scarf.id, 1, None).await;
    let first = orders.place_order(user, order_input(), "en").await.unwrap();
    add(&app, user, scarf.id, 2, None).await;
    let second = orders.place_order(user, order_input(), "en").await.unwrap();

    let page = orders
        .list_orders(user, &OrderListQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].id, second.order.id);
    assert_eq!(page.items[1].id, first.order.id);
    assert_eq!(page.items[0].items[0].quantity, 2);

    let stranger = Uuid::new_v4();
    assert_matches!(
        orders.get_order(stranger, first.order.id).await,
        Err(ServiceError::OrderNotFound(_))
    );
    assert_eq!(
        orders
            .list_orders(stranger, &OrderListQuery::default())
            .await
            .unwrap()
            .total,
        0
    );

    let too_many = OrderListQuery {
        limit: Some(101),
        ..Default::default()
    };
    assert_matches!(
        orders.list_orders(user, &too_many).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn localized_product_names_are_snapshotted() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;
    let view = catalog
        .create_product(atelier_api::services::commerce::CreateProductInput {
            sku: "ATL-SHIRT-900".into(),
            slug: "linen-shirt-pt".into(),
            name: "Linen Shirt".into(),
            description: None,
            price: dec!(120.00),
            stock_quantity: 4,
            images: vec![],
            sizes: None,
            featured: false,
            is_active: true,
            translations: vec![atelier_api::services::commerce::TranslationInput {
                locale: "pt".into(),
                name: "Camisa de Linho".into(),
                description: None,
            }],
        })
        .await
        .unwrap();
    let user = Uuid::new_v4();
    add(&app, user, view.id, 1, None).await;

    let placed = app
        .state
        .services
        .orders
        .place_order(user, order_input(), "pt")
        .await
        .unwrap();

    assert_eq!(placed.order.locale, "pt");
    assert_eq!(placed.order.items[0].product_name, "Camisa de Linho");
}

#[tokio::test]
async fn sub_cent_prices_agree_across_lines_and_totals() {
    let app = TestApp::new().await;
    let belt = app.seed_product("Braided Belt", dec!(10.005), 4, &[]).await;
    let user = Uuid::new_v4();
    add(&app, user, belt.id, 2, None).await;

    let cart = app.state.services.cart.get(user, "en").await.unwrap();
    assert_eq!(cart.items[0].unit_price, dec!(10.01));
    assert_eq!(cart.items[0].line_total, dec!(20.02));
    assert_eq!(cart.summary.subtotal, dec!(20.02));

    let order = app
        .state
        .services
        .orders
        .place_order(user, order_input(), "en")
        .await
        .unwrap()
        .order;
    assert_eq!(order.subtotal, dec!(20.02));
    assert_eq!(order.total, dec!(45.02));
    assert_eq!(order.items[0].price_at_time, dec!(10.01));
    assert_eq!(order.items[0].line_total, dec!(20.02));

    let items_total: Decimal = order
        .items
        .iter()
        .map(|i| i.price_at_time * Decimal::from(i.quantity))
        .sum();
    assert_eq!(items_total + order.shipping, order.total);
}

#[tokio::test]
async fn lines_claimed_by_an_order_are_hidden_then_purged() {
    let app = TestApp::new().await;
    let cart = &app.state.services.cart;
    let scarf = app.seed_product("Cashmere Scarf", dec!(95.00), 5, &[]).await;
    let user = Uuid::new_v4();
    add(&app, user, scarf.id, 1, None).await;
    let line = cart.get(user, "en").await.unwrap().items[0].id;

    cart_item::Entity::update_many()
        .col_expr(cart_item::Column::OrderId, Expr::value(Some(Uuid::new_v4())))
        .filter(cart_item::Column::Id.eq(line))
        .exec(app.db())
        .await
        .unwrap();

    assert_matches!(
        cart.update_quantity(user, line, 2).await,
        Err(ServiceError::CartItemNotFound(_))
    );
    assert_matches!(cart.remove(user, line).await, Err(ServiceError::CartItemNotFound(_)));
    assert_eq!(open_lines(&app, user).await, 1);

    assert!(cart.get(user, "en").await.unwrap().items.is_empty());
    assert_eq!(open_lines(&app, user).await, 0);

    // a fresh add starts a new line rather than reviving the claimed one
    add(&app, user, scarf.id, 1, None).await;
    let view = cart.get(user, "en").await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_ne!(view.items[0].id, line);
}

#[tokio::test]
async fn order_stands_when_cart_lines_cannot_be_deleted() {
    let app = TestApp::new().await;
    let coat = app.seed_product("Wool Coat", dec!(450.00), 3, &[]).await;
    let user = Uuid::new_v4();
    add(&app, user, coat.id, 1, None).await;

    app.db()
        .execute_unprepared(
            "CREATE TRIGGER keep_claimed_lines BEFORE DELETE ON cart_items \
             WHEN OLD.order_id IS NOT NULL BEGIN SELECT RAISE(ABORT, 'locked'); END;",
        )
        .await
        .unwrap();

    let placed = app
        .state
        .services
        .orders
        .place_order(user, order_input(), "en")
        .await
        .unwrap();
    assert_eq!(placed.warnings, vec![CART_NOT_CLEARED.to_string()]);
    assert_eq!(app.order_count().await, 1);
    assert_eq!(app.stock_of(coat.id).await, 2);

    // the claimed line stays stored until the next cart read
    assert_eq!(open_lines(&app, user).await, 1);
    app.db()
        .execute_unprepared("DROP TRIGGER keep_claimed_lines;")
        .await
        .unwrap();
    assert!(app.state.services.cart.get(user, "en").await.unwrap().items.is_empty());
    assert_eq!(open_lines(&app, user).await, 0);
}
