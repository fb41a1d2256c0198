//! Property-based tests for storefront arithmetic and request parsing.

use atelier_api::{
    handlers::common::resolve_locale,
    services::commerce::{line_total, money, OrderTotals, PricedLine, MAX_LINE_QUANTITY},
};
use proptest::prelude::*;
use rstest::rstest;
use rust_decimal::Decimal;

// Prices between 0.01 and 99999.99, in cents
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn line_strategy() -> impl Strategy<Value = PricedLine> {
    (price_strategy(), 1..=MAX_LINE_QUANTITY)
        .prop_map(|(unit_price, quantity)| PricedLine { unit_price, quantity })
}

fn supported() -> Vec<String> {
    ["en", "pt", "es", "fr"].iter().map(|s| s.to_string()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn total_is_subtotal_plus_shipping(
        lines in prop::collection::vec(line_strategy(), 0..8),
        shipping in prop_oneof![Just(Decimal::ZERO), price_strategy()],
    ) {
        let totals = OrderTotals::compute(&lines, shipping);
        prop_assert_eq!(totals.total, totals.subtotal + totals.shipping);
        prop_assert_eq!(totals.subtotal.scale(), 2);
        prop_assert_eq!(totals.shipping.scale(), 2);
        prop_assert_eq!(totals.total.scale(), 2);
    }

    #[test]
    fn subtotal_of_whole_cent_prices_is_the_sum_of_line_totals(
        lines in prop::collection::vec(line_strategy(), 1..8),
    ) {
        let totals = OrderTotals::compute(&lines, Decimal::ZERO);
        let summed: Decimal = lines
            .iter()
            .map(|line| line_total(line.unit_price, line.quantity))
            .sum();
        prop_assert_eq!(totals.subtotal, summed);
    }

    #[test]
    fn money_rounds_to_the_nearest_cent(mills in -10_000_000i64..10_000_000) {
        let amount = Decimal::new(mills, 3);
        let rounded = money(amount);
        prop_assert_eq!(rounded.scale(), 2);
        prop_assert!((rounded - amount).abs() <= Decimal::new(5, 3));
    }

    #[test]
    fn resolved_locale_is_always_supported(
        lang in prop::option::of("[a-zA-Z]{2}(-[A-Z]{2})?"),
        header in prop::option::of("[a-z]{2}(;q=0\\.[0-9])?(, ?[a-z]{2}(;q=0\\.[0-9])?){0,3}"),
    ) {
        let locale = resolve_locale(lang.as_deref(), header.as_deref(), &supported(), "en");
        prop_assert!(supported().contains(&locale), "unexpected locale {}", locale);
    }
}

#[rstest]
#[case("450.00", 1, "450.00")]
#[case("0.125", 1, "0.13")]
#[case("0.135", 1, "0.14")]
#[case("-0.125", 1, "-0.13")]
#[case("19.99", 3, "59.97")]
fn line_totals_round_half_away_from_zero(
    #[case] unit_price: &str,
    #[case] quantity: i32,
    #[case] expected: &str,
) {
    let unit_price: Decimal = unit_price.parse().unwrap();
    assert_eq!(line_total(unit_price, quantity).to_string(), expected);
}

#[rstest]
#[case(Some("pt"), None, "pt")]
#[case(Some("pt-BR"), Some("fr"), "pt")]
#[case(Some("de"), Some("es;q=0.8, fr"), "fr")]
#[case(None, Some("de, es;q=0.5"), "es")]
#[case(None, Some("de"), "en")]
#[case(None, None, "en")]
fn locale_precedence(
    #[case] lang: Option<&str>,
    #[case] header: Option<&str>,
    #[case] expected: &str,
) {
    assert_eq!(resolve_locale(lang, header, &supported(), "en"), expected);
}
