//! Order arithmetic shared by the cart summary and checkout.
//!
//! Every amount that leaves this module is rounded to two decimal places,
//! half away from zero, and carries scale 2. Unit prices are rounded to
//! cents before they are multiplied, so a line total is always the charged
//! unit price times the quantity.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Quantity ceiling for a single cart line
pub const MAX_LINE_QUANTITY: i32 = 99;

/// Rounds to cents, half away from zero.
pub fn money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    money(money(unit_price) * Decimal::from(quantity))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    #[schema(value_type = String, example = "690.00")]
    pub subtotal: Decimal,
    #[schema(value_type = String, example = "25.00")]
    pub shipping: Decimal,
    #[schema(value_type = String, example = "715.00")]
    pub total: Decimal,
}

impl OrderTotals {
    /// Sum of line totals, before shipping
    pub fn raw_subtotal(lines: &[PricedLine]) -> Decimal {
        lines
            .iter()
            .map(|line| line_total(line.unit_price, line.quantity))
            .sum()
    }

    pub fn compute(lines: &[PricedLine], shipping: Decimal) -> Self {
        let subtotal = money(Self::raw_subtotal(lines));
        let shipping = money(shipping);
        Self {
            subtotal,
            shipping,
            total: money(subtotal + shipping),
        }
    }

    pub fn zero() -> Self {
        Self::compute(&[], Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn storefront_example_totals() {
        let lines = [
            PricedLine {
                unit_price: dec!(450.00),
                quantity: 1,
            },
            PricedLine {
                unit_price: dec!(120.00),
                quantity: 2,
            },
        ];
        let totals = OrderTotals::compute(&lines, dec!(25.00));

        assert_eq!(totals.subtotal, dec!(690.00));
        assert_eq!(totals.shipping, dec!(25.00));
        assert_eq!(totals.total, dec!(715.00));
        assert_eq!(totals.total.to_string(), "715.00");
    }

    #[test]
    fn sub_cent_unit_prices_are_charged_in_cents() {
        let lines = [PricedLine {
            unit_price: dec!(10.005),
            quantity: 2,
        }];
        let totals = OrderTotals::compute(&lines, dec!(25.00));

        assert_eq!(line_total(dec!(10.005), 2), dec!(20.02));
        assert_eq!(totals.subtotal, money(dec!(10.005)) * Decimal::from(2));
        assert_eq!(totals.total, dec!(45.02));
    }

    #[test]
    fn midpoint_rounds_away_from_zero() {
        assert_eq!(money(dec!(2.345)), dec!(2.35));
        assert_eq!(money(dec!(2.344)), dec!(2.34));
        assert_eq!(money(dec!(-2.345)), dec!(-2.35));
        assert_eq!(money(dec!(0.125)).to_string(), "0.13");
    }

    #[test]
    fn money_pads_scale() {
        assert_eq!(money(dec!(690)).to_string(), "690.00");
        assert_eq!(line_total(dec!(19.999), 1).to_string(), "20.00");
    }

    #[test]
    fn empty_cart_is_all_zero() {
        let totals = OrderTotals::zero();
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total.to_string(), "0.00");
    }
}
