//! Discount detection heuristics.
//!
//! Three independent signals, each a pure function returning the same
//! shape, tried in priority order: an explicit sale price beats a drop
//! inferred from the ledger, which beats subscription savings. The serving
//! layer collapses whichever fires first into a single "discount" marker —
//! none of this feeds the recommendation score.

use serde::Serialize;

use crate::models::{LedgerEntry, Variant};

/// Discounts below this percentage are noise, not deals.
const MIN_DISCOUNT_PERCENT: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Sale,
    PriceDrop,
    Subscription,
}

#[derive(Debug, Clone, Serialize)]
pub struct Discount {
    pub percentage: i64,
    pub old_price: f64,
    pub new_price: f64,
    pub kind: DiscountKind,
}

/// Explicit sale: the shop lists an original price above the current one.
pub fn sale_discount(variant: &Variant) -> Option<Discount> {
    let current = variant.current_price.filter(|p| *p > 0.0)?;
    let original = variant.original_price?;
    if original <= current {
        return None;
    }
    at_threshold(Discount {
        percentage: percent(original, current),
        old_price: original,
        new_price: current,
        kind: DiscountKind::Sale,
    })
}

/// Historical drop: the oldest retained ledger observation was more
/// expensive than the current price. `history` is expected most recent
/// first, as the ledger queries return it.
pub fn history_discount(variant: &Variant, history: &[LedgerEntry]) -> Option<Discount> {
    let current = variant.current_price.filter(|p| *p > 0.0)?;
    if history.len() < 2 {
        return None;
    }
    let oldest = history.last()?;
    if oldest.price <= current {
        return None;
    }
    at_threshold(Discount {
        percentage: percent(oldest.price, current),
        old_price: oldest.price,
        new_price: current,
        kind: DiscountKind::PriceDrop,
    })
}

/// Subscription savings relative to the list price.
pub fn subscription_discount(variant: &Variant) -> Option<Discount> {
    let current = variant.current_price.filter(|p| *p > 0.0)?;
    let sub = variant.current_subscription_price?;
    if sub >= current {
        return None;
    }
    at_threshold(Discount {
        percentage: percent(current, sub),
        old_price: current,
        new_price: sub,
        kind: DiscountKind::Subscription,
    })
}

/// The combined heuristic, in priority order.
pub fn compute_discount(variant: &Variant, history: &[LedgerEntry]) -> Option<Discount> {
    sale_discount(variant)
        .or_else(|| history_discount(variant, history))
        .or_else(|| subscription_discount(variant))
}

fn percent(old: f64, new: f64) -> i64 {
    ((old - new) / old * 100.0).round() as i64
}

fn at_threshold(discount: Discount) -> Option<Discount> {
    (discount.percentage >= MIN_DISCOUNT_PERCENT).then_some(discount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(current: Option<f64>, original: Option<f64>, sub: Option<f64>) -> Variant {
        Variant {
            id: 1,
            product_id: 1,
            weight_grams: 250,
            grind: String::new(),
            label: None,
            current_price: current,
            original_price: original,
            current_subscription_price: sub,
            price_per_100g: None,
            in_stock: true,
            sku: None,
        }
    }

    fn entry(price: f64, observed_at: i64) -> LedgerEntry {
        LedgerEntry {
            id: 0,
            variant_id: 1,
            price,
            subscription_price: None,
            price_per_100g: None,
            observed_at,
        }
    }

    #[test]
    fn test_sale_discount() {
        let d = sale_discount(&variant(Some(15.0), Some(20.0), None)).unwrap();
        assert_eq!(d.kind, DiscountKind::Sale);
        assert_eq!(d.percentage, 25);
        assert_eq!(d.old_price, 20.0);
        assert_eq!(d.new_price, 15.0);
    }

    #[test]
    fn test_sale_below_threshold() {
        // 2% off: ignored
        assert!(sale_discount(&variant(Some(98.0), Some(100.0), None)).is_none());
    }

    #[test]
    fn test_history_discount_uses_oldest() {
        let history = vec![entry(15.0, 300), entry(18.0, 200), entry(20.0, 100)];
        let d = history_discount(&variant(Some(15.0), None, None), &history).unwrap();
        assert_eq!(d.kind, DiscountKind::PriceDrop);
        assert_eq!(d.old_price, 20.0);
        assert_eq!(d.percentage, 25);
    }

    #[test]
    fn test_history_needs_two_observations() {
        let history = vec![entry(20.0, 100)];
        assert!(history_discount(&variant(Some(15.0), None, None), &history).is_none());
    }

    #[test]
    fn test_subscription_discount() {
        let d = subscription_discount(&variant(Some(12.0), None, Some(10.0))).unwrap();
        assert_eq!(d.kind, DiscountKind::Subscription);
        assert_eq!(d.percentage, 17);
    }

    #[test]
    fn test_priority_order() {
        // Sale wins over history and subscription
        let history = vec![entry(15.0, 300), entry(30.0, 100)];
        let v = variant(Some(15.0), Some(20.0), Some(10.0));
        assert_eq!(compute_discount(&v, &history).unwrap().kind, DiscountKind::Sale);

        // Without a sale price, history wins over subscription
        let v = variant(Some(15.0), None, Some(10.0));
        assert_eq!(
            compute_discount(&v, &history).unwrap().kind,
            DiscountKind::PriceDrop
        );

        // With neither, subscription fires
        let v = variant(Some(15.0), None, Some(10.0));
        assert_eq!(
            compute_discount(&v, &[]).unwrap().kind,
            DiscountKind::Subscription
        );
    }

    #[test]
    fn test_no_discount() {
        assert!(compute_discount(&variant(Some(15.0), None, None), &[]).is_none());
        assert!(compute_discount(&variant(None, Some(20.0), Some(10.0)), &[]).is_none());
    }
}
