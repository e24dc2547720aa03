//! Normalizers: raw observed quantities → 0–100 comparable scores.
//!
//! Every function returns `Option<f64>` (or a plain `f64` where the factor
//! is always available) so the score calculator can tell "scored zero" apart
//! from "no data" — an unavailable factor drops out of the weighting instead
//! of dragging the total down.

use crate::models::Badge;

/// `(average / scale) * 100`, clamped to [0, 100].
pub fn rating_score(average_rating: f64, scale: f64) -> Option<f64> {
    if scale <= 0.0 {
        return None;
    }
    Some((average_rating / scale * 100.0).clamp(0.0, 100.0))
}

/// Linear decay from 100 at first sighting to 0 at the window edge.
pub fn freshness_score(first_seen_at: Option<i64>, window_days: i64, now: i64) -> Option<f64> {
    let first_seen = first_seen_at?;
    let age_days = (now - first_seen) / 86_400;
    if age_days < 0 {
        return None;
    }
    if age_days <= window_days {
        Some(((1.0 - age_days as f64 / window_days as f64) * 100.0).round())
    } else {
        Some(0.0)
    }
}

/// Savings percent scaled by 5 and capped, so a 20% subscription discount
/// already maxes the factor. Zero when the subscription price saves nothing.
pub fn subscription_savings_score(price: Option<f64>, subscription_price: Option<f64>) -> Option<f64> {
    let price = price.filter(|p| *p > 0.0)?;
    let sub = subscription_price.filter(|s| *s > 0.0)?;
    if sub >= price {
        return Some(0.0);
    }
    let savings_percent = (price - sub) / price * 100.0;
    Some((savings_percent * 5.0).round().min(100.0))
}

/// Weighted sum of badge-type scores, capped at 100. Zero (not absent)
/// when the product carries no badges.
pub fn special_badges_score(badges: &[Badge]) -> f64 {
    let mut score: f64 = 0.0;
    for badge in badges {
        score += match badge.badge_type.as_str() {
            "limited" => 40.0,
            "price_friendly" => 30.0,
            "new" => 20.0,
            "award" => 50.0,
            _ => 0.0,
        };
    }
    score.min(100.0)
}

/// All-or-nothing: any award badge maxes the factor.
pub fn awards_score(badges: &[Badge]) -> f64 {
    if badges.iter().any(|b| b.badge_type == "award") {
        100.0
    } else {
        0.0
    }
}

/// SCA-style cupping scores are already on a 0–100 scale; just clamp.
pub fn review_score(cupping_score: Option<f64>) -> Option<f64> {
    cupping_score.map(|s| s.clamp(0.0, 100.0))
}
