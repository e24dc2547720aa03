//! Price and origin tier classifiers.

use std::collections::BTreeMap;

use crate::config::{OriginTier, PriceTiers};

/// A resolved price tier: the configured band plus its stable key.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTier {
    pub key: &'static str,
    pub label: String,
    pub max_per_kg: f64,
}

/// Classify a unit price (per 100g) into one of the four configured bands.
/// A boundary value belongs to the cheaper band.
pub fn price_tier(price_per_100g: Option<f64>, tiers: &PriceTiers) -> Option<PriceTier> {
    let per_kg = price_per_100g? * 10.0;

    let (key, band) = if per_kg <= tiers.budget.max_per_kg {
        ("budget", &tiers.budget)
    } else if per_kg <= tiers.mid_range.max_per_kg {
        ("mid_range", &tiers.mid_range)
    } else if per_kg <= tiers.premium.max_per_kg {
        ("premium", &tiers.premium)
    } else {
        ("ultra_premium", &tiers.ultra_premium)
    };

    Some(PriceTier {
        key,
        label: band.label.clone(),
        max_per_kg: band.max_per_kg,
    })
}

/// Inverse percentile rank of the unit price within a comparison set:
/// the cheapest price scores 100, the most expensive 0. `None` when the
/// comparison set is empty or the price is unknown.
pub fn price_value_score(price_per_100g: Option<f64>, comparison: &[f64]) -> Option<f64> {
    let price = price_per_100g?;
    if comparison.is_empty() {
        return None;
    }

    let mut sorted = comparison.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = sorted
        .iter()
        .position(|p| *p >= price)
        .unwrap_or(sorted.len());
    let percentile = rank as f64 / sorted.len() as f64;

    Some(((1.0 - percentile) * 100.0).round())
}

/// Origin quality lookup: case-insensitive exact match against the
/// configured country lists. An unrecognized-but-present country gets the
/// middle-tier default; an absent country is unavailable.
pub fn origin_score(country: Option<&str>, tiers: &BTreeMap<String, OriginTier>) -> Option<f64> {
    let country = country?.trim();
    if country.is_empty() {
        return None;
    }
    let normalized = country.to_lowercase();

    for tier in tiers.values() {
        if tier
            .countries
            .iter()
            .any(|c| c.to_lowercase() == normalized)
        {
            return Some(tier.score);
        }
    }

    Some(55.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PriceTierBand;

    fn tiers() -> PriceTiers {
        PriceTiers {
            budget: PriceTierBand {
                max_per_kg: 15.0,
                label: "Budget".to_string(),
            },
            mid_range: PriceTierBand {
                max_per_kg: 30.0,
                label: "Mid-range".to_string(),
            },
            premium: PriceTierBand {
                max_per_kg: 50.0,
                label: "Premium".to_string(),
            },
            ultra_premium: PriceTierBand {
                max_per_kg: 999.0,
                label: "Ultra-premium".to_string(),
            },
        }
    }

    #[test]
    fn test_price_tier_bands() {
        let t = tiers();
        assert_eq!(price_tier(Some(1.0), &t).unwrap().key, "budget");
        assert_eq!(price_tier(Some(2.5), &t).unwrap().key, "mid_range");
        assert_eq!(price_tier(Some(4.8), &t).unwrap().key, "premium");
        assert_eq!(price_tier(Some(12.0), &t).unwrap().key, "ultra_premium");
        assert_eq!(price_tier(None, &t), None);
    }

    #[test]
    fn test_boundary_belongs_to_cheaper_band() {
        let t = tiers();
        // 1.5 €/100g = exactly 15 €/kg: budget, not mid-range
        assert_eq!(price_tier(Some(1.5), &t).unwrap().key, "budget");
        assert_eq!(price_tier(Some(3.0), &t).unwrap().key, "mid_range");
        assert_eq!(price_tier(Some(5.0), &t).unwrap().key, "premium");
    }

    #[test]
    fn test_price_value_score() {
        let prices = [3.0, 4.0, 6.0, 8.0];
        // Cheapest of the set
        assert_eq!(price_value_score(Some(3.0), &prices), Some(100.0));
        // Second cheapest: rank 1/4
        assert_eq!(price_value_score(Some(4.0), &prices), Some(75.0));
        // More expensive than everything
        assert_eq!(price_value_score(Some(10.0), &prices), Some(0.0));
        assert_eq!(price_value_score(Some(4.0), &[]), None);
        assert_eq!(price_value_score(None, &prices), None);
    }

    fn origin_tiers() -> BTreeMap<String, OriginTier> {
        let mut map = BTreeMap::new();
        map.insert(
            "S".to_string(),
            OriginTier {
                score: 100.0,
                countries: vec!["Ethiopia".to_string(), "Kenya".to_string()],
            },
        );
        map.insert(
            "D".to_string(),
            OriginTier {
                score: 40.0,
                countries: vec!["Vietnam".to_string()],
            },
        );
        map
    }

    #[test]
    fn test_origin_score_matches_case_insensitively() {
        let tiers = origin_tiers();
        assert_eq!(origin_score(Some("Ethiopia"), &tiers), Some(100.0));
        assert_eq!(origin_score(Some("ethiopia"), &tiers), Some(100.0));
        assert_eq!(origin_score(Some("  KENYA "), &tiers), Some(100.0));
        assert_eq!(origin_score(Some("Vietnam"), &tiers), Some(40.0));
    }

    #[test]
    fn test_origin_score_defaults() {
        let tiers = origin_tiers();
        // Present but unrecognized country: middle-tier default
        assert_eq!(origin_score(Some("Atlantis"), &tiers), Some(55.0));
        // Absent country: unavailable
        assert_eq!(origin_score(None, &tiers), None);
        assert_eq!(origin_score(Some("  "), &tiers), None);
    }
}
