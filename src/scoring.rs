//! The recommendation score calculator.
//!
//! Combines eight per-factor scores into one weighted 0–100 score per
//! product. Factors without data drop out of the weighting: the remaining
//! weights are renormalized so a sparsely observed product is not punished
//! for missing data, and the fraction of configured weight that was actually
//! backed by data is reported as the result's confidence.
//!
//! Scoring is read-only and never fails: missing variants or empty context
//! produce a zero-score placeholder, not an error.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::config::ScoringConfig;
use crate::models::{Product, Rating, Review, Variant};
use crate::normalize;
use crate::tiers;
use crate::models::Badge;

/// Per-product context assembled by the caller from persisted state.
#[derive(Debug, Clone, Default)]
pub struct ScoreContext {
    pub variants: Vec<Variant>,
    pub rating: Option<Rating>,
    pub badges: Vec<Badge>,
    pub review: Option<Review>,
    /// Unit prices (per 100g) of the comparison set for the price-value
    /// percentile. The caller decides the scope (whole catalog or one tier).
    pub prices_in_tier: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorBreakdown {
    pub score: i64,
    /// Renormalized weight as an integer percent.
    pub weight: i64,
    pub contribution: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestVariant {
    pub id: i64,
    pub weight_grams: i64,
    pub price: Option<f64>,
    pub subscription_price: Option<f64>,
    pub price_per_100g: Option<f64>,
    pub in_stock: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub product_id: i64,
    pub name: String,
    pub shop_slug: String,
    pub shop_name: String,
    pub url: String,
    pub image_url: Option<String>,
    pub score: i64,
    /// Fraction of configured weight backed by data, in (0, 1].
    pub confidence: f64,
    pub price_tier: String,
    pub price_tier_key: Option<String>,
    pub breakdown: BTreeMap<String, FactorBreakdown>,
    pub best_variant: Option<BestVariant>,
    pub origin_country: Option<String>,
    pub process: Option<String>,
    pub roast_level: Option<String>,
    pub tasting_notes: Option<String>,
}

/// Calculator bound to one validated scoring configuration. Multiple
/// instances with different configurations can coexist.
pub struct ScoreCalculator {
    scoring: ScoringConfig,
}

impl ScoreCalculator {
    pub fn new(scoring: &ScoringConfig) -> Self {
        Self {
            scoring: scoring.clone(),
        }
    }

    pub fn score(&self, product: &Product, context: &ScoreContext) -> ScoreResult {
        let best = match select_best_variant(&context.variants) {
            Some(v) => v,
            None => return empty_result(product),
        };

        let tier = tiers::price_tier(best.price_per_100g, &self.scoring.price_tiers);
        let now = chrono::Utc::now().timestamp();
        let weights = &self.scoring.weights;

        let factors: [(&'static str, Option<f64>, f64); 8] = [
            (
                "price_value",
                tiers::price_value_score(best.price_per_100g, &context.prices_in_tier),
                weights.price_value,
            ),
            (
                "rating",
                context
                    .rating
                    .as_ref()
                    .and_then(|r| normalize::rating_score(r.average_rating, r.scale)),
                weights.rating,
            ),
            (
                "origin_quality",
                tiers::origin_score(
                    product.origin_country.as_deref(),
                    &self.scoring.origin_tiers,
                ),
                weights.origin_quality,
            ),
            (
                "review_score",
                normalize::review_score(context.review.as_ref().and_then(|r| r.cupping_score)),
                weights.review_score,
            ),
            (
                "freshness",
                normalize::freshness_score(
                    product.first_seen_at,
                    self.scoring.freshness_window_days,
                    now,
                ),
                weights.freshness,
            ),
            (
                "awards",
                Some(normalize::awards_score(&context.badges)),
                weights.awards,
            ),
            (
                "subscription_savings",
                normalize::subscription_savings_score(
                    best.current_price,
                    best.current_subscription_price,
                ),
                weights.subscription_savings,
            ),
            (
                "special_badges",
                Some(normalize::special_badges_score(&context.badges)),
                weights.special_badges,
            ),
        ];

        let total_available_weight: f64 = factors
            .iter()
            .filter(|(_, score, _)| score.is_some())
            .map(|(_, _, weight)| weight)
            .sum();

        let mut total_score = 0.0;
        let mut breakdown = BTreeMap::new();

        if total_available_weight > 0.0 {
            for (name, score, weight) in &factors {
                let Some(score) = score else { continue };
                let normalized_weight = weight / total_available_weight;
                let contribution = score * normalized_weight;
                total_score += contribution;
                breakdown.insert(
                    name.to_string(),
                    FactorBreakdown {
                        score: score.round() as i64,
                        weight: (normalized_weight * 100.0).round() as i64,
                        contribution: contribution.round() as i64,
                    },
                );
            }
        }

        ScoreResult {
            product_id: product.id,
            name: product.name.clone(),
            shop_slug: product.shop_slug.clone(),
            shop_name: product.shop_name.clone(),
            url: product.url.clone(),
            image_url: product.image_url.clone(),
            score: total_score.round() as i64,
            confidence: (total_available_weight * 100.0).round() / 100.0,
            price_tier: tier
                .as_ref()
                .map(|t| t.label.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            price_tier_key: tier.map(|t| t.key.to_string()),
            breakdown,
            best_variant: Some(BestVariant {
                id: best.id,
                weight_grams: best.weight_grams,
                price: best.current_price,
                subscription_price: best.current_subscription_price,
                price_per_100g: best.price_per_100g,
                in_stock: best.in_stock,
            }),
            origin_country: product.origin_country.clone(),
            process: product.process.clone(),
            roast_level: product.roast_level.clone(),
            tasting_notes: product.tasting_notes.clone(),
        }
    }

    /// Score a catalog, highest first. Zero-score results (no variants, no
    /// available factors) are excluded. Products without context score
    /// against an empty context rather than erroring.
    pub fn score_all(
        &self,
        products: &[Product],
        context_by_product: &HashMap<i64, ScoreContext>,
    ) -> Vec<ScoreResult> {
        let empty = ScoreContext::default();
        let mut results: Vec<ScoreResult> = products
            .iter()
            .map(|p| self.score(p, context_by_product.get(&p.id).unwrap_or(&empty)))
            .filter(|r| r.score > 0)
            .collect();

        results.sort_by(|a, b| b.score.cmp(&a.score));
        results
    }
}

/// Prefer in-stock variants; within the pool, take the lowest unit price.
/// A variant with a known unit price beats one without; the first
/// encountered wins ties.
fn select_best_variant(variants: &[Variant]) -> Option<&Variant> {
    if variants.is_empty() {
        return None;
    }

    let in_stock: Vec<&Variant> = variants.iter().filter(|v| v.in_stock).collect();
    let pool: Vec<&Variant> = if in_stock.is_empty() {
        variants.iter().collect()
    } else {
        in_stock
    };

    let mut best: Option<&Variant> = None;
    for variant in pool {
        match best {
            None => best = Some(variant),
            Some(current) => {
                if let Some(price) = variant.price_per_100g {
                    if current.price_per_100g.map_or(true, |cur| price < cur) {
                        best = Some(variant);
                    }
                }
            }
        }
    }
    best
}

fn empty_result(product: &Product) -> ScoreResult {
    ScoreResult {
        product_id: product.id,
        name: product.name.clone(),
        shop_slug: product.shop_slug.clone(),
        shop_name: product.shop_name.clone(),
        url: product.url.clone(),
        image_url: product.image_url.clone(),
        score: 0,
        confidence: 0.0,
        price_tier: "Unknown".to_string(),
        price_tier_key: None,
        breakdown: BTreeMap::new(),
        best_variant: None,
        origin_country: product.origin_country.clone(),
        process: product.process.clone(),
        roast_level: product.roast_level.clone(),
        tasting_notes: product.tasting_notes.clone(),
    }
}

/// Optional post-processing over ranked results: cap each shop's
/// contribution, walking the list in rounds so every shop's next-best
/// result gets a slot before any shop's one-after-next. Within a shop the
/// original ordering is preserved; nothing is re-scored.
pub fn diversify_by_shop(results: &[ScoreResult], per_shop: usize) -> Vec<ScoreResult> {
    if per_shop == 0 {
        return Vec::new();
    }

    let mut shop_order: Vec<&str> = Vec::new();
    let mut by_shop: HashMap<&str, Vec<&ScoreResult>> = HashMap::new();
    for result in results {
        let slug = result.shop_slug.as_str();
        if !by_shop.contains_key(slug) {
            shop_order.push(slug);
        }
        by_shop.entry(slug).or_default().push(result);
    }

    let mut diversified = Vec::new();
    for round in 0..per_shop {
        for slug in &shop_order {
            if let Some(result) = by_shop[slug].get(round) {
                diversified.push((*result).clone());
            }
        }
    }
    diversified
}
