//! Recommendation serving: context assembly and ranked output.
//!
//! Builds one [`ScoreContext`] per active product from persisted state
//! (batched lookups, no per-product query loops), runs the calculator, and
//! prints or serializes the ranked results.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::catalog;
use crate::config::Config;
use crate::db;
use crate::discount;
use crate::flavor;
use crate::ledger;
use crate::models::Product;
use crate::price::{format_price, format_price_per_100g};
use crate::scoring::{diversify_by_shop, ScoreCalculator, ScoreContext, ScoreResult};

/// Assemble scoring context for the given products. The price comparison
/// set is the whole catalog's unit prices.
pub async fn build_contexts(
    pool: &SqlitePool,
    products: &[Product],
) -> Result<HashMap<i64, ScoreContext>> {
    let product_ids: Vec<i64> = products.iter().map(|p| p.id).collect();

    let all_variants = catalog::find_variants_for_products(pool, &product_ids).await?;
    let latest_ratings = catalog::find_latest_ratings(pool, &product_ids).await?;
    let all_badges = catalog::find_badges_for_products(pool, &product_ids).await?;
    let latest_reviews = catalog::find_latest_reviews(pool, &product_ids).await?;

    let all_prices: Vec<f64> = all_variants
        .iter()
        .filter_map(|v| v.price_per_100g)
        .collect();

    let mut contexts: HashMap<i64, ScoreContext> = product_ids
        .iter()
        .map(|id| {
            (
                *id,
                ScoreContext {
                    prices_in_tier: all_prices.clone(),
                    ..Default::default()
                },
            )
        })
        .collect();

    for variant in all_variants {
        if let Some(ctx) = contexts.get_mut(&variant.product_id) {
            ctx.variants.push(variant);
        }
    }
    for rating in latest_ratings {
        if let Some(ctx) = contexts.get_mut(&rating.product_id) {
            ctx.rating = Some(rating);
        }
    }
    for badge in all_badges {
        if let Some(ctx) = contexts.get_mut(&badge.product_id) {
            ctx.badges.push(badge);
        }
    }
    for review in latest_reviews {
        if let Some(ctx) = contexts.get_mut(&review.product_id) {
            ctx.review = Some(review);
        }
    }

    Ok(contexts)
}

/// CLI entry point for `crema recommend`.
#[allow(clippy::too_many_arguments)]
pub async fn run_recommend(
    config: &Config,
    top: usize,
    tier: Option<String>,
    budget: Option<f64>,
    flavor_filter: Option<String>,
    per_shop: Option<usize>,
    json: bool,
) -> Result<()> {
    let pool = db::connect(config).await?;

    let mut products = catalog::find_active_products(&pool).await?;
    if let Some(ref f) = flavor_filter {
        products.retain(|p| flavor::matches_flavor(p, Some(f.as_str())));
    }

    let contexts = build_contexts(&pool, &products).await?;
    let calculator = ScoreCalculator::new(&config.scoring);

    let mut scored = calculator.score_all(&products, &contexts);

    if let Some(ref tier_key) = tier {
        scored.retain(|r| r.price_tier_key.as_deref() == Some(tier_key.as_str()));
    }

    if let Some(max_budget) = budget {
        scored.retain(|r| {
            r.best_variant
                .as_ref()
                .and_then(|v| v.price_per_100g)
                .is_some_and(|p| p <= max_budget)
        });
    }

    if let Some(cap) = per_shop {
        scored = diversify_by_shop(&scored, cap);
    }

    scored.truncate(top);

    if json {
        println!("{}", serde_json::to_string_pretty(&scored)?);
        pool.close().await;
        return Ok(());
    }

    if scored.is_empty() {
        println!("No recommendations found. Try syncing first.");
        pool.close().await;
        return Ok(());
    }

    println!();
    println!("Top {} recommendations", scored.len());
    println!("{}", "-".repeat(60));
    println!();

    for (i, result) in scored.iter().enumerate() {
        print_result(&pool, i + 1, result).await?;
    }

    pool.close().await;
    Ok(())
}

async fn print_result(pool: &SqlitePool, rank: usize, result: &ScoreResult) -> Result<()> {
    println!(
        "#{} {} {}/100 [{}] ({}% confident)",
        rank,
        result.name,
        result.score,
        result.price_tier,
        (result.confidence * 100.0).round() as i64
    );

    if let Some(ref variant) = result.best_variant {
        let deal = deal_marker(pool, variant.id).await;
        println!(
            "   {} | {} / {}g ({}){}",
            result.shop_name,
            format_price(variant.price),
            variant.weight_grams,
            format_price_per_100g(variant.price_per_100g),
            deal
        );
    } else {
        println!("   {}", result.shop_name);
    }

    if let Some(ref origin) = result.origin_country {
        let mut line = format!("   Origin: {}", origin);
        if let Some(ref process) = result.process {
            line.push_str(&format!(" | {}", process));
        }
        if let Some(ref roast) = result.roast_level {
            line.push_str(&format!(" | {}", roast));
        }
        println!("{}", line);
    }

    let breakdown: Vec<String> = result
        .breakdown
        .iter()
        .map(|(name, factor)| format!("{}: {}", name, factor.score))
        .collect();
    if !breakdown.is_empty() {
        println!("   [{}]", breakdown.join(", "));
    }

    println!("   {}", result.url);
    println!();
    Ok(())
}

/// " | -25% deal" when one of the discount heuristics fires for the
/// best variant; empty otherwise. Errors degrade to no marker.
async fn deal_marker(pool: &SqlitePool, variant_id: i64) -> String {
    let variant = match catalog::find_variant(pool, variant_id).await {
        Ok(Some(v)) => v,
        _ => return String::new(),
    };
    let history = match ledger::find_by_variant(pool, variant_id, 100).await {
        Ok(h) => h,
        Err(_) => return String::new(),
    };

    match discount::compute_discount(&variant, &history) {
        Some(d) => format!(" | -{}% deal", d.percentage),
        None => String::new(),
    }
}
