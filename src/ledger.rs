//! Append-only price history ledger.
//!
//! One entry per (variant, observation time). Entries are written for every
//! observed price, changed or not — the ledger is an observation log, not a
//! change log. Nothing here issues UPDATE or DELETE.

use anyhow::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::models::LedgerEntry;
use crate::price::format_price;

pub async fn record(
    conn: &mut SqliteConnection,
    variant_id: i64,
    price: f64,
    subscription_price: Option<f64>,
    price_per_100g: Option<f64>,
    observed_at: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO price_history (variant_id, price, subscription_price, price_per_100g, observed_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(variant_id)
    .bind(price)
    .bind(subscription_price)
    .bind(price_per_100g)
    .bind(observed_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Entries for one variant, most recent first.
pub async fn find_by_variant(
    pool: &SqlitePool,
    variant_id: i64,
    limit: i64,
) -> Result<Vec<LedgerEntry>> {
    let rows = sqlx::query(
        "SELECT * FROM price_history WHERE variant_id = ? \
         ORDER BY observed_at DESC, id DESC LIMIT ?",
    )
    .bind(variant_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(entry_from_row).collect())
}

/// One ledger entry joined with its variant's identity, for display.
#[derive(Debug, Clone)]
pub struct ProductLedgerEntry {
    pub entry: LedgerEntry,
    pub weight_grams: i64,
    pub grind: String,
}

/// Entries across all of a product's variants, most recent first.
pub async fn find_by_product(
    pool: &SqlitePool,
    product_id: i64,
    limit: i64,
) -> Result<Vec<ProductLedgerEntry>> {
    let rows = sqlx::query(
        "SELECT ph.*, pv.weight_grams, pv.grind \
         FROM price_history ph JOIN product_variants pv ON ph.variant_id = pv.id \
         WHERE pv.product_id = ? \
         ORDER BY ph.observed_at DESC, ph.id DESC LIMIT ?",
    )
    .bind(product_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ProductLedgerEntry {
            entry: entry_from_row(row),
            weight_grams: row.get("weight_grams"),
            grind: row.get("grind"),
        })
        .collect())
}

/// One ledger entry joined with product and shop identity, for the
/// catalog-wide recent view.
#[derive(Debug, Clone)]
pub struct RecentLedgerEntry {
    pub entry: LedgerEntry,
    pub weight_grams: i64,
    pub product_name: String,
    pub shop_slug: String,
}

/// Most recent entries across the whole catalog.
pub async fn find_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<RecentLedgerEntry>> {
    let rows = sqlx::query(
        "SELECT ph.*, pv.weight_grams, p.name AS product_name, s.slug AS shop_slug \
         FROM price_history ph \
         JOIN product_variants pv ON ph.variant_id = pv.id \
         JOIN products p ON pv.product_id = p.id \
         JOIN shops s ON p.shop_id = s.id \
         ORDER BY ph.observed_at DESC, ph.id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| RecentLedgerEntry {
            entry: entry_from_row(row),
            weight_grams: row.get("weight_grams"),
            product_name: row.get("product_name"),
            shop_slug: row.get("shop_slug"),
        })
        .collect())
}

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> LedgerEntry {
    LedgerEntry {
        id: row.get("id"),
        variant_id: row.get("variant_id"),
        price: row.get("price"),
        subscription_price: row.get("subscription_price"),
        price_per_100g: row.get("price_per_100g"),
        observed_at: row.get("observed_at"),
    }
}

/// CLI entry point for `crema history`.
pub async fn run_history(
    config: &Config,
    variant_id: Option<i64>,
    product_id: Option<i64>,
    limit: i64,
) -> Result<()> {
    let pool = db::connect(config).await?;

    match (variant_id, product_id) {
        (Some(vid), _) => {
            let entries = find_by_variant(&pool, vid, limit).await?;
            if entries.is_empty() {
                println!("No price history for variant {}.", vid);
            }
            for e in &entries {
                println!(
                    "{}  {:>10}  sub {:>10}  {}",
                    format_ts(e.observed_at),
                    format_price(Some(e.price)),
                    format_price(e.subscription_price),
                    crate::price::format_price_per_100g(e.price_per_100g),
                );
            }
        }
        (None, Some(pid)) => {
            let entries = find_by_product(&pool, pid, limit).await?;
            if entries.is_empty() {
                println!("No price history for product {}.", pid);
            }
            for e in &entries {
                let grind = if e.grind.is_empty() { "whole" } else { &e.grind };
                println!(
                    "{}  {:>5}g {:<10}  {:>10}  {}",
                    format_ts(e.entry.observed_at),
                    e.weight_grams,
                    grind,
                    format_price(Some(e.entry.price)),
                    crate::price::format_price_per_100g(e.entry.price_per_100g),
                );
            }
        }
        (None, None) => {
            let entries = find_recent(&pool, limit).await?;
            if entries.is_empty() {
                println!("No price history yet. Try syncing first.");
            }
            for e in &entries {
                println!(
                    "{}  {:<14} {:<28} {:>5}g  {:>10}",
                    format_ts(e.entry.observed_at),
                    e.shop_slug,
                    e.product_name,
                    e.weight_grams,
                    format_price(Some(e.entry.price)),
                );
            }
        }
    }

    pool.close().await;
    Ok(())
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
