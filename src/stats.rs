//! Database statistics and health overview.
//!
//! A quick summary of what's tracked: product, variant and ledger counts,
//! the alert inbox, and per-shop breakdowns with the last sync run. Used by
//! `crema stats` to confirm that syncs are landing where expected.

use anyhow::Result;
use sqlx::Row;

use crate::alerts;
use crate::config::Config;
use crate::db;

struct ShopStats {
    slug: String,
    product_count: i64,
    active_count: i64,
    variant_count: i64,
    last_sync: Option<(String, i64)>,
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&pool)
        .await?;
    let active_products: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&pool)
            .await?;
    let total_variants: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_variants")
        .fetch_one(&pool)
        .await?;
    let ledger_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM price_history")
        .fetch_one(&pool)
        .await?;
    let unread_alerts = alerts::count_unread(&pool).await?;

    let db_size = std::fs::metadata(&config.database.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("crema — Database Stats");
    println!("======================");
    println!();
    println!("  Database:      {}", config.database.path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!("  Products:      {} ({} active)", total_products, active_products);
    println!("  Variants:      {}", total_variants);
    println!("  Price history: {} entries", ledger_entries);
    println!("  Unread alerts: {}", unread_alerts);

    let shop_rows = sqlx::query(
        r#"
        SELECT
            s.slug,
            COUNT(DISTINCT p.id) AS product_count,
            COUNT(DISTINCT CASE WHEN p.is_active = 1 THEN p.id END) AS active_count,
            COUNT(DISTINCT pv.id) AS variant_count
        FROM shops s
        LEFT JOIN products p ON p.shop_id = s.id
        LEFT JOIN product_variants pv ON pv.product_id = p.id
        GROUP BY s.id
        ORDER BY product_count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let runs = crate::catalog::latest_sync_runs(&pool).await?;

    let mut shop_stats = Vec::new();
    for row in &shop_rows {
        let slug: String = row.get("slug");
        let last_sync = runs
            .iter()
            .find(|r| r.shop_slug == slug)
            .map(|r| (r.status.clone(), r.started_at));

        shop_stats.push(ShopStats {
            slug,
            product_count: row.get("product_count"),
            active_count: row.get("active_count"),
            variant_count: row.get("variant_count"),
            last_sync,
        });
    }

    if !shop_stats.is_empty() {
        println!();
        println!("  By shop:");
        println!(
            "  {:<20} {:>8} {:>8} {:>9}   {}",
            "SHOP", "PRODUCTS", "ACTIVE", "VARIANTS", "LAST SYNC"
        );
        println!("  {}", "-".repeat(70));

        for s in &shop_stats {
            let sync_display = match &s.last_sync {
                Some((status, ts)) => format!("{} ({})", format_ts_relative(*ts), status),
                None => "never".to_string(),
            };
            println!(
                "  {:<20} {:>8} {:>8} {:>9}   {}",
                s.slug, s.product_count, s.active_count, s.variant_count, sync_display
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
