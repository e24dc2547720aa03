//! Reconciliation: merging observed catalog snapshots into persisted state.
//!
//! Each item merges inside its own transaction, so a failure mid-item rolls
//! back that item completely and the batch moves on — the blast radius of a
//! bad snapshot is one product. Items are processed sequentially within a
//! shop, which keeps ledger append order aligned with observation order.
//!
//! The merge returns structured change events instead of firing alerts
//! itself; `run_sync` feeds them to the detector afterwards.

use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::alerts::{self, Alert, AlertDetector};
use crate::catalog;
use crate::config::Config;
use crate::db;
use crate::ledger;
use crate::models::{
    ChangeEvent, DiscountCode, NewProductEvent, NormalizedItem, PriceChangeEvent, Product, Shop,
    StockChangeEvent, SyncStats,
};
use crate::sources::{FeedSource, SnapshotSource};

/// Everything a catalog merge produced: counters for the sync-run journal
/// and change events for the alert detector.
#[derive(Debug, Default)]
pub struct MergeReport {
    pub stats: SyncStats,
    pub events: Vec<ChangeEvent>,
}

struct ItemOutcome {
    is_new: bool,
    price_changes: i64,
}

/// Merge one shop's snapshot, one item at a time. A failed item is counted
/// and recorded with a message; the rest of the batch still goes through.
pub async fn merge_catalog(
    pool: &SqlitePool,
    shop: &Shop,
    items: &[NormalizedItem],
    observed_at: i64,
) -> Result<MergeReport> {
    let mut report = MergeReport::default();
    report.stats.products_found = items.len() as i64;

    for item in items {
        match merge_item(pool, shop, item, observed_at, &mut report.events).await {
            Ok(outcome) => {
                if outcome.is_new {
                    report.stats.products_new += 1;
                }
                report.stats.price_changes += outcome.price_changes;
            }
            Err(e) => {
                report.stats.errors += 1;
                report.stats.error_messages.push(format!("{}: {}", item.name, e));
            }
        }
    }

    Ok(report)
}

/// Merge a single item: product row, variant rows, ledger entries, rating
/// and badges, all inside one transaction. Events are only published once
/// the transaction commits.
async fn merge_item(
    pool: &SqlitePool,
    shop: &Shop,
    item: &NormalizedItem,
    observed_at: i64,
    events: &mut Vec<ChangeEvent>,
) -> Result<ItemOutcome> {
    let mut tx = pool.begin().await?;
    let mut item_events = Vec::new();
    let mut price_changes = 0;

    let product = catalog::upsert_product(&mut tx, shop.id, item, observed_at).await?;

    if product.is_new {
        item_events.push(ChangeEvent::NewProduct(NewProductEvent {
            product_id: product.id,
            name: item.name.clone(),
            url: item.url.clone(),
            origin_country: item.origin_country.clone(),
        }));
    }

    let mut found_variant_ids = Vec::with_capacity(item.variants.len());
    for variant in &item.variants {
        let outcome = catalog::upsert_variant(&mut tx, product.id, variant, observed_at).await?;
        found_variant_ids.push(outcome.id);

        // Observation log, not a change log: every priced sighting lands
        // in the ledger whether or not anything changed.
        if let Some(price) = variant.current_price {
            ledger::record(
                &mut tx,
                outcome.id,
                price,
                variant.subscription_price,
                variant.unit_price(),
                observed_at,
            )
            .await?;
        }

        if outcome.price_changed {
            price_changes += 1;
            item_events.push(ChangeEvent::Price(PriceChangeEvent {
                product_id: product.id,
                product_name: item.name.clone(),
                weight_grams: variant.weight_grams,
                previous_price: outcome.previous_price,
                new_price: variant.current_price,
            }));
        }

        if outcome.stock_changed {
            if let Some(previous_stock) = outcome.previous_stock {
                item_events.push(ChangeEvent::Stock(StockChangeEvent {
                    product_id: product.id,
                    product_name: item.name.clone(),
                    weight_grams: variant.weight_grams,
                    previous_stock,
                    new_stock: variant.in_stock != 0,
                }));
            }
        }
    }

    // Variants the snapshot no longer carries are out of stock, not gone.
    // A zero-variant snapshot takes the whole product out of stock.
    catalog::mark_missing_out_of_stock(&mut tx, product.id, &found_variant_ids, observed_at)
        .await?;

    if let Some(rating) = &item.rating {
        catalog::record_rating(&mut tx, product.id, &shop.slug, rating, observed_at).await?;
    }

    if !item.badges.is_empty() {
        catalog::replace_badges(&mut tx, product.id, &item.badges).await?;
    }

    tx.commit().await?;
    events.extend(item_events);

    Ok(ItemOutcome {
        is_new: product.is_new,
        price_changes,
    })
}

/// Staleness sweep: variants of items unseen since `before` go out of
/// stock and the items themselves go inactive. Returns the products that
/// actually transitioned, for removed-item alerting.
pub async fn stale_sweep(
    pool: &SqlitePool,
    shop: &Shop,
    before: i64,
    now: i64,
) -> Result<Vec<Product>> {
    catalog::mark_stale_out_of_stock(pool, shop.id, before, now).await?;
    catalog::mark_stale_inactive(pool, shop.id, before, now).await
}

/// Record promotional codes reported by an external collaborator. Only a
/// newly observed (shop, code) pair produces an alert.
pub async fn record_discount_codes(
    pool: &SqlitePool,
    codes: &[DiscountCode],
    detector: &AlertDetector,
    now: i64,
) -> Result<Vec<Alert>> {
    let mut alerts = Vec::new();
    for code in codes {
        if catalog::upsert_discount_code(pool, code, now).await? {
            alerts.push(detector.discount_code(code));
        }
    }
    Ok(alerts)
}

/// CLI entry point for `crema sync`.
pub async fn run_sync(
    config: &Config,
    shop_filter: &str,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<()> {
    let selected: Vec<_> = config
        .shops
        .iter()
        .filter(|s| shop_filter == "all" || s.slug == shop_filter)
        .collect();

    if selected.is_empty() {
        let known: Vec<&str> = config.shops.iter().map(|s| s.slug.as_str()).collect();
        bail!(
            "Unknown shop: '{}'. Configured: all, {}",
            shop_filter,
            known.join(", ")
        );
    }

    let pool = db::connect(config).await?;
    catalog::seed_shops(&pool, &config.shops, chrono::Utc::now().timestamp()).await?;
    let detector = AlertDetector::new(&config.alerts);

    for shop_config in selected {
        let source = FeedSource::new(&shop_config.slug, &shop_config.feed);

        let mut items = match source.fetch().await {
            Ok(items) => items,
            Err(e) => {
                eprintln!("sync {}: feed error: {:#}", shop_config.slug, e);
                let started_at = chrono::Utc::now().timestamp();
                let run_id = catalog::start_sync_run(&pool, &shop_config.slug, started_at).await?;
                let stats = SyncStats {
                    errors: 1,
                    error_messages: vec![format!("{:#}", e)],
                    ..Default::default()
                };
                catalog::finish_sync_run(&pool, run_id, "failed", &stats, started_at).await?;
                continue;
            }
        };

        if let Some(lim) = limit {
            items.truncate(lim);
        }

        if dry_run {
            let variant_count: usize = items.iter().map(|i| i.variants.len()).sum();
            println!("sync {} (dry-run)", shop_config.slug);
            println!("  items found: {}", items.len());
            println!("  variants: {}", variant_count);
            continue;
        }

        let shop = match catalog::find_shop(&pool, &shop_config.slug).await? {
            Some(shop) => shop,
            None => bail!("shop '{}' missing after seeding", shop_config.slug),
        };

        let started_at = chrono::Utc::now().timestamp();
        let run_id = catalog::start_sync_run(&pool, &shop.slug, started_at).await?;

        let report = merge_catalog(&pool, &shop, &items, started_at).await?;

        let mut alerts = Vec::new();
        for event in &report.events {
            match event {
                ChangeEvent::NewProduct(ev) => alerts.push(detector.new_product(ev, &shop.slug)),
                ChangeEvent::Price(ev) => alerts.extend(detector.price_alerts(ev, &shop.slug)),
                ChangeEvent::Stock(ev) => alerts.extend(detector.stock_change(ev, &shop.slug)),
            }
        }

        // Full-catalog sweep: items the feed no longer carries. Skipped on
        // an empty feed, which is indistinguishable from a broken one.
        if !items.is_empty() {
            let now = chrono::Utc::now().timestamp();
            let removed = stale_sweep(&pool, &shop, started_at, now).await?;
            for product in &removed {
                alerts.push(detector.product_removed(product));
            }
        }

        let alert_count = alerts.len();
        for alert in &alerts {
            if let Err(e) = alerts::create_alert(&pool, alert, started_at).await {
                eprintln!("sync {}: failed to save alert '{}': {}", shop.slug, alert.title, e);
            }
        }

        let status = if report.stats.errors > 0 { "partial" } else { "success" };
        catalog::finish_sync_run(
            &pool,
            run_id,
            status,
            &report.stats,
            chrono::Utc::now().timestamp(),
        )
        .await?;

        println!("sync {}", shop.slug);
        println!("  items found: {}", report.stats.products_found);
        println!("  new products: {}", report.stats.products_new);
        println!("  price changes: {}", report.stats.price_changes);
        println!("  alerts: {}", alert_count);
        if report.stats.errors > 0 {
            println!("  errors: {}", report.stats.errors);
            for message in &report.stats.error_messages {
                println!("    - {}", message);
            }
        }
    }

    println!("ok");
    pool.close().await;
    Ok(())
}
