//! Persisted catalog state: shops, products, variants, ratings, badges and
//! reviews.
//!
//! Write operations take a `&mut SqliteConnection` so the reconciler can run
//! them inside a per-item transaction; read helpers take the pool. Lookups
//! use the identity keys from the data model: (shop, slug) for products and
//! (product, weight, grind) for variants.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::config::ShopConfig;
use crate::models::{
    Badge, NormalizedItem, NormalizedVariant, Product, ProductUpsert, Rating, Review, Shop,
    SnapshotBadge, SnapshotRating, SyncStats, Variant, VariantUpsert,
};

/// Descriptive fields whose changes are recorded to the audit trail.
const TRACKED_FIELDS: [&str; 8] = [
    "origin_country",
    "origin_region",
    "process",
    "roast_level",
    "variety",
    "tasting_notes",
    "altitude",
    "brewing_method",
];

// ============ Shops ============

pub async fn seed_shops(pool: &SqlitePool, shops: &[ShopConfig], now: i64) -> Result<()> {
    for shop in shops {
        sqlx::query(
            r#"
            INSERT INTO shops (slug, name, url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(slug) DO UPDATE SET
                name = excluded.name,
                url = excluded.url,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&shop.slug)
        .bind(&shop.name)
        .bind(&shop.url)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
    }
    Ok(())
}

pub async fn find_shop(pool: &SqlitePool, slug: &str) -> Result<Option<Shop>> {
    let row = sqlx::query("SELECT id, slug, name, url FROM shops WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| Shop {
        id: r.get("id"),
        slug: r.get("slug"),
        name: r.get("name"),
        url: r.get("url"),
    }))
}

// ============ Products ============

fn product_from_row(row: &SqliteRow) -> Product {
    Product {
        id: row.get("id"),
        shop_id: row.get("shop_id"),
        shop_slug: row.get("shop_slug"),
        shop_name: row.get("shop_name"),
        slug: row.get("slug"),
        name: row.get("name"),
        url: row.get("url"),
        image_url: row.get("image_url"),
        description: row.get("description"),
        origin_country: row.get("origin_country"),
        origin_region: row.get("origin_region"),
        process: row.get("process"),
        roast_level: row.get("roast_level"),
        variety: row.get("variety"),
        tasting_notes: row.get("tasting_notes"),
        altitude: row.get("altitude"),
        brewing_method: row.get("brewing_method"),
        arabica_percentage: row.get("arabica_percentage"),
        is_blend: row.get::<i64, _>("is_blend") != 0,
        is_decaf: row.get::<i64, _>("is_decaf") != 0,
        first_seen_at: row.get("first_seen_at"),
        last_seen_at: row.get("last_seen_at"),
        is_active: row.get::<i64, _>("is_active") != 0,
    }
}

const PRODUCT_COLUMNS: &str = r#"
    p.id, p.shop_id, p.slug, p.name, p.url, p.image_url, p.description,
    p.origin_country, p.origin_region, p.process, p.roast_level, p.variety,
    p.tasting_notes, p.altitude, p.brewing_method, p.arabica_percentage,
    p.is_blend, p.is_decaf, p.first_seen_at, p.last_seen_at, p.is_active,
    s.slug AS shop_slug, s.name AS shop_name
"#;

/// All active products, joined with their shops, ordered by name.
pub async fn find_active_products(pool: &SqlitePool) -> Result<Vec<Product>> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p JOIN shops s ON p.shop_id = s.id \
         WHERE p.is_active = 1 ORDER BY p.name"
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows.iter().map(product_from_row).collect())
}

pub async fn find_product(pool: &SqlitePool, id: i64) -> Result<Option<Product>> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p JOIN shops s ON p.shop_id = s.id WHERE p.id = ?"
    );
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(product_from_row))
}

/// Merge one product snapshot. Inserts on first sighting; otherwise
/// overwrites the descriptive attributes, bumps `last_seen_at` and
/// reactivates the row regardless of prior state.
///
/// Changed tracked fields are recorded to the audit trail first; a failure
/// there is swallowed so auditing can never block the merge itself.
pub async fn upsert_product(
    conn: &mut SqliteConnection,
    shop_id: i64,
    item: &NormalizedItem,
    now: i64,
) -> Result<ProductUpsert> {
    let existing = sqlx::query("SELECT * FROM products WHERE shop_id = ? AND slug = ?")
        .bind(shop_id)
        .bind(&item.slug)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(row) = existing {
        let id: i64 = row.get("id");

        for field in TRACKED_FIELDS {
            let old: Option<String> = row.get(field);
            let new = tracked_field_value(item, field);
            if old != new {
                // Audit only; never blocks the merge
                let _ =
                    record_field_change(&mut *conn, id, field, old.as_deref(), new.as_deref(), now)
                        .await;
            }
        }

        sqlx::query(
            r#"
            UPDATE products SET
                external_id = ?, name = ?, url = ?, image_url = ?, description = ?,
                origin_country = ?, origin_region = ?, process = ?, roast_level = ?,
                variety = ?, tasting_notes = ?, altitude = ?, brewing_method = ?,
                arabica_percentage = ?, is_blend = ?, is_decaf = ?,
                last_seen_at = ?, is_active = 1, deactivated_at = NULL
            WHERE id = ?
            "#,
        )
        .bind(&item.external_id)
        .bind(&item.name)
        .bind(&item.url)
        .bind(&item.image_url)
        .bind(&item.description)
        .bind(&item.origin_country)
        .bind(&item.origin_region)
        .bind(&item.process)
        .bind(&item.roast_level)
        .bind(&item.variety)
        .bind(&item.tasting_notes)
        .bind(&item.altitude)
        .bind(&item.brewing_method)
        .bind(item.arabica_percentage)
        .bind(item.is_blend as i64)
        .bind(item.is_decaf as i64)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        return Ok(ProductUpsert { id, is_new: false });
    }

    let result = sqlx::query(
        r#"
        INSERT INTO products (shop_id, external_id, slug, name, url, image_url, description,
            origin_country, origin_region, process, roast_level, variety, tasting_notes,
            altitude, brewing_method, arabica_percentage, is_blend, is_decaf,
            first_seen_at, last_seen_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(shop_id)
    .bind(&item.external_id)
    .bind(&item.slug)
    .bind(&item.name)
    .bind(&item.url)
    .bind(&item.image_url)
    .bind(&item.description)
    .bind(&item.origin_country)
    .bind(&item.origin_region)
    .bind(&item.process)
    .bind(&item.roast_level)
    .bind(&item.variety)
    .bind(&item.tasting_notes)
    .bind(&item.altitude)
    .bind(&item.brewing_method)
    .bind(item.arabica_percentage)
    .bind(item.is_blend as i64)
    .bind(item.is_decaf as i64)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(ProductUpsert {
        id: result.last_insert_rowid(),
        is_new: true,
    })
}

fn tracked_field_value(item: &NormalizedItem, field: &str) -> Option<String> {
    match field {
        "origin_country" => item.origin_country.clone(),
        "origin_region" => item.origin_region.clone(),
        "process" => item.process.clone(),
        "roast_level" => item.roast_level.clone(),
        "variety" => item.variety.clone(),
        "tasting_notes" => item.tasting_notes.clone(),
        "altitude" => item.altitude.clone(),
        "brewing_method" => item.brewing_method.clone(),
        _ => None,
    }
}

async fn record_field_change(
    conn: &mut SqliteConnection,
    product_id: i64,
    field: &str,
    old: Option<&str>,
    new: Option<&str>,
    now: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO product_changes (product_id, field_name, old_value, new_value, changed_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(product_id)
    .bind(field)
    .bind(old)
    .bind(new)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Deactivate products of a shop unseen since `before`, returning the rows
/// that actually transitioned so the caller can emit removed-item alerts.
pub async fn mark_stale_inactive(
    pool: &SqlitePool,
    shop_id: i64,
    before: i64,
    now: i64,
) -> Result<Vec<Product>> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p JOIN shops s ON p.shop_id = s.id \
         WHERE p.shop_id = ? AND p.last_seen_at < ? AND p.is_active = 1"
    );
    let stale: Vec<Product> = sqlx::query(&sql)
        .bind(shop_id)
        .bind(before)
        .fetch_all(pool)
        .await?
        .iter()
        .map(product_from_row)
        .collect();

    sqlx::query(
        "UPDATE products SET is_active = 0, deactivated_at = ? \
         WHERE shop_id = ? AND last_seen_at < ? AND is_active = 1",
    )
    .bind(now)
    .bind(shop_id)
    .bind(before)
    .execute(pool)
    .await?;

    Ok(stale)
}

// ============ Variants ============

fn variant_from_row(row: &SqliteRow) -> Variant {
    Variant {
        id: row.get("id"),
        product_id: row.get("product_id"),
        weight_grams: row.get("weight_grams"),
        grind: row.get("grind"),
        label: row.get("label"),
        current_price: row.get("current_price"),
        original_price: row.get("original_price"),
        current_subscription_price: row.get("current_subscription_price"),
        price_per_100g: row.get("price_per_100g"),
        in_stock: row.get::<i64, _>("in_stock") != 0,
        sku: row.get("sku"),
    }
}

/// Merge one variant snapshot. The previous price and stock flag are read
/// and diffed before the row is overwritten.
pub async fn upsert_variant(
    conn: &mut SqliteConnection,
    product_id: i64,
    variant: &NormalizedVariant,
    now: i64,
) -> Result<VariantUpsert> {
    let grind = variant.grind.clone().unwrap_or_default();
    let new_in_stock = variant.in_stock != 0;
    let unit_price = variant.unit_price();

    let existing = sqlx::query(
        "SELECT id, current_price, in_stock FROM product_variants \
         WHERE product_id = ? AND weight_grams = ? AND grind = ?",
    )
    .bind(product_id)
    .bind(variant.weight_grams)
    .bind(&grind)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = existing {
        let id: i64 = row.get("id");
        let previous_price: Option<f64> = row.get("current_price");
        let previous_stock = row.get::<i64, _>("in_stock") != 0;

        sqlx::query(
            r#"
            UPDATE product_variants SET
                current_price = ?, original_price = ?, current_subscription_price = ?,
                price_per_100g = ?, in_stock = ?, label = ?, sku = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(variant.current_price)
        .bind(variant.original_price)
        .bind(variant.subscription_price)
        .bind(unit_price)
        .bind(new_in_stock as i64)
        .bind(&variant.label)
        .bind(&variant.sku)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        return Ok(VariantUpsert {
            id,
            is_new: false,
            previous_price,
            previous_stock: Some(previous_stock),
            price_changed: previous_price != variant.current_price,
            stock_changed: previous_stock != new_in_stock,
        });
    }

    let result = sqlx::query(
        r#"
        INSERT INTO product_variants (product_id, weight_grams, grind, label, current_price,
            original_price, current_subscription_price, price_per_100g, in_stock, sku, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(product_id)
    .bind(variant.weight_grams)
    .bind(&grind)
    .bind(&variant.label)
    .bind(variant.current_price)
    .bind(variant.original_price)
    .bind(variant.subscription_price)
    .bind(unit_price)
    .bind(new_in_stock as i64)
    .bind(&variant.sku)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(VariantUpsert {
        id: result.last_insert_rowid(),
        is_new: true,
        previous_price: None,
        previous_stock: None,
        price_changed: false,
        stock_changed: false,
    })
}

/// Mark every variant of the product that is not in `found_ids` as out of
/// stock. With an empty found set this covers all of the product's variants.
pub async fn mark_missing_out_of_stock(
    conn: &mut SqliteConnection,
    product_id: i64,
    found_ids: &[i64],
    now: i64,
) -> Result<u64> {
    let ids_json = serde_json::to_string(found_ids)?;
    let result = sqlx::query(
        "UPDATE product_variants SET in_stock = 0, updated_at = ? \
         WHERE product_id = ? AND in_stock = 1 \
         AND id NOT IN (SELECT value FROM json_each(?))",
    )
    .bind(now)
    .bind(product_id)
    .bind(ids_json)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Mark variants of a shop's unseen products as out of stock. Used by the
/// staleness sweep after a full-catalog sync.
pub async fn mark_stale_out_of_stock(
    pool: &SqlitePool,
    shop_id: i64,
    before: i64,
    now: i64,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE product_variants SET in_stock = 0, updated_at = ? \
         WHERE in_stock = 1 AND product_id IN \
         (SELECT id FROM products WHERE shop_id = ? AND last_seen_at < ?)",
    )
    .bind(now)
    .bind(shop_id)
    .bind(before)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn find_variant(pool: &SqlitePool, id: i64) -> Result<Option<Variant>> {
    let row = sqlx::query("SELECT * FROM product_variants WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(variant_from_row))
}

pub async fn find_variants_by_product(pool: &SqlitePool, product_id: i64) -> Result<Vec<Variant>> {
    let rows = sqlx::query(
        "SELECT * FROM product_variants WHERE product_id = ? ORDER BY weight_grams, grind",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(variant_from_row).collect())
}

/// Batched variant lookup for context assembly.
pub async fn find_variants_for_products(
    pool: &SqlitePool,
    product_ids: &[i64],
) -> Result<Vec<Variant>> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids_json = serde_json::to_string(product_ids)?;
    let rows = sqlx::query(
        "SELECT * FROM product_variants \
         WHERE product_id IN (SELECT value FROM json_each(?)) \
         ORDER BY product_id, weight_grams, grind",
    )
    .bind(ids_json)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(variant_from_row).collect())
}

// ============ Ratings ============

/// Append a rating observation. Prior observations are never overwritten;
/// "latest" is resolved by observation time at read time.
pub async fn record_rating(
    conn: &mut SqliteConnection,
    product_id: i64,
    source: &str,
    rating: &SnapshotRating,
    now: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO ratings (product_id, source, average_rating, scale, review_count, observed_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(product_id)
    .bind(source)
    .bind(rating.value)
    .bind(rating.best_rating.unwrap_or(5.0))
    .bind(rating.count.unwrap_or(0))
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Latest rating per product, for the given product set.
pub async fn find_latest_ratings(pool: &SqlitePool, product_ids: &[i64]) -> Result<Vec<Rating>> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids_json = serde_json::to_string(product_ids)?;
    let rows = sqlx::query(
        "SELECT * FROM ratings WHERE product_id IN (SELECT value FROM json_each(?)) \
         ORDER BY observed_at DESC, id DESC",
    )
    .bind(ids_json)
    .fetch_all(pool)
    .await?;

    let mut seen = std::collections::HashSet::new();
    let mut latest = Vec::new();
    for row in &rows {
        let product_id: i64 = row.get("product_id");
        if seen.insert(product_id) {
            latest.push(Rating {
                id: row.get("id"),
                product_id,
                source: row.get("source"),
                average_rating: row.get("average_rating"),
                scale: row.get("scale"),
                review_count: row.get("review_count"),
                observed_at: row.get("observed_at"),
            });
        }
    }
    Ok(latest)
}

// ============ Badges ============

/// Replace the product's full badge set. Old badges are discarded, not
/// diffed. Runs on the caller's connection so the reconciler's per-item
/// transaction makes the swap atomic.
pub async fn replace_badges(
    conn: &mut SqliteConnection,
    product_id: i64,
    badges: &[SnapshotBadge],
) -> Result<()> {
    sqlx::query("DELETE FROM product_badges WHERE product_id = ?")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    for badge in badges {
        sqlx::query(
            "INSERT INTO product_badges (product_id, badge_type, label) VALUES (?, ?, ?) \
             ON CONFLICT(product_id, badge_type) DO UPDATE SET label = excluded.label",
        )
        .bind(product_id)
        .bind(&badge.badge_type)
        .bind(&badge.label)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn find_badges_for_products(
    pool: &SqlitePool,
    product_ids: &[i64],
) -> Result<Vec<Badge>> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids_json = serde_json::to_string(product_ids)?;
    let rows = sqlx::query(
        "SELECT product_id, badge_type, label FROM product_badges \
         WHERE product_id IN (SELECT value FROM json_each(?))",
    )
    .bind(ids_json)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Badge {
            product_id: row.get("product_id"),
            badge_type: row.get("badge_type"),
            label: row.get("label"),
        })
        .collect())
}

// ============ Reviews ============

pub async fn record_review(
    pool: &SqlitePool,
    product_id: i64,
    source: &str,
    url: Option<&str>,
    cupping_score: Option<f64>,
    now: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO reviews (product_id, source, url, cupping_score, observed_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(product_id)
    .bind(source)
    .bind(url)
    .bind(cupping_score)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Latest review match per product, for the given product set.
pub async fn find_latest_reviews(pool: &SqlitePool, product_ids: &[i64]) -> Result<Vec<Review>> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids_json = serde_json::to_string(product_ids)?;
    let rows = sqlx::query(
        "SELECT * FROM reviews WHERE product_id IN (SELECT value FROM json_each(?)) \
         ORDER BY observed_at DESC, id DESC",
    )
    .bind(ids_json)
    .fetch_all(pool)
    .await?;

    let mut seen = std::collections::HashSet::new();
    let mut latest = Vec::new();
    for row in &rows {
        let product_id: i64 = row.get("product_id");
        if seen.insert(product_id) {
            latest.push(Review {
                id: row.get("id"),
                product_id,
                source: row.get("source"),
                url: row.get("url"),
                cupping_score: row.get("cupping_score"),
                observed_at: row.get("observed_at"),
            });
        }
    }
    Ok(latest)
}

// ============ Discount codes ============

/// Record a promotional code. Returns true when the code was newly observed
/// (first time for this shop/code pair), which is what gates the alert.
pub async fn upsert_discount_code(
    pool: &SqlitePool,
    code: &crate::models::DiscountCode,
    now: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO discount_codes (shop_slug, code, discount_percent, discount_fixed,
            description, source_url, valid_until, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(shop_slug, code) DO NOTHING
        "#,
    )
    .bind(&code.shop_slug)
    .bind(&code.code)
    .bind(code.discount_percent)
    .bind(code.discount_fixed)
    .bind(&code.description)
    .bind(&code.source_url)
    .bind(code.valid_until)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

// ============ Sync runs ============

#[derive(Debug, Clone)]
pub struct SyncRun {
    pub id: i64,
    pub shop_slug: String,
    pub status: String,
    pub products_found: i64,
    pub products_new: i64,
    pub price_changes: i64,
    pub errors: i64,
    pub started_at: i64,
    pub finished_at: Option<i64>,
}

pub async fn start_sync_run(pool: &SqlitePool, shop_slug: &str, now: i64) -> Result<i64> {
    let result =
        sqlx::query("INSERT INTO sync_runs (shop_slug, status, started_at) VALUES (?, 'running', ?)")
            .bind(shop_slug)
            .bind(now)
            .execute(pool)
            .await?;
    Ok(result.last_insert_rowid())
}

pub async fn finish_sync_run(
    pool: &SqlitePool,
    id: i64,
    status: &str,
    stats: &SyncStats,
    now: i64,
) -> Result<()> {
    let messages = if stats.error_messages.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&stats.error_messages)?)
    };

    sqlx::query(
        r#"
        UPDATE sync_runs SET
            status = ?, products_found = ?, products_new = ?, price_changes = ?,
            errors = ?, error_messages = ?, finished_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(stats.products_found)
    .bind(stats.products_new)
    .bind(stats.price_changes)
    .bind(stats.errors)
    .bind(messages)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Most recent sync run per shop (for the stats overview).
pub async fn latest_sync_runs(pool: &SqlitePool) -> Result<Vec<SyncRun>> {
    let rows = sqlx::query(
        "SELECT * FROM sync_runs ORDER BY started_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;

    let mut seen = std::collections::HashSet::new();
    let mut latest = Vec::new();
    for row in &rows {
        let shop_slug: String = row.get("shop_slug");
        if seen.insert(shop_slug.clone()) {
            latest.push(SyncRun {
                id: row.get("id"),
                shop_slug,
                status: row.get("status"),
                products_found: row.get("products_found"),
                products_new: row.get("products_new"),
                price_changes: row.get("price_changes"),
                errors: row.get("errors"),
                started_at: row.get("started_at"),
                finished_at: row.get("finished_at"),
            });
        }
    }
    Ok(latest)
}
