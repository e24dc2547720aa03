use anyhow::Result;
use sqlx::SqlitePool;

/// Create the full schema. Every statement is idempotent, so `crema init`
/// can be re-run safely against an existing database.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS shops (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            shop_id INTEGER NOT NULL,
            external_id TEXT,
            slug TEXT NOT NULL,
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            image_url TEXT,
            description TEXT,
            origin_country TEXT,
            origin_region TEXT,
            process TEXT,
            roast_level TEXT,
            variety TEXT,
            tasting_notes TEXT,
            altitude TEXT,
            brewing_method TEXT,
            arabica_percentage REAL,
            is_blend INTEGER NOT NULL DEFAULT 0,
            is_decaf INTEGER NOT NULL DEFAULT 0,
            first_seen_at INTEGER NOT NULL,
            last_seen_at INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            deactivated_at INTEGER,
            UNIQUE(shop_id, slug),
            FOREIGN KEY (shop_id) REFERENCES shops(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_variants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL,
            weight_grams INTEGER NOT NULL,
            grind TEXT NOT NULL DEFAULT '',
            label TEXT,
            current_price REAL,
            original_price REAL,
            current_subscription_price REAL,
            price_per_100g REAL,
            in_stock INTEGER NOT NULL DEFAULT 0,
            sku TEXT,
            updated_at INTEGER NOT NULL,
            UNIQUE(product_id, weight_grams, grind),
            FOREIGN KEY (product_id) REFERENCES products(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only: no UPDATE or DELETE is ever issued against this table.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS price_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            variant_id INTEGER NOT NULL,
            price REAL NOT NULL,
            subscription_price REAL,
            price_per_100g REAL,
            observed_at INTEGER NOT NULL,
            FOREIGN KEY (variant_id) REFERENCES product_variants(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ratings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL,
            source TEXT NOT NULL,
            average_rating REAL NOT NULL,
            scale REAL NOT NULL,
            review_count INTEGER NOT NULL DEFAULT 0,
            observed_at INTEGER NOT NULL,
            FOREIGN KEY (product_id) REFERENCES products(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_badges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL,
            badge_type TEXT NOT NULL,
            label TEXT NOT NULL,
            UNIQUE(product_id, badge_type),
            FOREIGN KEY (product_id) REFERENCES products(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_changes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL,
            field_name TEXT NOT NULL,
            old_value TEXT,
            new_value TEXT,
            changed_at INTEGER NOT NULL,
            FOREIGN KEY (product_id) REFERENCES products(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL,
            source TEXT NOT NULL,
            url TEXT,
            cupping_score REAL,
            observed_at INTEGER NOT NULL,
            FOREIGN KEY (product_id) REFERENCES products(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discount_codes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            shop_slug TEXT,
            code TEXT NOT NULL,
            discount_percent REAL,
            discount_fixed REAL,
            description TEXT,
            source_url TEXT,
            valid_until INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            UNIQUE(shop_slug, code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            alert_type TEXT NOT NULL,
            severity TEXT NOT NULL,
            shop_slug TEXT,
            product_id INTEGER,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            data TEXT,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            shop_slug TEXT NOT NULL,
            status TEXT NOT NULL,
            products_found INTEGER NOT NULL DEFAULT 0,
            products_new INTEGER NOT NULL DEFAULT 0,
            price_changes INTEGER NOT NULL DEFAULT 0,
            errors INTEGER NOT NULL DEFAULT 0,
            error_messages TEXT,
            started_at INTEGER NOT NULL,
            finished_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes for the hot lookup paths
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_shop ON products(shop_id, is_active)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_variants_product ON product_variants(product_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_price_history_variant ON price_history(variant_id, observed_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_ratings_product ON ratings(product_id, observed_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_alerts_read ON alerts(is_read, created_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
