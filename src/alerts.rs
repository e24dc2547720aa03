//! Change detection and the alert inbox.
//!
//! The detectors are pure functions over (change data, configured
//! thresholds): they build [`Alert`] values and never touch the database.
//! Persistence and the read/unread bookkeeping live in the repository
//! functions below, so detection rules stay testable in isolation.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::config::{AlertsConfig, Config};
use crate::db;
use crate::models::{
    DiscountCode, NewProductEvent, PriceChangeEvent, Product, StockChangeEvent,
};
use crate::price::format_price;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    PriceDrop,
    PriceIncrease,
    NewProduct,
    StockChange,
    DiscountCode,
    ProductRemoved,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::PriceDrop => "price_drop",
            AlertType::PriceIncrease => "price_increase",
            AlertType::NewProduct => "new_product",
            AlertType::StockChange => "stock_change",
            AlertType::DiscountCode => "discount_code",
            AlertType::ProductRemoved => "product_removed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Info,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Info => "info",
            Severity::Low => "low",
        }
    }
}

/// A detected, user-relevant change. Immutable once created; only the
/// read flag on the stored row ever changes.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub shop_slug: Option<String>,
    pub product_id: Option<i64>,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

/// Detection rules bound to a validated alert configuration.
///
/// The configuration is passed in explicitly so multiple detectors with
/// different thresholds can coexist (e.g. in tests).
pub struct AlertDetector {
    config: AlertsConfig,
}

impl AlertDetector {
    pub fn new(config: &AlertsConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Price drop and price increase detection. At most one alert fires per
    /// call: the two directions are mutually exclusive. Both previous and
    /// new prices must be known, and the percent change must clear the
    /// configured minimum (default 5%).
    pub fn price_alerts(&self, event: &PriceChangeEvent, shop_slug: &str) -> Vec<Alert> {
        let mut alerts = Vec::new();

        let (previous, new) = match (event.previous_price, event.new_price) {
            (Some(p), Some(n)) => (p, n),
            _ => return alerts,
        };
        if previous <= 0.0 {
            return alerts;
        }

        let diff = new - previous;
        let percent_change = (diff / previous).abs() * 100.0;

        if diff < 0.0 && percent_change >= self.config.price_drop.min_percentage.unwrap_or(5.0) {
            // 20%+ drops escalate to high severity regardless of config
            let severity = if percent_change >= 20.0 {
                Severity::High
            } else {
                self.config.price_drop.severity
            };

            alerts.push(Alert {
                alert_type: AlertType::PriceDrop,
                severity,
                shop_slug: Some(shop_slug.to_string()),
                product_id: Some(event.product_id),
                title: format!("Price drop: {}", event.product_name),
                message: format!(
                    "{} → {} (-{:.1}%)",
                    format_price(Some(previous)),
                    format_price(Some(new)),
                    percent_change
                ),
                data: serde_json::json!({
                    "previousPrice": previous,
                    "newPrice": new,
                    "percentChange": -percent_change,
                    "weightGrams": event.weight_grams,
                }),
            });
        }

        if diff > 0.0 && percent_change >= self.config.price_increase.min_percentage.unwrap_or(5.0)
        {
            alerts.push(Alert {
                alert_type: AlertType::PriceIncrease,
                severity: Severity::Low,
                shop_slug: Some(shop_slug.to_string()),
                product_id: Some(event.product_id),
                title: format!("Price increase: {}", event.product_name),
                message: format!(
                    "{} → {} (+{:.1}%)",
                    format_price(Some(previous)),
                    format_price(Some(new)),
                    percent_change
                ),
                data: serde_json::json!({
                    "previousPrice": previous,
                    "newPrice": new,
                    "percentChange": percent_change,
                    "weightGrams": event.weight_grams,
                }),
            });
        }

        alerts
    }

    pub fn new_product(&self, event: &NewProductEvent, shop_slug: &str) -> Alert {
        Alert {
            alert_type: AlertType::NewProduct,
            severity: self.config.new_product.severity,
            shop_slug: Some(shop_slug.to_string()),
            product_id: Some(event.product_id),
            title: format!("New product: {}", event.name),
            message: format!("{} now available at {}", event.name, shop_slug),
            data: serde_json::json!({
                "url": event.url,
                "originCountry": event.origin_country,
            }),
        }
    }

    /// Fires only on a stock transition. Back-in-stock is informational;
    /// going out of stock is slightly more notable.
    pub fn stock_change(&self, event: &StockChangeEvent, shop_slug: &str) -> Option<Alert> {
        let went_out = event.previous_stock && !event.new_stock;
        let back_in = !event.previous_stock && event.new_stock;
        if !went_out && !back_in {
            return None;
        }

        Some(Alert {
            alert_type: AlertType::StockChange,
            severity: if back_in { Severity::Info } else { Severity::Low },
            shop_slug: Some(shop_slug.to_string()),
            product_id: Some(event.product_id),
            title: if back_in {
                format!("Back in stock: {}", event.product_name)
            } else {
                format!("Out of stock: {}", event.product_name)
            },
            message: if back_in {
                format!("{} is available again at {}", event.product_name, shop_slug)
            } else {
                format!("{} is now out of stock at {}", event.product_name, shop_slug)
            },
            data: serde_json::json!({
                "previousStock": event.previous_stock,
                "newStock": event.new_stock,
                "weightGrams": event.weight_grams,
            }),
        })
    }

    pub fn discount_code(&self, code: &DiscountCode) -> Alert {
        let discount_text = if let Some(pct) = code.discount_percent {
            format!("{}% off", pct)
        } else if let Some(fixed) = code.discount_fixed {
            format!("{} off", format_price(Some(fixed)))
        } else {
            "discount".to_string()
        };

        let at_shop = code
            .shop_slug
            .as_deref()
            .map(|s| format!(" at {}", s))
            .unwrap_or_default();

        Alert {
            alert_type: AlertType::DiscountCode,
            severity: self.config.discount_code.severity,
            shop_slug: code.shop_slug.clone(),
            product_id: None,
            title: format!("Discount code: {}", code.code),
            message: format!("{} - {}{}", code.code, discount_text, at_shop),
            data: serde_json::json!({
                "code": code.code,
                "discountPercent": code.discount_percent,
                "discountFixed": code.discount_fixed,
                "sourceUrl": code.source_url,
            }),
        }
    }

    /// Fires when a previously active product disappears from the catalog
    /// entirely — not when a variant merely goes out of stock.
    pub fn product_removed(&self, product: &Product) -> Alert {
        Alert {
            alert_type: AlertType::ProductRemoved,
            severity: self.config.product_removed.severity,
            shop_slug: Some(product.shop_slug.clone()),
            product_id: Some(product.id),
            title: format!("Product removed: {}", product.name),
            message: format!(
                "{} is no longer available at {}",
                product.name, product.shop_slug
            ),
            data: serde_json::json!({ "url": product.url }),
        }
    }
}

// ============ Alert persistence ============

#[derive(Debug, Clone)]
pub struct StoredAlert {
    pub id: i64,
    pub alert_type: String,
    pub severity: String,
    pub shop_slug: Option<String>,
    pub product_id: Option<i64>,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: i64,
}

pub async fn create_alert(pool: &SqlitePool, alert: &Alert, now: i64) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO alerts (alert_type, severity, shop_slug, product_id, title, message, data, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(alert.alert_type.as_str())
    .bind(alert.severity.as_str())
    .bind(&alert.shop_slug)
    .bind(alert.product_id)
    .bind(&alert.title)
    .bind(&alert.message)
    .bind(serde_json::to_string(&alert.data)?)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn find_recent(
    pool: &SqlitePool,
    limit: i64,
    unread_only: bool,
) -> Result<Vec<StoredAlert>> {
    let sql = if unread_only {
        "SELECT * FROM alerts WHERE is_read = 0 ORDER BY created_at DESC, id DESC LIMIT ?"
    } else {
        "SELECT * FROM alerts ORDER BY created_at DESC, id DESC LIMIT ?"
    };

    let rows = sqlx::query(sql).bind(limit).fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|row| StoredAlert {
            id: row.get("id"),
            alert_type: row.get("alert_type"),
            severity: row.get("severity"),
            shop_slug: row.get("shop_slug"),
            product_id: row.get("product_id"),
            title: row.get("title"),
            message: row.get("message"),
            is_read: row.get::<i64, _>("is_read") != 0,
            created_at: row.get("created_at"),
        })
        .collect())
}

pub async fn mark_read(pool: &SqlitePool, id: i64) -> Result<u64> {
    let result = sqlx::query("UPDATE alerts SET is_read = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn mark_all_read(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("UPDATE alerts SET is_read = 1 WHERE is_read = 0")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_unread(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE is_read = 0")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

// ============ CLI ============

pub async fn run_alerts_list(config: &Config, limit: i64, unread_only: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let alerts = find_recent(&pool, limit, unread_only).await?;
    let unread = count_unread(&pool).await?;

    if alerts.is_empty() {
        println!("No alerts.");
        pool.close().await;
        return Ok(());
    }

    for alert in &alerts {
        let marker = if alert.is_read { " " } else { "*" };
        println!(
            "{} #{:<5} [{:<8}] {:<15} {}",
            marker,
            alert.id,
            alert.severity,
            alert.alert_type,
            alert.title
        );
        println!("          {}", alert.message);
    }
    println!();
    println!("{} unread", unread);

    pool.close().await;
    Ok(())
}

pub async fn run_alerts_read(config: &Config, id: Option<i64>) -> Result<()> {
    let pool = db::connect(config).await?;
    match id {
        Some(id) => {
            let affected = mark_read(&pool, id).await?;
            if affected == 0 {
                println!("No alert with id {}.", id);
            } else {
                println!("Alert {} marked read.", id);
            }
        }
        None => {
            let affected = mark_all_read(&pool).await?;
            println!("{} alerts marked read.", affected);
        }
    }
    pool.close().await;
    Ok(())
}
