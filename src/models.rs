//! Core data models used throughout crema.
//!
//! These types represent the normalized snapshots produced by acquisition
//! sources, the persisted catalog rows, and the change data that flows from
//! reconciliation into alert detection.

use serde::Deserialize;

/// One item snapshot as delivered by an acquisition source.
///
/// The field names follow the feed contract (camelCase JSON) so any external
/// collaborator that speaks the contract can produce input for the
/// reconciler. Everything the reconciler consumes goes through this type —
/// never through source-specific shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedItem {
    #[serde(default)]
    pub external_id: Option<String>,
    pub slug: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub origin_country: Option<String>,
    #[serde(default)]
    pub origin_region: Option<String>,
    #[serde(default)]
    pub process: Option<String>,
    #[serde(default)]
    pub roast_level: Option<String>,
    #[serde(default)]
    pub variety: Option<String>,
    #[serde(default)]
    pub tasting_notes: Option<String>,
    #[serde(default)]
    pub altitude: Option<String>,
    #[serde(default)]
    pub brewing_method: Option<String>,
    #[serde(default)]
    pub arabica_percentage: Option<f64>,
    #[serde(default)]
    pub is_blend: bool,
    #[serde(default)]
    pub is_decaf: bool,
    #[serde(default)]
    pub variants: Vec<NormalizedVariant>,
    #[serde(default)]
    pub rating: Option<SnapshotRating>,
    #[serde(default)]
    pub badges: Vec<SnapshotBadge>,
}

/// One purchasable configuration inside a [`NormalizedItem`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedVariant {
    pub weight_grams: i64,
    #[serde(default)]
    pub grind: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub original_price: Option<f64>,
    #[serde(default)]
    pub subscription_price: Option<f64>,
    #[serde(default)]
    pub price_per_100g: Option<f64>,
    /// Stock flag per the feed contract: 0 or 1.
    pub in_stock: i64,
    #[serde(default)]
    pub sku: Option<String>,
}

impl NormalizedVariant {
    /// Unit price in currency per 100g, derived from the list price when the
    /// source did not supply one.
    pub fn unit_price(&self) -> Option<f64> {
        if self.price_per_100g.is_some() {
            return self.price_per_100g;
        }
        crate::price::price_per_100g(self.current_price, self.weight_grams)
    }
}

/// Rating observation inside a snapshot.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRating {
    pub value: f64,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub best_rating: Option<f64>,
}

/// Badge tag inside a snapshot.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotBadge {
    pub badge_type: String,
    pub label: String,
}

/// Persisted shop row.
#[derive(Debug, Clone)]
pub struct Shop {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub url: String,
}

/// Persisted product row, joined with its shop for display and scoring.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: i64,
    pub shop_id: i64,
    pub shop_slug: String,
    pub shop_name: String,
    pub slug: String,
    pub name: String,
    pub url: String,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub origin_country: Option<String>,
    pub origin_region: Option<String>,
    pub process: Option<String>,
    pub roast_level: Option<String>,
    pub variety: Option<String>,
    pub tasting_notes: Option<String>,
    pub altitude: Option<String>,
    pub brewing_method: Option<String>,
    pub arabica_percentage: Option<f64>,
    pub is_blend: bool,
    pub is_decaf: bool,
    pub first_seen_at: Option<i64>,
    pub last_seen_at: i64,
    pub is_active: bool,
}

/// Persisted variant row.
#[derive(Debug, Clone)]
pub struct Variant {
    pub id: i64,
    pub product_id: i64,
    pub weight_grams: i64,
    /// Empty string when the variant has no grind, so the identity key
    /// (product, weight, grind) is total.
    pub grind: String,
    pub label: Option<String>,
    pub current_price: Option<f64>,
    pub original_price: Option<f64>,
    pub current_subscription_price: Option<f64>,
    pub price_per_100g: Option<f64>,
    pub in_stock: bool,
    pub sku: Option<String>,
}

/// One immutable price observation.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: i64,
    pub variant_id: i64,
    pub price: f64,
    pub subscription_price: Option<f64>,
    pub price_per_100g: Option<f64>,
    pub observed_at: i64,
}

/// Time-stamped rating observation for a product.
#[derive(Debug, Clone)]
pub struct Rating {
    pub id: i64,
    pub product_id: i64,
    pub source: String,
    pub average_rating: f64,
    pub scale: f64,
    pub review_count: i64,
    pub observed_at: i64,
}

/// Badge tag attached to a product.
#[derive(Debug, Clone)]
pub struct Badge {
    pub product_id: i64,
    pub badge_type: String,
    pub label: String,
}

/// External review match (e.g. a cupping score from a review site).
#[derive(Debug, Clone)]
pub struct Review {
    pub id: i64,
    pub product_id: i64,
    pub source: String,
    pub url: Option<String>,
    pub cupping_score: Option<f64>,
    pub observed_at: i64,
}

/// Promotional code reported by an external collaborator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    #[serde(default)]
    pub shop_slug: Option<String>,
    pub code: String,
    #[serde(default)]
    pub discount_percent: Option<f64>,
    #[serde(default)]
    pub discount_fixed: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub valid_until: Option<i64>,
}

/// Result of merging one product snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ProductUpsert {
    pub id: i64,
    pub is_new: bool,
}

/// Result of merging one variant snapshot. The previous price and stock are
/// captured before the row is overwritten.
#[derive(Debug, Clone)]
pub struct VariantUpsert {
    pub id: i64,
    pub is_new: bool,
    pub previous_price: Option<f64>,
    pub previous_stock: Option<bool>,
    pub price_changed: bool,
    pub stock_changed: bool,
}

/// Counters accumulated over one shop's catalog merge.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    pub products_found: i64,
    pub products_new: i64,
    pub price_changes: i64,
    pub errors: i64,
    pub error_messages: Vec<String>,
}

/// Change event emitted by the reconciler for the alert detector.
///
/// The reconciler never persists alerts itself; it returns these and the
/// caller decides what to do with them. This keeps the merge loop and the
/// detection rules independently testable.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    NewProduct(NewProductEvent),
    Price(PriceChangeEvent),
    Stock(StockChangeEvent),
}

#[derive(Debug, Clone)]
pub struct NewProductEvent {
    pub product_id: i64,
    pub name: String,
    pub url: String,
    pub origin_country: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PriceChangeEvent {
    pub product_id: i64,
    pub product_name: String,
    pub weight_grams: i64,
    pub previous_price: Option<f64>,
    pub new_price: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct StockChangeEvent {
    pub product_id: i64,
    pub product_name: String,
    pub weight_grams: i64,
    pub previous_stock: bool,
    pub new_stock: bool,
}
