use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::alerts::Severity;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub shops: Vec<ShopConfig>,
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// One tracked shop. The feed path points at a JSON file holding the shop's
/// latest catalog snapshot, written by the acquisition collaborator.
#[derive(Debug, Deserialize, Clone)]
pub struct ShopConfig {
    pub slug: String,
    pub name: String,
    pub url: String,
    pub feed: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub price_tiers: PriceTiers,
    #[serde(default = "default_freshness_window")]
    pub freshness_window_days: i64,
    pub origin_tiers: BTreeMap<String, OriginTier>,
}

fn default_freshness_window() -> i64 {
    90
}

/// The eight scoring factor weights. Must sum to 1.0 (validated at load
/// time, not re-checked during scoring).
#[derive(Debug, Deserialize, Clone)]
pub struct ScoringWeights {
    pub price_value: f64,
    pub rating: f64,
    pub origin_quality: f64,
    pub review_score: f64,
    pub freshness: f64,
    pub awards: f64,
    pub subscription_savings: f64,
    pub special_badges: f64,
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.price_value
            + self.rating
            + self.origin_quality
            + self.review_score
            + self.freshness
            + self.awards
            + self.subscription_savings
            + self.special_badges
    }

    /// (name, weight) pairs, in breakdown display order.
    pub fn entries(&self) -> [(&'static str, f64); 8] {
        [
            ("price_value", self.price_value),
            ("rating", self.rating),
            ("origin_quality", self.origin_quality),
            ("review_score", self.review_score),
            ("freshness", self.freshness),
            ("awards", self.awards),
            ("subscription_savings", self.subscription_savings),
            ("special_badges", self.special_badges),
        ]
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PriceTiers {
    pub budget: PriceTierBand,
    pub mid_range: PriceTierBand,
    pub premium: PriceTierBand,
    pub ultra_premium: PriceTierBand,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PriceTierBand {
    pub max_per_kg: f64,
    pub label: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OriginTier {
    pub score: f64,
    pub countries: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    #[serde(default = "default_price_drop_rule")]
    pub price_drop: AlertRule,
    #[serde(default = "default_price_increase_rule")]
    pub price_increase: AlertRule,
    #[serde(default = "default_info_rule")]
    pub new_product: AlertRule,
    #[serde(default = "default_low_rule")]
    pub stock_change: AlertRule,
    #[serde(default = "default_info_rule")]
    pub discount_code: AlertRule,
    #[serde(default = "default_low_rule")]
    pub product_removed: AlertRule,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            price_drop: default_price_drop_rule(),
            price_increase: default_price_increase_rule(),
            new_product: default_info_rule(),
            stock_change: default_low_rule(),
            discount_code: default_info_rule(),
            product_removed: default_low_rule(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertRule {
    /// Minimum percent change before the rule fires (price alerts only).
    #[serde(default)]
    pub min_percentage: Option<f64>,
    pub severity: Severity,
}

fn default_price_drop_rule() -> AlertRule {
    AlertRule {
        min_percentage: Some(5.0),
        severity: Severity::Info,
    }
}

fn default_price_increase_rule() -> AlertRule {
    AlertRule {
        min_percentage: Some(5.0),
        severity: Severity::Low,
    }
}

fn default_info_rule() -> AlertRule {
    AlertRule {
        min_percentage: None,
        severity: Severity::Info,
    }
}

fn default_low_rule() -> AlertRule {
    AlertRule {
        min_percentage: None,
        severity: Severity::Low,
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.shops.is_empty() {
        anyhow::bail!("at least one [[shops]] entry is required");
    }

    for shop in &config.shops {
        if shop.slug.trim().is_empty() {
            anyhow::bail!("shops.slug must not be empty");
        }
    }

    // Validate scoring weights
    for (name, weight) in config.scoring.weights.entries() {
        if !(0.0..=1.0).contains(&weight) {
            anyhow::bail!("scoring.weights.{} must be in [0.0, 1.0]", name);
        }
    }

    let sum = config.scoring.weights.sum();
    if (sum - 1.0).abs() > 0.001 {
        anyhow::bail!("scoring.weights must sum to 1.0 (got {:.3})", sum);
    }

    if !(1..=365).contains(&config.scoring.freshness_window_days) {
        anyhow::bail!("scoring.freshness_window_days must be in [1, 365]");
    }

    // Validate price tiers
    for (name, band) in [
        ("budget", &config.scoring.price_tiers.budget),
        ("mid_range", &config.scoring.price_tiers.mid_range),
        ("premium", &config.scoring.price_tiers.premium),
        ("ultra_premium", &config.scoring.price_tiers.ultra_premium),
    ] {
        if band.max_per_kg <= 0.0 {
            anyhow::bail!("scoring.price_tiers.{}.max_per_kg must be > 0", name);
        }
        if band.label.trim().is_empty() {
            anyhow::bail!("scoring.price_tiers.{}.label must not be empty", name);
        }
    }

    // Validate origin tiers
    for (name, tier) in &config.scoring.origin_tiers {
        if !(0.0..=100.0).contains(&tier.score) {
            anyhow::bail!("scoring.origin_tiers.{}.score must be in [0, 100]", name);
        }
        if tier.countries.is_empty() {
            anyhow::bail!("scoring.origin_tiers.{}.countries must not be empty", name);
        }
    }

    // Validate alert thresholds
    for (name, rule) in [
        ("price_drop", &config.alerts.price_drop),
        ("price_increase", &config.alerts.price_increase),
    ] {
        if let Some(pct) = rule.min_percentage {
            if !(0.0..=100.0).contains(&pct) {
                anyhow::bail!("alerts.{}.min_percentage must be in [0, 100]", name);
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, body: &str) -> Result<Config> {
        let tmp = std::env::temp_dir().join(format!("crema-config-{}-{}.toml", std::process::id(), name));
        std::fs::write(&tmp, body).unwrap();
        let result = load_config(&tmp);
        let _ = std::fs::remove_file(&tmp);
        result
    }

    fn valid_config_toml(weights: &str) -> String {
        format!(
            r#"
[database]
path = "/tmp/crema-test.sqlite"

[[shops]]
slug = "test-shop"
name = "Test Shop"
url = "https://example.com"
feed = "/tmp/feed.json"

[scoring]
freshness_window_days = 90

[scoring.weights]
{weights}

[scoring.price_tiers.budget]
max_per_kg = 15
label = "Budget"

[scoring.price_tiers.mid_range]
max_per_kg = 30
label = "Mid-range"

[scoring.price_tiers.premium]
max_per_kg = 50
label = "Premium"

[scoring.price_tiers.ultra_premium]
max_per_kg = 999
label = "Ultra-premium"

[scoring.origin_tiers.S]
score = 100
countries = ["Ethiopia", "Kenya"]
"#
        )
    }

    const BALANCED_WEIGHTS: &str = "price_value = 0.3\nrating = 0.2\norigin_quality = 0.15\nreview_score = 0.1\nfreshness = 0.1\nawards = 0.05\nsubscription_savings = 0.05\nspecial_badges = 0.05";

    #[test]
    fn test_valid_config_loads() {
        let config = write_config("valid", &valid_config_toml(BALANCED_WEIGHTS)).unwrap();
        assert_eq!(config.shops.len(), 1);
        assert!((config.scoring.weights.sum() - 1.0).abs() < 0.001);
        // Alert defaults apply when [alerts] is absent
        assert_eq!(config.alerts.price_drop.min_percentage, Some(5.0));
    }

    #[test]
    fn test_rejects_bad_weight_sum() {
        let weights = "price_value = 0.5\nrating = 0.2\norigin_quality = 0.15\nreview_score = 0.1\nfreshness = 0.1\nawards = 0.05\nsubscription_savings = 0.05\nspecial_badges = 0.05";
        let err = write_config("sum", &valid_config_toml(weights)).unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_rejects_out_of_range_weight() {
        let weights = "price_value = 1.5\nrating = -0.5\norigin_quality = 0.0\nreview_score = 0.0\nfreshness = 0.0\nawards = 0.0\nsubscription_savings = 0.0\nspecial_badges = 0.0";
        let err = write_config("range", &valid_config_toml(weights)).unwrap_err();
        assert!(err.to_string().contains("must be in [0.0, 1.0]"));
    }

    #[test]
    fn test_rejects_bad_freshness_window() {
        let toml = valid_config_toml(BALANCED_WEIGHTS).replace(
            "freshness_window_days = 90",
            "freshness_window_days = 500",
        );
        let err = write_config("window", &toml).unwrap_err();
        assert!(err.to_string().contains("freshness_window_days"));
    }
}
