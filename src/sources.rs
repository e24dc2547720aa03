//! Acquisition seam.
//!
//! The reconciler never talks to shops directly — it consumes
//! [`NormalizedItem`]s from a [`SnapshotSource`]. The shipped implementation
//! reads JSON feed files that an external acquisition collaborator (the
//! scraper) writes; anything else that can produce the contract plugs in the
//! same way.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::models::NormalizedItem;

/// A source of catalog snapshots for one shop.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Slug of the shop this source observes.
    fn shop_slug(&self) -> &str;

    /// One-line description for `crema shops` output.
    fn describe(&self) -> String;

    /// Produce the shop's current catalog snapshot.
    async fn fetch(&self) -> Result<Vec<NormalizedItem>>;
}

/// Reads a JSON array of normalized items from a feed file.
pub struct FeedSource {
    slug: String,
    path: PathBuf,
}

impl FeedSource {
    pub fn new(slug: &str, path: &Path) -> Self {
        Self {
            slug: slug.to_string(),
            path: path.to_path_buf(),
        }
    }
}

#[async_trait]
impl SnapshotSource for FeedSource {
    fn shop_slug(&self) -> &str {
        &self.slug
    }

    fn describe(&self) -> String {
        format!("feed file {}", self.path.display())
    }

    async fn fetch(&self) -> Result<Vec<NormalizedItem>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read feed file: {}", self.path.display()))?;

        let items: Vec<NormalizedItem> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse feed file: {}", self.path.display()))?;

        Ok(items)
    }
}

/// CLI entry point for `crema shops`: configured shops and feed health.
pub fn list_shops(config: &Config) -> Result<()> {
    println!("{:<16} {:<24} {:<8} FEED", "SLUG", "NAME", "STATUS");
    println!("{}", "-".repeat(72));

    for shop in &config.shops {
        let status = if shop.feed.is_file() { "ok" } else { "missing" };
        println!(
            "{:<16} {:<24} {:<8} {}",
            shop.slug,
            shop.name,
            status,
            shop.feed.display()
        );
    }

    Ok(())
}
