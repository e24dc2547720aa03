//! # crema CLI
//!
//! The `crema` binary is the primary interface for the tracker. It provides
//! commands for database initialization, feed reconciliation, ranked
//! recommendations, the alert inbox, price history and database stats.
//!
//! ## Usage
//!
//! ```bash
//! crema --config ./config/crema.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `crema init` | Create the SQLite database and run schema migrations |
//! | `crema shops` | List configured shops and their feed status |
//! | `crema sync <shop>` | Reconcile a shop's feed (or `all`) into the catalog |
//! | `crema recommend` | Ranked, confidence-adjusted recommendations |
//! | `crema alerts list` | Show detected changes |
//! | `crema history` | Price-history ledger for a variant or product |
//! | `crema stats` | Database overview |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crema::{alerts, config, db, ledger, migrate, recommend, reconcile, sources, stats};

/// crema — a local-first price tracker and recommendation engine for
/// specialty coffee.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/crema.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "crema",
    about = "crema — a local-first price tracker and recommendation engine for specialty coffee",
    version,
    long_about = "Crema reconciles externally acquired catalog snapshots into SQLite, keeps an \
    append-only price-history ledger, detects user-relevant changes (price drops, stock \
    transitions, new and removed products), and ranks the catalog by a weighted, \
    confidence-adjusted desirability score."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/crema.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// List configured shops and their feed status.
    Shops,

    /// Reconcile shop feeds into the catalog.
    ///
    /// Reads each selected shop's feed file, merges the snapshots into
    /// persisted state, appends price observations to the ledger, and
    /// records alerts for detected changes.
    Sync {
        /// Shop slug, or `all` for every configured shop.
        shop: String,

        /// Show item counts without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of items to process per shop.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show ranked recommendations.
    ///
    /// Scores every active product against the configured weights and
    /// prints the highest-scoring ones, with a per-factor breakdown.
    Recommend {
        /// Show top N results.
        #[arg(long, default_value = "10")]
        top: usize,

        /// Only results in this price tier (budget, mid_range, premium, ultra_premium).
        #[arg(long)]
        tier: Option<String>,

        /// Maximum unit price (per 100g).
        #[arg(long)]
        budget: Option<f64>,

        /// Only products matching this flavor category
        /// (chocolate, fruity, floral, nutty, sweet, spicy).
        #[arg(long)]
        flavor: Option<String>,

        /// Cap results per shop (round-robin across shops).
        #[arg(long)]
        per_shop: Option<usize>,

        /// Emit results as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Manage the alert inbox.
    Alerts {
        #[command(subcommand)]
        action: AlertsAction,
    },

    /// Show the price-history ledger, most recent first.
    History {
        /// Variant id to inspect.
        #[arg(long)]
        variant: Option<i64>,

        /// Product id to inspect (all its variants).
        #[arg(long)]
        product: Option<i64>,

        /// Maximum number of entries.
        #[arg(long, default_value = "50")]
        limit: i64,
    },

    /// Show database statistics.
    Stats,
}

/// Alert inbox subcommands.
#[derive(Subcommand)]
enum AlertsAction {
    /// List recent alerts.
    List {
        /// Maximum number of alerts to show.
        #[arg(long, default_value = "50")]
        limit: i64,

        /// Only unread alerts.
        #[arg(long)]
        unread: bool,
    },

    /// Mark one alert as read.
    Read {
        /// Alert id.
        id: i64,
    },

    /// Mark every alert as read.
    ReadAll,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Shops => {
            sources::list_shops(&cfg)?;
        }
        Commands::Sync {
            shop,
            dry_run,
            limit,
        } => {
            reconcile::run_sync(&cfg, &shop, dry_run, limit).await?;
        }
        Commands::Recommend {
            top,
            tier,
            budget,
            flavor,
            per_shop,
            json,
        } => {
            recommend::run_recommend(&cfg, top, tier, budget, flavor, per_shop, json).await?;
        }
        Commands::Alerts { action } => match action {
            AlertsAction::List { limit, unread } => {
                alerts::run_alerts_list(&cfg, limit, unread).await?;
            }
            AlertsAction::Read { id } => {
                alerts::run_alerts_read(&cfg, Some(id)).await?;
            }
            AlertsAction::ReadAll => {
                alerts::run_alerts_read(&cfg, None).await?;
            }
        },
        Commands::History {
            variant,
            product,
            limit,
        } => {
            ledger::run_history(&cfg, variant, product, limit).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
