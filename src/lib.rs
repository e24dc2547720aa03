//! # crema
//!
//! A local-first price tracker and recommendation engine for specialty
//! coffee. Crema reconciles externally acquired catalog snapshots into
//! SQLite, keeps an append-only price-history ledger, detects user-relevant
//! changes (price drops, stock transitions, new and removed products), and
//! ranks the catalog by a weighted, confidence-adjusted desirability score.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │ Snapshot    │──▶│  Reconciler  │──▶│  SQLite    │
//! │ sources     │   │ merge + diff │   │ + ledger  │
//! └─────────────┘   └──────┬───────┘   └────┬──────┘
//!                          │ change events  │
//!                          ▼                ▼
//!                   ┌────────────┐   ┌────────────┐
//!                   │   Alert    │   │   Score    │
//!                   │  detector  │   │ calculator │
//!                   └────────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! crema init                       # create database
//! crema sync all                   # reconcile all shop feeds
//! crema recommend --top 10         # ranked recommendations
//! crema alerts list --unread       # what changed
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types and the snapshot feed contract |
//! | [`sources`] | Acquisition seam ([`sources::SnapshotSource`]) |
//! | [`reconcile`] | Snapshot merge, staleness sweep, change events |
//! | [`ledger`] | Append-only price history |
//! | [`alerts`] | Change detection rules and the alert inbox |
//! | [`scoring`] | Weighted, confidence-adjusted recommendation scores |
//! | [`normalize`] | Raw quantities → 0–100 factor scores |
//! | [`tiers`] | Price and origin tier classifiers |
//! | [`flavor`] | Flavor profile classification |
//! | [`discount`] | Discount detection heuristics |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod alerts;
pub mod catalog;
pub mod config;
pub mod db;
pub mod discount;
pub mod flavor;
pub mod ledger;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod price;
pub mod recommend;
pub mod reconcile;
pub mod scoring;
pub mod sources;
pub mod stats;
pub mod tiers;
