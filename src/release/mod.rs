//! Release history layer
//!
//! Fetches a repository's releases, caches them incrementally, and derives
//! per-project semver tiers and cadence statistics.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Fetcher   │────▶│   Merger    │────▶│    Cache    │
//! │  (GitHub)   │     │(incremental)│     │  (SQLite)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                                                ▼
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Report    │◀────│   Cadence   │◀────│ Classifier  │
//! │ (text/json) │     │ (avg/median)│     │ (tag, tier) │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`tag`]: Tag grammar and version coercion
//! - [`types`]: `Release`, `Snapshot` and cache keys
//! - [`fetcher`]: Fetcher trait for paging through releases
//! - [`github`]: GitHub Releases API fetcher
//! - [`cache`]: Snapshot store trait and SQLite implementation
//! - [`merger`]: Incremental merge of fetched pages into a snapshot
//! - [`classifier`]: Major/minor/patch classification per project
//! - [`cadence`]: Average and median gap statistics
//! - [`report`]: Per-project report assembly
//! - [`error`]: Error types for cache, fetch and per-release problems

pub mod cache;
pub mod cadence;
pub mod classifier;
pub mod error;
pub mod fetcher;
pub mod github;
pub mod merger;
pub mod report;
pub mod tag;
pub mod types;
