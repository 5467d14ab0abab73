//! Music catalog clustering and feature-range recommendations.
//!
//! Core modules:
//! - [`model`] - Row types and the column-aware [`model::Dataset`] table
//! - [`cluster`] - k-means over min-max scaled audio features
//! - [`recommend`] - Feature-window recommendations ranked by popularity
//! - [`projection`] - 2-D PCA coordinates for cluster plots
//! - [`explore`] - Decade, trend, genre, word and artist aggregates
//!
//! ### Supporting Modules
//!
//! - [`loading`] - CSV ingestion
//! - [`db`] - SQLite catalog storage
//! - [`session`] - Catalog, config and memoized results of one run
//! - [`playlist`] - Playlist export
//! - [`config`] - Configuration and data directory management
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use muziki::config::RuntimeConfig;
//! use muziki::loading::{load_catalog, CatalogPaths};
//! use muziki::session::Session;
//! use std::path::Path;
//!
//! let catalog = load_catalog(&CatalogPaths::from_dir(Path::new("datasets")))?;
//! let mut session = Session::new(catalog, RuntimeConfig::default());
//!
//! for group in muziki::cluster::cluster_members(session.cluster_genres(5)?) {
//!     println!("Cluster {}: {}", group.cluster, group.joined());
//! }
//!
//! for track in session.recommend("Mas Que Nada", 10)? {
//!     println!("{} - {}", track.name, track.artists);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! The algorithms return typed errors ([`error::ClusterError`],
//! [`error::RecommendError`]). Everything touching files or the database
//! returns `anyhow::Result` with context attached.
//!
//! ## Logging
//!
//! All modules log through the `log` facade. The binary installs
//! `env_logger`, so `RUST_LOG=muziki::cluster=debug` shows restart details.

pub mod cli;
pub mod cluster;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod explore;
pub mod loading;
pub mod model;
pub mod playlist;
pub mod projection;
pub mod recommend;
pub mod session;
