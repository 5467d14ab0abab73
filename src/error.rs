//! Typed failures of the clustering and recommendation core.
//!
//! Everything above the core (ingestion, persistence, CLI) works with
//! `anyhow::Result`; these enums exist so callers can match on the reason.

use crate::model::Feature;
use thiserror::Error;

fn join_features(features: &[Feature]) -> String {
    features
        .iter()
        .map(|f| f.column())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a clustering or projection call was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    #[error("missing feature columns: {}", join_features(.0))]
    MissingColumns(Vec<Feature>),

    #[error("dataset has no rows to cluster")]
    EmptyDataset,

    #[error("cannot form {k} clusters from {rows} rows")]
    InsufficientData { rows: usize, k: usize },

    #[error("cluster count must be at least 1")]
    InvalidClusterCount,
}

/// Why a recommendation call produced no list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecommendError {
    #[error("song '{query}' not found, try a different title")]
    SongNotFound { query: String },

    #[error("'{name}' is missing sound features needed for recommendation: {}", join_features(.missing))]
    IncompleteFeatures { name: String, missing: Vec<Feature> },

    #[error("no songs are close enough to {seed}")]
    EmptyResult { seed: String },

    #[error("recommendation count must be at least 1")]
    InvalidCount,
}

impl RecommendError {
    /// `EmptyResult` is an expected outcome rather than a failure.
    #[must_use]
    pub const fn is_empty_result(&self) -> bool {
        matches!(self, RecommendError::EmptyResult { .. })
    }
}
