//! # Session
//!
//! Owns the loaded [`Catalog`] and the [`RuntimeConfig`], and memoizes the
//! expensive results of one run. Clusterings are keyed by `k`, recommendations
//! by `(query, count, exclude_seed)`. The cache never changes a result; it is
//! emptied whenever the catalog is replaced.

use crate::cluster::{cluster, Clustered};
use crate::config::RuntimeConfig;
use crate::db;
use crate::error::{ClusterError, RecommendError};
use crate::model::{Catalog, GenreProfile, Track};
use crate::projection::{project_2d, ProjectedPoint};
use crate::recommend::{recommend, suggest_names, Seed};
use anyhow::{bail, Result};
use log::{debug, info};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

type RecommendKey = (String, usize, bool);

#[derive(Debug, Default)]
struct ResultCache {
    genre_clusters: HashMap<usize, Clustered<GenreProfile>>,
    song_clusters: HashMap<usize, Clustered<Track>>,
    recommendations: HashMap<RecommendKey, Vec<Track>>,
    stats: CacheStats,
}

/// Cache hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// Everything one run of muziki works on.
pub struct Session {
    catalog: Catalog,
    config: RuntimeConfig,
    cache: ResultCache,
    fingerprint: Option<String>,
}

impl Session {
    /// A session over an in-memory catalog, with an empty cache.
    #[must_use]
    pub fn new(catalog: Catalog, config: RuntimeConfig) -> Self {
        Self {
            catalog,
            config,
            cache: ResultCache::default(),
            fingerprint: None,
        }
    }

    /// Load the catalog stored at `config.db_path`.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened or holds no import yet.
    pub fn open(config: RuntimeConfig) -> Result<Self> {
        if !config.db_path.exists() {
            bail!(
                "No catalog at {}. Run `muziki import` first.",
                config.db_path.display()
            );
        }
        let conn = db::open(&config.db_path)?;
        if !db::has_catalog(&conn)? {
            bail!(
                "The database at {} holds no catalog. Run `muziki import` first.",
                config.db_path.display()
            );
        }

        let catalog = db::load_catalog(&conn)?;
        let fingerprint = db::catalog_fingerprint(&conn)?;
        info!("Opened catalog {} ({} tracks)", fingerprint.as_deref().unwrap_or("?"), catalog.tracks.len());

        Ok(Self {
            fingerprint,
            ..Self::new(catalog, config)
        })
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Identity of the stored import this session was opened from.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    #[must_use]
    pub const fn cache_stats(&self) -> CacheStats {
        self.cache.stats
    }

    /// Swap in a new catalog and forget every cached result.
    pub fn replace_catalog(&mut self, catalog: Catalog) {
        self.catalog = catalog;
        self.cache = ResultCache::default();
        self.fingerprint = None;
        debug!("Catalog replaced, result cache cleared");
    }

    /// Cluster the genre table into `k` groups.
    ///
    /// The first call per `k` runs [`cluster`]; later calls return the cached
    /// result, which is identical to a fresh run.
    ///
    /// # Errors
    ///
    /// Any [`ClusterError`] from [`cluster`]. Errors are not cached.
    pub fn cluster_genres(&mut self, k: usize) -> Result<&Clustered<GenreProfile>, ClusterError> {
        match self.cache.genre_clusters.entry(k) {
            Entry::Occupied(entry) => {
                self.cache.stats.hits += 1;
                Ok(&*entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let clustered = cluster(&self.catalog.genres, k, &self.config.cluster)?;
                self.cache.stats.misses += 1;
                Ok(&*entry.insert(clustered))
            }
        }
    }

    /// Cluster the track table into `k` groups, memoized like
    /// [`Session::cluster_genres`].
    ///
    /// # Errors
    ///
    /// Any [`ClusterError`] from [`cluster`].
    pub fn cluster_songs(&mut self, k: usize) -> Result<&Clustered<Track>, ClusterError> {
        match self.cache.song_clusters.entry(k) {
            Entry::Occupied(entry) => {
                self.cache.stats.hits += 1;
                Ok(&*entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let clustered = cluster(&self.catalog.tracks, k, &self.config.cluster)?;
                self.cache.stats.misses += 1;
                Ok(&*entry.insert(clustered))
            }
        }
    }

    /// Recommendations for the first track whose name contains `query`.
    ///
    /// Cached per query, count and the current `exclude_seed` setting.
    ///
    /// # Errors
    ///
    /// Any [`RecommendError`] from [`recommend`]. Errors are not cached.
    pub fn recommend(&mut self, query: &str, count: usize) -> Result<&[Track], RecommendError> {
        let config = self.config.recommend;
        let key = (query.to_string(), count, config.exclude_seed);
        match self.cache.recommendations.entry(key) {
            Entry::Occupied(entry) => {
                self.cache.stats.hits += 1;
                Ok(entry.into_mut().as_slice())
            }
            Entry::Vacant(entry) => {
                let picks = recommend(Seed::Name(query), &self.catalog.tracks, count, &config)?;
                self.cache.stats.misses += 1;
                Ok(entry.insert(picks).as_slice())
            }
        }
    }

    /// Near-spellings of `query` among the track names.
    #[must_use]
    pub fn suggestions(&self, query: &str) -> Vec<String> {
        suggest_names(query, &self.catalog.tracks, 5)
    }

    /// 2-D coordinates of the genre profiles, for plotting clusters.
    ///
    /// # Errors
    ///
    /// Same validation as clustering: empty table or missing feature columns.
    pub fn project_genres(&self) -> Result<Vec<ProjectedPoint>, ClusterError> {
        project_2d(&self.catalog.genres)
    }

    /// 2-D coordinates of the tracks.
    ///
    /// # Errors
    ///
    /// Same validation as clustering.
    pub fn project_songs(&self) -> Result<Vec<ProjectedPoint>, ClusterError> {
        project_2d(&self.catalog.tracks)
    }

    /// Toggle whether later recommendations leave out the seed row.
    pub fn set_exclude_seed(&mut self, exclude_seed: bool) {
        self.config.recommend.exclude_seed = exclude_seed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dataset;

    fn track(name: &str, popularity: f64, v: f64) -> Track {
        Track {
            name: name.to_string(),
            popularity,
            valence: Some(v),
            energy: Some(0.5),
            danceability: Some(0.5),
            acousticness: Some(0.5),
            ..Track::default()
        }
    }

    fn genre(name: &str, v: f64) -> GenreProfile {
        GenreProfile {
            genre: name.to_string(),
            popularity: None,
            valence: Some(v),
            energy: Some(v),
            danceability: Some(1.0 - v),
            acousticness: Some(0.5),
        }
    }

    fn session() -> Session {
        let catalog = Catalog {
            tracks: Dataset::from_rows(vec![
                track("Seed", 10.0, 0.5),
                track("Near", 70.0, 0.55),
                track("Far", 90.0, 0.95),
            ]),
            genres: Dataset::from_rows((0..6).map(|i| genre(&format!("g{i}"), f64::from(i) / 5.0)).collect()),
            ..Catalog::default()
        };
        let mut config = RuntimeConfig::default();
        config.cluster.n_init = 3;
        Session::new(catalog, config)
    }

    #[test]
    fn test_cluster_results_are_memoized() {
        let mut session = session();
        let first = session.cluster_genres(2).unwrap().clone();
        let second = session.cluster_genres(2).unwrap().clone();

        assert_eq!(first, second);
        assert_eq!(session.cache_stats(), CacheStats { hits: 1, misses: 1 });

        let uncached = cluster(&session.catalog().genres, 2, &session.config().cluster).unwrap();
        assert_eq!(first, uncached, "Cached and fresh results must match");
    }

    #[test]
    fn test_recommend_memoized_per_key() {
        let mut session = session();
        let names: Vec<String> = session.recommend("seed", 5).unwrap().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, ["Near", "Seed"]);

        session.recommend("seed", 5).unwrap();
        session.recommend("seed", 1).unwrap();
        assert_eq!(session.cache_stats(), CacheStats { hits: 1, misses: 2 });

        session.set_exclude_seed(true);
        let names: Vec<String> = session.recommend("seed", 5).unwrap().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, ["Near"]);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let mut session = session();
        assert!(session.recommend("missing", 5).is_err());
        assert!(session.cluster_songs(10).is_err());
        assert_eq!(session.cache_stats(), CacheStats::default());
    }

    #[test]
    fn test_replace_catalog_clears_cache() {
        let mut session = session();
        session.cluster_genres(2).unwrap();
        session.recommend("seed", 5).unwrap();

        session.replace_catalog(Catalog {
            tracks: Dataset::from_rows(vec![track("Other", 1.0, 0.1)]),
            ..Catalog::default()
        });

        assert!(matches!(
            session.recommend("seed", 5),
            Err(RecommendError::SongNotFound { .. })
        ));
        assert!(matches!(session.cluster_genres(2), Err(ClusterError::EmptyDataset)));
        assert_eq!(session.cache_stats(), CacheStats::default());
    }

    #[test]
    fn test_projection_and_suggestions() {
        let session = session();
        assert_eq!(session.project_genres().unwrap().len(), 6);
        assert_eq!(session.project_songs().unwrap().len(), 3);
        assert_eq!(session.suggestions("Neer"), ["Near"]);
    }
}
