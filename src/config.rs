//! # Configuration Module
//!
//! Data directory setup and the runtime configuration of muziki.
//!
//! ## Data Storage
//!
//! The imported catalog lives in the platform-standard data directory:
//! - Linux: `~/.local/share/muziki/catalog.db`
//! - macOS: `~/Library/Application Support/muziki/catalog.db`
//! - Windows: `%APPDATA%\muziki\catalog.db`
//!
//! ## Config File
//!
//! An optional JSON file overrides the defaults. Every field is optional:
//!
//! ```json
//! {
//!   "cluster": { "seed": 7, "n_init": 4 },
//!   "recommend": { "tolerance": 0.05 },
//!   "song_clusters": 12
//! }
//! ```

use crate::cluster::ClusterConfig;
use crate::recommend::RecommendConfig;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "muziki";
const DB_FILE: &str = "catalog.db";

/// Returns the muziki data directory, creating it if needed.
///
/// # Errors
///
/// Fails if the platform has no data directory or it cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let app_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create muziki data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir)
}

/// Returns the default catalog database path.
///
/// ```no_run
/// use muziki::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Catalog location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE))
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Path to the catalog database
    pub db_path: PathBuf,
    pub cluster: ClusterConfig,
    pub recommend: RecommendConfig,
    /// Default k for genre clustering
    pub genre_clusters: usize,
    /// Default k for song clustering
    pub song_clusters: usize,
    /// Default number of recommendations
    pub recommendations: usize,
    /// Where exported playlists are written
    pub playlist_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let data_dir = get_data_dir().unwrap_or_else(|err| {
            warn!("{err:#}. Falling back to the current directory.");
            PathBuf::from(".")
        });
        Self {
            db_path: data_dir.join(DB_FILE),
            cluster: ClusterConfig::default(),
            recommend: RecommendConfig::default(),
            genre_clusters: 5,
            song_clusters: 25,
            recommendations: 10,
            playlist_dir: data_dir.join("playlists"),
        }
    }
}

impl RuntimeConfig {
    /// Load from a JSON file. `None` or a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.filter(|p| p.exists()) else {
            debug!("No config file, using defaults");
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Create configuration with explicit database path
    #[must_use]
    pub fn with_db_path(mut self, db_path: PathBuf) -> Self {
        self.db_path = db_path;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.db_path.file_name().unwrap(), "catalog.db");
        assert_eq!(config.genre_clusters, 5);
        assert_eq!(config.song_clusters, 25);
        assert_eq!(config.recommendations, 10);
        assert_eq!(config.cluster.seed, 42);
        assert_eq!(config.cluster.n_init, 10);
        assert!((config.recommend.tolerance - 0.1).abs() < f64::EPSILON);
        assert!(!config.recommend.exclude_seed);
    }

    #[test]
    fn test_default_paths_live_in_the_data_dir() {
        let Ok(data_dir) = get_data_dir() else {
            return;
        };
        assert!(data_dir.is_dir(), "The data directory is created on demand");
        assert!(data_dir.ends_with("muziki"));

        let config = RuntimeConfig::default();
        assert_eq!(config.db_path, get_db_path().unwrap());
        assert_eq!(config.db_path, data_dir.join("catalog.db"));
        assert_eq!(config.playlist_dir, data_dir.join("playlists"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(RuntimeConfig::load(None).unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"cluster": {{"seed": 7}}, "song_clusters": 12}}"#).unwrap();

        let config = RuntimeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.cluster.seed, 7);
        assert_eq!(config.cluster.n_init, 10, "Unset nested fields keep defaults");
        assert_eq!(config.song_clusters, 12);
        assert_eq!(config.genre_clusters, 5);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(RuntimeConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_with_db_path() {
        let config = RuntimeConfig::default().with_db_path(PathBuf::from("/tmp/x.db"));
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
    }
}
