//! # Playlist Export
//!
//! Turns a recommendation list into a named playlist. The export target sits
//! behind [`PlaylistExporter`]; the bundled [`JsonFileExporter`] writes one JSON
//! document per playlist into a directory.

use crate::model::Track;
use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_PLAYLIST_NAME: &str = "My MuzikiRec Playlist";

/// A playlist to create: a name and track names in rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRequest {
    pub name: String,
    pub track_names: Vec<String>,
}

impl PlaylistRequest {
    /// Build a request from ranked recommendations, keeping their order.
    #[must_use]
    pub fn from_tracks(name: impl Into<String>, tracks: &[Track]) -> Self {
        Self {
            name: name.into(),
            track_names: tracks.iter().map(|t| t.name.clone()).collect(),
        }
    }
}

/// Handle of a created playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPlaylist {
    pub id: String,
    pub url: String,
    pub track_count: usize,
}

/// Somewhere a playlist can be created.
pub trait PlaylistExporter {
    /// Create the playlist and return its handle.
    ///
    /// # Errors
    ///
    /// Implementations fail on empty requests and on storage errors.
    fn export(&self, request: &PlaylistRequest) -> Result<CreatedPlaylist>;
}

/// Writes `<slug>.json` files into `dir`.
#[derive(Debug, Clone)]
pub struct JsonFileExporter {
    pub dir: PathBuf,
}

impl JsonFileExporter {
    /// Exporter writing into `dir`, which is created on first export.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Lower-case ASCII alphanumerics joined by single dashes.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

impl PlaylistExporter for JsonFileExporter {
    fn export(&self, request: &PlaylistRequest) -> Result<CreatedPlaylist> {
        if request.track_names.is_empty() {
            bail!("Refusing to export playlist '{}' without tracks", request.name);
        }

        let mut id = slugify(&request.name);
        if id.is_empty() {
            id = "playlist".to_string();
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create playlist directory {}", self.dir.display()))?;
        let path = self.dir.join(format!("{id}.json"));
        let json = serde_json::to_string_pretty(request).context("Failed to serialize playlist")?;
        fs::write(&path, json).with_context(|| format!("Failed to write playlist {}", path.display()))?;

        let absolute = fs::canonicalize(&path).unwrap_or(path);
        info!("Exported {} tracks to {}", request.track_names.len(), absolute.display());

        Ok(CreatedPlaylist {
            id,
            url: format!("file://{}", absolute.display()),
            track_count: request.track_names.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str) -> Track {
        Track {
            name: name.to_string(),
            ..Track::default()
        }
    }

    #[test]
    fn test_from_tracks_keeps_rank_order() {
        let request = PlaylistRequest::from_tracks("Mix", &[track("b"), track("a"), track("c")]);
        assert_eq!(request.track_names, ["b", "a", "c"]);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify(DEFAULT_PLAYLIST_NAME), "my-muzikirec-playlist");
        assert_eq!(slugify("  Rock & Roll!! "), "rock-roll");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_json_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = JsonFileExporter::new(dir.path());
        let request = PlaylistRequest::from_tracks(DEFAULT_PLAYLIST_NAME, &[track("One"), track("Two")]);

        let created = exporter.export(&request).unwrap();
        assert_eq!(created.id, "my-muzikirec-playlist");
        assert_eq!(created.track_count, 2);
        assert!(created.url.starts_with("file://"));

        let written = fs::read_to_string(dir.path().join("my-muzikirec-playlist.json")).unwrap();
        let parsed: PlaylistRequest = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_empty_playlist_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = JsonFileExporter::new(dir.path());
        let request = PlaylistRequest::from_tracks("Empty", &[]);
        assert!(exporter.export(&request).is_err());
        assert!(!dir.path().join("empty.json").exists());
    }
}
