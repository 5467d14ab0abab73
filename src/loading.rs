//! # Dataset Ingestion
//!
//! Reads the four CSV tables (tracks, genres, years, artists) into a
//! [`Catalog`]. Each table keeps the header set of its file, so later stages
//! can tell a missing column from missing values.
//!
//! Rows that cannot be parsed are logged and skipped rather than failing the
//! whole import. A missing file is an error.
//!
//! ## Expected Layout
//!
//! ```text
//! datasets/
//! ├── data.csv             tracks
//! ├── data_by_genres.csv   genre aggregates
//! ├── data_by_year.csv     year aggregates
//! └── data_by_artist.csv   artist aggregates
//! ```

use crate::model::{ArtistProfile, Catalog, Dataset, GenreProfile, Track, YearProfile};
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};

pub const TRACKS_FILE: &str = "data.csv";
pub const GENRES_FILE: &str = "data_by_genres.csv";
pub const YEARS_FILE: &str = "data_by_year.csv";
pub const ARTISTS_FILE: &str = "data_by_artist.csv";

/// Where each table comes from. Only the track table is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogPaths {
    pub tracks: PathBuf,
    pub genres: Option<PathBuf>,
    pub years: Option<PathBuf>,
    pub artists: Option<PathBuf>,
}

impl CatalogPaths {
    /// The conventional file names inside `dir`.
    #[must_use]
    pub fn from_dir(dir: &Path) -> Self {
        Self {
            tracks: dir.join(TRACKS_FILE),
            genres: Some(dir.join(GENRES_FILE)),
            years: Some(dir.join(YEARS_FILE)),
            artists: Some(dir.join(ARTISTS_FILE)),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TrackRecord {
    id: Option<String>,
    name: Option<String>,
    artists: Option<String>,
    popularity: Option<f64>,
    valence: Option<f64>,
    energy: Option<f64>,
    danceability: Option<f64>,
    acousticness: Option<f64>,
    #[serde(deserialize_with = "lenient_year")]
    year: Option<i32>,
    #[serde(alias = "genres")]
    genre: Option<String>,
    instrumentalness: Option<f64>,
    liveness: Option<f64>,
    loudness: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GenreRecord {
    #[serde(alias = "genre")]
    genres: Option<String>,
    popularity: Option<f64>,
    valence: Option<f64>,
    energy: Option<f64>,
    danceability: Option<f64>,
    acousticness: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct YearRecord {
    #[serde(deserialize_with = "lenient_year")]
    year: Option<i32>,
    popularity: Option<f64>,
    valence: Option<f64>,
    energy: Option<f64>,
    danceability: Option<f64>,
    acousticness: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ArtistRecord {
    artists: Option<String>,
    #[serde(deserialize_with = "lenient_count")]
    count: Option<u32>,
    popularity: Option<f64>,
    valence: Option<f64>,
    energy: Option<f64>,
    danceability: Option<f64>,
    acousticness: Option<f64>,
}

/// Years and counts sometimes arrive as floats ("1987.0").
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse::<f64>().map(Some).map_err(serde::de::Error::custom),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .filter(|v| v.is_finite())
        .map(|v| v.floor() as i32))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u32))
}

/// `['A', "B"]` becomes `A, B`; anything else is trimmed and kept.
#[must_use]
pub fn normalize_artists(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(inner) => inner
            .split(',')
            .map(|part| part.trim().trim_matches(|c| c == '\'' || c == '"').trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        None => trimmed.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl TrackRecord {
    fn into_track(self) -> Option<Track> {
        let popularity = self.popularity?;
        Some(Track {
            name: non_empty(self.name).unwrap_or_default(),
            id: non_empty(self.id).unwrap_or_default(),
            artists: self.artists.as_deref().map(normalize_artists).unwrap_or_default(),
            popularity,
            valence: self.valence,
            energy: self.energy,
            danceability: self.danceability,
            acousticness: self.acousticness,
            year: self.year,
            genre: non_empty(self.genre),
            instrumentalness: self.instrumentalness,
            liveness: self.liveness,
            loudness: self.loudness,
        })
    }
}

impl GenreRecord {
    fn into_genre(self) -> Option<GenreProfile> {
        Some(GenreProfile {
            genre: non_empty(self.genres)?,
            popularity: self.popularity,
            valence: self.valence,
            energy: self.energy,
            danceability: self.danceability,
            acousticness: self.acousticness,
        })
    }
}

impl YearRecord {
    fn into_year(self) -> Option<YearProfile> {
        Some(YearProfile {
            year: self.year?,
            popularity: self.popularity,
            valence: self.valence,
            energy: self.energy,
            danceability: self.danceability,
            acousticness: self.acousticness,
        })
    }
}

impl ArtistRecord {
    fn into_artist(self) -> Option<ArtistProfile> {
        Some(ArtistProfile {
            artists: self.artists.as_deref().map(normalize_artists).filter(|a| !a.is_empty())?,
            count: self.count,
            popularity: self.popularity,
            valence: self.valence,
            energy: self.energy,
            danceability: self.danceability,
            acousticness: self.acousticness,
        })
    }
}

/// Parse one CSV table. `convert` returns `None` for rows lacking a required value.
///
/// A header row missing one of `required` fails the whole table up front.
fn read_table<Rd, T, R>(
    reader: Rd,
    table: &str,
    required: &[&str],
    convert: impl Fn(T) -> Option<R>,
) -> Result<Dataset<R>>
where
    Rd: io::Read,
    T: DeserializeOwned,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<String> = csv_reader
        .headers()
        .with_context(|| format!("Failed to read the header row of the {table} table"))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();
    if columns.iter().all(String::is_empty) {
        bail!("The {table} table is empty");
    }
    if let Some(missing) = required.iter().find(|name| !columns.iter().any(|c| c.as_str() == **name)) {
        bail!("The {table} table has no '{missing}' column");
    }
    debug!("{table} columns: {columns:?}");

    let mut rows = Vec::new();
    let mut skipped = 0_usize;
    for (index, record) in csv_reader.deserialize::<T>().enumerate() {
        match record {
            Ok(record) => match convert(record) {
                Some(row) => rows.push(row),
                None => {
                    skipped += 1;
                    warn!("Skipping {table} row {}: required value missing.", index + 2);
                }
            },
            Err(err) => {
                skipped += 1;
                warn!("Skipping bad {table} row {}: {err}", index + 2);
            }
        }
    }

    if skipped > 0 {
        warn!("{skipped} {table} rows skipped.");
    }
    info!("Loaded {} {table} rows.", rows.len());
    Ok(Dataset::new(columns, rows))
}

fn open(path: &Path) -> Result<std::fs::File> {
    if !path.exists() {
        bail!("File not found at {}", path.display());
    }
    std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

/// Read the track table (`data.csv`).
///
/// Rows without a popularity value are skipped with a warning, since
/// popularity is the recommendation ranking key. Artist lists written as
/// `['A', 'B']` are flattened to `A, B`.
///
/// # Errors
///
/// Fails if the header row cannot be read or has no `popularity` column.
pub fn read_tracks<Rd: io::Read>(reader: Rd) -> Result<Dataset<Track>> {
    read_table(reader, "tracks", &["popularity"], TrackRecord::into_track)
}

/// Read the genre aggregate table (`data_by_genres.csv`).
///
/// # Errors
///
/// Fails if the header row cannot be read.
pub fn read_genres<Rd: io::Read>(reader: Rd) -> Result<Dataset<GenreProfile>> {
    read_table(reader, "genres", &[], GenreRecord::into_genre)
}

/// Read the year aggregate table (`data_by_year.csv`).
///
/// # Errors
///
/// Fails if the header row cannot be read.
pub fn read_years<Rd: io::Read>(reader: Rd) -> Result<Dataset<YearProfile>> {
    read_table(reader, "years", &[], YearRecord::into_year)
}

/// Read the artist aggregate table (`data_by_artist.csv`).
///
/// # Errors
///
/// Fails if the header row cannot be read.
pub fn read_artists<Rd: io::Read>(reader: Rd) -> Result<Dataset<ArtistProfile>> {
    read_table(reader, "artists", &[], ArtistRecord::into_artist)
}

/// Load every table named in `paths`.
///
/// # Errors
///
/// Fails if a named file does not exist, cannot be read, or has no header row.
pub fn load_catalog(paths: &CatalogPaths) -> Result<Catalog> {
    info!("Importing tracks from {}", paths.tracks.display());
    let tracks = read_tracks(open(&paths.tracks)?)
        .with_context(|| format!("Failed to import {}", paths.tracks.display()))?;

    let genres = match &paths.genres {
        Some(path) => read_genres(open(path)?).with_context(|| format!("Failed to import {}", path.display()))?,
        None => Dataset::default(),
    };
    let years = match &paths.years {
        Some(path) => read_years(open(path)?).with_context(|| format!("Failed to import {}", path.display()))?,
        None => Dataset::default(),
    };
    let artists = match &paths.artists {
        Some(path) => read_artists(open(path)?).with_context(|| format!("Failed to import {}", path.display()))?,
        None => Dataset::default(),
    };

    Ok(Catalog { tracks, genres, years, artists })
}
