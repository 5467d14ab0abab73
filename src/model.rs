//! # Data Model
//!
//! Row types for the four datasets muziki works with, plus the [`Dataset`]
//! table wrapper that remembers which columns its source actually had.
//!
//! Every row type exposes its audio features through [`FeatureRow`], which is
//! the only thing the clusterer and the projection need to know about a row.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

/// One of the four bounded audio features used for clustering and recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Valence,
    Energy,
    Danceability,
    Acousticness,
}

impl Feature {
    /// Fixed feature order: (valence, energy, danceability, acousticness).
    pub const ALL: [Feature; 4] = [
        Feature::Valence,
        Feature::Energy,
        Feature::Danceability,
        Feature::Acousticness,
    ];

    /// Column name of this feature in the source tables.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Feature::Valence => "valence",
            Feature::Energy => "energy",
            Feature::Danceability => "danceability",
            Feature::Acousticness => "acousticness",
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Feature::Valence => 0,
            Feature::Energy => 1,
            Feature::Danceability => 2,
            Feature::Acousticness => 3,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// The ordered tuple (valence, energy, danceability, acousticness).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub valence: f64,
    pub energy: f64,
    pub danceability: f64,
    pub acousticness: f64,
}

impl FeatureVector {
    #[must_use]
    pub const fn new(valence: f64, energy: f64, danceability: f64, acousticness: f64) -> Self {
        Self { valence, energy, danceability, acousticness }
    }

    #[must_use]
    pub const fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Valence => self.valence,
            Feature::Energy => self.energy,
            Feature::Danceability => self.danceability,
            Feature::Acousticness => self.acousticness,
        }
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 4] {
        [self.valence, self.energy, self.danceability, self.acousticness]
    }
}

impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "valence={:.3} energy={:.3} danceability={:.3} acousticness={:.3}",
            self.valence, self.energy, self.danceability, self.acousticness
        )
    }
}

/// A row that carries the four audio features (each possibly missing).
pub trait FeatureRow {
    /// Value of `feature` for this row, `None` when missing.
    fn feature(&self, feature: Feature) -> Option<f64>;

    /// Human-readable label (song name, genre name, ...).
    fn label(&self) -> Cow<'_, str>;

    /// Complete feature vector, or `None` if any feature is missing.
    fn feature_vector(&self) -> Option<FeatureVector> {
        Some(FeatureVector::new(
            self.feature(Feature::Valence)?,
            self.feature(Feature::Energy)?,
            self.feature(Feature::Danceability)?,
            self.feature(Feature::Acousticness)?,
        ))
    }

    /// Features that are missing on this row, in canonical order.
    fn missing_features(&self) -> Vec<Feature> {
        Feature::ALL
            .into_iter()
            .filter(|&f| self.feature(f).is_none())
            .collect()
    }
}

/// Row types that know the full set of columns they can be loaded from.
pub trait Tabular {
    const COLUMNS: &'static [&'static str];
}

/// Derived decade: year rounded down to the nearest 10.
#[must_use]
pub const fn decade_of(year: i32) -> i32 {
    year.div_euclid(10) * 10
}

/// One song of the track dataset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: String,
    pub popularity: f64,
    pub valence: Option<f64>,
    pub energy: Option<f64>,
    pub danceability: Option<f64>,
    pub acousticness: Option<f64>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub instrumentalness: Option<f64>,
    pub liveness: Option<f64>,
    pub loudness: Option<f64>,
}

impl Track {
    #[must_use]
    pub fn decade(&self) -> Option<i32> {
        self.year.map(decade_of)
    }
}

impl FeatureRow for Track {
    fn feature(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Valence => self.valence,
            Feature::Energy => self.energy,
            Feature::Danceability => self.danceability,
            Feature::Acousticness => self.acousticness,
        }
    }

    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }
}

impl Tabular for Track {
    const COLUMNS: &'static [&'static str] = &[
        "id", "name", "artists", "popularity", "valence", "energy", "danceability",
        "acousticness", "year", "genre", "instrumentalness", "liveness", "loudness",
    ];
}

/// Pre-aggregated audio profile of one genre.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenreProfile {
    pub genre: String,
    pub popularity: Option<f64>,
    pub valence: Option<f64>,
    pub energy: Option<f64>,
    pub danceability: Option<f64>,
    pub acousticness: Option<f64>,
}

impl FeatureRow for GenreProfile {
    fn feature(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Valence => self.valence,
            Feature::Energy => self.energy,
            Feature::Danceability => self.danceability,
            Feature::Acousticness => self.acousticness,
        }
    }

    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.genre)
    }
}

impl Tabular for GenreProfile {
    const COLUMNS: &'static [&'static str] =
        &["genres", "popularity", "valence", "energy", "danceability", "acousticness"];
}

/// Pre-aggregated audio profile of one release year.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct YearProfile {
    pub year: i32,
    pub popularity: Option<f64>,
    pub valence: Option<f64>,
    pub energy: Option<f64>,
    pub danceability: Option<f64>,
    pub acousticness: Option<f64>,
}

impl YearProfile {
    #[must_use]
    pub fn new(year: i32) -> Self {
        Self { year, ..Self::default() }
    }
}

impl FeatureRow for YearProfile {
    fn feature(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Valence => self.valence,
            Feature::Energy => self.energy,
            Feature::Danceability => self.danceability,
            Feature::Acousticness => self.acousticness,
        }
    }

    fn label(&self) -> Cow<'_, str> {
        Cow::Owned(self.year.to_string())
    }
}

impl Tabular for YearProfile {
    const COLUMNS: &'static [&'static str] =
        &["year", "popularity", "valence", "energy", "danceability", "acousticness"];
}

/// Pre-aggregated audio profile of one artist.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArtistProfile {
    pub artists: String,
    pub count: Option<u32>,
    pub popularity: Option<f64>,
    pub valence: Option<f64>,
    pub energy: Option<f64>,
    pub danceability: Option<f64>,
    pub acousticness: Option<f64>,
}

impl FeatureRow for ArtistProfile {
    fn feature(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Valence => self.valence,
            Feature::Energy => self.energy,
            Feature::Danceability => self.danceability,
            Feature::Acousticness => self.acousticness,
        }
    }

    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.artists)
    }
}

impl Tabular for ArtistProfile {
    const COLUMNS: &'static [&'static str] = &[
        "artists", "count", "popularity", "valence", "energy", "danceability", "acousticness",
    ];
}

/// A read-only table: rows plus the column names the source provided.
///
/// Column presence is tracked separately from value presence, so a CSV
/// without an `energy` header is distinguishable from one where every
/// `energy` cell is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset<R> {
    columns: BTreeSet<String>,
    rows: Vec<R>,
}

impl<R> Default for Dataset<R> {
    fn default() -> Self {
        Self { columns: BTreeSet::new(), rows: Vec::new() }
    }
}

impl<R> Dataset<R> {
    /// A table with an explicit header set.
    ///
    /// `columns` records which source columns existed, independent of which
    /// fields the row type carries. Clustering checks it before touching rows.
    pub fn new<I, S>(columns: I, rows: Vec<R>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Required audio-feature columns absent from this table.
    #[must_use]
    pub fn missing_feature_columns(&self) -> Vec<Feature> {
        Feature::ALL
            .into_iter()
            .filter(|f| !self.has_column(f.column()))
            .collect()
    }
}

impl<R: Tabular> Dataset<R> {
    /// Table carrying every column of the row type.
    #[must_use]
    pub fn from_rows(rows: Vec<R>) -> Self {
        Self::new(R::COLUMNS.iter().copied(), rows)
    }
}

/// The four datasets of one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub tracks: Dataset<Track>,
    pub genres: Dataset<GenreProfile>,
    pub years: Dataset<YearProfile>,
    pub artists: Dataset<ArtistProfile>,
}

impl Catalog {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
            && self.genres.is_empty()
            && self.years.is_empty()
            && self.artists.is_empty()
    }
}
