//! # Feature-Range Recommendations
//!
//! Given a seed song (by name or by feature vector), keep only the tracks whose
//! four audio features all lie within `tolerance` of the seed's, drop exact
//! duplicate rows, and return the most popular survivors.
//!
//! ## Seed Policy
//!
//! The seed row always passes its own windows and is kept in the results by
//! default. Set [`RecommendConfig::exclude_seed`] to drop rows identical to it.
//!
//! ```
//! use muziki::model::{Dataset, Track};
//! use muziki::recommend::{recommend, RecommendConfig, Seed};
//!
//! let track = |name: &str, popularity: f64, v: f64| Track {
//!     name: name.to_string(),
//!     popularity,
//!     valence: Some(v),
//!     energy: Some(0.6),
//!     danceability: Some(0.7),
//!     acousticness: Some(0.1),
//!     ..Track::default()
//! };
//! let tracks = Dataset::from_rows(vec![
//!     track("Seed Song", 10.0, 0.50),
//!     track("Close", 80.0, 0.55),
//!     track("Far", 99.0, 0.90),
//! ]);
//!
//! let picks = recommend(Seed::Name("seed"), &tracks, 5, &RecommendConfig::default())?;
//! let names: Vec<_> = picks.iter().map(|t| t.name.as_str()).collect();
//! assert_eq!(names, ["Close", "Seed Song"]);
//! # Ok::<(), muziki::error::RecommendError>(())
//! ```

use crate::error::RecommendError;
use crate::model::{Dataset, Feature, FeatureRow, FeatureVector, Track};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Recommendation tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    /// Half-width of the window around each seed feature (inclusive).
    pub tolerance: f64,
    /// Drop rows identical to the seed row from the results.
    pub exclude_seed: bool,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            exclude_seed: false,
        }
    }
}

/// What to recommend from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Seed<'a> {
    /// Case-insensitive substring of a track name; the first match is used.
    Name(&'a str),
    Vector(FeatureVector),
}

/// Hashable identity of a whole track row, used to drop exact duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TrackKey<'a> {
    id: &'a str,
    name: &'a str,
    artists: &'a str,
    genre: Option<&'a str>,
    year: Option<i32>,
    numbers: [Option<u64>; 8],
}

impl<'a> From<&'a Track> for TrackKey<'a> {
    fn from(track: &'a Track) -> Self {
        let bits = |value: Option<f64>| value.map(f64::to_bits);
        Self {
            id: &track.id,
            name: &track.name,
            artists: &track.artists,
            genre: track.genre.as_deref(),
            year: track.year,
            numbers: [
                Some(track.popularity.to_bits()),
                bits(track.valence),
                bits(track.energy),
                bits(track.danceability),
                bits(track.acousticness),
                bits(track.instrumentalness),
                bits(track.liveness),
                bits(track.loudness),
            ],
        }
    }
}

/// First track whose name contains `query`, ignoring case.
///
/// # Errors
///
/// [`RecommendError::SongNotFound`] when nothing matches or the table has
/// no `name` column.
pub fn find_song<'a>(query: &str, tracks: &'a Dataset<Track>) -> Result<&'a Track, RecommendError> {
    let not_found = || RecommendError::SongNotFound { query: query.to_string() };
    if !tracks.has_column("name") {
        warn!("'name' column not found in dataset.");
        return Err(not_found());
    }

    let needle = query.to_lowercase();
    tracks
        .rows()
        .iter()
        .find(|track| track.name.to_lowercase().contains(&needle))
        .ok_or_else(not_found)
}

/// Slack for decimal bounds that do not survive f64 arithmetic (`0.7 + 0.1 < 0.8`).
const WINDOW_EPSILON: f64 = 1e-9;

/// Whether every feature of `track` lies in `[seed - tolerance, seed + tolerance]`.
///
/// Both bounds are inclusive, with a `1e-9` slack for rounding.
#[must_use]
pub fn within_window(track: &Track, seed: &FeatureVector, tolerance: f64) -> bool {
    let reach = tolerance + WINDOW_EPSILON;
    Feature::ALL.into_iter().all(|feature| {
        let target = seed.get(feature);
        track
            .feature(feature)
            .is_some_and(|value| (value - target).abs() <= reach)
    })
}

/// Up to `count` tracks similar to `seed`, most popular first.
///
/// # Errors
///
/// - [`RecommendError::InvalidCount`] when `count == 0`
/// - [`RecommendError::SongNotFound`] when a name seed matches nothing
/// - [`RecommendError::IncompleteFeatures`] when the matched seed lacks a feature
/// - [`RecommendError::EmptyResult`] when no candidate survives the windows
pub fn recommend(
    seed: Seed<'_>,
    tracks: &Dataset<Track>,
    count: usize,
    config: &RecommendConfig,
) -> Result<Vec<Track>, RecommendError> {
    if count == 0 {
        return Err(RecommendError::InvalidCount);
    }

    let (features, seed_row, seed_label) = match seed {
        Seed::Name(query) => {
            let song = find_song(query, tracks)?;
            let features = song.feature_vector().ok_or_else(|| RecommendError::IncompleteFeatures {
                name: song.name.clone(),
                missing: song.missing_features(),
            })?;
            debug!("Seed '{}' matched for query '{query}': {features}", song.name);
            (features, Some(song), format!("'{}'", song.name))
        }
        Seed::Vector(features) => (features, None, format!("({features})")),
    };

    let seed_key = seed_row.filter(|_| config.exclude_seed).map(TrackKey::from);
    let mut seen = HashSet::new();
    let mut candidates: Vec<&Track> = tracks
        .rows()
        .iter()
        .filter(|track| within_window(track, &features, config.tolerance))
        .filter(|track| seen.insert(TrackKey::from(*track)))
        .filter(|track| seed_key.as_ref().map_or(true, |key| *key != TrackKey::from(*track)))
        .collect();

    if candidates.is_empty() {
        info!("No candidates within ±{} of {seed_label}.", config.tolerance);
        return Err(RecommendError::EmptyResult { seed: seed_label });
    }

    // Stable: equal popularity keeps input order.
    candidates.sort_by(|a, b| b.popularity.total_cmp(&a.popularity));
    debug!("{} candidates survived the feature windows.", candidates.len());

    Ok(candidates.into_iter().take(count).cloned().collect())
}

/// Track names that look like near-spellings of `query`, best first.
#[must_use]
pub fn suggest_names(query: &str, tracks: &Dataset<Track>, limit: usize) -> Vec<String> {
    const MIN_SIMILARITY: f64 = 0.8;
    let needle = query.to_lowercase();

    let mut seen = HashSet::new();
    let mut scored: Vec<(f64, &str)> = tracks
        .rows()
        .iter()
        .map(|track| track.name.as_str())
        .filter(|name| seen.insert(*name))
        .map(|name| (strsim::jaro_winkler(&needle, &name.to_lowercase()), name))
        .filter(|(score, _)| *score >= MIN_SIMILARITY)
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(limit).map(|(_, name)| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str, popularity: f64, v: f64, e: f64, d: f64, a: f64) -> Track {
        Track {
            id: name.to_lowercase().replace(' ', "-"),
            name: name.to_string(),
            artists: "Someone".to_string(),
            popularity,
            valence: Some(v),
            energy: Some(e),
            danceability: Some(d),
            acousticness: Some(a),
            ..Track::default()
        }
    }

    fn scenario() -> Dataset<Track> {
        Dataset::from_rows(vec![
            track("Seed Song", 60.0, 0.50, 0.60, 0.70, 0.10),
            track("Candidate A", 80.0, 0.55, 0.65, 0.75, 0.12),
            track("Candidate B", 95.0, 0.65, 0.60, 0.70, 0.10),
            track("Candidate C", 40.0, 0.55, 0.65, 0.75, 0.12),
        ])
    }

    fn names(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_scenario_window_and_ranking() {
        let picks = recommend(Seed::Name("seed song"), &scenario(), 10, &RecommendConfig::default()).unwrap();
        assert_eq!(names(&picks), ["Candidate A", "Seed Song", "Candidate C"]);
    }

    fn edge_pair(seed: f64, edge: f64) -> Dataset<Track> {
        Dataset::from_rows(vec![
            track("Seed", 10.0, seed, 0.5, 0.5, 0.5),
            track("Edge", 20.0, edge, 0.5, 0.5, 0.5),
        ])
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let config = RecommendConfig { exclude_seed: true, ..RecommendConfig::default() };
        for (seed, edge) in [(0.5, 0.6), (0.5, 0.4), (0.7, 0.8), (0.2, 0.3), (0.3, 0.2)] {
            let picks = recommend(Seed::Name("seed"), &edge_pair(seed, edge), 5, &config)
                .unwrap_or_else(|err| panic!("{edge} should sit inside the window of {seed}: {err}"));
            assert_eq!(names(&picks), ["Edge"]);
        }
    }

    #[test]
    fn test_just_outside_the_window_is_dropped() {
        let config = RecommendConfig { exclude_seed: true, ..RecommendConfig::default() };
        let result = recommend(Seed::Name("seed"), &edge_pair(0.7, 0.8001), 5, &config);
        assert!(matches!(result, Err(RecommendError::EmptyResult { .. })));
    }

    #[test]
    fn test_results_respect_windows_and_order() {
        let data = scenario();
        let seed = FeatureVector::new(0.5, 0.6, 0.7, 0.1);
        let picks = recommend(Seed::Vector(seed), &data, 10, &RecommendConfig::default()).unwrap();

        assert!(picks.iter().all(|t| within_window(t, &seed, 0.1)));
        assert!(picks.windows(2).all(|w| w[0].popularity >= w[1].popularity));
    }

    #[test]
    fn test_count_limits_output() {
        let picks = recommend(Seed::Name("Seed"), &scenario(), 1, &RecommendConfig::default()).unwrap();
        assert_eq!(names(&picks), ["Candidate A"]);
        assert_eq!(
            recommend(Seed::Name("Seed"), &scenario(), 0, &RecommendConfig::default()),
            Err(RecommendError::InvalidCount)
        );
    }

    #[test]
    fn test_unknown_song() {
        let result = recommend(Seed::Name("Nope"), &scenario(), 5, &RecommendConfig::default());
        assert_eq!(result, Err(RecommendError::SongNotFound { query: "Nope".to_string() }));
    }

    #[test]
    fn test_seed_missing_features() {
        let mut rows = scenario().rows().to_vec();
        rows[0].energy = None;
        let result = recommend(Seed::Name("Seed"), &Dataset::from_rows(rows), 5, &RecommendConfig::default());
        assert_eq!(
            result,
            Err(RecommendError::IncompleteFeatures {
                name: "Seed Song".to_string(),
                missing: vec![Feature::Energy],
            })
        );
    }

    #[test]
    fn test_empty_result() {
        let far = FeatureVector::new(0.0, 0.0, 0.0, 1.0);
        let result = recommend(Seed::Vector(far), &scenario(), 5, &RecommendConfig::default());
        assert!(matches!(result, Err(RecommendError::EmptyResult { .. })));
    }

    #[test]
    fn test_exact_duplicates_are_dropped() {
        let mut rows = scenario().rows().to_vec();
        rows.push(rows[1].clone());
        let picks = recommend(Seed::Name("Seed"), &Dataset::from_rows(rows), 10, &RecommendConfig::default()).unwrap();
        assert_eq!(names(&picks), ["Candidate A", "Seed Song", "Candidate C"]);
    }

    #[test]
    fn test_exclude_seed() {
        let config = RecommendConfig { exclude_seed: true, ..RecommendConfig::default() };
        let picks = recommend(Seed::Name("Seed"), &scenario(), 10, &config).unwrap();
        assert_eq!(names(&picks), ["Candidate A", "Candidate C"]);
    }

    #[test]
    fn test_only_seed_excluded_is_empty() {
        let data = Dataset::from_rows(vec![track("Lonely", 10.0, 0.1, 0.1, 0.1, 0.9)]);
        let config = RecommendConfig { exclude_seed: true, ..RecommendConfig::default() };
        assert!(recommend(Seed::Name("lonely"), &data, 3, &config)
            .unwrap_err()
            .is_empty_result());
    }

    #[test]
    fn test_popularity_ties_keep_input_order() {
        let data = Dataset::from_rows(vec![
            track("First", 50.0, 0.5, 0.5, 0.5, 0.5),
            track("Second", 50.0, 0.52, 0.5, 0.5, 0.5),
            track("Third", 50.0, 0.48, 0.5, 0.5, 0.5),
        ]);
        let picks = recommend(Seed::Name("second"), &data, 3, &RecommendConfig::default()).unwrap();
        assert_eq!(names(&picks), ["First", "Second", "Third"]);
    }

    #[test]
    fn test_candidates_missing_features_are_filtered() {
        let mut rows = scenario().rows().to_vec();
        rows[1].acousticness = None;
        let picks = recommend(Seed::Name("Seed"), &Dataset::from_rows(rows), 10, &RecommendConfig::default()).unwrap();
        assert_eq!(names(&picks), ["Seed Song", "Candidate C"]);
    }

    #[test]
    fn test_first_substring_match_wins() {
        let data = scenario();
        assert_eq!(find_song("CANDIDATE", &data).unwrap().name, "Candidate A");
        let nameless: Dataset<Track> = Dataset::new(["valence"], data.rows().to_vec());
        assert!(find_song("Candidate", &nameless).is_err());
    }

    #[test]
    fn test_suggest_names() {
        let suggestions = suggest_names("Candidat B", &scenario(), 2);
        assert_eq!(suggestions.first().map(String::as_str), Some("Candidate B"));
        assert!(suggest_names("zzzz", &scenario(), 3).is_empty());
    }
}
