//! Exploratory aggregates over the catalog: the numbers behind the decade,
//! trend, top-genre, word-cloud and top-artist charts.
//!
//! Rendering is someone else's job; everything here returns plain,
//! serializable rows.

use crate::model::{ArtistProfile, Dataset, GenreProfile, Track};
use log::warn;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Sound features charted per decade.
const TREND_FEATURES: [&str; 7] = [
    "acousticness",
    "danceability",
    "energy",
    "instrumentalness",
    "liveness",
    "valence",
    "loudness",
];

fn trend_value(track: &Track, feature: &str) -> Option<f64> {
    match feature {
        "acousticness" => track.acousticness,
        "danceability" => track.danceability,
        "energy" => track.energy,
        "instrumentalness" => track.instrumentalness,
        "liveness" => track.liveness,
        "valence" => track.valence,
        "loudness" => track.loudness,
        _ => None,
    }
}

// Word-cloud noise.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "de", "del", "el", "for", "in", "la", "le", "los", "of", "on", "the", "to",
    "with", "y",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecadeCount {
    pub decade: i32,
    pub track_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecadeTrend {
    pub decade: i32,
    /// Mean per feature; features with no values in the decade are absent.
    pub means: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

/// Track counts per decade, oldest first. Tracks without a year are skipped.
#[must_use]
pub fn decade_distribution(tracks: &Dataset<Track>) -> Vec<DecadeCount> {
    if !tracks.has_column("year") {
        warn!("'year' column missing, no decade distribution.");
        return Vec::new();
    }

    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for decade in tracks.rows().iter().filter_map(Track::decade) {
        *counts.entry(decade).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(decade, track_count)| DecadeCount { decade, track_count })
        .collect()
}

/// Mean of every present sound feature per decade, oldest first.
#[must_use]
pub fn feature_trends(tracks: &Dataset<Track>) -> Vec<DecadeTrend> {
    if !tracks.has_column("year") {
        warn!("'year' column missing, no feature trends.");
        return Vec::new();
    }

    let present: Vec<&str> = TREND_FEATURES
        .into_iter()
        .filter(|name| {
            let has = tracks.has_column(name);
            if !has {
                warn!("Missing feature: {name}");
            }
            has
        })
        .collect();

    let mut sums: BTreeMap<i32, HashMap<&str, (f64, usize)>> = BTreeMap::new();
    for track in tracks.rows() {
        let Some(decade) = track.decade() else { continue };
        let entry = sums.entry(decade).or_default();
        for &name in &present {
            if let Some(value) = trend_value(track, name).filter(|v| v.is_finite()) {
                let (sum, count) = entry.entry(name).or_insert((0.0, 0));
                *sum += value;
                *count += 1;
            }
        }
    }

    sums.into_iter()
        .map(|(decade, features)| DecadeTrend {
            decade,
            means: features
                .into_iter()
                .filter(|(_, (_, count))| *count > 0)
                .map(|(name, (sum, count))| {
                    #[allow(clippy::cast_precision_loss)]
                    let mean = sum / count as f64;
                    (name.to_string(), mean)
                })
                .collect(),
        })
        .collect()
}

/// Descending on `Some`, with `None` last.
fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// The `n` most popular genres with their feature profiles.
#[must_use]
pub fn top_genres(genres: &Dataset<GenreProfile>, n: usize) -> Vec<GenreProfile> {
    let mut ranked: Vec<&GenreProfile> = genres.rows().iter().collect();
    ranked.sort_by(|a, b| descending(a.popularity, b.popularity));
    ranked.into_iter().take(n).cloned().collect()
}

/// The `n` artists with the most tracks.
#[must_use]
pub fn top_artists_by_count(artists: &Dataset<ArtistProfile>, n: usize) -> Vec<ArtistProfile> {
    let mut ranked: Vec<&ArtistProfile> = artists.rows().iter().collect();
    ranked.sort_by(|a, b| descending(a.count.map(f64::from), b.count.map(f64::from)));
    ranked.into_iter().take(n).cloned().collect()
}

/// The `n` artists with the highest popularity.
#[must_use]
pub fn top_artists_by_popularity(artists: &Dataset<ArtistProfile>, n: usize) -> Vec<ArtistProfile> {
    let mut ranked: Vec<&ArtistProfile> = artists.rows().iter().collect();
    ranked.sort_by(|a, b| descending(a.popularity, b.popularity));
    ranked.into_iter().take(n).cloned().collect()
}

/// Most frequent words across `texts`, for a word cloud.
///
/// Words are lower-cased and trimmed of surrounding punctuation; stopwords
/// and empty tokens are dropped. Ordered by count, then alphabetically.
#[must_use]
pub fn word_frequencies<'a, I>(texts: I, max_words: usize) -> Vec<WordCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for raw in text.split_whitespace() {
            let word = raw
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() || STOPWORDS.contains(&word.as_str()) {
                continue;
            }
            *counts.entry(word).or_default() += 1;
        }
    }

    let mut words: Vec<WordCount> = counts
        .into_iter()
        .map(|(word, count)| WordCount { word, count })
        .collect();
    words.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    words.truncate(max_words);
    words
}

/// Word cloud over the genre names.
#[must_use]
pub fn genre_words(genres: &Dataset<GenreProfile>, max_words: usize) -> Vec<WordCount> {
    word_frequencies(genres.rows().iter().map(|g| g.genre.as_str()), max_words)
}

/// Word cloud over the artist names.
#[must_use]
pub fn artist_words(artists: &Dataset<ArtistProfile>, max_words: usize) -> Vec<WordCount> {
    word_frequencies(artists.rows().iter().map(|a| a.artists.as_str()), max_words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(year: Option<i32>, energy: Option<f64>) -> Track {
        Track {
            name: "t".to_string(),
            year,
            energy,
            valence: Some(0.5),
            ..Track::default()
        }
    }

    #[test]
    fn test_decade_distribution() {
        let tracks = Dataset::from_rows(vec![
            track(Some(1987), None),
            track(Some(1981), None),
            track(Some(2004), None),
            track(None, None),
        ]);
        assert_eq!(
            decade_distribution(&tracks),
            vec![
                DecadeCount { decade: 1980, track_count: 2 },
                DecadeCount { decade: 2000, track_count: 1 },
            ]
        );
    }

    #[test]
    fn test_no_year_column() {
        let tracks = Dataset::new(["name"], vec![track(Some(1990), None)]);
        assert!(decade_distribution(&tracks).is_empty());
        assert!(feature_trends(&tracks).is_empty());
    }

    #[test]
    fn test_feature_trends_skip_missing_values() {
        let tracks = Dataset::from_rows(vec![
            track(Some(1990), Some(0.2)),
            track(Some(1995), Some(0.6)),
            track(Some(1999), None),
        ]);
        let trends = feature_trends(&tracks);
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].decade, 1990);
        assert!((trends[0].means["energy"] - 0.4).abs() < 1e-12);
        assert!((trends[0].means["valence"] - 0.5).abs() < 1e-12);
        assert!(!trends[0].means.contains_key("liveness"));
    }

    #[test]
    fn test_top_genres_by_popularity() {
        let genre = |name: &str, popularity: Option<f64>| GenreProfile {
            genre: name.to_string(),
            popularity,
            ..GenreProfile::default()
        };
        let genres = Dataset::from_rows(vec![
            genre("jazz", Some(40.0)),
            genre("unknown", None),
            genre("pop", Some(70.0)),
            genre("rock", Some(70.0)),
        ]);
        let top: Vec<_> = top_genres(&genres, 3).into_iter().map(|g| g.genre).collect();
        assert_eq!(top, ["pop", "rock", "jazz"]);
    }

    #[test]
    fn test_top_artists() {
        let artist = |name: &str, count: Option<u32>, popularity: Option<f64>| ArtistProfile {
            artists: name.to_string(),
            count,
            popularity,
            ..ArtistProfile::default()
        };
        let artists = Dataset::from_rows(vec![
            artist("A", Some(3), Some(10.0)),
            artist("B", Some(30), Some(5.0)),
            artist("C", None, Some(90.0)),
        ]);
        let by_count: Vec<_> = top_artists_by_count(&artists, 2).into_iter().map(|a| a.artists).collect();
        let by_popularity: Vec<_> = top_artists_by_popularity(&artists, 2).into_iter().map(|a| a.artists).collect();
        assert_eq!(by_count, ["B", "A"]);
        assert_eq!(by_popularity, ["C", "A"]);
    }

    #[test]
    fn test_word_frequencies() {
        let words = word_frequencies(["dance pop", "Pop rock", "the rock!", "k-pop"], 3);
        assert_eq!(
            words,
            vec![
                WordCount { word: "pop".to_string(), count: 2 },
                WordCount { word: "rock".to_string(), count: 2 },
                WordCount { word: "dance".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_artist_words_count_artist_names() {
        let artists = Dataset::from_rows(
            ["The Beatles", "Beatles Revival Band", "Frank Sinatra", "Nancy Sinatra, Lee Hazlewood"]
                .into_iter()
                .map(|name| ArtistProfile { artists: name.to_string(), ..ArtistProfile::default() })
                .collect(),
        );

        let words = artist_words(&artists, 2);
        assert_eq!(
            words,
            vec![
                WordCount { word: "beatles".to_string(), count: 2 },
                WordCount { word: "sinatra".to_string(), count: 2 },
            ]
        );
        assert!(genre_words(&Dataset::default(), 5).is_empty());
    }
}
