//! # Feature Clustering
//!
//! Groups genre or song rows into `k` clusters over the four audio features.
//!
//! ## Pipeline
//!
//! 1. Mean-impute missing feature values, per column
//! 2. Min-max scale every feature to `[0, 1]` independently
//! 3. k-means with greedy k-means++ seeding and Lloyd iterations, repeated
//!    `n_init` times from a fixed seed; the restart with the lowest inertia wins
//! 4. Attach one label in `[0, k)` per input row, in input order
//!
//! Restarts run on the rayon pool. Every restart owns an RNG seeded from
//! `seed + restart`, and the winner is chosen in restart order, so the output
//! only depends on the input table, `k` and the config.
//!
//! ```
//! use muziki::cluster::{cluster, ClusterConfig};
//! use muziki::model::{Dataset, GenreProfile};
//!
//! let genres: Vec<GenreProfile> = (0..6)
//!     .map(|i| GenreProfile {
//!         genre: format!("genre {i}"),
//!         valence: Some(f64::from(i) / 6.0),
//!         energy: Some(0.5),
//!         danceability: Some(0.5),
//!         acousticness: Some(1.0 - f64::from(i) / 6.0),
//!         ..GenreProfile::default()
//!     })
//!     .collect();
//!
//! let clustered = cluster(&Dataset::from_rows(genres), 2, &ClusterConfig::default())?;
//! assert_eq!(clustered.len(), 6);
//! assert!(clustered.labels().iter().all(|&label| label < 2));
//! # Ok::<(), muziki::error::ClusterError>(())
//! ```

use crate::error::ClusterError;
use crate::model::{Dataset, Feature, FeatureRow};
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A row in scaled feature space, in [`Feature::ALL`] order.
pub type Point = [f64; 4];

/// k-means tuning. The defaults mirror the usual library defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub seed: u64,
    /// Number of independent restarts.
    pub n_init: usize,
    pub max_iter: usize,
    /// Relative tolerance on centroid movement, scaled by the mean feature variance.
    pub tolerance: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
        }
    }
}

/// A copy of the input rows with one cluster label per row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clustered<R> {
    rows: Vec<R>,
    labels: Vec<usize>,
    k: usize,
    inertia: f64,
    centroids: Vec<Point>,
}

impl<R> Clustered<R> {
    #[must_use]
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    #[must_use]
    pub const fn k(&self) -> usize {
        self.k
    }

    /// Sum of squared distances to the closest centroid, in scaled space.
    #[must_use]
    pub const fn inertia(&self) -> f64 {
        self.inertia
    }

    /// One centroid per cluster, in scaled feature space and [`Feature::ALL`] order.
    #[must_use]
    pub fn centroids(&self) -> &[Point] {
        &self.centroids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&R, usize)> + '_ {
        self.rows.iter().zip(self.labels.iter().copied())
    }

    #[must_use]
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Unique member labels of one cluster, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterMembers {
    pub cluster: usize,
    pub members: Vec<String>,
}

impl ClusterMembers {
    #[must_use]
    pub fn joined(&self) -> String {
        self.members.join(", ")
    }
}

/// Cluster `dataset` into `k` groups.
///
/// # Errors
///
/// - [`ClusterError::EmptyDataset`] when the table has no rows
/// - [`ClusterError::MissingColumns`] when a feature column is absent
/// - [`ClusterError::InvalidClusterCount`] when `k == 0`
/// - [`ClusterError::InsufficientData`] when there are fewer rows than `k`
///
/// Missing values are imputed, never rejected.
pub fn cluster<R>(dataset: &Dataset<R>, k: usize, config: &ClusterConfig) -> Result<Clustered<R>, ClusterError>
where
    R: FeatureRow + Clone,
{
    validate(dataset)?;
    if k == 0 {
        return Err(ClusterError::InvalidClusterCount);
    }
    if dataset.len() < k {
        return Err(ClusterError::InsufficientData { rows: dataset.len(), k });
    }

    let points = scaled_features(dataset)?;
    let run = best_of_restarts(&points, k, config);

    info!("Clustering completed with {k} clusters (inertia {:.4}).", run.inertia);
    Ok(Clustered {
        rows: dataset.rows().to_vec(),
        labels: run.labels,
        k,
        inertia: run.inertia,
        centroids: run.centroids,
    })
}

/// Group row labels by cluster. Clusters without members are left out.
#[must_use]
pub fn cluster_members<R: FeatureRow>(clustered: &Clustered<R>) -> Vec<ClusterMembers> {
    let mut members: Vec<Vec<String>> = vec![Vec::new(); clustered.k];
    let mut seen: Vec<HashSet<String>> = vec![HashSet::new(); clustered.k];

    for (row, label) in clustered.iter() {
        let name = row.label().into_owned();
        if seen[label].insert(name.clone()) {
            members[label].push(name);
        }
    }

    members
        .into_iter()
        .enumerate()
        .filter(|(_, members)| !members.is_empty())
        .map(|(cluster, members)| ClusterMembers { cluster, members })
        .collect()
}

/// Reject tables that cannot be turned into a feature matrix.
pub(crate) fn validate<R>(dataset: &Dataset<R>) -> Result<(), ClusterError> {
    if dataset.is_empty() {
        return Err(ClusterError::EmptyDataset);
    }
    let missing = dataset.missing_feature_columns();
    if !missing.is_empty() {
        return Err(ClusterError::MissingColumns(missing));
    }
    Ok(())
}

/// Imputed and min-max scaled feature matrix, one point per row.
pub(crate) fn scaled_features<R: FeatureRow>(dataset: &Dataset<R>) -> Result<Vec<Point>, ClusterError> {
    validate(dataset)?;
    let mut points = impute_means(dataset.rows());
    min_max_scale(&mut points);
    Ok(points)
}

fn impute_means<R: FeatureRow>(rows: &[R]) -> Vec<Point> {
    let mut sums = [0.0; 4];
    let mut counts = [0_usize; 4];

    for row in rows {
        for feature in Feature::ALL {
            if let Some(value) = row.feature(feature).filter(|v| v.is_finite()) {
                sums[feature.index()] += value;
                counts[feature.index()] += 1;
            }
        }
    }

    let mut means = [0.0; 4];
    for feature in Feature::ALL {
        let i = feature.index();
        if counts[i] == 0 {
            warn!("Column '{feature}' has no values; imputing 0.0.");
        } else {
            #[allow(clippy::cast_precision_loss)]
            let count = counts[i] as f64;
            means[i] = sums[i] / count;
        }
    }
    trace!("Imputation means: {means:?}");

    rows.iter()
        .map(|row| {
            Feature::ALL.map(|feature| {
                row.feature(feature)
                    .filter(|v| v.is_finite())
                    .unwrap_or(means[feature.index()])
            })
        })
        .collect()
}

/// A constant column scales to 0.
fn min_max_scale(points: &mut [Point]) {
    for i in 0..4 {
        let (min, max) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p[i]), hi.max(p[i])));
        let range = max - min;
        for point in points.iter_mut() {
            point[i] = if range > 0.0 { (point[i] - min) / range } else { 0.0 };
        }
    }
}

#[inline]
pub(crate) fn squared_distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

#[derive(Debug, Clone)]
struct KMeansRun {
    labels: Vec<usize>,
    centroids: Vec<Point>,
    inertia: f64,
}

fn best_of_restarts(points: &[Point], k: usize, config: &ClusterConfig) -> KMeansRun {
    let tolerance = config.tolerance * mean_variance(points);
    let restart = |index: usize| {
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(index as u64));
        let run = lloyd(points, k, config.max_iter, tolerance, &mut rng);
        debug!("Restart {index}: inertia {:.6}", run.inertia);
        run
    };

    let mut best = restart(0);
    let others: Vec<KMeansRun> = (1..config.n_init.max(1)).into_par_iter().map(restart).collect();
    for run in others {
        if run.inertia < best.inertia {
            best = run;
        }
    }
    best
}

fn mean_variance(points: &[Point]) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let total: f64 = (0..4)
        .map(|i| {
            let mean = points.iter().map(|p| p[i]).sum::<f64>() / n;
            points.iter().map(|p| (p[i] - mean).powi(2)).sum::<f64>() / n
        })
        .sum();
    total / 4.0
}

fn lloyd(points: &[Point], k: usize, max_iter: usize, tolerance: f64, rng: &mut StdRng) -> KMeansRun {
    let mut centroids = kmeans_plus_plus(points, k, rng);
    let mut labels = vec![0; points.len()];

    for iteration in 0..max_iter.max(1) {
        assign(points, &centroids, &mut labels);
        let updated = update_centroids(points, &mut labels, &centroids);
        let shift: f64 = centroids
            .iter()
            .zip(&updated)
            .map(|(old, new)| squared_distance(old, new))
            .sum();
        centroids = updated;
        if shift <= tolerance {
            trace!("Converged after {} iterations (shift {shift:e}).", iteration + 1);
            break;
        }
    }

    let inertia = assign(points, &centroids, &mut labels);
    KMeansRun { labels, centroids, inertia }
}

/// Greedy k-means++: each new center is the best of `2 + ln k` sampled candidates.
fn kmeans_plus_plus(points: &[Point], k: usize, rng: &mut StdRng) -> Vec<Point> {
    let n = points.len();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let local_trials = 2 + (k as f64).ln() as usize;

    let first = rng.gen_range(0..n);
    let mut centers = Vec::with_capacity(k);
    centers.push(points[first]);

    let mut closest: Vec<f64> = points.iter().map(|p| squared_distance(p, &points[first])).collect();
    let mut potential: f64 = closest.iter().sum();

    while centers.len() < k {
        if potential <= 0.0 {
            // Every point already sits on a center.
            centers.push(points[rng.gen_range(0..n)]);
            continue;
        }

        let cumulative: Vec<f64> = closest
            .iter()
            .scan(0.0, |acc, &d| {
                *acc += d;
                Some(*acc)
            })
            .collect();

        let mut best: Option<(usize, f64, Vec<f64>)> = None;
        for _ in 0..local_trials {
            let target = rng.gen::<f64>() * potential;
            let candidate = cumulative.partition_point(|&c| c < target).min(n - 1);
            let distances: Vec<f64> = points
                .iter()
                .zip(&closest)
                .map(|(p, &d)| d.min(squared_distance(p, &points[candidate])))
                .collect();
            let candidate_potential: f64 = distances.iter().sum();
            if best.as_ref().map_or(true, |(_, pot, _)| candidate_potential < *pot) {
                best = Some((candidate, candidate_potential, distances));
            }
        }

        if let Some((index, candidate_potential, distances)) = best {
            centers.push(points[index]);
            potential = candidate_potential;
            closest = distances;
        }
    }

    centers
}

/// Label every point with its nearest centroid (lowest index on ties); returns inertia.
fn assign(points: &[Point], centroids: &[Point], labels: &mut [usize]) -> f64 {
    let mut inertia = 0.0;
    for (point, label) in points.iter().zip(labels.iter_mut()) {
        let (nearest, distance) = centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, squared_distance(point, c)))
            .fold((0, f64::INFINITY), |best, current| if current.1 < best.1 { current } else { best });
        *label = nearest;
        inertia += distance;
    }
    inertia
}

/// Mean of each cluster. Empty clusters take over the points farthest
/// from their current centroid.
fn update_centroids(points: &[Point], labels: &mut [usize], previous: &[Point]) -> Vec<Point> {
    let k = previous.len();
    let mut sums = vec![[0.0; 4]; k];
    let mut counts = vec![0_usize; k];

    for (point, &label) in points.iter().zip(labels.iter()) {
        for i in 0..4 {
            sums[label][i] += point[i];
        }
        counts[label] += 1;
    }

    let empty: Vec<usize> = (0..k).filter(|&c| counts[c] == 0).collect();
    if !empty.is_empty() {
        trace!("Relocating {} empty clusters.", empty.len());
        let mut by_distance: Vec<usize> = (0..points.len()).collect();
        by_distance.sort_by(|&a, &b| {
            let da = squared_distance(&points[a], &previous[labels[a]]);
            let db = squared_distance(&points[b], &previous[labels[b]]);
            db.total_cmp(&da)
        });

        let mut donors = by_distance.into_iter();
        for cluster in empty {
            for index in donors.by_ref() {
                let old = labels[index];
                if counts[old] > 1 {
                    for i in 0..4 {
                        sums[old][i] -= points[index][i];
                    }
                    counts[old] -= 1;
                    sums[cluster] = points[index];
                    counts[cluster] = 1;
                    labels[index] = cluster;
                    break;
                }
            }
        }
    }

    (0..k)
        .map(|c| {
            if counts[c] == 0 {
                previous[c]
            } else {
                #[allow(clippy::cast_precision_loss)]
                let count = counts[c] as f64;
                sums[c].map(|s| s / count)
            }
        })
        .collect()
}
