//! 2-D projection of the scaled audio features, for plotting cluster maps.
//!
//! Uses the same imputation and min-max scaling as [`crate::cluster`], then
//! projects onto the two leading principal components. Nothing downstream
//! depends on these coordinates; they only feed scatter plots.

use crate::cluster::{scaled_features, Point};
use crate::error::ClusterError;
use crate::model::{Dataset, FeatureRow};
use log::debug;
use serde::Serialize;

const POWER_ITERATIONS: usize = 500;
const CONVERGENCE: f64 = 1e-12;

/// One projected row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

type Matrix = [[f64; 4]; 4];

/// Project every row of `dataset` onto its first two principal components.
///
/// # Errors
///
/// Same validation as clustering: [`ClusterError::EmptyDataset`] and
/// [`ClusterError::MissingColumns`].
pub fn project_2d<R: FeatureRow>(dataset: &Dataset<R>) -> Result<Vec<ProjectedPoint>, ClusterError> {
    let mut points = scaled_features(dataset)?;
    center(&mut points);

    let covariance = covariance(&points);
    let (first, variance_1) = leading_eigenvector(&covariance, [1.0, 0.5, 0.25, 0.125]);
    let deflated = deflate(&covariance, &first, variance_1);
    let (second, variance_2) = leading_eigenvector(&deflated, orthogonal_start(&first));
    debug!("PCA component variances: {variance_1:.6}, {variance_2:.6}");

    Ok(dataset
        .rows()
        .iter()
        .zip(&points)
        .map(|(row, point)| ProjectedPoint {
            label: row.label().into_owned(),
            x: dot(point, &first),
            y: dot(point, &second),
        })
        .collect())
}

fn center(points: &mut [Point]) {
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    for i in 0..4 {
        let mean = points.iter().map(|p| p[i]).sum::<f64>() / n;
        for point in points.iter_mut() {
            point[i] -= mean;
        }
    }
}

fn covariance(points: &[Point]) -> Matrix {
    let mut matrix = [[0.0; 4]; 4];
    for point in points {
        for i in 0..4 {
            for j in 0..4 {
                matrix[i][j] += point[i] * point[j];
            }
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let denominator = (points.len().max(2) - 1) as f64;
    for row in &mut matrix {
        for value in row.iter_mut() {
            *value /= denominator;
        }
    }
    matrix
}

fn dot(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &Point) -> f64 {
    dot(v, v).sqrt()
}

fn multiply(matrix: &Matrix, v: &Point) -> Point {
    matrix.map(|row| dot(&row, v))
}

/// Power iteration; a zero matrix yields a zero vector.
fn leading_eigenvector(matrix: &Matrix, start: Point) -> (Point, f64) {
    let start_norm = norm(&start);
    if start_norm == 0.0 {
        return ([0.0; 4], 0.0);
    }
    let mut vector = start.map(|x| x / start_norm);

    for _ in 0..POWER_ITERATIONS {
        let next = multiply(matrix, &vector);
        let length = norm(&next);
        if length < CONVERGENCE {
            return ([0.0; 4], 0.0);
        }
        let next = next.map(|x| x / length);
        let delta: f64 = next.iter().zip(&vector).map(|(a, b)| (a - b).abs()).sum();
        vector = next;
        if delta < CONVERGENCE {
            break;
        }
    }

    let eigenvalue = dot(&vector, &multiply(matrix, &vector));
    (fix_sign(vector), eigenvalue)
}

/// Largest-magnitude loading is made positive.
fn fix_sign(vector: Point) -> Point {
    let pivot = vector
        .iter()
        .copied()
        .fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        vector.map(|x| -x)
    } else {
        vector
    }
}

fn deflate(matrix: &Matrix, vector: &Point, eigenvalue: f64) -> Matrix {
    let mut deflated = *matrix;
    for i in 0..4 {
        for j in 0..4 {
            deflated[i][j] -= eigenvalue * vector[i] * vector[j];
        }
    }
    deflated
}

/// A start vector with the first component's direction removed.
fn orthogonal_start(first: &Point) -> Point {
    let seed = [0.125, 0.25, 0.5, 1.0];
    let projection = dot(&seed, first);
    let mut start = [0.0; 4];
    for i in 0..4 {
        start[i] = seed[i] - projection * first[i];
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GenreProfile;

    fn genre(name: &str, v: f64, e: f64, d: f64, a: f64) -> GenreProfile {
        GenreProfile {
            genre: name.to_string(),
            popularity: None,
            valence: Some(v),
            energy: Some(e),
            danceability: Some(d),
            acousticness: Some(a),
        }
    }

    #[test]
    fn test_one_point_per_row() {
        let data = Dataset::from_rows(vec![
            genre("a", 0.1, 0.2, 0.3, 0.9),
            genre("b", 0.8, 0.9, 0.7, 0.1),
            genre("c", 0.5, 0.4, 0.6, 0.5),
            genre("d", 0.3, 0.7, 0.2, 0.3),
        ]);
        let projected = project_2d(&data).unwrap();

        assert_eq!(projected.len(), 4);
        assert_eq!(projected[1].label, "b");
        assert!(projected.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
        assert_eq!(projected, project_2d(&data).unwrap(), "Projection must be deterministic");
    }

    #[test]
    fn test_collinear_data_lies_on_first_axis() {
        let data = Dataset::from_rows(
            (0..5)
                .map(|i| {
                    let t = f64::from(i) / 4.0;
                    genre(&format!("g{i}"), t, t, t, t)
                })
                .collect(),
        );
        let projected = project_2d(&data).unwrap();

        assert!(projected.iter().all(|p| p.y.abs() < 1e-9));
        // Points keep their order along the first component.
        assert!(projected.windows(2).all(|w| w[0].x < w[1].x));
    }

    #[test]
    fn test_constant_data_projects_to_origin() {
        let data = Dataset::from_rows(vec![genre("x", 0.4, 0.4, 0.4, 0.4); 3]);
        let projected = project_2d(&data).unwrap();
        assert!(projected.iter().all(|p| p.x == 0.0 && p.y == 0.0));
    }

    #[test]
    fn test_empty_dataset_is_rejected() {
        let data: Dataset<GenreProfile> = Dataset::from_rows(Vec::new());
        assert_eq!(project_2d(&data), Err(ClusterError::EmptyDataset));
    }
}
