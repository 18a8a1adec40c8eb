use crate::ransac::Estimator;
use crossview_core::{estimate_homography, homography_from_4pt, Homography};
use nalgebra::{Matrix2, Point2};

/// A source/destination point pair.
pub type Correspondence = (Point2<f64>, Point2<f64>);

/// Four-point homography model scored by forward transfer error.
pub struct HomographyEstimator;

/// `true` if `c` lies on the line through `a` and `b`.
#[inline]
fn collinear(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> bool {
    let (d1, d2) = (b - a, c - a);
    let area = d1.x * d2.y - d1.y * d2.x;
    area.abs() <= f32::EPSILON as f64 * (d1.x.abs() + d1.y.abs() + d2.x.abs() + d2.y.abs())
}

/// Any three of `pts` collinear.
pub(crate) fn has_collinear_triple(pts: &[Point2<f64>]) -> bool {
    let n = pts.len();
    (0..n).any(|i| {
        (i + 1..n).any(|j| (j + 1..n).any(|k| collinear(&pts[i], &pts[j], &pts[k])))
    })
}

/// All of `pts` on a single line (or a single point).
pub(crate) fn is_collinear_set(pts: &[Point2<f64>]) -> bool {
    let n = pts.len() as f64;
    if n < 3.0 {
        return true;
    }
    let mean = pts.iter().fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords) / n;
    let mut cov = Matrix2::<f64>::zeros();
    for p in pts {
        let d = p.coords - mean;
        cov += d * d.transpose();
    }
    let eig = cov.symmetric_eigenvalues();
    let (lo, hi) = (eig.min(), eig.max());
    hi <= 0.0 || lo <= 1e-12 * hi
}

impl Estimator for HomographyEstimator {
    type Datum = Correspondence;
    type Model = Homography;

    const MIN_SAMPLES: usize = 4;

    fn fit(data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model> {
        let src = [0, 1, 2, 3].map(|k| data[sample[k]].0);
        let dst = [0, 1, 2, 3].map(|k| data[sample[k]].1);
        let h = homography_from_4pt(&src, &dst)?;
        h.inverse().map(|_| h)
    }

    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64 {
        model.transfer_error(&datum.0, &datum.1)
    }

    fn is_degenerate(data: &[Self::Datum], sample: &[usize]) -> bool {
        let src: Vec<_> = sample.iter().map(|&i| data[i].0).collect();
        let dst: Vec<_> = sample.iter().map(|&i| data[i].1).collect();
        has_collinear_triple(&src) || has_collinear_triple(&dst)
    }

    fn refit(data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
        let src: Vec<_> = inliers.iter().map(|&i| data[i].0).collect();
        let dst: Vec<_> = inliers.iter().map(|&i| data[i].1).collect();
        estimate_homography(&src, &dst).filter(|h| h.is_finite() && h.inverse().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collinear_triples_are_found() {
        let line = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(5.0, 0.0),
            Point2::new(3.0, 3.0),
        ];
        assert!(has_collinear_triple(&line));
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert!(!has_collinear_triple(&square));
    }

    #[test]
    fn whole_set_collinearity() {
        let pts: Vec<_> = (0..10).map(|i| Point2::new(i as f64, 2.0 * i as f64 + 1.0)).collect();
        assert!(is_collinear_set(&pts));
        let mut bent = pts.clone();
        bent[4].y += 0.5;
        assert!(!is_collinear_set(&bent));
    }
}
