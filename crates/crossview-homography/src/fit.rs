use crate::estimator::{is_collinear_set, Correspondence, HomographyEstimator};
use crate::ransac::{lmeds, ransac, Consensus, LmedsOptions, RansacOptions};
use crate::refine::polish;
use crate::HomographyError;
use crossview_core::{Camera, Homography};
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Sentinel RMSE reported when a fit has no inliers.
pub const NO_INLIERS_RMSE: f64 = 1e9;

/// A robustly fitted homography and its support.
#[derive(Debug, Clone, PartialEq)]
pub struct HomographyFit {
    /// Maps source points onto destination points, scaled to `h33 = 1` when possible.
    pub homography: Homography,
    /// Inlier flag per input correspondence.
    pub inliers: Vec<bool>,
    pub iterations: usize,
    /// Sampler seed, for reproducing the run.
    pub seed: u64,
}

impl HomographyFit {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&b| b).count()
    }
}

/// Fit quality over the inliers of a [`HomographyFit`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomographyQuality {
    /// Root-mean-square transfer error over inliers, or [`NO_INLIERS_RMSE`].
    pub rmse: f64,
    pub inlier_count: usize,
}

/// Transfer statistics over every correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferMetrics {
    pub rmse: f64,
    /// Correspondences whose transfer error is at most the given bound.
    pub within: usize,
    pub total: usize,
}

fn correspondences(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
) -> Result<Vec<Correspondence>, HomographyError> {
    if src.len() != dst.len() {
        return Err(HomographyError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    if src.len() < 4 {
        return Err(HomographyError::NotEnoughPoints(src.len()));
    }
    if is_collinear_set(src) || is_collinear_set(dst) {
        return Err(HomographyError::Degenerate);
    }
    Ok(src.iter().copied().zip(dst.iter().copied()).collect())
}

/// Polish the consensus model on its inliers and package the result.
///
/// With a `threshold`, the inlier mask is re-derived from the polished model;
/// otherwise it stays the consensus set.
fn finish(
    consensus: Consensus<Homography>,
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    threshold: Option<f64>,
) -> Result<HomographyFit, HomographyError> {
    let in_src: Vec<_> = consensus.inliers.iter().map(|&i| src[i]).collect();
    let in_dst: Vec<_> = consensus.inliers.iter().map(|&i| dst[i]).collect();
    let homography = polish(&consensus.model, &in_src, &in_dst).normalized();
    if !homography.is_finite() || homography.inverse().is_none() {
        return Err(HomographyError::Degenerate);
    }

    let inliers = match threshold {
        Some(t) => src
            .iter()
            .zip(dst)
            .map(|(s, d)| homography.transfer_error(s, d) <= t)
            .collect(),
        None => {
            let mut mask = vec![false; src.len()];
            for &i in &consensus.inliers {
                mask[i] = true;
            }
            mask
        }
    };
    Ok(HomographyFit {
        homography,
        inliers,
        iterations: consensus.iterations,
        seed: consensus.seed,
    })
}

/// Least-median-of-squares homography from `src` to `dst`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(src, dst, opts), fields(points = src.len()))
)]
pub fn estimate_lmeds(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    opts: &LmedsOptions,
) -> Result<HomographyFit, HomographyError> {
    let data = correspondences(src, dst)?;
    let consensus = lmeds::<HomographyEstimator>(&data, opts).ok_or(HomographyError::NoConsensus)?;
    finish(consensus, src, dst, None)
}

/// RANSAC homography from `src` to `dst` with an inlier threshold in pixels.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(src, dst, opts), fields(points = src.len()))
)]
pub fn estimate_ransac(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    opts: &RansacOptions,
) -> Result<HomographyFit, HomographyError> {
    let data = correspondences(src, dst)?;
    let consensus =
        ransac::<HomographyEstimator>(&data, opts).ok_or(HomographyError::NoConsensus)?;
    finish(consensus, src, dst, Some(opts.threshold))
}

/// Undistort each point with its own camera, keeping that camera's intrinsics.
pub fn undistort_points(camera: &Camera, pts: &[Point2<f64>]) -> Vec<Point2<f64>> {
    pts.iter()
        .map(|p| camera.undistort_pixel(p, &camera.intrinsics))
        .collect()
}

/// RANSAC homography between the undistorted pixel spaces of two cameras.
///
/// `src` is observed by `camera_a`, `dst` by `camera_b`.
pub fn estimate_undistorted(
    src: &[Point2<f64>],
    camera_a: &Camera,
    dst: &[Point2<f64>],
    camera_b: &Camera,
    opts: &RansacOptions,
) -> Result<HomographyFit, HomographyError> {
    let (a, b) = (undistort_points(camera_a, src), undistort_points(camera_b, dst));
    estimate_ransac(&a, &b, opts)
}

/// [`estimate_undistorted`] plus the inlier RMSE in undistorted pixels.
pub fn estimate_undistorted_with_quality(
    src: &[Point2<f64>],
    camera_a: &Camera,
    dst: &[Point2<f64>],
    camera_b: &Camera,
    opts: &RansacOptions,
) -> Result<(HomographyFit, HomographyQuality), HomographyError> {
    let (a, b) = (undistort_points(camera_a, src), undistort_points(camera_b, dst));
    let fit = estimate_ransac(&a, &b, opts)?;
    let quality = inlier_quality(&fit, &a, &b);
    debug!(
        "undistorted homography: rmse {:.4} px over {} inliers",
        quality.rmse, quality.inlier_count
    );
    Ok((fit, quality))
}

/// RMSE of `fit.homography` over the correspondences flagged as inliers.
pub fn inlier_quality(
    fit: &HomographyFit,
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
) -> HomographyQuality {
    let (se, count) = src
        .iter()
        .zip(dst)
        .zip(&fit.inliers)
        .filter(|(_, inlier)| **inlier)
        .fold((0.0, 0usize), |(se, n), ((s, d), _)| {
            let e = fit.homography.transfer_error(s, d);
            (se + e * e, n + 1)
        });
    HomographyQuality {
        rmse: if count > 0 {
            (se / count as f64).sqrt()
        } else {
            NO_INLIERS_RMSE
        },
        inlier_count: count,
    }
}

/// Transfer RMSE over all pairs and the number within `max_error` pixels.
pub fn transfer_metrics(
    h: &Homography,
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    max_error: f64,
) -> TransferMetrics {
    let errors: Vec<f64> = src.iter().zip(dst).map(|(s, d)| h.transfer_error(s, d)).collect();
    let total = errors.len();
    let se: f64 = errors.iter().map(|e| e * e).sum();
    TransferMetrics {
        rmse: (se / total.max(1) as f64).sqrt(),
        within: errors.iter().filter(|&&e| e <= max_error).count(),
        total,
    }
}
