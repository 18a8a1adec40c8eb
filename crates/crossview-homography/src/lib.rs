//! Robust homography estimation between two views.
//!
//! Direct fits use least-median-of-squares ([`estimate_lmeds`]) and need no
//! threshold. Fits between calibrated cameras undistort both point sets first
//! and run RANSAC with a pixel threshold ([`estimate_undistorted`]). Every
//! consensus model is refit on its inliers with normalized DLT and polished
//! with Levenberg-Marquardt on the transfer error.
//!
//! Degenerate input (collinear point sets, singular fits) is an error, never
//! an identity fallback.

mod error;
mod estimator;
mod fit;
mod ransac;
mod refine;

pub use error::HomographyError;
pub use estimator::{Correspondence, HomographyEstimator};
pub use fit::{
    estimate_lmeds, estimate_ransac, estimate_undistorted, estimate_undistorted_with_quality,
    inlier_quality, transfer_metrics, undistort_points, HomographyFit, HomographyQuality,
    TransferMetrics, NO_INLIERS_RMSE,
};
pub use ransac::{lmeds, ransac, Consensus, Estimator, LmedsOptions, RansacOptions};
