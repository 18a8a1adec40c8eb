//! Planar camera calibration from chessboard corners.
//!
//! Both solvers follow the same two stages:
//! 1. Closed-form initialization: per-view board homographies give the focal
//!    lengths (principal point held at the image centre) and each view's pose.
//! 2. Joint Levenberg-Marquardt refinement of intrinsics, distortion and all
//!    poses against the reprojection error.
//!
//! [`calibrate_pinhole`] fits the 8-coefficient radial-tangential model,
//! [`calibrate_fisheye`] the 4-coefficient equidistant fisheye model.

mod bundle;
mod error;
mod fisheye;
mod init;
mod pinhole;
mod solver;

pub use error::CalibError;
pub use fisheye::{calibrate_fisheye, FisheyeOptions};
pub use pinhole::{calibrate_pinhole, PinholeOptions};

use crossview_core::{Camera, ImageSize, Pose};
use serde::{Deserialize, Serialize};

/// Result of a calibration run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub image_size: ImageSize,
    pub camera: Camera,
    /// Board-to-camera pose per input view, in input order.
    pub poses: Vec<Pose>,
    /// `sqrt(Σ |reprojection residual|² / corner count)`, pixels.
    pub rms: f64,
    pub iterations: usize,
}
