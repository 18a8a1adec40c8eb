//! Core types and utilities for cross-view camera geometry.
//!
//! This crate is intentionally small and purely geometric. It holds the
//! value types every other `crossview-*` crate exchanges (images, cameras,
//! poses, homographies, the planar grid) plus the dense Levenberg-Marquardt
//! solver shared by calibration and homography refinement. Nothing here keeps
//! state between calls.

mod camera;
pub mod codec;
mod grid;
mod homography;
mod image;
mod logger;
pub mod optim;
mod pose;
pub mod synthetic;

pub use camera::{Camera, Distortion, DistortionKind, Intrinsics, UNDISTORT_MAX_ITERS};
pub use codec::CodecError;
pub use grid::{GridSpec, GridSpecError};
pub use homography::{
    estimate_homography, homography_from_4pt, Homography, DENOMINATOR_EPS, SINGULAR_DET,
};
pub use image::{
    apply_post_ops, gray_to_rgba, rgba_to_gray, sample_bilinear, sample_bilinear_rgba, GrayImage,
    GrayImageView, ImageError, ImageSize, PostOp, RgbaImage, RgbaImageView,
};
pub use optim::{LeastSquaresProblem, LevenbergMarquardt, LmReport, OptimError, TermCriteria};
pub use pose::Pose;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
