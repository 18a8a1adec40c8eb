//! Dense remap tables for undistortion and cross-view resampling.
//!
//! A [`RemapTable`] stores, for each destination pixel, the source position to
//! sample. Two builders produce them:
//! - [`build_undistortion_map`]: raw image to undistorted image, with new
//!   intrinsics from [`optimal_new_intrinsics`];
//! - [`build_cross_view_map`]: raw pixels of view A to the undistorted pixel
//!   grid of view B through a fitted homography.
//!
//! [`remap_rgba`] applies a table to an RGBA image with bilinear sampling.

mod cross_view;
mod error;
mod table;
mod undistort;
mod warp;

pub use cross_view::{apply_transform, build_cross_view_map};
pub use error::RemapError;
pub use table::RemapTable;
pub use undistort::{build_undistortion_map, build_undistortion_map_with, optimal_new_intrinsics};
pub use warp::remap_rgba;
