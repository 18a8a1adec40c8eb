//! The eleven operations over typed values.
//!
//! Every operation is a pure function of its arguments. Failures are reported
//! as [`OpError`]; nothing is returned partially.

use crate::OpError;
use crossview_calib::{
    calibrate_fisheye, calibrate_pinhole, CameraCalibration, FisheyeOptions, PinholeOptions,
};
use crossview_chessboard::{ChessboardDetection, ChessboardDetector, ChessboardParams};
use crossview_core::{Camera, GridSpec, Homography, ImageSize, RgbaImageView};
use crossview_homography::{
    estimate_lmeds, estimate_undistorted, estimate_undistorted_with_quality, HomographyQuality,
    LmedsOptions, RansacOptions,
};
use crossview_remap::RemapTable;
use log::{debug, info};
use nalgebra::{Point2, Vector3};

#[cfg(feature = "tracing")]
use tracing::instrument;

fn check_camera(camera: &Camera) -> Result<(), OpError> {
    if camera.intrinsics.is_valid() {
        Ok(())
    } else {
        Err(OpError::InvalidInput(
            "camera intrinsics have non-positive or non-finite focal lengths".into(),
        ))
    }
}

/// Locate every inner corner of `grid` in an RGBA frame.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(image, params), fields(w = image.width, h = image.height))
)]
pub fn detect_chessboard_corners(
    image: &RgbaImageView<'_>,
    grid: GridSpec,
    params: &ChessboardParams,
) -> Result<ChessboardDetection, OpError> {
    grid.validate()
        .map_err(|e| OpError::InvalidInput(e.to_string()))?;
    let detector = ChessboardDetector::new(grid, params.clone());
    let detection = detector.detect(image).ok_or(OpError::DetectionFailure)?;
    debug!("detected {} corners", detection.corners.len());
    Ok(detection)
}

/// Pinhole calibration; returns only the camera.
pub fn calibrate_intrinsics(
    views: &[Vec<Point2<f64>>],
    grid: &GridSpec,
    size: ImageSize,
    options: &PinholeOptions,
) -> Result<Camera, OpError> {
    Ok(calibrate_intrinsics_extended(views, grid, size, options)?.camera)
}

/// Pinhole calibration with per-view poses.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(views, grid, options), fields(views = views.len()))
)]
pub fn calibrate_intrinsics_extended(
    views: &[Vec<Point2<f64>>],
    grid: &GridSpec,
    size: ImageSize,
    options: &PinholeOptions,
) -> Result<CameraCalibration, OpError> {
    let calib = calibrate_pinhole(views, grid, size, options)?;
    info!(
        "pinhole calibration: {} views, rms {:.4} px",
        calib.poses.len(),
        calib.rms
    );
    Ok(calib)
}

/// Fisheye calibration with per-view poses.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(views, grid, options), fields(views = views.len()))
)]
pub fn calibrate_intrinsics_fisheye(
    views: &[Vec<Point2<f64>>],
    grid: &GridSpec,
    size: ImageSize,
    options: &FisheyeOptions,
) -> Result<CameraCalibration, OpError> {
    let calib = calibrate_fisheye(views, grid, size, options)?;
    info!(
        "fisheye calibration: {} views, rms {:.4} px",
        calib.poses.len(),
        calib.rms
    );
    Ok(calib)
}

/// Dense map from the undistorted image back to raw pixels.
pub fn build_undistortion_map(camera: &Camera, size: ImageSize) -> Result<RemapTable, OpError> {
    let (table, _) = crossview_remap::build_undistortion_map(camera, size)?;
    Ok(table)
}

/// Undistort an integer pixel, keeping the camera's own intrinsics.
pub fn undistort_point(camera: &Camera, x: i32, y: i32) -> Result<Point2<f32>, OpError> {
    check_camera(camera)?;
    let p = camera.undistort_pixel(&Point2::new(x as f64, y as f64), &camera.intrinsics);
    Ok(Point2::new(p.x as f32, p.y as f32))
}

/// Least-median-of-squares homography mapping `src` onto `dst`.
pub fn estimate_homography(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    options: &LmedsOptions,
) -> Result<Homography, OpError> {
    Ok(estimate_lmeds(src, dst, options)?.homography)
}

/// RANSAC homography between the undistorted pixel spaces of two cameras.
pub fn estimate_homography_undistorted(
    src: &[Point2<f64>],
    camera_a: &Camera,
    dst: &[Point2<f64>],
    camera_b: &Camera,
    options: &RansacOptions,
) -> Result<Homography, OpError> {
    check_camera(camera_a)?;
    check_camera(camera_b)?;
    Ok(estimate_undistorted(src, camera_a, dst, camera_b, options)?.homography)
}

/// As [`estimate_homography_undistorted`], plus inlier RMSE and count.
pub fn estimate_homography_undistorted_with_quality(
    src: &[Point2<f64>],
    camera_a: &Camera,
    dst: &[Point2<f64>],
    camera_b: &Camera,
    options: &RansacOptions,
) -> Result<(Homography, HomographyQuality), OpError> {
    check_camera(camera_a)?;
    check_camera(camera_b)?;
    let (fit, quality) = estimate_undistorted_with_quality(src, camera_a, dst, camera_b, options)?;
    info!(
        "homography quality: rmse {:.4} px over {} inliers",
        quality.rmse, quality.inlier_count
    );
    Ok((fit.homography, quality))
}

/// Undistort `p` with `camera`, then apply `h` without the perspective divide.
pub fn apply_transform(
    camera: &Camera,
    h: &Homography,
    p: &Point2<f64>,
) -> Result<Vector3<f64>, OpError> {
    check_camera(camera)?;
    Ok(crossview_remap::apply_transform(camera, h, p))
}

/// Map every raw pixel of A into B's undistorted pixel grid.
///
/// B's calibration does not enter the map; it is only checked.
pub fn build_cross_view_map(
    camera_a: &Camera,
    size_a: ImageSize,
    camera_b: &Camera,
    size_b: ImageSize,
    h_ab: &Homography,
) -> Result<RemapTable, OpError> {
    check_camera(camera_b)?;
    size_b.validate()?;
    Ok(crossview_remap::build_cross_view_map(camera_a, size_a, h_ab)?)
}
