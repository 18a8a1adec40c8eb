//! The eleven operations over flat host buffers.
//!
//! Images are interleaved RGBA8. Point buffers are interleaved `(x, y)` f32
//! pairs; matrices are row-major 3x3. Every output buffer must have its exact
//! length and is written only after the whole operation succeeded, so a
//! failed call leaves the caller's memory untouched.
//!
//! A buffer of the wrong shape is a caller bug: it is reported as
//! [`OpError::InvalidInput`] and panics in debug builds.

use crate::{ops, CalibrationConfig, OpError};
use crossview_calib::CameraCalibration;
use crossview_core::codec::{
    camera_from_buffers, matrix3_from_row_major, matrix3_to_row_major, points_from_interleaved,
    vec3_rows_to_flat, write_exact, write_points_interleaved, CodecError,
};
use crossview_core::{Camera, DistortionKind, Homography, ImageError, ImageSize, RgbaImageView};
use nalgebra::Point2;
use std::fmt::Display;

#[cfg(feature = "tracing")]
use tracing::instrument;

fn contract<E: Into<OpError> + Display>(err: E) -> OpError {
    if cfg!(debug_assertions) {
        panic!("buffer contract violated: {err}");
    }
    err.into()
}

fn codec_error(err: CodecError) -> OpError {
    match err {
        CodecError::OddPointBuffer(_)
        | CodecError::LengthMismatch { .. }
        | CodecError::DistortionLength { .. } => contract(err),
        CodecError::NonFinite(_) | CodecError::InvalidIntrinsics => err.into(),
    }
}

fn image_error(err: ImageError) -> OpError {
    match err {
        ImageError::InvalidBuffer { .. } => contract(err),
        ImageError::InvalidDimensions { .. } => err.into(),
    }
}

fn check_out(out: &[f32], expected: usize) -> Result<(), OpError> {
    if out.len() != expected {
        return Err(contract(CodecError::LengthMismatch {
            expected,
            got: out.len(),
        }));
    }
    Ok(())
}

/// Borrowed intrinsic and distortion buffers of one camera.
#[derive(Clone, Copy, Debug)]
pub struct CameraBuffers<'a> {
    /// Row-major 3x3 camera matrix.
    pub intrinsics: &'a [f32],
    pub distortion: &'a [f32],
    pub kind: DistortionKind,
}

impl<'a> CameraBuffers<'a> {
    /// Radial-tangential camera with 4, 5 or 8 coefficients.
    pub fn pinhole(intrinsics: &'a [f32], distortion: &'a [f32]) -> Self {
        Self {
            intrinsics,
            distortion,
            kind: DistortionKind::RadialTangential,
        }
    }

    /// Fisheye camera with exactly 4 coefficients.
    pub fn fisheye(intrinsics: &'a [f32], distortion: &'a [f32]) -> Self {
        Self {
            intrinsics,
            distortion,
            kind: DistortionKind::Fisheye,
        }
    }

    pub fn camera(&self) -> Result<Camera, OpError> {
        camera_from_buffers(self.intrinsics, self.distortion, self.kind).map_err(codec_error)
    }
}

fn decode_points(buf: &[f32]) -> Result<Vec<Point2<f64>>, OpError> {
    points_from_interleaved(buf).map_err(codec_error)
}

/// Decode a src/dst pair; the two buffers must hold the same number of points.
fn decode_pairs(
    src: &[f32],
    dst: &[f32],
) -> Result<(Vec<Point2<f64>>, Vec<Point2<f64>>), OpError> {
    if src.len() != dst.len() {
        return Err(contract(CodecError::LengthMismatch {
            expected: src.len(),
            got: dst.len(),
        }));
    }
    Ok((decode_points(src)?, decode_points(dst)?))
}

fn decode_views(corner_sets: &[&[f32]]) -> Result<Vec<Vec<Point2<f64>>>, OpError> {
    corner_sets.iter().map(|set| decode_points(set)).collect()
}

fn decode_homography(buf: &[f32]) -> Result<Homography, OpError> {
    matrix3_from_row_major(buf)
        .map(Homography::new)
        .map_err(codec_error)
}

/// Where the poses of an extended calibration go.
struct PoseOutputs<'a> {
    rvecs: &'a mut [f32],
    tvecs: &'a mut [f32],
}

fn calibration_outputs(
    views: usize,
    intrinsics_out: &[f32],
    distortion_out: &[f32],
    coeffs: usize,
    poses: Option<&PoseOutputs<'_>>,
) -> Result<(), OpError> {
    check_out(intrinsics_out, 9)?;
    check_out(distortion_out, coeffs)?;
    if let Some(p) = poses {
        check_out(&*p.rvecs, 3 * views)?;
        check_out(&*p.tvecs, 3 * views)?;
    }
    Ok(())
}

fn write_calibration(
    calib: &CameraCalibration,
    intrinsics_out: &mut [f32],
    distortion_out: &mut [f32],
    poses: Option<PoseOutputs<'_>>,
) -> Result<(), OpError> {
    let k = matrix3_to_row_major(&calib.camera.intrinsics.to_matrix());
    let coeffs: Vec<f32> = calib
        .camera
        .distortion
        .coeffs()
        .iter()
        .map(|&c| c as f32)
        .collect();
    write_exact(&k, intrinsics_out)?;
    write_exact(&coeffs, distortion_out)?;
    if let Some(p) = poses {
        let rvecs: Vec<[f64; 3]> = calib.poses.iter().map(|pose| pose.rvec).collect();
        let tvecs: Vec<[f64; 3]> = calib.poses.iter().map(|pose| pose.tvec).collect();
        write_exact(&vec3_rows_to_flat(&rvecs), p.rvecs)?;
        write_exact(&vec3_rows_to_flat(&tvecs), p.tvecs)?;
    }
    Ok(())
}

/// Detect the configured grid in an RGBA frame and write its corners.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(rgba, config, corners_out), fields(w = size.width, h = size.height))
)]
pub fn detect_chessboard_corners(
    rgba: &[u8],
    size: ImageSize,
    config: &CalibrationConfig,
    corners_out: &mut [f32],
) -> Result<(), OpError> {
    check_out(corners_out, 2 * config.grid.corner_count())?;
    let view = RgbaImageView::new(size.width, size.height, rgba).map_err(image_error)?;
    let detection = ops::detect_chessboard_corners(&view, config.grid, &config.chessboard)?;
    write_points_interleaved(&detection.corners, corners_out)?;
    Ok(())
}

/// Pinhole calibration; writes the 3x3 camera matrix and 8 coefficients.
pub fn calibrate_intrinsics(
    corner_sets: &[&[f32]],
    size: ImageSize,
    config: &CalibrationConfig,
    intrinsics_out: &mut [f32],
    distortion_out: &mut [f32],
) -> Result<(), OpError> {
    calibration_outputs(corner_sets.len(), intrinsics_out, distortion_out, 8, None)?;
    let views = decode_views(corner_sets)?;
    let calib = ops::calibrate_intrinsics_extended(&views, &config.grid, size, &config.pinhole)?;
    write_calibration(&calib, intrinsics_out, distortion_out, None)
}

/// Pinhole calibration that also writes per-view rotation and translation
/// vectors as `N x 3` row-major buffers.
pub fn calibrate_intrinsics_extended(
    corner_sets: &[&[f32]],
    size: ImageSize,
    config: &CalibrationConfig,
    intrinsics_out: &mut [f32],
    distortion_out: &mut [f32],
    rvecs_out: &mut [f32],
    tvecs_out: &mut [f32],
) -> Result<(), OpError> {
    let poses = PoseOutputs {
        rvecs: rvecs_out,
        tvecs: tvecs_out,
    };
    calibration_outputs(corner_sets.len(), intrinsics_out, distortion_out, 8, Some(&poses))?;
    let views = decode_views(corner_sets)?;
    let calib = ops::calibrate_intrinsics_extended(&views, &config.grid, size, &config.pinhole)?;
    write_calibration(&calib, intrinsics_out, distortion_out, Some(poses))
}

/// Fisheye calibration; writes 4 coefficients plus per-view poses.
pub fn calibrate_intrinsics_fisheye(
    corner_sets: &[&[f32]],
    size: ImageSize,
    config: &CalibrationConfig,
    intrinsics_out: &mut [f32],
    distortion_out: &mut [f32],
    rvecs_out: &mut [f32],
    tvecs_out: &mut [f32],
) -> Result<(), OpError> {
    let poses = PoseOutputs {
        rvecs: rvecs_out,
        tvecs: tvecs_out,
    };
    calibration_outputs(corner_sets.len(), intrinsics_out, distortion_out, 4, Some(&poses))?;
    let views = decode_views(corner_sets)?;
    let calib = ops::calibrate_intrinsics_fisheye(&views, &config.grid, size, &config.fisheye)?;
    write_calibration(&calib, intrinsics_out, distortion_out, Some(poses))
}

/// Write the `W x H` undistortion maps.
pub fn build_undistortion_map(
    camera: &CameraBuffers<'_>,
    size: ImageSize,
    map_x_out: &mut [f32],
    map_y_out: &mut [f32],
) -> Result<(), OpError> {
    check_out(map_x_out, size.pixel_count())?;
    check_out(map_y_out, size.pixel_count())?;
    let table = ops::build_undistortion_map(&camera.camera()?, size)?;
    write_exact(&table.map_x, map_x_out)?;
    write_exact(&table.map_y, map_y_out)?;
    Ok(())
}

/// Undistort pixel `(x, y)` and write the resulting `(x, y)` pair.
pub fn undistort_point(
    x: i32,
    y: i32,
    camera: &CameraBuffers<'_>,
    out: &mut [f32],
) -> Result<(), OpError> {
    check_out(out, 2)?;
    let p = ops::undistort_point(&camera.camera()?, x, y)?;
    write_exact(&[p.x, p.y], out)?;
    Ok(())
}

/// LMedS homography from `src` to `dst`.
pub fn estimate_homography(
    src: &[f32],
    dst: &[f32],
    config: &CalibrationConfig,
    h_out: &mut [f32],
) -> Result<(), OpError> {
    check_out(h_out, 9)?;
    let (src, dst) = decode_pairs(src, dst)?;
    let h = ops::estimate_homography(&src, &dst, &config.lmeds)?;
    write_exact(&matrix3_to_row_major(&h.h), h_out)?;
    Ok(())
}

/// RANSAC homography between undistorted pixel spaces.
pub fn estimate_homography_undistorted(
    src: &[f32],
    camera_a: &CameraBuffers<'_>,
    dst: &[f32],
    camera_b: &CameraBuffers<'_>,
    config: &CalibrationConfig,
    h_out: &mut [f32],
) -> Result<(), OpError> {
    check_out(h_out, 9)?;
    let (src, dst) = decode_pairs(src, dst)?;
    let h = ops::estimate_homography_undistorted(
        &src,
        &camera_a.camera()?,
        &dst,
        &camera_b.camera()?,
        &config.ransac,
    )?;
    write_exact(&matrix3_to_row_major(&h.h), h_out)?;
    Ok(())
}

/// As [`estimate_homography_undistorted`], plus `[rmse, inlier_count]`.
pub fn estimate_homography_undistorted_with_quality(
    src: &[f32],
    camera_a: &CameraBuffers<'_>,
    dst: &[f32],
    camera_b: &CameraBuffers<'_>,
    config: &CalibrationConfig,
    h_out: &mut [f32],
    quality_out: &mut [f32],
) -> Result<(), OpError> {
    check_out(h_out, 9)?;
    check_out(quality_out, 2)?;
    let (src, dst) = decode_pairs(src, dst)?;
    let (h, quality) = ops::estimate_homography_undistorted_with_quality(
        &src,
        &camera_a.camera()?,
        &dst,
        &camera_b.camera()?,
        &config.ransac,
    )?;
    write_exact(&matrix3_to_row_major(&h.h), h_out)?;
    write_exact(&[quality.rmse as f32, quality.inlier_count as f32], quality_out)?;
    Ok(())
}

/// Write the un-divided homogeneous image of the undistorted `(x, y)`.
pub fn apply_transform(
    x: f32,
    y: f32,
    h: &[f32],
    camera: &CameraBuffers<'_>,
    out: &mut [f32],
) -> Result<(), OpError> {
    check_out(out, 3)?;
    let h = decode_homography(h)?;
    let v = ops::apply_transform(&camera.camera()?, &h, &Point2::new(x as f64, y as f64))?;
    write_exact(&[v.x as f32, v.y as f32, v.z as f32], out)?;
    Ok(())
}

/// Write maps sized to A that sample B's undistorted pixel grid.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(camera_a, camera_b, h_ab, map_x_out, map_y_out),
        fields(w = size_a.width, h = size_a.height)
    )
)]
pub fn build_cross_view_map(
    camera_a: &CameraBuffers<'_>,
    size_a: ImageSize,
    camera_b: &CameraBuffers<'_>,
    size_b: ImageSize,
    h_ab: &[f32],
    map_x_out: &mut [f32],
    map_y_out: &mut [f32],
) -> Result<(), OpError> {
    check_out(map_x_out, size_a.pixel_count())?;
    check_out(map_y_out, size_a.pixel_count())?;
    let h = decode_homography(h_ab)?;
    let table = ops::build_cross_view_map(
        &camera_a.camera()?,
        size_a,
        &camera_b.camera()?,
        size_b,
        &h,
    )?;
    write_exact(&table.map_x, map_x_out)?;
    write_exact(&table.map_y, map_y_out)?;
    Ok(())
}
