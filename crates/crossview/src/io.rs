//! JSON configuration and calibration reports.

use crossview_calib::{CameraCalibration, FisheyeOptions, PinholeOptions};
use crossview_chessboard::ChessboardParams;
use crossview_core::codec::CodecError;
use crossview_core::{Camera, Distortion, DistortionKind, GridSpec, Intrinsics};
use crossview_homography::{LmedsOptions, RansacOptions};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "image")]
    #[error(transparent)]
    Image(::image::ImageError),
    #[error(transparent)]
    Op(#[from] crate::OpError),
}

#[cfg(feature = "image")]
impl From<::image::ImageError> for IoError {
    fn from(err: ::image::ImageError) -> Self {
        match err {
            ::image::ImageError::IoError(e) => IoError::Io(e),
            other => IoError::Image(other),
        }
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T, IoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Every tunable of the pipeline. Missing JSON fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub grid: GridSpec,
    pub chessboard: ChessboardParams,
    pub pinhole: PinholeOptions,
    pub fisheye: FisheyeOptions,
    /// Used by the undistorted homography fits.
    pub ransac: RansacOptions,
    /// Used by the direct homography fit.
    pub lmeds: LmedsOptions,
}

impl CalibrationConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        read_json(path)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        write_json(self, path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraModel {
    Pinhole,
    Fisheye,
}

impl From<DistortionKind> for CameraModel {
    fn from(kind: DistortionKind) -> Self {
        match kind {
            DistortionKind::RadialTangential => Self::Pinhole,
            DistortionKind::Fisheye => Self::Fisheye,
        }
    }
}

impl From<CameraModel> for DistortionKind {
    fn from(model: CameraModel) -> Self {
        match model {
            CameraModel::Pinhole => Self::RadialTangential,
            CameraModel::Fisheye => Self::Fisheye,
        }
    }
}

/// Extrinsics of one calibration frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameExtrinsics {
    /// Capture timestamp, when the frame came from a timed capture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    pub rvec: [f64; 3],
    pub tvec: [f64; 3],
}

/// Persisted calibration result of one camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub width: usize,
    pub height: usize,
    pub model: CameraModel,
    /// Row-major camera matrix.
    pub intrinsics: [[f64; 3]; 3],
    pub dist_coeffs: Vec<f64>,
    #[serde(default)]
    pub frames: Vec<FrameExtrinsics>,
    pub rms: f64,
}

impl CalibrationReport {
    /// Report for `calib`; `timestamps`, when given, label frames by index.
    pub fn from_calibration(calib: &CameraCalibration, timestamps: Option<&[String]>) -> Self {
        let k = calib.camera.intrinsics.to_matrix();
        let mut intrinsics = [[0.0; 3]; 3];
        for (r, row) in intrinsics.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = k[(r, c)];
            }
        }
        let frames = calib
            .poses
            .iter()
            .enumerate()
            .map(|(i, pose)| FrameExtrinsics {
                ts: timestamps.and_then(|ts| ts.get(i).cloned()),
                rvec: pose.rvec,
                tvec: pose.tvec,
            })
            .collect();
        Self {
            width: calib.image_size.width,
            height: calib.image_size.height,
            model: calib.camera.distortion.kind().into(),
            intrinsics,
            dist_coeffs: calib.camera.distortion.coeffs().to_vec(),
            frames,
            rms: calib.rms,
        }
    }

    /// Rebuild the calibrated camera.
    pub fn camera(&self) -> Result<Camera, CodecError> {
        let k = &self.intrinsics;
        let intrinsics = Intrinsics::new(k[0][0], k[1][1], k[0][2], k[1][2]);
        if !intrinsics.is_valid() {
            return Err(CodecError::InvalidIntrinsics);
        }
        let kind = DistortionKind::from(self.model);
        let distortion =
            Distortion::from_coeffs(kind, &self.dist_coeffs).ok_or(CodecError::DistortionLength {
                kind,
                count: self.dist_coeffs.len(),
            })?;
        Ok(Camera::new(intrinsics, distortion))
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        read_json(path)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        write_json(self, path)
    }
}
