use crate::solver::{calibrate, ModelSetup};
use crate::{CalibError, CameraCalibration};
use crossview_core::{DistortionKind, GridSpec, ImageSize, TermCriteria};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Options for [`calibrate_fisheye`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FisheyeOptions {
    pub criteria: TermCriteria,
}

impl Default for FisheyeOptions {
    fn default() -> Self {
        Self {
            criteria: TermCriteria::new(20, 1e-6),
        }
    }
}

/// Calibrate an equidistant (Kannala-Brandt) fisheye camera.
///
/// The principal point starts at the centre of the pixel grid and the focal
/// length, when the views do not constrain it, at `max(w, h) / π`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(views, grid, options), fields(views = views.len()))
)]
pub fn calibrate_fisheye(
    views: &[Vec<Point2<f64>>],
    grid: &GridSpec,
    size: ImageSize,
    options: &FisheyeOptions,
) -> Result<CameraCalibration, CalibError> {
    let setup = ModelSetup {
        kind: DistortionKind::Fisheye,
        free: vec![0, 1, 2, 3],
        principal: (
            size.width as f64 * 0.5 - 0.5,
            size.height as f64 * 0.5 - 0.5,
        ),
        fallback_focal: size.width.max(size.height) as f64 / std::f64::consts::PI,
        criteria: options.criteria,
    };
    calibrate(views, grid, size, setup)
}
