use crate::solver::{calibrate, ModelSetup};
use crate::{CalibError, CameraCalibration};
use crossview_core::{DistortionKind, GridSpec, ImageSize, TermCriteria};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Options for [`calibrate_pinhole`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinholeOptions {
    pub criteria: TermCriteria,
    /// Refine `k4..k6` of the rational model; otherwise they stay 0.
    pub rational_model: bool,
    /// Keep `p1 = p2 = 0`.
    pub fix_tangential: bool,
}

impl Default for PinholeOptions {
    fn default() -> Self {
        Self {
            criteria: TermCriteria::new(30, f64::EPSILON),
            rational_model: false,
            fix_tangential: false,
        }
    }
}

impl PinholeOptions {
    /// Refined indices into `[k1, k2, p1, p2, k3, k4, k5, k6]`.
    fn free_coeffs(&self) -> Vec<usize> {
        let mut free = vec![0, 1];
        if !self.fix_tangential {
            free.extend([2, 3]);
        }
        free.push(4);
        if self.rational_model {
            free.extend([5, 6, 7]);
        }
        free
    }
}

/// Calibrate a radial-tangential camera from `views`, each holding the
/// `grid` corners in row-major order.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(views, grid, options), fields(views = views.len()))
)]
pub fn calibrate_pinhole(
    views: &[Vec<Point2<f64>>],
    grid: &GridSpec,
    size: ImageSize,
    options: &PinholeOptions,
) -> Result<CameraCalibration, CalibError> {
    let setup = ModelSetup {
        kind: DistortionKind::RadialTangential,
        free: options.free_coeffs(),
        principal: (size.width as f64 * 0.5, size.height as f64 * 0.5),
        fallback_focal: size.width.max(size.height) as f64,
        criteria: options.criteria,
    };
    calibrate(views, grid, size, setup)
}
