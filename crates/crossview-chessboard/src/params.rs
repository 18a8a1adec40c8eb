use serde::{Deserialize, Serialize};

/// Contrast normalization and the cheap "is there a board at all" test.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FastCheckParams {
    /// Stretch the gray image to the full 0..255 range before detection.
    pub normalize: bool,
    /// Minimal `max - min` gray level; flatter images are rejected outright.
    pub min_contrast: u8,
    /// Run the adaptive-threshold transition test.
    pub enabled: bool,
    /// Half-size of the local-mean window; `0` picks `max(w, h) / 8`.
    pub block_radius: usize,
    /// A pixel is dark when it sits this far below its local mean.
    pub offset: u8,
    /// Distance between sampled scan lines, in pixels.
    pub scan_step: usize,
}

impl Default for FastCheckParams {
    fn default() -> Self {
        Self {
            normalize: true,
            min_contrast: 30,
            enabled: true,
            block_radius: 0,
            offset: 10,
            scan_step: 4,
        }
    }
}

/// X-junction response and peak picking.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseParams {
    /// Peaks below `threshold_rel * max_response` are dropped.
    pub threshold_rel: f32,
    pub nms_radius: usize,
}

impl Default for ResponseParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            nms_radius: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    /// Neighbour distance window, relative to the median nearest-neighbour spacing.
    pub min_spacing_rel: f32,
    pub max_spacing_rel: f32,
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_rel: 0.5,
            max_spacing_rel: 1.8,
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
        }
    }
}

/// Gradient-orthogonality corner refinement.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubPixParams {
    pub half_window: usize,
    pub max_iters: usize,
    /// Stop once the update moves the corner less than this many pixels.
    pub eps: f32,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iters: 30,
            eps: 0.01,
        }
    }
}

/// Parameters specific to the chessboard detector.
///
/// The grid size itself is not a parameter here; it is passed alongside as a
/// [`crossview_core::GridSpec`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    pub fast_check: FastCheckParams,
    pub response: ResponseParams,
    pub graph: GridGraphParams,
    pub subpix: SubPixParams,
}
