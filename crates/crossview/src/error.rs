use crossview_calib::CalibError;
use crossview_core::{CodecError, ImageError};
use crossview_homography::HomographyError;
use crossview_remap::RemapError;

/// Uniform failure of every facade operation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OpError {
    /// The calibration grid was not found in the image.
    #[error("chessboard not found")]
    DetectionFailure,

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<CalibError> for OpError {
    fn from(err: CalibError) -> Self {
        match err {
            CalibError::NoViews => Self::InsufficientData(err.to_string()),
            CalibError::ViewLength { .. }
            | CalibError::InvalidImageSize { .. }
            | CalibError::Grid(_) => Self::InvalidInput(err.to_string()),
            CalibError::HomographyFailed(_) | CalibError::Optim(_) | CalibError::Diverged => {
                Self::NumericalFailure(err.to_string())
            }
        }
    }
}

impl From<HomographyError> for OpError {
    fn from(err: HomographyError) -> Self {
        match err {
            HomographyError::LengthMismatch { .. } => Self::InvalidInput(err.to_string()),
            HomographyError::NotEnoughPoints(_) => Self::InsufficientData(err.to_string()),
            HomographyError::Degenerate | HomographyError::NoConsensus => {
                Self::NumericalFailure(err.to_string())
            }
        }
    }
}

impl From<RemapError> for OpError {
    fn from(err: RemapError) -> Self {
        match err {
            RemapError::EmptyFieldOfView => Self::NumericalFailure(err.to_string()),
            RemapError::Image(_) | RemapError::InvalidIntrinsics | RemapError::MapLength { .. } => {
                Self::InvalidInput(err.to_string())
            }
        }
    }
}

impl From<CodecError> for OpError {
    fn from(err: CodecError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<ImageError> for OpError {
    fn from(err: ImageError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}
