use crossview_core::{GridSpecError, OptimError};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibError {
    #[error("no calibration views supplied")]
    NoViews,
    #[error("view {view} has {got} corners, expected {expected}")]
    ViewLength {
        view: usize,
        got: usize,
        expected: usize,
    },
    #[error("image size {width}x{height} is invalid")]
    InvalidImageSize { width: usize, height: usize },
    #[error(transparent)]
    Grid(#[from] GridSpecError),
    #[error("board homography for view {0} is degenerate")]
    HomographyFailed(usize),
    #[error(transparent)]
    Optim(#[from] OptimError),
    #[error("refined calibration is not finite")]
    Diverged,
}
