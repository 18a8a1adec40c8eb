#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HomographyError {
    #[error("point sets differ in length ({src} vs {dst})")]
    LengthMismatch { src: usize, dst: usize },
    #[error("at least 4 correspondences are required, got {0}")]
    NotEnoughPoints(usize),
    #[error("correspondences are degenerate (collinear or singular fit)")]
    Degenerate,
    #[error("no consensus model found")]
    NoConsensus,
}
