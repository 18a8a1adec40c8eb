use crossview_core::ImageError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RemapError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("camera intrinsics have non-positive or non-finite focal lengths")]
    InvalidIntrinsics,

    #[error("map length {got} does not match a {width}x{height} table")]
    MapLength {
        width: usize,
        height: usize,
        got: usize,
    },

    #[error("undistorted image border collapses; no valid field of view")]
    EmptyFieldOfView,
}
