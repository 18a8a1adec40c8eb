//! Multi-view camera calibration and cross-view coordinate mapping.
//!
//! This crate re-exports the `crossview-*` building blocks and exposes the
//! pipeline as eleven operations, each in two flavours:
//! - [`ops`]: typed values in, `Result<_, OpError>` out;
//! - [`buffers`]: flat `&[u8]` / `&[f32]` buffers in, `&mut [f32]` out,
//!   written only on success.
//!
//! ## Quickstart
//!
//! ```no_run
//! use crossview::{ops, CalibrationConfig};
//! use crossview::core::{ImageSize, RgbaImageView};
//!
//! # fn frames() -> Vec<Vec<u8>> { Vec::new() }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CalibrationConfig::default();
//! let size = ImageSize::new(640, 480);
//! let mut views = Vec::new();
//! for rgba in frames() {
//!     let view = RgbaImageView::new(size.width, size.height, &rgba)?;
//!     if let Ok(board) = ops::detect_chessboard_corners(&view, config.grid, &config.chessboard) {
//!         views.push(board.corners.iter().map(|p| p.cast::<f64>()).collect());
//!     }
//! }
//! let calib = ops::calibrate_intrinsics_extended(&views, &config.grid, size, &config.pinhole)?;
//! println!("rms = {:.3} px", calib.rms);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `crossview::core`: images, cameras, poses, homographies, flat-buffer codec.
//! - `crossview::chessboard`: inner-corner chessboard detection.
//! - `crossview::calib`: pinhole and fisheye calibration.
//! - `crossview::homography`: RANSAC / LMedS homographies with quality metrics.
//! - `crossview::remap`: undistortion and cross-view remap tables.
//! - `crossview::image_io` (feature `image`): `image` crate interop.

pub use crossview_calib as calib;
pub use crossview_chessboard as chessboard;
pub use crossview_core as core;
pub use crossview_homography as homography;
pub use crossview_remap as remap;

pub mod buffers;
mod error;
#[cfg(feature = "image")]
pub mod image_io;
mod io;
pub mod ops;
mod pairing;

pub use error::OpError;
pub use io::{CalibrationConfig, CalibrationReport, CameraModel, FrameExtrinsics, IoError};
pub use pairing::{pair_by_timestamp, PairedCorners, TimedCorners};
