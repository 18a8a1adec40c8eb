//! Inner-corner chessboard detector.
//!
//! Pipeline:
//! 1. Convert to gray and stretch the contrast; flat frames are rejected.
//! 2. Fast check: adaptive threshold, then count dark/light transitions on
//!    scan lines. Frames without enough striping are rejected early.
//! 3. ChESS-style X-junction response and non-maximum suppression.
//! 4. Estimate a base spacing from nearest-neighbor distances.
//! 5. Link each corner to up to 4 neighbors (right/left/up/down) whose
//!    diagonals are swapped and whose distance is near the base spacing.
//! 6. BFS each connected component and assign integer coordinates `(i, j)`.
//! 7. Keep the component that fills exactly `cols x rows` (up to transpose)
//!    and relabel it canonically: row-major, right-handed, first corner
//!    nearest the image origin.
//! 8. Refine every corner to sub-pixel precision.
//!
//! ```no_run
//! use crossview_chessboard::{ChessboardDetector, ChessboardParams};
//! use crossview_core::{GridSpec, RgbaImageView};
//!
//! # fn frame() -> (usize, usize, Vec<u8>) { (640, 480, vec![0; 640 * 480 * 4]) }
//! let (w, h, rgba) = frame();
//! let detector = ChessboardDetector::new(GridSpec::default(), ChessboardParams::default());
//! let view = RgbaImageView::new(w, h, &rgba).unwrap();
//! if let Some(board) = detector.detect(&view) {
//!     println!("first corner at {}", board.corners[0]);
//! }
//! ```

mod detector;
mod geom;
mod gridgraph;
mod params;
mod response;
mod subpix;
mod threshold;

pub use detector::{ChessboardDetection, ChessboardDetector};
pub use gridgraph::{GridGraph, NeighborDirection, NodeNeighbor};
pub use params::{ChessboardParams, FastCheckParams, GridGraphParams, ResponseParams, SubPixParams};
pub use response::Corner;
