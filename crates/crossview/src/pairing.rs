use log::{debug, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Corners detected in one frame, tagged with its capture timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedCorners {
    pub ts: String,
    pub corners: Vec<Point2<f64>>,
}

/// Correspondences of two cameras, built from frames captured together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairedCorners {
    /// Matched timestamps in the order of the first camera's frames.
    pub timestamps: Vec<String>,
    pub src: Vec<Point2<f64>>,
    pub dst: Vec<Point2<f64>>,
}

impl PairedCorners {
    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }
}

/// Pair frames of camera A and camera B with identical timestamps and
/// concatenate their corner sets.
///
/// Frames whose corner counts differ are skipped.
pub fn pair_by_timestamp(a: &[TimedCorners], b: &[TimedCorners]) -> PairedCorners {
    let by_ts: HashMap<&str, &TimedCorners> = b.iter().map(|f| (f.ts.as_str(), f)).collect();
    let mut paired = PairedCorners::default();
    for frame in a {
        let Some(other) = by_ts.get(frame.ts.as_str()) else {
            continue;
        };
        if frame.corners.len() != other.corners.len() {
            warn!(
                "frame {}: corner counts differ ({} vs {}), skipped",
                frame.ts,
                frame.corners.len(),
                other.corners.len()
            );
            continue;
        }
        paired.timestamps.push(frame.ts.clone());
        paired.src.extend_from_slice(&frame.corners);
        paired.dst.extend_from_slice(&other.corners);
    }
    debug!(
        "paired {} of {} frames, {} correspondences",
        paired.timestamps.len(),
        a.len(),
        paired.len()
    );
    paired
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ts: &str, x: f64, n: usize) -> TimedCorners {
        TimedCorners {
            ts: ts.to_string(),
            corners: (0..n).map(|i| Point2::new(x, i as f64)).collect(),
        }
    }

    #[test]
    fn pairs_only_common_timestamps() {
        let a = vec![frame("t1", 1.0, 3), frame("t2", 2.0, 3), frame("t3", 3.0, 3)];
        let b = vec![frame("t3", 30.0, 3), frame("t1", 10.0, 3), frame("t4", 40.0, 3)];
        let paired = pair_by_timestamp(&a, &b);
        assert_eq!(paired.timestamps, vec!["t1", "t3"]);
        assert_eq!(paired.len(), 6);
        assert_eq!(paired.src[3], Point2::new(3.0, 0.0));
        assert_eq!(paired.dst[3], Point2::new(30.0, 0.0));
    }

    #[test]
    fn skips_frames_with_mismatched_counts() {
        let a = vec![frame("t1", 1.0, 3)];
        let b = vec![frame("t1", 1.0, 2)];
        assert!(pair_by_timestamp(&a, &b).is_empty());
    }
}
