use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GridSpecError {
    #[error("grid needs at least 2x2 inner corners (got {cols}x{rows})")]
    TooSmall { cols: u32, rows: u32 },

    #[error("grid spacing must be positive and finite (got {0})")]
    InvalidSpacing(f64),
}

/// Inner-corner layout of the planar chessboard target.
///
/// `cols` counts corners along a row, `rows` counts rows. Object points are
/// generated on demand; nothing is cached between calls.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSpec {
    pub cols: u32,
    pub rows: u32,
    /// Distance between neighbouring corners in board units.
    pub spacing: f64,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            cols: 10,
            rows: 7,
            spacing: 1.0,
        }
    }
}

impl GridSpec {
    pub fn new(cols: u32, rows: u32, spacing: f64) -> Result<Self, GridSpecError> {
        let spec = Self {
            cols,
            rows,
            spacing,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), GridSpecError> {
        if self.cols < 2 || self.rows < 2 {
            return Err(GridSpecError::TooSmall {
                cols: self.cols,
                rows: self.rows,
            });
        }
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(GridSpecError::InvalidSpacing(self.spacing));
        }
        Ok(())
    }

    pub fn corner_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// Planar object points, row-major: index `j` sits at `(j % cols, j / cols, 0) * spacing`.
    pub fn object_points(&self) -> Vec<Point3<f64>> {
        let cols = self.cols as usize;
        (0..self.corner_count())
            .map(|j| {
                Point3::new(
                    (j % cols) as f64 * self.spacing,
                    (j / cols) as f64 * self.spacing,
                    0.0,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_is_ten_by_seven_unit() {
        let grid = GridSpec::default();
        let pts = grid.object_points();
        assert_eq!(pts.len(), 70);
        assert_eq!(pts[0], Point3::new(0.0, 0.0, 0.0));
        assert_eq!(pts[9], Point3::new(9.0, 0.0, 0.0));
        assert_eq!(pts[10], Point3::new(0.0, 1.0, 0.0));
        assert_eq!(pts[69], Point3::new(9.0, 6.0, 0.0));
    }

    #[test]
    fn invalid_grids_are_rejected() {
        assert!(matches!(
            GridSpec::new(1, 7, 1.0),
            Err(GridSpecError::TooSmall { .. })
        ));
        assert!(matches!(
            GridSpec::new(10, 7, 0.0),
            Err(GridSpecError::InvalidSpacing(_))
        ));
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let grid: GridSpec = serde_json::from_str(r#"{"spacing": 0.025}"#).unwrap();
        assert_eq!(grid.cols, 10);
        assert_eq!(grid.rows, 7);
        assert_eq!(grid.spacing, 0.025);
    }
}
