use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Board point in physical units; `z == 0` for a planar target.
pub type ObjectPoint3D = Point3<f64>;

/// Sub-pixel image point.
pub type ImagePoint2D = Point2<f64>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BoardSpecError {
    #[error("board needs at least one inner corner per axis (cols={cols}, rows={rows})")]
    EmptyGrid { cols: u32, rows: u32 },
    #[error("square size must be positive and finite, got {0}")]
    InvalidSquareSize(f64),
}

/// Checkerboard geometry: inner-corner counts and square edge length.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSpec {
    /// Inner corners along the horizontal board axis.
    pub cols: u32,
    /// Inner corners along the vertical board axis.
    pub rows: u32,
    /// Edge length of one square, in the unit the board points are reported in.
    pub square_size: f64,
}

impl BoardSpec {
    pub fn new(cols: u32, rows: u32, square_size: f64) -> Result<Self, BoardSpecError> {
        let spec = Self {
            cols,
            rows,
            square_size,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Check a spec that did not go through [`BoardSpec::new`] (e.g. deserialized).
    pub fn validate(&self) -> Result<(), BoardSpecError> {
        if self.cols == 0 || self.rows == 0 {
            return Err(BoardSpecError::EmptyGrid {
                cols: self.cols,
                rows: self.rows,
            });
        }
        if !(self.square_size.is_finite() && self.square_size > 0.0) {
            return Err(BoardSpecError::InvalidSquareSize(self.square_size));
        }
        Ok(())
    }

    pub fn corner_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// Canonical object points of the board, row-major over inner corners.
    ///
    /// Point `k = j * cols + i` is `(i * s, j * s, 0)`. Corner detectors must
    /// report image points in the same order.
    pub fn object_points(&self) -> Vec<ObjectPoint3D> {
        let s = self.square_size;
        let mut points = Vec::with_capacity(self.corner_count());
        for j in 0..self.rows {
            for i in 0..self.cols {
                points.push(Point3::new(i as f64 * s, j as f64 * s, 0.0));
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_points_are_row_major_on_plane() {
        let board = BoardSpec::new(7, 9, 18.0).expect("valid board");
        let pts = board.object_points();

        assert_eq!(pts.len(), 63);
        assert!(pts.iter().all(|p| p.z == 0.0));
        for j in 0..9usize {
            for i in 0..7usize {
                let p = pts[j * 7 + i];
                assert_eq!(p, Point3::new(i as f64 * 18.0, j as f64 * 18.0, 0.0));
            }
        }
        assert_eq!(pts[1], Point3::new(18.0, 0.0, 0.0));
        assert_eq!(pts[7], Point3::new(0.0, 18.0, 0.0));
    }

    #[test]
    fn generator_is_deterministic() {
        let board = BoardSpec::new(4, 3, 2.5).expect("valid board");
        assert_eq!(board.object_points(), board.object_points());
    }

    #[test]
    fn single_corner_board() {
        let board = BoardSpec::new(1, 1, 10.0).expect("valid board");
        assert_eq!(board.object_points(), vec![Point3::origin()]);
    }

    #[test]
    fn rejects_invalid_specs() {
        assert_eq!(
            BoardSpec::new(0, 5, 1.0),
            Err(BoardSpecError::EmptyGrid { cols: 0, rows: 5 })
        );
        assert!(matches!(
            BoardSpec::new(3, 3, 0.0),
            Err(BoardSpecError::InvalidSquareSize(_))
        ));
        assert!(BoardSpec::new(3, 3, f64::NAN).is_err());
    }
}
