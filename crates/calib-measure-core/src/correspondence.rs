use crate::{GridCoords, ImagePoint2D, ObjectPoint3D};
use nalgebra::Point2;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CorrespondenceError {
    #[error("point count mismatch (object={object}, image={image}, grid={grid})")]
    LengthMismatch {
        object: usize,
        image: usize,
        grid: usize,
    },
    #[error(
        "image point {index} is at grid ({}, {}), row-major order expects ({}, {})",
        .found.i, .found.j, .expected.i, .expected.j
    )]
    OrderingMismatch {
        index: usize,
        expected: GridCoords,
        found: GridCoords,
    },
}

/// Matched board/image points of one calibration view.
///
/// Both sequences have the same length and share the row-major traversal
/// order of the board. The fields are private so that the invariant can only
/// be established through the checked constructors.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrespondenceSet {
    object_points: Vec<ObjectPoint3D>,
    image_points: Vec<ImagePoint2D>,
}

impl CorrespondenceSet {
    /// Pair object and image points positionally.
    pub fn new(
        object_points: Vec<ObjectPoint3D>,
        image_points: Vec<ImagePoint2D>,
    ) -> Result<Self, CorrespondenceError> {
        if object_points.len() != image_points.len() {
            return Err(CorrespondenceError::LengthMismatch {
                object: object_points.len(),
                image: image_points.len(),
                grid: image_points.len(),
            });
        }
        Ok(Self {
            object_points,
            image_points,
        })
    }

    /// Pair detector output with the board pattern, verifying the ordering contract.
    ///
    /// `grid[k]` is the board position the detector assigned to `image_points[k]`;
    /// it must equal the row-major position of `k` for a board `cols` corners wide.
    pub fn from_detection(
        object_points: &[ObjectPoint3D],
        cols: u32,
        image_points: Vec<ImagePoint2D>,
        grid: &[GridCoords],
    ) -> Result<Self, CorrespondenceError> {
        if object_points.len() != image_points.len() || grid.len() != image_points.len() {
            return Err(CorrespondenceError::LengthMismatch {
                object: object_points.len(),
                image: image_points.len(),
                grid: grid.len(),
            });
        }
        for (index, found) in grid.iter().enumerate() {
            let expected = GridCoords::row_major(index, cols);
            if *found != expected {
                return Err(CorrespondenceError::OrderingMismatch {
                    index,
                    expected,
                    found: *found,
                });
            }
        }
        Self::new(object_points.to_vec(), image_points)
    }

    pub fn len(&self) -> usize {
        self.object_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_points.is_empty()
    }

    pub fn object_points(&self) -> &[ObjectPoint3D] {
        &self.object_points
    }

    pub fn image_points(&self) -> &[ImagePoint2D] {
        &self.image_points
    }

    /// Board points projected onto their plane (drops `z`).
    pub fn planar_points(&self) -> Vec<Point2<f64>> {
        self.object_points
            .iter()
            .map(|p| Point2::new(p.x, p.y))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectPoint3D, &ImagePoint2D)> {
        self.object_points.iter().zip(self.image_points.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoardSpec;

    fn board_and_pixels() -> (Vec<ObjectPoint3D>, Vec<ImagePoint2D>, Vec<GridCoords>) {
        let board = BoardSpec::new(3, 2, 10.0).expect("board");
        let objects = board.object_points();
        let pixels = (0..6)
            .map(|k| Point2::new(100.0 + 20.0 * (k % 3) as f64, 50.0 + 20.0 * (k / 3) as f64))
            .collect();
        let grid = (0..6).map(|k| GridCoords::row_major(k, 3)).collect();
        (objects, pixels, grid)
    }

    #[test]
    fn accepts_row_major_detection() {
        let (objects, pixels, grid) = board_and_pixels();
        let set = CorrespondenceSet::from_detection(&objects, 3, pixels, &grid).expect("valid");
        assert_eq!(set.len(), 6);
        let (obj, img) = set.iter().nth(4).expect("pair");
        assert_eq!((obj.x, obj.y), (10.0, 10.0));
        assert_eq!((img.x, img.y), (120.0, 70.0));
    }

    #[test]
    fn rejects_count_mismatch() {
        let (objects, mut pixels, grid) = board_and_pixels();
        pixels.pop();
        let err = CorrespondenceSet::from_detection(&objects, 3, pixels, &grid).unwrap_err();
        assert!(matches!(err, CorrespondenceError::LengthMismatch { .. }));
    }

    #[test]
    fn rejects_permuted_detection() {
        let (objects, pixels, mut grid) = board_and_pixels();
        // Column-major labelling of the same points: same shape, wrong order.
        grid.swap(1, 3);
        let err = CorrespondenceSet::from_detection(&objects, 3, pixels, &grid).unwrap_err();
        assert_eq!(
            err,
            CorrespondenceError::OrderingMismatch {
                index: 1,
                expected: GridCoords::new(1, 0),
                found: GridCoords::new(0, 1),
            }
        );
    }
}
