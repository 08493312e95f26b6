use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Raw corner candidate produced by a corner-response detector.
///
/// This is the thing you obtain by adapting the output of the ChESS crate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    /// Corner position in pixel coordinates.
    pub position: Point2<f32>,

    /// Strength / response of the corner detector.
    pub strength: f32,
}

impl Corner {
    pub fn new(x: f32, y: f32, strength: f32) -> Self {
        Self {
            position: Point2::new(x, y),
            strength,
        }
    }

    /// Convenience accessor for (x, y) as a vector.
    pub fn as_vec2(&self) -> Vector2<f32> {
        Vector2::new(self.position.x, self.position.y)
    }
}

/// Integer grid coordinates (i, j) in board space.
///
/// `i` runs along the board columns, `j` along the rows.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GridCoords {
    pub i: i32,
    pub j: i32,
}

impl GridCoords {
    pub fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }

    /// Grid position of the `index`-th point of a row-major traversal.
    pub fn row_major(index: usize, cols: u32) -> Self {
        let cols = cols.max(1) as usize;
        Self {
            i: (index % cols) as i32,
            j: (index / cols) as i32,
        }
    }
}
