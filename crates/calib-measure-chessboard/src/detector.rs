use crate::chess::{default_chess_config, detect_raw_corners};
use crate::gridgraph::{assign_grid_coordinates, connected_components, GridGraph};
use crate::params::ChessboardParams;
use crate::preprocess::{adaptive_threshold, is_x_junction, normalize_local_contrast};
use crate::DetectError;
use calib_measure_core::{
    BoardSpec, Corner, CorrespondenceSet, GrayImageView, GridCoords, ImagePoint2D, ObjectPoint3D,
};
use log::debug;
use nalgebra::Point2;
use std::collections::HashMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Ordered inner-corner detection for a planar checkerboard.
///
/// Implementations must return exactly `board.cols * board.rows` points in
/// row-major order: `i` runs along the board columns, `j` along the rows, and
/// the `k`-th point has grid coordinates `(k % cols, k / cols)`. The labelling
/// keeps the board handedness (the `+i` direction rotated by +90° in image
/// coordinates points along `+j`) and puts `(0, 0)` at the admissible extreme
/// corner with the smallest `x + y` in the image. With this contract the `k`-th
/// image point corresponds to the `k`-th point of
/// [`BoardSpec::object_points`].
pub trait CornerDetector {
    fn detect(&self, image: &GrayImageView<'_>, board: &BoardSpec)
        -> Result<GridDetection, DetectError>;
}

/// Ordered inner corners of one view.
#[derive(Clone, Debug, PartialEq)]
pub struct GridDetection {
    pub cols: u32,
    pub rows: u32,
    /// Sub-pixel corner positions, row-major.
    pub points: Vec<ImagePoint2D>,
    /// Grid coordinates of `points`, row-major.
    pub grid: Vec<GridCoords>,
}

impl GridDetection {
    /// Pair the detection with the board's object points.
    pub fn into_correspondences(
        self,
        object_points: &[ObjectPoint3D],
    ) -> Result<CorrespondenceSet, DetectError> {
        Ok(CorrespondenceSet::from_detection(
            object_points,
            self.cols,
            self.points,
            &self.grid,
        )?)
    }
}

/// Detect a board and turn the result into a [`CorrespondenceSet`].
pub fn detect_correspondences<D: CornerDetector + ?Sized>(
    detector: &D,
    image: &GrayImageView<'_>,
    board: &BoardSpec,
    object_points: &[ObjectPoint3D],
) -> Result<CorrespondenceSet, DetectError> {
    detector
        .detect(image, board)?
        .into_correspondences(object_points)
}

/// ChESS-based chessboard detector.
#[derive(Clone, Debug, Default)]
pub struct ChessboardDetector {
    pub params: ChessboardParams,
}

impl CornerDetector for ChessboardDetector {
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, image, board),
            fields(width = image.width, height = image.height, cols = board.cols, rows = board.rows)
        )
    )]
    fn detect(
        &self,
        image: &GrayImageView<'_>,
        board: &BoardSpec,
    ) -> Result<GridDetection, DetectError> {
        if image.width == 0 || image.height == 0 || image.data.len() != image.width * image.height
        {
            return Err(DetectError::InvalidImage {
                width: image.width,
                height: image.height,
            });
        }

        let pre = &self.params.preprocess;
        let normalized = normalize_local_contrast(image, pre.normalize_radius, pre.min_stddev);
        let chess_cfg = default_chess_config(self.params.chess_threshold_rel);
        let raw = detect_raw_corners(&normalized, &chess_cfg)?;

        let binary = adaptive_threshold(
            &normalized.view(),
            pre.threshold_radius,
            pre.threshold_offset,
        );
        let junction = &self.params.junction;
        let corners: Vec<Corner> = raw
            .iter()
            .filter(|c| c.strength >= self.params.min_strength)
            .filter(|c| {
                is_x_junction(
                    &binary.view(),
                    c.position,
                    junction.ring_radius,
                    junction.ring_samples,
                )
            })
            .copied()
            .collect();
        debug!(
            "{} ChESS candidates, {} X-junctions",
            raw.len(),
            corners.len()
        );

        self.detect_from_corners(&corners, board)
    }
}

impl ChessboardDetector {
    pub fn new(params: ChessboardParams) -> Self {
        Self { params }
    }

    /// Grid stage only: build the neighbor graph over `corners` and return the
    /// component matching `board`, in canonical row-major order.
    pub fn detect_from_corners(
        &self,
        corners: &[Corner],
        board: &BoardSpec,
    ) -> Result<GridDetection, DetectError> {
        let required = board.corner_count();
        if corners.len() < required {
            return Err(DetectError::NotEnoughCorners {
                found: corners.len(),
                required,
            });
        }

        let params = &self.params.graph;
        let graph = GridGraph::new(corners, params);
        let components = connected_components(&graph);
        debug!("grid graph has {} components", components.len());

        let mut largest = 0usize;
        let mut mismatch: Option<(u32, u32)> = None;
        for component in &components {
            largest = largest.max(component.len());
            if component.len() != required {
                continue;
            }
            let Some(labels) = assign_grid_coordinates(&graph, corners, component, params) else {
                debug!("component of {} corners has inconsistent labels", component.len());
                continue;
            };
            let (w, h, shifted) = normalize_labels(&labels);
            let fits = (w, h) == (board.cols, board.rows) || (w, h) == (board.rows, board.cols);
            if !fits {
                mismatch = Some((w, h));
                continue;
            }
            return Ok(canonical_detection(corners, &shifted, w, h, board));
        }

        match mismatch {
            Some((found_cols, found_rows)) => Err(DetectError::GridSizeMismatch {
                cols: board.cols,
                rows: board.rows,
                found_cols,
                found_rows,
            }),
            None => Err(DetectError::GridNotFound { largest, required }),
        }
    }
}

/// Shift labels so the minimum is `(0, 0)`; returns the grid extents.
fn normalize_labels(labels: &[(usize, GridCoords)]) -> (u32, u32, Vec<(usize, GridCoords)>) {
    let min_i = labels.iter().map(|(_, g)| g.i).min().unwrap_or(0);
    let min_j = labels.iter().map(|(_, g)| g.j).min().unwrap_or(0);
    let max_i = labels.iter().map(|(_, g)| g.i).max().unwrap_or(0);
    let max_j = labels.iter().map(|(_, g)| g.j).max().unwrap_or(0);
    let shifted = labels
        .iter()
        .map(|&(idx, g)| (idx, GridCoords::new(g.i - min_i, g.j - min_j)))
        .collect();
    (
        (max_i - min_i + 1) as u32,
        (max_j - min_j + 1) as u32,
        shifted,
    )
}

/// Rotate a label in a `w x h` grid by `quarter_turns * 90°`.
fn rotate_label(g: GridCoords, quarter_turns: u8, w: i32, h: i32) -> GridCoords {
    match quarter_turns % 4 {
        0 => g,
        1 => GridCoords::new(h - 1 - g.j, g.i),
        2 => GridCoords::new(w - 1 - g.i, h - 1 - g.j),
        _ => GridCoords::new(g.j, w - 1 - g.i),
    }
}

fn canonical_detection(
    corners: &[Corner],
    labels: &[(usize, GridCoords)],
    w: u32,
    h: u32,
    board: &BoardSpec,
) -> GridDetection {
    let mut turns: Vec<u8> = Vec::with_capacity(4);
    if (w, h) == (board.cols, board.rows) {
        turns.extend([0, 2]);
    }
    if (w, h) == (board.rows, board.cols) {
        turns.extend([1, 3]);
    }

    let origin_score = |t: u8| {
        labels
            .iter()
            .find(|(_, g)| rotate_label(*g, t, w as i32, h as i32) == GridCoords::new(0, 0))
            .map(|(idx, _)| corners[*idx].position.x + corners[*idx].position.y)
            .unwrap_or(f32::INFINITY)
    };
    let best = turns
        .iter()
        .copied()
        .min_by(|&a, &b| origin_score(a).total_cmp(&origin_score(b)))
        .unwrap_or(0);

    let by_cell: HashMap<GridCoords, usize> = labels
        .iter()
        .map(|&(idx, g)| (rotate_label(g, best, w as i32, h as i32), idx))
        .collect();

    let count = board.corner_count();
    let mut points = Vec::with_capacity(count);
    let mut grid = Vec::with_capacity(count);
    for k in 0..count {
        let g = GridCoords::row_major(k, board.cols);
        if let Some(&idx) = by_cell.get(&g) {
            let p = corners[idx].position;
            points.push(Point2::new(p.x as f64, p.y as f64));
            grid.push(g);
        }
    }

    GridDetection {
        cols: board.cols,
        rows: board.rows,
        points,
        grid,
    }
}
