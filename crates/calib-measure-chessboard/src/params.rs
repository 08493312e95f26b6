use serde::{Deserialize, Serialize};

/// Local-contrast normalization and adaptive-threshold settings.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PreprocessParams {
    /// Half-size of the normalization window, in pixels.
    pub normalize_radius: usize,
    /// Lower bound on the local standard deviation, so flat regions are not
    /// amplified into noise.
    pub min_stddev: f32,
    /// Half-size of the adaptive-threshold mean window, in pixels.
    pub threshold_radius: usize,
    /// Subtracted from the local mean before comparison (OpenCV `C`).
    pub threshold_offset: f32,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            normalize_radius: 15,
            min_stddev: 4.0,
            threshold_radius: 10,
            threshold_offset: 5.0,
        }
    }
}

/// X-junction check applied to every corner candidate on the binary image.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct JunctionParams {
    pub ring_radius: f32,
    pub ring_samples: usize,
}

impl Default for JunctionParams {
    fn default() -> Self {
        Self {
            ring_radius: 4.0,
            ring_samples: 16,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    /// Nearest neighbors queried per corner.
    pub k_neighbors: usize,
    /// A neighbor is accepted if it is within `max_spacing_ratio` times the
    /// distance to the closest corner. Diagonal neighbors sit at ~1.41.
    pub max_spacing_ratio: f32,
    /// Minimal separation between accepted neighbor directions, degrees.
    pub min_direction_separation_deg: f32,
    /// An edge whose direction is within this cosine of neither tracked grid
    /// axis is ambiguous and not traversed.
    pub min_axis_cos: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            k_neighbors: 8,
            max_spacing_ratio: 1.3,
            min_direction_separation_deg: 50.0,
            min_axis_cos: 0.75,
        }
    }
}

/// Parameters of the chessboard detector.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    /// Relative ChESS response threshold passed to `chess-corners`.
    pub chess_threshold_rel: f32,
    /// Minimal corner strength to consider.
    pub min_strength: f32,
    pub preprocess: PreprocessParams,
    pub junction: JunctionParams,
    pub graph: GridGraphParams,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            chess_threshold_rel: 0.2,
            min_strength: 0.0,
            preprocess: PreprocessParams::default(),
            junction: JunctionParams::default(),
            graph: GridGraphParams::default(),
        }
    }
}
