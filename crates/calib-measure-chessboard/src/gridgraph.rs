use crate::params::GridGraphParams;
use calib_measure_core::{Corner, GridCoords};
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use std::collections::{HashMap, VecDeque};

#[derive(Clone, Debug, PartialEq)]
pub struct NodeNeighbor {
    pub index: usize,
    pub distance: f32,
}

/// Undirected 4-connected graph over corner candidates.
pub struct GridGraph {
    pub neighbors: Vec<Vec<NodeNeighbor>>, // For each node, list of neighbors
}

/// Candidate neighbors of one corner: nearest-first, within the spacing
/// window, at most one per direction sector, at most four.
fn select_neighbors(
    corners: &[Corner],
    center: usize,
    mut candidates: Vec<NodeNeighbor>,
    params: &GridGraphParams,
) -> Vec<NodeNeighbor> {
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    let Some(nearest) = candidates.first().map(|c| c.distance) else {
        return Vec::new();
    };
    let max_distance = nearest * params.max_spacing_ratio;
    let min_sep_cos = params.min_direction_separation_deg.to_radians().cos();

    let mut selected: Vec<NodeNeighbor> = Vec::with_capacity(4);
    let mut directions: Vec<Vector2<f32>> = Vec::with_capacity(4);
    for candidate in candidates {
        if selected.len() == 4 || candidate.distance > max_distance {
            break;
        }
        let dir = (corners[candidate.index].as_vec2() - corners[center].as_vec2())
            / candidate.distance;
        if directions.iter().any(|d| d.dot(&dir) > min_sep_cos) {
            continue;
        }
        directions.push(dir);
        selected.push(candidate);
    }
    selected
}

impl GridGraph {
    pub fn new(corners: &[Corner], params: &GridGraphParams) -> Self {
        if corners.len() < 2 {
            return Self {
                neighbors: vec![Vec::new(); corners.len()],
            };
        }

        let coords = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();

        let mut candidates = Vec::with_capacity(corners.len());
        for (i, corner) in corners.iter().enumerate() {
            let query_point = [corner.position.x, corner.position.y];
            let results = tree.nearest_n::<SquaredEuclidean>(&query_point, params.k_neighbors + 1);

            let node_candidates = results
                .into_iter()
                .filter(|nn| nn.item as usize != i && nn.distance > 0.0)
                .map(|nn| NodeNeighbor {
                    index: nn.item as usize,
                    distance: nn.distance.sqrt(),
                })
                .collect();
            candidates.push(select_neighbors(corners, i, node_candidates, params));
        }

        // Keep only mutual edges so the graph is undirected.
        let neighbors = candidates
            .iter()
            .enumerate()
            .map(|(i, list)| {
                list.iter()
                    .filter(|n| candidates[n.index].iter().any(|back| back.index == i))
                    .cloned()
                    .collect()
            })
            .collect();

        Self { neighbors }
    }
}

pub fn connected_components(graph: &GridGraph) -> Vec<Vec<usize>> {
    let mut visited = vec![false; graph.neighbors.len()];
    let mut components = Vec::new();

    for start in 0..graph.neighbors.len() {
        if visited[start] {
            continue;
        }

        let mut component = Vec::new();
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            component.push(node);

            for neighbor in &graph.neighbors[node] {
                if !visited[neighbor.index] {
                    stack.push(neighbor.index);
                }
            }
        }

        components.push(component);
    }

    components
}

/// Assign integer grid coordinates to one connected component.
///
/// Grid axes are tracked locally along the BFS: stepping along `u` refreshes
/// the `u` estimate from the traversed edge, and likewise for `v`, so the
/// labelling follows in-plane rotation and moderate perspective. The seed's
/// `v` axis is its `u` axis rotated by +90° in image coordinates, which fixes
/// the handedness of the labelling.
///
/// Returns `None` if the labelling is inconsistent (a node reached with two
/// different coordinates, or two nodes claiming the same cell).
pub fn assign_grid_coordinates(
    graph: &GridGraph,
    corners: &[Corner],
    component: &[usize],
    params: &GridGraphParams,
) -> Option<Vec<(usize, GridCoords)>> {
    let seed = component
        .iter()
        .copied()
        .max_by_key(|&n| graph.neighbors[n].len())?;
    let first = graph.neighbors[seed].first()?;
    let u0 = (corners[first.index].as_vec2() - corners[seed].as_vec2()).normalize();
    let v0 = Vector2::new(-u0.y, u0.x);

    let mut labels: HashMap<usize, GridCoords> = HashMap::new();
    let mut occupied: HashMap<GridCoords, usize> = HashMap::new();
    let mut queue = VecDeque::new();

    let origin = GridCoords::new(0, 0);
    labels.insert(seed, origin);
    occupied.insert(origin, seed);
    queue.push_back((seed, origin, u0, v0));

    while let Some((node, g, u, v)) = queue.pop_front() {
        for neighbor in &graph.neighbors[node] {
            let edge = corners[neighbor.index].as_vec2() - corners[node].as_vec2();
            let e = edge / neighbor.distance.max(f32::EPSILON);
            let (du, dv) = (e.dot(&u), e.dot(&v));

            let (step, next_u, next_v) = if du.abs() >= dv.abs() {
                if du.abs() < params.min_axis_cos {
                    continue;
                }
                let s = du.signum();
                ((s as i32, 0), e * s, v)
            } else {
                if dv.abs() < params.min_axis_cos {
                    continue;
                }
                let s = dv.signum();
                ((0, s as i32), u, e * s)
            };

            let target = GridCoords::new(g.i + step.0, g.j + step.1);
            match labels.get(&neighbor.index) {
                Some(existing) if *existing != target => return None,
                Some(_) => {}
                None => {
                    if occupied.insert(target, neighbor.index).is_some() {
                        return None;
                    }
                    labels.insert(neighbor.index, target);
                    queue.push_back((neighbor.index, target, next_u, next_v));
                }
            }
        }
    }

    let mut out: Vec<(usize, GridCoords)> = labels.into_iter().collect();
    out.sort_by_key(|(idx, _)| *idx);
    Some(out)
}
