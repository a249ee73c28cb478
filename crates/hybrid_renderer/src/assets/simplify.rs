//! Vertex clustering simplification
//!
//! Space is cut into a uniform grid. Every vertex referenced by the input
//! triangles collapses onto one representative per cell: the referenced
//! vertex closest to the cell's centroid. Triangles are remapped onto the
//! representatives, so the output indexes the original vertex buffer.
//! Triangles that collapse to a line or point, and duplicates of a triangle
//! already emitted, are dropped.

use std::collections::{HashMap, HashSet};

use crate::foundation::math::Vec3;

type Cell = (i32, i32, i32);

fn cell_of(position: &Vec3, origin: &Vec3, cell_size: f32) -> Cell {
    let p = (position - origin) / cell_size;
    (p.x.floor() as i32, p.y.floor() as i32, p.z.floor() as i32)
}

/// Simplify `indices` on a grid of `cell_size` anchored at `origin`
pub fn simplify_clustered(positions: &[Vec3], indices: &[u32], origin: &Vec3, cell_size: f32) -> Vec<u32> {
    let cell_size = cell_size.max(f32::EPSILON);

    // centroid of the referenced vertices per cell
    let mut sums: HashMap<Cell, (Vec3, u32)> = HashMap::new();
    let mut seen = HashSet::new();
    for &index in indices {
        if seen.insert(index) {
            let position = positions[index as usize];
            let entry = sums
                .entry(cell_of(&position, origin, cell_size))
                .or_insert((Vec3::zeros(), 0));
            entry.0 += position;
            entry.1 += 1;
        }
    }

    let mut representatives: HashMap<Cell, (u32, f32)> = HashMap::new();
    let mut ordered: Vec<u32> = seen.into_iter().collect();
    ordered.sort_unstable();
    for index in ordered {
        let position = positions[index as usize];
        let cell = cell_of(&position, origin, cell_size);
        let (sum, count) = sums[&cell];
        let distance = (position - sum / count as f32).norm_squared();
        representatives
            .entry(cell)
            .and_modify(|best| {
                if distance < best.1 {
                    *best = (index, distance);
                }
            })
            .or_insert((index, distance));
    }

    let remap = |index: u32| {
        let cell = cell_of(&positions[index as usize], origin, cell_size);
        representatives[&cell].0
    };

    let mut emitted = HashSet::new();
    let mut output = Vec::with_capacity(indices.len());
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [remap(triangle[0]), remap(triangle[1]), remap(triangle[2])];
        if a == b || b == c || a == c {
            continue;
        }
        if emitted.insert(canonical(a, b, c)) {
            output.extend_from_slice(&[a, b, c]);
        }
    }
    output
}

/// Rotation of a triangle starting at its smallest index, winding kept
fn canonical(a: u32, b: u32, c: u32) -> (u32, u32, u32) {
    if a < b && a < c {
        (a, b, c)
    } else if b < c {
        (b, c, a)
    } else {
        (c, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `n` by `n` quads in the unit square
    fn grid(n: u32) -> (Vec<Vec3>, Vec<u32>) {
        let mut positions = Vec::new();
        for y in 0..=n {
            for x in 0..=n {
                positions.push(Vec3::new(x as f32 / n as f32, y as f32 / n as f32, 0.0));
            }
        }
        let mut indices = Vec::new();
        for y in 0..n {
            for x in 0..n {
                let i = y * (n + 1) + x;
                indices.extend_from_slice(&[i, i + 1, i + n + 2, i, i + n + 2, i + n + 1]);
            }
        }
        (positions, indices)
    }

    #[test]
    fn test_fine_grid_keeps_everything() {
        let (positions, indices) = grid(4);
        let out = simplify_clustered(&positions, &indices, &Vec3::new(-0.01, -0.01, -0.01), 0.1);
        assert_eq!(out.len(), indices.len());
    }

    #[test]
    fn test_coarse_grid_reduces_and_stays_in_range() {
        let (positions, indices) = grid(16);
        let out = simplify_clustered(&positions, &indices, &Vec3::new(-0.01, -0.01, -0.01), 0.26);
        assert!(out.len() < indices.len() / 4);
        assert!(!out.is_empty());
        assert_eq!(out.len() % 3, 0);
        assert!(out.iter().all(|&i| (i as usize) < positions.len()));
    }

    #[test]
    fn test_single_cell_collapses_to_nothing() {
        let (positions, indices) = grid(2);
        let out = simplify_clustered(&positions, &indices, &Vec3::new(-1.0, -1.0, -1.0), 10.0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_canonical_keeps_winding() {
        assert_eq!(canonical(5, 1, 3), (1, 3, 5));
        assert_eq!(canonical(3, 5, 1), (1, 3, 5));
        assert_ne!(canonical(1, 5, 3), canonical(1, 3, 5));
    }
}
