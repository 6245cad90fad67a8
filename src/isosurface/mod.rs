//! Marching cubes over periodic energy grids.

pub mod tables;

use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use crate::{
    grid::EnergyGrid,
    types::{
        Mat33,
        Vec3,
    },
};
use tables::{
    CORNER_OFFSETS,
    EDGE_CORNERS,
    EDGE_TABLE,
    TRI_TABLE,
};


/// Triangle mesh with per-vertex normals, positions in fractional reciprocal
/// coordinates unless transformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IsosurfaceMesh {
    /// Vertex positions (x, y, z interleaved)
    pub positions: Vec<f32>,
    /// Unit normals (nx, ny, nz interleaved), pointing towards higher energy
    pub normals:   Vec<f32>,
    /// Triangle indices (3 per triangle)
    pub indices:   Vec<u32>,
}


impl IsosurfaceMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn push_vertex(&mut self, p: Vec3<f64>, n: Vec3<f64>) -> u32 {
        let i = self.vertex_count() as u32;
        self.positions.extend(p.map(|x| x as f32));
        self.normals.extend(n.map(|x| x as f32));
        i
    }

    /// Map to Cartesian coordinates, `basis` holds the reciprocal vectors as
    /// rows. Normals go through the inverse transpose; a singular basis leaves
    /// them untouched.
    pub fn transform(&self, basis: &Mat33<f64>) -> Self {
        let positions = self.positions.chunks_exact(3)
            .flat_map(|p| {
                let [x, y, z] = [p[0] as f64, p[1] as f64, p[2] as f64];
                (0 .. 3).map(move |j| (x * basis[0][j] + y * basis[1][j] + z * basis[2][j]) as f32)
            })
            .collect();

        let normals = match inverse(basis) {
            Some(inv) => self.normals.chunks_exact(3)
                .flat_map(|n| {
                    let n = [n[0] as f64, n[1] as f64, n[2] as f64];
                    let t = [0, 1, 2].map(|i| inv[i][0] * n[0] + inv[i][1] * n[1] + inv[i][2] * n[2]);
                    normalize(t).map(|x| x as f32)
                })
                .collect(),
            None => self.normals.clone(),
        };

        Self { positions, normals, indices: self.indices.clone() }
    }
}


fn inverse(m: &Mat33<f64>) -> Option<Mat33<f64>> {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    if det.abs() < 1e-300 || !det.is_finite() {
        return None;
    }
    let mut inv = [[0.0; 3]; 3];
    for i in 0 .. 3 {
        for j in 0 .. 3 {
            let (r0, r1) = ((j + 1) % 3, (j + 2) % 3);
            let (c0, c1) = ((i + 1) % 3, (i + 2) % 3);
            inv[i][j] = (m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]) / det;
        }
    }
    Some(inv)
}


fn normalize(v: Vec3<f64>) -> Vec3<f64> {
    let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if norm == 0.0 || !norm.is_finite() {
        [0.0, 0.0, 1.0]
    } else {
        v.map(|x| x / norm)
    }
}


/// Crossing parameter along an edge, halfway when both ends are equal.
fn edge_parameter(iso: f64, v0: f64, v1: f64) -> f64 {
    let t = (iso - v0) / (v1 - v0);
    if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 }
}


fn march<V, G, P>(cells: [usize; 3], iso: f64, value: V, gradient: G, position: P) -> IsosurfaceMesh
where
    V: Fn([isize; 3]) -> f64,
    G: Fn([isize; 3]) -> Vec3<f64>,
    P: Fn([isize; 3]) -> Vec3<f64>,
{
    let mut mesh = IsosurfaceMesh::default();
    let mut vertices: HashMap<([isize; 3], u8), u32> = HashMap::new();

    for iz in 0 .. cells[2] as isize {
        for iy in 0 .. cells[1] as isize {
            for ix in 0 .. cells[0] as isize {
                let nodes = CORNER_OFFSETS.map(|o| [ix + o[0] as isize, iy + o[1] as isize, iz + o[2] as isize]);
                let values = nodes.map(&value);

                let config = values.iter()
                    .enumerate()
                    .filter(|(_, v)| **v < iso)
                    .fold(0usize, |acc, (i, _)| acc | 1 << i);
                let edges = EDGE_TABLE[config];
                if edges == 0 {
                    continue;
                }

                let mut edge_vertex = [0u32; 12];
                for (e, [c0, c1]) in EDGE_CORNERS.iter().enumerate() {
                    if edges & (1 << e) == 0 {
                        continue;
                    }
                    let (a, b) = if nodes[*c0] <= nodes[*c1] { (*c0, *c1) } else { (*c1, *c0) };
                    let axis = (0 .. 3).position(|i| nodes[a][i] != nodes[b][i]).unwrap_or(0) as u8;

                    edge_vertex[e] = *vertices.entry((nodes[a], axis)).or_insert_with(|| {
                        let t = edge_parameter(iso, values[a], values[b]);
                        let (pa, pb) = (position(nodes[a]), position(nodes[b]));
                        let (ga, gb) = (gradient(nodes[a]), gradient(nodes[b]));
                        let p = [0, 1, 2].map(|i| pa[i] + t * (pb[i] - pa[i]));
                        let n = normalize([0, 1, 2].map(|i| ga[i] + t * (gb[i] - ga[i])));
                        mesh.push_vertex(p, n)
                    });
                }

                // table triangles face the low side, flip them to follow the gradient
                for tri in TRI_TABLE[config].chunks_exact(3).take_while(|t| t[0] >= 0) {
                    mesh.indices.extend([
                        edge_vertex[tri[0] as usize],
                        edge_vertex[tri[2] as usize],
                        edge_vertex[tri[1] as usize],
                    ]);
                }
            }
        }
    }

    mesh
}


/// Extract the `iso` isosurface of one band. Cells on the high boundary
/// wrap around to the low one; vertices shared by neighbouring cells are
/// emitted once.
pub fn extract(grid: &EnergyGrid, band: usize, iso: f64) -> IsosurfaceMesh {
    if band >= grid.nbands() {
        debug!("Band {} is out of range ({} bands), nothing to extract.", band + 1, grid.nbands());
        return IsosurfaceMesh::default();
    }

    let mesh = march(
        grid.cells(),
        iso,
        |idx| grid.value(band, idx),
        |idx| grid.gradient(band, idx),
        |idx| grid.position(idx),
    );
    debug!("Band {}: {} vertices, {} triangles.", band + 1, mesh.vertex_count(), mesh.triangle_count());
    mesh
}


/// Triangulate a single unit cube, `values` ordered as [`tables::CORNER_OFFSETS`].
pub fn polygonise(values: &[f64; 8], iso: f64) -> IsosurfaceMesh {
    let corner = |idx: [isize; 3]| {
        CORNER_OFFSETS.iter()
            .position(|o| (0 .. 3).all(|i| o[i] as isize == idx[i]))
            .unwrap_or(0)
    };
    let value = |idx: [isize; 3]| values[corner(idx)];
    let gradient = |idx: [isize; 3]| {
        [0, 1, 2].map(|i| {
            let (mut lo, mut hi) = (idx, idx);
            lo[i] = 0;
            hi[i] = 1;
            value(hi) - value(lo)
        })
    };
    let position = |idx: [isize; 3]| idx.map(|x| x as f64);

    march([1, 1, 1], iso, &value, gradient, position)
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn triangle_normal(mesh: &IsosurfaceMesh, t: usize) -> Vec3<f64> {
        let p = |i: u32| {
            let i = i as usize * 3;
            [0, 1, 2].map(|j| mesh.positions[i + j] as f64)
        };
        let (a, b, c) = (p(mesh.indices[3 * t]), p(mesh.indices[3 * t + 1]), p(mesh.indices[3 * t + 2]));
        let u = [0, 1, 2].map(|i| b[i] - a[i]);
        let v = [0, 1, 2].map(|i| c[i] - a[i]);
        [u[1] * v[2] - u[2] * v[1], u[2] * v[0] - u[0] * v[2], u[0] * v[1] - u[1] * v[0]]
    }

    #[test]
    fn test_single_corner() {
        let mut values = [1.0; 8];
        values[0] = -1.0;
        let mesh = polygonise(&values, 0.0);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        for p in mesh.positions.chunks_exact(3) {
            assert_relative_eq!(p.iter().sum::<f32>(), 0.5);
        }

        // faces away from the low corner
        let n = triangle_normal(&mesh, 0);
        assert!(n.iter().all(|&x| x > 0.0));
    }

    #[test]
    fn test_uniform_cubes() {
        assert!(polygonise(&[1.0; 8], 0.0).is_empty());
        assert!(polygonise(&[-1.0; 8], 0.0).is_empty());
        assert_eq!(polygonise(&[0.0; 8], 0.0).vertex_count(), 0);
    }

    #[test]
    fn test_every_configuration() {
        for config in 0 .. 256usize {
            let values: [f64; 8] = std::array::from_fn(|i| if config & (1 << i) != 0 { -1.0 } else { 1.0 });
            let mesh = polygonise(&values, 0.0);
            assert_eq!(mesh.vertex_count(), EDGE_TABLE[config].count_ones() as usize);
            assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
            if config == 0 || config == 255 {
                assert!(mesh.is_empty());
            } else {
                assert!(!mesh.is_empty());
            }
        }
    }

    #[test]
    fn test_equal_corner_values() {
        assert_eq!(edge_parameter(0.0, 1.0, 1.0), 0.5);
        assert_eq!(edge_parameter(0.0, -1.0, 3.0), 0.25);
        assert_eq!(edge_parameter(5.0, -1.0, 3.0), 1.0);
    }

    fn sphere_grid(n: usize, r: f64) -> EnergyGrid {
        let step = 1.0 / n as f64;
        let cube = Array3::from_shape_fn((n, n, n), |(iz, iy, ix)| {
            let k = [ix, iy, iz].map(|i| -0.5 + i as f64 * step);
            k.iter().map(|x| x * x).sum::<f64>() - r * r
        });
        EnergyGrid {
            dims: [n; 3],
            origin: [-0.5; 3],
            step: [step; 3],
            data: vec![cube],
            fermi_energy: 0.0,
            closed: false,
        }
    }

    #[test]
    fn test_sphere() {
        let grid = sphere_grid(16, 0.3);
        let mesh = extract(&grid, 0, 0.0);
        assert!(!mesh.is_empty());

        for (p, n) in mesh.positions.chunks_exact(3).zip(mesh.normals.chunks_exact(3)) {
            let r = p.iter().map(|x| (x * x) as f64).sum::<f64>().sqrt();
            assert!((r - 0.3).abs() < 0.02);
            let len = n.iter().map(|x| (x * x) as f64).sum::<f64>().sqrt();
            assert_relative_eq!(len, 1.0, epsilon = 1e-5);
            // outward, towards higher energy
            let dot = p.iter().zip(n).map(|(a, b)| (a * b) as f64).sum::<f64>();
            assert!(dot > 0.0);
        }

        // closed surface: every edge shared by exactly two triangles
        let mut edges: HashMap<(u32, u32), usize> = HashMap::new();
        for t in mesh.indices.chunks_exact(3) {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                *edges.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        assert!(edges.values().all(|&c| c == 2));

        assert!(extract(&grid, 1, 0.0).is_empty());
    }

    #[test]
    fn test_periodic_wrap() {
        // the low region straddles the zone boundary on x
        let n = 8;
        let cube = Array3::from_shape_fn((n, n, n), |(_, _, ix)| if ix == 0 { -1.0 } else { 1.0 });
        let grid = EnergyGrid {
            dims: [n; 3],
            origin: [-0.5; 3],
            step: [1.0 / n as f64; 3],
            data: vec![cube],
            fermi_energy: 0.0,
            closed: false,
        };
        let mesh = extract(&grid, 0, 0.0);
        let xs = mesh.positions.chunks_exact(3).map(|p| p[0]).collect::<Vec<_>>();
        assert!(xs.iter().any(|&x| (x - 0.46875).abs() < 1e-6));
        assert!(xs.iter().any(|&x| (x + 0.46875).abs() < 1e-6));
        assert_eq!(mesh.triangle_count(), 2 * 2 * n * n);
    }

    #[test]
    fn test_transform() {
        let mut values = [1.0; 8];
        values[0] = -1.0;
        let mesh = polygonise(&values, 0.0);
        let scaled = mesh.transform(&[[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]);
        assert_eq!(scaled.positions, mesh.positions.iter().map(|x| x * 2.0).collect::<Vec<_>>());
        for (a, b) in scaled.normals.iter().zip(mesh.normals.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
        let flat = mesh.transform(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]]);
        assert_eq!(flat.normals, mesh.normals);
    }
}
