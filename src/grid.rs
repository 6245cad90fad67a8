//! Dense per-band energy grids over the Brillouin zone.
//!
//! A grid stores one `Cube` per band, shaped `(nz, ny, nx)` so that the flat
//! standard layout is `ix + iy*nx + iz*nx*ny`. Index arithmetic is periodic on
//! every axis.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::{
    debug,
    info,
    warn,
};
use ndarray::Array3;
use rayon::prelude::*;

use crate::{
    error::{
        Error,
        Result,
    },
    parsers::{
        EigenvalueTable,
        MeshListing,
    },
    symmetry::ExpandedKPoint,
    types::{
        Cube,
        Vec3,
    },
};


/// Corner offsets of the trilinear stencil, corner `c` is `(c&1, c>>1&1, c>>2&1)`.
pub const STENCIL_OFFSETS: [[usize; 3]; 8] = [
    [0, 0, 0], [1, 0, 0], [0, 1, 0], [1, 1, 0],
    [0, 0, 1], [1, 0, 1], [0, 1, 1], [1, 1, 1],
];


/// Trilinear weights of the 8 stencil corners for the in-cell offset `f`.
pub fn trilinear_weights(f: Vec3<f64>) -> [f64; 8] {
    let mut w = [0.0; 8];
    for (c, o) in STENCIL_OFFSETS.iter().enumerate() {
        w[c] = (0 .. 3)
            .map(|i| if o[i] == 1 { f[i] } else { 1.0 - f[i] })
            .product();
    }
    w
}


fn wrap_index(i: isize, n: usize) -> usize {
    i.rem_euclid(n as isize) as usize
}


fn periodic_distance2(a: Vec3<f64>, b: Vec3<f64>) -> f64 {
    (0 .. 3).map(|i| {
        let d = (a[i] - b[i]).abs();
        let d = d - d.floor();
        let d = d.min(1.0 - d);
        d * d
    })
    .sum()
}


#[derive(Debug, Clone, PartialEq)]
pub struct EnergyGrid {
    /// `[nx, ny, nz]`
    pub dims:         [usize; 3],
    /// Fractional coordinates of cell `(0, 0, 0)`.
    pub origin:       Vec3<f64>,
    /// Fractional size of one cell along each axis.
    pub step:         Vec3<f64>,
    pub data:         Vec<Cube<f64>>,
    pub fermi_energy: f64,
    /// The last node on each axis repeats the first one, one zone apart.
    pub closed:       bool,
}


impl EnergyGrid {
    pub fn nbands(&self) -> usize {
        self.data.len()
    }

    pub fn ncells(&self) -> usize {
        self.dims.iter().product()
    }

    /// Number of distinct nodes along each axis, the period of index arithmetic.
    pub fn periods(&self) -> [usize; 3] {
        if self.closed {
            self.dims.map(|n| n.saturating_sub(1).max(1))
        } else {
            self.dims
        }
    }

    /// Number of cells along each axis covering one full zone.
    pub fn cells(&self) -> [usize; 3] {
        if self.closed {
            self.dims.map(|n| n.saturating_sub(1))
        } else {
            self.dims
        }
    }

    pub fn flat_index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        ix + iy * self.dims[0] + iz * self.dims[0] * self.dims[1]
    }

    /// Energies of one band in flat `ix + iy*nx + iz*nx*ny` order.
    pub fn band_slice(&self, band: usize) -> Option<&[f64]> {
        self.data.get(band)?.as_slice()
    }

    /// Value at a possibly out-of-range index, wrapped periodically.
    /// `band` must be in range.
    pub(crate) fn value(&self, band: usize, idx: [isize; 3]) -> f64 {
        let [nx, ny, nz] = self.periods();
        self.data[band][[wrap_index(idx[2], nz), wrap_index(idx[1], ny), wrap_index(idx[0], nx)]]
    }

    /// Fractional reciprocal coordinates of a grid node.
    pub fn position(&self, idx: [isize; 3]) -> Vec3<f64> {
        [0, 1, 2].map(|i| self.origin[i] + idx[i] as f64 * self.step[i])
    }

    /// Trilinear sample of `band` at fractional coordinates `k`, periodic on
    /// every axis.
    pub fn sample(&self, band: usize, k: Vec3<f64>) -> Option<f64> {
        if band >= self.nbands() {
            return None;
        }
        // reduced into one period before the cast, far queries stay in range
        let periods = self.periods();
        let u = [0, 1, 2].map(|i| ((k[i] - self.origin[i]) / self.step[i]).rem_euclid(periods[i] as f64));
        let i0 = u.map(|x| x.floor());
        let f = [0, 1, 2].map(|i| u[i] - i0[i]);
        let i0 = i0.map(|x| x as isize);

        let w = trilinear_weights(f);
        let v = STENCIL_OFFSETS.iter()
            .zip(w.iter())
            .map(|(o, w)| {
                let idx = [0, 1, 2].map(|i| i0[i] + o[i] as isize);
                self.value(band, idx) * w
            })
            .sum();
        Some(v)
    }

    /// Central difference gradient at a node, in energy per fractional unit.
    /// `band` must be in range.
    pub(crate) fn gradient(&self, band: usize, idx: [isize; 3]) -> Vec3<f64> {
        [0, 1, 2].map(|i| {
            let (mut lo, mut hi) = (idx, idx);
            lo[i] -= 1;
            hi[i] += 1;
            (self.value(band, hi) - self.value(band, lo)) / (2.0 * self.step[i])
        })
    }

    /// A copy with the Fermi energy subtracted from every value and the
    /// reference level reset to 0. Applying it twice subtracts twice.
    pub fn shift_to_fermi(&self) -> Self {
        let ef = self.fermi_energy;
        Self {
            dims: self.dims,
            origin: self.origin,
            step: self.step,
            data: self.data.iter().map(|c| c.mapv(|v| v - ef)).collect(),
            fermi_energy: 0.0,
            closed: self.closed,
        }
    }


    /// Build a `size`³ grid spanning `[-0.5, 0.5)` from scattered k-points.
    ///
    /// The points are binned on a `lookup_divisions`³ lookup grid by rounding,
    /// the first point falling into a bin keeps it. Every output cell is the
    /// weight-normalised trilinear mix of the occupied bins around it, or the
    /// value of the nearest point when none of them is occupied.
    pub fn interpolate(points: &[ExpandedKPoint],
                       fermi_energy: f64,
                       size: usize,
                       lookup_divisions: usize) -> Result<Self> {
        if size == 0 || lookup_divisions == 0 {
            return Err(Error::mismatch("grid size", 1, 0));
        }
        if points.is_empty() {
            return Err(Error::mismatch("k-points available for interpolation", 1, 0));
        }

        let nbands = points.iter().map(|p| p.energies.len()).min().unwrap_or(0);
        let m = lookup_divisions;

        let mut lookup: IndexMap<[usize; 3], usize> = IndexMap::with_capacity(points.len());
        for (ip, p) in points.iter().enumerate() {
            let key = p.coords.map(|x| wrap_index(((x + 0.5) * m as f64).round() as isize, m));
            lookup.entry(key).or_insert(ip);
        }
        let ncollisions = points.len() - lookup.len();
        if ncollisions > 0 {
            debug!("{} k-point(s) share a lookup bin with an earlier one and are ignored.", ncollisions);
        }

        let ratio = m as f64 / size as f64;
        let ncells = size * size * size;

        let stencils = (0 .. ncells).into_par_iter()
            .map(|flat| {
                let cell = [flat % size, flat / size % size, flat / (size * size)];
                let u = cell.map(|i| i as f64 * ratio);
                let i0 = u.map(|x| x.floor());
                let f = [0, 1, 2].map(|i| u[i] - i0[i]);

                let w = trilinear_weights(f);
                let mut stencil = STENCIL_OFFSETS.iter()
                    .zip(w.iter())
                    .filter(|(_, w)| **w > 0.0)
                    .filter_map(|(o, &w)| {
                        let key = [0, 1, 2].map(|i| (i0[i] as usize + o[i]) % m);
                        lookup.get(&key).map(|&ip| (ip, w))
                    })
                    .collect::<Vec<_>>();

                let wsum = stencil.iter().map(|(_, w)| w).sum::<f64>();
                if wsum <= 1e-12 {
                    let k = cell.map(|i| -0.5 + i as f64 / size as f64);
                    let nearest = points.iter()
                        .enumerate()
                        .map(|(ip, p)| (ip, periodic_distance2(p.coords, k)))
                        .min_by(|a, b| a.1.total_cmp(&b.1))
                        .map_or(0, |(ip, _)| ip);
                    return (vec![(nearest, 1.0)], true);
                }
                stencil.iter_mut().for_each(|(_, w)| *w /= wsum);
                (stencil, false)
            })
            .collect::<Vec<_>>();

        let nfallback = stencils.iter().filter(|(_, fallback)| *fallback).count();
        if nfallback > 0 {
            warn!("{} of {} grid cells have no sampled neighbour, using the nearest k-point.", nfallback, ncells);
        }

        let data = (0 .. nbands).into_par_iter()
            .map(|band| {
                Array3::from_shape_fn((size, size, size), |(iz, iy, ix)| {
                    stencils[ix + iy * size + iz * size * size].0
                        .iter()
                        .map(|&(ip, w)| points[ip].energies[band] * w)
                        .sum()
                })
            })
            .collect::<Vec<_>>();

        info!("Interpolated {} bands on a {}x{}x{} grid from {} k-points.", nbands, size, size, size, points.len());

        let step = 1.0 / size as f64;
        Ok(Self {
            dims: [size; 3],
            origin: [-0.5; 3],
            step: [step; 3],
            data,
            fermi_energy,
            closed: false,
        })
    }


    /// Fill the grid directly from the mesh generator's relation table: each
    /// listed cell takes the energies of its irreducible representative.
    ///
    /// The representative of point `p` is `relation[relation[p]]`, numbered in
    /// order of first appearance to index the eigenvalue table. The listing
    /// enumerates both boundary planes, so the grid is closed.
    pub fn from_relation(mesh: &MeshListing, table: &EigenvalueTable, fermi_energy: f64) -> Result<Self> {
        let [nx, ny, nz] = mesh.dims;
        let npoints = mesh.npoints();

        let relation = mesh.rows.iter()
            .map(|r| (r.point, r.relation))
            .collect::<HashMap<_, _>>();
        let lookup = |p: usize| relation.get(&p)
            .copied()
            .ok_or_else(|| Error::mismatch(format!("relation index {}", p), npoints, p));

        let mut irreducible: IndexMap<usize, usize> = IndexMap::new();
        let mut assignments = Vec::with_capacity(mesh.rows.len());
        for row in mesh.rows.iter() {
            let repr = lookup(lookup(row.point)?)?;
            let next = irreducible.len();
            let seq = *irreducible.entry(repr).or_insert(next);
            assignments.push((row, seq));
        }

        if irreducible.len() > table.nkpoints() {
            return Err(Error::mismatch("irreducible k-points with eigenvalues", irreducible.len(), table.nkpoints()));
        }

        let nbands = table.nbands();
        let mut data = vec![Array3::<f64>::zeros((nz, ny, nx)); nbands];
        let mut filled = Array3::<bool>::from_elem((nz, ny, nx), false);

        for (row, seq) in assignments {
            for (&c, &n) in [row.x, row.y, row.z].iter().zip(mesh.dims.iter()) {
                if c >= n {
                    return Err(Error::mismatch(format!("grid coordinate of point {}", row.point), n, c));
                }
            }
            let energies = &table.energies[seq];
            for (band, cube) in data.iter_mut().enumerate() {
                cube[[row.z, row.y, row.x]] = energies[band];
            }
            filled[[row.z, row.y, row.x]] = true;
        }

        let ncovered = filled.iter().filter(|&&f| f).count();
        if ncovered < npoints {
            return Err(Error::mismatch("distinct grid cells in relation table", npoints, ncovered));
        }

        info!("Filled {} bands on a {}x{}x{} grid from {} irreducible k-points.",
              nbands, nx, ny, nz, irreducible.len());

        let step = mesh.dims.map(|n| if n > 1 { 1.0 / (n - 1) as f64 } else { 1.0 });
        Ok(Self {
            dims: mesh.dims,
            origin: [0.0; 3],
            step,
            data,
            fermi_energy,
            closed: true,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::parsers::RelationRow;

    fn point(coords: Vec3<f64>, energies: Vec<f64>) -> ExpandedKPoint {
        ExpandedKPoint { coords, energies, origin: 0 }
    }

    fn full_mesh(m: usize) -> Vec<ExpandedKPoint> {
        let mut ret = vec![];
        for iz in 0 .. m {
            for iy in 0 .. m {
                for ix in 0 .. m {
                    let k = [ix, iy, iz].map(|i| -0.5 + i as f64 / m as f64);
                    ret.push(point(k, vec![(ix + 10 * iy + 100 * iz) as f64, -1.0]));
                }
            }
        }
        ret
    }

    #[test]
    fn test_trilinear_weights() {
        let w = trilinear_weights([0.25, 0.5, 0.0]);
        assert_relative_eq!(w.iter().sum::<f64>(), 1.0);
        assert_relative_eq!(w[0], 0.375);
        assert_relative_eq!(w[1], 0.125);
        assert_eq!(w[4], 0.0);
        assert_eq!(trilinear_weights([0.0; 3])[0], 1.0);
    }

    #[test]
    fn test_interpolate_exact_on_mesh() {
        let points = full_mesh(4);
        let grid = EnergyGrid::interpolate(&points, 0.5, 4, 4).unwrap();
        assert_eq!(grid.dims, [4, 4, 4]);
        assert_eq!(grid.nbands(), 2);
        for p in points.iter() {
            assert_relative_eq!(grid.sample(0, p.coords).unwrap(), p.energies[0], epsilon = 1e-9);
        }
        assert_eq!(grid.band_slice(0).unwrap()[1 + 4 * 2 + 16 * 3], 321.0);
        assert_eq!(grid.sample(2, [0.0; 3]), None);
    }

    #[test]
    fn test_sample_periodic_and_far() {
        let grid = EnergyGrid::interpolate(&full_mesh(4), 0.0, 4, 4).unwrap();
        let k = [0.1, -0.3, 0.45];
        let v = grid.sample(0, k).unwrap();
        for shift in [[1.0, 0.0, 0.0], [-2.0, 3.0, 1.0], [7.0, -5.0, -11.0]] {
            let shifted = [0, 1, 2].map(|i| k[i] + shift[i]);
            assert_relative_eq!(grid.sample(0, shifted).unwrap(), v, epsilon = 1e-9);
        }
        assert_relative_eq!(grid.sample(0, [1024.0 - 0.25, 0.0, 0.0]).unwrap(),
                            grid.sample(0, [-0.25, 0.0, 0.0]).unwrap(), epsilon = 1e-9);

        // far queries stay finite and within the range of the data
        for k in [[1e30, 0.0, 0.0], [-1e300, 1e20, 3e15]] {
            let v = grid.sample(0, k).unwrap();
            assert!(v.is_finite() && (0.0 ..= 333.0).contains(&v));
        }
        assert!(grid.sample(0, [f64::NAN, 0.0, 0.0]).is_some());
    }

    #[test]
    fn test_interpolate_refined() {
        let points = full_mesh(2);
        let grid = EnergyGrid::interpolate(&points, 0.0, 4, 2).unwrap();
        // cell 1 along x sits halfway between lookup nodes 0 and 1
        assert_relative_eq!(grid.data[0][[0, 0, 1]], 0.5);
        assert_relative_eq!(grid.data[0][[0, 0, 3]], 0.5);
        assert_relative_eq!(grid.data[1][[2, 1, 3]], -1.0);
    }

    #[test]
    fn test_interpolate_sparse_uses_present_corners() {
        let points = vec![point([-0.5, -0.5, -0.5], vec![2.0]), point([0.0, 0.0, 0.0], vec![4.0])];
        let grid = EnergyGrid::interpolate(&points, 0.0, 4, 4).unwrap();
        assert_eq!(grid.data[0][[0, 0, 0]], 2.0);
        assert_eq!(grid.data[0][[2, 2, 2]], 4.0);
        // no occupied corner, nearest point wins
        assert_eq!(grid.data[0][[0, 0, 1]], 2.0);
        assert_eq!(grid.data[0][[2, 2, 1]], 4.0);
    }

    #[test]
    fn test_interpolate_rejects_empty_input() {
        assert!(matches!(EnergyGrid::interpolate(&[], 0.0, 4, 4), Err(Error::DimensionMismatch { .. })));
        let points = full_mesh(2);
        assert!(EnergyGrid::interpolate(&points, 0.0, 0, 4).is_err());
    }

    #[test]
    fn test_shift_to_fermi() {
        let grid = EnergyGrid::interpolate(&full_mesh(2), 1.5, 2, 2).unwrap();
        let shifted = grid.shift_to_fermi();
        assert_eq!(shifted.fermi_energy, 0.0);
        for b in 0 .. grid.nbands() {
            for (s, v) in shifted.band_slice(b).unwrap().iter().zip(grid.band_slice(b).unwrap()) {
                assert_eq!(*s, v - 1.5);
            }
        }
    }

    #[test]
    fn test_gradient() {
        let grid = EnergyGrid::interpolate(&full_mesh(4), 0.0, 4, 4).unwrap();
        // linear along y inside the cell, step is 1/4
        let g = grid.gradient(0, [1, 1, 1]);
        assert_relative_eq!(g[1], 40.0);
        // wraps around the x boundary: (1 - 3) / (2/4)
        let g = grid.gradient(0, [0, 1, 1]);
        assert_relative_eq!(g[0], -4.0);
    }

    fn cubic_mesh() -> MeshListing {
        // 2x2x2 nodes, 2 irreducible points: the origin and everything else
        let mut rows = vec![];
        let mut point = 1;
        for x in 0 .. 2 {
            for y in 0 .. 2 {
                for z in 0 .. 2 {
                    let relation = match point { 1 => 1, 4 => 3, _ => 2 };
                    rows.push(RelationRow { point, x, y, z, relation });
                    point += 1;
                }
            }
        }
        MeshListing { reciprocal_basis: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]], dims: [2, 2, 2], rows }
    }

    fn table() -> EigenvalueTable {
        EigenvalueTable {
            kpoints: vec![None, None],
            energies: vec![vec![-1.0, 5.0], vec![1.0, 6.0]],
        }
    }

    #[test]
    fn test_from_relation() {
        let grid = EnergyGrid::from_relation(&cubic_mesh(), &table(), 0.25).unwrap();
        assert_eq!(grid.dims, [2, 2, 2]);
        assert_eq!(grid.step, [1.0; 3]);
        assert_eq!(grid.fermi_energy, 0.25);
        assert_eq!(grid.data[0][[0, 0, 0]], -1.0);
        assert_eq!(grid.data[0][[1, 1, 1]], 1.0);
        assert_eq!(grid.data[1][[0, 1, 0]], 6.0);

        // the far boundary plane repeats the near one
        assert!(grid.closed);
        assert_eq!(grid.cells(), [1, 1, 1]);
        assert_eq!(grid.value(0, [1, 0, 0]), -1.0);
    }

    #[test]
    fn test_from_relation_errors() {
        let mut mesh = cubic_mesh();
        mesh.rows[7].x = 2;
        assert!(matches!(EnergyGrid::from_relation(&mesh, &table(), 0.0), Err(Error::DimensionMismatch { .. })));

        let mut mesh = cubic_mesh();
        mesh.rows[7].x = 0;
        mesh.rows[7].y = 0;
        mesh.rows[7].z = 0;
        match EnergyGrid::from_relation(&mesh, &table(), 0.0) {
            Err(Error::DimensionMismatch { expected, found, .. }) => assert_eq!((expected, found), (8, 7)),
            other => panic!("unexpected result: {:?}", other),
        }

        let short = EigenvalueTable { kpoints: vec![None], energies: vec![vec![0.0, 0.0]] };
        assert!(EnergyGrid::from_relation(&cubic_mesh(), &short, 0.0).is_err());
    }
}
