//! Expansion of the irreducible k-points onto the full periodic mesh.
//!
//! Fractional coordinates live in `[-0.5, 0.5)` per axis after wrapping, and
//! two points are the same k-point when every axis agrees up to a lattice
//! translation within the tolerance.

use std::collections::HashMap;

use itertools::iproduct;
use log::{
    debug,
    info,
};

use crate::{
    kpoints::IrreducibleKPoint,
    types::{
        Mat33,
        Vec3,
    },
};


/// A point group operation. Only the rotation acts on k-space.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetryOperation {
    pub rotation:    Mat33<i32>,
    pub translation: Vec3<f64>,
}


impl SymmetryOperation {
    pub fn identity() -> Self {
        Self {
            rotation: [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
            translation: [0.0; 3],
        }
    }

    pub fn is_identity(&self) -> bool {
        self.rotation == Self::identity().rotation
    }

    /// `R·k`
    pub fn apply(&self, k: Vec3<f64>) -> Vec3<f64> {
        let r = &self.rotation;
        [
            r[0][0] as f64 * k[0] + r[0][1] as f64 * k[1] + r[0][2] as f64 * k[2],
            r[1][0] as f64 * k[0] + r[1][1] as f64 * k[1] + r[1][2] as f64 * k[2],
            r[2][0] as f64 * k[0] + r[2][1] as f64 * k[1] + r[2][2] as f64 * k[2],
        ]
    }
}


/// Reduce one component into `[-0.5, 0.5)` with unit shifts. Non-finite
/// values are returned as is.
pub fn wrap_component(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let mut x = x - x.trunc();
    while x >= 0.5 {
        x -= 1.0;
    }
    while x < -0.5 {
        x += 1.0;
    }
    x
}


pub fn wrap(k: Vec3<f64>) -> Vec3<f64> {
    k.map(wrap_component)
}


/// Periodic equivalence: per axis `min(|d|, 1-|d|) < tol`.
pub fn equivalent(a: Vec3<f64>, b: Vec3<f64>, tol: f64) -> bool {
    (0 .. 3).all(|i| {
        let d = (a[i] - b[i]).abs();
        let d = d - d.floor();
        d.min(1.0 - d) < tol
    })
}


/// A k-point of the full mesh, energies copied from its irreducible origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedKPoint {
    pub coords:   Vec3<f64>,
    pub energies: Vec<f64>,
    pub origin:   usize,
}


/// Spatial hash over the wrapped cell, buckets are at least `4*tol` wide so
/// an equivalent point is always in one of the 27 neighbouring buckets.
struct PointBuckets {
    nb:      usize,
    buckets: HashMap<[usize; 3], Vec<usize>>,
}


impl PointBuckets {
    fn new(tol: f64) -> Self {
        let nb = if tol > 0.0 && tol.is_finite() {
            (1.0 / (4.0 * tol)).floor().clamp(1.0, 4096.0) as usize
        } else {
            1
        };
        Self { nb, buckets: HashMap::new() }
    }

    fn key(&self, k: Vec3<f64>) -> [usize; 3] {
        k.map(|x| {
            let i = ((x + 0.5) * self.nb as f64).floor();
            if i.is_finite() {
                (i.max(0.0) as usize).min(self.nb - 1)
            } else {
                0
            }
        })
    }

    fn neighbours(&self, key: [usize; 3]) -> Vec<[usize; 3]> {
        let nb = self.nb;
        let axis = |i: usize| {
            let mut v = vec![(i + nb - 1) % nb, i, (i + 1) % nb];
            v.sort_unstable();
            v.dedup();
            v
        };
        iproduct!(axis(key[0]), axis(key[1]), axis(key[2]))
            .map(|(x, y, z)| [x, y, z])
            .collect()
    }

    fn insert(&mut self, key: [usize; 3], index: usize) {
        self.buckets.entry(key).or_default().push(index);
    }
}


/// Expand the irreducible points with every operation, keeping a rotated point
/// only if no previously kept point is equivalent to it.
///
/// The identity is applied first for every point, so the irreducible points
/// themselves are always part of the result. Points without energies are left
/// out.
pub fn expand(points: &[IrreducibleKPoint], ops: &[SymmetryOperation], tol: f64) -> Vec<ExpandedKPoint> {
    let identity = SymmetryOperation::identity();
    let ops = std::iter::once(&identity)
        .chain(ops.iter().filter(|op| !op.is_identity()))
        .collect::<Vec<_>>();

    let mut buckets = PointBuckets::new(tol);
    let mut ret: Vec<ExpandedKPoint> = Vec::with_capacity(points.len() * ops.len());

    for (ipoint, point) in points.iter().enumerate() {
        if point.energies.is_empty() {
            debug!("Irreducible k-point {} carries no energies, not expanded.", ipoint + 1);
            continue;
        }
        for op in ops.iter() {
            let k = wrap(op.apply(point.coords));
            let key = buckets.key(k);
            let duplicated = buckets.neighbours(key)
                .iter()
                .filter_map(|n| buckets.buckets.get(n))
                .flatten()
                .any(|&i| equivalent(ret[i].coords, k, tol));
            if duplicated {
                continue;
            }
            buckets.insert(key, ret.len());
            ret.push(ExpandedKPoint {
                coords: k,
                energies: point.energies.clone(),
                origin: ipoint,
            });
        }
    }

    info!("Expanded {} irreducible k-points to {} k-points with {} symmetry operations.",
          points.len(), ret.len(), ops.len());
    ret
}
