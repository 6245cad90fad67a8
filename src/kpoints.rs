use log::{
    info,
    warn,
};

use crate::{
    parsers::{
        EnergyBlock,
        KlistRecord,
        klist::mesh_division,
    },
    types::Vec3,
};


/// A symmetry-reduced k-point with its eigenvalues in eV.
#[derive(Debug, Clone, PartialEq)]
pub struct IrreducibleKPoint {
    pub coords:   Vec3<f64>,
    pub weight:   f64,
    pub energies: Vec<f64>,
}


#[derive(Debug, Clone, PartialEq, Default)]
pub struct KPointSet {
    pub points:    Vec<IrreducibleKPoint>,
    pub divisions: Option<usize>,
}


impl KPointSet {
    /// Join the k-point listing with the eigenvalue blocks, record `i` takes
    /// the energies of block `i`. Without a listing, coordinates and weights
    /// come from the block headers.
    pub fn from_listings(klist: Option<&[KlistRecord]>, blocks: &[EnergyBlock]) -> Self {
        let Some(records) = klist else {
            let points = blocks.iter()
                .map(|b| IrreducibleKPoint {
                    coords: b.kpoint,
                    weight: b.weight,
                    energies: b.energies.clone(),
                })
                .collect();
            return Self { points, divisions: None };
        };

        if records.len() != blocks.len() {
            warn!("K-point listing has {} records but {} eigenvalue blocks were read.",
                  records.len(), blocks.len());
        }

        let points = records.iter()
            .enumerate()
            .map(|(i, r)| IrreducibleKPoint {
                coords: r.frac(),
                weight: r.weight,
                energies: blocks.get(i).map(|b| b.energies.clone()).unwrap_or_default(),
            })
            .collect();

        Self { points, divisions: mesh_division(records) }
    }

    /// Band count shared by every point carrying energies.
    pub fn nbands(&self) -> usize {
        self.points.iter()
            .filter(|p| !p.energies.is_empty())
            .map(|p| p.energies.len())
            .min()
            .unwrap_or(0)
    }

    /// Drop points without energies and truncate the others to the common
    /// band count.
    pub fn rectangular(mut self) -> Self {
        let nempty = self.points.iter().filter(|p| p.energies.is_empty()).count();
        if nempty > 0 {
            warn!("{} k-point(s) without eigenvalues are excluded.", nempty);
            self.points.retain(|p| !p.energies.is_empty());
        }

        let nbands = self.nbands();
        let ntruncated = self.points.iter().filter(|p| p.energies.len() > nbands).count();
        if ntruncated > 0 {
            warn!("Band count differs between k-points, {} k-point(s) truncated to {} bands.",
                  ntruncated, nbands);
            self.points.iter_mut().for_each(|p| p.energies.truncate(nbands));
        }

        info!("{} irreducible k-points with {} bands.", self.points.len(), nbands);
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: [i64; 3], weight: f64) -> KlistRecord {
        KlistRecord { label: String::new(), numerators: n, division: 4, weight }
    }

    fn block(kpoint: Vec3<f64>, energies: Vec<f64>) -> EnergyBlock {
        EnergyBlock {
            kpoint,
            label: String::new(),
            nplane_waves: 0,
            nbands: energies.len(),
            weight: 2.0,
            energies,
        }
    }

    #[test]
    fn test_from_listings() {
        let records = vec![record([0, 0, 0], 1.0), record([1, 0, 0], 6.0), record([2, 2, 2], 8.0)];
        let blocks = vec![block([0.0; 3], vec![1.0, 2.0, 3.0]), block([0.25, 0.0, 0.0], vec![1.5, 2.5])];

        let set = KPointSet::from_listings(Some(&records), &blocks);
        assert_eq!(set.len(), 3);
        assert_eq!(set.divisions, Some(4));
        assert_eq!(set.points[1].coords, [0.25, 0.0, 0.0]);
        assert_eq!(set.points[1].weight, 6.0);
        assert!(set.points[2].energies.is_empty());
        assert_eq!(set.nbands(), 2);

        let set = set.rectangular();
        assert_eq!(set.len(), 2);
        assert_eq!(set.points[0].energies, vec![1.0, 2.0]);
    }

    #[test]
    fn test_from_blocks_only() {
        let blocks = vec![block([0.5, 0.0, 0.0], vec![1.0])];
        let set = KPointSet::from_listings(None, &blocks);
        assert_eq!(set.divisions, None);
        assert_eq!(set.points[0].coords, [0.5, 0.0, 0.0]);
        assert_eq!(set.points[0].weight, 2.0);
    }

    #[test]
    fn test_empty_set() {
        let set = KPointSet::default().rectangular();
        assert!(set.is_empty());
        assert_eq!(set.nbands(), 0);
    }
}
