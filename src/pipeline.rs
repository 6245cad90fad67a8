//! From raw listings to per-band Fermi surfaces.
//!
//! Building a [`FermiSurface`] runs parse, expansion, grid assembly, Fermi
//! shift and the crossing filter once; [`FermiSurface::extract`] only runs
//! marching cubes on the kept grid and can be called again for any band set.

use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        atomic::{
            AtomicBool,
            Ordering,
        },
    },
};

use log::{
    info,
    warn,
};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    bands::{
        band_color,
        crossing_bands,
    },
    error::{
        Error,
        Result,
    },
    grid::EnergyGrid,
    isosurface::{
        self,
        IsosurfaceMesh,
    },
    kpoints::KPointSet,
    parsers::{
        Lattice,
        fermi_energy_or_zero,
        parse_energy,
        parse_klist,
        parse_kgen,
        parse_output1,
        parse_structure,
    },
    settings::Settings,
    symmetry::expand,
    types::Mat33,
};


/// Shared cancellation request, checked between stages and before each band.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);


impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}


/// Contents of the k-point listing (optional), per-k eigenvalue listing,
/// SCF log and structure file.
#[derive(Debug, Clone, Copy)]
pub struct GenericInputs<'a> {
    pub klist:     Option<&'a str>,
    pub energy:    &'a str,
    pub scf:       &'a str,
    pub structure: &'a str,
}


/// Contents of the block eigenvalue listing, SCF log and mesh generation
/// listing.
#[derive(Debug, Clone, Copy)]
pub struct OptimizedInputs<'a> {
    pub output1:    &'a str,
    pub scf:        &'a str,
    pub outputkgen: &'a str,
}


/// Mesh of one band, ready for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandSurface {
    pub band:  usize,
    pub color: [f32; 3],
    pub mesh:  IsosurfaceMesh,
}


/// Scalars reported to the user, band indices count from 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FermiSurfaceSummary {
    pub fermi_energy:   f64,
    pub nbands:         usize,
    pub nirreducible:   usize,
    pub nfull:          usize,
    pub crossing_bands: Vec<usize>,
    pub grid_dims:      [usize; 3],
}


#[derive(Debug, Clone)]
pub struct FermiSurface {
    /// Grid with the Fermi energy already subtracted.
    pub grid:             EnergyGrid,
    /// Fermi energy in eV before the shift.
    pub fermi_energy:     f64,
    pub nirreducible:     usize,
    pub nfull:            usize,
    pub crossing:         Vec<usize>,
    pub reciprocal_basis: Mat33<f64>,
    pub lattice:          Option<Lattice>,
}


impl FermiSurface {
    pub fn from_generic(inputs: &GenericInputs, settings: &Settings, cancel: &CancelFlag) -> Result<Self> {
        cancel.check()?;
        let records = inputs.klist.map(parse_klist);
        let blocks = parse_energy(inputs.energy);
        let fermi_energy = fermi_energy_or_zero(inputs.scf);
        let structure = parse_structure(inputs.structure)?;
        info!("Fermi energy: {:.6} eV, {} symmetry operations.", fermi_energy, structure.symmetry.len());

        let kpoints = KPointSet::from_listings(records.as_deref(), &blocks).rectangular();
        let nbands = kpoints.nbands();

        cancel.check()?;
        let expanded = expand(&kpoints.points, &structure.symmetry, settings.symmetry.tolerance);

        cancel.check()?;
        let size = settings.grid.size;
        let lookup = settings.grid.lookup_divisions
            .or(kpoints.divisions)
            .unwrap_or(size);
        let grid = EnergyGrid::interpolate(&expanded, fermi_energy, size, lookup)?;

        cancel.check()?;
        let crossing = crossing_bands(kpoints.points.iter().map(|p| p.energies.as_slice()), nbands, fermi_energy);
        let grid = grid.shift_to_fermi();

        Ok(Self {
            grid,
            fermi_energy,
            nirreducible: kpoints.len(),
            nfull: expanded.len(),
            crossing,
            reciprocal_basis: structure.lattice.reciprocal_basis(),
            lattice: Some(structure.lattice),
        })
    }


    pub fn from_optimized(inputs: &OptimizedInputs, _settings: &Settings, cancel: &CancelFlag) -> Result<Self> {
        cancel.check()?;
        let table = parse_output1(inputs.output1);
        let fermi_energy = fermi_energy_or_zero(inputs.scf);
        let mesh = parse_kgen(inputs.outputkgen)?;
        info!("Fermi energy: {:.6} eV, {}x{}x{} mesh.", fermi_energy, mesh.dims[0], mesh.dims[1], mesh.dims[2]);

        cancel.check()?;
        let grid = EnergyGrid::from_relation(&mesh, &table, fermi_energy)?;

        cancel.check()?;
        let crossing = crossing_bands(table.energies.iter().map(Vec::as_slice), table.nbands(), fermi_energy);
        let grid = grid.shift_to_fermi();

        Ok(Self {
            grid,
            fermi_energy,
            nirreducible: table.nkpoints(),
            nfull: mesh.npoints(),
            crossing,
            reciprocal_basis: mesh.reciprocal_basis,
            lattice: None,
        })
    }


    pub fn nbands(&self) -> usize {
        self.grid.nbands()
    }


    pub fn summary(&self) -> FermiSurfaceSummary {
        FermiSurfaceSummary {
            fermi_energy: self.fermi_energy,
            nbands: self.nbands(),
            nirreducible: self.nirreducible,
            nfull: self.nfull,
            crossing_bands: self.crossing.iter().map(|b| b + 1).collect(),
            grid_dims: self.grid.dims,
        }
    }


    /// Surfaces of the requested 0-based bands (the crossing bands when
    /// `None`), in ascending band order. Bands out of range are dropped.
    pub fn extract(&self, bands: Option<&[usize]>, cancel: &CancelFlag) -> Result<Vec<BandSurface>> {
        let mut bands = bands.map_or_else(|| self.crossing.clone(), <[usize]>::to_vec);
        bands.sort_unstable();
        bands.dedup();

        let nbands = self.nbands();
        let nout = bands.iter().filter(|&&b| b >= nbands).count();
        if nout > 0 {
            warn!("{} requested band(s) beyond the {} available are ignored.", nout, nbands);
            bands.retain(|&b| b < nbands);
        }
        for &b in bands.iter() {
            if !self.crossing.contains(&b) {
                info!("Band {} does not cross the Fermi level, its surface may be empty.", b + 1);
            }
        }

        let ret = bands.into_par_iter()
            .map(|band| {
                cancel.check()?;
                Ok(BandSurface {
                    band,
                    color: band_color(band),
                    mesh: isosurface::extract(&self.grid, band, 0.0),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for s in ret.iter() {
            info!("Band {}: {} vertices, {} triangles.", s.band + 1, s.mesh.vertex_count(), s.mesh.triangle_count());
        }
        Ok(ret)
    }
}


/// Input files of one calculation, read into memory.
#[derive(Debug, Clone)]
pub enum CaseFiles {
    Generic {
        klist:     Option<String>,
        energy:    String,
        scf:       String,
        structure: String,
    },
    Optimized {
        output1:    String,
        scf:        String,
        outputkgen: String,
    },
}


fn read_file(path: PathBuf) -> Result<String> {
    fs::read_to_string(&path).map_err(|source| Error::Unreadable { path, source })
}


fn read_optional(path: PathBuf) -> Option<String> {
    match fs::read_to_string(&path) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("Cannot read {:?}: {}", path, e);
            None
        },
    }
}


impl CaseFiles {
    /// Case name of a calculation directory, its own name by convention.
    pub fn case_name(dir: &Path) -> Result<String> {
        let dir = dir.canonicalize()
            .map_err(|source| Error::Unreadable { path: dir.to_path_buf(), source })?;
        dir.file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| Error::missing("calculation directory", "case name"))
    }

    /// Read `<case>.energy`, `.struct`, `.scf` and `.klist` (generic) or
    /// `<case>.output1`, `.outputkgen` and `.scf` (optimized) from `dir`.
    /// Missing `.klist` and `.scf` only produce warnings.
    pub fn from_dir(dir: &Path, case: Option<&str>, optimized: bool) -> Result<Self> {
        let case = match case {
            Some(c) => c.to_string(),
            None => Self::case_name(dir)?,
        };
        let path = |ext: &str| dir.join(format!("{}.{}", case, ext));
        info!("Reading case {:?} from {:?}", case, dir);

        let scf = read_optional(path("scf")).unwrap_or_default();
        let ret = if optimized {
            Self::Optimized {
                output1: read_file(path("output1"))?,
                scf,
                outputkgen: read_file(path("outputkgen"))?,
            }
        } else {
            Self::Generic {
                klist: read_optional(path("klist")),
                energy: read_file(path("energy"))?,
                scf,
                structure: read_file(path("struct"))?,
            }
        };
        Ok(ret)
    }

    pub fn build(&self, settings: &Settings, cancel: &CancelFlag) -> Result<FermiSurface> {
        match self {
            Self::Generic { klist, energy, scf, structure } => {
                let inputs = GenericInputs {
                    klist: klist.as_deref(),
                    energy,
                    scf,
                    structure,
                };
                FermiSurface::from_generic(&inputs, settings, cancel)
            },
            Self::Optimized { output1, scf, outputkgen } => {
                let inputs = OptimizedInputs { output1, scf, outputkgen };
                FermiSurface::from_optimized(&inputs, settings, cancel)
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT1: &str = "\
     K=  0.00000  0.00000  0.00000  1
       EIGENVALUES ARE:
      -0.1000000   0.5000000
        EIGENVALUES BELOW THE ENERGY   2.00000
     K=  0.50000  0.00000  0.00000  2
       EIGENVALUES ARE:
       0.1000000   0.6000000
        EIGENVALUES BELOW THE ENERGY   2.00000
";

    const OUTPUTKGEN: &str = "\
 DIVISION OF RECIPROCAL LATTICE VECTORS (INTERVALS)=   2   2   2
     POINT    COORDINATES     RELATION
      1      0   0   0        1
      2      0   0   1        2
      3      0   0   2        1
      4      0   1   0        2
      5      0   1   1        2
      6      0   1   2        2
      7      0   2   0        1
      8      0   2   1        2
      9      0   2   2        1
     10      1   0   0        2
     11      1   0   1        2
     12      1   0   2        2
     13      1   1   0        2
     14      1   1   1        2
     15      1   1   2        2
     16      1   2   0        2
     17      1   2   1        2
     18      1   2   2        2
     19      2   0   0        1
     20      2   0   1        2
     21      2   0   2        1
     22      2   1   0        2
     23      2   1   1        2
     24      2   1   2        2
     25      2   2   0        1
     26      2   2   1        2
     27      2   2   2        1
";

    fn optimized() -> OptimizedInputs<'static> {
        OptimizedInputs {
            output1: OUTPUT1,
            scf: ":FER  : F E R M I - ENERGY(TETRAH.M.)=   0.0000000000\n",
            outputkgen: OUTPUTKGEN,
        }
    }

    #[test]
    fn test_from_optimized() {
        let fs = FermiSurface::from_optimized(&optimized(), &Settings::default(), &CancelFlag::new()).unwrap();
        assert_eq!(fs.nbands(), 2);
        assert_eq!(fs.crossing, vec![0]);
        assert_eq!(fs.grid.dims, [3, 3, 3]);
        assert!(fs.grid.closed);
        assert_eq!(fs.lattice, None);

        let summary = fs.summary();
        assert_eq!(summary.nirreducible, 2);
        assert_eq!(summary.nfull, 27);
        assert_eq!(summary.crossing_bands, vec![1]);

        let surfaces = fs.extract(None, &CancelFlag::new()).unwrap();
        assert_eq!(surfaces.len(), 1);
        assert_eq!(surfaces[0].band, 0);
        assert!(!surfaces[0].mesh.is_empty());

        let surfaces = fs.extract(Some(&[1, 7, 1][..]), &CancelFlag::new()).unwrap();
        assert_eq!(surfaces.len(), 1);
        assert!(surfaces[0].mesh.is_empty());
    }

    #[test]
    fn test_cancelled() {
        let cancel = CancelFlag::new();
        let fs = FermiSurface::from_optimized(&optimized(), &Settings::default(), &cancel).unwrap();

        cancel.cancel();
        assert!(matches!(fs.extract(None, &cancel), Err(Error::Cancelled)));
        assert!(matches!(FermiSurface::from_optimized(&optimized(), &Settings::default(), &cancel),
                         Err(Error::Cancelled)));
    }

    #[test]
    fn test_missing_files() {
        let dir = tempdir::TempDir::new("fermisurf").unwrap();
        match CaseFiles::from_dir(dir.path(), Some("case"), true) {
            Err(Error::Unreadable { path, .. }) => assert!(path.ends_with("case.output1")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
