use std::path::PathBuf;

use clap::Args;
use log::{
    info,
    warn,
};

use crate::{
    cli::OptProcess,
    commands::common::{
        InputArgs,
        parse_bands,
    },
    export::export_surfaces,
    pipeline::CancelFlag,
    settings::ExportFormat,
    types::Result,
};


#[derive(Debug, Args)]
/// Reconstruct the Fermi surface and export one mesh per band.
///
/// The energy of every band is assembled on a periodic grid over the
/// Brillouin zone, shifted by the Fermi energy, and its zero isosurface is
/// triangulated with marching cubes. Only bands crossing the Fermi level are
/// exported unless `--bands` is given.
pub struct Surf {
    #[command(flatten)]
    input: InputArgs,

    #[arg(short = 'g', long)]
    /// Grid points along each axis of the interpolated grid. Ignored with
    /// `--optimized`, where the mesh generator decides.
    grid_size: Option<usize>,

    #[arg(long)]
    /// Resolution of the lookup grid the k-points are binned on. Defaults to
    /// the k-mesh division found in `case.klist`.
    lookup_divisions: Option<usize>,

    #[arg(long)]
    /// Tolerance below which two k-points are considered equivalent.
    tolerance: Option<f64>,

    #[arg(short = 'b', long, num_args = 1..)]
    /// Bands to export, counting from 1. Accepts ranges and negative indices
    /// counting from the last band.
    ///
    /// Example: --bands 3 5..7 -1
    bands: Option<Vec<String>>,

    #[arg(short = 'f', long, value_enum)]
    /// Output format, one OBJ per band or a single JSON document.
    format: Option<ExportFormat>,

    #[arg(long)]
    /// Write Cartesian coordinates (units of 2π/bohr) instead of fractional
    /// ones.
    cartesian: bool,

    #[arg(short = 'o', long, default_value = "fermisurf")]
    /// Output path prefix.
    prefix: PathBuf,
}


impl OptProcess for Surf {
    fn process(&self) -> Result<()> {
        let mut settings = self.input.settings()?;
        if let Some(n) = self.grid_size {
            settings.grid.size = n;
        }
        if let Some(n) = self.lookup_divisions {
            settings.grid.lookup_divisions = Some(n);
        }
        if let Some(t) = self.tolerance {
            settings.symmetry.tolerance = t;
        }
        if let Some(f) = self.format {
            settings.export.format = f;
        }
        settings.export.cartesian |= self.cartesian;

        let surface = self.input.build(&settings)?;
        let summary = surface.summary();

        let bands = match self.bands.as_ref() {
            Some(sel) => Some(parse_bands(sel, surface.nbands())?),
            None => None,
        };
        if bands.as_ref().is_some_and(|b| b.is_empty()) {
            warn!("No valid band selected, nothing to export.");
            return Ok(());
        }
        if bands.is_none() && surface.crossing.is_empty() {
            warn!("No band crosses the Fermi level, nothing to export.");
            return Ok(());
        }

        let surfaces = surface.extract(bands.as_deref(), &CancelFlag::new())?;
        let basis = settings.export.cartesian.then_some(&surface.reciprocal_basis);
        let written = export_surfaces(&surfaces, &summary, basis, settings.export.format, &self.prefix)?;
        info!("{} file(s) written.", written.len());

        Ok(())
    }
}
