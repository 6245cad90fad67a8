use std::{
    fs,
    io::{
        BufWriter,
        Write,
    },
    path::{
        Path,
        PathBuf,
    },
};

use anyhow::Context;
use log::{
    info,
    warn,
};
use serde::Serialize;

use crate::{
    isosurface::IsosurfaceMesh,
    pipeline::{
        BandSurface,
        FermiSurfaceSummary,
    },
    settings::ExportFormat,
    types::{
        Mat33,
        Result,
    },
};


fn create_file(path: &Path) -> Result<fs::File> {
    if path.exists() {
        warn!("{:?} exists, overwriting it.", path);
    }
    fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .with_context(|| format!("Cannot create {:?}", path))
}


/// Write a mesh as Wavefront OBJ, faces carry vertex normals.
pub fn write_obj_to<W: Write>(w: &mut W, mesh: &IsosurfaceMesh, comment: &str) -> Result<()> {
    writeln!(w, "# {}", comment.trim())?;
    writeln!(w, "# {} vertices, {} triangles", mesh.vertex_count(), mesh.triangle_count())?;

    for p in mesh.positions.chunks_exact(3) {
        writeln!(w, "v {:.8} {:.8} {:.8}", p[0], p[1], p[2])?;
    }
    for n in mesh.normals.chunks_exact(3) {
        writeln!(w, "vn {:.6} {:.6} {:.6}", n[0], n[1], n[2])?;
    }
    for t in mesh.indices.chunks_exact(3) {
        let (a, b, c) = (t[0] + 1, t[1] + 1, t[2] + 1);
        writeln!(w, "f {a}//{a} {b}//{b} {c}//{c}")?;
    }
    Ok(())
}


pub fn write_obj(path: &Path, mesh: &IsosurfaceMesh, comment: &str) -> Result<()> {
    let mut w = BufWriter::new(create_file(path)?);
    write_obj_to(&mut w, mesh, comment)
        .with_context(|| format!("Cannot write {:?}", path))?;
    w.flush()
        .with_context(|| format!("Cannot write {:?}", path))
}


#[derive(Serialize)]
struct JsonBand<'a> {
    band:  usize,
    color: [f32; 3],
    mesh:  &'a IsosurfaceMesh,
}


#[derive(Serialize)]
struct JsonDocument<'a> {
    summary: &'a FermiSurfaceSummary,
    bands:   Vec<JsonBand<'a>>,
}


/// One JSON document with the summary and every band, band indices count
/// from 1.
pub fn write_json(path: &Path, summary: &FermiSurfaceSummary, surfaces: &[BandSurface]) -> Result<()> {
    let doc = JsonDocument {
        summary,
        bands: surfaces.iter()
            .map(|s| JsonBand { band: s.band + 1, color: s.color, mesh: &s.mesh })
            .collect(),
    };
    let mut w = BufWriter::new(create_file(path)?);
    serde_json::to_writer(&mut w, &doc)
        .with_context(|| format!("Cannot write {:?}", path))?;
    w.flush()
        .with_context(|| format!("Cannot write {:?}", path))
}


/// Write the surfaces with `prefix` as path stem, returning the written files.
///
/// OBJ output is one `<prefix>_band<N>.obj` per non-empty surface; JSON output
/// is a single `<prefix>.json`. With `basis`, coordinates are made Cartesian.
pub fn export_surfaces(surfaces: &[BandSurface],
                       summary: &FermiSurfaceSummary,
                       basis: Option<&Mat33<f64>>,
                       format: ExportFormat,
                       prefix: &Path) -> Result<Vec<PathBuf>> {
    let surfaces = match basis {
        Some(b) => surfaces.iter()
            .map(|s| BandSurface { mesh: s.mesh.transform(b), ..s.clone() })
            .collect::<Vec<_>>(),
        None => surfaces.to_vec(),
    };

    let stem = prefix.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .context("Export prefix must name a file")?;

    match format {
        ExportFormat::Obj => {
            let mut written = vec![];
            for s in surfaces.iter() {
                let band = s.band + 1;
                if s.mesh.is_empty() {
                    info!("Band {} has an empty surface, nothing written.", band);
                    continue;
                }
                let path = prefix.with_file_name(format!("{}_band{}.obj", stem, band));
                let comment = format!("Fermi surface of band {}, E_F = {:.6} eV", band, summary.fermi_energy);
                write_obj(&path, &s.mesh, &comment)?;
                info!("Written {:?}", path);
                written.push(path);
            }
            Ok(written)
        },
        ExportFormat::Json => {
            let path = prefix.with_file_name(format!("{}.json", stem));
            write_json(&path, summary, &surfaces)?;
            info!("Written {:?}", path);
            Ok(vec![path])
        },
    }
}
