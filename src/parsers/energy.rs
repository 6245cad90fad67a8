use log::{
    debug,
    warn,
};

use crate::types::RY_TO_EV;
use super::{
    Line,
    Matcher,
    classify,
    parse_fortran_float,
    regex,
};


/// Eigenvalues of one k-point in the per-k energy listing, in eV.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyBlock {
    pub kpoint:       [f64; 3],
    pub label:        String,
    pub nplane_waves: usize,
    pub nbands:       usize,
    pub weight:       f64,
    pub energies:     Vec<f64>,
}


#[derive(Debug, Clone, PartialEq)]
enum EnergyRecord {
    Header(EnergyBlock),
    Band(usize, f64),
}


/// `kx ky kz label nPlaneWaves nBands weight`, coordinates may run together.
fn header(line: &str) -> Option<Line<EnergyRecord>> {
    let caps = regex!(r"^\s*([-+]?\d*\.\d+(?:[EeDd][-+]?\d+)?)\s*([-+]?\d*\.\d+(?:[EeDd][-+]?\d+)?)\s*([-+]?\d*\.\d+(?:[EeDd][-+]?\d+)?)\s*(\S*?)\s+(\d+)\s+(\d+)\s+([-+]?\d*\.?\d+)\s*$")
        .captures(line)?;

    let kx = parse_fortran_float(&caps[1])?;
    let ky = parse_fortran_float(&caps[2])?;
    let kz = parse_fortran_float(&caps[3])?;
    let nplane_waves = caps[5].parse::<usize>().ok()?;
    let nbands = caps[6].parse::<usize>().ok()?;
    let weight = caps[7].parse::<f64>().ok()?;

    Some(Line::Record(EnergyRecord::Header(EnergyBlock {
        kpoint: [kx, ky, kz],
        label: caps[4].to_string(),
        nplane_waves,
        nbands,
        weight,
        energies: Vec::with_capacity(nbands),
    })))
}


/// `bandIndex energy`, energy in Ry. A negative energy may follow the index
/// without a separating space.
fn band(line: &str) -> Option<Line<EnergyRecord>> {
    let caps = regex!(r"^\s*(\d+)\s*([-+]?\d*\.\d+(?:[EeDd][-+]?\d+)?)\s*$")
        .captures(line)?;
    let iband = caps[1].parse::<usize>().ok()?;
    let energy = parse_fortran_float(&caps[2])?;
    Some(Line::Record(EnergyRecord::Band(iband, energy)))
}


/// Parse the per-k eigenvalue listing. Energies are converted from Ry to eV.
///
/// Lines before the first k-point header (linearization energies) and any
/// malformed line are skipped.
pub fn parse_energy(content: &str) -> Vec<EnergyBlock> {
    let matchers: &[Matcher<EnergyRecord>] = &[header, band];
    let mut blocks: Vec<EnergyBlock> = vec![];

    for (iline, line) in content.lines().enumerate() {
        match classify(line, matchers) {
            Line::Record(EnergyRecord::Header(block)) => blocks.push(block),
            Line::Record(EnergyRecord::Band(iband, energy)) => {
                match blocks.last_mut() {
                    Some(block) => {
                        if iband != block.energies.len() + 1 {
                            debug!("Band index {} out of sequence at line {}", iband, iline + 1);
                        }
                        block.energies.push(energy * RY_TO_EV);
                    },
                    None => debug!("Skipping band record before any k-point header at line {}", iline + 1),
                }
            },
            Line::Boundary | Line::Skip => (),
        }
    }

    for (ik, block) in blocks.iter().enumerate() {
        if block.energies.len() != block.nbands {
            warn!("K-point {} declares {} bands but {} eigenvalues were read.",
                  ik + 1, block.nbands, block.energies.len());
        }
    }

    blocks
}
