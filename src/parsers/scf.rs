use log::warn;

use crate::types::RY_TO_EV;
use super::{
    parse_fortran_float,
    regex,
};


/// Fermi energy in eV from the self-consistent-field log.
///
/// The log holds one `:FER` record per iteration, the last one is the
/// converged value.
pub fn parse_fermi_energy(content: &str) -> Option<f64> {
    regex!(r"(?m)^:FER\s*:.*=\s*([-+]?\d*\.\d+(?:[EeDd][-+]?\d+)?)")
        .captures_iter(content)
        .filter_map(|caps| parse_fortran_float(&caps[1]))
        .last()
        .map(|ef| ef * RY_TO_EV)
}


/// Same as [`parse_fermi_energy`], but a missing tag yields 0 eV.
pub fn fermi_energy_or_zero(content: &str) -> f64 {
    parse_fermi_energy(content).unwrap_or_else(|| {
        warn!("No Fermi energy record (:FER) found, falling back to 0 eV. \
Crossing detection will use this reference level.");
        0.0
    })
}
