use clap::Args;
use colored::Colorize;

use crate::{
    cli::OptProcess,
    commands::common::InputArgs,
    pipeline::FermiSurfaceSummary,
    types::Result,
};


#[derive(Debug, Args)]
/// Print the Fermi energy, band and k-point counts and the bands crossing the
/// Fermi level.
pub struct Info {
    #[command(flatten)]
    input: InputArgs,

    #[arg(long)]
    /// Print the summary as JSON.
    json: bool,
}


fn format_summary(s: &FermiSurfaceSummary) -> String {
    let crossing = if s.crossing_bands.is_empty() {
        "none".bright_yellow().to_string()
    } else {
        s.crossing_bands.iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(" ")
            .bright_green()
            .to_string()
    };

    let mut output = String::with_capacity(256);
    output.push_str("----------------------------------------\n");
    output.push_str(&format!(" {:<24}{:>12.6} eV\n", "Fermi energy", s.fermi_energy));
    output.push_str(&format!(" {:<24}{:>12}\n", "Bands", s.nbands));
    output.push_str(&format!(" {:<24}{:>12}\n", "Irreducible k-points", s.nirreducible));
    output.push_str(&format!(" {:<24}{:>12}\n", "Full mesh k-points", s.nfull));
    output.push_str(&format!(" {:<24}{:>12}\n", "Grid",
                             format!("{}x{}x{}", s.grid_dims[0], s.grid_dims[1], s.grid_dims[2])));
    output.push_str(&format!(" {:<24}{}\n", "Crossing bands", crossing));
    output.push_str("----------------------------------------");
    output
}


impl OptProcess for Info {
    fn process(&self) -> Result<()> {
        let settings = self.input.settings()?;
        let summary = self.input.build(&settings)?.summary();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("{}", format_summary(&summary));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_summary() {
        colored::control::set_override(false);
        let s = FermiSurfaceSummary {
            fermi_energy: 7.5,
            nbands: 4,
            nirreducible: 10,
            nfull: 64,
            crossing_bands: vec![2, 3],
            grid_dims: [24, 24, 24],
        };
        let out = format_summary(&s);
        assert!(out.contains("7.500000 eV"));
        assert!(out.contains("24x24x24"));
        assert!(out.contains("Crossing bands          2 3"));
    }
}
