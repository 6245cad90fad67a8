use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use log::info;

use crate::{
    pipeline::{
        CancelFlag,
        CaseFiles,
        FermiSurface,
    },
    settings::Settings,
    types::{
        Result,
        index_transform,
        range_parse,
    },
};


#[derive(Debug, Args)]
pub struct InputArgs {
    #[arg(short = 'd', long, default_value = ".")]
    /// Calculation directory holding the case files.
    pub dir: PathBuf,

    #[arg(short = 'c', long)]
    /// Case name, the file stem of every input file. Defaults to the name of
    /// the calculation directory.
    pub case: Option<String>,

    #[arg(long)]
    /// Read `case.output1` and `case.outputkgen` and fill the grid from the
    /// mesh generator's relation table instead of expanding `case.energy`
    /// with the point group.
    pub optimized: bool,

    #[arg(long)]
    /// Settings file to use instead of `~/.fermisurf.toml` and the
    /// environment.
    pub config: Option<PathBuf>,
}


impl InputArgs {
    pub fn settings(&self) -> Result<Settings> {
        match self.config.as_ref() {
            Some(path) => Settings::from_file(path),
            None => Settings::load(),
        }
    }

    pub fn build(&self, settings: &Settings) -> Result<FermiSurface> {
        let files = CaseFiles::from_dir(&self.dir, self.case.as_deref(), self.optimized)?;
        info!("Building the energy grid ...");
        files.build(settings, &CancelFlag::new())
            .with_context(|| format!("Cannot reconstruct the Fermi surface from {:?}", self.dir))
    }
}


/// Parse band selections such as `3 5..7 -1`, counting from 1 (negative
/// indices count from the last band), into sorted 0-based indices.
pub fn parse_bands(input: &[String], nbands: usize) -> Result<Vec<usize>> {
    let mut ret = vec![];
    for s in input.iter() {
        ret.extend(range_parse(s).with_context(|| format!("Invalid band selection {:?}", s))?);
    }
    Ok(index_transform(ret, nbands))
}
