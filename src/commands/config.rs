use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use log::info;

use crate::{
    cli::OptProcess,
    settings::Settings,
    types::Result,
};


#[derive(Debug, Args)]
/// Show the effective settings, or print a template for `~/.fermisurf.toml`.
///
/// Settings are read from `~/.fermisurf.toml` and overridden by `FERMISURF_`
/// prefixed environment variables, e.g. `FERMISURF_GRID__SIZE=32`.
pub struct Config {
    #[arg(long)]
    /// Print the default settings as TOML.
    template: bool,

    #[arg(short = 'o', long, requires = "template")]
    /// Write the template to this file instead of stdout.
    output: Option<PathBuf>,
}


impl OptProcess for Config {
    fn process(&self) -> Result<()> {
        if self.template {
            let template = Settings::template()?;
            match self.output.as_ref() {
                Some(path) => {
                    std::fs::write(path, template)
                        .with_context(|| format!("Cannot write {:?}", path))?;
                    info!("Template written to {:?}", path);
                },
                None => print!("{}", template),
            }
            return Ok(());
        }

        if let Some(path) = Settings::config_path() {
            info!("Settings file: {:?} (exists: {})", path, path.exists());
        }
        let settings = Settings::load()?;
        print!("{}", toml::to_string_pretty(&settings).context("Cannot render the settings")?);
        Ok(())
    }
}
