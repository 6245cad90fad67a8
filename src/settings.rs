//! User settings, layered as built-in defaults, then `~/.fermisurf.toml`,
//! then `FERMISURF_` environment variables (`__` separates sections, e.g.
//! `FERMISURF_GRID__SIZE=32`).

use std::path::{
    Path,
    PathBuf,
};

use anyhow::Context;
use directories::BaseDirs;
use figment::{
    Figment,
    providers::{
        Env,
        Format,
        Serialized,
        Toml,
    },
};
use log::debug;
use serde::{
    Deserialize,
    Serialize,
};

use crate::types::Result;

const CONFIG_FILE_NAME: &str = ".fermisurf.toml";
const ENV_PREFIX: &str = "FERMISURF_";


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Obj,
    Json,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Output resolution along each axis of the interpolated grid.
    pub size: usize,
    /// Resolution of the lookup grid the k-points are binned on, defaults to
    /// the k-mesh division of the k-point listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_divisions: Option<usize>,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self { size: 24, lookup_divisions: None }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymmetrySettings {
    /// Two k-points closer than this on every axis are the same point.
    pub tolerance: f64,
}

impl Default for SymmetrySettings {
    fn default() -> Self {
        Self { tolerance: 1e-6 }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExportSettings {
    pub format: ExportFormat,
    /// Write Cartesian coordinates instead of fractional ones.
    pub cartesian: bool,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub grid:     GridSettings,
    pub symmetry: SymmetrySettings,
    pub export:   ExportSettings,
}


impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        BaseDirs::new().map(|d| d.home_dir().join(CONFIG_FILE_NAME))
    }

    /// Defaults merged with the user configuration file and the environment.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = Self::config_path() {
            debug!("Reading settings from {:?}", path);
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Invalid fermisurf settings")
    }

    /// Defaults merged with one explicit TOML file only.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .extract()
            .with_context(|| format!("Invalid settings in {:?}", path))
    }

    pub fn template() -> Result<String> {
        toml::to_string_pretty(&Settings::default())
            .context("Cannot render the settings template")
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempdir::TempDir;

    #[test]
    fn test_template_round_trip() {
        let template = Settings::template().unwrap();
        assert!(template.contains("[grid]"));
        assert!(template.contains("size = 24"));
        assert!(template.contains("format = \"obj\""));
        let parsed: Settings = toml::from_str(&template).unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new("fermisurf").unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[grid]\nsize = 32\nlookup_divisions = 8\n\n[export]\nformat = \"json\"\n").unwrap();

        let s = Settings::from_file(&path).unwrap();
        assert_eq!(s.grid.size, 32);
        assert_eq!(s.grid.lookup_divisions, Some(8));
        assert_eq!(s.export.format, ExportFormat::Json);
        assert!(!s.export.cartesian);
        assert_eq!(s.symmetry.tolerance, 1e-6);
    }

    #[test]
    fn test_invalid_file() {
        let dir = TempDir::new("fermisurf").unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[grid]\nsize = \"large\"\n").unwrap();
        assert!(Settings::from_file(&path).is_err());
    }
}
