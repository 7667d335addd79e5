//! YAML run configuration.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigurationError, Result},
    gmc::GmcConfig,
    pedigree::Pedigree,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding the per-application pedigree files.
    pub ped_dir: Option<PathBuf>,
    /// Application name to pedigree file name, relative to `ped_dir`.
    pub app_to_ped: BTreeMap<String, String>,
    pub gmc: GmcConfig,
}

impl RunConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&text).map_err(|source| ConfigurationError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(config = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Pedigree file configured for `app`, if the application is mapped.
    pub fn pedigree_path(&self, app: &str) -> Result<PathBuf> {
        let file = self
            .app_to_ped
            .get(app)
            .ok_or_else(|| ConfigurationError::UnknownApplication {
                app: app.to_string(),
            })?;
        Ok(match &self.ped_dir {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        })
    }
}

/// Where the pedigree for a barcode run comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PedigreeSource {
    Path(PathBuf),
    Application(String),
    None,
}

impl PedigreeSource {
    pub fn from_args(path: Option<PathBuf>, app: Option<String>) -> Self {
        match (path, app) {
            (Some(path), _) => Self::Path(path),
            (None, Some(app)) => Self::Application(app),
            (None, None) => Self::None,
        }
    }

    /// Load the pedigree. An explicit path must exist; an application's
    /// pedigree may be missing, in which case every sample is unrelated.
    pub fn load(&self, config: &RunConfig) -> Result<(Pedigree, Option<PathBuf>)> {
        match self {
            Self::Path(path) => Ok((Pedigree::load(path)?, Some(path.clone()))),
            Self::Application(app) => {
                let path = config.pedigree_path(app)?;
                if !path.exists() {
                    tracing::warn!(
                        app = app.as_str(),
                        pedigree = %path.display(),
                        "pedigree file not found; no sample will have a family"
                    );
                    return Ok((Pedigree::empty(), None));
                }
                Ok((Pedigree::load(&path)?, Some(path)))
            }
            Self::None => Ok((Pedigree::empty(), None)),
        }
    }
}
