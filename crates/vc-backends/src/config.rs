// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Repository registry configuration

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vc_core::{BackendKind, VcError, VcResult};

/// Environment variable naming an alternative registry file
pub const CONFIG_ENV_VAR: &str = "VCBROWSE_CONFIG";

/// Locations of the external tools. Each defaults to the bare program
/// name so that `PATH` lookup applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ToolPaths {
    pub rlog: PathBuf,
    pub co: PathBuf,
    pub ci: PathBuf,
    pub rcs: PathBuf,
    pub rcsdiff: PathBuf,
    pub cvs: PathBuf,
    pub cvsps: PathBuf,
    /// `HOME` for cvsps, which keeps its patchset cache there
    pub cvsps_home: Option<PathBuf>,
    pub svn: PathBuf,
    /// Subversion `--config-dir`; the system temp dir when unset
    pub svn_home: Option<PathBuf>,
    pub diff: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            rlog: "rlog".into(),
            co: "co".into(),
            ci: "ci".into(),
            rcs: "rcs".into(),
            rcsdiff: "rcsdiff".into(),
            cvs: "cvs".into(),
            cvsps: "cvsps".into(),
            cvsps_home: None,
            svn: "svn".into(),
            svn_home: None,
            diff: "diff".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Persist entries under this directory; in-memory when unset
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// One configured sourceroot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepositoryConfig {
    pub name: String,
    pub kind: BackendKind,
    /// Local directory for RCS/CVS, repository URL for Subversion
    pub sourceroot: String,
    #[serde(default)]
    pub paths: ToolPaths,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Kill external tools that run longer than this; no limit when unset
    pub process_timeout_secs: Option<u64>,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl RepositoryConfig {
    pub fn new(name: impl Into<String>, kind: BackendKind, sourceroot: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            sourceroot: sourceroot.into(),
            paths: ToolPaths::default(),
            username: None,
            password: None,
            process_timeout_secs: None,
            cache: CacheConfig::default(),
        }
    }

    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> VcResult<()> {
        if self.name.trim().is_empty() {
            return Err(VcError::Config("repository name cannot be empty".to_string()));
        }
        if self.sourceroot.trim().is_empty() {
            return Err(VcError::Config(format!(
                "repository {} has an empty sourceroot",
                self.name
            )));
        }
        if self.kind != BackendKind::Svn && (self.username.is_some() || self.password.is_some()) {
            return Err(VcError::Config(format!(
                "repository {}: credentials are only supported for svn",
                self.name
            )));
        }
        Ok(())
    }
}

/// The whole registry file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoriesFile {
    #[serde(default)]
    pub repository: Vec<RepositoryConfig>,
}

impl RepositoriesFile {
    pub fn parse(text: &str) -> VcResult<Self> {
        let file: RepositoriesFile =
            toml::from_str(text).map_err(|e| VcError::Config(e.to_string()))?;
        file.validate()?;
        Ok(file)
    }

    pub fn load(path: &Path) -> VcResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| VcError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Load from `VCBROWSE_CONFIG` or the standard location.
    pub fn load_default() -> VcResult<Self> {
        Self::load(&default_config_path()?)
    }

    pub fn validate(&self) -> VcResult<()> {
        let mut seen = HashSet::new();
        for repo in &self.repository {
            repo.validate()?;
            if !seen.insert(repo.name.as_str()) {
                return Err(VcError::Config(format!(
                    "duplicate repository name: {}",
                    repo.name
                )));
            }
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&RepositoryConfig> {
        self.repository.iter().find(|r| r.name == name)
    }

    pub fn to_toml(&self) -> VcResult<String> {
        toml::to_string_pretty(self).map_err(|e| VcError::Config(e.to_string()))
    }
}

/// `$VCBROWSE_CONFIG`, else `<config dir>/vcbrowse/repositories.toml`
pub fn default_config_path() -> VcResult<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    let base = dirs::config_dir()
        .ok_or_else(|| VcError::Config("Could not determine config directory".to_string()))?;
    Ok(base.join("vcbrowse").join("repositories.toml"))
}
