// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The per-backend interface behind the repository facade

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::str::FromStr;

use crate::annotate::AnnotateLine;
use crate::diff::DiffRequest;
use crate::directory::{DirectoryListing, SortBy, SortOrder};
use crate::error::{VcError, VcResult};
use crate::history::FileHistory;
use crate::patchset::PatchsetLog;
use crate::revision::{Revision, RevisionNumber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Rcs,
    Cvs,
    Svn,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Rcs => "rcs",
            BackendKind::Cvs => "cvs",
            BackendKind::Svn => "svn",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rcs" => Ok(BackendKind::Rcs),
            "cvs" => Ok(BackendKind::Cvs),
            "svn" | "subversion" => Ok(BackendKind::Svn),
            _ => Err(format!("Unknown backend: {}. Use rcs, cvs or svn", s)),
        }
    }
}

/// Options for [`VcBackend::list_directory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowseOptions {
    /// Only read the head revision's log for each file
    pub quicklog: bool,
    /// CVS: also browse `Attic/`
    pub show_attic: bool,
    pub sort: SortBy,
    pub order: SortOrder,
}

impl Default for BrowseOptions {
    fn default() -> Self {
        Self {
            quicklog: true,
            show_attic: false,
            sort: SortBy::None,
            order: SortOrder::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryOptions {
    /// Only read the newest log entry
    pub quicklog: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInRequest {
    pub message: String,
    pub user: String,
    /// Create new archives with binary keyword expansion (`-kb`)
    pub binary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInOutcome {
    pub revision: RevisionNumber,
    /// True when this check-in created the archive
    pub initial: bool,
}

/// A lock held on an RCS archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub user: String,
    pub revision: RevisionNumber,
}

/// Operations every version-control backend provides. Paths are relative
/// to the backend's sourceroot.
pub trait VcBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn sourceroot(&self) -> &str;

    /// Cheap existence check; may answer true when no check is available.
    fn is_file(&self, path: &str) -> bool;

    fn list_directory(&self, path: &str, options: &BrowseOptions) -> VcResult<DirectoryListing>;

    fn file_history(&self, path: &str, options: &HistoryOptions) -> VcResult<FileHistory>;

    /// Raw diff output lines; empty when the revisions do not differ.
    fn diff(&self, file: &FileHistory, request: &DiffRequest) -> VcResult<Vec<String>>;

    /// File content at `revision`. The caller must drain or drop the stream.
    fn checkout(&self, file: &FileHistory, revision: &Revision) -> VcResult<Box<dyn Read + Send>>;

    fn annotate(&self, file: &FileHistory, revision: &Revision) -> VcResult<Vec<AnnotateLine>>;

    fn patchsets(&self, file: &FileHistory) -> VcResult<PatchsetLog>;

    fn check_in(&self, _path: &str, _request: &CheckInRequest) -> VcResult<CheckInOutcome> {
        Err(self.unsupported("check_in"))
    }

    fn lock(&self, _path: &str) -> VcResult<RevisionNumber> {
        Err(self.unsupported("lock"))
    }

    /// Unlocking a file that holds no lock succeeds.
    fn unlock(&self, _path: &str) -> VcResult<()> {
        Err(self.unsupported("unlock"))
    }

    fn locker(&self, _path: &str) -> VcResult<Option<LockInfo>> {
        Err(self.unsupported("is_locked"))
    }

    fn is_locked(&self, path: &str) -> VcResult<bool> {
        Ok(self.locker(path)?.is_some())
    }

    fn unsupported(&self, operation: &'static str) -> VcError {
        VcError::Unsupported {
            backend: self.kind().as_str(),
            operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("CVS".parse::<BackendKind>().unwrap(), BackendKind::Cvs);
        assert_eq!("subversion".parse::<BackendKind>().unwrap(), BackendKind::Svn);
        assert!("git".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Rcs.to_string(), "rcs");
    }

    #[test]
    fn test_browse_defaults_to_quicklog() {
        let options = BrowseOptions::default();
        assert!(options.quicklog);
        assert!(!options.show_attic);
        assert_eq!(options.sort, SortBy::None);
    }
}
