// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! RCS, CVS and Subversion backends for vcbrowse.
//!
//! Each backend sits behind its own cargo feature. [`Repository`] opens
//! whichever one a [`RepositoryConfig`] names.

pub mod config;
pub mod rcs;
pub mod repository;
pub mod rlog;
pub mod util;

#[cfg(feature = "cvs")]
pub mod cvs;
#[cfg(feature = "cvs")]
pub mod cvs_server;
#[cfg(feature = "cvs")]
pub mod cvsps;

#[cfg(feature = "svn")]
pub mod svn;
#[cfg(feature = "svn")]
pub mod svn_log;

pub use config::{
    default_config_path, CacheConfig, RepositoriesFile, RepositoryConfig, ToolPaths,
    CONFIG_ENV_VAR,
};
pub use repository::{cache_for, Repository};

#[cfg(feature = "cvs")]
pub use cvs::CvsBackend;
#[cfg(feature = "rcs")]
pub use rcs::RcsBackend;
#[cfg(feature = "svn")]
pub use svn::SvnBackend;
