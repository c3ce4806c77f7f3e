// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! One configured repository, whatever its backend

use std::io::Read;
use std::sync::Arc;

use tracing::info;

use vc_core::{
    AnnotateLine, BackendKind, BrowseOptions, CheckInOutcome, CheckInRequest, DiffRequest,
    DirectoryListing, FileCache, FileHistory, HistoryOptions, LockInfo, MemoryCache, PatchsetLog,
    ProcessRunner, Revision, RevisionNumber, SystemRunner, VcBackend, VcCache, VcError, VcResult,
};

use crate::config::RepositoryConfig;

/// Entry point for browsing a repository. Built from a
/// [`RepositoryConfig`], it picks the backend and wires up the process
/// runner and the cache.
pub struct Repository {
    name: String,
    backend: Box<dyn VcBackend>,
}

impl Repository {
    /// Open with the system process runner and the configured cache.
    pub fn open(config: &RepositoryConfig) -> VcResult<Self> {
        let runner: Arc<dyn ProcessRunner> =
            Arc::new(SystemRunner::with_timeout(config.process_timeout()));
        Self::with_runner(config, runner, cache_for(config))
    }

    pub fn with_runner(
        config: &RepositoryConfig,
        runner: Arc<dyn ProcessRunner>,
        cache: Option<Arc<dyn VcCache>>,
    ) -> VcResult<Self> {
        config.validate()?;
        let backend = build_backend(config, runner, cache)?;
        info!(
            repository = %config.name,
            kind = %config.kind,
            sourceroot = %config.sourceroot,
            "Opened repository"
        );
        Ok(Self {
            name: config.name.clone(),
            backend,
        })
    }

    pub fn from_backend(name: impl Into<String>, backend: Box<dyn VcBackend>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn sourceroot(&self) -> &str {
        self.backend.sourceroot()
    }

    pub fn backend(&self) -> &dyn VcBackend {
        self.backend.as_ref()
    }

    /// Parse a caller-supplied revision in this backend's syntax.
    pub fn parse_revision(&self, text: &str) -> VcResult<Revision> {
        match self.kind() {
            BackendKind::Svn => Revision::parse_svn(text),
            BackendKind::Rcs | BackendKind::Cvs => Revision::parse_rcs(text),
        }
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.backend.is_file(path)
    }

    pub fn list_directory(&self, path: &str, options: &BrowseOptions) -> VcResult<DirectoryListing> {
        self.backend.list_directory(path, options)
    }

    pub fn file_history(&self, path: &str, options: &HistoryOptions) -> VcResult<FileHistory> {
        self.backend.file_history(path, options)
    }

    pub fn diff(&self, file: &FileHistory, request: &DiffRequest) -> VcResult<Vec<String>> {
        self.backend.diff(file, request)
    }

    pub fn checkout(&self, file: &FileHistory, revision: &Revision) -> VcResult<Box<dyn Read + Send>> {
        self.backend.checkout(file, revision)
    }

    pub fn annotate(&self, file: &FileHistory, revision: &Revision) -> VcResult<Vec<AnnotateLine>> {
        self.backend.annotate(file, revision)
    }

    pub fn patchsets(&self, file: &FileHistory) -> VcResult<PatchsetLog> {
        self.backend.patchsets(file)
    }

    pub fn check_in(&self, path: &str, request: &CheckInRequest) -> VcResult<CheckInOutcome> {
        self.backend.check_in(path, request)
    }

    pub fn lock(&self, path: &str) -> VcResult<RevisionNumber> {
        self.backend.lock(path)
    }

    pub fn unlock(&self, path: &str) -> VcResult<()> {
        self.backend.unlock(path)
    }

    pub fn locker(&self, path: &str) -> VcResult<Option<LockInfo>> {
        self.backend.locker(path)
    }

    pub fn is_locked(&self, path: &str) -> VcResult<bool> {
        self.backend.is_locked(path)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("sourceroot", &self.sourceroot())
            .finish()
    }
}

/// The cache a configuration asks for, if any.
pub fn cache_for(config: &RepositoryConfig) -> Option<Arc<dyn VcCache>> {
    if !config.cache.enabled {
        return None;
    }
    let cache: Arc<dyn VcCache> = match &config.cache.dir {
        Some(dir) => Arc::new(FileCache::new(dir.clone())),
        None => Arc::new(MemoryCache::new()),
    };
    Some(cache)
}

fn build_backend(
    config: &RepositoryConfig,
    runner: Arc<dyn ProcessRunner>,
    cache: Option<Arc<dyn VcCache>>,
) -> VcResult<Box<dyn VcBackend>> {
    match config.kind {
        #[cfg(feature = "rcs")]
        BackendKind::Rcs => Ok(Box::new(crate::rcs::RcsBackend::new(config, runner, cache))),
        #[cfg(feature = "cvs")]
        BackendKind::Cvs => Ok(Box::new(crate::cvs::CvsBackend::new(config, runner, cache))),
        #[cfg(feature = "svn")]
        BackendKind::Svn => Ok(Box::new(crate::svn::SvnBackend::new(config, runner, cache))),
        #[allow(unreachable_patterns)]
        kind => {
            let _ = (runner, cache);
            Err(VcError::Config(format!(
                "{} support is not compiled in",
                kind
            )))
        }
    }
}
