// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! CVS repositories read directly from the archive tree.
//!
//! Histories, diffs and checkouts go through the RCS tools. Files removed
//! from the head live on under `Attic/` and are found there when the live
//! archive is missing.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument};

use vc_core::cache::load_or_build;
use vc_core::{
    AnnotateLine, BackendKind, BrowseOptions, CacheKey, CachePolicy, CheckInOutcome,
    CheckInRequest, DiffRequest, DirectoryListing, FileHistory, HistoryOptions, LockInfo,
    PatchsetLog, ProcessCommand, ProcessRunner, Revision, RevisionNumber, VcBackend, VcCache,
    VcError, VcResult,
};

use crate::config::RepositoryConfig;
use crate::cvs_server;
use crate::cvsps::parse_cvsps;
use crate::rcs::{
    archive_mtime, archive_name, rcs_revision, read_archive_dir, ArchiveLocation, RcsTools,
};
use crate::util::{join_path, normalize_path, split_path, under_root};

const ATTIC: &str = "Attic";

pub struct CvsBackend {
    sourceroot: String,
    tools: RcsTools,
    cache: Option<Arc<dyn VcCache>>,
}

impl CvsBackend {
    pub fn new(
        config: &RepositoryConfig,
        runner: Arc<dyn ProcessRunner>,
        cache: Option<Arc<dyn VcCache>>,
    ) -> Self {
        Self {
            sourceroot: config.sourceroot.trim_end_matches('/').to_string(),
            tools: RcsTools::new(config.paths.clone(), runner),
            cache,
        }
    }

    fn live_archive(&self, module_path: &str) -> PathBuf {
        PathBuf::from(under_root(&self.sourceroot, &archive_name(module_path)))
    }

    fn attic_archive(&self, module_path: &str) -> PathBuf {
        let (dir, name) = split_path(module_path);
        let attic_path = join_path(&join_path(dir, ATTIC), &archive_name(name));
        PathBuf::from(under_root(&self.sourceroot, &attic_path))
    }

    /// The live archive, else its Attic copy.
    fn location(&self, path: &str) -> VcResult<ArchiveLocation> {
        let module_path = normalize_path(path)?;
        let live = self.live_archive(&module_path);
        if live.is_file() {
            return Ok(ArchiveLocation {
                module_path,
                archive: live,
                attic: false,
            });
        }
        let attic = self.attic_archive(&module_path);
        if attic.is_file() {
            debug!(path = %module_path, "Found archive in the Attic");
            return Ok(ArchiveLocation {
                module_path,
                archive: attic,
                attic: true,
            });
        }
        Err(VcError::NotFound(module_path))
    }

    fn histories(
        &self,
        dir: &str,
        names: Vec<String>,
        attic: bool,
        quicklog: bool,
    ) -> VcResult<Vec<FileHistory>> {
        names
            .into_iter()
            .map(|name| {
                let module_path = join_path(dir, &name);
                let archive = if attic {
                    self.attic_archive(&module_path)
                } else {
                    self.live_archive(&module_path)
                };
                let location = ArchiveLocation {
                    module_path,
                    archive,
                    attic,
                };
                self.tools.cached_history(
                    self.cache.as_deref(),
                    &self.sourceroot,
                    &location,
                    quicklog,
                )
            })
            .collect()
    }

    fn cvsps_command(&self, file: &FileHistory) -> ProcessCommand {
        let paths = self.tools.paths();
        let dir = if file.directory().is_empty() {
            "."
        } else {
            file.directory()
        };
        let mut cmd = ProcessCommand::new(&paths.cvsps)
            .args(["-u", "--cvs-direct", "--root"])
            .arg(&self.sourceroot)
            .arg("-f")
            .arg(file.name())
            .arg(dir);
        if let Some(home) = &paths.cvsps_home {
            cmd = cmd.env("HOME", home);
        }
        cmd
    }
}

impl VcBackend for CvsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cvs
    }

    fn sourceroot(&self) -> &str {
        &self.sourceroot
    }

    fn is_file(&self, path: &str) -> bool {
        self.location(path).is_ok()
    }

    #[instrument(skip(self, options), fields(component = "cvs", operation = "list_directory"))]
    fn list_directory(&self, path: &str, options: &BrowseOptions) -> VcResult<DirectoryListing> {
        let dir = normalize_path(path)?;
        let root = PathBuf::from(under_root(&self.sourceroot, &dir));
        let contents = read_archive_dir(&root)?;

        let mut listing = DirectoryListing::new(dir.clone());
        listing.directories = contents
            .directories
            .into_iter()
            .filter(|d| d != ATTIC)
            .collect();
        listing.files = self.histories(&dir, contents.files, false, options.quicklog)?;

        if options.show_attic {
            match read_archive_dir(&root.join(ATTIC)) {
                Ok(attic) => {
                    let files = self.histories(&dir, attic.files, true, options.quicklog)?;
                    debug!(count = files.len(), "Browsed Attic");
                    listing.set_attic(files);
                }
                Err(e) if e.is_not_found() => debug!(path = %dir, "No Attic directory"),
                Err(e) => return Err(e),
            }
        }

        listing.apply_sort(options.sort, options.order);
        Ok(listing)
    }

    #[instrument(skip(self, options), fields(component = "cvs", operation = "file_history"))]
    fn file_history(&self, path: &str, options: &HistoryOptions) -> VcResult<FileHistory> {
        let location = self.location(path)?;
        self.tools.cached_history(
            self.cache.as_deref(),
            &self.sourceroot,
            &location,
            options.quicklog,
        )
    }

    #[instrument(skip_all, fields(component = "cvs", operation = "diff", path = %file.module_path()))]
    fn diff(&self, file: &FileHistory, request: &DiffRequest) -> VcResult<Vec<String>> {
        self.tools.diff(file, request)
    }

    #[instrument(skip_all, fields(component = "cvs", operation = "checkout", path = %file.module_path(), revision = %revision))]
    fn checkout(&self, file: &FileHistory, revision: &Revision) -> VcResult<Box<dyn Read + Send>> {
        self.tools.checkout(file, revision)
    }

    #[instrument(skip_all, fields(component = "cvs", operation = "annotate", path = %file.module_path(), revision = %revision))]
    fn annotate(&self, file: &FileHistory, revision: &Revision) -> VcResult<Vec<AnnotateLine>> {
        let rev = rcs_revision(revision)?;
        cvs_server::annotate(
            self.tools.runner().as_ref(),
            &self.tools.paths().cvs,
            &self.sourceroot,
            &file.module_path(),
            rev,
        )
    }

    #[instrument(skip_all, fields(component = "cvs", operation = "patchsets", path = %file.module_path()))]
    fn patchsets(&self, file: &FileHistory) -> VcResult<PatchsetLog> {
        let module_path = file.module_path();
        let mtime = archive_mtime(Path::new(file.full_path()))?;
        let cache_path = if file.is_attic() {
            join_path(&join_path(file.directory(), ATTIC), file.name())
        } else {
            module_path.clone()
        };
        let key = CacheKey::patchsets(&self.sourceroot, &cache_path);

        load_or_build(
            self.cache.as_deref(),
            &key,
            CachePolicy::UntilModified(mtime),
            || {
                let cmd = self.cvsps_command(file);
                let output = self.tools.runner().run(&cmd)?;
                if !output.success() {
                    return Err(output.failure(&cmd));
                }
                let patchsets = parse_cvsps(&output.stdout_lossy())?;
                debug!(count = patchsets.len(), "Parsed cvsps output");
                Ok(PatchsetLog {
                    path: module_path.clone(),
                    patchsets,
                })
            },
        )
    }

    fn check_in(&self, path: &str, request: &CheckInRequest) -> VcResult<CheckInOutcome> {
        let module_path = normalize_path(path)?;
        let working = PathBuf::from(under_root(&self.sourceroot, &module_path));
        let archive = match self.location(&module_path) {
            Ok(location) => location.archive,
            Err(e) if e.is_not_found() => self.live_archive(&module_path),
            Err(e) => return Err(e),
        };
        self.tools.check_in(&working, &archive, request)
    }

    fn lock(&self, path: &str) -> VcResult<RevisionNumber> {
        self.tools.lock(&self.location(path)?.archive)
    }

    fn unlock(&self, path: &str) -> VcResult<()> {
        self.tools.unlock(&self.location(path)?.archive)
    }

    fn locker(&self, path: &str) -> VcResult<Option<LockInfo>> {
        self.tools.locker(&self.location(path)?.archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use vc_core::test_helpers::ScriptedRunner;
    use vc_core::{MemoryCache, SortBy};

    const RLOG_HEAD: &str = "\
RCS file: x,v
head: 1.1
branch:
locks: strict
access list:
symbolic names:
keyword substitution: kv
total revisions: 1;\tselected revisions: 1
description:
----------------------------
revision 1.1
date: 2024/01/01 10:00:00;  author: alice;  state: Exp;
initial
=============================================================================
";

    fn repo() -> (tempfile::TempDir, CvsBackend, Arc<ScriptedRunner>) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/Attic")).unwrap();
        fs::write(root.join("src/live.c,v"), "").unwrap();
        fs::write(root.join("src/Attic/gone.c,v"), "").unwrap();

        let runner = Arc::new(ScriptedRunner::new());
        runner.respond_stdout("rlog", RLOG_HEAD);
        let config = RepositoryConfig::new(
            "test",
            BackendKind::Cvs,
            root.to_string_lossy().into_owned(),
        );
        let backend = CvsBackend::new(&config, runner.clone(), Some(Arc::new(MemoryCache::new())));
        (dir, backend, runner)
    }

    #[test]
    fn test_attic_fallback() {
        let (_dir, backend, _runner) = repo();
        assert!(backend.is_file("src/live.c"));
        assert!(backend.is_file("src/gone.c"));
        assert!(!backend.is_file("src/never.c"));

        let gone = backend
            .file_history("src/gone.c", &HistoryOptions::default())
            .unwrap();
        assert!(gone.is_attic());
        assert_eq!(gone.directory(), "src");
        assert!(gone.full_path().ends_with("src/Attic/gone.c,v"));

        let err = backend
            .file_history("src/never.c", &HistoryOptions::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_browse_hides_attic_unless_asked() {
        let (_dir, backend, _runner) = repo();
        let listing = backend
            .list_directory("src", &BrowseOptions::default())
            .unwrap();
        assert!(listing.directories.is_empty());
        assert_eq!(listing.files.len(), 1);
        assert!(listing.attic_files.is_none());

        let options = BrowseOptions {
            show_attic: true,
            sort: SortBy::Name,
            ..BrowseOptions::default()
        };
        let listing = backend.list_directory("src", &options).unwrap();
        let attic = listing.attic_files.as_ref().unwrap();
        assert_eq!(attic.len(), 1);
        assert!(attic[0].is_attic());
        let merged: Vec<&str> = listing.file_list(true).iter().map(|f| f.name()).collect();
        assert_eq!(merged, vec!["gone.c", "live.c"]);
    }

    #[test]
    fn test_cvsps_invocation() {
        let (dir, backend, runner) = repo();
        let mut config = RepositoryConfig::new(
            "test",
            BackendKind::Cvs,
            dir.path().to_string_lossy().into_owned(),
        );
        config.paths.cvsps_home = Some(PathBuf::from("/var/lib/cvsps"));
        let backend_with_home = CvsBackend::new(&config, runner.clone(), None);
        runner.respond_stdout(
            "cvsps",
            "---------------------\nPatchSet 3\nDate: 2024/01/01 10:00:00\nAuthor: alice\n\
Branch: HEAD\nTag: (none)\nLog:\ninitial\n\nMembers:\n\tlive.c:INITIAL->1.1\n\n",
        );

        let history = backend
            .file_history("src/live.c", &HistoryOptions::default())
            .unwrap();
        let log = backend_with_home.patchsets(&history).unwrap();
        assert_eq!(log.path, "src/live.c");
        assert_eq!(log.get(3).unwrap().author, "alice");

        let call = &runner.calls_to("cvsps")[0];
        let root = dir.path().to_string_lossy().into_owned();
        assert_eq!(
            call.args_lossy(),
            vec!["-u", "--cvs-direct", "--root", root.as_str(), "-f", "live.c", "src"]
        );
        assert!(call
            .get_env()
            .iter()
            .any(|(k, v)| k == "HOME" && v == "/var/lib/cvsps"));
    }

    #[test]
    fn test_annotate_sends_transcript() {
        let (_dir, backend, runner) = repo();
        runner.respond_stdout(
            "cvs",
            "E Annotations for src/live.c\nE ***************\nM 1.1          (alice    01-Jan-24): hello\nok\n",
        );
        let history = backend
            .file_history("src/live.c", &HistoryOptions::default())
            .unwrap();
        let lines = backend
            .annotate(&history, &Revision::parse_rcs("1.1").unwrap())
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].author, "alice");

        let call = &runner.calls_to("cvs")[0];
        assert_eq!(call.args_lossy(), vec!["-n", "server"]);
        let stdin = String::from_utf8_lossy(call.get_stdin().unwrap()).into_owned();
        assert!(stdin.contains("Argument src/live.c\nDirectory src\n"));
        assert!(stdin.ends_with("annotate\n"));
    }
}
