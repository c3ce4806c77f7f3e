// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! RCS tool wrappers and the plain RCS backend.
//!
//! [`RcsTools`] drives `rlog`, `rcsdiff`, `co`, `ci` and `rcs` against
//! `,v` archives. CVS repositories are trees of the same archives, so the
//! CVS backend reuses it for everything except annotate and patchsets.

use regex::Regex;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use tracing::{debug, info, instrument, warn};

use vc_core::cache::load_or_build;
use vc_core::{
    CacheKey, CachePolicy, CheckInOutcome, CheckInRequest, DiffRequest, FileHistory,
    FileHistoryBuilder, LockInfo, ProcessCommand, ProcessRunner, Revision, RevisionNumber,
    StderrMode, VcCache, VcError, VcResult,
};

use crate::config::ToolPaths;
use crate::rlog::parse_rlog;
use crate::util::{join_path, static_regex};

static CO_HEADER_RE: OnceLock<Regex> = OnceLock::new();
static CI_REVISION_RE: OnceLock<Regex> = OnceLock::new();
static LOCKED_RE: OnceLock<Regex> = OnceLock::new();
static LOCKER_RE: OnceLock<Regex> = OnceLock::new();

pub const ARCHIVE_SUFFIX: &str = ",v";

/// `foo.c` -> `foo.c,v`
pub fn archive_name(name: &str) -> String {
    format!("{}{}", name, ARCHIVE_SUFFIX)
}

/// Contents of one archive directory: subdirectories and archive file
/// names with the `,v` stripped.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ArchiveDir {
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

pub fn read_archive_dir(dir: &Path) -> VcResult<ArchiveDir> {
    let entries = fs::read_dir(dir).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            VcError::NotFound(dir.display().to_string())
        } else {
            VcError::Io(e)
        }
    })?;

    let mut listing = ArchiveDir::default();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            listing.directories.push(name);
        } else if let Some(stem) = name.strip_suffix(ARCHIVE_SUFFIX) {
            if file_type.is_file() && !stem.is_empty() {
                listing.files.push(stem.to_string());
            }
        }
    }
    // read_dir order is unspecified
    listing.directories.sort();
    listing.files.sort();
    Ok(listing)
}

/// Modification time of an archive, which bounds cached data about it.
pub fn archive_mtime(archive: &Path) -> VcResult<SystemTime> {
    let metadata = fs::metadata(archive).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            VcError::NotFound(archive.display().to_string())
        } else {
            VcError::Io(e)
        }
    })?;
    Ok(metadata.modified()?)
}

/// Where a file's history lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLocation {
    /// Path relative to the sourceroot, without `Attic/`
    pub module_path: String,
    pub archive: PathBuf,
    pub attic: bool,
}

impl ArchiveLocation {
    /// Cache keys must tell a live file from its Attic twin.
    pub fn cache_path(&self) -> String {
        if self.attic {
            let (dir, name) = crate::util::split_path(&self.module_path);
            join_path(&join_path(dir, "Attic"), name)
        } else {
            self.module_path.clone()
        }
    }
}

/// Runs the RCS command-line tools
#[derive(Clone)]
pub struct RcsTools {
    paths: ToolPaths,
    runner: Arc<dyn ProcessRunner>,
}

impl std::fmt::Debug for RcsTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RcsTools").field("paths", &self.paths).finish()
    }
}

impl RcsTools {
    pub fn new(paths: ToolPaths, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { paths, runner }
    }

    pub fn paths(&self) -> &ToolPaths {
        &self.paths
    }

    pub fn runner(&self) -> &Arc<dyn ProcessRunner> {
        &self.runner
    }

    /// Parse the archive's full history, or only its head with `quicklog`.
    pub fn history(&self, location: &ArchiveLocation, quicklog: bool) -> VcResult<FileHistory> {
        let mut cmd = ProcessCommand::new(&self.paths.rlog);
        if quicklog {
            cmd = cmd.arg("-r");
        }
        let cmd = cmd.arg(&location.archive);

        let output = self.runner.run(&cmd)?;
        if !output.success() {
            let err = output.failure(&cmd);
            if output.stderr_lossy().contains("No such file") {
                return Err(VcError::NotFound(location.module_path.clone()));
            }
            return Err(err);
        }

        let (dir, name) = crate::util::split_path(&location.module_path);
        let mut builder = FileHistoryBuilder::new(
            name,
            dir,
            location.archive.to_string_lossy().into_owned(),
        )
        .attic(location.attic);
        parse_rlog(&output.stdout_lossy(), &mut builder)?;
        debug!(path = %location.module_path, "Parsed rlog output");
        Ok(builder.build())
    }

    /// History through the cache; valid until the archive changes.
    pub fn cached_history(
        &self,
        cache: Option<&dyn VcCache>,
        sourceroot: &str,
        location: &ArchiveLocation,
        quicklog: bool,
    ) -> VcResult<FileHistory> {
        let policy = CachePolicy::UntilModified(archive_mtime(&location.archive)?);
        let key = CacheKey::file_history(sourceroot, &location.cache_path(), quicklog);
        load_or_build(cache, &key, policy, || self.history(location, quicklog))
    }

    /// `rcsdiff` output; empty when the revisions are identical.
    pub fn diff(&self, file: &FileHistory, request: &DiffRequest) -> VcResult<Vec<String>> {
        let rev1 = rcs_revision(&request.rev1)?;
        let rev2 = rcs_revision(&request.rev2)?;

        let cmd = ProcessCommand::new(&self.paths.rcsdiff)
            .arg("-kk")
            .args(request.diff_flags())
            .arg(format!("-r{}", rev1))
            .arg(format!("-r{}", rev2))
            .arg(file.full_path())
            .stderr(StderrMode::Merge);

        let output = self.runner.run(&cmd)?;
        match output.status {
            Some(0) => Ok(Vec::new()),
            // rcsdiff exits 1 when it found differences
            Some(1) => Ok(output.lines()),
            // Exit 2 is rcsdiff's trouble status (bad revision, missing
            // archive). Its output is then an error message, not a diff.
            _ => Err(output.failure(&cmd)),
        }
    }

    /// Stream the content of `revision` via `co -p`.
    pub fn checkout(
        &self,
        file: &FileHistory,
        revision: &Revision,
    ) -> VcResult<Box<dyn Read + Send>> {
        let rev = rcs_revision(revision)?;
        let header_re = static_regex(
            &CO_HEADER_RE,
            r"^([\S ]+),v\s+-->\s+st(andar)?d ?out(put)?\s*$",
        )?;

        let cmd = ProcessCommand::new(&self.paths.co)
            .arg(format!("-p{}", rev))
            .arg(file.full_path())
            .stderr(StderrMode::Merge);
        let mut reader = BufReader::new(self.runner.stream(&cmd)?);

        let mut header = String::new();
        reader.read_line(&mut header)?;
        let header = header.trim_end_matches(['\r', '\n']);
        let matches_file = header_re
            .captures(header)
            .is_some_and(|caps| format!("{}{}", &caps[1], ARCHIVE_SUFFIX) == file.full_path());
        if !matches_file {
            return Err(VcError::UnexpectedOutput(format!(
                "checkout of {}: {}",
                file.full_path(),
                header
            )));
        }

        let mut revision_line = String::new();
        reader.read_line(&mut revision_line)?;
        if !revision_line.starts_with("revision ") {
            warn!(line = %revision_line.trim_end(), "co did not report the revision");
        }

        Ok(Box::new(reader))
    }

    /// Check `working` in to `archive` with `ci`, creating a binary archive
    /// first when asked to.
    #[instrument(skip(self, request), fields(component = "rcs", operation = "check_in"))]
    pub fn check_in(
        &self,
        working: &Path,
        archive: &Path,
        request: &CheckInRequest,
    ) -> VcResult<CheckInOutcome> {
        if !working.is_file() {
            return Err(VcError::NotFound(working.display().to_string()));
        }
        let message = terminated_message(&request.message);

        if request.binary && !archive.exists() {
            let cmd = ProcessCommand::new(&self.paths.rcs)
                .args(["-i", "-kb"])
                .arg(archive)
                .stdin(message.clone())
                .stderr(StderrMode::Merge);
            let output = self.runner.run(&cmd)?;
            if !output.success() {
                return Err(output.failure(&cmd));
            }
            debug!(archive = %archive.display(), "Created binary archive");
        }

        let cmd = ProcessCommand::new(&self.paths.ci)
            .arg("-u")
            .arg(format!("-w{}", request.user))
            .arg(working)
            .arg(archive)
            .stdin(message)
            .stderr(StderrMode::Merge);
        let output = self.runner.run(&cmd)?;
        let text = output.stdout_lossy();

        let revision_re = static_regex(
            &CI_REVISION_RE,
            r"(new|initial) revision:\s*([\d\.]+)",
        )?;
        if let Some(caps) = revision_re.captures(&text) {
            let outcome = CheckInOutcome {
                revision: RevisionNumber::parse(&caps[2])?,
                initial: &caps[1] == "initial",
            };
            info!(
                archive = %archive.display(),
                revision = %outcome.revision,
                "Checked in new revision"
            );
            return Ok(outcome);
        }
        if text.contains("unchanged") {
            return Err(VcError::UnchangedFile(working.display().to_string()));
        }
        if text.contains("locked by") || text.contains("no lock set") {
            return Err(VcError::LockConflict(last_line(&text)));
        }
        Err(output.failure(&cmd))
    }

    /// `rcs -l`; returns the locked revision.
    pub fn lock(&self, archive: &Path) -> VcResult<RevisionNumber> {
        let cmd = ProcessCommand::new(&self.paths.rcs)
            .arg("-l")
            .arg(archive)
            .stderr(StderrMode::Merge);
        let output = self.runner.run(&cmd)?;
        let text = output.stdout_lossy();

        let locked_re = static_regex(&LOCKED_RE, r"(?m)^([\d\.]+) locked")?;
        if let Some(caps) = locked_re.captures(&text) {
            return RevisionNumber::parse(&caps[1]);
        }
        if text.contains("locked by") {
            return Err(VcError::LockConflict(last_line(&text)));
        }
        Err(output.failure(&cmd))
    }

    /// `rcs -u`. A file without locks counts as unlocked.
    pub fn unlock(&self, archive: &Path) -> VcResult<()> {
        let cmd = ProcessCommand::new(&self.paths.rcs)
            .arg("-u")
            .arg(archive)
            .stderr(StderrMode::Merge);
        let output = self.runner.run(&cmd)?;
        let text = output.stdout_lossy();

        if text.contains(" unlocked") {
            return Ok(());
        }
        if text.contains("No locks are set") {
            debug!(archive = %archive.display(), "Unlock requested on an unlocked file");
            return Ok(());
        }
        if text.contains("locked by") {
            return Err(VcError::LockConflict(last_line(&text)));
        }
        Err(output.failure(&cmd))
    }

    /// The first lock listed by `rlog -L -h`, if any.
    pub fn locker(&self, archive: &Path) -> VcResult<Option<LockInfo>> {
        let cmd = ProcessCommand::new(&self.paths.rlog)
            .args(["-L", "-h"])
            .arg(archive);
        let output = self.runner.run(&cmd)?;
        if !output.success() {
            return Err(output.failure(&cmd));
        }
        parse_locks(&output.stdout_lossy())
    }
}

/// Reject Subversion revisions before anything is spawned.
pub fn rcs_revision(revision: &Revision) -> VcResult<&RevisionNumber> {
    revision
        .as_rcs()
        .ok_or_else(|| VcError::InvalidRevision(revision.to_string()))
}

/// Log message for `ci`/`rcs -i` stdin, ended by a lone `.`. A message
/// line that is itself a lone `.` would end input early, so it gains a
/// trailing space.
pub fn terminated_message(message: &str) -> String {
    let mut out = String::new();
    for line in message.lines() {
        if line == "." {
            out.push_str(". ");
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out.push_str(".\n");
    out
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Read the `locks:` section of an rlog header.
pub fn parse_locks(text: &str) -> VcResult<Option<LockInfo>> {
    let locker_re = static_regex(&LOCKER_RE, r"^\s+(\S+):\s+([\d\.]+)")?;
    let mut in_locks = false;
    for line in text.lines() {
        if line.starts_with("locks:") {
            in_locks = true;
        } else if in_locks {
            match locker_re.captures(line) {
                Some(caps) => {
                    return Ok(Some(LockInfo {
                        user: caps[1].to_string(),
                        revision: RevisionNumber::parse(&caps[2])?,
                    }))
                }
                None => break,
            }
        }
    }
    Ok(None)
}

#[cfg(feature = "rcs")]
pub use backend::RcsBackend;

#[cfg(feature = "rcs")]
mod backend {
    use super::*;
    use vc_core::{
        AnnotateLine, BackendKind, BrowseOptions, DirectoryListing, HistoryOptions, PatchsetLog,
        VcBackend,
    };

    use crate::config::RepositoryConfig;
    use crate::util::{normalize_path, under_root};

    /// A directory tree of `,v` archives
    pub struct RcsBackend {
        sourceroot: String,
        tools: RcsTools,
        cache: Option<Arc<dyn VcCache>>,
    }

    impl RcsBackend {
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

        fn location(&self, path: &str) -> VcResult<ArchiveLocation> {
            let module_path = normalize_path(path)?;
            let archive = PathBuf::from(under_root(&self.sourceroot, &archive_name(&module_path)));
            if !archive.is_file() {
                return Err(VcError::NotFound(module_path));
            }
            Ok(ArchiveLocation {
                module_path,
                archive,
                attic: false,
            })
        }

        fn working_and_archive(&self, path: &str) -> VcResult<(PathBuf, PathBuf)> {
            let module_path = normalize_path(path)?;
            Ok((
                PathBuf::from(under_root(&self.sourceroot, &module_path)),
                PathBuf::from(under_root(&self.sourceroot, &archive_name(&module_path))),
            ))
        }
    }

    impl VcBackend for RcsBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Rcs
        }

        fn sourceroot(&self) -> &str {
            &self.sourceroot
        }

        fn is_file(&self, path: &str) -> bool {
            self.location(path).is_ok()
        }

        #[instrument(skip(self, options), fields(component = "rcs", operation = "list_directory"))]
        fn list_directory(
            &self,
            path: &str,
            options: &BrowseOptions,
        ) -> VcResult<DirectoryListing> {
            let dir = normalize_path(path)?;
            let contents = read_archive_dir(Path::new(&under_root(&self.sourceroot, &dir)))?;

            let mut listing = DirectoryListing::new(dir.clone());
            listing.directories = contents.directories;
            for name in contents.files {
                let location = self.location(&join_path(&dir, &name))?;
                listing.files.push(self.tools.cached_history(
                    self.cache.as_deref(),
                    &self.sourceroot,
                    &location,
                    options.quicklog,
                )?);
            }
            listing.apply_sort(options.sort, options.order);
            Ok(listing)
        }

        #[instrument(skip(self, options), fields(component = "rcs", operation = "file_history"))]
        fn file_history(&self, path: &str, options: &HistoryOptions) -> VcResult<FileHistory> {
            let location = self.location(path)?;
            self.tools.cached_history(
                self.cache.as_deref(),
                &self.sourceroot,
                &location,
                options.quicklog,
            )
        }

        #[instrument(skip_all, fields(component = "rcs", operation = "diff", path = %file.module_path()))]
        fn diff(&self, file: &FileHistory, request: &DiffRequest) -> VcResult<Vec<String>> {
            self.tools.diff(file, request)
        }

        #[instrument(skip_all, fields(component = "rcs", operation = "checkout", path = %file.module_path(), revision = %revision))]
        fn checkout(
            &self,
            file: &FileHistory,
            revision: &Revision,
        ) -> VcResult<Box<dyn Read + Send>> {
            self.tools.checkout(file, revision)
        }

        fn annotate(&self, _file: &FileHistory, _revision: &Revision) -> VcResult<Vec<AnnotateLine>> {
            Err(self.unsupported("annotate"))
        }

        fn patchsets(&self, _file: &FileHistory) -> VcResult<PatchsetLog> {
            Err(self.unsupported("patchsets"))
        }

        fn check_in(&self, path: &str, request: &CheckInRequest) -> VcResult<CheckInOutcome> {
            let (working, archive) = self.working_and_archive(path)?;
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
}
