// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Subversion repositories through the `svn` client.
//!
//! There is no cheap per-file modification time to validate cached data
//! against, so everything cached here expires after [`SVN_CACHE_TTL`].

use regex::Regex;
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing::{debug, instrument, warn};

use vc_core::cache::{load_or_build, SVN_CACHE_TTL};
use vc_core::{
    AnnotateLine, BackendKind, BrowseOptions, CacheKey, CachePolicy, DiffRequest,
    DirectoryListing, FileHistory, FileHistoryBuilder, HistoryOptions, PathAction, Patchset,
    PatchsetLog, PatchsetMember, PatchsetRevision, ProcessCommand, ProcessOutput, ProcessRunner,
    Revision, StderrMode, VcBackend, VcCache, VcError, VcResult,
};

use crate::config::{RepositoryConfig, ToolPaths};
use crate::svn_log::parse_svn_log;
use crate::util::{join_path, normalize_path, split_path, static_regex, under_root};

static ANNOTATE_RE: OnceLock<Regex> = OnceLock::new();

pub struct SvnBackend {
    sourceroot: String,
    paths: ToolPaths,
    username: Option<String>,
    password: Option<String>,
    runner: Arc<dyn ProcessRunner>,
    cache: Option<Arc<dyn VcCache>>,
}

impl SvnBackend {
    pub fn new(
        config: &RepositoryConfig,
        runner: Arc<dyn ProcessRunner>,
        cache: Option<Arc<dyn VcCache>>,
    ) -> Self {
        Self {
            sourceroot: config.sourceroot.trim_end_matches('/').to_string(),
            paths: config.paths.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            runner,
            cache,
        }
    }

    /// `svn` with the options every invocation shares
    fn command(&self) -> ProcessCommand {
        let config_dir = self
            .paths
            .svn_home
            .clone()
            .unwrap_or_else(default_config_dir);
        let mut cmd = ProcessCommand::new(&self.paths.svn)
            .arg("--non-interactive")
            .arg("--config-dir")
            .arg(config_dir);
        if let Some(user) = &self.username {
            cmd = cmd.arg("--username").arg(user);
        }
        if let Some(password) = &self.password {
            cmd = cmd.arg("--password").arg(password);
        }
        cmd
    }

    fn url(&self, path: &str) -> String {
        under_root(&self.sourceroot, path)
    }

    /// Turn an `svn:` error line into the matching error.
    fn svn_error(&self, path: &str, output: &ProcessOutput, cmd: &ProcessCommand) -> VcError {
        let text = output.stdout_lossy();
        let not_found = text.lines().any(|l| {
            l.starts_with("svn:")
                && (l.contains("E160013") || l.contains("not found") || l.contains("non-existent"))
        });
        if not_found {
            VcError::NotFound(path.to_string())
        } else {
            output.failure(cmd)
        }
    }

    fn history(&self, module_path: &str, quicklog: bool) -> VcResult<FileHistory> {
        let url = self.url(module_path);
        let mut cmd = self.command().arg("log").arg("-v");
        if quicklog {
            cmd = cmd.args(["--limit", "1"]);
        }
        let cmd = cmd.arg(&url).stderr(StderrMode::Merge);

        let output = self.runner.run(&cmd)?;
        let text = output.stdout_lossy();
        if !output.success() || text.starts_with("svn:") {
            return Err(self.svn_error(module_path, &output, &cmd));
        }

        let (dir, name) = split_path(module_path);
        let mut builder = FileHistoryBuilder::new(name, dir, url.clone());
        parse_svn_log(&text, &mut builder)?;
        if builder.is_empty() {
            return Err(VcError::NotFound(module_path.to_string()));
        }
        debug!(path = %module_path, "Parsed svn log output");
        Ok(builder.build())
    }

    fn cached_history(&self, module_path: &str, quicklog: bool) -> VcResult<FileHistory> {
        let key = CacheKey::file_history(&self.sourceroot, module_path, quicklog);
        load_or_build(
            self.cache.as_deref(),
            &key,
            CachePolicy::Fixed(SVN_CACHE_TTL),
            || self.history(module_path, quicklog),
        )
    }
}

fn svn_revision(revision: &Revision) -> VcResult<u64> {
    revision
        .as_svn()
        .ok_or_else(|| VcError::InvalidRevision(revision.to_string()))
}

/// One patchset per log entry, built from its changed paths.
pub fn patchsets_from_history(history: &FileHistory) -> Vec<Patchset> {
    let mut patchsets: Vec<Patchset> = history
        .revisions()
        .iter()
        .filter_map(|rev| history.log(rev))
        .filter_map(|entry| {
            let rev = entry.revision.as_svn()?;
            let members = entry
                .changed_paths
                .iter()
                .map(|changed| {
                    let this = PatchsetRevision::Revision(Revision::Svn(rev));
                    let (from, to) = match changed.action {
                        PathAction::Added => (PatchsetRevision::Initial, this),
                        PathAction::Deleted => (this, PatchsetRevision::Dead(None)),
                        PathAction::Modified | PathAction::Replaced => (
                            PatchsetRevision::Revision(Revision::Svn(rev.saturating_sub(1))),
                            this,
                        ),
                    };
                    PatchsetMember {
                        file: changed.path.clone(),
                        from,
                        to,
                    }
                })
                .collect();
            Some(Patchset {
                id: rev,
                date: Some(entry.date),
                author: entry.author.clone(),
                branch: None,
                tag: None,
                message: entry.message.clone(),
                members,
            })
        })
        .collect();
    patchsets.sort_by_key(|ps| ps.id);
    patchsets
}

impl VcBackend for SvnBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Svn
    }

    fn sourceroot(&self) -> &str {
        &self.sourceroot
    }

    fn is_file(&self, _path: &str) -> bool {
        true
    }

    #[instrument(skip(self, options), fields(component = "svn", operation = "list_directory"))]
    fn list_directory(&self, path: &str, options: &BrowseOptions) -> VcResult<DirectoryListing> {
        let dir = normalize_path(path)?;
        let cmd = self
            .command()
            .arg("ls")
            .arg(self.url(&dir))
            .stderr(StderrMode::Merge);
        let output = self.runner.run(&cmd)?;

        let mut listing = DirectoryListing::new(dir.clone());
        let mut errors = Vec::new();
        let mut names = Vec::new();
        for line in output.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if line.starts_with("svn:") {
                errors.push(line.to_string());
            } else if let Some(subdir) = line.strip_suffix('/') {
                listing.directories.push(subdir.to_string());
            } else {
                names.push(line.to_string());
            }
        }
        if !errors.is_empty() {
            return Err(VcError::CommandFailed {
                program: cmd.program_name(),
                status: output.status,
                output: errors.join("\n"),
            });
        }
        if !output.success() {
            return Err(output.failure(&cmd));
        }

        for name in names {
            listing
                .files
                .push(self.cached_history(&join_path(&dir, &name), options.quicklog)?);
        }
        listing.apply_sort(options.sort, options.order);
        Ok(listing)
    }

    #[instrument(skip(self, options), fields(component = "svn", operation = "file_history"))]
    fn file_history(&self, path: &str, options: &HistoryOptions) -> VcResult<FileHistory> {
        let module_path = normalize_path(path)?;
        self.cached_history(&module_path, options.quicklog)
    }

    #[instrument(skip_all, fields(component = "svn", operation = "diff", path = %file.module_path()))]
    fn diff(&self, file: &FileHistory, request: &DiffRequest) -> VcResult<Vec<String>> {
        let rev1 = svn_revision(&request.rev1)?;
        let rev2 = svn_revision(&request.rev2)?;
        let cmd = self
            .command()
            .arg("diff")
            .arg("--diff-cmd")
            .arg(&self.paths.diff)
            .arg("-r")
            .arg(format!("{}:{}", rev1, rev2))
            .arg("-x")
            .arg(request.diff_flags().join(" "))
            .arg(file.full_path())
            .stderr(StderrMode::Merge);

        let output = self.runner.run(&cmd)?;
        if !output.success() {
            return Err(output.failure(&cmd));
        }
        Ok(output.lines())
    }

    #[instrument(skip_all, fields(component = "svn", operation = "checkout", path = %file.module_path(), revision = %revision))]
    fn checkout(&self, file: &FileHistory, revision: &Revision) -> VcResult<Box<dyn Read + Send>> {
        let rev = svn_revision(revision)?;
        let cmd = self
            .command()
            .arg("cat")
            .arg("-r")
            .arg(rev.to_string())
            .arg(file.full_path())
            .stderr(StderrMode::Merge);
        self.runner.stream(&cmd)
    }

    #[instrument(skip_all, fields(component = "svn", operation = "annotate", path = %file.module_path(), revision = %revision))]
    fn annotate(&self, file: &FileHistory, revision: &Revision) -> VcResult<Vec<AnnotateLine>> {
        let rev = svn_revision(revision)?;
        let line_re = static_regex(&ANNOTATE_RE, r"^\s*(\d+)\s+(\S+)\s(.*)$")?;
        let cmd = self
            .command()
            .arg("annotate")
            .arg("-r")
            .arg(format!("1:{}", rev))
            .arg(file.full_path());

        let output = self.runner.run(&cmd)?;
        if !output.success() {
            return Err(output.failure(&cmd));
        }

        let mut lines = Vec::new();
        for line in output.lines() {
            let Some(caps) = line_re.captures(&line) else {
                warn!(line = %line, "Skipping unrecognised annotate line");
                continue;
            };
            let Ok(line_rev) = caps[1].parse::<u64>() else {
                continue;
            };
            lines.push(AnnotateLine {
                revision: Revision::Svn(line_rev),
                author: caps[2].to_string(),
                date: None,
                line: caps[3].to_string(),
                line_number: lines.len() + 1,
            });
        }
        Ok(lines)
    }

    #[instrument(skip_all, fields(component = "svn", operation = "patchsets", path = %file.module_path()))]
    fn patchsets(&self, file: &FileHistory) -> VcResult<PatchsetLog> {
        let module_path = file.module_path();
        let key = CacheKey::patchsets(&self.sourceroot, &module_path);
        load_or_build(
            self.cache.as_deref(),
            &key,
            CachePolicy::Fixed(SVN_CACHE_TTL),
            || {
                let history = self.history(&module_path, false)?;
                Ok(PatchsetLog {
                    path: module_path.clone(),
                    patchsets: patchsets_from_history(&history),
                })
            },
        )
    }
}

impl std::fmt::Debug for SvnBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvnBackend")
            .field("sourceroot", &self.sourceroot)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Default `--config-dir` when none is configured
pub fn default_config_dir() -> PathBuf {
    std::env::temp_dir()
}
