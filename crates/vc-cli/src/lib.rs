// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use serde::Serialize;
use tracing::debug;
use vc_backends::{default_config_path, RepositoriesFile, Repository, RepositoryConfig};
use vc_logging::CliLoggingArgs;

pub mod browse;
pub mod content;
pub mod legacy;

#[derive(clap::Parser)]
#[command(
    name = "vcb",
    about = "Browse RCS, CVS and Subversion repositories",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Repository registry (default: $VCBROWSE_CONFIG or the standard location)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Repository name from the registry (default: the first one)
    #[arg(long, global = true)]
    pub repo: Option<String>,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
    #[command(flatten)]
    pub logging: CliLoggingArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List a directory
    Ls(browse::LsArgs),
    /// Show a file's revision log
    Log(browse::LogArgs),
    /// Compare two revisions of a file
    Diff(content::DiffArgs),
    /// Print a file at a revision
    Cat(content::CatArgs),
    /// Show who last changed each line
    Annotate(content::AnnotateArgs),
    /// List the patchsets touching a file
    Patchsets(browse::PatchsetsArgs),
    /// Lock a file's head revision
    Lock(legacy::PathArgs),
    /// Release a file's lock
    Unlock(legacy::PathArgs),
    /// Report who holds a file's lock
    Locked(legacy::PathArgs),
    /// Check in a working file
    Ci(legacy::CheckInArgs),
}

impl Cli {
    /// Load the registry and open the selected repository.
    pub fn open_repository(&self) -> Result<Repository> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        let registry = RepositoriesFile::load(&path)
            .with_context(|| format!("Failed to load repositories from {}", path.display()))?;
        let config = select_repository(&registry, self.repo.as_deref())?;
        debug!(repository = %config.name, config = %path.display(), "Selected repository");
        Repository::open(config).with_context(|| format!("Failed to open repository {}", config.name))
    }

    pub fn run(self, out: &mut dyn Write) -> Result<()> {
        let repo = self.open_repository()?;
        self.command.run(&repo, self.json, out)
    }
}

impl Commands {
    pub fn run(&self, repo: &Repository, json: bool, out: &mut dyn Write) -> Result<()> {
        match self {
            Commands::Ls(args) => args.run(repo, json, out),
            Commands::Log(args) => args.run(repo, json, out),
            Commands::Diff(args) => args.run(repo, json, out),
            Commands::Cat(args) => args.run(repo, out),
            Commands::Annotate(args) => args.run(repo, json, out),
            Commands::Patchsets(args) => args.run(repo, json, out),
            Commands::Lock(args) => legacy::lock(repo, args, out),
            Commands::Unlock(args) => legacy::unlock(repo, args, out),
            Commands::Locked(args) => legacy::locked(repo, args, json, out),
            Commands::Ci(args) => args.run(repo, out),
        }
    }
}

/// Pick `name` from the registry, or the first repository when no name is
/// given.
pub fn select_repository<'a>(
    registry: &'a RepositoriesFile,
    name: Option<&str>,
) -> Result<&'a RepositoryConfig> {
    match name {
        Some(name) => registry.find(name).ok_or_else(|| {
            let known: Vec<&str> = registry.repository.iter().map(|r| r.name.as_str()).collect();
            anyhow!("Unknown repository {} (configured: {})", name, known.join(", "))
        }),
        None => registry
            .repository
            .first()
            .ok_or_else(|| anyhow!("No repositories are configured")),
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub use clap::Parser;
