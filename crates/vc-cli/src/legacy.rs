// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Check-in and locking for RCS and CVS repositories

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;
use vc_backends::Repository;
use vc_core::CheckInRequest;

use crate::print_json;

#[derive(Args)]
pub struct PathArgs {
    /// File path relative to the sourceroot
    pub path: String,
}

#[derive(Args)]
pub struct CheckInArgs {
    /// File path relative to the sourceroot
    pub path: String,
    /// Log message for the new revision
    #[arg(long, short = 'm')]
    pub message: String,
    /// Author recorded on the new revision
    #[arg(long, env = "VCB_USER")]
    pub user: String,
    /// Create a new archive with binary keyword expansion
    #[arg(long)]
    pub binary: bool,
}

impl CheckInArgs {
    pub fn run(&self, repo: &Repository, out: &mut dyn Write) -> Result<()> {
        let request = CheckInRequest {
            message: self.message.clone(),
            user: self.user.clone(),
            binary: self.binary,
        };
        let outcome = repo
            .check_in(&self.path, &request)
            .with_context(|| format!("Failed to check in {}", self.path))?;
        info!(path = %self.path, revision = %outcome.revision, initial = outcome.initial, "Checked in");
        if outcome.initial {
            writeln!(out, "{}: initial revision: {}", self.path, outcome.revision)?;
        } else {
            writeln!(out, "{}: new revision: {}", self.path, outcome.revision)?;
        }
        Ok(())
    }
}

pub fn lock(repo: &Repository, args: &PathArgs, out: &mut dyn Write) -> Result<()> {
    let revision = repo
        .lock(&args.path)
        .with_context(|| format!("Failed to lock {}", args.path))?;
    writeln!(out, "{}: locked revision {}", args.path, revision)?;
    Ok(())
}

pub fn unlock(repo: &Repository, args: &PathArgs, out: &mut dyn Write) -> Result<()> {
    repo.unlock(&args.path)
        .with_context(|| format!("Failed to unlock {}", args.path))?;
    writeln!(out, "{}: unlocked", args.path)?;
    Ok(())
}

pub fn locked(repo: &Repository, args: &PathArgs, json: bool, out: &mut dyn Write) -> Result<()> {
    let locker = repo
        .locker(&args.path)
        .with_context(|| format!("Failed to read the locks on {}", args.path))?;
    if json {
        return print_json(out, &locker);
    }
    match locker {
        Some(lock) => writeln!(
            out,
            "{}: locked by {} at revision {}",
            args.path, lock.user, lock.revision
        )?,
        None => writeln!(out, "{}: not locked", args.path)?,
    }
    Ok(())
}
