// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Commands that read file content at a revision

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Args;
use vc_backends::Repository;
use vc_core::diff::DEFAULT_CONTEXT_LINES;
use vc_core::{DiffKind, DiffRequest, FileHistory, HistoryOptions, Revision};

use crate::print_json;

fn quick_history(repo: &Repository, path: &str) -> Result<FileHistory> {
    repo.file_history(path, &HistoryOptions { quicklog: true })
        .with_context(|| format!("Failed to read the history of {}", path))
}

fn revision(repo: &Repository, text: &str) -> Result<Revision> {
    repo.parse_revision(text)
        .with_context(|| format!("Bad revision {} for a {} repository", text, repo.kind()))
}

#[derive(Args)]
pub struct DiffArgs {
    pub path: String,
    pub rev1: String,
    pub rev2: String,
    #[arg(long, value_enum, default_value_t = DiffKind::Context)]
    pub kind: DiffKind,
    /// Lines of context
    #[arg(long, default_value_t = DEFAULT_CONTEXT_LINES)]
    pub context: u32,
    /// Ignore whitespace-only changes
    #[arg(long)]
    pub ignore_whitespace: bool,
}

impl DiffArgs {
    pub fn request(&self, repo: &Repository) -> Result<DiffRequest> {
        Ok(
            DiffRequest::new(revision(repo, &self.rev1)?, revision(repo, &self.rev2)?)
                .kind(self.kind)
                .context_lines(self.context)
                .show_whitespace(!self.ignore_whitespace),
        )
    }

    pub fn run(&self, repo: &Repository, json: bool, out: &mut dyn Write) -> Result<()> {
        let request = self.request(repo)?;
        let history = quick_history(repo, &self.path)?;
        let lines = repo.diff(&history, &request).with_context(|| {
            format!("Failed to diff {} {}:{}", self.path, self.rev1, self.rev2)
        })?;
        if json {
            return print_json(out, &lines);
        }
        for line in &lines {
            writeln!(out, "{}", line)?;
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct CatArgs {
    pub path: String,
    pub revision: String,
}

impl CatArgs {
    pub fn run(&self, repo: &Repository, out: &mut dyn Write) -> Result<()> {
        let rev = revision(repo, &self.revision)?;
        let history = quick_history(repo, &self.path)?;
        let mut content = repo
            .checkout(&history, &rev)
            .with_context(|| format!("Failed to check out {} at {}", self.path, rev))?;
        io::copy(&mut content, out)?;
        Ok(())
    }
}

#[derive(Args)]
pub struct AnnotateArgs {
    pub path: String,
    pub revision: String,
}

impl AnnotateArgs {
    pub fn run(&self, repo: &Repository, json: bool, out: &mut dyn Write) -> Result<()> {
        let rev = revision(repo, &self.revision)?;
        let history = quick_history(repo, &self.path)?;
        let lines = repo
            .annotate(&history, &rev)
            .with_context(|| format!("Failed to annotate {} at {}", self.path, rev))?;
        if json {
            return print_json(out, &lines);
        }
        for line in &lines {
            let rev = line.revision.to_string();
            match line.date {
                Some(date) => writeln!(
                    out,
                    "{:<8} ({:<8} {}): {}",
                    rev,
                    line.author,
                    date.format("%d-%b-%y"),
                    line.line
                )?,
                None => writeln!(out, "{:>6} {:>10} {}", rev, line.author, line.line)?,
            }
        }
        Ok(())
    }
}
