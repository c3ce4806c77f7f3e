// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Read-only listing commands: `ls`, `log` and `patchsets`

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use vc_backends::Repository;
use vc_core::{BrowseOptions, FileHistory, HistoryOptions, LogEntry, SortBy, SortOrder};

use crate::print_json;

#[derive(Args)]
pub struct LsArgs {
    /// Directory relative to the sourceroot
    #[arg(default_value = "")]
    pub path: String,
    /// Include files in the CVS Attic
    #[arg(long)]
    pub attic: bool,
    /// Sort files by none, name, age, author or rev
    #[arg(long, default_value = "none")]
    pub sort: SortBy,
    /// Reverse the sort order
    #[arg(long)]
    pub desc: bool,
    /// Only read each file's newest log entry
    #[arg(long)]
    pub quick: bool,
}

impl LsArgs {
    pub fn browse_options(&self) -> BrowseOptions {
        BrowseOptions {
            quicklog: self.quick,
            show_attic: self.attic,
            sort: self.sort,
            order: if self.desc {
                SortOrder::Descending
            } else {
                SortOrder::Ascending
            },
        }
    }

    pub fn run(&self, repo: &Repository, json: bool, out: &mut dyn Write) -> Result<()> {
        let listing = repo
            .list_directory(&self.path, &self.browse_options())
            .with_context(|| format!("Failed to list {}", display_path(&self.path)))?;
        if json {
            return print_json(out, &listing);
        }

        for dir in &listing.directories {
            writeln!(out, "{}/", dir)?;
        }
        for file in listing.file_list(self.attic) {
            write_file_summary(out, file)?;
        }
        Ok(())
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

fn write_file_summary(out: &mut dyn Write, file: &FileHistory) -> Result<()> {
    let name = if file.is_attic() {
        format!("{} (attic)", file.name())
    } else {
        file.name().to_string()
    };
    match file.last_log() {
        Some(entry) => writeln!(
            out,
            "{:<24} {:<10} {}  {:<12} {}",
            name,
            entry.revision.to_string(),
            entry.date.format("%Y-%m-%d"),
            entry.author,
            first_line(&entry.message)
        )?,
        None => writeln!(out, "{}", name)?,
    }
    Ok(())
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

#[derive(Args)]
pub struct LogArgs {
    /// File path relative to the sourceroot
    pub path: String,
    /// Only show the newest entry
    #[arg(long)]
    pub quick: bool,
}

impl LogArgs {
    pub fn run(&self, repo: &Repository, json: bool, out: &mut dyn Write) -> Result<()> {
        let history = repo
            .file_history(&self.path, &HistoryOptions { quicklog: self.quick })
            .with_context(|| format!("Failed to read the history of {}", self.path))?;
        if json {
            return print_json(out, &history);
        }
        write_history(out, &history)
    }
}

fn write_history(out: &mut dyn Write, history: &FileHistory) -> Result<()> {
    writeln!(out, "file: {}", history.module_path())?;
    if let Some(head) = history.head() {
        writeln!(out, "head: {}", head)?;
    }
    for rev in history.revisions() {
        let Some(entry) = history.log(rev) else {
            continue;
        };
        writeln!(out, "{}", "-".repeat(28))?;
        write_entry(out, history, entry)?;
    }
    writeln!(out, "{}", "=".repeat(77))?;
    Ok(())
}

fn write_entry(out: &mut dyn Write, history: &FileHistory, entry: &LogEntry) -> Result<()> {
    let tags = history.tags_for(&entry.revision);
    if tags.is_empty() {
        writeln!(out, "revision {}", entry.revision)?;
    } else {
        writeln!(out, "revision {}  [{}]", entry.revision, tags.join(", "))?;
    }

    write!(
        out,
        "date: {};  author: {};  state: {};",
        entry.date.format("%Y-%m-%d %H:%M:%S %z"),
        entry.author,
        entry.state
    )?;
    if let Some(lines) = &entry.changed_lines {
        write!(out, "  lines: {}", lines)?;
    }
    writeln!(out)?;

    let branches = history.symbolic_branches(entry);
    if !entry.branch_points.is_empty() {
        let names: Vec<String> = entry
            .branch_points
            .iter()
            .map(|point| {
                match branches.iter().find(|(_, id)| *id == point) {
                    Some((name, _)) => format!("{} ({})", point, name),
                    None => point.to_string(),
                }
            })
            .collect();
        writeln!(out, "branches: {}", names.join(";  "))?;
    }
    for changed in &entry.changed_paths {
        match &changed.copied_from {
            Some(from) => writeln!(out, "   {} {} {}", changed.action.letter(), changed.path, from)?,
            None => writeln!(out, "   {} {}", changed.action.letter(), changed.path)?,
        }
    }
    writeln!(out, "{}", entry.message)?;
    Ok(())
}

#[derive(Args)]
pub struct PatchsetsArgs {
    /// File path relative to the sourceroot
    pub path: String,
}

impl PatchsetsArgs {
    pub fn run(&self, repo: &Repository, json: bool, out: &mut dyn Write) -> Result<()> {
        let history = repo
            .file_history(&self.path, &HistoryOptions { quicklog: true })
            .with_context(|| format!("Failed to read the history of {}", self.path))?;
        let log = repo
            .patchsets(&history)
            .with_context(|| format!("Failed to build patchsets for {}", self.path))?;
        if json {
            return print_json(out, &log);
        }

        for ps in &log.patchsets {
            writeln!(out, "{}", "-".repeat(21))?;
            writeln!(out, "PatchSet {}", ps.id)?;
            if let Some(date) = ps.date {
                writeln!(out, "Date: {}", date.format("%Y/%m/%d %H:%M:%S"))?;
            }
            writeln!(out, "Author: {}", ps.author)?;
            writeln!(out, "Branch: {}", ps.branch.as_deref().unwrap_or("HEAD"))?;
            writeln!(out, "Tag: {}", ps.tag.as_deref().unwrap_or("(none)"))?;
            writeln!(out, "Log:\n{}\n", ps.message)?;
            writeln!(out, "Members:")?;
            for member in &ps.members {
                writeln!(out, "\t{}:{}->{}", member.file, member.from, member.to)?;
            }
        }
        Ok(())
    }
}
