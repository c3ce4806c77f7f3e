// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Parser for `svn log -v` text output

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::trace;

use vc_core::{
    ChangedPath, FileHistoryBuilder, LogEntry, PathAction, Revision, RevisionState, VcError,
    VcResult,
};

use crate::util::static_regex;

const TOOL: &str = "svn log";

static HEADER_RE: OnceLock<Regex> = OnceLock::new();

fn is_separator(line: &str) -> bool {
    line.len() > 1 && line.bytes().all(|b| b == b'-')
}

/// Feed one file's `svn log -v` output into `builder`.
pub fn parse_svn_log(output: &str, builder: &mut FileHistoryBuilder) -> VcResult<()> {
    let header_re = static_regex(
        &HEADER_RE,
        r"^r([0-9]*) \| (.*?) \| (.*) \(.*\) \| ([0-9]*) lines?$",
    )?;

    let mut lines = output.lines();
    match lines.next() {
        Some(first) if is_separator(first) => {}
        Some(first) => {
            return Err(VcError::parse(TOOL, format!("expected a separator, got: {}", first)))
        }
        // A path with no history prints nothing at all.
        None => return Ok(()),
    }

    while let Some(header) = lines.next() {
        if header.trim().is_empty() {
            continue;
        }
        let caps = header_re
            .captures(header)
            .ok_or_else(|| VcError::parse(TOOL, format!("bad revision header: {}", header)))?;

        let rev: u64 = caps[1]
            .parse()
            .map_err(|_| VcError::parse(TOOL, format!("bad revision in: {}", header)))?;
        let date = DateTime::parse_from_str(&caps[3], "%Y-%m-%d %H:%M:%S %z")
            .map_err(|_| VcError::parse(TOOL, format!("bad date in: {}", header)))?
            .with_timezone(&Utc);
        let message_lines: usize = caps[4].parse().unwrap_or(0);

        // "Changed paths:"
        lines.next();
        let mut changed_paths = Vec::new();
        for line in lines.by_ref() {
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            if let Some(path) = parse_changed_path(line) {
                changed_paths.push(path);
            }
        }

        let mut message = Vec::with_capacity(message_lines);
        for _ in 0..message_lines {
            let line = lines
                .next()
                .ok_or_else(|| VcError::parse(TOOL, format!("r{} message is truncated", rev)))?;
            message.push(line.trim_end());
        }

        match lines.next() {
            Some(line) if is_separator(line) => {}
            other => {
                return Err(VcError::parse(
                    TOOL,
                    format!("r{} not closed by a separator: {:?}", rev, other),
                ))
            }
        }

        trace!(revision = rev, paths = changed_paths.len(), "Parsed svn log entry");
        builder.push_log(LogEntry {
            revision: Revision::Svn(rev),
            author: caps[2].to_string(),
            date,
            message: message.join("\n").trim_end().to_string(),
            state: RevisionState::default(),
            changed_lines: None,
            branch_points: Vec::new(),
            changed_paths,
        });
    }
    Ok(())
}

/// `M /trunk/foo.c` or `A /trunk/bar.c (from /trunk/foo.c:12)`
fn parse_changed_path(line: &str) -> Option<ChangedPath> {
    let mut chars = line.chars();
    let action = PathAction::from_letter(chars.next()?)?;
    let rest = chars.as_str().trim();
    let (path, copied_from) = match rest.find(" (from ") {
        Some(i) => (
            &rest[..i],
            Some(rest[i + " (from ".len()..].trim_end_matches(')').to_string()),
        ),
        None => (rest, None),
    };
    Some(ChangedPath {
        action,
        path: path.to_string(),
        copied_from,
    })
}
