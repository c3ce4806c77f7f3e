// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Parser for `rlog` output, shared by the RCS and CVS backends.
//!
//! The header is read in three phases: before `branch:`, the symbol table,
//! and the revision blocks that follow the first dashed separator. Each
//! revision block is then parsed on its own.

use chrono::{NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::trace;

use vc_core::{
    FileHistoryBuilder, LogEntry, Revision, RevisionNumber, RevisionState, VcError, VcResult,
};

use crate::util::static_regex;

const TOOL: &str = "rlog";

static TAG_RE: OnceLock<Regex> = OnceLock::new();
static DATE_RE: OnceLock<Regex> = OnceLock::new();
static BRANCHES_RE: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Rev,
    Info,
}

fn is_revision_separator(line: &str) -> bool {
    line == "----------------------------"
}

fn is_file_separator(line: &str) -> bool {
    line.starts_with("==============================")
}

/// Feed one file's `rlog` output into `builder`.
pub fn parse_rlog(output: &str, builder: &mut FileHistoryBuilder) -> VcResult<()> {
    let tag_re = static_regex(&TAG_RE, r"^\s+([^:]+):\s+([\d\.]+)")?;

    let mut state = State::Init;
    let mut in_symbols = false;
    let mut block: Vec<&str> = Vec::new();

    for line in output.lines() {
        match state {
            State::Init => {
                if let Some(head) = line.strip_prefix("head: ") {
                    let head = head.trim();
                    if !head.is_empty() {
                        builder.set_head(Revision::parse_rcs(head)?);
                    }
                } else if line.starts_with("branch:") {
                    state = State::Rev;
                }
            }
            State::Rev => {
                if line.starts_with("----------") {
                    state = State::Info;
                } else if line.starts_with("symbolic names:") {
                    in_symbols = true;
                } else if !line.starts_with([' ', '\t']) {
                    // `locks:` entries are indented like tags; only the
                    // symbolic names section holds tags.
                    in_symbols = false;
                } else if in_symbols {
                    if let Some(caps) = tag_re.captures(line) {
                        record_symbol(builder, caps[1].trim(), &caps[2])?;
                    }
                }
            }
            State::Info => {
                if !is_file_separator(line) && !is_revision_separator(line) {
                    block.push(line);
                } else if !block.is_empty() {
                    let entry = parse_revision_block(&block)?;
                    trace!(revision = %entry.revision, "Parsed rlog revision block");
                    builder.push_log(entry);
                    block.clear();
                }
            }
        }
    }

    match state {
        State::Init => return Err(VcError::parse(TOOL, "no `branch:` header in output")),
        State::Info if !block.is_empty() => {
            return Err(VcError::parse(TOOL, "output ended inside a revision block"))
        }
        _ => {}
    }
    if builder.is_empty() {
        return Err(VcError::parse(TOOL, "output holds no revisions"));
    }
    Ok(())
}

fn record_symbol(builder: &mut FileHistoryBuilder, name: &str, rev: &str) -> VcResult<()> {
    let number = RevisionNumber::parse(rev)?;
    if let Some(branch) = number.to_branch_id() {
        builder.add_branch(name, branch);
    } else if number.parts().len() % 2 == 1 {
        // Vendor branches are declared by their plain branch id.
        builder.add_branch(name, number);
    } else {
        builder.add_tag(name, Revision::Rcs(number));
    }
    Ok(())
}

/// Parse one revision block: `revision`, `date:`, optional `branches:`,
/// then the log message.
pub fn parse_revision_block(lines: &[&str]) -> VcResult<LogEntry> {
    let date_re = static_regex(
        &DATE_RE,
        r"^date:\s+(\d+)[-/](\d+)[-/](\d+)\s+(\d+):(\d+):(\d+).*?;\s+author:\s+(.+);\s+state:\s+(\S+);(\s+lines:\s+([0-9\s+-]+))?",
    )?;
    let branches_re = static_regex(&BRANCHES_RE, r"^branches:\s+(.*)")?;

    let mut rest = lines.iter();

    let revision = rest
        .by_ref()
        .find_map(|line| line.strip_prefix("revision "))
        .and_then(|r| r.split_whitespace().next())
        .ok_or_else(|| VcError::parse(TOOL, "revision block without a revision line"))?;
    let revision = Revision::parse_rcs(revision)?;

    let date_line = rest
        .next()
        .ok_or_else(|| VcError::parse(TOOL, format!("revision {} has no date line", revision)))?;
    let caps = date_re.captures(date_line).ok_or_else(|| {
        VcError::parse(TOOL, format!("unrecognised date line: {}", date_line))
    })?;

    let field = |i: usize| -> VcResult<u32> {
        caps[i]
            .parse()
            .map_err(|_| VcError::parse(TOOL, format!("bad date field in: {}", date_line)))
    };
    let mut year = field(1)? as i32;
    if year < 100 {
        year += 1900;
    }
    let date = NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)
        .and_then(|d| d.and_hms_opt(field(4).ok()?, field(5).ok()?, field(6).ok()?))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| VcError::parse(TOOL, format!("invalid date in: {}", date_line)))?;

    let author = caps[7].trim().to_string();
    let state = RevisionState::from_rlog(&caps[8]);
    let changed_lines = caps
        .get(10)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());

    let mut message_lines: Vec<&str> = rest.copied().collect();
    let mut branch_points = Vec::new();
    if let Some(caps) = message_lines.first().and_then(|l| branches_re.captures(l)) {
        branch_points = caps[1]
            .split(';')
            .map(str::trim)
            .filter_map(|b| RevisionNumber::parse(b).ok())
            .collect();
        message_lines.remove(0);
    }

    Ok(LogEntry {
        revision,
        author,
        date,
        message: message_lines.join("\n"),
        state,
        changed_lines,
        branch_points,
        changed_paths: Vec::new(),
    })
}
