// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Parser for `cvsps` patchset listings

use chrono::{NaiveDateTime, TimeZone, Utc};

use vc_core::{Patchset, PatchsetMember, PatchsetRevision, VcError, VcResult};

const TOOL: &str = "cvsps";
const SEPARATOR: &str = "---------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Begin,
    Info,
    Log,
    Members,
}

/// Parse every stanza of a `cvsps` run, in output order.
pub fn parse_cvsps(output: &str) -> VcResult<Vec<Patchset>> {
    let mut patchsets = Vec::new();
    let mut current: Option<Patchset> = None;
    let mut state = State::Begin;

    for raw in output.lines() {
        let line = raw.trim();
        if line == SEPARATOR {
            patchsets.extend(current.take());
            state = State::Begin;
            continue;
        }

        match state {
            State::Begin => {
                if line.is_empty() {
                    continue;
                }
                let id = line
                    .strip_prefix("PatchSet ")
                    .and_then(|id| id.trim().parse::<u64>().ok())
                    .ok_or_else(|| VcError::parse(TOOL, format!("expected a PatchSet line, got: {}", line)))?;
                current = Some(Patchset {
                    id,
                    date: None,
                    author: String::new(),
                    branch: None,
                    tag: None,
                    message: String::new(),
                    members: Vec::new(),
                });
                state = State::Info;
            }
            State::Info => {
                let Some(ps) = current.as_mut() else { continue };
                let Some((key, value)) = line.split_once(':') else {
                    continue;
                };
                let value = value.trim();
                match key {
                    "Date" => ps.date = Some(parse_date(value)?),
                    "Author" => ps.author = value.to_string(),
                    "Branch" if value != "HEAD" => ps.branch = Some(value.to_string()),
                    "Tag" if value != "(none)" => ps.tag = Some(value.to_string()),
                    "Log" => state = State::Log,
                    _ => {}
                }
            }
            State::Log => {
                let Some(ps) = current.as_mut() else { continue };
                if line == "Members:" {
                    ps.message = ps.message.trim().to_string();
                    state = State::Members;
                } else {
                    ps.message.push_str(raw.trim_end());
                    ps.message.push('\n');
                }
            }
            State::Members => {
                if line.is_empty() {
                    continue;
                }
                if let Some(ps) = current.as_mut() {
                    ps.members.push(parse_member(line)?);
                }
            }
        }
    }

    patchsets.extend(current);
    Ok(patchsets)
}

fn parse_date(value: &str) -> VcResult<chrono::DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y/%m/%d %H:%M:%S")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| VcError::parse(TOOL, format!("bad date: {}", value)))
}

/// `src/foo.c:1.2->1.3`
fn parse_member(line: &str) -> VcResult<PatchsetMember> {
    let (file, revs) = line
        .rsplit_once(':')
        .ok_or_else(|| VcError::parse(TOOL, format!("bad member line: {}", line)))?;
    let (from, to) = revs
        .split_once("->")
        .ok_or_else(|| VcError::parse(TOOL, format!("bad member revisions: {}", line)))?;
    let member = |s: &str| -> VcResult<PatchsetRevision> {
        s.parse()
            .map_err(|_| VcError::parse(TOOL, format!("bad member revision {} in: {}", s, line)))
    };
    Ok(PatchsetMember {
        file: file.trim().to_string(),
        from: member(from)?,
        to: member(to)?,
    })
}
