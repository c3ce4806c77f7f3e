// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Annotation through the CVS client/server protocol.
//!
//! `cvs -n server` is fed a request transcript on stdin, which avoids
//! needing a working copy on disk.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use tracing::debug;

use vc_core::annotate::parse_cvs_annotate_date;
use vc_core::{
    AnnotateLine, ProcessCommand, ProcessRunner, Revision, RevisionNumber, VcError, VcResult,
};

use crate::util::{split_path, static_regex};

static LINE_RE: OnceLock<Regex> = OnceLock::new();

const VALID_RESPONSES: &str = "ok error Valid-requests Checked-in Updated Merged Removed M E";

/// Build the request transcript annotating `module_path` at `revision`.
pub fn annotate_request(sourceroot: &str, module_path: &str, revision: &RevisionNumber) -> String {
    let (dir, name) = split_path(module_path);
    let mut out = String::new();
    out.push_str(&format!("Root {}\n", sourceroot));
    out.push_str(&format!("Valid-responses {}\n", VALID_RESPONSES));
    out.push_str("UseUnchanged\n");
    out.push_str("Argument -r\n");
    out.push_str(&format!("Argument {}\n", revision));
    out.push_str(&format!("Argument {}\n", module_path));

    // Each directory level from the deepest up, then the root itself.
    if !dir.is_empty() {
        let segments: Vec<&str> = dir.split('/').collect();
        for depth in (1..=segments.len()).rev() {
            let local = segments[..depth].join("/");
            out.push_str(&format!("Directory {}\n", local));
            out.push_str(&format!("{}/{}\n", sourceroot, local));
        }
    }
    out.push_str("Directory .\n");
    out.push_str(&format!("{}\n", sourceroot));
    out.push_str("annotate\n");
    debug!(file = name, "Prepared cvs server annotate request");
    out
}

/// Pull the annotated lines of `module_path` out of a server response.
pub fn parse_annotate_response(output: &str, module_path: &str) -> VcResult<Vec<AnnotateLine>> {
    let line_re = static_regex(&LINE_RE, r"^M\s+([\d\.]+)\s+\((.+)\s+(\d+-\w+-\d+)\):.(.*)$")?;
    let marker = Regex::new(&format!(r"^E\s+Annotations for {}", regex::escape(module_path)))
        .map_err(|e| VcError::Config(e.to_string()))?;

    let mut lines = output.lines();
    if !lines.by_ref().any(|l| marker.is_match(l)) {
        let last = output
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default();
        return Err(VcError::UnexpectedOutput(format!(
            "unable to annotate {}; server said: {}",
            module_path, last
        )));
    }

    let mut result = Vec::new();
    for line in lines {
        let Some(caps) = line_re.captures(line) else {
            continue;
        };
        result.push(AnnotateLine {
            revision: Revision::parse_rcs(&caps[1])?,
            author: caps[2].trim().to_string(),
            date: parse_cvs_annotate_date(&caps[3]),
            line: caps[4].to_string(),
            line_number: result.len() + 1,
        });
    }
    Ok(result)
}

/// Run `cvs -n server` and parse what it sends back.
pub fn annotate(
    runner: &dyn ProcessRunner,
    cvs: &Path,
    sourceroot: &str,
    module_path: &str,
    revision: &RevisionNumber,
) -> VcResult<Vec<AnnotateLine>> {
    let cmd = ProcessCommand::new(cvs)
        .args(["-n", "server"])
        .stdin(annotate_request(sourceroot, module_path, revision));
    let output = runner.run(&cmd)?;
    if !output.success() && output.stdout.is_empty() {
        return Err(output.failure(&cmd));
    }
    parse_annotate_response(&output.stdout_lossy(), module_path)
}
