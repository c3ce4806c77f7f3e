// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Diff request options and their GNU diff flag templates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::revision::Revision;

pub const DEFAULT_CONTEXT_LINES: u32 = 3;
const COLUMN_WIDTH: u32 = 120;

/// Output format of a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    #[default]
    Context,
    Unified,
    /// Side by side
    Column,
    Ed,
}

impl DiffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffKind::Context => "context",
            DiffKind::Unified => "unified",
            DiffKind::Column => "column",
            DiffKind::Ed => "ed",
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiffKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "context" => Ok(DiffKind::Context),
            "unified" => Ok(DiffKind::Unified),
            "column" | "side-by-side" => Ok(DiffKind::Column),
            "ed" => Ok(DiffKind::Ed),
            _ => Err(format!(
                "Invalid diff kind: {}. Use context, unified, column or ed",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRequest {
    pub rev1: Revision,
    pub rev2: Revision,
    pub kind: DiffKind,
    pub context_lines: u32,
    /// When false, whitespace-only changes are ignored (`-bB`)
    pub show_whitespace: bool,
}

impl DiffRequest {
    pub fn new(rev1: Revision, rev2: Revision) -> Self {
        Self {
            rev1,
            rev2,
            kind: DiffKind::default(),
            context_lines: DEFAULT_CONTEXT_LINES,
            show_whitespace: true,
        }
    }

    pub fn kind(mut self, kind: DiffKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn context_lines(mut self, lines: u32) -> Self {
        self.context_lines = lines;
        self
    }

    pub fn show_whitespace(mut self, show: bool) -> Self {
        self.show_whitespace = show;
        self
    }

    /// GNU diff options for this request, shared by `rcsdiff` and
    /// Subversion's external `--diff-cmd`.
    pub fn diff_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if !self.show_whitespace {
            flags.push("-bB".to_string());
        }
        match self.kind {
            DiffKind::Context => {
                flags.push("-p".to_string());
                flags.push(format!("--context={}", self.context_lines));
            }
            DiffKind::Unified => {
                flags.push("-p".to_string());
                flags.push(format!("--unified={}", self.context_lines));
            }
            DiffKind::Column => {
                flags.push("--side-by-side".to_string());
                flags.push(format!("--width={}", COLUMN_WIDTH));
            }
            DiffKind::Ed => flags.push("-e".to_string()),
        }
        flags
    }
}
