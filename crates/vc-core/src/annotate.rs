// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::revision::Revision;

/// Per-line attribution of a file at some revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotateLine {
    pub revision: Revision,
    pub author: String,
    /// CVS carries a day-resolution date; Subversion's text form has none
    pub date: Option<NaiveDate>,
    pub line: String,
    /// 1-based
    pub line_number: usize,
}

/// Parse the `01-Jan-24` style date the CVS server prints in annotations.
pub fn parse_cvs_annotate_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%d-%b-%y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d-%b-%Y"))
        .ok()
}
