// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Grouped changesets ("patchsets")

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{VcError, VcResult};
use crate::revision::Revision;

const INITIAL: &str = "INITIAL";
const DEAD: &str = "(DEAD)";

/// One side of a member's revision transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PatchsetRevision {
    /// The file did not exist before this patchset
    Initial,
    Revision(Revision),
    /// The file was removed; cvsps writes `1.3(DEAD)`, Subversion just `(DEAD)`
    Dead(Option<Revision>),
}

impl PatchsetRevision {
    pub fn revision(&self) -> Option<&Revision> {
        match self {
            PatchsetRevision::Initial => None,
            PatchsetRevision::Revision(rev) => Some(rev),
            PatchsetRevision::Dead(rev) => rev.as_ref(),
        }
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, PatchsetRevision::Dead(_))
    }
}

impl fmt::Display for PatchsetRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchsetRevision::Initial => f.write_str(INITIAL),
            PatchsetRevision::Revision(rev) => write!(f, "{}", rev),
            PatchsetRevision::Dead(Some(rev)) => write!(f, "{}{}", rev, DEAD),
            PatchsetRevision::Dead(None) => f.write_str(DEAD),
        }
    }
}

impl FromStr for PatchsetRevision {
    type Err = VcError;

    fn from_str(s: &str) -> VcResult<Self> {
        let s = s.trim();
        if s == INITIAL {
            return Ok(PatchsetRevision::Initial);
        }
        if let Some(rev) = s.strip_suffix(DEAD) {
            if rev.is_empty() {
                return Ok(PatchsetRevision::Dead(None));
            }
            return Ok(PatchsetRevision::Dead(Some(rev.parse()?)));
        }
        Ok(PatchsetRevision::Revision(s.parse()?))
    }
}

impl From<PatchsetRevision> for String {
    fn from(rev: PatchsetRevision) -> Self {
        rev.to_string()
    }
}

impl TryFrom<String> for PatchsetRevision {
    type Error = VcError;

    fn try_from(s: String) -> VcResult<Self> {
        s.parse()
    }
}

/// A single file's transition inside a patchset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchsetMember {
    pub file: String,
    pub from: PatchsetRevision,
    pub to: PatchsetRevision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patchset {
    /// cvsps patchset number, or the Subversion revision
    pub id: u64,
    pub date: Option<DateTime<Utc>>,
    pub author: String,
    /// Omitted for the trunk (`HEAD`)
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub message: String,
    pub members: Vec<PatchsetMember>,
}

/// Every patchset touching one file, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchsetLog {
    pub path: String,
    pub patchsets: Vec<Patchset>,
}

impl PatchsetLog {
    pub fn get(&self, id: u64) -> Option<&Patchset> {
        self.patchsets.iter().find(|ps| ps.id == id)
    }
}
