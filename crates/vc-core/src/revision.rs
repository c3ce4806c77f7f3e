// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Revision numbers and the dotted-number algebra used by RCS and CVS.
//!
//! RCS/CVS revisions are dot-separated integer sequences such as `1.4.2.3`.
//! Trunk revisions have two components; every branch adds two more. A
//! branch is declared in the symbol table with a "magic" number whose
//! second-to-last component is zero (`1.4.0.2` names branch `1.4.2`).
//!
//! Subversion revisions are single repository-wide integers and share no
//! structure with the dotted form, so [`Revision`] keeps the two apart.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{VcError, VcResult};

/// An RCS/CVS dotted revision number such as `1.4.2.3`.
///
/// Always holds at least two components. Ordering is element-wise
/// numeric comparison, with a strict prefix ordering before the longer
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RevisionNumber(Vec<u32>);

impl RevisionNumber {
    /// Parse a dotted revision string, rejecting anything that is not at
    /// least two dot-separated non-negative integers.
    pub fn parse(s: &str) -> VcResult<Self> {
        let mut parts = Vec::new();
        for part in s.split('.') {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VcError::InvalidRevision(s.to_string()));
            }
            let value = part.parse::<u32>().map_err(|_| VcError::InvalidRevision(s.to_string()))?;
            parts.push(value);
        }
        if parts.len() < 2 {
            return Err(VcError::InvalidRevision(s.to_string()));
        }
        Ok(Self(parts))
    }

    /// Build from raw components; `None` if fewer than two are given.
    pub fn from_parts(parts: Vec<u32>) -> Option<Self> {
        (parts.len() >= 2).then_some(Self(parts))
    }

    pub fn parts(&self) -> &[u32] {
        &self.0
    }

    pub fn is_trunk(&self) -> bool {
        self.0.len() == 2
    }

    /// True for the even-length `…x.0.y` form used in symbol tables to
    /// declare a branch.
    pub fn is_magic_branch(&self) -> bool {
        let n = self.0.len();
        n >= 4 && n % 2 == 0 && self.0[n - 2] == 0
    }

    /// Decode a magic branch number: `1.4.0.2` becomes `1.4.2`.
    pub fn to_branch_id(&self) -> Option<RevisionNumber> {
        if !self.is_magic_branch() {
            return None;
        }
        let n = self.0.len();
        let mut parts = self.0[..n - 2].to_vec();
        parts.push(self.0[n - 1]);
        Some(Self(parts))
    }

    /// Encode a branch id back into its magic symbol-table form:
    /// `1.4.2` becomes `1.4.0.2`.
    pub fn from_branch_id(branch: &RevisionNumber) -> Option<RevisionNumber> {
        let n = branch.0.len();
        if n < 3 || n % 2 == 0 {
            return None;
        }
        let mut parts = branch.0[..n - 1].to_vec();
        parts.push(0);
        parts.push(branch.0[n - 1]);
        Some(Self(parts))
    }

    /// The revision immediately before this one on the same line of
    /// development. Returns `None` at the first revision of trunk or of a
    /// branch instead of wrapping to a zero component.
    pub fn predecessor(&self) -> Option<RevisionNumber> {
        let last = *self.0.last()?;
        if last <= 1 {
            return None;
        }
        let mut parts = self.0.clone();
        let n = parts.len();
        parts[n - 1] = last - 1;
        Some(Self(parts))
    }

    /// The branch this revision lives on: `1.2.2.3` is on `1.2.2`.
    /// Trunk revisions have no branch id.
    pub fn branch(&self) -> Option<RevisionNumber> {
        if self.0.len() < 4 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// The revision a branch sprouted from: `1.2.2.3` branched at `1.2`.
    pub fn branch_point(&self) -> Option<RevisionNumber> {
        if self.0.len() < 4 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 2].to_vec()))
    }
}

impl fmt::Display for RevisionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", part)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for RevisionNumber {
    type Err = VcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<RevisionNumber> for String {
    fn from(rev: RevisionNumber) -> Self {
        rev.to_string()
    }
}

impl TryFrom<String> for RevisionNumber {
    type Error = VcError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

/// A revision of one file in any backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Revision {
    /// RCS/CVS dotted number
    Rcs(RevisionNumber),
    /// Subversion repository revision
    Svn(u64),
}

impl Revision {
    pub fn parse_rcs(s: &str) -> VcResult<Self> {
        RevisionNumber::parse(s).map(Revision::Rcs)
    }

    pub fn parse_svn(s: &str) -> VcResult<Self> {
        let s = s.strip_prefix('r').unwrap_or(s);
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VcError::InvalidRevision(s.to_string()));
        }
        s.parse::<u64>()
            .map(Revision::Svn)
            .map_err(|_| VcError::InvalidRevision(s.to_string()))
    }

    pub fn as_rcs(&self) -> Option<&RevisionNumber> {
        match self {
            Revision::Rcs(rev) => Some(rev),
            Revision::Svn(_) => None,
        }
    }

    pub fn as_svn(&self) -> Option<u64> {
        match self {
            Revision::Svn(rev) => Some(*rev),
            Revision::Rcs(_) => None,
        }
    }
}

impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Revision::Rcs(a), Revision::Rcs(b)) => a.cmp(b),
            (Revision::Svn(a), Revision::Svn(b)) => a.cmp(b),
            (Revision::Rcs(_), Revision::Svn(_)) => Ordering::Less,
            (Revision::Svn(_), Revision::Rcs(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Rcs(rev) => rev.fmt(f),
            Revision::Svn(rev) => write!(f, "{}", rev),
        }
    }
}

impl FromStr for Revision {
    type Err = VcError;

    /// Dotted strings are RCS/CVS numbers, bare integers are Subversion.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('.') {
            Self::parse_rcs(s)
        } else {
            Self::parse_svn(s)
        }
    }
}

impl From<Revision> for String {
    fn from(rev: Revision) -> Self {
        rev.to_string()
    }
}

impl TryFrom<String> for Revision {
    type Error = VcError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RevisionNumber> for Revision {
    fn from(rev: RevisionNumber) -> Self {
        Revision::Rcs(rev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev(s: &str) -> RevisionNumber {
        RevisionNumber::parse(s).unwrap()
    }

    #[test]
    fn test_parse_accepts_dotted_numbers() {
        assert_eq!(rev("1.4.2.3").parts(), &[1, 4, 2, 3]);
        assert_eq!(rev("1.1").to_string(), "1.1");
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for bad in ["", "1", "1.", ".1", "1..2", "1.a", "-1.2", "1.2 ", "1,2"] {
            assert!(
                matches!(RevisionNumber::parse(bad), Err(VcError::InvalidRevision(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_round_trip_through_display() {
        for s in ["1.1", "1.10", "1.4.2.3", "2.0.4.1.6.2"] {
            let parsed = rev(s);
            assert_eq!(RevisionNumber::parse(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn test_ordering_is_numeric_not_lexical() {
        assert!(rev("1.9") < rev("1.10"));
        assert!(rev("1.2") < rev("1.2.2.1"));
        assert!(rev("1.2.2.1") < rev("1.3"));
        assert_eq!(rev("1.4").cmp(&rev("1.4")), Ordering::Equal);

        let mut revs = vec![rev("1.10"), rev("1.2.2.1"), rev("1.9"), rev("1.2")];
        revs.sort();
        let printed: Vec<String> = revs.iter().map(ToString::to_string).collect();
        assert_eq!(printed, vec!["1.2", "1.2.2.1", "1.9", "1.10"]);
    }

    #[test]
    fn test_branch_id_decoding() {
        assert_eq!(rev("1.4.0.2").to_branch_id(), Some(rev("1.4.2")));
        assert_eq!(rev("1.4.2.3.0.4").to_branch_id(), Some(rev("1.4.2.3.4")));
        assert_eq!(rev("1.4.2").to_branch_id(), None);
        assert_eq!(rev("1.4.2.2").to_branch_id(), None);
        assert_eq!(rev("1.0").to_branch_id(), None);
    }

    #[test]
    fn test_branch_id_encoding_inverts_decoding() {
        let magic = rev("1.4.0.2");
        let branch = magic.to_branch_id().unwrap();
        assert_eq!(RevisionNumber::from_branch_id(&branch), Some(magic));
        assert_eq!(RevisionNumber::from_branch_id(&rev("1.4")), None);
    }

    #[test]
    fn test_predecessor_stops_at_first_revision() {
        assert_eq!(rev("1.4").predecessor(), Some(rev("1.3")));
        assert_eq!(rev("1.2.2.3").predecessor(), Some(rev("1.2.2.2")));
        // First revision on trunk and on a branch have no predecessor.
        assert_eq!(rev("1.1").predecessor(), None);
        assert_eq!(rev("1.2.2.1").predecessor(), None);
        assert_eq!(rev("1.0").predecessor(), None);
    }

    #[test]
    fn test_branch_and_branch_point() {
        assert_eq!(rev("1.2.2.3").branch(), Some(rev("1.2.2")));
        assert_eq!(rev("1.2.2.3").branch_point(), Some(rev("1.2")));
        assert_eq!(rev("1.7").branch(), None);
        assert_eq!(rev("1.7").branch_point(), None);
        assert!(rev("1.7").is_trunk());
    }

    #[test]
    fn test_revision_parsing_by_shape() {
        assert_eq!("1.3".parse::<Revision>().unwrap(), Revision::Rcs(rev("1.3")));
        assert_eq!("42".parse::<Revision>().unwrap(), Revision::Svn(42));
        assert_eq!(Revision::parse_svn("r42").unwrap(), Revision::Svn(42));
        assert!(Revision::parse_svn("1.3").is_err());
        assert!(Revision::parse_rcs("42").is_err());
    }

    #[test]
    fn test_revision_serializes_as_string() {
        let json = serde_json::to_string(&Revision::Rcs(rev("1.4.2.1"))).unwrap();
        assert_eq!(json, "\"1.4.2.1\"");
        let back: Revision = serde_json::from_str("\"17\"").unwrap();
        assert_eq!(back, Revision::Svn(17));
    }
}
