// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-file revision history.
//!
//! A [`FileHistory`] is produced in one pass by a backend log parser via
//! [`FileHistoryBuilder`] and is read-only afterwards. Tag and branch
//! lookups go through the history's own maps; log entries never point
//! back at the history that owns them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::revision::{Revision, RevisionNumber};

/// RCS/CVS revision state from the `state:` field of `rlog`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RevisionState {
    #[default]
    Exp,
    Dead,
    Other(String),
}

impl RevisionState {
    pub fn from_rlog(s: &str) -> Self {
        match s {
            "Exp" => RevisionState::Exp,
            "dead" | "Dead" => RevisionState::Dead,
            other => RevisionState::Other(other.to_string()),
        }
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, RevisionState::Dead)
    }
}

impl fmt::Display for RevisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionState::Exp => write!(f, "Exp"),
            RevisionState::Dead => write!(f, "dead"),
            RevisionState::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Action letter of a Subversion changed-path line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathAction {
    Added,
    Deleted,
    Modified,
    Replaced,
}

impl PathAction {
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'A' => Some(PathAction::Added),
            'D' => Some(PathAction::Deleted),
            'M' => Some(PathAction::Modified),
            'R' => Some(PathAction::Replaced),
            _ => None,
        }
    }

    pub fn letter(&self) -> char {
        match self {
            PathAction::Added => 'A',
            PathAction::Deleted => 'D',
            PathAction::Modified => 'M',
            PathAction::Replaced => 'R',
        }
    }
}

/// One path touched by a Subversion revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedPath {
    pub action: PathAction,
    pub path: String,
    /// `(from /trunk/old.c:12)` copy source, verbatim
    pub copied_from: Option<String>,
}

/// A single revision's log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub revision: Revision,
    pub author: String,
    pub date: DateTime<Utc>,
    pub message: String,
    /// Only meaningful for RCS/CVS
    pub state: RevisionState,
    /// `lines: +M -N` summary, RCS/CVS only
    pub changed_lines: Option<String>,
    /// Branches rooted at this revision, from the `branches:` line
    pub branch_points: Vec<RevisionNumber>,
    /// Subversion `-v` changed paths
    pub changed_paths: Vec<ChangedPath>,
}

/// Alternate orderings of a history, applied to a copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSort {
    /// Highest revision number first
    Revision,
    /// Newest commit first
    Age,
    /// Author name, alphabetically
    Author,
}

/// The complete history of one versioned file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHistory {
    name: String,
    directory: String,
    full_path: String,
    head: Option<Revision>,
    revisions: Vec<Revision>,
    logs: BTreeMap<Revision, LogEntry>,
    tag_to_revision: BTreeMap<String, Revision>,
    revision_to_tags: BTreeMap<Revision, Vec<String>>,
    branch_names: BTreeMap<RevisionNumber, String>,
    is_attic: bool,
}

impl FileHistory {
    /// File name without any repository suffix such as `,v`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory relative to the sourceroot, empty for the top level
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Path relative to the sourceroot
    pub fn module_path(&self) -> String {
        if self.directory.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.directory, self.name)
        }
    }

    /// The path handed to the backend tools (`…/foo.c,v`, or a repository URL)
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// `head:` from rlog for RCS/CVS; the newest revision for Subversion
    pub fn head(&self) -> Option<&Revision> {
        self.head.as_ref().or_else(|| self.revisions.first())
    }

    /// Revisions ordered newest commit first
    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn logs(&self) -> &BTreeMap<Revision, LogEntry> {
        &self.logs
    }

    pub fn log(&self, revision: &Revision) -> Option<&LogEntry> {
        self.logs.get(revision)
    }

    pub fn latest_revision(&self) -> Option<&Revision> {
        self.revisions.first()
    }

    pub fn last_log(&self) -> Option<&LogEntry> {
        self.latest_revision().and_then(|rev| self.logs.get(rev))
    }

    pub fn tags(&self) -> &BTreeMap<String, Revision> {
        &self.tag_to_revision
    }

    pub fn tags_for(&self, revision: &Revision) -> &[String] {
        self.revision_to_tags
            .get(revision)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn revision_for_tag(&self, tag: &str) -> Option<&Revision> {
        self.tag_to_revision.get(tag)
    }

    /// Branch id (`1.4.2`) to symbolic branch name
    pub fn branch_names(&self) -> &BTreeMap<RevisionNumber, String> {
        &self.branch_names
    }

    pub fn is_attic(&self) -> bool {
        self.is_attic
    }

    /// Symbolic names of the branches that sprout from `entry`, keyed by name.
    pub fn symbolic_branches(&self, entry: &LogEntry) -> BTreeMap<String, RevisionNumber> {
        symbolic_branches(&self.branch_names, entry)
    }

    /// The revision before `revision`. Dotted revisions use the numeric
    /// predecessor (none at the first revision of trunk or a branch);
    /// Subversion uses the next older revision that touched this file.
    pub fn previous_revision(&self, revision: &Revision) -> Option<Revision> {
        match revision {
            Revision::Rcs(rev) => rev.predecessor().map(Revision::Rcs),
            Revision::Svn(_) => {
                let pos = self.revisions.iter().position(|r| r == revision)?;
                self.revisions.get(pos + 1).cloned()
            }
        }
    }

    /// A copy of the revision list in another order
    pub fn sorted_revisions(&self, by: LogSort) -> Vec<Revision> {
        let mut revs = self.revisions.clone();
        match by {
            LogSort::Revision => revs.sort_by(|a, b| b.cmp(a)),
            LogSort::Age => revs.sort_by(|a, b| self.date_of(b).cmp(&self.date_of(a))),
            LogSort::Author => revs.sort_by(|a, b| self.author_of(a).cmp(self.author_of(b))),
        }
        revs
    }

    fn date_of(&self, revision: &Revision) -> Option<DateTime<Utc>> {
        self.logs.get(revision).map(|log| log.date)
    }

    fn author_of(&self, revision: &Revision) -> &str {
        self.logs
            .get(revision)
            .map(|log| log.author.as_str())
            .unwrap_or("")
    }
}

/// Resolve each `branches:` point of `entry` to its symbolic name.
pub fn symbolic_branches(
    branch_names: &BTreeMap<RevisionNumber, String>,
    entry: &LogEntry,
) -> BTreeMap<String, RevisionNumber> {
    entry
        .branch_points
        .iter()
        .filter_map(|point| {
            // rlog lists branch ids (1.2.2); accept a first branch revision
            // (1.2.2.1) as well since the symbol table is keyed by id.
            let branch = if point.parts().len() % 2 == 1 {
                point.clone()
            } else {
                point.branch()?
            };
            branch_names
                .get(&branch)
                .map(|name| (name.clone(), branch.clone()))
        })
        .collect()
}

/// Accumulates one parse pass into a [`FileHistory`]
#[derive(Debug)]
pub struct FileHistoryBuilder {
    history: FileHistory,
}

impl FileHistoryBuilder {
    pub fn new(
        name: impl Into<String>,
        directory: impl Into<String>,
        full_path: impl Into<String>,
    ) -> Self {
        Self {
            history: FileHistory {
                name: name.into(),
                directory: directory.into(),
                full_path: full_path.into(),
                head: None,
                revisions: Vec::new(),
                logs: BTreeMap::new(),
                tag_to_revision: BTreeMap::new(),
                revision_to_tags: BTreeMap::new(),
                branch_names: BTreeMap::new(),
                is_attic: false,
            },
        }
    }

    pub fn attic(mut self, is_attic: bool) -> Self {
        self.history.is_attic = is_attic;
        self
    }

    pub fn set_head(&mut self, head: Revision) {
        self.history.head = Some(head);
    }

    /// Record a symbolic tag. One revision may carry many tags.
    pub fn add_tag(&mut self, name: &str, revision: Revision) {
        let tags = self.history.revision_to_tags.entry(revision.clone()).or_default();
        if !tags.iter().any(|t| t == name) {
            tags.push(name.to_string());
        }
        self.history.tag_to_revision.insert(name.to_string(), revision);
    }

    /// Record a branch declared by its decoded id. The first name seen wins.
    pub fn add_branch(&mut self, name: &str, branch: RevisionNumber) {
        self.history
            .branch_names
            .entry(branch)
            .or_insert_with(|| name.to_string());
    }

    pub fn push_log(&mut self, entry: LogEntry) {
        let revision = entry.revision.clone();
        if self.history.logs.insert(revision.clone(), entry).is_none() {
            self.history.revisions.push(revision);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.history.revisions.is_empty()
    }

    /// Finish the pass. Revisions are ordered newest commit first; entries
    /// sharing a timestamp keep their log order.
    pub fn build(mut self) -> FileHistory {
        let logs = &self.history.logs;
        self.history
            .revisions
            .sort_by(|a, b| logs[b].date.cmp(&logs[a].date));
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(rev: &str, author: &str, day: u32) -> LogEntry {
        LogEntry {
            revision: rev.parse().unwrap(),
            author: author.to_string(),
            date: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
            message: format!("change {}", rev),
            state: RevisionState::Exp,
            changed_lines: None,
            branch_points: Vec::new(),
            changed_paths: Vec::new(),
        }
    }

    fn rn(s: &str) -> RevisionNumber {
        RevisionNumber::parse(s).unwrap()
    }

    #[test]
    fn test_build_orders_newest_first() {
        let mut builder = FileHistoryBuilder::new("foo.c", "src", "/cvs/src/foo.c,v");
        builder.push_log(entry("1.2.2.1", "carol", 5));
        builder.push_log(entry("1.3", "bob", 9));
        builder.push_log(entry("1.1", "alice", 1));
        let history = builder.build();

        let order: Vec<String> = history.revisions().iter().map(ToString::to_string).collect();
        assert_eq!(order, vec!["1.3", "1.2.2.1", "1.1"]);
        assert_eq!(history.last_log().unwrap().author, "bob");
        assert_eq!(history.module_path(), "src/foo.c");
    }

    #[test]
    fn test_tags_accumulate_per_revision() {
        let mut builder = FileHistoryBuilder::new("foo.c", "", "/cvs/foo.c,v");
        builder.add_tag("RELEASE_1", "1.2".parse().unwrap());
        builder.add_tag("STABLE", "1.2".parse().unwrap());
        builder.add_tag("STABLE", "1.2".parse().unwrap());
        builder.push_log(entry("1.2", "alice", 2));
        let history = builder.build();

        let rev: Revision = "1.2".parse().unwrap();
        assert_eq!(history.tags_for(&rev), &["RELEASE_1", "STABLE"]);
        assert_eq!(history.revision_for_tag("STABLE"), Some(&rev));
        assert!(history.tags_for(&"1.1".parse().unwrap()).is_empty());
    }

    #[test]
    fn test_symbolic_branches_resolve_through_branch_map() {
        let mut builder = FileHistoryBuilder::new("foo.c", "", "/cvs/foo.c,v");
        builder.add_branch("FEATURE", rn("1.2.2"));
        builder.add_branch("SHADOWED", rn("1.2.2"));
        let mut e = entry("1.2", "alice", 2);
        e.branch_points = vec![rn("1.2.2"), rn("1.2.4.1")];
        builder.push_log(e.clone());
        let history = builder.build();

        let branches = history.symbolic_branches(&e);
        assert_eq!(branches.len(), 1);
        assert_eq!(branches.get("FEATURE"), Some(&rn("1.2.2")));
    }

    #[test]
    fn test_previous_revision_per_backend() {
        let mut builder = FileHistoryBuilder::new("foo.c", "", "svn://repo/foo.c");
        builder.push_log(entry("3", "a", 3));
        builder.push_log(entry("7", "a", 7));
        builder.push_log(entry("12", "a", 12));
        let svn = builder.build();
        assert_eq!(svn.previous_revision(&Revision::Svn(7)), Some(Revision::Svn(3)));
        assert_eq!(svn.previous_revision(&Revision::Svn(3)), None);

        let rcs = FileHistoryBuilder::new("foo.c", "", "/cvs/foo.c,v").build();
        assert_eq!(
            rcs.previous_revision(&"1.5".parse().unwrap()),
            Some("1.4".parse().unwrap())
        );
        assert_eq!(rcs.previous_revision(&"1.2.2.1".parse().unwrap()), None);
    }

    #[test]
    fn test_sorted_revisions_returns_copy() {
        let mut builder = FileHistoryBuilder::new("foo.c", "", "/cvs/foo.c,v");
        builder.push_log(entry("1.1", "zed", 9));
        builder.push_log(entry("1.2", "amy", 1));
        let history = builder.build();

        let by_rev: Vec<String> = history
            .sorted_revisions(LogSort::Revision)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(by_rev, vec!["1.2", "1.1"]);

        let by_author = history.sorted_revisions(LogSort::Author);
        assert_eq!(by_author[0].to_string(), "1.2");

        // Stored order is untouched: 1.1 was committed last.
        assert_eq!(history.revisions()[0].to_string(), "1.1");
    }

    #[test]
    fn test_history_survives_json_round_trip() {
        let mut builder = FileHistoryBuilder::new("foo.c", "src", "/cvs/src/foo.c,v");
        builder.set_head("1.2".parse().unwrap());
        builder.add_tag("T1", "1.1".parse().unwrap());
        builder.add_branch("B", rn("1.1.2"));
        builder.push_log(entry("1.1", "alice", 1));
        builder.push_log(entry("1.2", "bob", 2));
        let history = builder.build();

        let bytes = serde_json::to_vec(&history).unwrap();
        let back: FileHistory = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, history);
    }
}
