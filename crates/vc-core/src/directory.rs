// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Directory listings and their sort orders

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::history::FileHistory;

/// Column a listing is sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    None,
    Name,
    Age,
    Author,
    Revision,
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(SortBy::None),
            "name" => Ok(SortBy::Name),
            "age" | "date" => Ok(SortBy::Age),
            "author" => Ok(SortBy::Author),
            "rev" | "revision" => Ok(SortBy::Revision),
            _ => Err(format!(
                "Invalid sort key: {}. Use none, name, age, author or rev",
                s
            )),
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortBy::None => write!(f, "none"),
            SortBy::Name => write!(f, "name"),
            SortBy::Age => write!(f, "age"),
            SortBy::Author => write!(f, "author"),
            SortBy::Revision => write!(f, "rev"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Immediate contents of one repository directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryListing {
    /// Path relative to the sourceroot
    pub path: String,
    pub directories: Vec<String>,
    pub files: Vec<FileHistory>,
    /// CVS only, when the Attic was requested
    pub attic_files: Option<Vec<FileHistory>>,
    /// `files` followed by `attic_files`
    pub merged_files: Option<Vec<FileHistory>>,
}

impl DirectoryListing {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            directories: Vec::new(),
            files: Vec::new(),
            attic_files: None,
            merged_files: None,
        }
    }

    /// Attach the Attic's files and build the merged view.
    pub fn set_attic(&mut self, attic_files: Vec<FileHistory>) {
        let mut merged = self.files.clone();
        merged.extend(attic_files.iter().cloned());
        self.attic_files = Some(attic_files);
        self.merged_files = Some(merged);
    }

    /// The files to display: the merged view when the Attic is shown and
    /// was browsed, the live files otherwise.
    pub fn file_list(&self, show_attic: bool) -> &[FileHistory] {
        match (&self.merged_files, show_attic) {
            (Some(merged), true) => merged,
            _ => &self.files,
        }
    }

    /// Sort every file list in place. Directories always sort by name.
    pub fn apply_sort(&mut self, by: SortBy, order: SortOrder) {
        self.directories
            .sort_by(|a, b| directed(lexical_sort::natural_lexical_cmp(a, b), order));

        sort_files(&mut self.files, by, order);
        if let Some(attic) = self.attic_files.as_mut() {
            sort_files(attic, by, order);
        }
        if let Some(merged) = self.merged_files.as_mut() {
            sort_files(merged, by, order);
        }
    }
}

/// Sort `files` by `by`, in `order`. `SortBy::None` keeps listing order.
pub fn sort_files(files: &mut [FileHistory], by: SortBy, order: SortOrder) {
    if by == SortBy::None {
        return;
    }
    files.sort_by(|a, b| directed(compare_files(a, b, by), order));
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Ascending => ordering,
        SortOrder::Descending => ordering.reverse(),
    }
}

/// Ascending comparison of two files on one column. Ascending age puts the
/// most recently changed file first.
pub fn compare_files(a: &FileHistory, b: &FileHistory, by: SortBy) -> Ordering {
    match by {
        SortBy::None => Ordering::Equal,
        SortBy::Name => a.name().to_lowercase().cmp(&b.name().to_lowercase()),
        SortBy::Age => {
            let da = a.last_log().map(|log| log.date);
            let db = b.last_log().map(|log| log.date);
            db.cmp(&da)
        }
        SortBy::Author => {
            let aa = a.last_log().map(|log| log.author.as_str());
            let ab = b.last_log().map(|log| log.author.as_str());
            aa.cmp(&ab)
        }
        SortBy::Revision => a.head().cmp(&b.head()),
    }
}
