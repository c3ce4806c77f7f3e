// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core model for vcbrowse.
//!
//! This crate holds everything the RCS, CVS and Subversion backends share:
//! dotted revision numbers, the file history and patchset model, the error
//! taxonomy, external process invocation and the result cache. The backends
//! themselves live in `vc-backends`.

pub mod annotate;
pub mod backend;
pub mod cache;
pub mod diff;
pub mod directory;
pub mod error;
pub mod history;
pub mod patchset;
pub mod process;
pub mod revision;
pub mod test_helpers;

pub use annotate::AnnotateLine;
pub use backend::{
    BackendKind, BrowseOptions, CheckInOutcome, CheckInRequest, HistoryOptions, LockInfo,
    VcBackend,
};
pub use cache::{CacheKey, CachePolicy, FileCache, MemoryCache, VcCache};
pub use diff::{DiffKind, DiffRequest};
pub use directory::{DirectoryListing, SortBy, SortOrder};
pub use error::{VcError, VcResult};
pub use history::{
    ChangedPath, FileHistory, FileHistoryBuilder, LogEntry, LogSort, PathAction, RevisionState,
};
pub use patchset::{Patchset, PatchsetLog, PatchsetMember, PatchsetRevision};
pub use process::{ProcessCommand, ProcessOutput, ProcessRunner, StderrMode, SystemRunner};
pub use revision::{Revision, RevisionNumber};
