// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Repository-level behaviour of the backends against scripted tool output.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use vc_backends::{Repository, RepositoryConfig};
use vc_core::test_helpers::ScriptedRunner;
use vc_core::{
    BackendKind, BrowseOptions, DiffKind, DiffRequest, HistoryOptions, MemoryCache,
    PatchsetRevision, Revision, SortBy, SortOrder, VcCache, VcError,
};

const RLOG_FOO: &str = include_str!("fixtures/rlog_foo.txt");
const SVN_LOG_FOO: &str = include_str!("fixtures/svn_log_foo.txt");
const CVS_ANNOTATE: &str = include_str!("fixtures/cvs_annotate.txt");
const CVSPS_SRC: &str = include_str!("fixtures/cvsps_src.txt");

fn rev(s: &str) -> Revision {
    Revision::parse_rcs(s).unwrap()
}

fn set_mtime(path: &Path, when: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(when)
        .unwrap();
}

/// A sourceroot with `src/foo.c,v` and `src/Attic/old.c,v`, archives dated
/// a minute in the past.
fn archive_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("Attic")).unwrap();
    fs::create_dir_all(src.join("lib")).unwrap();
    let past = SystemTime::now() - Duration::from_secs(60);
    for archive in [src.join("foo.c,v"), src.join("Attic/old.c,v")] {
        fs::write(&archive, "").unwrap();
        set_mtime(&archive, past);
    }
    dir
}

fn open(
    kind: BackendKind,
    sourceroot: &str,
    runner: &Arc<ScriptedRunner>,
    cache: Option<Arc<dyn VcCache>>,
) -> Repository {
    let config = RepositoryConfig::new("test", kind, sourceroot);
    Repository::with_runner(&config, runner.clone(), cache).unwrap()
}

fn root_of(dir: &tempfile::TempDir) -> String {
    dir.path().to_string_lossy().into_owned()
}

#[test]
fn rlog_history_has_every_revision_newest_first() {
    let tree = archive_tree();
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("rlog", RLOG_FOO);
    let repo = open(BackendKind::Cvs, &root_of(&tree), &runner, None);

    let history = repo.file_history("src/foo.c", &HistoryOptions::default()).unwrap();
    let order: Vec<String> = history.revisions().iter().map(ToString::to_string).collect();
    assert_eq!(order, vec!["1.3", "1.2.2.1", "1.2", "1.1"]);
    assert_eq!(history.logs().len(), 4);
    assert_eq!(history.head(), Some(&rev("1.3")));
    assert_eq!(history.tags_for(&rev("1.3")), &["RELEASE_1_0", "STABLE"]);
    assert_eq!(history.previous_revision(&rev("1.3")), Some(rev("1.2")));
    assert_eq!(history.previous_revision(&rev("1.2.2.1")), None);
    assert_eq!(history.previous_revision(&rev("1.1")), None);
    assert_eq!(history.last_log().unwrap().author, "carol");

    let args = runner.calls_to("rlog")[0].args_lossy();
    assert_eq!(args.len(), 1);
    assert!(args[0].ends_with("src/foo.c,v"));
}

#[test]
fn cached_history_is_reused_until_the_archive_changes() {
    let tree = archive_tree();
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("rlog", RLOG_FOO);
    let cache: Arc<dyn VcCache> = Arc::new(MemoryCache::new());
    let repo = open(BackendKind::Rcs, &root_of(&tree), &runner, Some(cache));

    let first = repo.file_history("src/foo.c", &HistoryOptions::default()).unwrap();
    let second = repo.file_history("src/foo.c", &HistoryOptions::default()).unwrap();
    assert_eq!(first, second);
    assert_eq!(runner.call_count("rlog"), 1);

    // A quick log is cached separately.
    repo.file_history("src/foo.c", &HistoryOptions { quicklog: true })
        .unwrap();
    assert_eq!(runner.call_count("rlog"), 2);
    assert_eq!(runner.calls_to("rlog")[1].args_lossy()[0], "-r");

    set_mtime(
        &tree.path().join("src/foo.c,v"),
        SystemTime::now() + Duration::from_secs(3600),
    );
    repo.file_history("src/foo.c", &HistoryOptions::default()).unwrap();
    assert_eq!(runner.call_count("rlog"), 3);
}

#[test]
fn unparseable_history_is_not_cached() {
    let tree = archive_tree();
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("rlog", &RLOG_FOO.replace("date: 2024/03/01", "date: soon"));
    let cache = Arc::new(MemoryCache::new());
    let repo = open(BackendKind::Rcs, &root_of(&tree), &runner, Some(cache.clone()));

    let err = repo.file_history("src/foo.c", &HistoryOptions::default()).unwrap_err();
    assert!(matches!(err, VcError::Parse { .. }));
    assert!(cache.is_empty());
}

#[test]
fn garbage_rlog_output_is_not_cached() {
    let tree = archive_tree();
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("rlog", "rlog: src/foo.c,v: unexpected end of file\n");
    let cache = Arc::new(MemoryCache::new());
    let repo = open(BackendKind::Cvs, &root_of(&tree), &runner, Some(cache.clone()));

    let err = repo.file_history("src/foo.c", &HistoryOptions::default()).unwrap_err();
    assert!(matches!(err, VcError::Parse { tool: "rlog", .. }));
    assert!(cache.is_empty());

    runner.respond_stdout("rlog", RLOG_FOO);
    repo.file_history("src/foo.c", &HistoryOptions::default()).unwrap();
    assert_eq!(runner.call_count("rlog"), 2);
    assert_eq!(cache.len(), 1);
}

#[test]
fn cvs_browse_merges_attic_on_request() {
    let tree = archive_tree();
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("rlog", RLOG_FOO);
    let repo = open(BackendKind::Cvs, &root_of(&tree), &runner, None);

    let plain = repo.list_directory("src", &BrowseOptions::default()).unwrap();
    assert_eq!(plain.directories, vec!["lib"]);
    assert_eq!(plain.files.len(), 1);
    assert!(plain.merged_files.is_none());

    let options = BrowseOptions {
        show_attic: true,
        sort: SortBy::Name,
        order: SortOrder::Descending,
        ..BrowseOptions::default()
    };
    let listing = repo.list_directory("src", &options).unwrap();
    let names: Vec<&str> = listing.file_list(true).iter().map(|f| f.name()).collect();
    assert_eq!(names, vec!["old.c", "foo.c"]);
    let attic = &listing.attic_files.as_ref().unwrap()[0];
    assert!(attic.is_attic());
    assert_eq!(attic.module_path(), "src/old.c");
    assert!(attic.full_path().ends_with("src/Attic/old.c,v"));
}

#[test]
fn rcs_diff_uses_flag_template() {
    let tree = archive_tree();
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("rlog", RLOG_FOO);
    runner.respond_status("rcsdiff", "--- foo.c\n+++ foo.c\n@@ -1 +1 @@\n-a\n+b\n", 1);
    let repo = open(BackendKind::Rcs, &root_of(&tree), &runner, None);

    let file = repo.file_history("src/foo.c", &HistoryOptions::default()).unwrap();
    let request = DiffRequest::new(rev("1.2"), rev("1.3"))
        .kind(DiffKind::Unified)
        .show_whitespace(false);
    let lines = repo.diff(&file, &request).unwrap();
    assert_eq!(lines.len(), 5);

    let args = runner.calls_to("rcsdiff")[0].args_lossy();
    assert_eq!(&args[..6], &["-kk", "-bB", "-p", "--unified=3", "-r1.2", "-r1.3"]);
}

#[test]
fn checkout_streams_content_after_header() {
    let tree = archive_tree();
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("rlog", RLOG_FOO);
    let repo = open(BackendKind::Cvs, &root_of(&tree), &runner, None);
    let file = repo.file_history("src/foo.c", &HistoryOptions::default()).unwrap();

    runner.respond_stdout(
        "co",
        &format!("{}  -->  standard output\nrevision 1.3\nint x;\n", file.full_path()),
    );
    let mut content = String::new();
    repo.checkout(&file, &rev("1.3"))
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "int x;\n");

    runner.respond_stdout("co", "/elsewhere/bar.c,v  -->  standard output\nrevision 1.3\n");
    assert!(matches!(
        repo.checkout(&file, &rev("1.3")),
        Err(VcError::UnexpectedOutput(_))
    ));
}

#[test]
fn cvs_annotate_over_server_protocol() {
    let tree = archive_tree();
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("rlog", RLOG_FOO);
    runner.respond_stdout("cvs", CVS_ANNOTATE);
    let repo = open(BackendKind::Cvs, &root_of(&tree), &runner, None);
    let file = repo.file_history("src/foo.c", &HistoryOptions::default()).unwrap();

    let lines = repo.annotate(&file, &rev("1.2")).unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].revision, rev("1.2"));
    assert_eq!(lines[0].author, "alice");
    assert_eq!(lines[0].line, "hello");
    assert_eq!(lines[0].line_number, 1);
}

#[test]
fn cvs_patchsets_from_cvsps() {
    let tree = archive_tree();
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("rlog", RLOG_FOO);
    runner.respond_stdout("cvsps", CVSPS_SRC);
    let cache: Arc<dyn VcCache> = Arc::new(MemoryCache::new());
    let repo = open(BackendKind::Cvs, &root_of(&tree), &runner, Some(cache));
    let file = repo.file_history("src/foo.c", &HistoryOptions::default()).unwrap();

    let log = repo.patchsets(&file).unwrap();
    assert_eq!(log.patchsets.len(), 2);
    let release = log.get(4).unwrap();
    assert_eq!(release.tag.as_deref(), Some("RELEASE_1_0"));
    assert_eq!(release.members[1].from, PatchsetRevision::Initial);

    repo.patchsets(&file).unwrap();
    assert_eq!(runner.call_count("cvsps"), 1);
}

#[test]
fn svn_history_and_patchsets() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("svn", SVN_LOG_FOO);
    let repo = open(BackendKind::Svn, "https://svn.example.org/repo", &runner, None);

    let history = repo.file_history("trunk/src/foo.c", &HistoryOptions::default()).unwrap();
    assert_eq!(
        history.revisions(),
        &[Revision::Svn(42), Revision::Svn(17), Revision::Svn(3)]
    );
    assert_eq!(
        history.log(&Revision::Svn(17)).unwrap().message,
        "Add parser\n\nCovers the common cases."
    );
    assert_eq!(history.previous_revision(&Revision::Svn(42)), Some(Revision::Svn(17)));

    let log = repo.patchsets(&history).unwrap();
    let ids: Vec<u64> = log.patchsets.iter().map(|ps| ps.id).collect();
    assert_eq!(ids, vec![3, 17, 42]);

    let initial = &log.get(3).unwrap().members[0];
    assert_eq!(initial.from, PatchsetRevision::Initial);
    let latest = log.get(42).unwrap();
    assert_eq!(latest.members[0].from, PatchsetRevision::Revision(Revision::Svn(41)));
    assert_eq!(latest.members[1].file, "/trunk/src/legacy.c");
    assert_eq!(latest.members[1].from, PatchsetRevision::Revision(Revision::Svn(42)));
    assert_eq!(latest.members[1].to, PatchsetRevision::Dead(None));
    assert_eq!(latest.members[0].to, PatchsetRevision::Revision(Revision::Svn(42)));
}

#[test]
fn revisions_of_the_wrong_kind_never_spawn() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("svn", SVN_LOG_FOO);
    let repo = open(BackendKind::Svn, "https://svn.example.org/repo", &runner, None);
    let history = repo.file_history("trunk/src/foo.c", &HistoryOptions::default()).unwrap();
    let before = runner.calls().len();

    assert!(matches!(
        repo.diff(&history, &DiffRequest::new(rev("1.1"), rev("1.2"))),
        Err(VcError::InvalidRevision(_))
    ));
    assert!(matches!(
        repo.checkout(&history, &rev("1.1")),
        Err(VcError::InvalidRevision(_))
    ));
    assert!(repo.parse_revision("1.x").is_err());
    assert_eq!(runner.calls().len(), before);
}
