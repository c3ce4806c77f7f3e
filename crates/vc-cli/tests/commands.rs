// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::sync::Arc;

use vc_backends::{Repository, RepositoryConfig};
use vc_cli::{Cli, Parser};
use vc_core::test_helpers::ScriptedRunner;
use vc_core::{BackendKind, VcError};

const SVN_LOG: &str = "\
------------------------------------------------------------------------
r42 | carol | 2024-03-01 12:00:00 +0000 (Fri, 01 Mar 2024) | 1 line
Changed paths:
   M /trunk/src/foo.c

Tighten bounds check
------------------------------------------------------------------------
r3 | alice | 2024-01-01 12:00:00 +0000 (Mon, 01 Jan 2024) | 1 line
Changed paths:
   A /trunk/src/foo.c

Initial import
------------------------------------------------------------------------
";

fn svn_repo(runner: &Arc<ScriptedRunner>) -> Repository {
    let config = RepositoryConfig::new("svn", BackendKind::Svn, "svn://host/repo/trunk");
    Repository::with_runner(&config, runner.clone(), None).unwrap()
}

fn run(repo: &Repository, args: &[&str]) -> anyhow::Result<String> {
    let mut argv = vec!["vcb"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv)?;
    let mut out = Vec::new();
    cli.command.run(repo, cli.json, &mut out)?;
    Ok(String::from_utf8(out)?)
}

#[test]
fn log_prints_every_revision() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("svn", SVN_LOG);
    let repo = svn_repo(&runner);

    let text = run(&repo, &["log", "src/foo.c"]).unwrap();
    assert!(text.starts_with("file: src/foo.c\nhead: 42\n"));
    assert!(text.contains("revision 42\n"));
    assert!(text.contains("author: carol;"));
    assert!(text.contains("   M /trunk/src/foo.c\n"));
    assert!(text.contains("Initial import\n"));

    let call = &runner.calls_to("svn")[0];
    assert!(!call.args_lossy().iter().any(|a| a == "--limit"));
}

#[test]
fn ls_lists_directories_then_files() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("svn", "lib/\nfoo.c\n");
    runner.respond_stdout("svn", SVN_LOG);
    let repo = svn_repo(&runner);

    let text = run(&repo, &["ls", "src", "--quick"]).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "lib/");
    assert!(lines[1].starts_with("foo.c"));
    assert!(lines[1].contains("2024-03-01"));
    assert!(lines[1].ends_with("Tighten bounds check"));
}

#[test]
fn patchsets_as_json() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("svn", SVN_LOG);
    let repo = svn_repo(&runner);

    let text = run(&repo, &["patchsets", "src/foo.c", "--json"]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    let ids: Vec<u64> = value["patchsets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|ps| ps["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 42]);
    assert_eq!(value["patchsets"][0]["members"][0]["from"], "INITIAL");
}

#[test]
fn diff_and_cat_pass_tool_output_through() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.respond_stdout("svn", SVN_LOG);
    runner.respond_stdout("svn", "@@ -1 +1 @@\n-old\n+new\n");
    let repo = svn_repo(&runner);

    let text = run(
        &repo,
        &["diff", "src/foo.c", "3", "r42", "--kind", "unified", "--ignore-whitespace"],
    )
    .unwrap();
    assert_eq!(text, "@@ -1 +1 @@\n-old\n+new\n");
    let diff_call = runner.calls_to("svn").pop().unwrap();
    assert!(diff_call.args_lossy().iter().any(|a| a == "3:42"));
    assert!(diff_call.args_lossy().iter().any(|a| a == "-bB -p --unified=3"));

    runner.respond_stdout("svn", SVN_LOG);
    runner.respond_stdout("svn", "int main(void);\n");
    let text = run(&repo, &["cat", "src/foo.c", "42"]).unwrap();
    assert_eq!(text, "int main(void);\n");
}

#[test]
fn dotted_revision_is_rejected_before_running_svn() {
    let runner = Arc::new(ScriptedRunner::new());
    let repo = svn_repo(&runner);

    let err = run(&repo, &["cat", "src/foo.c", "1.2"]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VcError>(),
        Some(VcError::InvalidRevision(_))
    ));
    assert!(runner.calls().is_empty());
}

#[test]
fn locking_is_unsupported_on_subversion() {
    let runner = Arc::new(ScriptedRunner::new());
    let repo = svn_repo(&runner);

    let err = run(&repo, &["lock", "src/foo.c"]).unwrap_err();
    assert_eq!(err.to_string(), "Failed to lock src/foo.c");
    assert!(matches!(
        err.downcast_ref::<VcError>(),
        Some(VcError::Unsupported { .. })
    ));
}
