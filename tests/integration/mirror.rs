//! Source mirroring through the `fetch` command and the library API.

use anyhow::Result;

use buildprep::mirror::{ProductSource, SourceMirror};
use buildprep::source::{RepoSpec, RepositoryDirectory, SourceResolver};

use crate::common::TestWorkspace;

#[test]
fn test_fetch_prints_ref_and_commit() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let afw = ws.create_product("afw", &[])?;

    let output = ws.run_buildprep(&["fetch", "afw"])?;
    output.assert_success();
    assert_eq!(output.stdout.trim(), format!("afw master {}", afw.head()?));
    assert!(ws.build_path().join("afw/ups/afw.table").exists());
    Ok(())
}

#[test]
fn test_requested_branch_preferred_where_present() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let afw = ws.create_product("afw", &[])?;
    afw.create_branch("tickets/DM-1")?;
    afw.write_file("ticket.txt", "work")?;
    afw.commit_all("Ticket work")?;
    let ticket_head = afw.head()?;
    let base = ws.create_product("base", &[])?;

    let output = ws.run_buildprep(&["fetch", "afw", "base", "--ref", "tickets/DM-1"])?;
    output.assert_success();
    let lines: Vec<&str> = output.stdout.lines().collect();
    assert_eq!(lines, vec![
        format!("afw tickets/DM-1 {ticket_head}"),
        format!("base master {}", base.head()?),
    ]);
    Ok(())
}

#[test]
fn test_refetch_follows_upstream_and_cleans() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let afw = ws.create_product("afw", &[])?;
    ws.run_buildprep(&["fetch", "afw"])?.assert_success();

    let slot = ws.build_path().join("afw");
    std::fs::write(slot.join("residue.o"), "obj")?;
    std::fs::create_dir_all(slot.join("_build"))?;
    std::fs::write(slot.join("README"), "locally modified")?;

    afw.write_file("NEWS", "upstream")?;
    afw.commit_all("Upstream change")?;

    let output = ws.run_buildprep(&["fetch", "afw"])?;
    output.assert_success();
    assert!(output.stdout.contains(&afw.head()?));
    assert!(slot.join("NEWS").exists());
    assert!(!slot.join("residue.o").exists());
    assert!(!slot.join("_build").exists());
    assert_eq!(std::fs::read_to_string(slot.join("README"))?, "afw\n");
    Ok(())
}

#[test]
fn test_no_fetch_uses_existing_copy() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let afw = ws.create_product("afw", &[])?;
    let first = afw.head()?;
    ws.run_buildprep(&["fetch", "afw"])?.assert_success();

    afw.write_file("NEWS", "upstream")?;
    afw.commit_all("Upstream change")?;

    let output = ws.run_buildprep(&["fetch", "afw", "--no-fetch"])?;
    output.assert_success();
    assert_eq!(output.stdout.trim(), format!("afw master {first}"));
    Ok(())
}

#[test]
fn test_origin_pinning_replaces_foreign_copy() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let real = ws.create_product("afw", &[])?;
    let fork = ws.create_product("afw_fork", &[])?;

    // First mirror afw from the fork's URL via the repository directory.
    let mut directory = RepositoryDirectory::new();
    directory.insert(
        "afw",
        RepoSpec {
            url: ws.remote_url("afw_fork"),
            git_ref: "master".into(),
            lfs: false,
        },
    );
    let mut from_fork = SourceMirror::new(ws.build_path(), SourceResolver::new(directory, None, vec![]));
    assert_eq!(from_fork.fetch("afw")?.commit, fork.head()?);

    // The pattern alone no longer lists the fork, so the copy is replaced.
    let mut from_pattern = SourceMirror::new(
        ws.build_path(),
        SourceResolver::new(RepositoryDirectory::new(), Some(&ws.pattern()), vec![]),
    );
    let fetched = from_pattern.fetch("afw")?;
    assert_eq!(fetched.commit, real.head()?);
    assert!(fetched.source_dir.join("ups/afw.table").exists());
    assert!(!fetched.source_dir.join("ups/afw_fork.table").exists());
    Ok(())
}

#[test]
fn test_fetch_missing_ref_fails() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let afw = ws.create_product("afw", &[])?;
    afw.create_branch("main")?;
    // Drop master from the remote so no candidate ref resolves.
    let remote = ws.remotes_path().join("afw.git");
    let status = std::process::Command::new("git")
        .args(["symbolic-ref", "HEAD", "refs/heads/main"])
        .current_dir(&remote)
        .status()?;
    assert!(status.success());
    let status = std::process::Command::new("git")
        .args(["branch", "-D", "master"])
        .current_dir(&remote)
        .status()?;
    assert!(status.success());

    let output = ws.run_buildprep(&["fetch", "afw"])?;
    output.assert_failure().assert_stderr_contains("no matching ref");
    Ok(())
}
