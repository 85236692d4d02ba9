//! Registry strategy across repeated runs of `prepare`.

use anyhow::Result;

use buildprep::manifest::Manifest;

use crate::common::{TestGit, TestWorkspace};

fn prepare_registry(ws: &TestWorkspace, db: &std::path::Path, extra: &[&str]) -> Result<Manifest> {
    let db = db.display().to_string();
    let mut args = vec!["prepare", "afw", "--strategy", "registry", "--version-db", db.as_str()];
    args.extend_from_slice(extra);
    let output = ws.run_buildprep(&args)?;
    output.assert_success();
    Manifest::parse(&output.stdout)
}

#[test]
fn test_rebuild_reuses_versions_and_build_id() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let db = ws.init_version_db()?;
    let base = ws.create_product("base", &[])?;
    base.tag("v1.0")?;
    let afw = ws.create_product("afw", &["setupRequired(base)"])?;
    afw.tag("v5.0")?;

    let first = prepare_registry(&ws, &db, &[])?;
    assert_eq!(first.build_id(), Some("b1"));
    assert_eq!(first.get("base").unwrap().version, "1.0");
    // First dependency set for afw 5.0 gets suffix 0, rendered as nothing.
    assert_eq!(first.get("afw").unwrap().version, "5.0");

    let second = prepare_registry(&ws, &db, &[])?;
    assert_eq!(second, first);

    let registry = TestGit::new(&db);
    assert_eq!(registry.tags()?, vec!["b1"]);
    assert!(registry.status_porcelain()?.is_empty());
    assert!(db.join("manifests/b1.txt").exists());
    let index = std::fs::read_to_string(db.join("manifests/content_sha.db.txt"))?;
    assert_eq!(index.lines().filter(|l| !l.starts_with('#')).count(), 1);
    Ok(())
}

#[test]
fn test_changed_dependency_gets_next_suffix() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let db = ws.init_version_db()?;
    let base = ws.create_product("base", &[])?;
    base.tag("v1.0")?;
    let afw = ws.create_product("afw", &["setupRequired(base)"])?;
    afw.tag("v5.0")?;

    let first = prepare_registry(&ws, &db, &[])?;
    assert_eq!(first.get("afw").unwrap().version, "5.0");

    base.write_file("NEWS", "1.1")?;
    base.commit_all("Release 1.1")?;
    base.tag("v1.1")?;

    let second = prepare_registry(&ws, &db, &[])?;
    assert_eq!(second.build_id(), Some("b2"));
    assert_eq!(second.get("base").unwrap().version, "1.1");
    assert_eq!(second.get("afw").unwrap().version, "5.0+1");

    let ver_db = std::fs::read_to_string(db.join("ver_db/afw.txt"))?;
    let rows: Vec<&str> = ver_db.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("5.0 ") && rows[0].ends_with(" 0"));
    assert!(rows[1].starts_with("5.0 ") && rows[1].ends_with(" 1"));

    let dep_db = std::fs::read_to_string(db.join("dep_db/afw.txt"))?;
    assert!(dep_db.contains("5.0 0 base 1.0"));
    assert!(dep_db.contains("5.0 1 base 1.1"));

    let registry = TestGit::new(&db);
    assert_eq!(registry.tags()?, vec!["b1", "b2"]);
    Ok(())
}

#[test]
fn test_explicit_build_id_collision_is_refused() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let db = ws.init_version_db()?;
    let base = ws.create_product("base", &[])?;
    base.tag("v1.0")?;
    ws.create_product("afw", &["setupRequired(base)"])?;

    prepare_registry(&ws, &db, &["--build-id", "w.2026.42"])?;
    let index_path = db.join("manifests/content_sha.db.txt");
    let index_before = std::fs::read_to_string(&index_path)?;
    let archived_before = std::fs::read_to_string(db.join("manifests/w.2026.42.txt"))?;

    base.write_file("NEWS", "1.1")?;
    base.commit_all("Release 1.1")?;
    base.tag("v1.1")?;

    let db_arg = db.display().to_string();
    let output = ws.run_buildprep(&[
        "prepare",
        "afw",
        "--strategy",
        "registry",
        "--version-db",
        &db_arg,
        "--build-id",
        "w.2026.42",
    ])?;
    output.assert_failure().assert_stderr_contains("consistency error");
    let registry = TestGit::new(&db);
    assert_eq!(registry.tags()?, vec!["w.2026.42"]);
    assert!(registry.status_porcelain()?.is_empty());
    assert_eq!(std::fs::read_to_string(&index_path)?, index_before);
    assert_eq!(std::fs::read_to_string(db.join("manifests/w.2026.42.txt"))?, archived_before);

    // The refused content gets a fresh identifier on the next run.
    let retry = prepare_registry(&ws, &db, &[])?;
    assert_eq!(retry.build_id(), Some("b1"));
    Ok(())
}

#[test]
fn test_registry_must_be_git_repository() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.create_product("afw", &[])?;
    let not_a_repo = ws.root().join("plain");
    std::fs::create_dir_all(&not_a_repo)?;

    let db_arg = not_a_repo.display().to_string();
    let output =
        ws.run_buildprep(&["prepare", "afw", "--strategy", "registry", "--version-db", &db_arg])?;
    output.assert_failure().assert_stderr_contains("not a git repository");
    Ok(())
}
