//! Common test utilities and fixtures for buildprep integration tests
//!
//! # Quick Start Guide
//!
//! ```rust,ignore
//! let ws = TestWorkspace::new()?;
//! ws.create_product("base", &[])?;
//! ws.create_product("afw", &["setupRequired(base)"])?;
//! ws.run_buildprep(&["prepare", "afw"])?.assert_success();
//! ```
//!
//! Every product is a working repository under `sources/<name>` whose `origin`
//! is a bare repository at `remotes/<name>.git`. Commits made through
//! [`TestProductRepo::commit_all`] are pushed immediately, so the remote always
//! matches the working repository. [`TestWorkspace::pattern`] points the
//! mirror at the bare remotes.
//!
//! ## Helper Method Summary
//!
//! ### TestWorkspace
//! - `new()` - Temp workspace with `sources/`, `remotes/` and `build/`
//! - `create_product(name, table_lines)` - Product repo with a `ups/<name>.table`
//! - `init_version_db()` - Empty registry repository
//! - `run_buildprep(args)` - Run the CLI with `--build-dir` and pattern preset
//!
//! ### TestProductRepo
//! - `write_file(path, content)`, `commit_all(message)`, `tag(name)`,
//!   `create_branch(name)`, `head()`
//!
//! ### Assertions
//! - `CommandOutput::assert_success()` / `assert_failure()`
//! - `CommandOutput::assert_stdout_contains(text)` / `assert_stderr_contains(text)`

// Allow dead code because these utilities are used across different test files
// and not all utilities are used in every test file
#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Git command builder for tests
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    /// Create a new TestGit instance for the given repository path
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Initialize a new git repository with `master` as the initial branch
    pub fn init(&self) -> Result<()> {
        self.run_git_command(&["init", "-q", "-b", "master"], "Failed to initialize git repository")?;
        Ok(())
    }

    /// Initialize a bare repository
    pub fn init_bare(&self) -> Result<()> {
        self.run_git_command(&["init", "-q", "--bare", "-b", "master"], "Failed to initialize bare repository")?;
        Ok(())
    }

    /// Configure git user for tests
    pub fn config_user(&self) -> Result<()> {
        self.run_git_command(
            &["config", "user.email", "test@buildprep.example"],
            "Failed to configure git user email",
        )?;

        self.run_git_command(
            &["config", "user.name", "Test User"],
            "Failed to configure git user name",
        )?;
        Ok(())
    }

    /// Add all files to staging
    pub fn add_all(&self) -> Result<()> {
        self.run_git_command(&["add", "-A"], "Failed to add files to git")?;
        Ok(())
    }

    /// Create a commit with the given message
    pub fn commit(&self, message: &str) -> Result<()> {
        self.run_git_command(&["commit", "-q", "-m", message], "Failed to create git commit")?;
        Ok(())
    }

    /// Create a lightweight tag
    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", tag_name], &format!("Failed to create tag: {}", tag_name))?;
        Ok(())
    }

    /// Create and checkout a branch
    pub fn create_branch(&self, branch_name: &str) -> Result<()> {
        self.run_git_command(
            &["checkout", "-q", "-b", branch_name],
            &format!("Failed to create branch: {}", branch_name),
        )?;
        Ok(())
    }

    /// Checkout an existing branch
    pub fn checkout(&self, branch_name: &str) -> Result<()> {
        self.run_git_command(
            &["checkout", "-q", branch_name],
            &format!("Failed to checkout branch: {}", branch_name),
        )?;
        Ok(())
    }

    /// Point `origin` at `url`
    pub fn set_origin(&self, url: &str) -> Result<()> {
        self.run_git_command(&["remote", "add", "origin", url], "Failed to add origin")?;
        Ok(())
    }

    /// Push every branch and tag to `origin`
    pub fn push_all(&self) -> Result<()> {
        self.run_git_command(&["push", "-q", "--force", "--all", "origin"], "Failed to push branches")?;
        self.run_git_command(&["push", "-q", "--force", "--tags", "origin"], "Failed to push tags")?;
        Ok(())
    }

    /// Get the current commit hash
    pub fn get_commit_hash(&self) -> Result<String> {
        let output = self.run_git_command(&["rev-parse", "HEAD"], "Failed to get commit hash")?;

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// List tag names
    pub fn tags(&self) -> Result<Vec<String>> {
        let output = self.run_git_command(&["tag", "--list"], "Failed to list tags")?;
        Ok(String::from_utf8_lossy(&output.stdout).lines().map(String::from).collect())
    }

    /// Return the repository path
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Get porcelain status output
    pub fn status_porcelain(&self) -> Result<String> {
        let output =
            self.run_git_command(&["status", "--porcelain"], "Failed to get git status")?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Temporary directory tree holding product repositories and a build area
pub struct TestWorkspace {
    _temp_dir: TempDir, // Keep alive for RAII cleanup
    root: PathBuf,
    sources_dir: PathBuf,
    remotes_dir: PathBuf,
    build_dir: PathBuf,
}

impl TestWorkspace {
    /// Create a new workspace with default structure
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();
        let sources_dir = root.join("sources");
        let remotes_dir = root.join("remotes");
        let build_dir = root.join("build");

        for dir in [&sources_dir, &remotes_dir, &build_dir] {
            std::fs::create_dir_all(dir)?;
        }

        Ok(Self {
            _temp_dir: temp_dir,
            root,
            sources_dir,
            remotes_dir,
            build_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn build_path(&self) -> &Path {
        &self.build_dir
    }

    pub fn remotes_path(&self) -> &Path {
        &self.remotes_dir
    }

    /// `file://` URL of a product's bare remote
    pub fn remote_url(&self, name: &str) -> String {
        format!("file://{}", self.remotes_dir.join(format!("{name}.git")).display())
    }

    /// Repository URL pattern resolving every product to its bare remote
    pub fn pattern(&self) -> String {
        format!("file://{}/%(product)s.git", self.remotes_dir.display())
    }

    /// Create a product whose table file holds `table_lines`, commit it on
    /// `master` and push it to its bare remote
    pub fn create_product(&self, name: &str, table_lines: &[&str]) -> Result<TestProductRepo> {
        let path = self.sources_dir.join(name);
        std::fs::create_dir_all(&path)?;
        let git = TestGit::new(&path);
        git.init()?;
        git.config_user()?;

        let bare = self.remotes_dir.join(format!("{name}.git"));
        std::fs::create_dir_all(&bare)?;
        TestGit::new(&bare).init_bare()?;
        git.set_origin(&self.remote_url(name))?;

        let repo = TestProductRepo {
            name: name.to_string(),
            path,
            git,
        };
        let mut table = table_lines.join("\n");
        table.push('\n');
        repo.write_file(&format!("ups/{name}.table"), &table)?;
        repo.write_file("README", &format!("{name}\n"))?;
        repo.commit_all("Initial commit")?;
        Ok(repo)
    }

    /// Create an empty version registry repository at `<root>/versiondb`
    pub fn init_version_db(&self) -> Result<PathBuf> {
        let path = self.root.join("versiondb");
        std::fs::create_dir_all(&path)?;
        let git = TestGit::new(&path);
        git.init()?;
        git.config_user()?;
        Ok(path)
    }

    /// Run buildprep in the workspace root with the build directory and
    /// repository pattern preset after the subcommand.
    ///
    /// `args[0]` must be the subcommand.
    pub fn run_buildprep(&self, args: &[&str]) -> Result<CommandOutput> {
        let build_dir = self.build_dir.display().to_string();
        let pattern = self.pattern();
        let mut full: Vec<&str> = args.to_vec();
        full.extend(["--build-dir", &build_dir, "--repository-pattern", &pattern]);
        self.run_buildprep_raw(&full)
    }

    /// Run buildprep with exactly `args`
    pub fn run_buildprep_raw(&self, args: &[&str]) -> Result<CommandOutput> {
        let binary = env!("CARGO_BIN_EXE_buildprep");
        let output = Command::new(binary)
            .args(args)
            .current_dir(&self.root)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("BUILDPREP_BUILD_DIR")
            .env_remove("BUILDPREP_VERSION_DB")
            .output()
            .context("Failed to run buildprep")?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

/// A product's working repository, pushed to its bare remote on every commit
pub struct TestProductRepo {
    pub name: String,
    pub path: PathBuf,
    pub git: TestGit,
}

impl TestProductRepo {
    /// Write a file relative to the repository root
    pub fn write_file(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.path.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Replace the table file
    pub fn set_table(&self, table_lines: &[&str]) -> Result<()> {
        let mut table = table_lines.join("\n");
        table.push('\n');
        self.write_file(&format!("ups/{}.table", self.name), &table)
    }

    /// Commit all changes and push
    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git.add_all()?;
        self.git.commit(message)?;
        self.git.push_all()
    }

    /// Tag HEAD and push the tag
    pub fn tag(&self, name: &str) -> Result<()> {
        self.git.tag(name)?;
        self.git.push_all()
    }

    /// Create a branch at HEAD, check it out, and push it
    pub fn create_branch(&self, name: &str) -> Result<()> {
        self.git.create_branch(name)?;
        self.git.push_all()
    }

    pub fn checkout(&self, name: &str) -> Result<()> {
        self.git.checkout(name)
    }

    pub fn head(&self) -> Result<String> {
        self.git.get_commit_hash()
    }
}

/// Command output helper
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Assert the command succeeded
    pub fn assert_success(&self) -> &Self {
        assert!(self.success, "Command failed with code {:?}\nStderr: {}", self.code, self.stderr);
        self
    }

    /// Assert the command exited with status 1
    pub fn assert_failure(&self) -> &Self {
        assert!(!self.success, "Command unexpectedly succeeded\nStdout: {}", self.stdout);
        assert_eq!(self.code, Some(1), "Stderr: {}", self.stderr);
        self
    }

    /// Assert stdout contains the given text
    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Expected stdout to contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    /// Assert stderr contains the given text
    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Expected stderr to contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}
