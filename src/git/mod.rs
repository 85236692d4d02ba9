//! Git operations over a single working tree.
//!
//! [`GitRepo`] wraps the handful of git operations the mirror and the version
//! registry need. Every method is a blocking call to the system `git` binary via
//! [`GitCommand`](command_builder::GitCommand).

pub mod command_builder;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use command_builder::GitCommand;

/// Options for cloning repositories whose content lives in large-file storage.
///
/// LFS clones must never stall on an interactive credential prompt, and the
/// large objects are not needed to resolve refs, so their download is deferred.
const LFS_CLONE_CONFIG: &[(&str, &str)] = &[
    ("filter.lfs.required", "true"),
    ("filter.lfs.smudge", "git-lfs smudge --skip -- %f"),
    ("filter.lfs.process", "git-lfs filter-process --skip"),
    ("credential.interactive", "never"),
    ("core.askPass", "true"),
];

/// Environment variables that would otherwise route credential prompts to a
/// helper program.
const ASKPASS_ENV: &[&str] = &["GIT_ASKPASS", "SSH_ASKPASS"];

/// A git working tree on disk.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn git(&self) -> GitCommand {
        GitCommand::new().current_dir(&self.path)
    }

    /// Whether `path` holds a git working tree (or bare repository) at its top level.
    pub fn is_repository(path: &Path) -> bool {
        path.join(".git").exists() || (path.join("HEAD").is_file() && path.join("objects").is_dir())
    }

    fn clone_command(url: &str, target: &Path, lfs: bool) -> GitCommand {
        let mut cmd = GitCommand::new();
        if lfs {
            for key in ASKPASS_ENV {
                cmd = cmd.env_remove(*key);
            }
            for (key, value) in LFS_CLONE_CONFIG {
                cmd = cmd.config(*key, *value);
            }
            cmd = cmd.env("GIT_LFS_SKIP_SMUDGE", "1").env("GIT_TERMINAL_PROMPT", "0");
        }
        cmd.arg("clone").arg(url).arg(target.as_os_str())
    }

    /// Clone `url` into `target`.
    pub fn clone_from(url: &str, target: &Path, lfs: bool) -> Result<Self> {
        Self::clone_command(url, target, lfs)
            .execute_success()
            .with_context(|| format!("Failed to clone {url}"))?;

        let repo = Self::new(target);
        if lfs {
            // Persist the deferral so later fetches and checkouts behave the same.
            for (key, value) in LFS_CLONE_CONFIG {
                repo.git().args(["config", *key, *value]).execute_success()?;
            }
        }
        Ok(repo)
    }

    /// Create an empty repository at the wrapped path.
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.path)
            .with_context(|| format!("Failed to create {}", self.path.display()))?;
        self.git().arg("init").execute_success()
    }

    /// URL of the `origin` remote, if one is configured.
    pub fn remote_url(&self) -> Result<Option<String>> {
        let output = self.git().args(["config", "--get", "remote.origin.url"]).output()?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
        } else {
            Ok(None)
        }
    }

    /// Fetch every branch and tag of `origin` in one round trip.
    pub fn fetch_all(&self) -> Result<()> {
        self.git()
            .args([
                "fetch",
                "--force",
                "--prune",
                "--tags",
                "origin",
                "+refs/heads/*:refs/remotes/origin/*",
            ])
            .execute_success()
    }

    /// Resolve `rev` to a full commit id, or `None` if it names no commit.
    pub fn resolve_commit(&self, rev: &str) -> Result<Option<String>> {
        let output = self
            .git()
            .args(["rev-parse", "-q", "--verify", &format!("{rev}^{{commit}}")])
            .output()?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
        } else {
            Ok(None)
        }
    }

    pub fn head_commit(&self) -> Result<String> {
        self.git().args(["rev-parse", "HEAD"]).execute_stdout()
    }

    /// Abbreviated commit id of HEAD.
    pub fn head_short(&self, len: usize) -> Result<String> {
        self.git().args(["rev-parse", &format!("--short={len}"), "HEAD"]).execute_stdout()
    }

    /// Name of a tag pointing exactly at HEAD, if any.
    pub fn exact_tag(&self) -> Result<Option<String>> {
        let output = self.git().args(["describe", "--tags", "--exact-match", "HEAD"]).output()?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
        } else {
            Ok(None)
        }
    }

    /// `git checkout -f <rev> --`, discarding local modifications.
    ///
    /// The trailing `--` keeps `rev` from being read as a path.
    pub fn checkout_force(&self, rev: &str) -> Result<()> {
        self.git().args(["checkout", "-q", "-f", rev, "--"]).execute_success()
    }

    /// Point local branch `name` at `start` (creating or resetting it) and
    /// force-check it out.
    pub fn checkout_branch(&self, name: &str, start: &str) -> Result<()> {
        self.git().args(["checkout", "-q", "-f", "-B", name, start, "--"]).execute_success()
    }

    /// Remove every untracked and ignored file and directory.
    pub fn clean_all(&self) -> Result<()> {
        self.git().args(["clean", "-d", "-f", "-f", "-x", "-q"]).execute_success()
    }

    /// Whether the working tree or index has uncommitted changes, including
    /// untracked files.
    pub fn is_dirty(&self) -> Result<bool> {
        let status = self.git().args(["status", "--porcelain"]).execute_stdout()?;
        Ok(!status.is_empty())
    }

    pub fn add_all(&self) -> Result<()> {
        self.git().args(["add", "-A"]).execute_success()
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.git().args(["commit", "-q", "-m", message]).execute_success()
    }

    /// Create an annotated tag at HEAD.
    pub fn tag_annotated(&self, name: &str, message: &str) -> Result<()> {
        self.git().args(["tag", "-a", name, "-m", message]).execute_success()
    }

    pub fn tag_exists(&self, name: &str) -> Result<bool> {
        Ok(self.resolve_commit(&format!("refs/tags/{name}"))?.is_some())
    }

    /// Every tag name in the repository.
    pub fn list_tags(&self) -> Result<Vec<String>> {
        let out = self.git().args(["tag", "--list"]).execute_stdout()?;
        Ok(out.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect())
    }
}
