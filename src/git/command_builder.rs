//! Builder for invocations of the system `git` binary.
//!
//! All repository access in this crate goes through the `git` command line, the
//! same way a user would drive it, so credential helpers, SSH configuration and
//! LFS filters configured on the machine apply unchanged.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::core::BuildError;

/// A single git invocation under construction.
#[derive(Debug, Default, Clone)]
pub struct GitCommand {
    args: Vec<OsString>,
    config: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
    env_set: Vec<(String, String)>,
    env_remove: Vec<String>,
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Pass `-c key=value` ahead of the subcommand.
    #[must_use]
    pub fn config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_set.push((key.into(), value.into()));
        self
    }

    /// Strip a variable inherited from the calling environment.
    #[must_use]
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    fn display_args(&self) -> String {
        self.args.iter().map(|a| a.to_string_lossy().into_owned()).collect::<Vec<_>>().join(" ")
    }

    pub(crate) fn build(&self) -> Command {
        let mut cmd = Command::new("git");
        for (key, value) in &self.config {
            cmd.arg("-c").arg(format!("{key}={value}"));
        }
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        for key in &self.env_remove {
            cmd.env_remove(key);
        }
        for (key, value) in &self.env_set {
            cmd.env(key, value);
        }
        cmd
    }

    /// Run the command and return its raw output, whatever the exit status.
    pub fn output(&self) -> Result<Output> {
        tracing::debug!(
            "git {} (in {})",
            self.display_args(),
            self.current_dir.as_deref().map_or_else(|| ".".into(), |d| d.display().to_string())
        );
        self.build()
            .output()
            .with_context(|| format!("Failed to spawn `git {}`; is git installed?", self.display_args()))
    }

    /// Run the command, failing with [`BuildError::Git`] on a non-zero exit.
    pub fn execute(&self) -> Result<Output> {
        let output = self.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(BuildError::Git {
                command: self.display_args(),
                stderr,
            }
            .into());
        }
        Ok(output)
    }

    /// Run the command and return its trimmed standard output.
    pub fn execute_stdout(&self) -> Result<String> {
        let output = self.execute()?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run the command, discarding its output.
    pub fn execute_success(&self) -> Result<()> {
        self.execute().map(|_| ())
    }
}
