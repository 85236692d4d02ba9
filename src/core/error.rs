//! Error types for manifest preparation.
//!
//! Every failure in this crate is fatal for the run: a manifest that covers only
//! part of the requested graph is not a valid build input. [`BuildError`] names
//! the failure classes so the CLI (and tests) can tell them apart after they have
//! travelled through `anyhow` context layers.

use colored::Colorize;
use std::fmt;

/// Failure classes of a preparation run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Unusable settings or input files: unwritable build directory, malformed
    /// repository-directory entry, bad exclusion rule.
    #[error("configuration error: {message}")]
    Configuration {
        /// What was wrong
        message: String,
    },

    /// A product could not be mirrored from any candidate origin or ref.
    #[error("failed to fetch '{product}': {message}")]
    Fetch {
        /// Product being fetched
        product: String,
        /// Reason
        message: String,
    },

    /// Local state disagrees with what the run expects to publish or check out.
    #[error("consistency error: {message}")]
    Consistency {
        /// What disagreed
        message: String,
    },

    /// The declared dependency graph contains a cycle.
    #[error("circular dependency: {}", cycle.join(" -> "))]
    Dependency {
        /// Product names along the cycle, first and last entries equal
        cycle: Vec<String>,
    },

    /// A git invocation exited unsuccessfully.
    #[error("git {command} failed: {stderr}")]
    Git {
        /// Arguments passed to git
        command: String,
        /// Captured standard error
        stderr: String,
    },

    /// Manifest text that cannot be parsed.
    #[error("malformed manifest at line {line}: {message}")]
    ManifestParse {
        /// 1-based line number
        line: usize,
        /// Reason
        message: String,
    },
}

impl BuildError {
    /// Shorthand for [`BuildError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for [`BuildError::Fetch`].
    pub fn fetch(product: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            product: product.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`BuildError::Consistency`].
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }
}

/// An error decorated with user guidance for terminal display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error chain
    pub error: anyhow::Error,
    /// What the user can do about it
    pub suggestion: Option<String>,
    /// Additional background
    pub details: Option<String>,
}

impl ErrorContext {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: error.into(),
            suggestion: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, its cause chain and any guidance to stderr.
    pub fn display(&self) {
        eprintln!("{}", self);
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", "error:".red().bold(), self.error)?;
        for cause in self.error.chain().skip(1) {
            write!(f, "\n  {} {}", "caused by:".yellow(), cause)?;
        }
        if let Some(details) = &self.details {
            write!(f, "\n\n{}", details)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\n{} {}", "hint:".cyan().bold(), suggestion)?;
        }
        Ok(())
    }
}

/// Attach suggestions based on the [`BuildError`] found anywhere in the chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let build_error = error.chain().find_map(|e| e.downcast_ref::<BuildError>()).cloned();

    let ctx = ErrorContext::new(error);
    match build_error {
        Some(BuildError::Configuration { .. }) => ctx.with_suggestion(
            "Check the build directory permissions and the repository/exclusion files",
        ),
        Some(BuildError::Fetch { .. }) => ctx
            .with_suggestion("Verify the repository URL patterns and the requested --ref values")
            .with_details("Every candidate origin and ref was tried in order before giving up."),
        Some(BuildError::Consistency { .. }) => ctx
            .with_suggestion(
                "Another run may be using the same version registry; inspect it with `git status`",
            )
            .with_details("The build identifier was not re-tagged and nothing was committed."),
        Some(BuildError::Dependency { .. }) => {
            ctx.with_suggestion("Remove one of the declarations that forms the cycle")
        }
        Some(BuildError::Git { .. }) => {
            ctx.with_suggestion("Re-run with --verbose to see the git command lines")
        }
        Some(BuildError::ManifestParse { .. }) | None => ctx,
    }
}
