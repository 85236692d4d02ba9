//! Source mirroring.
//!
//! Every product gets one working copy, `<build_dir>/<product>`, which is
//! brought to the most preferred resolvable ref on each fetch:
//!
//! 1. A copy whose `origin` is not among the product's candidate URLs is
//!    deleted, so a stale or foreign source is never built from.
//! 2. A missing copy is cloned from the first candidate URL that works.
//! 3. All branches and tags are fetched in one round trip (unless disabled),
//!    making every later ref lookup local.
//! 4. Candidate refs are tried in order, each as a remote branch, then a tag,
//!    then as a literal revision.
//! 5. The winner is force-checked-out. A branch winner resets the local branch
//!    of the same name to the fetched commit, since it may have diverged.
//! 6. Untracked and ignored files are removed.
//!
//! Working copies are not locked; two runs sharing a build directory are not
//! supported.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::core::BuildError;
use crate::git::GitRepo;
use crate::source::SourceResolver;

/// A product checked out at a resolved ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSource {
    pub product: String,
    /// The ref name that won resolution.
    pub git_ref: String,
    /// Full commit id checked out.
    pub commit: String,
    pub source_dir: PathBuf,
}

/// Something that can produce a product's source tree.
///
/// [`SourceMirror`] is the real implementation; the graph builder only needs
/// this seam.
pub trait ProductSource {
    fn fetch(&mut self, product: &str) -> Result<FetchedSource>;
}

/// How a candidate ref resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefKind {
    Branch,
    Tag,
    Literal,
}

/// Keeps working copies of products under a build directory.
#[derive(Debug, Clone)]
pub struct SourceMirror {
    build_dir: PathBuf,
    resolver: SourceResolver,
    fetch_updates: bool,
}

impl SourceMirror {
    pub fn new(build_dir: impl AsRef<Path>, resolver: SourceResolver) -> Self {
        Self {
            build_dir: build_dir.as_ref().to_path_buf(),
            resolver,
            fetch_updates: true,
        }
    }

    /// Skip step 3 and resolve refs against whatever the copies already hold.
    pub fn with_fetch_updates(mut self, fetch_updates: bool) -> Self {
        self.fetch_updates = fetch_updates;
        self
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Working-copy location for `product`.
    pub fn slot(&self, product: &str) -> PathBuf {
        self.build_dir.join(product)
    }

    /// Delete the copy at `slot` unless its origin is one of `candidates`.
    fn discard_foreign_copy(&self, product: &str, slot: &Path, candidates: &[String]) -> Result<()> {
        if !slot.exists() {
            return Ok(());
        }
        if !slot.is_dir() {
            return Err(BuildError::configuration(format!(
                "'{}' exists and is not a directory",
                slot.display()
            ))
            .into());
        }

        let origin = if GitRepo::is_repository(slot) {
            GitRepo::new(slot).remote_url()?
        } else {
            None
        };
        if let Some(url) = &origin
            && candidates.iter().any(|c| c == url)
        {
            return Ok(());
        }

        tracing::warn!(
            "{product}: existing copy has origin {}, not one of [{}]; removing it",
            origin.as_deref().unwrap_or("<none>"),
            candidates.join(", ")
        );
        std::fs::remove_dir_all(slot)
            .with_context(|| format!("Failed to remove {}", slot.display()))
    }

    fn clone_first(&self, product: &str, slot: &Path, candidates: &[String]) -> Result<GitRepo> {
        let lfs = self.resolver.is_lfs(product);
        for url in candidates {
            tracing::info!("{product}: cloning {url}");
            match GitRepo::clone_from(url, slot, lfs) {
                Ok(repo) => return Ok(repo),
                Err(e) => {
                    tracing::warn!("{product}: clone from {url} failed: {e:#}");
                    // A failed clone can leave a partial directory behind.
                    if slot.exists()
                        && let Err(e) = std::fs::remove_dir_all(slot)
                    {
                        tracing::warn!(
                            "{product}: could not remove partial clone {}: {e}",
                            slot.display()
                        );
                    }
                }
            }
        }
        Err(BuildError::fetch(
            product,
            format!("could not clone from any of [{}]", candidates.join(", ")),
        )
        .into())
    }

    fn resolve_ref(&self, repo: &GitRepo, product: &str) -> Result<(String, String, RefKind)> {
        let candidates = self.resolver.ref_candidates(product);
        for name in &candidates {
            let attempts = [
                (format!("refs/remotes/origin/{name}"), RefKind::Branch),
                (format!("refs/tags/{name}"), RefKind::Tag),
                (name.clone(), RefKind::Literal),
            ];
            for (rev, kind) in attempts {
                if let Some(commit) = repo.resolve_commit(&rev)? {
                    tracing::debug!("{product}: {name} resolved as {kind:?} to {commit}");
                    return Ok((name.clone(), commit, kind));
                }
            }
        }
        Err(BuildError::fetch(
            product,
            format!("no matching ref among [{}]", candidates.join(", ")),
        )
        .into())
    }
}

impl ProductSource for SourceMirror {
    fn fetch(&mut self, product: &str) -> Result<FetchedSource> {
        if product.is_empty() || product.starts_with('.') || product.contains(['/', '\\']) {
            return Err(BuildError::configuration(format!("invalid product name '{product}'")).into());
        }
        let slot = self.slot(product);
        let origins = self.resolver.origin_candidates(product);
        if origins.is_empty() {
            return Err(BuildError::fetch(
                product,
                "no repository URL configured and no URL pattern given",
            )
            .into());
        }

        self.discard_foreign_copy(product, &slot, &origins)?;
        let repo = if slot.exists() {
            GitRepo::new(&slot)
        } else {
            self.clone_first(product, &slot, &origins)?
        };

        if self.fetch_updates {
            repo.fetch_all()
                .map_err(|e| BuildError::fetch(product, format!("fetch failed: {e:#}")))?;
        }

        let (git_ref, commit, kind) = self.resolve_ref(&repo, product)?;
        match kind {
            RefKind::Branch => {
                repo.checkout_branch(&git_ref, &format!("refs/remotes/origin/{git_ref}"))?
            }
            RefKind::Tag => repo.checkout_force(&format!("refs/tags/{git_ref}"))?,
            RefKind::Literal => repo.checkout_force(&git_ref)?,
        }

        let head = repo.head_commit()?;
        if head != commit {
            return Err(BuildError::consistency(format!(
                "{product}: checked out {head} but {git_ref} resolved to {commit}"
            ))
            .into());
        }
        repo.clean_all()?;

        tracing::info!("{product}: {git_ref} at {commit}");
        Ok(FetchedSource {
            product: product.to_string(),
            git_ref,
            commit,
            source_dir: slot,
        })
    }
}
