//! Core types shared by every stage of a preparation run.
//!
//! - [`BuildError`] - the fatal failure classes (configuration, fetch,
//!   consistency, dependency cycle, git, manifest parse)
//! - [`ErrorContext`] / [`user_friendly_error`] - terminal rendering with hints
//! - [`Product`] - one resolved product node, shared between its dependents
//!
//! # Examples
//!
//! ```rust,no_run
//! use buildprep::core::{BuildError, user_friendly_error};
//!
//! fn run() -> anyhow::Result<()> {
//!     Err(BuildError::configuration("build directory is not writable").into())
//! }
//!
//! if let Err(e) = run() {
//!     user_friendly_error(e).display();
//! }
//! ```

pub mod error;
mod product;

pub use error::{BuildError, ErrorContext, user_friendly_error};
pub use product::Product;

/// Reserved dependency name for products provided by the environment.
pub const IMPLICIT_PRODUCTS: &str = "implicitProducts";
