//! Pruning of optional dependency edges.
//!
//! An exclusion rule pairs a dependency-name pattern with a product-name pattern.
//! An optional dependency `d` of product `p` is dropped when some rule matches
//! both. Required edges are never consulted.
//!
//! Rules file format, one rule per line:
//!
//! ```text
//! # dependency     product
//! afwdata          .*
//! doxygen          base|utils
//! ```
//!
//! Patterns are regular expressions matched against the whole name.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

use crate::core::BuildError;

/// One `(dependency pattern, product pattern)` pair.
#[derive(Debug, Clone)]
pub struct ExclusionRule {
    dependency: Regex,
    product: Regex,
}

impl ExclusionRule {
    pub fn new(dependency_pattern: &str, product_pattern: &str) -> Result<Self> {
        Ok(Self {
            dependency: anchored(dependency_pattern)?,
            product: anchored(product_pattern)?,
        })
    }
}

fn anchored(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
        BuildError::configuration(format!("invalid exclusion pattern '{pattern}': {e}")).into()
    })
}

/// Decides whether an optional edge is excluded, caching the applicable rules
/// per product.
#[derive(Debug, Default)]
pub struct ExclusionResolver {
    rules: Vec<ExclusionRule>,
    per_product: HashMap<String, Vec<usize>>,
}

impl ExclusionResolver {
    pub fn new(rules: Vec<ExclusionRule>) -> Self {
        Self {
            rules,
            per_product: HashMap::new(),
        }
    }

    /// Load rules from a file. A missing path yields an empty rule set only when
    /// `path` is `None`; a named file that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read exclusion rules {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid exclusion rules in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut rules = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let [dependency, product] = tokens.as_slice() else {
                return Err(BuildError::configuration(format!(
                    "line {}: expected '<dependency-pattern> <product-pattern>', found {} field(s)",
                    idx + 1,
                    tokens.len()
                ))
                .into());
            };
            let rule = ExclusionRule::new(dependency, product)
                .with_context(|| format!("line {}", idx + 1))?;
            rules.push(rule);
        }
        Ok(Self::new(rules))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True when some rule matches `product` and `dependency`.
    pub fn is_excluded(&mut self, dependency: &str, product: &str) -> bool {
        let rules = &self.rules;
        let applicable = self.per_product.entry(product.to_string()).or_insert_with(|| {
            rules
                .iter()
                .enumerate()
                .filter(|(_, rule)| rule.product.is_match(product))
                .map(|(i, _)| i)
                .collect()
        });
        applicable.iter().any(|&i| rules[i].dependency.is_match(dependency))
    }
}
