//! The build manifest: every resolved product of one run, in dependency order.
//!
//! A [`Manifest`] is built once from the products discovered by the graph
//! builder. Its order is a topological order of the dependency edges, so every
//! product appears after all of its dependencies. It is later stamped with a
//! build identifier, hashed for idempotent identifier reuse, and written out in
//! the text form below.
//!
//! # Text format
//!
//! ```text
//! # product                 SHA1                                     Version                                  Deps
//! BUILD=b42
//! base                      6f1d9c0c2a0b8e7e3f3d2a8c4b7e1f0a9d8c7b6a 13.0-3-g6f1d9c0
//! utils                     0a1b2c3d4e5f60718293a4b5c6d7e8f901234567 13.0-7-g0a1b2c3+1                      base
//! ```
//!
//! Lines are whitespace-tokenized: `<name> <commit> <version> [<dep>,<dep>...]`.
//! The dependency field is omitted for products without dependencies, and the
//! `BUILD=` value is empty until an identifier has been assigned.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::core::{BuildError, Product};
use crate::utils;

const BUILD_PREFIX: &str = "BUILD=";

/// Ordered, fully versioned record of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    build_id: Option<String>,
    products: IndexMap<String, Arc<Product>>,
}

impl Manifest {
    /// Build a manifest from products in discovery order.
    ///
    /// Products connected by at least one dependency edge are sorted
    /// topologically; products with no edge at all follow in discovery order.
    /// Ties are broken by discovery order, so the result is stable for a fixed
    /// construction order.
    pub fn from_products(discovered: Vec<Arc<Product>>) -> Result<Self> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(discovered.len());
        for (i, product) in discovered.iter().enumerate() {
            if index.insert(product.name.as_str(), i).is_some() {
                return Err(anyhow::anyhow!("product '{}' discovered twice", product.name));
            }
        }

        // (dependency -> dependent) edges
        let mut edges = Vec::new();
        for (dependent, product) in discovered.iter().enumerate() {
            for dep in &product.dependencies {
                let dependency = *index.get(dep.name.as_str()).ok_or_else(|| {
                    anyhow::anyhow!(
                        "dependency '{}' of '{}' is not among the discovered products",
                        dep.name,
                        product.name
                    )
                })?;
                edges.push((dependency, dependent));
            }
        }

        let names: Vec<&str> = discovered.iter().map(|p| p.name.as_str()).collect();
        let order = topological_order(&names, &edges)?;

        let mut products = IndexMap::with_capacity(discovered.len());
        for i in order {
            products.insert(discovered[i].name.clone(), Arc::clone(&discovered[i]));
        }
        Ok(Self {
            build_id: None,
            products,
        })
    }

    pub fn build_id(&self) -> Option<&str> {
        self.build_id.as_deref()
    }

    pub fn set_build_id(&mut self, id: impl Into<String>) {
        self.build_id = Some(id.into());
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Product>> {
        self.products.get(name)
    }

    /// Products in manifest order.
    pub fn products(&self) -> impl Iterator<Item = &Arc<Product>> {
        self.products.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.products.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// SHA-1 over the ordered `(name, commit, version)` triples.
    ///
    /// The digest follows manifest order as constructed, so the same product set
    /// reached through a different root ordering may hash differently.
    pub fn content_hash(&self) -> String {
        let mut data = String::new();
        for p in self.products.values() {
            data.push_str(&p.name);
            data.push('\t');
            data.push_str(&p.commit);
            data.push('\t');
            data.push_str(&p.version);
            data.push('\n');
        }
        utils::sha1_hex(data)
    }

    /// Render the manifest text.
    pub fn to_text(&self) -> String {
        let mut out = format!(
            "# {:<23} {:<40} {:<40} {}\n",
            "product", "SHA1", "Version", "Deps"
        );
        out.push_str(BUILD_PREFIX);
        out.push_str(self.build_id.as_deref().unwrap_or(""));
        out.push('\n');
        for p in self.products.values() {
            let deps = p.dependency_names().collect::<Vec<_>>().join(",");
            let line = format!("{:<25} {:<40} {:<40} {}", p.name, p.commit, p.version, deps);
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }

    /// Parse manifest text. Every dependency must be listed before its dependents.
    pub fn parse(text: &str) -> Result<Self> {
        let mut build_id: Option<Option<String>> = None;
        let mut products: IndexMap<String, Arc<Product>> = IndexMap::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let parse_error = |message: String| BuildError::ManifestParse {
                line: line_no,
                message,
            };
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(id) = line.strip_prefix(BUILD_PREFIX) {
                if build_id.is_some() {
                    return Err(parse_error("duplicate BUILD line".into()).into());
                }
                let id = id.trim();
                build_id = Some((!id.is_empty()).then(|| id.to_string()));
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let (name, commit, version, deps) = match tokens.as_slice() {
                [name, commit, version] => (*name, *commit, *version, ""),
                [name, commit, version, deps] => (*name, *commit, *version, *deps),
                _ => {
                    return Err(parse_error(format!(
                        "expected 3 or 4 fields, found {}",
                        tokens.len()
                    ))
                    .into());
                }
            };
            if products.contains_key(name) {
                return Err(parse_error(format!("product '{name}' listed twice")).into());
            }

            let mut dependencies = Vec::new();
            for dep in deps.split(',').filter(|d| !d.is_empty()) {
                let resolved = products.get(dep).ok_or_else(|| {
                    parse_error(format!("dependency '{dep}' of '{name}' is not listed above it"))
                })?;
                dependencies.push(Arc::clone(resolved));
            }
            products.insert(
                name.to_string(),
                Arc::new(Product::new(name, commit, version, dependencies)),
            );
        }

        Ok(Self {
            build_id: build_id.flatten(),
            products,
        })
    }

    /// Write the manifest text to `path`.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        utils::atomic_write(path, self.to_text().as_bytes())
            .with_context(|| format!("Failed to write manifest {}", path.display()))
    }

    /// Read a manifest written by [`Manifest::to_file`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid manifest {}", path.display()))
    }
}

/// Order `nodes` (given in discovery order) so every edge `(from, to)` has
/// `from` first. Nodes touched by no edge are appended after the sorted ones.
fn topological_order(nodes: &[&str], edges: &[(usize, usize)]) -> Result<Vec<usize>> {
    let mut in_edge = vec![false; nodes.len()];
    let mut indegree = vec![0usize; nodes.len()];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for &(from, to) in edges {
        in_edge[from] = true;
        in_edge[to] = true;
        indegree[to] += 1;
        outgoing[from].push(to);
    }

    let connected: Vec<usize> = (0..nodes.len()).filter(|&i| in_edge[i]).collect();
    let mut ready: BTreeSet<usize> = connected.iter().copied().filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &next in &outgoing[node] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() != connected.len() {
        return Err(BuildError::Dependency {
            cycle: find_cycle(nodes, edges, &indegree),
        }
        .into());
    }

    order.extend((0..nodes.len()).filter(|&i| !in_edge[i]));
    Ok(order)
}

/// Walk from an unsorted node to its unsorted dependencies until a node repeats.
///
/// Every node left with a positive in-degree after sorting has at least one
/// unsorted dependency, so the walk always closes a cycle.
fn find_cycle(nodes: &[&str], edges: &[(usize, usize)], indegree: &[usize]) -> Vec<String> {
    let unsorted = |i: usize| indegree[i] > 0;
    let Some(start) = (0..nodes.len()).find(|&i| unsorted(i)) else {
        return Vec::new();
    };

    let mut path = vec![start];
    loop {
        let current = path[path.len() - 1];
        let Some(&(dependency, _)) =
            edges.iter().find(|&&(from, to)| to == current && unsorted(from))
        else {
            break;
        };
        if let Some(pos) = path.iter().position(|&n| n == dependency) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|&i| nodes[i].to_string()).collect();
            cycle.push(nodes[dependency].to_string());
            return cycle;
        }
        path.push(dependency);
    }
    path.iter().map(|&i| nodes[i].to_string()).collect()
}
