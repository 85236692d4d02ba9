use std::sync::Arc;

/// One resolved product: its checked-out commit, derived version and immediate
/// dependencies.
///
/// Products are immutable once built. A product reached through several paths
/// of the graph is a single node shared by every dependent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub name: String,
    /// Full commit id of the checked-out source
    pub commit: String,
    /// Base version plus dependency-set suffix
    pub version: String,
    /// Immediate dependencies, in declaration order
    pub dependencies: Vec<Arc<Product>>,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        commit: impl Into<String>,
        version: impl Into<String>,
        dependencies: Vec<Arc<Product>>,
    ) -> Self {
        Self {
            name: name.into(),
            commit: commit.into(),
            version: version.into(),
            dependencies,
        }
    }

    /// Names of the immediate dependencies, in declaration order.
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|d| d.name.as_str())
    }
}
