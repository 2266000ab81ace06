//! Resource dependency graph
//!
//! The reconciliation engine creates resources in whatever order the graph
//! permits, so ordering requirements must be explicit edges, not implicit
//! object references. An edge `(dependent, prerequisite)` means the engine
//! must not attempt to create `dependent` until `prerequisite` has settled.
//!
//! Validation runs before any external declaration is emitted: a cycle or an
//! edge naming an undeclared resource rejects the whole deployment.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{Error, Result};

// =============================================================================
// Resource References
// =============================================================================

/// Kind of a declared resource
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ResourceKind {
    /// Encryption or network security policy
    SecurityPolicy,
    /// Data-access policy
    AccessPolicy,
    /// The search collection
    Collection,
    /// Serverless function binding
    Function,
    /// The HTTP API fronting the functions
    RestApi,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SecurityPolicy => write!(f, "security-policy"),
            Self::AccessPolicy => write!(f, "access-policy"),
            Self::Collection => write!(f, "collection"),
            Self::Function => write!(f, "function"),
            Self::RestApi => write!(f, "rest-api"),
        }
    }
}

/// Typed reference to a declared resource
#[derive(Clone, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourceRef {
    /// Resource kind
    pub kind: ResourceKind,
    /// Resource name, unique within its kind
    pub name: String,
}

impl ResourceRef {
    /// Create a resource reference
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

// =============================================================================
// Dependency Graph
// =============================================================================

/// Directed acyclic graph of resource ordering constraints
///
/// Edges point from dependent to prerequisite. The graph is append-only
/// during the build pass; [`ResourceGraph::validate`] and
/// [`ResourceGraph::creation_order`] are read-only checks run once the stack
/// is fully declared.
#[derive(Clone, Debug, Default)]
pub struct ResourceGraph {
    nodes: BTreeSet<ResourceRef>,
    // dependent -> set of prerequisites
    edges: BTreeMap<ResourceRef, BTreeSet<ResourceRef>>,
}

impl ResourceGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource node
    pub fn add_node(&mut self, resource: ResourceRef) {
        self.nodes.insert(resource);
    }

    /// Whether the resource has been declared
    pub fn contains(&self, resource: &ResourceRef) -> bool {
        self.nodes.contains(resource)
    }

    /// Number of declared resources
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no declared resources
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add an ordering constraint: `dependent` requires `prerequisite` to
    /// exist and settle first
    pub fn depends_on(&mut self, dependent: ResourceRef, prerequisite: ResourceRef) {
        self.edges
            .entry(dependent)
            .or_default()
            .insert(prerequisite);
    }

    /// Whether the ordering constraint has been declared
    pub fn has_edge(&self, dependent: &ResourceRef, prerequisite: &ResourceRef) -> bool {
        self.edges
            .get(dependent)
            .is_some_and(|prereqs| prereqs.contains(prerequisite))
    }

    /// Prerequisites declared for a resource
    pub fn prerequisites_of(&self, dependent: &ResourceRef) -> Vec<&ResourceRef> {
        self.edges
            .get(dependent)
            .map(|prereqs| prereqs.iter().collect())
            .unwrap_or_default()
    }

    /// Validate the graph: every edge endpoint is declared, and no cycles
    ///
    /// This is the build-time gate from which the whole deployment is
    /// rejected; nothing is handed to the engine if it fails.
    pub fn validate(&self) -> Result<()> {
        for (dependent, prerequisites) in &self.edges {
            if !self.nodes.contains(dependent) {
                return Err(Error::graph(format!(
                    "unknown resource '{dependent}' in ordering edge"
                )));
            }
            for prerequisite in prerequisites {
                if !self.nodes.contains(prerequisite) {
                    return Err(Error::graph(format!(
                        "unknown resource '{prerequisite}' in ordering edge \
                         (required by '{dependent}')"
                    )));
                }
            }
        }
        self.creation_order().map(|_| ())
    }

    /// Deterministic creation order: prerequisites before dependents
    ///
    /// Kahn's algorithm over ordered sets, so the result is stable for a
    /// given graph. Fails on cycles, naming one resource on the cycle.
    pub fn creation_order(&self) -> Result<Vec<ResourceRef>> {
        // in-degree = number of unsettled prerequisites per dependent
        let mut remaining: BTreeMap<&ResourceRef, usize> = self
            .nodes
            .iter()
            .map(|node| {
                let degree = self
                    .edges
                    .get(node)
                    .map(|prereqs| prereqs.iter().filter(|p| self.nodes.contains(p)).count())
                    .unwrap_or(0);
                (node, degree)
            })
            .collect();

        // prerequisite -> dependents, for decrementing after settle
        let mut dependents: BTreeMap<&ResourceRef, Vec<&ResourceRef>> = BTreeMap::new();
        for (dependent, prerequisites) in &self.edges {
            for prerequisite in prerequisites {
                dependents.entry(prerequisite).or_default().push(dependent);
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        loop {
            let Some(next) = remaining
                .iter()
                .find(|(_, degree)| **degree == 0)
                .map(|(node, _)| *node)
            else {
                break;
            };
            remaining.remove(next);
            order.push(next.clone());

            if let Some(deps) = dependents.get(next) {
                for dependent in deps {
                    if let Some(degree) = remaining.get_mut(*dependent) {
                        *degree = degree.saturating_sub(1);
                    }
                }
            }
        }

        if let Some((stuck, _)) = remaining.iter().next() {
            return Err(Error::graph(format!(
                "dependency cycle through '{stuck}'"
            )));
        }
        Ok(order)
    }
}

// =============================================================================
// Tests
// =============================================================================
