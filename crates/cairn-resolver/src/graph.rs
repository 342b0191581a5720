//! The resolved ConcreteSpec DAG.
//!
//! One node per package name per plan: diamond dependencies from different
//! parents share the node concretized first. Nodes are immutable once the
//! resolution that built them completes.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use cairn_core::compiler::CompilerSpec;
use cairn_core::recipe::{DepKind, VariantValue};
use cairn_core::version::Version;

/// A fully concretized package: one version, a total variant assignment,
/// one compiler.
#[derive(Debug, Clone)]
pub struct ConcreteNode {
    pub name: String,
    pub version: Version,
    pub variants: BTreeMap<String, VariantValue>,
    pub compiler: CompilerSpec,
}

impl ConcreteNode {
    /// Render the node in spec notation:
    /// `dakota@6.12 +mpi+shared build_type=Release %gcc@10.1`.
    pub fn spec_string(&self) -> String {
        let mut out = format!("{}@{}", self.name, self.version);
        let mut toggles = String::new();
        let mut choices = Vec::new();
        for (name, value) in &self.variants {
            match value {
                VariantValue::Bool(true) => toggles.push_str(&format!("+{name}")),
                VariantValue::Bool(false) => toggles.push_str(&format!("~{name}")),
                VariantValue::Choice(v) => choices.push(format!("{name}={v}")),
            }
        }
        if !toggles.is_empty() {
            out.push(' ');
            out.push_str(&toggles);
        }
        for choice in choices {
            out.push(' ');
            out.push_str(&choice);
        }
        out.push_str(&format!(" %{}", self.compiler));
        out
    }
}

impl fmt::Display for ConcreteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec_string())
    }
}

/// Edge label: how the parent depends on the child.
#[derive(Debug, Clone, Copy)]
pub struct DepEdge {
    pub kind: DepKind,
}

/// A resolved dependency DAG backed by petgraph.
#[derive(Debug, Default)]
pub struct ConcreteGraph {
    graph: DiGraph<ConcreteNode, DepEdge>,
    /// Lookup from package name to its single node in this plan.
    index: BTreeMap<String, NodeIndex>,
    pub root: Option<NodeIndex>,
}

impl ConcreteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. The caller guarantees one node per package name; a
    /// second add for the same name returns the existing index unchanged.
    pub fn add_node(&mut self, node: ConcreteNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node.name) {
            return idx;
        }
        let name = node.name.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(name, idx);
        idx
    }

    pub fn set_root(&mut self, idx: NodeIndex) {
        self.root = Some(idx);
    }

    /// Add a dependency edge, ignoring exact duplicates.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: DepEdge) {
        if !self.graph.edges(from).any(|e| e.target() == to) {
            self.graph.add_edge(from, to, edge);
        }
    }

    /// Look up a node by package name.
    pub fn find(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &ConcreteNode {
        &self.graph[idx]
    }

    /// All nodes in package-name order.
    pub fn all_nodes(&self) -> Vec<&ConcreteNode> {
        self.index.values().map(|&idx| &self.graph[idx]).collect()
    }

    /// Direct dependencies of a node, in insertion order.
    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.id(), e.target(), e.weight()))
            .collect();
        // petgraph iterates outgoing edges newest-first; restore insertion order
        edges.sort_by_key(|(id, _, _)| *id);
        edges.into_iter().map(|(_, t, w)| (t, w)).collect()
    }

    /// Reverse dependencies (who depends on this node).
    pub fn dependents_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.id(), e.source(), e.weight()))
            .collect();
        edges.sort_by_key(|(id, _, _)| *id);
        edges.into_iter().map(|(_, s, w)| (s, w)).collect()
    }

    /// Names of a node's direct dependencies, in edge insertion order.
    pub fn dependency_names(&self, idx: NodeIndex) -> Vec<&str> {
        self.dependencies_of(idx)
            .into_iter()
            .map(|(child, _)| self.node(child).name.as_str())
            .collect()
    }

    /// Number of nodes in the plan.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Print the plan as a tree rooted at the requested package. Nodes
    /// reached through more than one parent are expanded only once.
    pub fn print_tree(&self) -> String {
        let mut output = String::new();
        let root = match self.root {
            Some(r) => r,
            None => return output,
        };
        output.push_str(&format!("{}\n", self.graph[root]));

        let mut visited = HashSet::new();
        visited.insert(root);

        let deps = self.dependencies_of(root);
        let count = deps.len();
        for (i, (idx, edge)) in deps.iter().enumerate() {
            self.print_subtree(&mut output, *idx, edge, "", i == count - 1, &mut visited);
        }
        output
    }

    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        edge: &DepEdge,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let node = &self.graph[idx];
        let marker = match edge.kind {
            DepKind::Build => "  [build]",
            DepKind::Link => "",
        };
        output.push_str(&format!("{prefix}{connector}{node}{marker}\n"));

        if !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let deps = self.dependencies_of(idx);
        let count = deps.len();
        for (i, (child, edge)) in deps.iter().enumerate() {
            self.print_subtree(output, *child, edge, &child_prefix, i == count - 1, visited);
        }
    }

    /// Find the dependency path from the root to a named package.
    pub fn find_path(&self, target: &str) -> Option<Vec<&ConcreteNode>> {
        let root = self.root?;
        let target = self.find(target)?;
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        if self.dfs_path(root, target, &mut path, &mut visited) {
            Some(path.iter().map(|&idx| &self.graph[idx]).collect())
        } else {
            None
        }
    }

    fn dfs_path(
        &self,
        current: NodeIndex,
        target: NodeIndex,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
    ) -> bool {
        path.push(current);
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            path.pop();
            return false;
        }
        for (child, _) in self.dependencies_of(current) {
            if self.dfs_path(child, target, path, visited) {
                return true;
            }
        }
        path.pop();
        false
    }
}
