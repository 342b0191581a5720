//! Depth-first concretization of a build plan.
//!
//! Expansion is memoized per package name: the first concrete
//! configuration chosen for a name is reused by every later edge reaching
//! it, so one plan never carries two configurations of the same package.
//! A later edge whose requirements the memoized node cannot satisfy fails
//! the whole resolution. Within one node, several dependency statements
//! naming the same target merge first (range intersection, requirement
//! union), so a base edge plus version-gated narrowings act as one edge.
//!
//! Version selection prefers the highest version inside the requested
//! range; among entries whose versions compare equal the one declared
//! first in the recipe wins. Conflict rules restricted to a version range
//! exclude candidates during selection; unrestricted compiler conflicts
//! are checked once the node's configuration is final, after its children
//! resolved.
//!
//! Resolution is deterministic: recipes hold their declaration order,
//! everything else lives in ordered containers.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use cairn_core::compiler::CompilerSpec;
use cairn_core::errors::{CairnError, CairnResult};
use cairn_core::predicate::{parse_assignments, EvalContext};
use cairn_core::recipe::{Conflict, DepKind, Dependency, VariantValue, VersionEntry};
use cairn_core::registry::Registry;
use cairn_core::version::VersionRange;

use crate::flags::{self, NodeFlags};
use crate::graph::{ConcreteGraph, ConcreteNode, DepEdge};
use crate::variant::resolve_variants;

/// A parsed resolution request:
/// `name[@range] [+variant|~variant|variant=value ...] [%compiler@version]`.
#[derive(Debug, Clone)]
pub struct Request {
    pub package: String,
    pub range: VersionRange,
    pub overrides: BTreeMap<String, VariantValue>,
    pub compiler: CompilerSpec,
}

impl Request {
    pub fn parse(spec: &str, default_compiler: &CompilerSpec) -> CairnResult<Self> {
        let context = format!("request `{spec}`");
        let unsupported = |clause: &str, context: String| CairnError::UnsupportedPredicate {
            clause: clause.to_string(),
            context,
        };

        let mut tokens = spec.split_whitespace();
        let head = tokens
            .next()
            .ok_or_else(|| unsupported(spec, format!("{context} (empty request)")))?;
        let (name, range) = match head.split_once('@') {
            Some((name, range)) => {
                let range = VersionRange::parse(range)
                    .ok_or_else(|| unsupported(head, context.clone()))?;
                (name, range)
            }
            None => (head, VersionRange::any()),
        };
        if name.is_empty() || name.starts_with(['+', '~', '%']) {
            return Err(unsupported(head, context));
        }

        let mut overrides = BTreeMap::new();
        let mut compiler = None;
        for token in tokens {
            if let Some(rest) = token.strip_prefix('%') {
                let parsed = (!rest.contains(':'))
                    .then(|| CompilerSpec::parse(rest))
                    .flatten()
                    .ok_or_else(|| {
                        unsupported(
                            token,
                            format!("{context} (compiler must be `%name@version`)"),
                        )
                    })?;
                compiler = Some(parsed);
            } else {
                overrides.extend(parse_assignments(token, &context)?);
            }
        }

        Ok(Self {
            package: name.to_string(),
            range,
            overrides,
            compiler: compiler.unwrap_or_else(|| default_compiler.clone()),
        })
    }
}

/// The output of one resolution: the concretized DAG and, per node, the
/// synthesized build arguments.
#[derive(Debug)]
pub struct Resolution {
    pub graph: ConcreteGraph,
    /// Synthesized flags keyed by package name.
    pub flags: BTreeMap<String, NodeFlags>,
}

impl Resolution {
    /// Deterministic full rendering of the plan: the dependency tree
    /// followed by every node's argument sequence.
    pub fn render(&self) -> String {
        let mut out = self.graph.print_tree();
        for (name, flags) in &self.flags {
            if flags.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n[{name}]");
            for arg in &flags.args {
                let _ = writeln!(out, "  {arg}");
            }
            for (category, list) in &flags.compiler_flags {
                let _ = writeln!(out, "  {category}: {}", list.join(" "));
            }
        }
        out
    }
}

/// Resolve one root request against a loaded registry.
///
/// The registry is only read; independent resolutions may run in
/// parallel, each owning its resolver state. Aborting is dropping the
/// in-progress resolver.
pub fn resolve(registry: &Registry, request: &Request) -> CairnResult<Resolution> {
    tracing::debug!(
        "resolving {}@{} with %{}",
        request.package,
        request.range,
        request.compiler
    );
    let mut resolver = Resolver {
        registry,
        compiler: request.compiler.clone(),
        graph: ConcreteGraph::new(),
        chain: Vec::new(),
    };
    let root = resolver.resolve_node(
        &request.package,
        &request.range,
        &BTreeMap::new(),
        &request.overrides,
    )?;
    resolver.graph.set_root(root);

    let graph = resolver.graph;
    let mut all_flags = BTreeMap::new();
    for node in graph.all_nodes() {
        let pkg = registry.get(&node.name)?;
        all_flags.insert(node.name.clone(), flags::synthesize(pkg, node));
    }
    Ok(Resolution {
        graph,
        flags: all_flags,
    })
}

/// One target's combined requirements within a single node.
struct MergedEdge {
    package: String,
    range: VersionRange,
    require: BTreeMap<String, VariantValue>,
    kind: DepKind,
}

struct Resolver<'a> {
    registry: &'a Registry,
    compiler: CompilerSpec,
    graph: ConcreteGraph,
    /// DFS stack of package names, for cycle detection and error chains.
    chain: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn resolve_node(
        &mut self,
        name: &str,
        range: &VersionRange,
        required: &BTreeMap<String, VariantValue>,
        overrides: &BTreeMap<String, VariantValue>,
    ) -> CairnResult<petgraph::graph::NodeIndex> {
        // Reuse the configuration concretized first for this name.
        if let Some(idx) = self.graph.find(name) {
            let node = self.graph.node(idx);
            if !range.contains(&node.version) {
                return Err(self.conflicting(
                    name,
                    format!(
                        "already concretized at @{} which does not satisfy @{range}",
                        node.version
                    ),
                ));
            }
            for (vname, value) in required {
                if node.variants.get(vname) != Some(value) {
                    return Err(self.conflicting(
                        name,
                        format!("already concretized without required variant `{vname}={value}`"),
                    ));
                }
            }
            return Ok(idx);
        }

        if self.chain.iter().any(|n| n == name) {
            return Err(self.conflicting(name, "dependency cycle".to_string()));
        }

        let pkg = self.registry.get(name)?;
        let entry = self.select_version(name, pkg.versions(), pkg.conflicts(), range)?;
        let version = entry.version.clone();
        tracing::debug!("selected {name}@{version}");

        let variants = resolve_variants(pkg, required, overrides)?;
        let idx = self.graph.add_node(ConcreteNode {
            name: name.to_string(),
            version: version.clone(),
            variants: variants.clone(),
            compiler: self.compiler.clone(),
        });

        self.chain.push(name.to_string());
        let ctx = EvalContext {
            version: &version,
            variants: &variants,
            compiler: &self.compiler,
        };
        for dep in self.merge_edges(name, pkg.dependencies_matching(&ctx))? {
            let child =
                self.resolve_node(&dep.package, &dep.range, &dep.require, &BTreeMap::new())?;
            self.graph.add_edge(idx, child, DepEdge { kind: dep.kind });
        }

        self.chain.pop();

        // Final conflict check over the complete configuration. Catches
        // rules without a version restriction, which never discriminate
        // between candidate versions and so are not selection criteria.
        if let Some(conflict) = pkg.conflicts_matching(&version, &self.compiler).first() {
            let message = conflict.to_string();
            return Err(self.conflicting(name, message));
        }

        Ok(idx)
    }

    /// Merge a node's matching edges per target: recipes state one target
    /// across several `[[dependency]]` lines (a base requirement plus
    /// version-gated range narrowings), which combine into a single edge
    /// with the intersected range and the union of required variants.
    fn merge_edges(
        &self,
        name: &str,
        deps: Vec<&Dependency>,
    ) -> CairnResult<Vec<MergedEdge>> {
        let mut merged: Vec<MergedEdge> = Vec::new();
        for dep in deps {
            if let Some(edge) = merged.iter_mut().find(|m| m.package == dep.package) {
                edge.range = edge.range.intersect(&dep.range);
                for (vname, value) in &dep.require {
                    match edge.require.get(vname) {
                        Some(old) if old != value => {
                            return Err(self.conflicting(
                                name,
                                format!(
                                    "contradictory requirements on variant `{vname}` of `{}`",
                                    dep.package
                                ),
                            ));
                        }
                        _ => {
                            edge.require.insert(vname.clone(), value.clone());
                        }
                    }
                }
                if dep.kind == DepKind::Link {
                    edge.kind = DepKind::Link;
                }
            } else {
                merged.push(MergedEdge {
                    package: dep.package.clone(),
                    range: dep.range.clone(),
                    require: dep.require.clone(),
                    kind: dep.kind,
                });
            }
        }
        Ok(merged)
    }

    /// Select the newest version inside the range whose version-scoped
    /// conflict rules do not fire for the chosen compiler.
    fn select_version<'p>(
        &self,
        name: &str,
        versions: &'p [VersionEntry],
        conflicts: &'p [Conflict],
        range: &VersionRange,
    ) -> CairnResult<&'p VersionEntry> {
        let mut ordered: Vec<&VersionEntry> = versions.iter().collect();
        // Stable sort: entries with equal versions keep declaration order.
        ordered.sort_by(|a, b| b.version.cmp(&a.version));

        let mut rejection: Option<(&VersionEntry, &Conflict)> = None;
        for entry in ordered {
            if !range.contains(&entry.version) {
                continue;
            }
            let blocking = conflicts
                .iter()
                .find(|c| c.when.is_some() && c.applies(&entry.version, &self.compiler));
            match blocking {
                Some(conflict) => {
                    if rejection.is_none() {
                        rejection = Some((entry, conflict));
                    }
                }
                None => return Ok(entry),
            }
        }

        let reason = match rejection {
            Some((entry, conflict)) => {
                format!(" (@{} rejected: {conflict})", entry.version)
            }
            None => String::new(),
        };
        Err(CairnError::NoSatisfyingVersion {
            package: name.to_string(),
            requested: range.to_string(),
            reason,
        })
    }

    fn conflicting(&self, name: &str, message: String) -> CairnError {
        let mut chain: Vec<&str> = self.chain.iter().map(String::as_str).collect();
        chain.push(name);
        CairnError::ConflictingConstraint {
            package: name.to_string(),
            message,
            chain: chain.join(" -> "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gcc(version: &str) -> CompilerSpec {
        CompilerSpec::parse(&format!("gcc@{version}")).unwrap()
    }

    #[test]
    fn parse_full_request() {
        let req = Request::parse("dakota@:6.12 +mpi ~shared %gcc@10.1", &gcc("12.2")).unwrap();
        assert_eq!(req.package, "dakota");
        assert_eq!(req.range.to_string(), ":6.12");
        assert_eq!(req.overrides["mpi"], VariantValue::Bool(true));
        assert_eq!(req.overrides["shared"], VariantValue::Bool(false));
        assert_eq!(req.compiler, gcc("10.1"));
    }

    #[test]
    fn parse_bare_request_uses_defaults() {
        let req = Request::parse("boost", &gcc("12.2")).unwrap();
        assert_eq!(req.package, "boost");
        assert!(req.range.is_any());
        assert!(req.overrides.is_empty());
        assert_eq!(req.compiler, gcc("12.2"));
    }

    #[test]
    fn compiler_range_in_request_rejected() {
        let err = Request::parse("boost %gcc@13:", &gcc("12.2")).unwrap_err();
        assert!(matches!(err, CairnError::UnsupportedPredicate { .. }));
    }

    #[test]
    fn empty_request_rejected() {
        assert!(Request::parse("  ", &gcc("12.2")).is_err());
        assert!(Request::parse("+mpi", &gcc("12.2")).is_err());
    }
}
