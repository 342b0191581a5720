//! Build-flag synthesis for a concretized node.
//!
//! Three rule classes, emitted in declared order per class: direct
//! variant-to-define mappings, conditional argument blocks, and
//! per-category compiler corrections. Emission never reorders or drops an
//! earlier argument; when a later rule produces a define with the same
//! key, the later value replaces the earlier one in place.

use std::collections::BTreeMap;

use cairn_core::predicate::EvalContext;
use cairn_core::recipe::{FlagCategory, Package, VariantValue};

use crate::graph::ConcreteNode;

/// The synthesized arguments for one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeFlags {
    /// Build-system arguments: defines and conditional blocks.
    pub args: Vec<String>,
    /// Compiler flag corrections, per category.
    pub compiler_flags: BTreeMap<FlagCategory, Vec<String>>,
}

impl NodeFlags {
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.compiler_flags.is_empty()
    }
}

/// Derive the full argument set for one concretized node.
pub fn synthesize(package: &Package, node: &ConcreteNode) -> NodeFlags {
    let ctx = EvalContext {
        version: &node.version,
        variants: &node.variants,
        compiler: &node.compiler,
    };

    let mut args = ArgList::default();
    for define in &package.flags.defines {
        if let Some(value) = node.variants.get(&define.variant) {
            args.push(define_arg(&define.name, value));
        }
    }
    for rule in &package.flags.args {
        if rule.when.matches(&ctx) {
            for arg in &rule.args {
                args.push(arg.clone());
            }
        }
    }

    let mut compiler_flags = BTreeMap::new();
    for category in FlagCategory::ALL {
        let flags = apply_compiler_rules(package, &ctx, category, Vec::new());
        if !flags.is_empty() {
            compiler_flags.insert(category, flags);
        }
    }

    NodeFlags {
        args: args.into_args(),
        compiler_flags,
    }
}

/// The per-category correction hook: append every matching rule's flags
/// to the current list and return it.
pub fn apply_compiler_rules(
    package: &Package,
    ctx: &EvalContext<'_>,
    category: FlagCategory,
    mut flags: Vec<String>,
) -> Vec<String> {
    for rule in &package.flags.compiler {
        if rule.category == category && rule.when.matches(ctx) {
            flags.extend(rule.append.iter().cloned());
        }
    }
    flags
}

fn define_arg(name: &str, value: &VariantValue) -> String {
    match value {
        VariantValue::Bool(true) => format!("-D{name}:BOOL=ON"),
        VariantValue::Bool(false) => format!("-D{name}:BOOL=OFF"),
        VariantValue::Choice(v) => format!("-D{name}:STRING={v}"),
    }
}

/// Ordered argument accumulator with in-place last-wins on define keys.
#[derive(Debug, Default)]
struct ArgList {
    args: Vec<String>,
    keys: BTreeMap<String, usize>,
}

impl ArgList {
    fn push(&mut self, arg: String) {
        match define_key(&arg) {
            Some(key) => {
                if let Some(&i) = self.keys.get(&key) {
                    self.args[i] = arg;
                } else {
                    self.keys.insert(key, self.args.len());
                    self.args.push(arg);
                }
            }
            None => self.args.push(arg),
        }
    }

    fn into_args(self) -> Vec<String> {
        self.args
    }
}

/// `-DNAME:TYPE=value` or `-DNAME=value` → `NAME`.
fn define_key(arg: &str) -> Option<String> {
    let rest = arg.strip_prefix("-D")?;
    let end = rest.find([':', '='])?;
    Some(rest[..end].to_string())
}
