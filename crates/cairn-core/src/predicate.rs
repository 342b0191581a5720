//! The constraint predicate language.
//!
//! Dependency and conflict statements in recipes are gated by `when`
//! strings: whitespace-separated conjunctions of atomic clauses over the
//! depender's version, its variant assignment, and the build compiler.
//!
//! - `@:6.12`, `@6.18:`, `@6.18:6.20`, `@6.12`: version-range clauses;
//! - `%gcc`, `%gcc@13:`: compiler name with optional version bound;
//! - `+mpi`, `~mpi`: boolean variant enabled / disabled;
//! - `build_type=Release`: enumerated variant equality.
//!
//! Strings are parsed once at recipe load time into a typed clause list;
//! evaluation is a pure function over a candidate configuration. Unknown
//! clause syntax is a [`CairnError::UnsupportedPredicate`], never a
//! silent match.

use std::collections::BTreeMap;
use std::fmt;

use crate::compiler::CompilerSpec;
use crate::errors::{CairnError, CairnResult};
use crate::recipe::VariantValue;
use crate::version::{Version, VersionRange};

/// A compiler clause: family name plus optional version bound.
#[derive(Debug, Clone)]
pub struct CompilerConstraint {
    pub name: String,
    pub range: Option<VersionRange>,
}

impl CompilerConstraint {
    /// Parse a `%name[@range]` clause (the leading `%` is required).
    pub fn parse(clause: &str, context: &str) -> CairnResult<Self> {
        let unsupported = || CairnError::UnsupportedPredicate {
            clause: clause.to_string(),
            context: context.to_string(),
        };
        let rest = clause.strip_prefix('%').ok_or_else(unsupported)?;
        let (name, range) = match rest.split_once('@') {
            Some((name, range)) => {
                let range = VersionRange::parse(range).ok_or_else(unsupported)?;
                (name, Some(range))
            }
            None => (rest, None),
        };
        if !is_valid_name(name) {
            return Err(unsupported());
        }
        Ok(Self {
            name: name.to_string(),
            range,
        })
    }

    /// Whether a concrete compiler selection satisfies this clause.
    pub fn matches(&self, compiler: &CompilerSpec) -> bool {
        self.name == compiler.name
            && self
                .range
                .as_ref()
                .map_or(true, |r| r.contains(&compiler.version))
    }
}

impl fmt::Display for CompilerConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(r) => write!(f, "%{}@{}", self.name, r),
            None => write!(f, "%{}", self.name),
        }
    }
}

/// What a variant clause expects of the assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantExpect {
    Enabled,
    Disabled,
    Equals(String),
}

/// One atomic clause of a `when` predicate.
#[derive(Debug, Clone)]
pub enum Clause {
    Version(VersionRange),
    Compiler(CompilerConstraint),
    Variant { name: String, expect: VariantExpect },
}

/// A conjunction of clauses, parsed once at load time.
#[derive(Debug, Clone)]
pub struct Predicate {
    clauses: Vec<Clause>,
    source: String,
}

/// The candidate configuration a predicate is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub version: &'a Version,
    pub variants: &'a BTreeMap<String, VariantValue>,
    pub compiler: &'a CompilerSpec,
}

impl Predicate {
    /// The empty conjunction: matches every configuration.
    pub fn always() -> Self {
        Self {
            clauses: Vec::new(),
            source: String::new(),
        }
    }

    /// Parse a whitespace-separated conjunction of clauses.
    ///
    /// `context` names where the string came from; it is carried into
    /// error reports so a bad recipe is locatable.
    pub fn parse(spec: &str, context: &str) -> CairnResult<Self> {
        let mut clauses = Vec::new();
        for token in spec.split_whitespace() {
            clauses.push(parse_clause(token, context)?);
        }
        Ok(Self {
            clauses,
            source: spec.trim().to_string(),
        })
    }

    pub fn is_always(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Evaluate the conjunction against a candidate configuration.
    ///
    /// A variant clause naming a variant absent from the assignment does
    /// not match; load-time validation rejects such clauses for the
    /// package's own predicates, so this only arises for foreign contexts.
    pub fn matches(&self, ctx: &EvalContext<'_>) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Version(range) => range.contains(ctx.version),
            Clause::Compiler(cc) => cc.matches(ctx.compiler),
            Clause::Variant { name, expect } => match (ctx.variants.get(name), expect) {
                (Some(VariantValue::Bool(true)), VariantExpect::Enabled) => true,
                (Some(VariantValue::Bool(false)), VariantExpect::Disabled) => true,
                (Some(VariantValue::Choice(v)), VariantExpect::Equals(want)) => v == want,
                _ => false,
            },
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_clause(token: &str, context: &str) -> CairnResult<Clause> {
    let unsupported = || CairnError::UnsupportedPredicate {
        clause: token.to_string(),
        context: context.to_string(),
    };

    if let Some(range) = token.strip_prefix('@') {
        let range = VersionRange::parse(range).ok_or_else(unsupported)?;
        return Ok(Clause::Version(range));
    }
    if token.starts_with('%') {
        return Ok(Clause::Compiler(CompilerConstraint::parse(token, context)?));
    }
    if let Some(name) = token.strip_prefix('+') {
        if !is_valid_name(name) {
            return Err(unsupported());
        }
        return Ok(Clause::Variant {
            name: name.to_string(),
            expect: VariantExpect::Enabled,
        });
    }
    if let Some(name) = token.strip_prefix('~') {
        if !is_valid_name(name) {
            return Err(unsupported());
        }
        return Ok(Clause::Variant {
            name: name.to_string(),
            expect: VariantExpect::Disabled,
        });
    }
    if let Some((name, value)) = token.split_once('=') {
        if !is_valid_name(name) || value.is_empty() || value.contains('=') {
            return Err(unsupported());
        }
        return Ok(Clause::Variant {
            name: name.to_string(),
            expect: VariantExpect::Equals(value.to_string()),
        });
    }
    Err(unsupported())
}

/// Parse a variant assignment string (`"+filesystem ~python build_type=Release"`)
/// into concrete values, as used by dependency `require` fields and user
/// override specs.
pub fn parse_assignments(
    spec: &str,
    context: &str,
) -> CairnResult<BTreeMap<String, VariantValue>> {
    let mut assignments = BTreeMap::new();
    for token in spec.split_whitespace() {
        match parse_clause(token, context)? {
            Clause::Variant { name, expect } => {
                let value = match expect {
                    VariantExpect::Enabled => VariantValue::Bool(true),
                    VariantExpect::Disabled => VariantValue::Bool(false),
                    VariantExpect::Equals(v) => VariantValue::Choice(v),
                };
                assignments.insert(name, value);
            }
            _ => {
                return Err(CairnError::UnsupportedPredicate {
                    clause: token.to_string(),
                    context: format!("{context} (only variant clauses are allowed here)"),
                })
            }
        }
    }
    Ok(assignments)
}

pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
}
