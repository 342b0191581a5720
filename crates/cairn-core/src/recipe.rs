//! Recipe parsing and the package model.
//!
//! One TOML file describes one package: its declared versions with source
//! provenance, variants with defaults, conditional dependencies, conflict
//! rules, and flag rules for the build-system argument synthesizer. The
//! raw serde schema is validated into the typed model at load time; every
//! `when` string is parsed into a [`Predicate`] exactly once.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::compiler::CompilerSpec;
use crate::errors::{CairnError, CairnResult};
use crate::predicate::{
    is_valid_name, parse_assignments, Clause, CompilerConstraint, EvalContext, Predicate,
};
use crate::version::{Version, VersionRange};

/// A concrete variant value: boolean toggle or enumerated choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantValue {
    Bool(bool),
    Choice(String),
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantValue::Bool(b) => write!(f, "{b}"),
            VariantValue::Choice(c) => f.write_str(c),
        }
    }
}

/// Source provenance of one declared version.
#[derive(Debug, Clone)]
pub enum Provenance {
    /// A checksummed release archive.
    Checksum { algorithm: &'static str, digest: String },
    /// A git tag pinned to a commit, optionally with submodules.
    Git {
        tag: String,
        commit: String,
        submodules: Vec<String>,
    },
}

/// One declared version of a package.
#[derive(Debug, Clone)]
pub struct VersionEntry {
    pub version: Version,
    pub provenance: Provenance,
}

/// A declared build option.
#[derive(Debug, Clone)]
pub struct Variant {
    pub name: String,
    pub default: VariantValue,
    /// Allowed values; empty for boolean variants.
    pub values: Vec<String>,
    pub description: String,
}

/// Build-time vs. link/runtime dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    Build,
    Link,
}

impl fmt::Display for DepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepKind::Build => f.write_str("build"),
            DepKind::Link => f.write_str("link"),
        }
    }
}

/// A conditional dependency edge.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub package: String,
    /// Version requirement on the target (from `"name@range"`).
    pub range: VersionRange,
    pub when: Predicate,
    pub kind: DepKind,
    /// Variant assignment the target must carry.
    pub require: BTreeMap<String, VariantValue>,
}

/// A conflict rule: the configuration is unbuildable when the compiler
/// clause matches and the depender's version falls in `when`.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub compiler: CompilerConstraint,
    pub when: Option<VersionRange>,
    pub message: Option<String>,
}

impl Conflict {
    /// Whether this rule applies to a concrete (version, compiler) pair.
    pub fn applies(&self, version: &Version, compiler: &CompilerSpec) -> bool {
        self.compiler.matches(compiler)
            && self.when.as_ref().map_or(true, |r| r.contains(version))
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conflicts with {}", self.compiler)?;
        if let Some(ref when) = self.when {
            write!(f, " when @{when}")?;
        }
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

/// Flag list a compiler correction applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlagCategory {
    CFlags,
    CxxFlags,
    FFlags,
    LdFlags,
}

impl FlagCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cflags" => Some(Self::CFlags),
            "cxxflags" => Some(Self::CxxFlags),
            "fflags" => Some(Self::FFlags),
            "ldflags" => Some(Self::LdFlags),
            _ => None,
        }
    }

    pub const ALL: [FlagCategory; 4] = [
        FlagCategory::CFlags,
        FlagCategory::CxxFlags,
        FlagCategory::FFlags,
        FlagCategory::LdFlags,
    ];
}

impl fmt::Display for FlagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagCategory::CFlags => f.write_str("cflags"),
            FlagCategory::CxxFlags => f.write_str("cxxflags"),
            FlagCategory::FFlags => f.write_str("fflags"),
            FlagCategory::LdFlags => f.write_str("ldflags"),
        }
    }
}

/// A direct variant-to-define mapping (`shared` → `BUILD_SHARED_LIBS`).
#[derive(Debug, Clone)]
pub struct VariantDefine {
    pub name: String,
    pub variant: String,
}

/// A block of arguments emitted when its predicate matches.
#[derive(Debug, Clone)]
pub struct ConditionalArgs {
    pub when: Predicate,
    pub args: Vec<String>,
}

/// A compiler-specific correction appended to one flag category.
#[derive(Debug, Clone)]
pub struct CompilerFlagRule {
    pub when: Predicate,
    pub category: FlagCategory,
    pub append: Vec<String>,
}

/// All flag rules of a recipe, in declared order per class.
#[derive(Debug, Clone, Default)]
pub struct FlagRules {
    pub defines: Vec<VariantDefine>,
    pub args: Vec<ConditionalArgs>,
    pub compiler: Vec<CompilerFlagRule>,
}

/// A loaded, validated package recipe. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub url: Option<String>,
    versions: Vec<VersionEntry>,
    variants: BTreeMap<String, Variant>,
    dependencies: Vec<Dependency>,
    conflicts: Vec<Conflict>,
    pub flags: FlagRules,
}

impl Package {
    /// Load and validate a recipe file.
    pub fn from_path(path: &Path) -> CairnResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let label = path.file_stem().and_then(|s| s.to_str()).unwrap_or("recipe");
        Self::parse(&content, label)
    }

    /// Parse and validate recipe TOML. `label` names the recipe in errors
    /// raised before the package name itself is known.
    pub fn parse(content: &str, label: &str) -> CairnResult<Self> {
        let raw: RawRecipe = toml::from_str(content).map_err(|e| CairnError::MalformedRecipe {
            package: label.to_string(),
            message: format!("TOML parse error: {e}"),
        })?;
        Self::from_raw(raw)
    }

    /// Parse and validate recipe TOML (tests and embedded recipes).
    pub fn from_str(content: &str) -> CairnResult<Self> {
        Self::parse(content, "recipe")
    }

    /// Declared versions, in recipe order.
    pub fn versions(&self) -> &[VersionEntry] {
        &self.versions
    }

    /// Declared variants, keyed by name.
    pub fn variants(&self) -> &BTreeMap<String, Variant> {
        &self.variants
    }

    /// The declared default for one variant.
    pub fn variant_default(&self, name: &str) -> Option<&VariantValue> {
        self.variants.get(name).map(|v| &v.default)
    }

    /// All dependency edges, in recipe order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Dependency edges whose `when` predicate matches a concrete context.
    pub fn dependencies_matching(&self, ctx: &EvalContext<'_>) -> Vec<&Dependency> {
        self.dependencies
            .iter()
            .filter(|d| d.when.matches(ctx))
            .collect()
    }

    /// All conflict rules, in recipe order.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Conflict rules applying to a concrete (version, compiler) pair.
    pub fn conflicts_matching(
        &self,
        version: &Version,
        compiler: &CompilerSpec,
    ) -> Vec<&Conflict> {
        self.conflicts
            .iter()
            .filter(|c| c.applies(version, compiler))
            .collect()
    }

    fn from_raw(raw: RawRecipe) -> CairnResult<Self> {
        let name = raw.package.name;
        let malformed = |message: String| CairnError::MalformedRecipe {
            package: name.clone(),
            message,
        };

        if !is_valid_name(&name) {
            return Err(CairnError::MalformedRecipe {
                package: name.clone(),
                message: "package name must be alphanumeric with `-`/`_`".to_string(),
            });
        }
        if raw.versions.is_empty() {
            return Err(malformed("recipe declares no versions".to_string()));
        }

        let mut versions = Vec::with_capacity(raw.versions.len());
        for rv in raw.versions {
            versions.push(validate_version(rv).map_err(&malformed)?);
        }

        let mut variants = BTreeMap::new();
        for (vname, rv) in raw.variants {
            if !is_valid_name(&vname) {
                return Err(malformed(format!("invalid variant name `{vname}`")));
            }
            let variant = validate_variant(&vname, rv).map_err(&malformed)?;
            variants.insert(vname, variant);
        }

        let mut dependencies = Vec::with_capacity(raw.dependencies.len());
        for rd in raw.dependencies {
            let context = format!("dependency `{}` of `{name}`", rd.package);
            let (target, range) = split_target(&rd.package).map_err(&malformed)?;
            let when = match rd.when {
                Some(ref s) => Predicate::parse(s, &context)?,
                None => Predicate::always(),
            };
            check_declared_variants(&when, &variants, &context).map_err(&malformed)?;
            let kind = match rd.kind.as_deref() {
                None | Some("link") => DepKind::Link,
                Some("build") => DepKind::Build,
                Some(other) => {
                    return Err(malformed(format!(
                        "unknown dependency type `{other}` (expected `build` or `link`)"
                    )))
                }
            };
            let require = match rd.require {
                Some(ref s) => parse_assignments(s, &context)?,
                None => BTreeMap::new(),
            };
            dependencies.push(Dependency {
                package: target,
                range,
                when,
                kind,
                require,
            });
        }

        let mut conflicts = Vec::with_capacity(raw.conflicts.len());
        for rc in raw.conflicts {
            let context = format!("conflict rule of `{name}`");
            let compiler = CompilerConstraint::parse(&rc.compiler, &context)?;
            let when = match rc.when.as_deref() {
                Some(s) => {
                    let range = s.strip_prefix('@').unwrap_or(s);
                    Some(VersionRange::parse(range).ok_or_else(|| {
                        malformed(format!("unparsable conflict version range `{s}`"))
                    })?)
                }
                None => None,
            };
            conflicts.push(Conflict {
                compiler,
                when,
                message: rc.message,
            });
        }

        let flags = validate_flags(&name, raw.flags, &variants)?;

        Ok(Self {
            name,
            description: raw.package.description,
            homepage: raw.package.homepage,
            url: raw.package.url,
            versions,
            variants,
            dependencies,
            conflicts,
            flags,
        })
    }
}

fn validate_version(rv: RawVersion) -> Result<VersionEntry, String> {
    if rv.version.is_empty() {
        return Err("version entry with empty identifier".to_string());
    }
    let checksum = match (rv.sha256, rv.md5) {
        (Some(_), Some(_)) => {
            return Err(format!(
                "version {} declares more than one checksum",
                rv.version
            ))
        }
        (Some(d), None) => Some(("sha256", d)),
        (None, Some(d)) => Some(("md5", d)),
        (None, None) => None,
    };
    let provenance = match (checksum, rv.tag, rv.commit) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            return Err(format!(
                "version {} declares both a checksum and git provenance",
                rv.version
            ))
        }
        (Some((algorithm, digest)), None, None) => {
            if !rv.submodules.is_empty() {
                return Err(format!(
                    "version {} declares submodules without git provenance",
                    rv.version
                ));
            }
            Provenance::Checksum { algorithm, digest }
        }
        (None, Some(tag), Some(commit)) => Provenance::Git {
            tag,
            commit,
            submodules: rv.submodules,
        },
        _ => {
            return Err(format!(
                "version {} needs either a checksum or a tag+commit pair",
                rv.version
            ))
        }
    };
    Ok(VersionEntry {
        version: Version::parse(&rv.version),
        provenance,
    })
}

fn validate_variant(name: &str, rv: RawVariant) -> Result<Variant, String> {
    let (default, values) = match rv.default {
        RawDefault::Bool(b) => {
            if !rv.values.is_empty() {
                return Err(format!(
                    "boolean variant `{name}` must not declare allowed values"
                ));
            }
            (VariantValue::Bool(b), Vec::new())
        }
        RawDefault::Choice(c) => {
            if rv.values.is_empty() {
                return Err(format!(
                    "enumerated variant `{name}` declares no allowed values"
                ));
            }
            if !rv.values.contains(&c) {
                return Err(format!(
                    "default `{c}` of variant `{name}` is not among its allowed values"
                ));
            }
            (VariantValue::Choice(c), rv.values)
        }
    };
    Ok(Variant {
        name: name.to_string(),
        default,
        values,
        description: rv.description,
    })
}

/// Split `"name[@range]"` into a target name and version requirement.
fn split_target(spec: &str) -> Result<(String, VersionRange), String> {
    let (name, range) = match spec.split_once('@') {
        Some((name, range)) => {
            let range = VersionRange::parse(range)
                .ok_or_else(|| format!("unparsable version range in `{spec}`"))?;
            (name, range)
        }
        None => (spec, VersionRange::any()),
    };
    if !is_valid_name(name) {
        return Err(format!("invalid dependency target `{spec}`"));
    }
    Ok((name.to_string(), range))
}

/// Variant clauses in a package's own predicates must name declared variants.
fn check_declared_variants(
    when: &Predicate,
    variants: &BTreeMap<String, Variant>,
    context: &str,
) -> Result<(), String> {
    for clause in when.clauses() {
        if let Clause::Variant { name, .. } = clause {
            if !variants.contains_key(name) {
                return Err(format!("{context} references undeclared variant `{name}`"));
            }
        }
    }
    Ok(())
}

fn validate_flags(
    package: &str,
    raw: RawFlags,
    variants: &BTreeMap<String, Variant>,
) -> CairnResult<FlagRules> {
    let malformed = |message: String| CairnError::MalformedRecipe {
        package: package.to_string(),
        message,
    };

    let mut defines = Vec::with_capacity(raw.defines.len());
    for rd in raw.defines {
        if rd.name.is_empty() {
            return Err(malformed("flag define with empty name".to_string()));
        }
        if !variants.contains_key(&rd.variant) {
            return Err(malformed(format!(
                "flag define `{}` references undeclared variant `{}`",
                rd.name, rd.variant
            )));
        }
        defines.push(VariantDefine {
            name: rd.name,
            variant: rd.variant,
        });
    }

    let mut args = Vec::with_capacity(raw.args.len());
    for ra in raw.args {
        let context = format!("flag args rule of `{package}`");
        let when = match ra.when {
            Some(ref s) => Predicate::parse(s, &context)?,
            None => Predicate::always(),
        };
        check_declared_variants(&when, variants, &context).map_err(&malformed)?;
        if ra.args.is_empty() {
            return Err(malformed("flag args rule with no arguments".to_string()));
        }
        args.push(ConditionalArgs { when, args: ra.args });
    }

    let mut compiler = Vec::with_capacity(raw.compiler.len());
    for rc in raw.compiler {
        let context = format!("compiler flag rule of `{package}`");
        let when = Predicate::parse(&rc.when, &context)?;
        check_declared_variants(&when, variants, &context).map_err(&malformed)?;
        let category = FlagCategory::parse(&rc.category).ok_or_else(|| {
            malformed(format!(
                "unknown flag category `{}` (expected one of cflags, cxxflags, fflags, ldflags)",
                rc.category
            ))
        })?;
        if rc.append.is_empty() {
            return Err(malformed("compiler flag rule appends nothing".to_string()));
        }
        compiler.push(CompilerFlagRule {
            when,
            category,
            append: rc.append,
        });
    }

    Ok(FlagRules {
        defines,
        args,
        compiler,
    })
}

// Raw serde schema, one-to-one with the TOML layout.

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecipe {
    package: RawPackage,
    #[serde(default, rename = "version")]
    versions: Vec<RawVersion>,
    #[serde(default, rename = "variant")]
    variants: BTreeMap<String, RawVariant>,
    #[serde(default, rename = "dependency")]
    dependencies: Vec<RawDependency>,
    #[serde(default, rename = "conflict")]
    conflicts: Vec<RawConflict>,
    #[serde(default)]
    flags: RawFlags,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackage {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVersion {
    version: String,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    md5: Option<String>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    commit: Option<String>,
    #[serde(default)]
    submodules: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVariant {
    default: RawDefault,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDefault {
    Bool(bool),
    Choice(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDependency {
    package: String,
    #[serde(default)]
    when: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    require: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConflict {
    compiler: String,
    #[serde(default)]
    when: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFlags {
    #[serde(default, rename = "define")]
    defines: Vec<RawDefine>,
    #[serde(default, rename = "args")]
    args: Vec<RawArgs>,
    #[serde(default, rename = "compiler")]
    compiler: Vec<RawCompilerFlag>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefine {
    name: String,
    variant: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawArgs {
    #[serde(default)]
    when: Option<String>,
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCompilerFlag {
    when: String,
    category: String,
    append: Vec<String>,
}
