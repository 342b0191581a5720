//! End-to-end concretization against a small recipe universe modeled on
//! a real simulation-toolkit stack.

use cairn_core::compiler::CompilerSpec;
use cairn_core::errors::CairnError;
use cairn_core::recipe::{DepKind, Package, VariantValue};
use cairn_core::registry::Registry;
use cairn_core::version::Version;
use cairn_resolver::resolver::{resolve, Request};

const DAKOTA: &str = r#"
[package]
name = "dakota"
description = "Optimization and uncertainty quantification toolkit"
homepage = "https://dakota.example.org/"

[[version]]
version = "6.20.0"
tag = "v6.20.0"
commit = "494027b37264ec9268f2de8649d071de0232c534"
submodules = ["dakota-examples", "packages/external"]

[[version]]
version = "6.19.0"
tag = "v6.19.0"
commit = "603f448b916a8f629d258922e26e7e40dcaaf8ce"

[[version]]
version = "6.18"
tag = "v6.18.0"
commit = "f6cb33b517bb304795e1e14d3673fe289df2ec9b"

[[version]]
version = "6.12"
sha256 = "4d69f9cbb0c7319384ab9df27643ff6767eb410823930b8fbd56cc9de0885bc9"

[[version]]
version = "6.9"
sha256 = "989b689278964b96496e3058b8ef5c2724d74bcd232f898fe450c51eba7fe0c2"

[[version]]
version = "6.3"
sha256 = "0fbc310105860d77bb5c96de0e8813d75441fca1a5e6dfaf732aa095c4488d52"

[variant.shared]
default = true
description = "Enables the build of shared libraries"

[variant.mpi]
default = true
description = "Activates MPI support"

[variant.python]
default = true
description = "Add Python dependency for the interfacing API"

[[dependency]]
package = "netlib-lapack"

[[dependency]]
package = "mpi"
when = "+mpi"

[[dependency]]
package = "python"
when = "+python"

[[dependency]]
package = "boost"
require = "+filesystem +system"

[[dependency]]
package = "boost@:1.68.0"
when = "@:6.12"

[[dependency]]
package = "boost@1.69.0:1.84.0"
when = "@6.18:6.20"

[[dependency]]
package = "cmake@2.8.9:"
type = "build"

[[dependency]]
package = "cmake@3.17:"
type = "build"
when = "@6.18:"

[[conflict]]
compiler = "%gcc@13:"

[[conflict]]
compiler = "%gcc@12:"
when = "@:6.12"

[[conflict]]
compiler = "%gcc@11:"
when = "@:6.9"

[[flags.define]]
name = "BUILD_SHARED_LIBS"
variant = "shared"

[[flags.define]]
name = "DAKOTA_PYTHON"
variant = "python"

[[flags.args]]
when = "+mpi"
args = ["-DDAKOTA_HAVE_MPI:BOOL=ON", "-DMPI_CXX_COMPILER:STRING=mpicxx"]

[[flags.compiler]]
when = "@:6.12 %gcc@10:"
category = "fflags"
append = ["-fallow-argument-mismatch"]
"#;

const BOOST: &str = r#"
[package]
name = "boost"

[[version]]
version = "1.84.0"
sha256 = "cc4b893acf645c9d4b698e9a0f08ca8846aa5d6c68275c14c3e7949c24109454"

[[version]]
version = "1.69.0"
sha256 = "8f32d4617390d1c2d16f26a27ab60d97807b35440d45891fa340fc2648b04406"

[[version]]
version = "1.68.0"
sha256 = "7f6130bc3cf65f56a618888ce9d5ea704fa10b462be126ad053e80e553d6d8b7"

[[version]]
version = "1.66.0"
sha256 = "5721818253e6a0989583192f96782c4a98eb6204965316df9f5ad75819225ca9"

[variant.filesystem]
default = false

[variant.system]
default = false
"#;

const SIMPLE: &str = r#"
[package]
name = "{name}"

[[version]]
version = "{v1}"
sha256 = "00"

[[version]]
version = "{v2}"
sha256 = "01"
"#;

fn simple(name: &str, v1: &str, v2: &str) -> Package {
    Package::from_str(
        &SIMPLE
            .replace("{name}", name)
            .replace("{v1}", v1)
            .replace("{v2}", v2),
    )
    .unwrap()
}

fn registry() -> Registry {
    Registry::from_packages(vec![
        Package::from_str(DAKOTA).unwrap(),
        Package::from_str(BOOST).unwrap(),
        simple("mpi", "4.1.5", "3.1.6"),
        simple("python", "3.11.4", "3.10.12"),
        simple("netlib-lapack", "3.11.0", "3.9.1"),
        simple("cmake", "3.20.2", "3.17.3"),
    ])
    .unwrap()
}

fn gcc(version: &str) -> CompilerSpec {
    CompilerSpec::parse(&format!("gcc@{version}")).unwrap()
}

fn request(spec: &str, compiler: &str) -> Request {
    Request::parse(spec, &gcc(compiler)).unwrap()
}

#[test]
fn selects_newest_version_in_range() {
    let registry = registry();
    let plan = resolve(&registry, &request("dakota@:6.12", "10.1")).unwrap();
    let root = plan.graph.root.unwrap();
    assert_eq!(plan.graph.node(root).version, Version::parse("6.12"));

    let unbounded = resolve(&registry, &request("dakota", "10.1")).unwrap();
    let root = unbounded.graph.root.unwrap();
    assert_eq!(unbounded.graph.node(root).version, Version::parse("6.20.0"));
}

#[test]
fn dakota_mpi_scenario() {
    let registry = registry();
    let plan = resolve(&registry, &request("dakota@:6.12", "10.1")).unwrap();

    // MPI dependency edge present, mpi left at its enabled default
    let root = plan.graph.root.unwrap();
    let dep_names: Vec<String> = plan
        .graph
        .dependencies_of(root)
        .iter()
        .map(|(idx, _)| plan.graph.node(*idx).name.clone())
        .collect();
    assert!(dep_names.contains(&"mpi".to_string()), "deps: {dep_names:?}");

    // Flag synthesis: variant define plus the conditional MPI block
    let dakota_flags = &plan.flags["dakota"];
    assert_eq!(dakota_flags.args[0], "-DBUILD_SHARED_LIBS:BOOL=ON");
    assert!(dakota_flags
        .args
        .contains(&"-DDAKOTA_HAVE_MPI:BOOL=ON".to_string()));
    assert!(dakota_flags
        .args
        .contains(&"-DMPI_CXX_COMPILER:STRING=mpicxx".to_string()));
}

#[test]
fn same_target_edges_merge() {
    let registry = registry();
    let plan = resolve(&registry, &request("dakota@:6.12", "10.1")).unwrap();

    // The base boost edge and the @:6.12 range narrowing act as one edge:
    // version capped at 1.68.0, required variants applied.
    let boost = plan.graph.find("boost").unwrap();
    let node = plan.graph.node(boost);
    assert_eq!(node.version, Version::parse("1.68.0"));
    assert_eq!(node.variants["filesystem"], VariantValue::Bool(true));
    assert_eq!(node.variants["system"], VariantValue::Bool(true));

    // At 6.20 the narrowing is 1.69.0:1.84.0 instead
    let plan = resolve(&registry, &request("dakota@6.18:", "10.1")).unwrap();
    let boost = plan.graph.find("boost").unwrap();
    assert_eq!(plan.graph.node(boost).version, Version::parse("1.84.0"));
}

#[test]
fn build_dependencies_carry_their_kind() {
    let registry = registry();
    let plan = resolve(&registry, &request("dakota@:6.12", "10.1")).unwrap();
    let root = plan.graph.root.unwrap();
    let cmake_edge = plan
        .graph
        .dependencies_of(root)
        .into_iter()
        .find(|(idx, _)| plan.graph.node(*idx).name == "cmake")
        .unwrap();
    assert_eq!(cmake_edge.1.kind, DepKind::Build);
}

#[test]
fn resolution_is_deterministic() {
    let registry = registry();
    let first = resolve(&registry, &request("dakota@:6.12", "10.1")).unwrap();
    let second = resolve(&registry, &request("dakota@:6.12", "10.1")).unwrap();
    assert_eq!(first.render(), second.render());

    // A freshly built registry yields the identical plan too
    let other = registry;
    let third = resolve(&other, &request("dakota@:6.12", "10.1")).unwrap();
    assert_eq!(first.render(), third.render());
}

#[test]
fn unrestricted_compiler_conflict_fails_late() {
    let registry = registry();
    let err = resolve(&registry, &request("dakota", "13.1")).unwrap_err();
    match err {
        CairnError::ConflictingConstraint { package, chain, .. } => {
            assert_eq!(package, "dakota");
            assert!(chain.contains("dakota"), "chain: {chain}");
        }
        other => panic!("expected ConflictingConstraint, got {other:?}"),
    }

    // One major version below the bound resolves fine
    assert!(resolve(&registry, &request("dakota", "12.2")).is_ok());
}

#[test]
fn version_scoped_conflicts_exclude_candidates() {
    let registry = registry();
    // Every version <= 6.12 conflicts with gcc@12:, so the range cannot
    // be satisfied at all.
    let err = resolve(&registry, &request("dakota@:6.12", "12.2")).unwrap_err();
    match err {
        CairnError::NoSatisfyingVersion {
            package,
            requested,
            reason,
        } => {
            assert_eq!(package, "dakota");
            assert_eq!(requested, ":6.12");
            assert!(reason.contains("gcc"), "reason: {reason}");
        }
        other => panic!("expected NoSatisfyingVersion, got {other:?}"),
    }
}

#[test]
fn user_override_flips_define() {
    let registry = registry();
    let plan = resolve(&registry, &request("dakota@:6.12 ~shared", "10.1")).unwrap();
    assert_eq!(
        plan.flags["dakota"].args[0],
        "-DBUILD_SHARED_LIBS:BOOL=OFF"
    );
}

#[test]
fn conditional_fortran_flag_matrix() {
    use cairn_core::recipe::FlagCategory;
    let registry = registry();

    let hit = resolve(&registry, &request("dakota@:6.12", "10.1")).unwrap();
    assert_eq!(
        hit.flags["dakota"]
            .compiler_flags
            .get(&FlagCategory::FFlags)
            .map(Vec::as_slice),
        Some(["-fallow-argument-mismatch".to_string()].as_slice())
    );

    let newer_version = resolve(&registry, &request("dakota@6.18", "10.1")).unwrap();
    assert!(newer_version.flags["dakota"].compiler_flags.is_empty());

    let older_compiler = resolve(&registry, &request("dakota@:6.12", "9.4")).unwrap();
    assert!(older_compiler.flags["dakota"].compiler_flags.is_empty());
}

#[test]
fn diamond_dependencies_share_one_node() {
    let app = Package::from_str(
        r#"
[package]
name = "app"

[[version]]
version = "1.0"
sha256 = "00"

[[dependency]]
package = "liba"

[[dependency]]
package = "libb"
"#,
    )
    .unwrap();
    let liba = Package::from_str(
        r#"
[package]
name = "liba"

[[version]]
version = "1.0"
sha256 = "00"

[[dependency]]
package = "zlib@:1.2"
"#,
    )
    .unwrap();
    let libb = Package::from_str(
        r#"
[package]
name = "libb"

[[version]]
version = "1.0"
sha256 = "00"

[[dependency]]
package = "zlib"
"#,
    )
    .unwrap();
    let registry = Registry::from_packages(vec![
        app,
        liba,
        libb,
        simple("zlib", "1.3.1", "1.2.13"),
    ])
    .unwrap();

    let plan = resolve(&registry, &request("app", "10.1")).unwrap();
    assert_eq!(plan.graph.len(), 4);

    // liba resolves first and pins zlib at 1.2.13; libb's unconstrained
    // edge reuses that node.
    let zlib = plan.graph.find("zlib").unwrap();
    assert_eq!(plan.graph.node(zlib).version, Version::parse("1.2.13"));
    assert_eq!(plan.graph.dependents_of(zlib).len(), 2);
}

#[test]
fn later_edge_range_violation_conflicts() {
    // Same diamond, but the unconstrained parent resolves first: zlib is
    // memoized at 1.3.1 and the narrower edge cannot be satisfied.
    let app = Package::from_str(
        r#"
[package]
name = "app"

[[version]]
version = "1.0"
sha256 = "00"

[[dependency]]
package = "libb"

[[dependency]]
package = "liba"
"#,
    )
    .unwrap();
    let liba = Package::from_str(
        r#"
[package]
name = "liba"

[[version]]
version = "1.0"
sha256 = "00"

[[dependency]]
package = "zlib@:1.2"
"#,
    )
    .unwrap();
    let libb = Package::from_str(
        r#"
[package]
name = "libb"

[[version]]
version = "1.0"
sha256 = "00"

[[dependency]]
package = "zlib"
"#,
    )
    .unwrap();
    let registry = Registry::from_packages(vec![
        app,
        liba,
        libb,
        simple("zlib", "1.3.1", "1.2.13"),
    ])
    .unwrap();

    let err = resolve(&registry, &request("app", "10.1")).unwrap_err();
    match err {
        CairnError::ConflictingConstraint { package, chain, .. } => {
            assert_eq!(package, "zlib");
            assert!(chain.contains("app -> liba -> zlib"), "chain: {chain}");
        }
        other => panic!("expected ConflictingConstraint, got {other:?}"),
    }
}

#[test]
fn dependency_cycle_detected() {
    let a = Package::from_str(
        r#"
[package]
name = "a"

[[version]]
version = "1.0"
sha256 = "00"

[[dependency]]
package = "b"
"#,
    )
    .unwrap();
    let b = Package::from_str(
        r#"
[package]
name = "b"

[[version]]
version = "1.0"
sha256 = "00"

[[dependency]]
package = "a"
"#,
    )
    .unwrap();
    let registry = Registry::from_packages(vec![a, b]).unwrap();
    let err = resolve(&registry, &request("a", "10.1")).unwrap_err();
    match err {
        CairnError::ConflictingConstraint { message, .. } => {
            assert!(message.contains("cycle"), "message: {message}");
        }
        other => panic!("expected ConflictingConstraint, got {other:?}"),
    }
}

#[test]
fn unknown_root_package() {
    let registry = registry();
    let err = resolve(&registry, &request("ghost", "10.1")).unwrap_err();
    assert!(matches!(err, CairnError::PackageNotFound { .. }));
}

#[test]
fn unknown_override_variant() {
    let registry = registry();
    let err = resolve(&registry, &request("dakota@:6.12 +nonexistent", "10.1")).unwrap_err();
    assert!(matches!(err, CairnError::InvalidVariantValue { .. }));
}

#[test]
fn overrides_do_not_leak_to_dependencies() {
    let registry = registry();
    // `+filesystem` is a boost variant; as a root override it must be
    // rejected against dakota rather than silently applied downstream.
    let err = resolve(&registry, &request("dakota@:6.12 +filesystem", "10.1")).unwrap_err();
    assert!(matches!(err, CairnError::InvalidVariantValue { .. }));
}

#[test]
fn plan_tree_renders_every_package() {
    let registry = registry();
    let plan = resolve(&registry, &request("dakota@:6.12", "10.1")).unwrap();
    let tree = plan.graph.print_tree();
    for name in ["dakota@6.12", "boost@1.68.0", "mpi@4.1.5", "cmake@3.20.2"] {
        assert!(tree.contains(name), "missing {name} in:\n{tree}");
    }
}
