//! Operation: show one recipe in detail.

use console::style;

use cairn_core::recipe::{DepKind, Provenance};
use cairn_core::registry::Registry;

pub fn exec(registry: &Registry, name: &str) -> miette::Result<()> {
    let pkg = registry.get(name)?;

    println!("{}", style(&pkg.name).bold());
    if let Some(ref description) = pkg.description {
        println!("  {description}");
    }
    if let Some(ref homepage) = pkg.homepage {
        println!("  {homepage}");
    }

    println!();
    println!("Versions:");
    for entry in pkg.versions() {
        let provenance = match &entry.provenance {
            Provenance::Checksum { algorithm, digest } => {
                format!("{algorithm} {}", shorten(digest, 12))
            }
            Provenance::Git { tag, commit, .. } => {
                format!("tag {tag} commit {}", shorten(commit, 10))
            }
        };
        println!("  {}  ({provenance})", entry.version);
    }

    if !pkg.variants().is_empty() {
        println!();
        println!("Variants:");
        for (vname, variant) in pkg.variants() {
            let values = if variant.values.is_empty() {
                String::new()
            } else {
                format!(" [{}]", variant.values.join(", "))
            };
            let description = if variant.description.is_empty() {
                String::new()
            } else {
                format!("  {}", variant.description)
            };
            println!("  {vname}={}{values}{description}", variant.default);
        }
    }

    if !pkg.dependencies().is_empty() {
        println!();
        println!("Dependencies:");
        for dep in pkg.dependencies() {
            let mut line = dep.package.clone();
            if !dep.range.is_any() {
                line.push_str(&format!("@{}", dep.range));
            }
            if dep.kind == DepKind::Build {
                line.push_str("  [build]");
            }
            if !dep.when.is_always() {
                line.push_str(&format!("  when {}", dep.when));
            }
            println!("  {line}");
        }
    }

    if !pkg.conflicts().is_empty() {
        println!();
        println!("Conflicts:");
        for conflict in pkg.conflicts() {
            println!("  {conflict}");
        }
    }

    Ok(())
}

fn shorten(s: &str, n: usize) -> &str {
    &s[..s.len().min(n)]
}
