//! Operation: concretize a build plan and print it.

use std::collections::BTreeMap;

use console::style;
use serde_json::json;

use cairn_core::compiler::CompilerSpec;
use cairn_core::registry::Registry;
use cairn_resolver::resolver::{self, Request, Resolution};

pub fn exec(
    registry: &Registry,
    default_compiler: &CompilerSpec,
    spec: &str,
    show_flags: bool,
    json: bool,
    why: Option<&str>,
) -> miette::Result<()> {
    let request = Request::parse(spec, default_compiler)?;
    let plan = resolver::resolve(registry, &request)?;

    if let Some(target) = why {
        match plan.graph.find_path(target) {
            Some(path) => {
                println!("Path to {target}:");
                for (i, node) in path.iter().enumerate() {
                    let indent = "  ".repeat(i);
                    println!("{indent}{node}");
                }
            }
            None => println!("Package '{target}' is not part of this plan."),
        }
        return Ok(());
    }

    if json {
        println!("{:#}", plan_json(&request, &plan));
        return Ok(());
    }

    print!("{}", plan.graph.print_tree());

    if show_flags {
        for (name, flags) in &plan.flags {
            if flags.is_empty() {
                continue;
            }
            println!();
            println!("{}", style(format!("[{name}]")).bold());
            for arg in &flags.args {
                println!("  {arg}");
            }
            for (category, list) in &flags.compiler_flags {
                println!("  {category}: {}", list.join(" "));
            }
        }
    }

    Ok(())
}

fn plan_json(request: &Request, plan: &Resolution) -> serde_json::Value {
    let packages: Vec<serde_json::Value> = plan
        .graph
        .all_nodes()
        .iter()
        .map(|node| {
            let dependencies = plan
                .graph
                .find(&node.name)
                .map(|idx| plan.graph.dependency_names(idx))
                .unwrap_or_default();
            let variants: BTreeMap<&str, String> = node
                .variants
                .iter()
                .map(|(name, value)| (name.as_str(), value.to_string()))
                .collect();
            let flags = plan.flags.get(&node.name);
            let compiler_flags: BTreeMap<String, &[String]> = flags
                .map(|f| {
                    f.compiler_flags
                        .iter()
                        .map(|(category, list)| (category.to_string(), list.as_slice()))
                        .collect()
                })
                .unwrap_or_default();
            json!({
                "name": node.name,
                "version": node.version.to_string(),
                "compiler": node.compiler.to_string(),
                "variants": variants,
                "dependencies": dependencies,
                "args": flags.map(|f| f.args.as_slice()).unwrap_or_default(),
                "compiler_flags": compiler_flags,
            })
        })
        .collect();

    json!({
        "root": request.package,
        "packages": packages,
    })
}
