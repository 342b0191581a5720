//! Operation: list the registry contents.

use cairn_core::registry::Registry;

pub fn exec(registry: &Registry) -> miette::Result<()> {
    if registry.is_empty() {
        println!("No recipes loaded.");
        return Ok(());
    }

    for pkg in registry.iter() {
        let newest = pkg
            .versions()
            .iter()
            .map(|e| &e.version)
            .max()
            .map(|v| v.to_string())
            .unwrap_or_default();
        match &pkg.description {
            Some(description) => println!("{}@{newest}  {description}", pkg.name),
            None => println!("{}@{newest}", pkg.name),
        }
    }

    Ok(())
}
