//! Command dispatch and handler modules.

mod info;
mod list;
mod resolve;

use std::path::PathBuf;

use miette::Result;

use cairn_core::compiler::CompilerSpec;
use cairn_core::errors::CairnError;
use cairn_core::registry::Registry;

use crate::cli::{Cli, Command};
use crate::config::CairnConfig;

const DEFAULT_RECIPE_DIR: &str = "recipes";
const DEFAULT_COMPILER: &str = "gcc@12.2";

/// Route a parsed CLI invocation to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = CairnConfig::load()?;

    let recipe_dir: PathBuf = cli
        .recipes
        .or(config.recipes)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RECIPE_DIR));
    let registry = Registry::load_dir(&recipe_dir)?;

    let compiler_spec = cli
        .compiler
        .or(config.compiler)
        .unwrap_or_else(|| DEFAULT_COMPILER.to_string());
    let compiler = CompilerSpec::parse(&compiler_spec).ok_or_else(|| CairnError::Config {
        message: format!("invalid compiler `{compiler_spec}` (expected `name@version`)"),
    })?;
    tracing::debug!("using compiler %{compiler}");

    match cli.command {
        Command::Resolve {
            spec,
            flags,
            json,
            why,
        } => resolve::exec(
            &registry,
            &compiler,
            &spec.join(" "),
            flags,
            json,
            why.as_deref(),
        ),
        Command::Info { package } => info::exec(&registry, &package),
        Command::List => list::exec(&registry),
    }
}
