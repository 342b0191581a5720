//! CLI argument definitions for Cairn.
//!
//! Uses `clap` derive macros to define the full command surface. Each
//! command corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "cairn",
    version,
    about = "A recipe-driven build planner",
    long_about = "Cairn loads declarative package recipes and concretizes build plans: \
                  concrete versions, variants, and build flags for a package and its \
                  full dependency graph."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding package recipes
    #[arg(long, global = true)]
    pub recipes: Option<PathBuf>,

    /// Compiler to build with, as `name@version`
    #[arg(long, global = true)]
    pub compiler: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Concretize a build plan for a request spec
    Resolve {
        /// Request spec, e.g. `dakota@:6.12 +mpi %gcc@10.1`
        #[arg(required = true)]
        spec: Vec<String>,
        /// Print the synthesized build arguments per package
        #[arg(long)]
        flags: bool,
        /// Emit the full plan as JSON
        #[arg(long)]
        json: bool,
        /// Show the dependency chain leading to one package in the plan
        #[arg(long)]
        why: Option<String>,
    },

    /// Show one recipe: versions, variants, dependencies, conflicts
    Info {
        /// Package name
        package: String,
    },

    /// List every recipe in the registry
    List,
}

pub fn parse() -> Cli {
    Cli::parse()
}
