//! CLI argument definitions for modwire.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "modwire",
    version,
    about = "Resolve module catalogs into package and capability wiring",
    long_about = "modwire loads a catalog of modules from a TOML file, wires every \
                  requirement to a capability while keeping class spaces consistent, \
                  and reports what could not be resolved and why."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a catalog and print every module's state
    Resolve {
        /// Catalog fixture (TOML)
        catalog: PathBuf,
        /// Resolver configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Refresh these module ids after the first resolution and resolve again
        #[arg(long)]
        refresh: Vec<u64>,
        /// Print the wiring tree
        #[arg(long)]
        tree: bool,
        /// Maximum tree depth
        #[arg(long, requires = "tree")]
        depth: Option<usize>,
        /// Show which modules are wired to the given module (name or id)
        #[arg(long)]
        why: Option<String>,
        /// Print the full outcome as JSON
        #[arg(long, conflicts_with_all = ["tree", "why"])]
        json: bool,
    },

    /// Resolve a catalog, then wire one package through a dynamic import
    Dynamic {
        /// Catalog fixture (TOML)
        catalog: PathBuf,
        /// Resolver configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Id of the importing module
        #[arg(long)]
        module: u64,
        /// Package to wire
        #[arg(long)]
        package: String,
    },
}

/// Parse command-line arguments into a [`Cli`] struct.
pub fn parse() -> Cli {
    Cli::parse()
}
