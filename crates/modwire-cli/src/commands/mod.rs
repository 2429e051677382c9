//! Command dispatch and handler modules.

mod dynamic;
mod resolve;

use std::path::Path;

use miette::Result;

use modwire_core::catalog::CatalogFixture;
use modwire_core::config::ResolverConfig;
use modwire_core::environment::Environment;
use modwire_resolver::resolver::Resolver;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Resolve {
            catalog,
            config,
            refresh,
            tree,
            depth,
            why,
            json,
        } => resolve::exec(
            &catalog,
            config.as_deref(),
            &refresh,
            &resolve::ReportOptions {
                tree,
                depth,
                why,
                json,
            },
        ),
        Command::Dynamic {
            catalog,
            config,
            module,
            package,
        } => dynamic::exec(&catalog, config.as_deref(), module, &package),
    }
}

/// Load a catalog fixture and bind it to a fresh resolver.
fn load(catalog: &Path, config: Option<&Path>) -> Result<(Resolver, Environment)> {
    let fixture = CatalogFixture::from_path(catalog)?;
    let config = match config {
        Some(path) => ResolverConfig::load(path)?,
        None => ResolverConfig::default(),
    };
    let (catalog, environment) = fixture.into_catalog();
    tracing::debug!(modules = catalog.len(), "catalog loaded");
    Ok((Resolver::with_catalog(config, catalog), environment))
}
