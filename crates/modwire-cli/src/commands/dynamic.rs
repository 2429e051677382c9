//! Handler for `modwire dynamic`.

use std::path::Path;

use miette::Result;

use modwire_core::module::ModuleId;

pub fn exec(catalog: &Path, config: Option<&Path>, module: u64, package: &str) -> Result<()> {
    let (mut resolver, environment) = super::load(catalog, config)?;
    resolver.resolve(None, &environment)?;

    match resolver.resolve_dynamic(ModuleId(module), package)? {
        Some(wire) => println!("Wired {wire}"),
        None => println!("No dynamic wire for {package} in module {module}"),
    }
    Ok(())
}
