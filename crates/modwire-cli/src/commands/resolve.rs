//! Handler for `modwire resolve`.

use std::path::Path;

use miette::Result;

use modwire_core::module::ModuleId;
use modwire_core::outcome::ResolutionOutcome;
use modwire_resolver::graph::WiringGraph;
use modwire_util::errors::ModwireError;

pub struct ReportOptions {
    pub tree: bool,
    pub depth: Option<usize>,
    pub why: Option<String>,
    pub json: bool,
}

pub fn exec(catalog: &Path, config: Option<&Path>, refresh: &[u64], opts: &ReportOptions) -> Result<()> {
    let (mut resolver, environment) = super::load(catalog, config)?;

    let mut outcome = resolver.resolve(None, &environment)?;
    if !refresh.is_empty() {
        let ids: Vec<ModuleId> = refresh.iter().copied().map(ModuleId).collect();
        outcome = resolver.resolve(Some(&ids), &environment)?;
    }

    if opts.json {
        let json = serde_json::to_string_pretty(&outcome).map_err(|e| ModwireError::Generic {
            message: format!("Failed to serialize outcome: {e}"),
        })?;
        println!("{json}");
        return Ok(());
    }

    print_states(&outcome);
    print!("{outcome}");

    let graph = WiringGraph::from_outcome(&outcome);
    if opts.tree {
        println!();
        print!("{}", graph.print_tree(opts.depth));
    }
    if let Some(ref target) = opts.why {
        if graph.find(target).is_none() {
            return Err(ModwireError::Generic {
                message: format!("Module '{target}' not found in the catalog"),
            }
            .into());
        }
        println!();
        if let Some(path) = graph.find_path(target) {
            let chain: Vec<String> = path.iter().map(|n| n.to_string()).collect();
            println!("{}", chain.join(" -> "));
        }
        print!("{}", graph.print_inverted_tree(target));
    }
    Ok(())
}

fn print_states(outcome: &ResolutionOutcome) {
    for m in outcome.modules.values() {
        println!(
            "{:<10} {}:{} [{}]",
            m.state.to_string(),
            m.name,
            m.version,
            m.id
        );
    }
}
