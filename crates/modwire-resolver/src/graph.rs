//! Wiring graph over a resolution outcome: tree printing, "why" paths and
//! reverse dependencies.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use modwire_core::module::{ModuleId, ModuleState};
use modwire_core::outcome::ResolutionOutcome;
use modwire_core::requirement::Namespace;
use modwire_core::version::Version;

/// A module in the wiring graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleNode {
    pub id: ModuleId,
    pub name: String,
    pub version: Version,
    pub state: ModuleState,
}

impl fmt::Display for ModuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} [{}]", self.name, self.version, self.id)?;
        if self.state != ModuleState::Resolved {
            write!(f, " ({})", self.state)?;
        }
        Ok(())
    }
}

/// All wires from one module to one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireEdge {
    /// Wired names per namespace.
    pub names: BTreeMap<Namespace, Vec<String>>,
}

impl fmt::Display for WireEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .names
            .iter()
            .map(|(ns, names)| format!("{ns} {}", names.join(", ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Requirer-to-provider graph built from committed wires, backed by petgraph.
pub struct WiringGraph {
    graph: DiGraph<ModuleNode, WireEdge>,
    index: HashMap<ModuleId, NodeIndex>,
}

impl WiringGraph {
    pub fn from_outcome(outcome: &ResolutionOutcome) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for m in outcome.modules.values() {
            let idx = graph.add_node(ModuleNode {
                id: m.id,
                name: m.name.clone(),
                version: m.version.clone(),
                state: m.state,
            });
            index.insert(m.id, idx);
        }

        let mut edges: BTreeMap<(ModuleId, ModuleId), WireEdge> = BTreeMap::new();
        for m in outcome.modules.values() {
            for wire in &m.wiring.wires {
                if wire.provider == wire.requirer || !index.contains_key(&wire.provider) {
                    continue;
                }
                let names = edges
                    .entry((wire.requirer, wire.provider))
                    .or_default()
                    .names
                    .entry(wire.namespace.clone())
                    .or_default();
                if !names.contains(&wire.name) {
                    names.push(wire.name.clone());
                }
            }
        }
        for ((from, to), edge) in edges {
            graph.add_edge(index[&from], index[&to], edge);
        }
        Self { graph, index }
    }

    /// Look up a module by numeric id, or else by name.
    pub fn find(&self, key: &str) -> Option<NodeIndex> {
        if let Ok(id) = key.parse::<u64>() {
            if let Some(&idx) = self.index.get(&ModuleId(id)) {
                return Some(idx);
            }
        }
        self.sorted_nodes()
            .into_iter()
            .find(|&idx| self.graph[idx].name == key)
    }

    pub fn node(&self, idx: NodeIndex) -> &ModuleNode {
        &self.graph[idx]
    }

    /// Providers a module is wired to.
    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &WireEdge)> {
        let mut deps: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect();
        deps.sort_by_key(|(n, _)| self.graph[*n].id);
        deps
    }

    /// Modules wired to this one.
    pub fn dependents_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &WireEdge)> {
        let mut deps: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.source(), e.weight()))
            .collect();
        deps.sort_by_key(|(n, _)| self.graph[*n].id);
        deps
    }

    fn sorted_nodes(&self) -> Vec<NodeIndex> {
        let mut nodes: Vec<NodeIndex> = self.graph.node_indices().collect();
        nodes.sort_by_key(|&idx| self.graph[idx].id);
        nodes
    }

    /// Modules nothing is wired to, plus one entry point into every cycle
    /// not reachable from those.
    pub fn roots(&self) -> Vec<NodeIndex> {
        let nodes = self.sorted_nodes();
        let mut roots: Vec<NodeIndex> = nodes
            .iter()
            .copied()
            .filter(|&idx| self.dependents_of(idx).is_empty())
            .collect();
        let mut covered = HashSet::new();
        for &root in &roots {
            self.mark_reachable(root, &mut covered);
        }
        for idx in nodes {
            if !covered.contains(&idx) {
                roots.push(idx);
                self.mark_reachable(idx, &mut covered);
            }
        }
        roots
    }

    fn mark_reachable(&self, start: NodeIndex, covered: &mut HashSet<NodeIndex>) {
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            if covered.insert(idx) {
                stack.extend(self.graph.edges(idx).map(|e| e.target()));
            }
        }
    }

    /// Print every root with the modules it is wired to.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = String::new();
        for root in self.roots() {
            output.push_str(&format!("{}\n", self.graph[root]));
            let mut visited = HashSet::from([root]);
            let deps = self.dependencies_of(root);
            let count = deps.len();
            for (i, (idx, edge)) in deps.into_iter().enumerate() {
                let is_last = i == count - 1;
                self.print_subtree(&mut output, idx, edge, "", is_last, 1, max_depth, &mut visited);
            }
        }
        output
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        edge: &WireEdge,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let node = &self.graph[idx];
        output.push_str(&format!("{prefix}{connector}{node} ({edge})\n"));

        if let Some(max) = max_depth {
            if depth >= max {
                return;
            }
        }

        if !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let deps = self.dependencies_of(idx);
        let count = deps.len();
        for (i, (child, child_edge)) in deps.into_iter().enumerate() {
            let is_last = i == count - 1;
            self.print_subtree(
                output,
                child,
                child_edge,
                &child_prefix,
                is_last,
                depth + 1,
                max_depth,
                visited,
            );
        }

        visited.remove(&idx);
    }

    /// Path from a root to the given module, explaining why it is wired in.
    pub fn find_path(&self, target_key: &str) -> Option<Vec<&ModuleNode>> {
        let target = self.find(target_key)?;
        for root in self.roots() {
            let mut path = Vec::new();
            let mut visited = HashSet::new();
            if self.dfs_path(root, target, &mut path, &mut visited) {
                return Some(path.iter().map(|&idx| &self.graph[idx]).collect());
            }
        }
        None
    }

    fn dfs_path(
        &self,
        current: NodeIndex,
        target: NodeIndex,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
    ) -> bool {
        path.push(current);
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            path.pop();
            return false;
        }
        for (next, _) in self.dependencies_of(current) {
            if self.dfs_path(next, target, path, visited) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Reverse tree: the module followed by everything wired to it.
    pub fn print_inverted_tree(&self, target_key: &str) -> String {
        let mut output = String::new();
        let Some(idx) = self.find(target_key) else {
            return output;
        };
        output.push_str(&format!("{}\n", self.graph[idx]));

        let mut visited = HashSet::from([idx]);
        let dependents = self.dependents_of(idx);
        let count = dependents.len();
        for (i, (dep, _)) in dependents.into_iter().enumerate() {
            self.print_inverted_subtree(&mut output, dep, "", i == count - 1, &mut visited);
        }
        output
    }

    fn print_inverted_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        output.push_str(&format!("{prefix}{connector}{}\n", self.graph[idx]));

        if !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let dependents = self.dependents_of(idx);
        let count = dependents.len();
        for (i, (dep, _)) in dependents.into_iter().enumerate() {
            self.print_inverted_subtree(output, dep, &child_prefix, i == count - 1, visited);
        }

        visited.remove(&idx);
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modwire_core::outcome::ModuleOutcome;
    use modwire_core::wiring::{ModuleWiring, RequirementRef, Wire};

    fn module(id: u64, name: &str, wires: Vec<(u64, &str)>) -> ModuleOutcome {
        ModuleOutcome {
            id: ModuleId(id),
            name: name.to_string(),
            version: Version::new(1, 0, 0),
            previous_state: ModuleState::Unresolved,
            state: ModuleState::Resolved,
            wiring: ModuleWiring::new(
                wires
                    .into_iter()
                    .enumerate()
                    .map(|(i, (provider, package))| Wire {
                        namespace: Namespace::Package,
                        name: package.to_string(),
                        requirer: ModuleId(id),
                        requirement: RequirementRef::declared(ModuleId(id), i),
                        provider: ModuleId(provider),
                        capability: None,
                    })
                    .collect(),
            ),
            errors: Vec::new(),
            hosts: Vec::new(),
        }
    }

    fn outcome(modules: Vec<ModuleOutcome>) -> ResolutionOutcome {
        let mut outcome = ResolutionOutcome::default();
        for m in modules {
            outcome.modules.insert(m.id, m);
        }
        outcome
    }

    #[test]
    fn tree_printing() {
        let g = WiringGraph::from_outcome(&outcome(vec![
            module(1, "app", vec![(2, "org.lib"), (3, "org.log"), (2, "org.lib.spi")]),
            module(2, "lib", vec![(3, "org.log")]),
            module(3, "log", vec![]),
        ]));
        let tree = g.print_tree(None);
        assert!(tree.starts_with("app:1.0.0 [1]\n"));
        assert!(tree.contains("├── lib:1.0.0 [2] (package org.lib, org.lib.spi)"));
        assert!(tree.contains("│   └── log:1.0.0 [3] (package org.log)"));
        assert!(tree.contains("└── log:1.0.0 [3] (package org.log)"));
    }

    #[test]
    fn cycles_still_get_a_root() {
        let g = WiringGraph::from_outcome(&outcome(vec![
            module(1, "a", vec![(2, "q")]),
            module(2, "b", vec![(1, "p")]),
        ]));
        let roots = g.roots();
        assert_eq!(roots.len(), 1);
        assert_eq!(g.node(roots[0]).name, "a");
        assert!(g.print_tree(None).contains("b:1.0.0 [2]"));
    }

    #[test]
    fn path_and_dependents() {
        let g = WiringGraph::from_outcome(&outcome(vec![
            module(1, "app", vec![(2, "org.lib")]),
            module(2, "lib", vec![(3, "org.log")]),
            module(3, "log", vec![]),
            module(4, "tool", vec![(3, "org.log")]),
        ]));
        let path = g.find_path("log").unwrap();
        let names: Vec<&str> = path.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["app", "lib", "log"]);
        assert!(g.find_path("missing").is_none());

        let log = g.find("3").unwrap();
        assert_eq!(g.dependents_of(log).len(), 2);
        let inverted = g.print_inverted_tree("log");
        assert!(inverted.starts_with("log:1.0.0 [3]\n"));
        assert!(inverted.contains("lib:1.0.0 [2]"));
        assert!(inverted.contains("tool:1.0.0 [4]"));
        assert_eq!(g.len(), 4);
    }
}
