use indexmap::IndexMap;
use petgraph::unionfind::UnionFind;
use std::collections::HashMap;

use crate::graph::ConceptGraph;

/// Weakly connected components, each listed in first-appearance order.
///
/// The component holding the root always comes first.
pub fn connected_components(graph: &ConceptGraph) -> Vec<Vec<String>> {
    let names = graph.concept_names();
    let index: HashMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let mut sets = UnionFind::<usize>::new(names.len());
    for (subject, _, object) in graph.edges() {
        sets.union(index[subject], index[object]);
    }

    let mut groups: IndexMap<usize, Vec<String>> = IndexMap::new();
    for (i, name) in names.iter().enumerate() {
        groups.entry(sets.find(i)).or_default().push(name.to_string());
    }

    groups.into_values().collect()
}

/// Link the root to every other component so the map is one connected web.
///
/// Each isolated component is attached through its first concept that has
/// outgoing relations (its local root), or its first concept otherwise.
/// Returns the number of bridging edges added.
pub fn bridge_components(graph: &mut ConceptGraph, relation: &str) -> usize {
    let components = connected_components(graph);
    if components.len() <= 1 {
        return 0;
    }

    let Some(root) = graph.root().map(str::to_string) else {
        return 0;
    };

    let mut added = 0;
    for component in components.iter().skip(1) {
        let anchor = component
            .iter()
            .find(|name| graph.contains_key(name))
            .or_else(|| component.first());

        if let Some(anchor) = anchor {
            if graph.add_relation(&root, relation, anchor) {
                added += 1;
            }
        }
    }

    tracing::info!(
        components = components.len(),
        bridges = added,
        "Bridged isolated concept sub-graphs"
    );

    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::Triple;

    #[test]
    fn test_two_components() {
        let graph = ConceptGraph::from_triples(&[
            Triple::new("A", "is", "B"),
            Triple::new("C", "has", "D"),
            Triple::new("B", "needs", "E"),
        ]);

        let components = connected_components(&graph);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0], vec!["A", "B", "E"]);
        assert_eq!(components[1], vec!["C", "D"]);
    }

    #[test]
    fn test_bridging_connects_everything() {
        let mut graph = ConceptGraph::from_triples(&[
            Triple::new("A", "is", "B"),
            Triple::new("C", "has", "D"),
            Triple::new("E", "has", "F"),
        ]);

        let added = bridge_components(&mut graph, "relates to");

        assert_eq!(added, 2);
        assert_eq!(connected_components(&graph).len(), 1);
        assert_eq!(graph.relations("A").unwrap()["relates to"], vec!["C", "E"]);
    }

    #[test]
    fn test_cycle_is_one_component() {
        let mut graph = ConceptGraph::from_triples(&[
            Triple::new("A", "is", "B"),
            Triple::new("B", "is", "A"),
        ]);

        assert_eq!(connected_components(&graph).len(), 1);
        assert_eq!(bridge_components(&mut graph, "relates to"), 0);
    }
}
