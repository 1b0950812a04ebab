//! Entry/exit redirects so no edge handed to the primitive touches a compound node.

use crate::model::Subgraph;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct RedirectMaps {
    pub entry: FxHashMap<String, String>,
    pub exit: FxHashMap<String, String>,
}

impl RedirectMaps {
    /// `owned` maps a subgraph to its directly owned nodes; `precomputed` maps a placeholder id
    /// to every id inside it.
    pub fn build(
        subgraphs: &[Subgraph],
        owned: &FxHashMap<String, Vec<String>>,
        precomputed: &FxHashMap<&str, &FxHashSet<String>>,
    ) -> Self {
        let mut maps = Self::default();
        for sg in subgraphs {
            maps.visit(sg, owned, precomputed);
        }
        maps
    }

    fn visit(
        &mut self,
        sg: &Subgraph,
        owned: &FxHashMap<String, Vec<String>>,
        precomputed: &FxHashMap<&str, &FxHashSet<String>>,
    ) {
        if let Some(ids) = precomputed.get(sg.id.as_str()) {
            for id in ids.iter().chain(std::iter::once(&sg.id)) {
                self.entry.insert(id.clone(), sg.id.clone());
                self.exit.insert(id.clone(), sg.id.clone());
            }
            return;
        }

        for child in &sg.children {
            self.visit(child, owned, precomputed);
        }

        let members: Vec<&str> = owned
            .get(&sg.id)
            .into_iter()
            .flatten()
            .map(String::as_str)
            .chain(sg.children.iter().map(|c| c.id.as_str()))
            .collect();

        let (Some(first), Some(last)) = (members.first(), members.last()) else {
            self.entry.insert(sg.id.clone(), sg.id.clone());
            self.exit.insert(sg.id.clone(), sg.id.clone());
            return;
        };
        let entry = self.target(first).to_string();
        let exit = self.source(last).to_string();
        self.entry.insert(sg.id.clone(), entry);
        self.exit.insert(sg.id.clone(), exit);
    }

    /// Where an edge leaving `id` starts.
    pub fn source<'a>(&'a self, id: &'a str) -> &'a str {
        self.exit.get(id).map(String::as_str).unwrap_or(id)
    }

    /// Where an edge arriving at `id` ends.
    pub fn target<'a>(&'a self, id: &'a str) -> &'a str {
        self.entry.get(id).map(String::as_str).unwrap_or(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(pairs: &[(&str, &[&str])]) -> FxHashMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn compound_resolves_first_and_last_members() {
        let tree = vec![
            Subgraph::new("S", "S")
                .with_nodes(["a", "b"])
                .with_child(Subgraph::new("T", "T").with_nodes(["c", "d"])),
        ];
        let owned = owned(&[("S", &["a", "b"]), ("T", &["c", "d"])]);
        let maps = RedirectMaps::build(&tree, &owned, &FxHashMap::default());
        assert_eq!(maps.target("T"), "c");
        assert_eq!(maps.source("T"), "d");
        assert_eq!(maps.target("S"), "a");
        // Last direct member of S is the nested subgraph, resolved through its exit.
        assert_eq!(maps.source("S"), "d");
        assert_eq!(maps.source("a"), "a");
    }

    #[test]
    fn empty_subgraph_maps_to_itself() {
        let tree = vec![Subgraph::new("E", "Empty")];
        let maps = RedirectMaps::build(&tree, &FxHashMap::default(), &FxHashMap::default());
        assert_eq!(maps.target("E"), "E");
        assert_eq!(maps.source("E"), "E");
    }

    #[test]
    fn precomputed_interior_maps_to_placeholder() {
        let tree = vec![
            Subgraph::new("outer", "Outer")
                .with_nodes(["x"])
                .with_child(Subgraph::new("P", "P").with_nodes(["p1", "p2"])),
        ];
        let owned = owned(&[("outer", &["x"]), ("P", &["p1", "p2"])]);
        let interior: FxHashSet<String> = ["p1", "p2"].iter().map(|s| s.to_string()).collect();
        let mut pre = FxHashMap::default();
        pre.insert("P", &interior);
        let maps = RedirectMaps::build(&tree, &owned, &pre);
        assert_eq!(maps.target("p1"), "P");
        assert_eq!(maps.source("p2"), "P");
        assert_eq!(maps.target("P"), "P");
        assert_eq!(maps.target("outer"), "x");
        assert_eq!(maps.source("outer"), "P");
    }
}
