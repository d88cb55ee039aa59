use crate::error::{GedcomError, Result};
use crate::lineage::tree::{FamilyTree, ParentRole};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// petgraph view of a family tree: one node per person, one edge per
/// resolved parent link, pointing from parent to child.
pub struct PedigreeGraph {
    graph: DiGraph<String, ParentRole>,
    node_map: HashMap<String, NodeIndex>,
}

impl PedigreeGraph {
    pub fn new(graph: DiGraph<String, ParentRole>, node_map: HashMap<String, NodeIndex>) -> Self {
        Self { graph, node_map }
    }

    pub fn from_tree(tree: &FamilyTree) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for (_, person) in tree.people() {
            let node_index = graph.add_node(person.xref.clone());
            node_map.insert(person.xref.clone(), node_index);
        }

        for (id, person) in tree.people() {
            for (role, parent) in tree.parent_links(id) {
                let parent_xref = &tree.person(parent).xref;
                if let (Some(&from_idx), Some(&to_idx)) =
                    (node_map.get(parent_xref), node_map.get(&person.xref))
                {
                    graph.add_edge(from_idx, to_idx, role);
                }
            }
        }

        debug!(
            "Pedigree graph has {} people and {} parent links",
            graph.node_count(),
            graph.edge_count()
        );
        Self::new(graph, node_map)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn index_of(&self, xref: &str) -> Result<NodeIndex> {
        self.node_map
            .get(xref)
            .copied()
            .ok_or_else(|| GedcomError::PersonNotFound(xref.to_string()))
    }

    fn reachable(&self, xref: &str, direction: Direction) -> Result<Vec<String>> {
        let start = self.index_of(xref)?;

        let mut visited = HashSet::new();
        let mut reached = Vec::new();
        let mut queue = VecDeque::new();

        queue.push_back(start);
        visited.insert(start);

        while let Some(current_index) = queue.pop_front() {
            for neighbor_index in self.graph.neighbors_directed(current_index, direction) {
                if visited.insert(neighbor_index) {
                    queue.push_back(neighbor_index);
                    if let Some(neighbor_xref) = self.graph.node_weight(neighbor_index) {
                        reached.push(neighbor_xref.clone());
                    }
                }
            }
        }

        reached.sort();
        Ok(reached)
    }

    /// Every known descendant of a person
    pub fn get_descendants(&self, xref: &str) -> Result<Vec<String>> {
        self.reachable(xref, Direction::Outgoing)
    }

    /// Every known ancestor of a person
    pub fn get_ancestors(&self, xref: &str) -> Result<Vec<String>> {
        self.reachable(xref, Direction::Incoming)
    }

    /// People with no known parents
    pub fn get_founders(&self) -> Vec<String> {
        self.nodes_without(Direction::Incoming)
    }

    /// People with no known children
    pub fn get_leaf_nodes(&self) -> Vec<String> {
        self.nodes_without(Direction::Outgoing)
    }

    fn nodes_without(&self, direction: Direction) -> Vec<String> {
        let mut nodes: Vec<String> = self
            .node_map
            .iter()
            .filter(|(_, node_index)| {
                self.graph
                    .neighbors_directed(**node_index, direction)
                    .next()
                    .is_none()
            })
            .map(|(xref, _)| xref.clone())
            .collect();
        nodes.sort();
        nodes
    }

    /// Number of parent steps on the longest ancestor chain above a person
    pub fn calculate_max_depth(&self, xref: &str) -> Result<usize> {
        let node_index = self.index_of(xref)?;
        Ok(self.generation_depths()[node_index.index()])
    }

    /// Longest ancestor chain above every person, indexed by node. Acyclic
    /// pedigrees are relaxed in topological order; cyclic data falls back to
    /// a memoised search that stops where a chain would revisit itself.
    fn generation_depths(&self) -> Vec<usize> {
        match toposort(&self.graph, None) {
            Ok(order) => {
                let mut depths = vec![0; self.graph.node_count()];
                for node_index in order {
                    let depth = depths[node_index.index()] + 1;
                    for child in self.graph.neighbors_directed(node_index, Direction::Outgoing) {
                        depths[child.index()] = depths[child.index()].max(depth);
                    }
                }
                depths
            }
            Err(cycle) => {
                debug!(
                    "Pedigree has a cycle through {}",
                    self.graph.node_weight(cycle.node_id()).map(String::as_str).unwrap_or("?")
                );
                self.generation_depths_with_cycles()
            }
        }
    }

    fn generation_depths_with_cycles(&self) -> Vec<usize> {
        let node_count = self.graph.node_count();
        let mut depths: Vec<Option<usize>> = vec![None; node_count];
        let mut on_stack = vec![false; node_count];

        for start in self.graph.node_indices() {
            if depths[start.index()].is_some() {
                continue;
            }

            on_stack[start.index()] = true;
            let mut stack = vec![DepthFrame::new(start, self.parents_of(start))];

            while let Some(frame) = stack.last_mut() {
                if let Some(&parent) = frame.parents.get(frame.next) {
                    frame.next += 1;
                    match depths[parent.index()] {
                        Some(parent_depth) => frame.best = frame.best.max(parent_depth + 1),
                        // Revisiting the current chain: count the link, stop there
                        None if on_stack[parent.index()] => frame.best = frame.best.max(1),
                        None => {
                            on_stack[parent.index()] = true;
                            stack.push(DepthFrame::new(parent, self.parents_of(parent)));
                        }
                    }
                    continue;
                }

                let node = frame.node;
                let best = frame.best;
                stack.pop();
                depths[node.index()] = Some(best);
                on_stack[node.index()] = false;
                if let Some(child_frame) = stack.last_mut() {
                    child_frame.best = child_frame.best.max(best + 1);
                }
            }
        }

        depths.into_iter().map(Option::unwrap_or_default).collect()
    }

    fn parents_of(&self, node_index: NodeIndex) -> Vec<NodeIndex> {
        self.graph.neighbors_directed(node_index, Direction::Incoming).collect()
    }

    /// Whether `ancestor` is reachable upward from `descendant`
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let target = self.index_of(ancestor)?;
        let start = self.index_of(descendant)?;

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited.insert(start);

        while let Some(current_index) = queue.pop_front() {
            for parent_index in self.graph.neighbors_directed(current_index, Direction::Incoming) {
                if parent_index == target {
                    return Ok(true);
                }
                if visited.insert(parent_index) {
                    queue.push_back(parent_index);
                }
            }
        }

        Ok(false)
    }

    pub fn get_statistics(&self) -> PedigreeStatistics {
        let total_people = self.node_count();
        let parent_links = self.edge_count();
        let max_generations = self
            .generation_depths()
            .into_iter()
            .max()
            .map(|depth| depth + 1)
            .unwrap_or(0);

        let average_parents = if total_people > 0 {
            parent_links as f64 / total_people as f64
        } else {
            0.0
        };

        PedigreeStatistics {
            total_people,
            parent_links,
            founders: self.get_founders().len(),
            leaf_people: self.get_leaf_nodes().len(),
            max_generations,
            average_parents,
        }
    }
}

struct DepthFrame {
    node: NodeIndex,
    parents: Vec<NodeIndex>,
    next: usize,
    best: usize,
}

impl DepthFrame {
    fn new(node: NodeIndex, parents: Vec<NodeIndex>) -> Self {
        Self {
            node,
            parents,
            next: 0,
            best: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PedigreeStatistics {
    pub total_people: usize,
    pub parent_links: usize,
    pub founders: usize,
    pub leaf_people: usize,
    pub max_generations: usize,
    pub average_parents: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::fixtures::ladder;
    use crate::lineage::linker::TreeLinker;

    // I1 + I2 -> I3; I3 + I4 -> I5
    fn create_test_graph() -> PedigreeGraph {
        let tree = TreeLinker::from_text(
            "\
0 @I1@ INDI
0 @I2@ INDI
0 @I3@ INDI
1 FAMC @F1@
0 @I4@ INDI
0 @I5@ INDI
1 FAMC @F2@
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
1 CHIL @I3@
0 @F2@ FAM
1 HUSB @I3@
1 WIFE @I4@
1 CHIL @I5@
",
        );
        PedigreeGraph::from_tree(&tree)
    }

    #[test]
    fn test_counts() {
        let graph = create_test_graph();

        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn test_get_ancestors() {
        let graph = create_test_graph();

        assert_eq!(graph.get_ancestors("@I5@").unwrap(), vec!["@I1@", "@I2@", "@I3@", "@I4@"]);
        assert!(graph.get_ancestors("@I1@").unwrap().is_empty());
        assert!(graph.get_ancestors("@I99@").is_err());
    }

    #[test]
    fn test_get_descendants() {
        let graph = create_test_graph();

        assert_eq!(graph.get_descendants("@I1@").unwrap(), vec!["@I3@", "@I5@"]);
        assert!(graph.get_descendants("@I5@").unwrap().is_empty());
    }

    #[test]
    fn test_founders_and_leaves() {
        let graph = create_test_graph();

        assert_eq!(graph.get_founders(), vec!["@I1@", "@I2@", "@I4@"]);
        assert_eq!(graph.get_leaf_nodes(), vec!["@I5@"]);
    }

    #[test]
    fn test_is_ancestor() {
        let graph = create_test_graph();

        assert!(graph.is_ancestor("@I1@", "@I5@").unwrap());
        assert!(graph.is_ancestor("@I4@", "@I5@").unwrap());
        assert!(!graph.is_ancestor("@I5@", "@I1@").unwrap());
        assert!(!graph.is_ancestor("@I4@", "@I3@").unwrap());
    }

    #[test]
    fn test_calculate_max_depth() {
        let graph = create_test_graph();

        assert_eq!(graph.calculate_max_depth("@I5@").unwrap(), 2);
        assert_eq!(graph.calculate_max_depth("@I3@").unwrap(), 1);
        assert_eq!(graph.calculate_max_depth("@I1@").unwrap(), 0);
    }

    #[test]
    fn test_max_depth_survives_cycles() {
        let tree = TreeLinker::from_text(
            "0 @I1@ INDI\n1 FAMC @F1@\n0 @I2@ INDI\n1 FAMC @F2@\n0 @F1@ FAM\n1 WIFE @I2@\n0 @F2@ FAM\n1 HUSB @I1@\n",
        );
        let graph = PedigreeGraph::from_tree(&tree);

        // The chain stops where it would revisit I1
        assert_eq!(graph.calculate_max_depth("@I1@").unwrap(), 2);
        assert!(graph.get_founders().is_empty());
    }

    #[test]
    fn test_statistics_on_intermarried_ladder() {
        let tree = TreeLinker::from_text(&ladder(40));
        let graph = PedigreeGraph::from_tree(&tree);

        let stats = graph.get_statistics();
        assert_eq!(stats.total_people, 80);
        assert_eq!(stats.parent_links, 156);
        assert_eq!(stats.founders, 2);
        assert_eq!(stats.max_generations, 40);
        assert_eq!(graph.calculate_max_depth("@H39@").unwrap(), 39);
    }

    #[test]
    fn test_statistics_with_cycle_and_collapse() {
        let mut text = ladder(30);
        // H0 becomes a child of the youngest couple
        text.push_str("0 @H0@ INDI\n1 FAMC @F29@\n0 @F29@ FAM\n1 HUSB @H29@\n1 WIFE @W29@\n1 CHIL @H0@\n");
        let graph = PedigreeGraph::from_tree(&TreeLinker::from_text(&text));

        let stats = graph.get_statistics();
        assert_eq!(stats.total_people, 60);
        assert!(stats.max_generations >= 30);
    }

    #[test]
    fn test_statistics() {
        let stats = create_test_graph().get_statistics();

        assert_eq!(stats.total_people, 5);
        assert_eq!(stats.parent_links, 4);
        assert_eq!(stats.founders, 3);
        assert_eq!(stats.leaf_people, 1);
        assert_eq!(stats.max_generations, 3);
        assert!((stats.average_parents - 0.8).abs() < f64::EPSILON);
    }
}
