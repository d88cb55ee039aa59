use crate::lineage::tree::{FamilyTree, PersonId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One entry of an ancestry walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncestryStep {
    pub person: PersonId,
    pub depth: usize,
}

/// Lazy pre-order walk over the derived mother/father tree: the root at
/// depth 0, then the whole maternal branch, then the paternal branch.
///
/// The walk keeps an explicit stack plus the list of people on the current
/// path. A parent already on that path closes the branch, so cyclic data
/// terminates. The same person reached through two different descendants is
/// still yielded twice (pedigree collapse); renderers dedupe on their side.
#[derive(Debug, Clone)]
pub struct AncestryWalk<'a> {
    tree: &'a FamilyTree,
    stack: Vec<AncestryStep>,
    path: Vec<PersonId>,
}

impl<'a> AncestryWalk<'a> {
    pub fn new(tree: &'a FamilyTree, root: PersonId) -> Self {
        Self {
            tree,
            stack: vec![AncestryStep {
                person: root,
                depth: 0,
            }],
            path: Vec::new(),
        }
    }
}

impl Iterator for AncestryWalk<'_> {
    type Item = AncestryStep;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(step) = self.stack.pop() {
            // Everything deeper than this step belongs to a finished branch
            self.path.truncate(step.depth);

            if self.path.contains(&step.person) {
                debug!(
                    "Cycle at {}: already an ancestor on this path",
                    self.tree.person(step.person).xref
                );
                continue;
            }
            self.path.push(step.person);

            // Father first so that the mother is popped first
            for parent in [self.tree.father(step.person), self.tree.mother(step.person)]
                .into_iter()
                .flatten()
            {
                self.stack.push(AncestryStep {
                    person: parent,
                    depth: step.depth + 1,
                });
            }

            return Some(step);
        }

        None
    }
}

/// Pre-order walk that yields each ancestor once, at the position and depth
/// of its first appearance in [`AncestryWalk`]. A person already yielded has
/// its whole branch skipped, which also closes every cycle, so the walk does
/// at most one step per person however much the pedigree collapses.
#[derive(Debug, Clone)]
pub struct DistinctAncestryWalk<'a> {
    tree: &'a FamilyTree,
    stack: Vec<AncestryStep>,
    emitted: HashSet<PersonId>,
}

impl<'a> DistinctAncestryWalk<'a> {
    pub fn new(tree: &'a FamilyTree, root: PersonId) -> Self {
        Self {
            tree,
            stack: vec![AncestryStep {
                person: root,
                depth: 0,
            }],
            emitted: HashSet::new(),
        }
    }
}

impl Iterator for DistinctAncestryWalk<'_> {
    type Item = AncestryStep;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(step) = self.stack.pop() {
            if !self.emitted.insert(step.person) {
                continue;
            }

            for parent in [self.tree.father(step.person), self.tree.mother(step.person)]
                .into_iter()
                .flatten()
                .filter(|parent| !self.emitted.contains(parent))
            {
                self.stack.push(AncestryStep {
                    person: parent,
                    depth: step.depth + 1,
                });
            }

            return Some(step);
        }

        None
    }
}

/// Distinct people reached by the ancestry walk from `root`, root included
pub fn direct_ancestor_ids(tree: &FamilyTree, root: PersonId) -> HashSet<PersonId> {
    DistinctAncestryWalk::new(tree, root).map(|step| step.person).collect()
}

/// Number of generations on the longest ancestor chain above `root` (1 for
/// a person with no known parents). A parent already on the chain ends it,
/// as in [`AncestryWalk`]; each person's chain length is computed once.
pub fn generation_count(tree: &FamilyTree, root: PersonId) -> usize {
    let mut heights: HashMap<PersonId, usize> = HashMap::new();
    let mut on_chain: HashSet<PersonId> = HashSet::from([root]);
    // (person, parents, next parent, tallest parent chain so far)
    let mut stack = vec![(root, parents(tree, root), 0usize, 0usize)];

    while let Some((person, parents_of_person, next, best)) = stack.last_mut() {
        if let Some(&parent) = parents_of_person.get(*next) {
            *next += 1;
            if let Some(&height) = heights.get(&parent) {
                *best = (*best).max(height);
            } else if on_chain.insert(parent) {
                stack.push((parent, parents(tree, parent), 0, 0));
            }
            continue;
        }

        let person = *person;
        let height = *best + 1;
        stack.pop();
        on_chain.remove(&person);
        heights.insert(person, height);
        if let Some((_, _, _, child_best)) = stack.last_mut() {
            *child_best = (*child_best).max(height);
        }
    }

    heights.get(&root).copied().unwrap_or(1)
}

fn parents(tree: &FamilyTree, person: PersonId) -> Vec<PersonId> {
    tree.parent_links(person).into_iter().map(|(_, parent)| parent).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::fixtures::ladder;
    use crate::lineage::linker::TreeLinker;

    fn walk_xrefs(tree: &FamilyTree, root: &str) -> Vec<(String, usize)> {
        let root = tree.find_person(root).unwrap();
        tree.ancestry(root)
            .map(|step| (tree.person(step.person).xref.clone(), step.depth))
            .collect()
    }

    const THREE_GENERATIONS: &str = "\
0 @I1@ INDI
1 FAMC @F1@
0 @I2@ INDI
1 FAMC @F2@
0 @I3@ INDI
1 FAMC @F3@
0 @I4@ INDI
0 @I5@ INDI
0 @I6@ INDI
0 @I7@ INDI
0 @F1@ FAM
1 HUSB @I3@
1 WIFE @I2@
1 CHIL @I1@
0 @F2@ FAM
1 HUSB @I5@
1 WIFE @I4@
1 CHIL @I2@
0 @F3@ FAM
1 HUSB @I7@
1 WIFE @I6@
1 CHIL @I3@
";

    #[test]
    fn test_walk_is_preorder_mother_before_father() {
        let tree = TreeLinker::from_text(THREE_GENERATIONS);

        let expected: Vec<(String, usize)> = [
            ("@I1@", 0),
            ("@I2@", 1),
            ("@I4@", 2),
            ("@I5@", 2),
            ("@I3@", 1),
            ("@I6@", 2),
            ("@I7@", 2),
        ]
        .iter()
        .map(|(xref, depth)| (xref.to_string(), *depth))
        .collect();

        assert_eq!(walk_xrefs(&tree, "@I1@"), expected);
        assert_eq!(generation_count(&tree, tree.find_person("@I1@").unwrap()), 3);
    }

    #[test]
    fn test_walk_is_restartable() {
        let tree = TreeLinker::from_text(THREE_GENERATIONS);
        let root = tree.find_person("@I1@").unwrap();

        let walk = tree.ancestry(root);
        let first: Vec<_> = walk.clone().collect();
        let second: Vec<_> = walk.collect();
        assert_eq!(first, second);
        assert_eq!(tree.ancestry(root).take(2).count(), 2);
    }

    #[test]
    fn test_walk_of_person_without_parents() {
        let tree = TreeLinker::from_text(THREE_GENERATIONS);
        assert_eq!(walk_xrefs(&tree, "@I7@"), vec![("@I7@".to_string(), 0)]);
    }

    #[test]
    fn test_mutual_parent_cycle_terminates() {
        let tree = TreeLinker::from_text(
            "0 @I1@ INDI\n1 FAMC @F1@\n0 @I2@ INDI\n1 FAMC @F2@\n0 @F1@ FAM\n1 WIFE @I2@\n0 @F2@ FAM\n1 HUSB @I1@\n",
        );
        let root = tree.find_person("@I1@").unwrap();

        let steps: Vec<_> = tree.ancestry(root).take(100).collect();
        assert_eq!(steps.len(), 2);
        assert_eq!(walk_xrefs(&tree, "@I1@"), vec![
            ("@I1@".to_string(), 0),
            ("@I2@".to_string(), 1),
        ]);
    }

    #[test]
    fn test_own_parent_cycle_terminates() {
        let tree = TreeLinker::from_text("0 @I1@ INDI\n1 FAMC @F1@\n0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I1@\n");

        assert_eq!(walk_xrefs(&tree, "@I1@"), vec![("@I1@".to_string(), 0)]);
    }

    #[test]
    fn test_pedigree_collapse_is_not_a_cycle() {
        // Cousins marry: both parents of I1 share grandmother I6
        let tree = TreeLinker::from_text(
            "\
0 @I1@ INDI
1 FAMC @F1@
0 @I2@ INDI
1 FAMC @F2@
0 @I3@ INDI
1 FAMC @F3@
0 @I6@ INDI
0 @F1@ FAM
1 WIFE @I2@
1 HUSB @I3@
0 @F2@ FAM
1 WIFE @I6@
0 @F3@ FAM
1 WIFE @I6@
",
        );
        let root = tree.find_person("@I1@").unwrap();

        let walked: Vec<_> = walk_xrefs(&tree, "@I1@").into_iter().map(|(xref, _)| xref).collect();
        assert_eq!(walked, vec!["@I1@", "@I2@", "@I6@", "@I3@", "@I6@"]);
        assert_eq!(direct_ancestor_ids(&tree, root).len(), 4);
    }

    #[test]
    fn test_distinct_walk_keeps_first_appearances() {
        let tree = TreeLinker::from_text(THREE_GENERATIONS);
        let root = tree.find_person("@I1@").unwrap();

        let full: Vec<_> = tree.ancestry(root).collect();
        let distinct: Vec<_> = DistinctAncestryWalk::new(&tree, root).collect();
        assert_eq!(distinct, full);
    }

    #[test]
    fn test_distinct_walk_on_collapsed_ladder() {
        let tree = TreeLinker::from_text(&ladder(40));
        let root = tree.find_person("@H39@").unwrap();

        let steps: Vec<_> = DistinctAncestryWalk::new(&tree, root).take(1_000).collect();
        assert_eq!(steps.len(), 79);
        assert_eq!(steps[0], AncestryStep { person: root, depth: 0 });
        assert_eq!(tree.person(steps[1].person).xref, "@W38@");

        let unique: HashSet<_> = steps.iter().map(|step| step.person).collect();
        assert_eq!(unique.len(), steps.len());
        assert_eq!(direct_ancestor_ids(&tree, root).len(), 79);
        assert_eq!(generation_count(&tree, root), 40);
    }

    #[test]
    fn test_distinct_walk_and_generations_survive_cycles() {
        let tree = TreeLinker::from_text(
            "0 @I1@ INDI\n1 FAMC @F1@\n0 @I2@ INDI\n1 FAMC @F2@\n0 @F1@ FAM\n1 WIFE @I2@\n0 @F2@ FAM\n1 HUSB @I1@\n",
        );
        let root = tree.find_person("@I1@").unwrap();

        let distinct: Vec<_> = DistinctAncestryWalk::new(&tree, root).take(10).map(|step| step.person).collect();
        assert_eq!(distinct, vec![root, tree.find_person("@I2@").unwrap()]);
        assert_eq!(generation_count(&tree, root), 2);
    }
}
