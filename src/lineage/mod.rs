pub mod graph;
pub mod linker;
pub mod traversal;
pub mod tree;

pub use graph::{PedigreeGraph, PedigreeStatistics};
pub use linker::TreeLinker;
pub use traversal::{AncestryStep, AncestryWalk, DistinctAncestryWalk};
pub use tree::{extract_year, Family, FamilyId, FamilyTree, ParentRole, Person, PersonId};
