pub mod level_tree;
pub mod loader;
pub mod records;

pub use level_tree::{LevelTree, RawNode};
pub use loader::GedcomParser;
pub use records::{ExtractedRecords, FamilyRecord, HeaderRecord, IndividualRecord, RecordKind, SourceSystem};
