use crate::error::Result;
use crate::gedcom::level_tree::LevelTree;
use crate::gedcom::loader::GedcomParser;
use crate::gedcom::records::ExtractedRecords;
use crate::lineage::tree::{Family, FamilyId, FamilyTree, Person, PersonId};
use std::path::Path;
use tracing::{debug, info};

/// Raw references waiting for the second pass
struct PendingPerson {
    id: PersonId,
    child_of_family: Option<String>,
    spouse_in_family: Option<String>,
}

struct PendingFamily {
    id: FamilyId,
    husband: Option<String>,
    wife: Option<String>,
    children: Vec<String>,
}

/// Turns extracted records into a linked [`FamilyTree`].
///
/// Every record is registered before any reference is resolved, so a family
/// may point at a person defined further down the file and vice versa.
/// References that do not resolve are dropped, never reported as errors.
pub struct TreeLinker;

impl TreeLinker {
    pub fn link(records: ExtractedRecords) -> FamilyTree {
        let mut tree = FamilyTree::new(records.header.unwrap_or_default());

        // First pass: register every person and family
        info!("Linking family tree - registering records");
        let pending_people: Vec<PendingPerson> = records
            .individuals
            .into_iter()
            .map(|record| {
                let mut person = Person::new(record.xref);
                person.name = record.name;
                person.sex = record.sex;
                person.birth_date = record.birth_date;
                person.birth_place = record.birth_place;
                person.death_date = record.death_date;
                person.death_place = record.death_place;

                PendingPerson {
                    id: tree.add_person(person),
                    child_of_family: record.child_of_family,
                    spouse_in_family: record.spouse_in_family,
                }
            })
            .collect();

        let pending_families: Vec<PendingFamily> = records
            .families
            .into_iter()
            .map(|record| PendingFamily {
                id: tree.add_family(Family::new(record.xref)),
                husband: record.husband,
                wife: record.wife,
                children: record.children,
            })
            .collect();

        // Second pass: resolve references
        info!("Linking family tree - resolving references");
        let mut unresolved = 0usize;

        for pending in pending_people {
            let child_of_family = resolve_family(&tree, pending.child_of_family.as_deref(), &mut unresolved);
            let spouse_in_family = resolve_family(&tree, pending.spouse_in_family.as_deref(), &mut unresolved);

            let person = tree.person_mut(pending.id);
            person.child_of_family = child_of_family;
            person.spouse_in_family = spouse_in_family;
        }

        for pending in pending_families {
            let husband = resolve_person(&tree, pending.husband.as_deref(), &mut unresolved);
            let wife = resolve_person(&tree, pending.wife.as_deref(), &mut unresolved);
            let children: Vec<PersonId> = pending
                .children
                .iter()
                .filter_map(|xref| resolve_person(&tree, Some(xref), &mut unresolved))
                .collect();

            let family = tree.family_mut(pending.id);
            family.husband = husband;
            family.wife = wife;
            family.children = children;
        }

        info!(
            "Family tree linked with {} people and {} families ({} unresolved references)",
            tree.person_count(),
            tree.family_count(),
            unresolved
        );

        tree
    }

    /// Parse, classify and link GEDCOM text
    pub fn from_text(text: &str) -> FamilyTree {
        Self::link(ExtractedRecords::classify(LevelTree::parse(text)))
    }

    /// Read, parse, classify and link a GEDCOM file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FamilyTree> {
        let mut parser = GedcomParser::new(path);
        let records = parser.extract_records()?;
        Ok(Self::link(records))
    }
}

fn resolve_family(tree: &FamilyTree, xref: Option<&str>, unresolved: &mut usize) -> Option<FamilyId> {
    let xref = xref?;
    let found = tree.find_family(xref);
    if found.is_none() {
        debug!("Family reference {} does not resolve", xref);
        *unresolved += 1;
    }
    found
}

fn resolve_person(tree: &FamilyTree, xref: Option<&str>, unresolved: &mut usize) -> Option<PersonId> {
    let xref = xref?;
    let found = tree.find_person(xref);
    if found.is_none() {
        debug!("Person reference {} does not resolve", xref);
        *unresolved += 1;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sex;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_forward_references_resolve() {
        // Family appears before the people it names
        let tree = TreeLinker::from_text(
            "0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I3@\n0 @I3@ INDI\n1 FAMC @F1@\n0 @I1@ INDI\n1 SEX M\n1 FAMS @F1@\n0 @I2@ INDI\n1 FAMS @F1@\n",
        );
        let family_id = tree.find_family("@F1@").unwrap();
        let family = tree.family(family_id);
        let child = tree.find_person("@I3@").unwrap();

        assert_eq!(family.husband, tree.find_person("@I1@"));
        assert_eq!(family.wife, tree.find_person("@I2@"));
        assert_eq!(family.children, vec![child]);
        assert_eq!(tree.person(child).child_of_family, Some(family_id));
        assert_eq!(tree.person(family.husband.unwrap()).spouse_in_family, Some(family_id));
        assert_eq!(tree.person(family.husband.unwrap()).sex, Sex::Male);
    }

    #[test]
    fn test_insertion_order_is_first_seen() {
        let tree = TreeLinker::from_text("0 @I9@ INDI\n0 @I2@ INDI\n0 @F1@ FAM\n0 @I5@ INDI\n");

        let xrefs: Vec<_> = tree.people().map(|(_, person)| person.xref.clone()).collect();
        assert_eq!(xrefs, vec!["@I9@", "@I2@", "@I5@"]);
        assert_eq!(tree.family_count(), 1);
    }

    #[test]
    fn test_unresolved_references_are_left_absent() {
        let tree = TreeLinker::from_text(
            "0 @I1@ INDI\n1 FAMC @F404@\n1 FAMS @F1@\n0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I404@\n1 CHIL @I405@\n1 CHIL @I1@\n",
        );
        let person = tree.person(tree.find_person("@I1@").unwrap());
        let family = tree.family(tree.find_family("@F1@").unwrap());

        assert_eq!(person.child_of_family, None);
        assert!(person.spouse_in_family.is_some());
        assert_eq!(family.wife, None);
        assert_eq!(family.children, vec![tree.find_person("@I1@").unwrap()]);
    }

    #[test]
    fn test_duplicate_children_are_kept() {
        let tree = TreeLinker::from_text("0 @I1@ INDI\n0 @F1@ FAM\n1 CHIL @I1@\n1 CHIL @I1@\n");
        let family = tree.family(tree.find_family("@F1@").unwrap());

        assert_eq!(family.children.len(), 2);
    }

    #[test]
    fn test_header_details_carry_over() {
        let tree = TreeLinker::from_text("0 HEAD\n1 SOUR GRAMPS\n2 VERS 5.1\n1 CHAR UTF-8\n");

        assert_eq!(tree.charset(), Some("UTF-8"));
        assert_eq!(tree.source().and_then(|source| source.id.as_deref()), Some("GRAMPS"));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("family.ged");
        fs::write(&path, "0 HEAD\n1 CHAR UTF-8\n0 @I1@ INDI\n1 NAME Solo /Person/\n0 TRLR\n").unwrap();

        let tree = TreeLinker::from_file(&path).unwrap();
        assert_eq!(tree.person_count(), 1);
        assert!(TreeLinker::from_file(temp_dir.path().join("absent.ged")).is_err());
    }
}
