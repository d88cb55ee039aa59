use crate::gedcom::level_tree::{LevelTree, RawNode};
use crate::types::Sex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const HEADER_TAG: &str = "HEAD";
pub const INDIVIDUAL_MARKER: &str = "INDI";
pub const FAMILY_MARKER: &str = "FAM";

/// Source system named in the header's `SOUR` entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSystem {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderRecord {
    pub charset: Option<String>,
    pub source: Option<SourceSystem>,
    pub gedcom_version: Option<String>,
}

impl HeaderRecord {
    /// Whether the declared charset decodes correctly as UTF-8. An absent
    /// `CHAR` counts as UTF-8; ASCII is a subset of it.
    pub fn declares_utf8(&self) -> bool {
        match self.charset.as_deref().map(str::trim) {
            None => true,
            Some(charset) => ["UTF-8", "UTF8", "ASCII"]
                .iter()
                .any(|known| charset.eq_ignore_ascii_case(known)),
        }
    }
}

/// Individual record with family references still held as raw xrefs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndividualRecord {
    pub xref: String,
    pub name: Option<String>,
    pub sex: Sex,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
    pub death_date: Option<String>,
    pub death_place: Option<String>,
    pub child_of_family: Option<String>,
    pub spouse_in_family: Option<String>,
}

/// Family record with member references still held as raw xrefs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyRecord {
    pub xref: String,
    pub husband: Option<String>,
    pub wife: Option<String>,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Individual,
    Family,
    /// Carries a value that is neither marker (NOTE, SOUR, REPO...)
    Other,
    /// No value at all (TRLR, SUBM blocks without xref...)
    Unclassified,
}

impl RecordKind {
    pub fn of(node: &RawNode) -> Self {
        match node.value() {
            Some(INDIVIDUAL_MARKER) => RecordKind::Individual,
            Some(FAMILY_MARKER) => RecordKind::Family,
            Some(_) => RecordKind::Other,
            None => RecordKind::Unclassified,
        }
    }
}

/// Output of the classification pass. Individuals and families keep
/// first-seen order; no cross-reference has been resolved yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedRecords {
    pub header: Option<HeaderRecord>,
    pub individuals: Vec<IndividualRecord>,
    pub families: Vec<FamilyRecord>,
    individual_index: HashMap<String, usize>,
    family_index: HashMap<String, usize>,
}

impl ExtractedRecords {
    /// Single pass over the top-level records of a level tree.
    pub fn classify(tree: LevelTree) -> Self {
        let mut records = tree.into_records();
        let mut extracted = ExtractedRecords::default();

        match records.iter().position(|record| record.tag == HEADER_TAG) {
            Some(index) => {
                let header = records.remove(index);
                extracted.header = Some(parse_header(&header));
            }
            None => warn!("No {} record found; charset and source are unknown", HEADER_TAG),
        }

        let mut skipped = 0usize;
        for record in &records {
            match RecordKind::of(record) {
                RecordKind::Individual => extracted.add_individual(parse_individual(record)),
                RecordKind::Family => extracted.add_family(parse_family(record)),
                RecordKind::Other => {
                    debug!("Ignoring {} record {}", record.value().unwrap_or_default(), record.tag);
                    skipped += 1;
                }
                RecordKind::Unclassified => {
                    debug!("Ignoring unclassified record {}", record.tag);
                    skipped += 1;
                }
            }
        }

        info!(
            "Classified {} individuals and {} families ({} records ignored)",
            extracted.individuals.len(),
            extracted.families.len(),
            skipped
        );

        extracted
    }

    /// A repeated individual xref replaces the earlier fields in place.
    fn add_individual(&mut self, record: IndividualRecord) {
        match self.individual_index.get(&record.xref) {
            Some(&position) => {
                debug!("Individual {} defined more than once", record.xref);
                self.individuals[position] = record;
            }
            None => {
                self.individual_index.insert(record.xref.clone(), self.individuals.len());
                self.individuals.push(record);
            }
        }
    }

    /// A repeated family xref replaces the spouses and appends its children.
    fn add_family(&mut self, record: FamilyRecord) {
        match self.family_index.get(&record.xref) {
            Some(&position) => {
                debug!("Family {} defined more than once", record.xref);
                let existing = &mut self.families[position];
                existing.husband = record.husband;
                existing.wife = record.wife;
                existing.children.extend(record.children);
            }
            None => {
                self.family_index.insert(record.xref.clone(), self.families.len());
                self.families.push(record);
            }
        }
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn parse_header(node: &RawNode) -> HeaderRecord {
    HeaderRecord {
        charset: owned(node.value_at(&["CHAR"])),
        source: node.child("SOUR").map(|source| SourceSystem {
            id: owned(source.value()),
            name: owned(source.value_at(&["NAME"])),
            version: owned(source.value_at(&["VERS"])),
        }),
        gedcom_version: owned(node.value_at(&["GEDC", "VERS"])),
    }
}

fn parse_individual(node: &RawNode) -> IndividualRecord {
    if node.children_tagged("FAMC").nth(1).is_some() {
        debug!("{} is a child in several families; following the first", node.tag);
    }

    IndividualRecord {
        xref: node.tag.clone(),
        name: owned(node.value_at(&["NAME"])),
        sex: node.value_at(&["SEX"]).map(Sex::from_tag).unwrap_or_default(),
        birth_date: owned(node.value_at(&["BIRT", "DATE"])),
        birth_place: owned(node.value_at(&["BIRT", "PLAC"])),
        death_date: owned(node.value_at(&["DEAT", "DATE"])),
        death_place: owned(node.value_at(&["DEAT", "PLAC"])),
        child_of_family: owned(node.value_at(&["FAMC"])),
        spouse_in_family: owned(node.value_at(&["FAMS"])),
    }
}

fn parse_family(node: &RawNode) -> FamilyRecord {
    FamilyRecord {
        xref: node.tag.clone(),
        husband: owned(node.value_at(&["HUSB"])),
        wife: owned(node.value_at(&["WIFE"])),
        children: node
            .children_tagged("CHIL")
            .filter_map(RawNode::value)
            .map(str::to_string)
            .collect(),
    }
}
