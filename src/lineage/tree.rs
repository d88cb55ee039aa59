use crate::error::{GedcomError, Result};
use crate::gedcom::records::{HeaderRecord, SourceSystem};
use crate::lineage::traversal::{direct_ancestor_ids, AncestryWalk, DistinctAncestryWalk};
use crate::types::{PlaceLookup, Sex};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());

/// Year of a free-text GEDCOM date: the first run of exactly four decimal
/// digits. `"ABT 1850"` gives 1850; `"12345"` and `"no digits"` give nothing.
pub fn extract_year(date: &str) -> Option<u32> {
    DIGIT_RUN
        .find_iter(date)
        .find(|run| run.as_str().len() == 4)
        .and_then(|run| run.as_str().parse().ok())
}

/// Handle of a person inside one [`FamilyTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PersonId(usize);

/// Handle of a family inside one [`FamilyTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FamilyId(usize);

impl PersonId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl FamilyId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Which parent a pedigree link goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentRole {
    Mother,
    Father,
}

impl ParentRole {
    pub fn label(self) -> &'static str {
        match self {
            ParentRole::Mother => "mother",
            ParentRole::Father => "father",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub xref: String,
    pub name: Option<String>,
    pub sex: Sex,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
    pub death_date: Option<String>,
    pub death_place: Option<String>,
    /// Family in which this person is a child
    pub child_of_family: Option<FamilyId>,
    /// Family in which this person is a spouse
    pub spouse_in_family: Option<FamilyId>,
    pub birth_location: PlaceLookup,
    pub death_location: PlaceLookup,
}

impl Person {
    pub fn new(xref: impl Into<String>) -> Self {
        Self {
            xref: xref.into(),
            name: None,
            sex: Sex::Unknown,
            birth_date: None,
            birth_place: None,
            death_date: None,
            death_place: None,
            child_of_family: None,
            spouse_in_family: None,
            birth_location: PlaceLookup::NotRequested,
            death_location: PlaceLookup::NotRequested,
        }
    }

    pub fn birth_year(&self) -> Option<u32> {
        self.birth_date.as_deref().and_then(extract_year)
    }

    pub fn death_year(&self) -> Option<u32> {
        self.death_date.as_deref().and_then(extract_year)
    }

    /// `1850-1901`, `1850-`, `-1901`, or nothing when neither year is known
    pub fn life_span(&self) -> Option<String> {
        match (self.birth_year(), self.death_year()) {
            (None, None) => None,
            (birth, death) => Some(format!(
                "{}-{}",
                birth.map(|year| year.to_string()).unwrap_or_default(),
                death.map(|year| year.to_string()).unwrap_or_default()
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Family {
    pub xref: String,
    pub husband: Option<PersonId>,
    pub wife: Option<PersonId>,
    /// Source order, duplicates kept
    pub children: Vec<PersonId>,
}

impl Family {
    pub fn new(xref: impl Into<String>) -> Self {
        Self {
            xref: xref.into(),
            husband: None,
            wife: None,
            children: Vec::new(),
        }
    }
}

/// A linked GEDCOM document: header details plus people and families in
/// first-seen order. Parent relations are derived from `child_of_family`
/// on every read and never stored.
#[derive(Debug, Clone, Default)]
pub struct FamilyTree {
    header: HeaderRecord,
    people: Vec<Person>,
    families: Vec<Family>,
    person_index: HashMap<String, PersonId>,
    family_index: HashMap<String, FamilyId>,
}

impl FamilyTree {
    pub fn new(header: HeaderRecord) -> Self {
        Self {
            header,
            ..Self::default()
        }
    }

    pub fn header(&self) -> &HeaderRecord {
        &self.header
    }

    pub fn charset(&self) -> Option<&str> {
        self.header.charset.as_deref()
    }

    pub fn source(&self) -> Option<&SourceSystem> {
        self.header.source.as_ref()
    }

    /// Register a person; an xref seen before keeps its handle and position.
    pub fn add_person(&mut self, person: Person) -> PersonId {
        if let Some(&id) = self.person_index.get(&person.xref) {
            self.people[id.0] = person;
            return id;
        }
        let id = PersonId(self.people.len());
        self.person_index.insert(person.xref.clone(), id);
        self.people.push(person);
        id
    }

    /// Register a family; an xref seen before keeps its handle and position.
    pub fn add_family(&mut self, family: Family) -> FamilyId {
        if let Some(&id) = self.family_index.get(&family.xref) {
            self.families[id.0] = family;
            return id;
        }
        let id = FamilyId(self.families.len());
        self.family_index.insert(family.xref.clone(), id);
        self.families.push(family);
        id
    }

    pub fn person(&self, id: PersonId) -> &Person {
        &self.people[id.0]
    }

    pub fn person_mut(&mut self, id: PersonId) -> &mut Person {
        &mut self.people[id.0]
    }

    pub fn family(&self, id: FamilyId) -> &Family {
        &self.families[id.0]
    }

    pub fn family_mut(&mut self, id: FamilyId) -> &mut Family {
        &mut self.families[id.0]
    }

    pub fn find_person(&self, xref: &str) -> Option<PersonId> {
        self.person_index.get(xref).copied()
    }

    pub fn find_family(&self, xref: &str) -> Option<FamilyId> {
        self.family_index.get(xref).copied()
    }

    pub fn people(&self) -> impl Iterator<Item = (PersonId, &Person)> + '_ {
        self.people
            .iter()
            .enumerate()
            .map(|(index, person)| (PersonId(index), person))
    }

    pub fn people_mut(&mut self) -> impl Iterator<Item = &mut Person> + '_ {
        self.people.iter_mut()
    }

    pub fn families(&self) -> impl Iterator<Item = (FamilyId, &Family)> + '_ {
        self.families
            .iter()
            .enumerate()
            .map(|(index, family)| (FamilyId(index), family))
    }

    pub fn person_count(&self) -> usize {
        self.people.len()
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    /// First person in source order
    pub fn first_person(&self) -> Option<PersonId> {
        if self.people.is_empty() {
            None
        } else {
            Some(PersonId(0))
        }
    }

    /// Explicit root by xref, or the first person when none is given.
    pub fn resolve_root(&self, xref: Option<&str>) -> Result<Option<PersonId>> {
        match xref {
            Some(xref) => self
                .find_person(xref)
                .map(Some)
                .ok_or_else(|| GedcomError::PersonNotFound(xref.to_string())),
            None => Ok(self.first_person()),
        }
    }

    pub fn mother(&self, id: PersonId) -> Option<PersonId> {
        self.person(id)
            .child_of_family
            .and_then(|family| self.family(family).wife)
    }

    pub fn father(&self, id: PersonId) -> Option<PersonId> {
        self.person(id)
            .child_of_family
            .and_then(|family| self.family(family).husband)
    }

    /// Known parents, mother first
    pub fn parent_links(&self, id: PersonId) -> Vec<(ParentRole, PersonId)> {
        let mut links = Vec::with_capacity(2);
        if let Some(mother) = self.mother(id) {
            links.push((ParentRole::Mother, mother));
        }
        if let Some(father) = self.father(id) {
            links.push((ParentRole::Father, father));
        }
        links
    }

    /// Lazy depth-first walk over `root` and its ancestors
    pub fn ancestry(&self, root: PersonId) -> AncestryWalk<'_> {
        AncestryWalk::new(self, root)
    }

    /// Like [`FamilyTree::ancestry`], but each ancestor is yielded once
    pub fn distinct_ancestry(&self, root: PersonId) -> DistinctAncestryWalk<'_> {
        DistinctAncestryWalk::new(self, root)
    }

    /// Drop everyone who is not `root` or one of its ancestors. Families are
    /// kept; links to removed people are cleared. Person handles taken before
    /// the call are invalidated. Returns the number of people removed.
    pub fn retain_direct_ancestors(&mut self, root: PersonId) -> usize {
        let keep = direct_ancestor_ids(self, root);
        let before = self.people.len();

        let mut remap: HashMap<PersonId, PersonId> = HashMap::with_capacity(keep.len());
        let mut retained = Vec::with_capacity(keep.len());
        for (index, person) in std::mem::take(&mut self.people).into_iter().enumerate() {
            if keep.contains(&PersonId(index)) {
                remap.insert(PersonId(index), PersonId(retained.len()));
                retained.push(person);
            } else {
                debug!("Pruning {} (not a direct ancestor)", person.xref);
            }
        }
        self.people = retained;

        for family in &mut self.families {
            family.husband = family.husband.and_then(|id| remap.get(&id).copied());
            family.wife = family.wife.and_then(|id| remap.get(&id).copied());
            family.children = family
                .children
                .iter()
                .filter_map(|id| remap.get(id).copied())
                .collect();
        }

        self.person_index = self
            .people
            .iter()
            .enumerate()
            .map(|(index, person)| (person.xref.clone(), PersonId(index)))
            .collect();

        let removed = before - self.people.len();
        info!("Kept {} direct ancestors, removed {} people", self.people.len(), removed);
        removed
    }
}
