use crate::gedcom::records::SourceSystem;
use crate::lineage::tree::{FamilyTree, PersonId};
use crate::reports::dot;
use crate::types::{Location, RenderScope, Sex};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Trait for report formatters. `root` is the person a lineage starts from;
/// `None` means the first person of the document.
pub trait ReportFormatter {
    fn format(&self, tree: &FamilyTree, root: Option<PersonId>) -> Result<String>;
}

/// People a graph rendering covers, each listed once
fn members(tree: &FamilyTree, root: Option<PersonId>, scope: RenderScope) -> Vec<PersonId> {
    match scope {
        RenderScope::Document => tree.people().map(|(id, _)| id).collect(),
        RenderScope::Lineage => match root.or_else(|| tree.first_person()) {
            Some(root) => tree.distinct_ancestry(root).map(|step| step.person).collect(),
            None => Vec::new(),
        },
    }
}

/// Indented ancestry outline: two spaces per generation
pub struct TextOutlineFormatter;

impl ReportFormatter for TextOutlineFormatter {
    fn format(&self, tree: &FamilyTree, root: Option<PersonId>) -> Result<String> {
        let Some(root) = root.or_else(|| tree.first_person()) else {
            return Ok(String::new());
        };

        let lines: Vec<String> = tree
            .ancestry(root)
            .map(|step| {
                format!(
                    "{}{}",
                    "  ".repeat(step.depth),
                    tree.person(step.person).name.as_deref().unwrap_or_default()
                )
            })
            .collect();

        Ok(lines.join("\n"))
    }
}

/// Graphviz formatter
pub struct DotFormatter {
    pub scope: RenderScope,
    pub timeline: bool,
}

impl ReportFormatter for DotFormatter {
    fn format(&self, tree: &FamilyTree, root: Option<PersonId>) -> Result<String> {
        Ok(dot::render_people(tree, members(tree, root, self.scope), self.timeline))
    }
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    charset: Option<&'a str>,
    source: Option<&'a SourceSystem>,
    people: Vec<PersonSummary<'a>>,
    families: Vec<FamilySummary<'a>>,
}

#[derive(Debug, Serialize)]
struct PersonSummary<'a> {
    xref: &'a str,
    name: Option<&'a str>,
    sex: Sex,
    birth_date: Option<&'a str>,
    birth_year: Option<u32>,
    birth_place: Option<&'a str>,
    birth_location: Option<&'a Location>,
    death_date: Option<&'a str>,
    death_year: Option<u32>,
    death_place: Option<&'a str>,
    death_location: Option<&'a Location>,
    mother: Option<&'a str>,
    father: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct FamilySummary<'a> {
    xref: &'a str,
    husband: Option<&'a str>,
    wife: Option<&'a str>,
    children: Vec<&'a str>,
}

fn xref_of(tree: &FamilyTree, id: PersonId) -> &str {
    &tree.person(id).xref
}

/// JSON formatter
pub struct JsonFormatter {
    pub scope: RenderScope,
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, tree: &FamilyTree, root: Option<PersonId>) -> Result<String> {
        let people = members(tree, root, self.scope)
            .into_iter()
            .map(|id| {
                let person = tree.person(id);
                PersonSummary {
                    xref: &person.xref,
                    name: person.name.as_deref(),
                    sex: person.sex,
                    birth_date: person.birth_date.as_deref(),
                    birth_year: person.birth_year(),
                    birth_place: person.birth_place.as_deref(),
                    birth_location: person.birth_location.location(),
                    death_date: person.death_date.as_deref(),
                    death_year: person.death_year(),
                    death_place: person.death_place.as_deref(),
                    death_location: person.death_location.location(),
                    mother: tree.mother(id).map(|id| xref_of(tree, id)),
                    father: tree.father(id).map(|id| xref_of(tree, id)),
                }
            })
            .collect();

        let families = tree
            .families()
            .map(|(_, family)| FamilySummary {
                xref: &family.xref,
                husband: family.husband.map(|id| xref_of(tree, id)),
                wife: family.wife.map(|id| xref_of(tree, id)),
                children: family.children.iter().map(|id| xref_of(tree, *id)).collect(),
            })
            .collect();

        let report = JsonReport {
            generated_at: Utc::now(),
            charset: tree.charset(),
            source: tree.source(),
            people,
            families,
        };

        Ok(serde_json::to_string_pretty(&report)?)
    }
}
