use crate::lineage::tree::{FamilyTree, Person, PersonId};
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write;

/// Quote a Graphviz ID, escaping backslashes, quotes and line breaks.
pub fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => {}
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

/// Multi-line label: each line quoted on its own, joined by Graphviz `\n`.
fn label(lines: &[String]) -> String {
    let escaped: Vec<String> = lines
        .iter()
        .map(|line| {
            let quoted = quote(line);
            quoted[1..quoted.len() - 1].to_string()
        })
        .collect();
    format!("\"{}\"", escaped.join("\\n"))
}

fn year_node(year: u32) -> String {
    quote(&format!("year_{}", year))
}

/// Label lines for a person node: name, then optional years and places
pub fn person_label(person: &Person) -> Vec<String> {
    let mut lines = vec![person.name.clone().unwrap_or_else(|| person.xref.clone())];
    if let Some(span) = person.life_span() {
        lines.push(span);
    }
    if let Some(location) = person.birth_location.location() {
        lines.push(format!("born: {}", location));
    }
    if let Some(location) = person.death_location.location() {
        lines.push(format!("died: {}", location));
    }
    lines
}

/// Low-level writer for a `digraph` document
pub struct DotWriter {
    out: String,
}

impl DotWriter {
    pub fn new(name: &str) -> Self {
        let mut out = String::new();
        let _ = writeln!(out, "digraph {} {{", quote(name));
        out.push_str("  node [shape=box];\n");
        Self { out }
    }

    pub fn node(&mut self, id: &str, label_lines: &[String]) {
        let _ = writeln!(self.out, "  {} [label={}];", quote(id), label(label_lines));
    }

    pub fn edge(&mut self, from: &str, to: &str, edge_label: &str) {
        let _ = writeln!(
            self.out,
            "  {} -> {} [label={}];",
            quote(from),
            quote(to),
            quote(edge_label)
        );
    }

    /// Plaintext year nodes chained in ascending order
    pub fn timeline(&mut self, years: &BTreeSet<u32>) {
        if years.is_empty() {
            return;
        }

        self.out.push_str("  subgraph timeline {\n");
        self.out.push_str("    node [shape=plaintext];\n");
        for year in years {
            let _ = writeln!(self.out, "    {} [label={}];", year_node(*year), quote(&year.to_string()));
        }
        if years.len() > 1 {
            let chain: Vec<String> = years.iter().map(|year| year_node(*year)).collect();
            let _ = writeln!(self.out, "    {};", chain.join(" -> "));
        }
        self.out.push_str("  }\n");
    }

    pub fn same_rank(&mut self, year: u32, id: &str) {
        let _ = writeln!(self.out, "  {{ rank=same; {}; {}; }}", year_node(year), quote(id));
    }

    pub fn finish(mut self) -> String {
        self.out.push_str("}\n");
        self.out
    }
}

/// Render `members` as a digraph. Each person is declared once however often
/// they appear in `members`; parent edges point from parent to child and are
/// only drawn between declared people. With the timeline on, every parent
/// with a known birth year shares a rank with that year's node.
pub fn render_people(tree: &FamilyTree, members: impl IntoIterator<Item = PersonId>, timeline: bool) -> String {
    let mut writer = DotWriter::new("gedcom");
    let mut seen = HashSet::new();
    let mut emitted = Vec::new();

    for id in members {
        if !seen.insert(id) {
            continue;
        }
        let person = tree.person(id);
        writer.node(&person.xref, &person_label(person));
        emitted.push(id);
    }

    let mut parents = HashSet::new();
    for &id in &emitted {
        let child = &tree.person(id).xref;
        for (role, parent) in tree.parent_links(id) {
            if seen.contains(&parent) {
                writer.edge(&tree.person(parent).xref, child, role.label());
                parents.insert(parent);
            }
        }
    }

    if timeline {
        let years: BTreeSet<u32> = emitted
            .iter()
            .filter_map(|&id| tree.person(id).birth_year())
            .collect();
        writer.timeline(&years);

        for &id in emitted.iter().filter(|id| parents.contains(*id)) {
            let person = tree.person(id);
            if let Some(year) = person.birth_year() {
                writer.same_rank(year, &person.xref);
            }
        }
    }

    writer.finish()
}
