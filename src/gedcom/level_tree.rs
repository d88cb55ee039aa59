use serde::Serialize;
use tracing::{debug, warn};

/// One node of the level tree. A GEDCOM line may carry a value and still own
/// nested lines, so both are kept side by side instead of behind a sentinel key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawNode {
    pub tag: String,
    pub value: Option<String>,
    pub children: Vec<RawNode>,
}

impl RawNode {
    pub fn new(tag: impl Into<String>, value: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            value,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: RawNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// First child carrying `tag`
    pub fn child(&self, tag: &str) -> Option<&RawNode> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Every child carrying `tag`, in source order
    pub fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a RawNode> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// Value found by descending a fixed tag path, taking the first match at
    /// each step. `["BIRT", "DATE"]` reads `1 BIRT / 2 DATE <value>`.
    pub fn value_at(&self, path: &[&str]) -> Option<&str> {
        let mut node = self;
        for tag in path {
            node = node.child(tag)?;
        }
        node.value()
    }

    fn write_lines(&self, level: usize, lines: &mut Vec<String>) {
        match &self.value {
            Some(value) => lines.push(format!("{} {} {}", level, self.tag, value)),
            None => lines.push(format!("{} {}", level, self.tag)),
        }
        for child in &self.children {
            child.write_lines(level + 1, lines);
        }
    }
}

/// Parsed form of a single `<level> <tag> [<value>]` line
#[derive(Debug, Clone, PartialEq, Eq)]
struct LevelLine<'a> {
    level: usize,
    tag: &'a str,
    value: Option<&'a str>,
}

#[derive(Debug, PartialEq, Eq)]
enum LineKind<'a> {
    Blank,
    Malformed,
    Entry(LevelLine<'a>),
}

fn parse_line(line: &str) -> LineKind<'_> {
    let line = line.trim();
    if line.is_empty() {
        return LineKind::Blank;
    }

    let Some((level, rest)) = line.split_once(char::is_whitespace) else {
        return LineKind::Malformed;
    };
    let Ok(level) = level.parse::<usize>() else {
        return LineKind::Malformed;
    };

    let rest = rest.trim_start();
    let (tag, value) = match rest.split_once(char::is_whitespace) {
        Some((tag, value)) => (tag, value.trim()),
        None => (rest, ""),
    };

    LineKind::Entry(LevelLine {
        level,
        tag,
        value: if value.is_empty() { None } else { Some(value) },
    })
}

/// Tree of level-tagged lines rooted at an implicit, tagless top level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LevelTree {
    root: RawNode,
}

impl LevelTree {
    /// Build the tree from raw GEDCOM text. Never fails: blank and malformed
    /// lines are skipped, and a level jump of more than one is clamped so the
    /// line hangs under the deepest open node.
    pub fn parse(text: &str) -> Self {
        // stack[0] is the implicit root; stack[n] is the open node at level n - 1
        let mut stack: Vec<RawNode> = vec![RawNode::default()];
        let mut entries = 0usize;
        let mut skipped = 0usize;
        let mut clamped = 0usize;

        for (index, raw_line) in text.lines().enumerate() {
            let raw_line = if index == 0 {
                raw_line.trim_start_matches('\u{feff}')
            } else {
                raw_line
            };

            let line = match parse_line(raw_line) {
                LineKind::Blank => continue,
                LineKind::Malformed => {
                    warn!("Skipping malformed line {}: {:?}", index + 1, raw_line);
                    skipped += 1;
                    continue;
                }
                LineKind::Entry(line) => line,
            };

            let parent_depth = line.level.min(stack.len() - 1);
            if parent_depth < line.level {
                debug!(
                    "Line {} jumps to level {}, clamping to {}",
                    index + 1,
                    line.level,
                    parent_depth
                );
                clamped += 1;
            }

            close_to(&mut stack, parent_depth + 1);
            stack.push(RawNode::new(line.tag, line.value.map(str::to_string)));
            entries += 1;
        }

        close_to(&mut stack, 1);
        let root = stack.pop().unwrap_or_default();

        debug!(
            "Parsed {} lines into {} top-level records ({} skipped, {} clamped)",
            entries,
            root.children.len(),
            skipped,
            clamped
        );

        Self { root }
    }

    pub fn from_records(records: Vec<RawNode>) -> Self {
        Self {
            root: RawNode {
                children: records,
                ..RawNode::default()
            },
        }
    }

    /// Level-0 entries in source order
    pub fn records(&self) -> &[RawNode] {
        &self.root.children
    }

    pub fn into_records(self) -> Vec<RawNode> {
        self.root.children
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Serialize back into normalized level lines
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for record in &self.root.children {
            record.write_lines(0, &mut lines);
        }
        lines
    }

    pub fn to_text(&self) -> String {
        let mut text = self.to_lines().join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        text
    }
}

/// Pop open nodes into their parents until `len` nodes remain on the stack.
fn close_to(stack: &mut Vec<RawNode>, len: usize) {
    while stack.len() > len.max(1) {
        if let Some(node) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
            }
        }
    }
}
