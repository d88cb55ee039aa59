use crate::lineage::tree::FamilyTree;
use crate::reports::formatters::{DotFormatter, JsonFormatter, ReportFormatter, TextOutlineFormatter};
use crate::types::{OutputFormat, RenderScope};
use anyhow::Result;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub format: OutputFormat,
    pub scope: RenderScope,
    pub timeline: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            scope: RenderScope::Lineage,
            timeline: true,
        }
    }
}

/// Report generator for creating various output formats
pub struct ReportGenerator {
    options: RenderOptions,
}

impl ReportGenerator {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    fn formatter(&self) -> Box<dyn ReportFormatter> {
        match self.options.format {
            OutputFormat::Text => Box::new(TextOutlineFormatter),
            OutputFormat::Dot => Box::new(DotFormatter {
                scope: self.options.scope,
                timeline: self.options.timeline,
            }),
            OutputFormat::Json => Box::new(JsonFormatter {
                scope: self.options.scope,
            }),
        }
    }

    /// Render the tree starting from the person with xref `root`, or from
    /// the first person when no root is given.
    pub fn generate(&self, tree: &FamilyTree, root: Option<&str>) -> Result<String> {
        let root = tree.resolve_root(root)?;
        debug!("Rendering {:?} from root {:?}", self.options, root);
        self.formatter().format(tree, root)
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

/// Keep only the direct ancestors of `root` (or of the first person) and
/// return the xref to render from. Pruning renumbers people, so the root is
/// carried across by xref. An empty tree is left as is.
pub fn prune_to_direct_ancestors(tree: &mut FamilyTree, root: Option<&str>) -> Result<Option<String>> {
    let Some(root_id) = tree.resolve_root(root)? else {
        return Ok(root.map(str::to_string));
    };

    let root_xref = tree.person(root_id).xref.clone();
    let removed = tree.retain_direct_ancestors(root_id);
    info!("Kept direct ancestors of {}; removed {} people", root_xref, removed);
    Ok(Some(root_xref))
}
