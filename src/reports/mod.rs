pub mod dot;
pub mod formatters;
pub mod generator;

pub use formatters::{DotFormatter, JsonFormatter, ReportFormatter, TextOutlineFormatter};
pub use generator::{prune_to_direct_ancestors, RenderOptions, ReportGenerator};
