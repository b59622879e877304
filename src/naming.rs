//! Reserved table and field names
//!
//! Names the engine writes on its own behalf. Keeping them in one place
//! avoids collisions with user columns.

/// Default table name for a page's primary source and plan steps without
/// an explicit input/output.
pub const MAIN_TABLE: &str = "main";

/// Field names of a flow edge table (see [`crate::transform::FlowGraph::to_table`]).
pub const FLOW_SOURCE: &str = "source";
pub const FLOW_TARGET: &str = "target";
pub const FLOW_VALUE: &str = "value";
pub const FLOW_SOURCE_LABEL: &str = "source_label";
pub const FLOW_TARGET_LABEL: &str = "target_label";

/// Separator used to build sunburst node ids from path segments.
pub const PATH_SEPARATOR: &str = "/";

/// Default suffixes for overlapping non-key fields in joins.
pub const LEFT_SUFFIX: &str = "_x";
pub const RIGHT_SUFFIX: &str = "_y";

