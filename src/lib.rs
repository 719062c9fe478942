//! Utilities for converting Grafana dashboard exports into Grafonnet
//! scaffolds.
//!
//! The library parses an export into a typed [`Dashboard`], renders panels
//! and template variables into Jsonnet text, and keeps everything it cannot
//! translate confidently in raw JSON side-car files that the generated text
//! imports. The output is a starting point for manual review, not a finished
//! conversion.

mod config;
mod dashboard;
mod error;
mod panels;
mod render;
mod scaffold;
mod slug;
mod units;
mod variables;

pub use config::{
    DEFAULT_DATASOURCE_TYPE, DatasourceDenylist, GeneratorConfig, ScaffoldOptions, load_config,
    parse_config
};
pub use dashboard::{
    Dashboard, DatasourceRef, GridPos, Input, Panel, PanelId, PanelKind, Target, load_dashboard
};
pub use error::{Error, io_error};
pub use panels::{
    FallbackReason, PanelContext, RenderedPanel, fallback_block, render_panel, render_targets
};
pub use render::{json_string, json_string_list};
pub use scaffold::{
    PanelFallback, Scaffold, ScaffoldFiles, ScaffoldLayout, ScaffoldReport, ScaffoldSummary,
    generate, resolve_datasource_uid, resolve_slug
};
pub use slug::{DEFAULT_SLUG, SlugStrategy};
pub use units::{Unit, normalize_unit};
pub use variables::{QueryVariable, Variable, render_variable, split_options};
