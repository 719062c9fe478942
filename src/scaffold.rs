// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Assembly of the dashboard scaffold.
//!
//! [`generate`] is a pure function of the dashboard and the options: it
//! renders the panel library, the dashboard file and both raw side-car
//! stores. [`Scaffold::write`] materializes them on disk:
//!
//! ```text
//! <output>/<slug>.jsonnet
//! <output>/lib/<slug>_panels.libsonnet
//! <output>/lib/<slug>_raw_panels.json
//! <output>/lib/<slug>_raw_variables.json
//! ```
//!
//! The generated text imports the side-cars by relative path and looks up raw
//! panels by stringified id, so all four files must be produced from the same
//! [`Scaffold`].

use std::{
    collections::HashSet,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf}
};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    config::ScaffoldOptions,
    dashboard::{Dashboard, Panel, PanelId},
    error::{self, Error},
    panels::{FallbackReason, PanelContext, RenderedPanel, render_panel},
    render::{json_string, json_string_list, to_pretty_ascii_json},
    slug::SlugStrategy,
    variables::{Variable, render_variable}
};

/// Directory holding the panel library and the raw stores.
const LIB_DIR: &str = "lib";

/// Imports heading every panel library.
const LIBRARY_IMPORTS: &[&str] = &[
    "local g = import 'github.com/grafana/grafonnet/gen/grafonnet-latest/main.libsonnet';",
    "local layouts = import '../../lib/layouts.libsonnet';",
    "local panels = import '../../lib/panels.libsonnet';",
    "local prom = import '../../lib/prometheus.libsonnet';",
    "local standards = import '../../lib/standards.libsonnet';",
    "local themes = import '../../lib/themes.libsonnet';",
    "local clickhouse = import '../../lib/clickhouse.libsonnet';"
];

/// File names derived from a slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldLayout {
    slug: String
}

impl ScaffoldLayout {
    /// Creates the layout for `slug`.
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into()
        }
    }

    /// Slug the file names derive from.
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// `<slug>.jsonnet`, relative to the output directory.
    pub fn dashboard_file(&self) -> String {
        format!("{}.jsonnet", self.slug)
    }

    /// `<slug>_panels.libsonnet`, relative to `lib/`.
    pub fn panels_library_file(&self) -> String {
        format!("{}_panels.libsonnet", self.slug)
    }

    /// `<slug>_raw_panels.json`, relative to `lib/`.
    pub fn raw_panels_file(&self) -> String {
        format!("{}_raw_panels.json", self.slug)
    }

    /// `<slug>_raw_variables.json`, relative to `lib/`.
    pub fn raw_variables_file(&self) -> String {
        format!("{}_raw_variables.json", self.slug)
    }
}

/// Panel that was left to the raw store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelFallback {
    /// Panel id.
    pub id:     i64,
    /// Why the panel was not translated.
    #[serde(flatten)]
    pub reason: FallbackReason
}

/// Counts and ids describing what a generation run translated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScaffoldSummary {
    /// Panels rendered into library builders.
    pub rendered_panels:    Vec<i64>,
    /// Panels delegated to the raw store.
    pub fallback_panels:    Vec<PanelFallback>,
    /// Number of rendered variable bindings.
    pub rendered_variables: usize,
    /// Number of variables kept in the raw array.
    pub raw_variables:      usize,
    /// Number of variables skipped for lacking a name.
    pub skipped_variables:  usize
}

/// Generated scaffold, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaffold {
    /// System the dashboard belongs to.
    pub system:           String,
    /// Dashboard title.
    pub title:            String,
    /// File names of the scaffold.
    pub layout:           ScaffoldLayout,
    /// Datasource uid written into the dashboard config.
    pub datasource_uid:   String,
    /// Dashboard file contents.
    pub dashboard_source: String,
    /// Panel library contents.
    pub panels_library:   String,
    /// Every panel keyed by stringified id.
    pub raw_panels:       Map<String, Value>,
    /// Variables that were not rendered.
    pub raw_variables:    Vec<Value>,
    /// What was translated.
    pub summary:          ScaffoldSummary
}

/// Paths written by [`Scaffold::write`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaffoldFiles {
    /// Dashboard file.
    pub dashboard:      PathBuf,
    /// Panel library.
    pub panels_library: PathBuf,
    /// Raw panel store.
    pub raw_panels:     PathBuf,
    /// Raw variable array.
    pub raw_variables:  PathBuf
}

/// Run summary emitted by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaffoldReport {
    /// System the dashboard belongs to.
    pub system:         String,
    /// Dashboard title.
    pub title:          String,
    /// Slug used for file names.
    pub slug:           String,
    /// Datasource uid written into the dashboard config.
    pub datasource_uid: String,
    /// Written files.
    pub files:          ScaffoldFiles,
    /// What was translated.
    #[serde(flatten)]
    pub summary:        ScaffoldSummary
}

/// Resolves the slug: explicit override first, then the title.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the override is blank or contains a
/// character outside `[A-Za-z0-9_.-]`. The slug ends up inside quoted import
/// paths, so separators, quotes and whitespace are rejected.
pub fn resolve_slug(title: &str, slug_override: Option<&str>) -> Result<String, Error> {
    match slug_override {
        Some(custom) => {
            let trimmed = custom.trim();
            if trimmed.is_empty() {
                return Err(Error::validation("slug override must not be empty"));
            }
            if let Some(invalid) = trimmed.chars().find(|character| !is_slug_char(*character)) {
                return Err(Error::validation(format!(
                    "slug override {trimmed:?} contains {invalid:?}; allowed are ASCII \
                     letters, digits, '-', '_' and '.'"
                )));
            }
            Ok(trimmed.to_owned())
        }
        None => Ok(SlugStrategy::builder(title).build_or_default())
    }
}

fn is_slug_char(character: char) -> bool {
    character.is_ascii_alphanumeric() || matches!(character, '-' | '_' | '.')
}

/// Picks the datasource uid: explicit override, then the first datasource
/// input of the export as `${NAME}`, then the configured default.
pub fn resolve_datasource_uid(dashboard: &Dashboard, options: &ScaffoldOptions) -> String {
    options
        .datasource_uid
        .clone()
        .or_else(|| dashboard.datasource_placeholder())
        .unwrap_or_else(|| options.default_datasource_uid.clone())
}

/// Generates the scaffold for `dashboard`.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the slug override is invalid.
///
/// # Examples
///
/// ```
/// use grafonnet_scaffold::{Dashboard, ScaffoldOptions, generate};
/// use serde_json::json;
///
/// let dashboard = Dashboard::from_value(json!({
///     "title": "Checkout API",
///     "panels": [
///         {"id": 1, "type": "stat", "targets": [{"expr": "up"}]},
///         {"id": 2, "type": "heatmap"}
///     ]
/// }))
/// .expect("valid export");
///
/// let scaffold = generate(&dashboard, &ScaffoldOptions::new("checkout")).expect("scaffold");
/// assert_eq!(scaffold.layout.slug(), "checkout-api");
/// assert!(scaffold.panels_library.contains(r#"panel_2(config):: rawPanels["2"],"#));
/// assert_eq!(scaffold.raw_panels.len(), 2);
/// ```
pub fn generate(dashboard: &Dashboard, options: &ScaffoldOptions) -> Result<Scaffold, Error> {
    let slug = resolve_slug(&dashboard.title, options.slug.as_deref())?;
    let layout = ScaffoldLayout::new(slug);
    let datasource_uid = resolve_datasource_uid(dashboard, options);

    info!(
        system = %options.system,
        title = %dashboard.title,
        slug = %layout.slug(),
        "generating dashboard scaffold"
    );

    let context = PanelContext {
        default_datasource_type: &options.datasource_type,
        denylist:                &options.denylist
    };
    let mut summary = ScaffoldSummary::default();

    let mut collector = PanelCollector::default();
    for panel in &dashboard.panels {
        collector.collect(panel, &context);
    }
    for rendered in &collector.rendered {
        match &rendered.fallback {
            Some(reason) => summary.fallback_panels.push(PanelFallback {
                id:     rendered.id.0,
                reason: reason.clone()
            }),
            None => summary.rendered_panels.push(rendered.id.0)
        }
    }

    let child_ids: HashSet<PanelId> = dashboard
        .panels
        .iter()
        .filter(|panel| !panel.children.is_empty())
        .flat_map(|panel| panel.children.iter().map(|child| child.id))
        .collect();
    let top_level: Vec<PanelId> = dashboard
        .panels
        .iter()
        .map(|panel| panel.id)
        .filter(|id| !child_ids.contains(id))
        .collect();

    let panels_library = build_panels_library(&layout, &collector.rendered, &top_level);

    let mut variable_blocks = Vec::new();
    let mut variable_bindings = Vec::new();
    let mut raw_variables = Vec::new();
    for value in &dashboard.variables {
        let Some(variable) = Variable::from_value(value) else {
            summary.skipped_variables += 1;
            continue;
        };
        match render_variable(&variable) {
            Some(block) => {
                variable_blocks.push(block);
                variable_bindings.push(variable.binding());
            }
            None => raw_variables.extend(variable.into_raw())
        }
    }
    summary.rendered_variables = variable_blocks.len();
    summary.raw_variables = raw_variables.len();

    let dashboard_source = build_dashboard_source(
        dashboard,
        options,
        &layout,
        &datasource_uid,
        &variable_blocks,
        &variable_bindings
    );

    info!(
        rendered_panels = summary.rendered_panels.len(),
        fallback_panels = summary.fallback_panels.len(),
        rendered_variables = summary.rendered_variables,
        raw_variables = summary.raw_variables,
        "scaffold generated"
    );

    Ok(Scaffold {
        system: options.system.clone(),
        title: dashboard.title.clone(),
        layout,
        datasource_uid,
        dashboard_source,
        panels_library,
        raw_panels: collector.raw,
        raw_variables,
        summary
    })
}

/// Renders each panel id once, row children included, and stores every
/// panel verbatim.
#[derive(Default)]
struct PanelCollector {
    seen:     HashSet<PanelId>,
    rendered: Vec<RenderedPanel>,
    raw:      Map<String, Value>
}

impl PanelCollector {
    fn collect(&mut self, panel: &Panel, context: &PanelContext<'_>) {
        if self.seen.insert(panel.id) {
            self.raw.insert(panel.id.to_string(), panel.raw.clone());
            self.rendered.push(render_panel(panel, context));
        }
        for child in &panel.children {
            self.collect(child, context);
        }
    }
}

fn build_panels_library(
    layout: &ScaffoldLayout,
    rendered: &[RenderedPanel],
    top_level: &[PanelId]
) -> String {
    let mut lines: Vec<String> = LIBRARY_IMPORTS.iter().map(|line| (*line).to_owned()).collect();
    lines.push(format!(
        "local rawPanels = import './{}';",
        layout.raw_panels_file()
    ));
    lines.push(String::new());
    lines.push("{".to_owned());
    lines.extend(rendered.iter().map(|panel| panel.block.clone()));
    lines.push(String::new());

    if top_level.is_empty() {
        lines.push("  build(config):: [],".to_owned());
    } else {
        let calls: Vec<String> = top_level
            .iter()
            .map(|id| format!("self.{}(config)", id.field_name()))
            .collect();
        lines.push("  build(config):: [".to_owned());
        lines.push(format!("    {}", calls.join(",\n    ")));
        lines.push("  ],".to_owned());
    }

    lines.push("}".to_owned());
    lines.push(String::new());
    lines.join("\n")
}

fn build_dashboard_source(
    dashboard: &Dashboard,
    options: &ScaffoldOptions,
    layout: &ScaffoldLayout,
    datasource_uid: &str,
    variable_blocks: &[String],
    variable_bindings: &[String]
) -> String {
    let variables_list = if variable_bindings.is_empty() {
        "rawVariables".to_owned()
    } else {
        format!("[\n  {},\n] + rawVariables", variable_bindings.join(",\n  "))
    };

    let mut lines = vec![
        format!("// {} (generated scaffold)", comment_text(&dashboard.title)),
        String::new(),
        "local g = import 'github.com/grafana/grafonnet/gen/grafonnet-latest/main.libsonnet';"
            .to_owned(),
        format!(
            "local panelsLib = import './{LIB_DIR}/{}';",
            layout.panels_library_file()
        ),
        format!(
            "local rawVariables = import './{LIB_DIR}/{}';",
            layout.raw_variables_file()
        ),
        String::new(),
        format!("local DATASOURCE_UID = {};", json_string(datasource_uid)),
        "// local DATASOURCE_UID = '${DS_PROMETHEUS}';".to_owned(),
        String::new(),
        "local config = {".to_owned(),
        "  datasource: {".to_owned(),
        format!("    type: {},", json_string(&options.datasource_type)),
        "    uid: DATASOURCE_UID,".to_owned(),
        "  },".to_owned(),
        format!("  timezone: {},", json_string(&dashboard.timezone)),
        format!("  timeFrom: {},", json_string(&dashboard.time_from)),
        format!("  timeTo: {},", json_string(&dashboard.time_to)),
        format!("  pluginVersion: {},", json_string(&options.plugin_version)),
        "};".to_owned(),
        String::new(),
        "// -------------------- Variables --------------------".to_owned(),
        String::new(),
        variable_blocks.join("\n"),
        String::new(),
        format!("local variables = {variables_list};"),
        String::new(),
        "// -------------------- Dashboard --------------------".to_owned(),
        String::new(),
        format!("g.dashboard.new({})", json_string(&dashboard.title)),
    ];

    if let Some(uid) = &dashboard.uid {
        lines.push(format!("+ g.dashboard.withUid({})", json_string(uid)));
    }
    if !dashboard.tags.is_empty() {
        lines.push(format!(
            "+ g.dashboard.withTags({})",
            json_string_list(&dashboard.tags)
        ));
    }

    lines.push("+ g.dashboard.withTimezone(config.timezone)".to_owned());
    lines.push("+ g.dashboard.time.withFrom(config.timeFrom)".to_owned());
    lines.push("+ g.dashboard.time.withTo(config.timeTo)".to_owned());

    if let Some(refresh) = &dashboard.refresh {
        lines.push(format!("+ g.dashboard.withRefresh({})", json_string(refresh)));
    }

    lines.push("+ g.dashboard.withVariables(variables)".to_owned());
    lines.push("+ g.dashboard.withPanels(panelsLib.build(config))".to_owned());
    lines.push(String::new());
    lines.join("\n")
}

/// Flattens `text` onto one line so it cannot leave a `//` comment.
fn comment_text(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

impl Scaffold {
    /// Writes the scaffold under `output_dir`, creating `output_dir` and
    /// `output_dir/lib` as needed. Existing files are overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] when a directory or file cannot be created
    /// and [`Error::Serialize`] when a raw store cannot be encoded. Files
    /// written before the failure are left in place.
    pub fn write(&self, output_dir: &Path) -> Result<ScaffoldReport, Error> {
        if output_dir.as_os_str().is_empty() {
            return Err(Error::validation("output directory must not be empty"));
        }

        let lib_dir = output_dir.join(LIB_DIR);
        fs::create_dir_all(&lib_dir).map_err(|source| error::write_error(&lib_dir, source))?;

        let files = ScaffoldFiles {
            dashboard:      output_dir.join(self.layout.dashboard_file()),
            panels_library: lib_dir.join(self.layout.panels_library_file()),
            raw_panels:     lib_dir.join(self.layout.raw_panels_file()),
            raw_variables:  lib_dir.join(self.layout.raw_variables_file())
        };

        write_text(&files.raw_panels, &json_document(&self.raw_panels)?)?;
        write_text(&files.raw_variables, &json_document(&self.raw_variables)?)?;
        write_text(&files.panels_library, &self.panels_library)?;
        write_text(&files.dashboard, &self.dashboard_source)?;

        info!(dashboard = %files.dashboard.display(), "scaffold written");

        Ok(ScaffoldReport {
            system: self.system.clone(),
            title: self.title.clone(),
            slug: self.layout.slug().to_owned(),
            datasource_uid: self.datasource_uid.clone(),
            files,
            summary: self.summary.clone()
        })
    }
}

fn json_document<T>(value: &T) -> Result<String, Error>
where
    T: Serialize + ?Sized
{
    let mut encoded = to_pretty_ascii_json(value)?;
    encoded.push('\n');
    Ok(encoded)
}

fn write_text(path: &Path, contents: &str) -> Result<(), Error> {
    let file = File::create(path).map_err(|source| error::write_error(path, source))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(contents.as_bytes())
        .map_err(|source| error::write_error(path, source))?;
    writer
        .flush()
        .map_err(|source| error::write_error(path, source))
}
