// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Typed view over a Grafana dashboard export.
//!
//! Exports are free-form JSON, so every field is read defensively: unknown
//! panel types, odd datasource shapes and unrecognized targets become
//! explicit variants that keep enough of the original structure for the raw
//! fallback stores. Nothing here fails except for documents that are not JSON
//! objects at all.

use std::{fmt, fs, path::Path};

use serde_json::{Map, Value};

use crate::error::{self, Error};

const DEFAULT_TITLE: &str = "Dashboard";
const DEFAULT_TIMEZONE: &str = "browser";
const DEFAULT_TIME_FROM: &str = "now-6h";
const DEFAULT_TIME_TO: &str = "now";
const DEFAULT_REF_ID: &str = "A";

/// Parsed dashboard export.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    /// Dashboard title.
    pub title:     String,
    /// Stable dashboard uid, when the export carries one.
    pub uid:       Option<String>,
    /// Dashboard tags in export order.
    pub tags:      Vec<String>,
    /// Dashboard timezone.
    pub timezone:  String,
    /// Auto-refresh interval such as `30s`.
    pub refresh:   Option<String>,
    /// Start of the default time range.
    pub time_from: String,
    /// End of the default time range.
    pub time_to:   String,
    /// Top-level panels that carry an id.
    pub panels:    Vec<Panel>,
    /// Raw entries of `templating.list`.
    pub variables: Vec<Value>,
    /// Entries of `__inputs` describing externally supplied datasources.
    pub inputs:    Vec<Input>
}

/// Entry of the export's `__inputs` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Declared input type, `datasource` for datasource placeholders.
    pub kind: Option<String>,
    /// Placeholder name such as `DS_PROMETHEUS`.
    pub name: Option<String>
}

impl Input {
    /// Returns the placeholder name when this input describes a datasource.
    pub fn datasource_name(&self) -> Option<&str> {
        match (self.kind.as_deref(), self.name.as_deref()) {
            (Some("datasource"), Some(name)) if !name.is_empty() => Some(name),
            _ => None
        }
    }
}

/// Integer identifier of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PanelId(pub i64);

impl PanelId {
    /// Jsonnet field name of the panel in the generated library.
    ///
    /// Negative ids become `panel_neg<abs>` so the name stays an identifier.
    pub fn field_name(self) -> String {
        if self.0 < 0 {
            format!("panel_neg{}", self.0.unsigned_abs())
        } else {
            format!("panel_{}", self.0)
        }
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Panel types with a dedicated builder in the panel library.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PanelKind {
    /// `timeseries`
    TimeSeries,
    /// `stat`
    Stat,
    /// `table`
    Table,
    /// `bargauge`
    BarGauge,
    /// `piechart`
    PieChart,
    /// `row`, a container for other panels.
    Row,
    /// Any other type, carrying the declared type name (empty when absent).
    Unknown(String)
}

impl PanelKind {
    /// Classifies a Grafana panel type name.
    pub fn from_type(panel_type: Option<&str>) -> Self {
        match panel_type {
            Some("timeseries") => Self::TimeSeries,
            Some("stat") => Self::Stat,
            Some("table") => Self::Table,
            Some("bargauge") => Self::BarGauge,
            Some("piechart") => Self::PieChart,
            Some("row") => Self::Row,
            Some(other) => Self::Unknown(other.to_owned()),
            None => Self::Unknown(String::new())
        }
    }

    /// Grafana type name the kind was classified from.
    pub fn type_name(&self) -> &str {
        match self {
            Self::TimeSeries => "timeseries",
            Self::Stat => "stat",
            Self::Table => "table",
            Self::BarGauge => "bargauge",
            Self::PieChart => "piechart",
            Self::Row => "row",
            Self::Unknown(panel_type) => panel_type
        }
    }

    /// Library builder and Grafonnet panel namespace, `None` for unknown
    /// types.
    pub fn builders(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::TimeSeries => Some(("timeseriesPanel", "timeSeries")),
            Self::Stat => Some(("statPanel", "stat")),
            Self::Table => Some(("tablePanel", "table")),
            Self::BarGauge => Some(("barGaugePanel", "barGauge")),
            Self::PieChart => Some(("pieChartPanel", "pieChart")),
            Self::Row => Some(("rowPanel", "row")),
            Self::Unknown(_) => None
        }
    }
}

/// Panel grid placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPos {
    /// Column offset.
    pub x: i64,
    /// Row offset.
    pub y: i64,
    /// Width in grid columns.
    pub w: i64,
    /// Height in grid rows.
    pub h: i64
}

impl Default for GridPos {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            w: 8,
            h: 6
        }
    }
}

impl GridPos {
    /// Reads a `gridPos` object. Empty or non-object values yield `None`;
    /// absent coordinates take the [`Default`] values.
    fn from_value(value: Option<&Value>) -> Option<Self> {
        let object = value.and_then(Value::as_object).filter(|object| !object.is_empty())?;
        let defaults = Self::default();
        let coordinate =
            |key: &str, fallback: i64| object.get(key).and_then(as_integer).unwrap_or(fallback);

        Some(Self {
            x: coordinate("x", defaults.x),
            y: coordinate("y", defaults.y),
            w: coordinate("w", defaults.w),
            h: coordinate("h", defaults.h)
        })
    }
}

/// Datasource reference declared on a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasourceRef {
    /// Object form with a `type` field.
    Typed(String),
    /// Legacy string form naming the datasource.
    Named(String),
    /// No usable reference; the dashboard default applies.
    Inherit
}

impl DatasourceRef {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(object)) => match object.get("type") {
                Some(kind) if is_truthy(kind) => Self::Typed(value_text(kind)),
                _ => Self::Inherit
            },
            Some(Value::String(name)) => Self::Named(name.clone()),
            _ => Self::Inherit
        }
    }

    /// Resolves the effective datasource type.
    pub fn resolve<'a>(&'a self, default_type: &'a str) -> &'a str {
        match self {
            Self::Typed(kind) | Self::Named(kind) => kind.as_str(),
            Self::Inherit => default_type
        }
    }
}

/// Query attached to a panel.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Raw SQL query.
    Sql {
        /// Query text.
        raw_sql: String,
        /// Query reference id.
        ref_id:  String
    },
    /// PromQL-style expression.
    Expr {
        /// Expression text.
        expr:   String,
        /// Legend template.
        legend: String
    },
    /// Any other shape, kept verbatim.
    Unrecognized(Value)
}

impl Target {
    fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::Unrecognized(value.clone());
        };

        if let Some(raw_sql) = object.get("rawSql") {
            return Self::Sql {
                raw_sql: optional_text(raw_sql),
                ref_id:  object
                    .get("refId")
                    .map(value_text)
                    .unwrap_or_else(|| DEFAULT_REF_ID.to_owned())
            };
        }

        if let Some(expr) = object.get("expr") {
            return Self::Expr {
                expr:   optional_text(expr),
                legend: object.get("legendFormat").map(optional_text).unwrap_or_default()
            };
        }

        Self::Unrecognized(value.clone())
    }
}

/// Dashboard panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    /// Panel id, unique within the dashboard.
    pub id:         PanelId,
    /// Classified panel type.
    pub kind:       PanelKind,
    /// Panel title, `panel-<id>` when absent.
    pub title:      String,
    /// Grid placement, when the export declares one.
    pub grid:       Option<GridPos>,
    /// Datasource reference.
    pub datasource: DatasourceRef,
    /// Panel queries in export order.
    pub targets:    Vec<Target>,
    /// Grafana unit code from `fieldConfig.defaults.unit`.
    pub unit:       Option<String>,
    /// Whether a row starts collapsed.
    pub collapsed:  bool,
    /// Nested panels of a row.
    pub children:   Vec<Panel>,
    /// Verbatim export entry.
    pub raw:        Value
}

impl Panel {
    /// Parses a panel entry. Returns `None` when the entry is not an object
    /// or lacks an integer `id`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let id = PanelId(object.get("id").and_then(Value::as_i64)?);
        let kind = PanelKind::from_type(object.get("type").and_then(Value::as_str));

        let title = match object.get("title") {
            Some(Value::String(title)) => title.clone(),
            Some(Value::Null) | None => format!("panel-{id}"),
            Some(other) => other.to_string()
        };

        let targets = object
            .get("targets")
            .and_then(Value::as_array)
            .map(|targets| targets.iter().map(Target::from_value).collect())
            .unwrap_or_default();

        let unit = object
            .get("fieldConfig")
            .and_then(|config| config.get("defaults"))
            .and_then(|defaults| defaults.get("unit"))
            .and_then(Value::as_str)
            .map(str::to_owned);

        let children = if kind == PanelKind::Row {
            object
                .get("panels")
                .and_then(Value::as_array)
                .map(|children| children.iter().filter_map(Panel::from_value).collect())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Some(Self {
            id,
            kind,
            title,
            grid: GridPos::from_value(object.get("gridPos")),
            datasource: DatasourceRef::from_value(object.get("datasource")),
            targets,
            unit,
            collapsed: object.get("collapsed").is_some_and(is_truthy),
            children,
            raw: value.clone()
        })
    }
}

impl Dashboard {
    /// Builds a dashboard from a decoded export, unwrapping a top-level
    /// `"dashboard"` envelope when present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the document is not a JSON object.
    ///
    /// # Examples
    ///
    /// ```
    /// use grafonnet_scaffold::Dashboard;
    /// use serde_json::json;
    ///
    /// let export = json!({"dashboard": {"title": "API", "panels": [{"id": 1, "type": "stat"}]}});
    /// let dashboard = Dashboard::from_value(export).expect("valid export");
    /// assert_eq!(dashboard.title, "API");
    /// assert_eq!(dashboard.panels.len(), 1);
    /// assert_eq!(dashboard.time_from, "now-6h");
    /// ```
    pub fn from_value(document: Value) -> Result<Self, Error> {
        let mut document = match document {
            Value::Object(object) => object,
            _ => return Err(Error::validation("dashboard export must be a JSON object"))
        };

        if let Some(inner) = document.remove("dashboard") {
            document = match inner {
                Value::Object(object) => object,
                _ => return Err(Error::validation("\"dashboard\" must be a JSON object"))
            };
        }

        Ok(Self::from_object(&document))
    }

    fn from_object(document: &Map<String, Value>) -> Self {
        let title = match document.get("title") {
            Some(Value::String(title)) => title.clone(),
            Some(Value::Null) | None => DEFAULT_TITLE.to_owned(),
            Some(other) => other.to_string()
        };

        let uid = document.get("uid").filter(|uid| is_truthy(uid)).map(value_text);

        let tags = document
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_owned).collect())
            .unwrap_or_default();

        let timezone = document
            .get("timezone")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TIMEZONE)
            .to_owned();

        let refresh = document
            .get("refresh")
            .and_then(Value::as_str)
            .filter(|refresh| !refresh.is_empty())
            .map(str::to_owned);

        let time = document.get("time");
        let time_bound = |key: &str, fallback: &str| {
            time.and_then(|time| time.get(key))
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_owned()
        };

        let panels = document
            .get("panels")
            .and_then(Value::as_array)
            .map(|panels| panels.iter().filter_map(Panel::from_value).collect())
            .unwrap_or_default();

        let variables = document
            .get("templating")
            .and_then(|templating| templating.get("list"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let inputs = document
            .get("__inputs")
            .and_then(Value::as_array)
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|input| Input {
                        kind: input.get("type").and_then(Value::as_str).map(str::to_owned),
                        name: input.get("name").and_then(Value::as_str).map(str::to_owned)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            title,
            uid,
            tags,
            timezone,
            refresh,
            time_from: time_bound("from", DEFAULT_TIME_FROM),
            time_to: time_bound("to", DEFAULT_TIME_TO),
            panels,
            variables,
            inputs
        }
    }

    /// Placeholder reference (`${NAME}`) for the first datasource input.
    pub fn datasource_placeholder(&self) -> Option<String> {
        self.inputs
            .iter()
            .find_map(Input::datasource_name)
            .map(|name| format!("${{{name}}}"))
    }
}

/// Reads and parses a dashboard export from disk.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read, [`Error::Parse`] when
/// it is not JSON and [`Error::Validation`] when it is not a JSON object.
pub fn load_dashboard(path: &Path) -> Result<Dashboard, Error> {
    let contents = fs::read_to_string(path).map_err(|source| error::io_error(path, source))?;
    let document: Value =
        serde_json::from_str(&contents).map_err(|source| error::parse_error(path, source))?;
    Dashboard::from_value(document)
}

/// Truthiness of a JSON value: `null`, `false`, zero and empty strings,
/// arrays or objects are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(object) => !object.is_empty()
    }
}

/// Reads an integer, truncating floats.
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        Value::Bool(flag) => Some(i64::from(*flag)),
        _ => None
    }
}

/// Text of a scalar: strings as-is, anything else as JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string()
    }
}

/// Like [`value_text`], but `null` reads as an empty string.
fn optional_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => value_text(other)
    }
}
