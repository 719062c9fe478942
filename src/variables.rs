// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Rendering of dashboard template variables.
//!
//! Query, custom and interval variables become `local <name>Variable`
//! bindings in the dashboard file. Everything else is kept verbatim in the
//! raw variables array.

use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    dashboard::{as_integer, is_truthy},
    render::{json_string, json_string_list}
};

/// Query-backed variable with its optional modifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryVariable {
    /// Variable name.
    pub name:            String,
    /// Datasource query text.
    pub query:           String,
    /// Display label.
    pub label:           Option<String>,
    /// Adds an "All" option.
    pub include_all:     bool,
    /// Allows selecting several values.
    pub multi:           bool,
    /// Refreshes values when the dashboard loads.
    pub refresh_on_load: bool,
    /// Sort order of the values.
    pub sort:            Option<i64>
}

/// Template variable classified by declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    /// `query` variable.
    Query(QueryVariable),
    /// `custom` variable with a fixed option list.
    Custom {
        /// Variable name.
        name:    String,
        /// Options split from the comma-separated query.
        options: Vec<String>,
        /// Display label.
        label:   Option<String>
    },
    /// `interval` variable.
    Interval {
        /// Variable name.
        name:   String,
        /// Intervals split from the comma-separated query.
        values: Vec<String>,
        /// Display label.
        label:  Option<String>
    },
    /// Unsupported type or shape, kept verbatim.
    Unsupported {
        /// Variable name.
        name: String,
        /// Original entry.
        raw:  Value
    }
}

impl Variable {
    /// Classifies a `templating.list` entry. Returns `None` for entries
    /// without a usable name, which are skipped entirely.
    ///
    /// Names that cannot prefix a Jsonnet binding classify as
    /// [`Variable::Unsupported`].
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let name = object
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())?
            .to_owned();

        if !is_identifier(&name) {
            return Some(Self::Unsupported {
                name,
                raw: value.clone()
            });
        }

        let query = object.get("query").and_then(Value::as_str);
        let label = object
            .get("label")
            .and_then(Value::as_str)
            .filter(|label| !label.is_empty())
            .map(str::to_owned);
        let flag = |key: &str| object.get(key).is_some_and(is_truthy);

        let variable = match (object.get("type").and_then(Value::as_str), query) {
            (Some("query"), Some(query)) => Self::Query(QueryVariable {
                name,
                query: query.to_owned(),
                label,
                include_all: flag("includeAll"),
                multi: flag("multi"),
                refresh_on_load: flag("refresh"),
                sort: object.get("sort").and_then(as_integer)
            }),
            (Some("custom"), Some(query)) => Self::Custom {
                name,
                options: split_options(query),
                label
            },
            (Some("interval"), Some(query)) => Self::Interval {
                name,
                values: split_options(query),
                label
            },
            _ => Self::Unsupported {
                name,
                raw: value.clone()
            }
        };

        Some(variable)
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        match self {
            Self::Query(variable) => &variable.name,
            Self::Custom {
                name, ..
            }
            | Self::Interval {
                name, ..
            }
            | Self::Unsupported {
                name, ..
            } => name
        }
    }

    /// Entry to keep in the raw variables array, `Some` only for
    /// [`Variable::Unsupported`].
    pub fn into_raw(self) -> Option<Value> {
        match self {
            Self::Unsupported {
                raw, ..
            } => Some(raw),
            _ => None
        }
    }

    /// Jsonnet binding name, `<name>Variable`.
    pub fn binding(&self) -> String {
        format!("{}Variable", self.name())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut characters = name.chars();
    characters
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && characters.all(|character| character.is_ascii_alphanumeric() || character == '_')
}

/// Splits a comma-separated option list, trimming entries and dropping empty
/// ones.
///
/// # Examples
///
/// ```
/// use grafonnet_scaffold::split_options;
///
/// assert_eq!(split_options("a, b ,,c"), vec!["a", "b", "c"]);
/// ```
pub fn split_options(query: &str) -> Vec<String> {
    query
        .split(',')
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Renders a variable binding, or `None` when the variable must stay raw.
pub fn render_variable(variable: &Variable) -> Option<String> {
    let lines = match variable {
        Variable::Query(query) => render_query(query),
        Variable::Custom {
            name,
            options,
            label
        } => render_enumerated("custom", name, options, label.as_deref()),
        Variable::Interval {
            name,
            values,
            label
        } => render_enumerated("interval", name, values, label.as_deref()),
        Variable::Unsupported {
            name, ..
        } => {
            warn!(variable = %name, "variable left to raw fallback");
            return None;
        }
    };

    debug!(variable = %variable.name(), "rendered variable");
    Some(lines.join("\n") + ";")
}

fn render_query(variable: &QueryVariable) -> Vec<String> {
    let mut lines = vec![
        format!("local {}Variable = g.dashboard.variable.query.new(", variable.name),
        format!("  {},", json_string(&variable.name)),
        format!("  {}", json_string(&variable.query)),
        ")".to_owned(),
        "+ g.dashboard.variable.query.withDatasource(".to_owned(),
        "  type=config.datasource.type,".to_owned(),
        "  uid=config.datasource.uid".to_owned(),
        ")".to_owned(),
    ];

    if let Some(label) = &variable.label {
        lines.push(format!(
            "+ g.dashboard.variable.query.generalOptions.withLabel({})",
            json_string(label)
        ));
    }
    if variable.include_all {
        lines.push("+ g.dashboard.variable.query.selectionOptions.withIncludeAll(true)".to_owned());
    }
    if variable.multi {
        lines.push("+ g.dashboard.variable.query.selectionOptions.withMulti(true)".to_owned());
    }
    if variable.refresh_on_load {
        lines.push("+ g.dashboard.variable.query.refresh.onLoad()".to_owned());
    }
    if let Some(sort) = variable.sort {
        lines.push(format!("+ g.dashboard.variable.query.withSort({sort})"));
    }

    lines
}

fn render_enumerated(
    namespace: &str,
    name: &str,
    options: &[String],
    label: Option<&str>
) -> Vec<String> {
    let mut lines = vec![
        format!("local {name}Variable = g.dashboard.variable.{namespace}.new("),
        format!("  {},", json_string(name)),
        format!("  {}", json_string_list(options)),
        ")".to_owned(),
    ];

    if let Some(label) = label {
        lines.push(format!(
            "+ g.dashboard.variable.{namespace}.withLabel({})",
            json_string(label)
        ));
    }

    lines
}
