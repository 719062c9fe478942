// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Rendering of panels and their queries into panel library blocks.
//!
//! Every panel becomes a `panel_<id>(config)::` field of the generated
//! library. Panels that cannot be translated with confidence are rendered as
//! a lookup into the raw panel store instead, so a panel is either fully
//! generated or fully raw, never half of each.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    config::DatasourceDenylist,
    dashboard::{Panel, PanelId, PanelKind, Target},
    render::{indent_continuation, json_string},
    units::normalize_unit
};

/// Indentation of target entries inside the `targets=[...]` list.
const TARGET_INDENT: usize = 8;
/// Indentation of SQL lines inside a `|||` text block.
const SQL_INDENT: usize = 4;

/// Inputs shared by every panel of a dashboard.
#[derive(Debug, Clone, Copy)]
pub struct PanelContext<'a> {
    /// Datasource type for panels that do not declare their own.
    pub default_datasource_type: &'a str,
    /// Datasource types that force the raw fallback.
    pub denylist:                &'a DatasourceDenylist
}

/// Why a panel was left to the raw panel store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The panel type has no library builder.
    UnsupportedType {
        /// Declared panel type.
        panel_type: String
    },
    /// At least one target has an unrecognized shape.
    UnrecognizedTarget {
        /// Zero-based position of the first offending target.
        index: usize
    },
    /// The resolved datasource type is denylisted.
    BlockedDatasource {
        /// Resolved datasource type.
        datasource: String
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedType {
                panel_type
            } => write!(formatter, "unsupported panel type '{panel_type}'"),
            Self::UnrecognizedTarget {
                index
            } => write!(formatter, "target #{index} has an unrecognized shape"),
            Self::BlockedDatasource {
                datasource
            } => write!(formatter, "datasource '{datasource}' is denylisted")
        }
    }
}

/// Result of rendering a single panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPanel {
    /// Panel id.
    pub id:       PanelId,
    /// Library field, including the trailing comma.
    pub block:    String,
    /// `None` when the panel rendered fully.
    pub fallback: Option<FallbackReason>
}

impl RenderedPanel {
    /// Returns `true` when the block is a raw store lookup.
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Renders every target of `panel`, or rejects the panel as a whole.
///
/// # Errors
///
/// Returns the [`FallbackReason`] when any target is unrecognized or the
/// datasource type is denylisted.
pub fn render_targets(
    panel: &Panel,
    datasource_type: &str,
    denylist: &DatasourceDenylist
) -> Result<Vec<String>, FallbackReason> {
    let mut rendered = Vec::with_capacity(panel.targets.len());

    for (index, target) in panel.targets.iter().enumerate() {
        match target {
            Target::Sql {
                raw_sql,
                ref_id
            } => rendered.push(render_sql_target(raw_sql, ref_id)),
            Target::Expr {
                expr,
                legend
            } => rendered.push(render_expr_target(&panel.kind, expr, legend)),
            Target::Unrecognized(_) => {
                return Err(FallbackReason::UnrecognizedTarget {
                    index
                });
            }
        }
    }

    if denylist.blocks(datasource_type) {
        return Err(FallbackReason::BlockedDatasource {
            datasource: datasource_type.to_owned()
        });
    }

    Ok(rendered)
}

fn render_sql_target(raw_sql: &str, ref_id: &str) -> String {
    let query = match sql_text_block(raw_sql) {
        Some(block) => format!("|||\n{block}\n  |||"),
        None => json_string(raw_sql)
    };

    format!(
        "clickhouse.sqlTarget(\n  config.datasource,\n  {query},\n  refId={}\n)",
        json_string(ref_id)
    )
}

/// Lays out `raw_sql` as the body of a `|||` text block.
///
/// The common leading whitespace is stripped and every line is padded by
/// [`SQL_INDENT`]. A text block ends at the first line that does not start
/// with the first line's whitespace, so `None` is returned when a later line
/// is indented less than the first one, when a line contains the `|||`
/// delimiter, or when the query is blank.
fn sql_text_block(raw_sql: &str) -> Option<String> {
    let lines: Vec<&str> = raw_sql.lines().collect();
    let first = lines.iter().position(|line| !line.trim().is_empty())?;
    let last = lines.iter().rposition(|line| !line.trim().is_empty())?;
    let lines = &lines[first..=last];

    if lines.iter().any(|line| line.contains("|||")) {
        return None;
    }

    let common = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| leading_whitespace(line))
        .reduce(common_prefix)
        .unwrap_or_default();
    let first_indent = leading_whitespace(&lines[0][common.len()..]);

    let padding = " ".repeat(SQL_INDENT);
    let mut body = Vec::with_capacity(lines.len());
    for line in lines {
        if line.trim().is_empty() {
            body.push(String::new());
            continue;
        }
        let stripped = &line[common.len()..];
        if !stripped.starts_with(first_indent) {
            return None;
        }
        body.push(format!("{padding}{stripped}"));
    }

    Some(body.join("\n"))
}

fn leading_whitespace(line: &str) -> &str {
    let end = line
        .find(|character: char| character != ' ' && character != '\t')
        .unwrap_or(line.len());
    &line[..end]
}

fn common_prefix<'a>(left: &'a str, right: &'a str) -> &'a str {
    let end = left
        .bytes()
        .zip(right.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    &left[..end]
}

fn render_expr_target(kind: &PanelKind, expr: &str, legend: &str) -> String {
    let function = match kind {
        PanelKind::Stat => "prom.instantTarget",
        PanelKind::Table => "prom.tableTarget",
        _ => "prom.target"
    };
    format!("{function}({}, {})", json_string(expr), json_string(legend))
}

/// Library field that defers to the raw panel store.
pub fn fallback_block(id: PanelId) -> String {
    format!(
        "  {}(config):: rawPanels[{}],",
        id.field_name(),
        json_string(&id.to_string())
    )
}

/// Renders `panel` into a library field.
///
/// Rows always render and reference their children by id; other panels
/// render fully or fall back to the raw store.
///
/// # Examples
///
/// ```
/// use grafonnet_scaffold::{DatasourceDenylist, Panel, PanelContext, render_panel};
/// use serde_json::json;
///
/// let denylist = DatasourceDenylist::new(["elasticsearch"]);
/// let context = PanelContext {
///     default_datasource_type: "prometheus",
///     denylist:                &denylist
/// };
/// let panel = Panel::from_value(&json!({"id": 7, "type": "heatmap"})).expect("panel");
///
/// let rendered = render_panel(&panel, &context);
/// assert!(rendered.is_fallback());
/// assert_eq!(rendered.block, r#"  panel_7(config):: rawPanels["7"],"#);
/// ```
pub fn render_panel(panel: &Panel, context: &PanelContext<'_>) -> RenderedPanel {
    let block = match (&panel.kind, panel.kind.builders()) {
        (PanelKind::Row, _) => Ok(render_row(panel)),
        (_, Some(builders)) => {
            let datasource_type = panel.datasource.resolve(context.default_datasource_type);
            render_targets(panel, datasource_type, context.denylist)
                .map(|targets| render_builder(panel, builders, &targets))
        }
        (kind, None) => Err(FallbackReason::UnsupportedType {
            panel_type: kind.type_name().to_owned()
        })
    };

    match block {
        Ok(block) => {
            debug!(panel = %panel.id, title = %panel.title, "rendered panel");
            RenderedPanel {
                id: panel.id,
                block,
                fallback: None
            }
        }
        Err(reason) => {
            warn!(panel = %panel.id, title = %panel.title, %reason, "panel left to raw fallback");
            RenderedPanel {
                id:       panel.id,
                block:    fallback_block(panel.id),
                fallback: Some(reason)
            }
        }
    }
}

fn render_row(panel: &Panel) -> String {
    let child_calls: Vec<String> = panel
        .children
        .iter()
        .map(|child| format!("self.{}(config)", child.id.field_name()))
        .collect();

    let child_block = if child_calls.is_empty() {
        String::new()
    } else {
        format!(
            "\n    + g.panel.row.withPanels([\n      {}\n    ])",
            child_calls.join(",\n      ")
        )
    };

    format!(
        "  {}(config)::\n    panels.rowPanel({}, collapsed={}){child_block},",
        panel.id.field_name(),
        json_string(&panel.title),
        panel.collapsed
    )
}

fn render_builder(
    panel: &Panel,
    (builder, namespace): (&str, &str),
    targets: &[String]
) -> String {
    let mut lines = vec![
        format!("  {}(config)::", panel.id.field_name()),
        format!("    panels.{builder}("),
        format!("      title={},", json_string(&panel.title)),
    ];

    if targets.is_empty() {
        lines.push("      targets=[],".to_owned());
    } else {
        let entries: Vec<String> = targets
            .iter()
            .map(|target| indent_continuation(target, TARGET_INDENT))
            .collect();
        lines.push("      targets=[".to_owned());
        lines.push(format!("        {},", entries.join(",\n        ")));
        lines.push("      ],".to_owned());
    }

    lines.push("      datasource=config.datasource,".to_owned());
    if let Some(unit) = normalize_unit(panel.unit.as_deref()) {
        lines.push(format!("      unit={unit},"));
    }
    lines.push("      pluginVersion=config.pluginVersion".to_owned());
    lines.push("    )".to_owned());

    if let Some(grid) = panel.grid {
        let setters = [("withH", grid.h), ("withW", grid.w), ("withX", grid.x), ("withY", grid.y)];
        for (setter, value) in setters {
            lines.push(format!("    + g.panel.{namespace}.gridPos.{setter}({value})"));
        }
    }

    if let Some(last) = lines.last_mut() {
        last.push(',');
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::{
        FallbackReason, PanelContext, SQL_INDENT, fallback_block, leading_whitespace,
        render_panel, render_targets, sql_text_block
    };
    use crate::{
        config::DatasourceDenylist,
        dashboard::{Panel, PanelId}
    };

    fn panel(value: serde_json::Value) -> Panel {
        Panel::from_value(&value).expect("panel should parse")
    }

    fn render(value: serde_json::Value) -> super::RenderedPanel {
        let denylist = DatasourceDenylist::new(["elasticsearch"]);
        let context = PanelContext {
            default_datasource_type: "prometheus",
            denylist:                &denylist
        };
        render_panel(&panel(value), &context)
    }

    #[test]
    fn unknown_type_falls_back() {
        let rendered = render(json!({"id": 12, "type": "heatmap"}));

        assert_eq!(
            rendered.fallback,
            Some(FallbackReason::UnsupportedType {
                panel_type: "heatmap".to_owned()
            })
        );
        assert_eq!(rendered.block, fallback_block(PanelId(12)));
        assert_eq!(rendered.block, r#"  panel_12(config):: rawPanels["12"],"#);
    }

    #[test]
    fn timeseries_panel_renders_full_block() {
        let rendered = render(json!({
            "id": 2,
            "type": "timeseries",
            "title": "Request rate",
            "gridPos": {"h": 8, "w": 12, "x": 0, "y": 1},
            "fieldConfig": {"defaults": {"unit": "reqps"}},
            "targets": [{"expr": "sum(rate(http_requests_total[5m]))", "legendFormat": "{{code}}"}]
        }));

        assert!(!rendered.is_fallback());
        let expected = [
            "  panel_2(config)::",
            "    panels.timeseriesPanel(",
            "      title=\"Request rate\",",
            "      targets=[",
            "        prom.target(\"sum(rate(http_requests_total[5m]))\", \"{{code}}\"),",
            "      ],",
            "      datasource=config.datasource,",
            "      unit=standards.units.qps,",
            "      pluginVersion=config.pluginVersion",
            "    )",
            "    + g.panel.timeSeries.gridPos.withH(8)",
            "    + g.panel.timeSeries.gridPos.withW(12)",
            "    + g.panel.timeSeries.gridPos.withX(0)",
            "    + g.panel.timeSeries.gridPos.withY(1),"
        ]
        .join("\n");
        assert_eq!(rendered.block, expected);
    }

    #[test]
    fn panel_without_grid_closes_builder_call() {
        let rendered = render(json!({"id": 3, "type": "bargauge", "title": "Top"}));

        assert!(rendered.block.contains("panels.barGaugePanel("));
        assert!(rendered.block.contains("      targets=[],"));
        assert!(rendered.block.ends_with("    ),"));
        assert!(!rendered.block.contains("gridPos"));
        assert!(!rendered.block.contains("unit="));
    }

    #[test]
    fn expression_dispatch_follows_panel_type() {
        let target = json!([{"expr": "up", "legendFormat": "x"}]);

        let stat = render(json!({"id": 1, "type": "stat", "targets": target.clone()}));
        let table = render(json!({"id": 2, "type": "table", "targets": target.clone()}));
        let pie = render(json!({"id": 3, "type": "piechart", "targets": target}));

        assert!(stat.block.contains("prom.instantTarget(\"up\", \"x\")"));
        assert!(table.block.contains("prom.tableTarget(\"up\", \"x\")"));
        assert!(pie.block.contains("prom.target(\"up\", \"x\")"));
    }

    #[test]
    fn sql_target_is_indented_inside_text_block() {
        let rendered = render(json!({
            "id": 4,
            "type": "table",
            "datasource": {"type": "grafana-clickhouse-datasource"},
            "targets": [{"rawSql": "SELECT count()\nFROM events", "refId": "Q"}]
        }));

        assert!(!rendered.is_fallback());
        let expected = [
            "        clickhouse.sqlTarget(",
            "          config.datasource,",
            "          |||",
            "            SELECT count()",
            "            FROM events",
            "          |||,",
            "          refId=\"Q\"",
            "        ),"
        ]
        .join("\n");
        assert!(rendered.block.contains(&expected), "block was:\n{}", rendered.block);
    }

    #[test]
    fn sql_with_deeper_first_line_is_written_as_string() {
        let rendered = render(json!({
            "id": 8,
            "type": "table",
            "targets": [{"rawSql": "  SELECT a\nFROM t"}]
        }));

        assert!(!rendered.is_fallback());
        assert!(!rendered.block.contains("|||"), "block was:\n{}", rendered.block);
        assert!(rendered.block.contains(r#"          "  SELECT a\nFROM t","#));
    }

    #[test]
    fn sql_text_block_strips_common_indentation() {
        assert_eq!(
            sql_text_block("\n    SELECT a\n      FROM t\n\n    WHERE x\n  \n").as_deref(),
            Some("    SELECT a\n      FROM t\n\n    WHERE x")
        );
        assert_eq!(sql_text_block("\tSELECT 1\n\tFROM t").as_deref(), Some("    SELECT 1\n    FROM t"));
    }

    #[test]
    fn sql_text_block_rejects_delimiter_and_blank_queries() {
        assert_eq!(sql_text_block("SELECT '|||' AS pipes"), None);
        assert_eq!(sql_text_block("  \n\t\n"), None);
        assert_eq!(sql_text_block(""), None);
        assert_eq!(sql_text_block("\tSELECT a\n  FROM t"), None);
    }

    proptest! {
        #[test]
        fn sql_text_block_keeps_first_line_prefix(
            lines in proptest::collection::vec("[ \t]{0,4}[a-z|' ]{0,8}", 0..6)
        ) {
            if let Some(body) = sql_text_block(&lines.join("\n")) {
                prop_assert!(!body.contains("|||"));
                let first = body.lines().next().unwrap_or_default();
                let prefix = leading_whitespace(first);
                prop_assert!(prefix.len() >= SQL_INDENT);
                for line in body.lines() {
                    prop_assert!(line.is_empty() || line.starts_with(prefix), "line {line:?} in {body:?}");
                }
            }
        }
    }

    #[test]
    fn negative_panel_id_keeps_identifier_field_name() {
        let rendered = render(json!({"id": -1, "type": "heatmap"}));
        assert_eq!(rendered.block, r#"  panel_neg1(config):: rawPanels["-1"],"#);

        let row = render(json!({"id": 30, "type": "row", "panels": [{"id": -2, "type": "stat"}]}));
        assert!(row.block.contains("      self.panel_neg2(config)"));

        let stat = render(json!({"id": -3, "type": "stat"}));
        assert!(stat.block.starts_with("  panel_neg3(config)::\n    panels.statPanel("));
    }

    #[test]
    fn missing_panel_type_is_unsupported() {
        let rendered = render(json!({"id": 9}));
        assert_eq!(
            rendered.fallback,
            Some(FallbackReason::UnsupportedType {
                panel_type: String::new()
            })
        );
    }

    #[test]
    fn single_unrecognized_target_rejects_whole_panel() {
        let rendered = render(json!({
            "id": 5,
            "type": "timeseries",
            "targets": [{"expr": "up"}, {"query": "logs | json"}, {"expr": "down"}]
        }));

        assert_eq!(
            rendered.fallback,
            Some(FallbackReason::UnrecognizedTarget {
                index: 1
            })
        );
        assert!(!rendered.block.contains("prom.target"));
    }

    #[test]
    fn denylisted_datasource_rejects_panel() {
        let rendered = render(json!({
            "id": 6,
            "type": "timeseries",
            "datasource": {"type": "Elasticsearch", "uid": "es"},
            "targets": [{"expr": "up"}]
        }));

        assert_eq!(
            rendered.fallback,
            Some(FallbackReason::BlockedDatasource {
                datasource: "Elasticsearch".to_owned()
            })
        );
    }

    #[test]
    fn render_targets_uses_given_denylist() {
        let panel = panel(json!({"id": 1, "type": "stat", "targets": [{"expr": "up"}]}));

        let open = DatasourceDenylist::default();
        assert_eq!(
            render_targets(&panel, "elasticsearch", &open),
            Ok(vec!["prom.instantTarget(\"up\", \"\")".to_owned()])
        );

        let strict = DatasourceDenylist::new(["prom"]);
        assert!(render_targets(&panel, "prometheus", &strict).is_err());
    }

    #[test]
    fn row_references_children_and_never_falls_back() {
        let rendered = render(json!({
            "id": 10,
            "type": "row",
            "title": "Overview",
            "collapsed": true,
            "panels": [{"id": 11, "type": "stat"}, {"id": 12, "type": "heatmap"}]
        }));

        assert!(!rendered.is_fallback());
        assert_eq!(
            rendered.block,
            [
                "  panel_10(config)::",
                "    panels.rowPanel(\"Overview\", collapsed=true)",
                "    + g.panel.row.withPanels([",
                "      self.panel_11(config),",
                "      self.panel_12(config)",
                "    ]),"
            ]
            .join("\n")
        );
    }

    #[test]
    fn empty_row_renders_without_children() {
        let rendered = render(json!({"id": 20, "type": "row", "title": "Empty"}));
        assert_eq!(
            rendered.block,
            "  panel_20(config)::\n    panels.rowPanel(\"Empty\", collapsed=false),"
        );
    }

    #[test]
    fn fallback_reason_messages_are_readable() {
        let reason = FallbackReason::BlockedDatasource {
            datasource: "elasticsearch".to_owned()
        };
        assert_eq!(reason.to_string(), "datasource 'elasticsearch' is denylisted");

        let encoded = serde_json::to_value(&reason).expect("encode");
        assert_eq!(encoded, json!({"reason": "blocked_datasource", "datasource": "elasticsearch"}));
    }
}
