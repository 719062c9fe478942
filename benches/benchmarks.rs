// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use grafonnet_scaffold::{Dashboard, ScaffoldOptions, SlugStrategy, generate};
use serde_json::{Value, json};

fn sample_panel(id: i64) -> Value {
    match id % 4 {
        0 => json!({
            "id": id,
            "type": "timeseries",
            "title": format!("Series {id}"),
            "gridPos": {"h": 8, "w": 12, "x": 0, "y": id},
            "fieldConfig": {"defaults": {"unit": "reqps"}},
            "targets": [{"expr": "sum(rate(http_requests_total[5m]))", "legendFormat": "{{code}}"}]
        }),
        1 => json!({
            "id": id,
            "type": "table",
            "datasource": {"type": "grafana-clickhouse-datasource"},
            "targets": [{"rawSql": "SELECT service, count()\nFROM events\nGROUP BY service"}]
        }),
        2 => json!({"id": id, "type": "stat", "targets": [{"expr": "up"}]}),
        _ => json!({"id": id, "type": "heatmap", "title": "Latency"})
    }
}

fn sample_dashboard(panel_count: i64) -> Dashboard {
    let panels: Vec<Value> = (1..=panel_count).map(sample_panel).collect();
    Dashboard::from_value(json!({
        "title": "Benchmark Dashboard",
        "panels": panels,
        "templating": {"list": [
            {"name": "env", "type": "custom", "query": "prod, staging, dev"},
            {"name": "job", "type": "query", "query": "label_values(up, job)", "multi": true}
        ]}
    }))
    .expect("valid export")
}

fn benchmark_small_dashboard(c: &mut Criterion) {
    let dashboard = sample_dashboard(8);
    let options = ScaffoldOptions::new("bench");

    c.bench_function("generate_small_dashboard", |b| {
        b.iter(|| generate(black_box(&dashboard), black_box(&options)).expect("generate failed"))
    });
}

fn benchmark_large_dashboard(c: &mut Criterion) {
    let dashboard = sample_dashboard(400);
    let options = ScaffoldOptions::new("bench");

    c.bench_function("generate_large_dashboard", |b| {
        b.iter(|| {
            let scaffold = generate(black_box(&dashboard), black_box(&options)).expect("generate failed");
            black_box(scaffold.panels_library.len())
        })
    });
}

fn benchmark_slug(c: &mut Criterion) {
    c.bench_function("slug_unicode_title", |b| {
        b.iter(|| SlugStrategy::builder(black_box("Überwachung / API-Gateway (prod) 2025")).build_or_default())
    });
}

criterion_group!(
    benches,
    benchmark_small_dashboard,
    benchmark_large_dashboard,
    benchmark_slug
);
criterion_main!(benches);
