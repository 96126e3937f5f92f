//! Criterion benchmarks for remapper evaluation.
//!
//! Definitions are parsed once outside the timed loop, so the numbers are
//! the per-call cost of walking a compiled tree against an input value.
//!
//! Run:
//!   cargo bench
//!   cargo bench -- simple_path         # one group
//!   cargo bench -- realistic_workload  # one group

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexMap;
use remapper::{parser, EvaluationContext, Evaluator, JValue, Remapper};

// ── Data builders ─────────────────────────────────────────────────────────────

/// Flat array of numbers: [0, 1, ..., n-1].
fn numeric_array(n: usize) -> JValue {
    JValue::array((0..n).map(|i| JValue::from(i as f64)).collect())
}

/// `n` product objects: {id, name, category, price, inStock, created}.
fn products(n: usize) -> JValue {
    let categories = ["Electronics", "Clothing", "Books", "Home"];
    let items: Vec<JValue> = (0..n)
        .map(|i| {
            let mut m = IndexMap::new();
            m.insert("id".to_string(), JValue::from(i as f64));
            m.insert("name".to_string(), JValue::string(format!("Product {i}")));
            m.insert("category".to_string(), JValue::from(categories[i % 4]));
            m.insert("price".to_string(), JValue::from(10.0 + i as f64 * 2.5));
            m.insert("inStock".to_string(), JValue::Bool(i % 2 == 0));
            m.insert(
                "created".to_string(),
                JValue::string(format!("2025-{:02}-{:02}T10:00:00.000Z", i % 12 + 1, i % 28 + 1)),
            );
            JValue::object(m)
        })
        .collect();
    let mut root = IndexMap::new();
    root.insert("products".to_string(), JValue::array(items));
    JValue::object(root)
}

fn definition(json: &str) -> Remapper {
    parser::parse(&JValue::from_json_str(json).unwrap())
}

// ── Helper: evaluate remapper on data ─────────────────────────────────────────

#[inline]
fn eval(evaluator: &Evaluator, remapper: &Remapper, data: &JValue, ctx: &EvaluationContext) -> JValue {
    evaluator.evaluate(remapper, data, ctx).unwrap()
}

// ── Bench groups ──────────────────────────────────────────────────────────────

fn bench_simple_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("simple_path");
    group.sample_size(300);
    let evaluator = Evaluator::new();
    let ctx = EvaluationContext::default();

    // {"prop": "name"}
    {
        let remapper = definition(r#"{"prop": "name"}"#);
        let data = JValue::from_json_str(r#"{"name":"Alice","age":30}"#).unwrap();
        group.bench_function("prop", |b| {
            b.iter(|| black_box(eval(&evaluator, black_box(&remapper), black_box(&data), &ctx)))
        });
    }

    // 5-level dotted path
    {
        let remapper = definition(r#"{"prop": "a.b.c.d.e"}"#);
        let data = JValue::from_json_str(r#"{"a":{"b":{"c":{"d":{"e":42}}}}}"#).unwrap();
        group.bench_function("deep_path_5", |b| {
            b.iter(|| black_box(eval(&evaluator, black_box(&remapper), black_box(&data), &ctx)))
        });
    }

    // Same depth as a pipeline of single-key steps
    {
        let remapper = definition(r#"[{"prop": "a"}, {"prop": "b"}, {"prop": "c"}, {"prop": "d"}, {"prop": "e"}]"#);
        let data = JValue::from_json_str(r#"{"a":{"b":{"c":{"d":{"e":42}}}}}"#).unwrap();
        group.bench_function("pipeline_5", |b| {
            b.iter(|| black_box(eval(&evaluator, black_box(&remapper), black_box(&data), &ctx)))
        });
    }

    // Arithmetic on two properties
    {
        let remapper = definition(r#"{"maths": {"a": {"prop": "price"}, "b": {"prop": "quantity"}, "operation": "multiply"}}"#);
        let data = JValue::from_json_str(r#"{"price":10.5,"quantity":3}"#).unwrap();
        group.bench_function("maths", |b| {
            b.iter(|| black_box(eval(&evaluator, black_box(&remapper), black_box(&data), &ctx)))
        });
    }

    group.finish();
}

fn bench_array_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_operations");
    let evaluator = Evaluator::new();
    let ctx = EvaluationContext::default();

    let map = definition(r#"{"array.map": {"maths": {"a": {"root": null}, "b": 2, "operation": "multiply"}}}"#);
    let filter = definition(r#"{"array.filter": {"gt": [{"root": null}, 50]}}"#);
    let unique = definition(r#"{"array.unique": null}"#);

    for n in [100_usize, 1000, 10000] {
        let data = numeric_array(n);
        group.bench_with_input(BenchmarkId::new("map", n), &data, |b, data| {
            b.iter(|| black_box(eval(&evaluator, &map, black_box(data), &ctx)))
        });
        group.bench_with_input(BenchmarkId::new("filter", n), &data, |b, data| {
            b.iter(|| black_box(eval(&evaluator, &filter, black_box(data), &ctx)))
        });
        group.bench_with_input(BenchmarkId::new("unique", n), &data, |b, data| {
            b.iter(|| black_box(eval(&evaluator, &unique, black_box(data), &ctx)))
        });
    }

    {
        let remapper = definition(r#"{"array.range": 1000}"#);
        group.bench_function("range_1000", |b| {
            b.iter(|| black_box(eval(&evaluator, &remapper, &JValue::Null, &ctx)))
        });
    }

    group.finish();
}

fn bench_object_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("object_operations");
    let evaluator = Evaluator::new();
    let ctx = EvaluationContext::default();
    let data = products(100);

    {
        let remapper = definition(
            r#"[{"prop": "products"}, {"array.map": {"object.from": {
                "key": {"prop": "id"}, "label": {"prop": "name"}, "cost": {"prop": "price"}
            }}}]"#,
        );
        group.bench_function("object_from_100", |b| {
            b.iter(|| black_box(eval(&evaluator, &remapper, black_box(&data), &ctx)))
        });
    }

    {
        let remapper = definition(r#"[{"prop": "products"}, {"array.map": {"object.omit": ["inStock", "created"]}}]"#);
        group.bench_function("object_omit_100", |b| {
            b.iter(|| black_box(eval(&evaluator, &remapper, black_box(&data), &ctx)))
        });
    }

    {
        let remapper = definition(
            r#"{"object.compare": [
                [{"prop": "products"}, {"array.toObject": {"key": {"prop": "name"}, "value": {"prop": "price"}}}],
                [{"prop": "products"}, {"array.toObject": {"key": {"prop": "name"}, "value": {"prop": "id"}}}]
            ]}"#,
        );
        group.bench_function("object_compare_100", |b| {
            b.iter(|| black_box(eval(&evaluator, &remapper, black_box(&data), &ctx)))
        });
    }

    group.finish();
}

fn bench_string_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("string_operations");
    let evaluator = Evaluator::new();
    let ctx = EvaluationContext::default();
    let data = JValue::from_json_str(r#"{"first":"Ada","last":"Lovelace","bio":"Wrote the first program in 1843"}"#).unwrap();

    {
        let remapper = definition(
            r#"{"string.format": {"template": "{first} {last}", "values": {"first": {"prop": "first"}, "last": {"prop": "last"}}}}"#,
        );
        group.bench_function("format", |b| {
            b.iter(|| black_box(eval(&evaluator, &remapper, black_box(&data), &ctx)))
        });
    }

    {
        let remapper = definition(r#"[{"prop": "bio"}, {"string.replace": {"\\d+": "year"}}, {"string.case": "upper"}]"#);
        group.bench_function("replace_and_case", |b| {
            b.iter(|| black_box(eval(&evaluator, &remapper, black_box(&data), &ctx)))
        });
    }

    group.finish();
}

fn bench_realistic_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("realistic_workload");
    let evaluator = Evaluator::new();
    let ctx = EvaluationContext::builder().locale("en").build();
    let data = products(100);

    // Table view: filter, project, format dates, group by category
    {
        let remapper = definition(
            r#"[
                {"prop": "products"},
                {"array.filter": {"prop": "inStock"}},
                {"array.map": {"object.assign": {
                    "month": [{"prop": "created"}, {"date.startOf": "month"}, {"date.format": "yyyy-MM"}],
                    "position": {"array": "index"}
                }}},
                {"array.groupBy": "category"}
            ]"#,
        );
        group.bench_function("table_view", |b| {
            b.iter(|| black_box(eval(&evaluator, &remapper, black_box(&data), &ctx)))
        });
    }

    // Query string for a resource request
    {
        let remapper = definition(
            r#"{"object.from": {
                "$filter": {"filter.from": {
                    "category": {"type": "String", "comparator": "eq", "value": {"prop": "category"}},
                    "created": {"type": "Date", "comparator": "ge", "value": {"prop": "since"}}
                }},
                "$orderby": {"order.from": {"created": "desc"}}
            }}"#,
        );
        let query = JValue::from_json_str(r#"{"category":"Books","since":"2025-01-01T00:00:00Z"}"#).unwrap();
        group.bench_function("query_builder", |b| {
            b.iter(|| black_box(eval(&evaluator, &remapper, black_box(&query), &ctx)))
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    let source = JValue::from_json_str(
        r#"[{"prop": "products"}, {"array.map": {"if": {
            "condition": {"and": [{"prop": "inStock"}, {"gt": [{"prop": "price"}, 20]}]},
            "then": {"object.from": {"name": {"prop": "name"}, "tag": {"string.case": "upper"}}},
            "else": null
        }}}, {"null.strip": null}]"#,
    )
    .unwrap();

    group.bench_function("parse_pipeline", |b| b.iter(|| black_box(parser::parse(black_box(&source)))));
    group.bench_function("validate_pipeline", |b| {
        b.iter(|| black_box(parser::validate(black_box(&source)).is_ok()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_simple_paths,
    bench_array_operations,
    bench_object_operations,
    bench_string_operations,
    bench_realistic_workload,
    bench_parse
);
criterion_main!(benches);
