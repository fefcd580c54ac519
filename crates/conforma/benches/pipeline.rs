//! Pipeline throughput benchmarks

use conforma::Conforma;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Map, Value, json};

fn signup(name: &str) -> Value {
    json!({
        "name": format!("  {name}  "),
        "email": "ann@example.com",
        "age": "42",
        "bio": "<p>Hello <b>world</b></p>",
        "tags": ["a", "b", "a"]
    })
}

fn configured(data: Value) -> Conforma {
    let mut form = Conforma::from_data(data);
    form.filter("name", "trim")
        .and_then(|f| f.filter("age", "int"))
        .and_then(|f| f.filter("bio", "stripHtml"))
        .and_then(|f| f.filter("tags", "uniqueList"))
        .and_then(|f| f.validate("name", ["required", "alpha"]))
        .and_then(|f| f.validate("email", ["required", "email"]))
        .and_then(|f| f.validate("age", ["number"]))
        .expect("valid configuration");
    form
}

// ============================================================================
// Filters only
// ============================================================================

fn bench_filters(c: &mut Criterion) {
    c.bench_function("get_clean_data", |b| {
        b.iter(|| {
            let mut form = configured(signup("Ann"));
            black_box(form.get_clean_data())
        })
    });
}

// ============================================================================
// Full execution
// ============================================================================

fn bench_execute(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");

    let mut group = c.benchmark_group("execute");
    for fields in [1usize, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(fields), &fields, |b, &fields| {
            b.iter(|| {
                let mut form = configured(signup("Ann"));
                for i in 0..fields {
                    let field = format!("extra{i}");
                    let mut extra = Map::new();
                    extra.insert(field.clone(), json!("value"));
                    form.set_data(Value::Object(extra));
                    form.validate(field, "alpha").expect("builtin");
                }
                black_box(runtime.block_on(form.execute()))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_filters, bench_execute);
criterion_main!(benches);
