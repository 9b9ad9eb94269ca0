use criterion::{black_box, criterion_group, criterion_main, Criterion};

use aotrace_protocol::{TraceRecord, TraceValue};

fn make_record() -> TraceRecord {
    TraceRecord::reflect("getDeclaredMethod")
        .clazz("com.example.orm.EntityMapper")
        .declaring_class("com.example.orm.AbstractMapper")
        .caller_class("com.example.orm.MapperRegistry")
        .result(true)
        .args(vec![
            TraceValue::Str("mapRow".to_string()),
            TraceValue::List(vec![
                TraceValue::Str("java.sql.ResultSet".to_string()),
                TraceValue::Str("int".to_string()),
            ]),
        ])
}

fn bench_serialization(c: &mut Criterion) {
    let record = make_record();

    c.bench_function("record_serialize", |b| {
        b.iter(|| serde_json::to_string(black_box(&record)).unwrap())
    });

    let batch: Vec<TraceRecord> = (0..64).map(|_| make_record()).collect();

    c.bench_function("record_batch_serialize_64", |b| {
        b.iter(|| serde_json::to_string(black_box(&batch)).unwrap())
    });
}

criterion_group!(benches, bench_serialization);
criterion_main!(benches);
