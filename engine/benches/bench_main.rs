use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kv_rs::database::{Database, DatabaseOptions};

fn bench_set_get(c: &mut Criterion) {
    let db = Database::open(DatabaseOptions::default()).unwrap();
    let mut i: u64 = 0;

    c.bench_function("set", |b| {
        b.iter(|| {
            i += 1;
            let key = format!("key:{i}").into_bytes();
            db.exec(1, vec![b"SET".to_vec(), key, black_box(b"value".to_vec())]);
        })
    });

    db.exec(1, vec![b"SET".to_vec(), b"bench:get".to_vec(), b"value".to_vec()]);
    c.bench_function("get", |b| {
        b.iter(|| db.exec(1, vec![b"GET".to_vec(), black_box(b"bench:get".to_vec())]))
    });
}

fn bench_incr(c: &mut Criterion) {
    let db = Database::open(DatabaseOptions::default()).unwrap();
    c.bench_function("incr", |b| {
        b.iter(|| db.exec(1, vec![b"INCR".to_vec(), black_box(b"bench:counter".to_vec())]))
    });
}

criterion_group!(benches, bench_set_get, bench_incr);
criterion_main!(benches);
