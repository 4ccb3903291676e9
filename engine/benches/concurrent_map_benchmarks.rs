use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kv_rs::concurrent_map::ConcurrentMap;

fn bench_put_and_get(c: &mut Criterion) {
    let map: ConcurrentMap<Vec<u8>> = ConcurrentMap::new(16);
    let mut i: u64 = 0;

    c.bench_function("concurrent_map_put", |b| {
        b.iter(|| {
            i += 1;
            let key = format!("key:{i}").into_bytes();
            map.put(key, black_box(b"value".to_vec())).unwrap();
        })
    });

    map.put(b"bench:get".to_vec(), b"value".to_vec()).unwrap();
    c.bench_function("concurrent_map_get", |b| {
        b.iter(|| map.get(black_box(b"bench:get")).unwrap())
    });
}

fn bench_atomic_update(c: &mut Criterion) {
    let map: ConcurrentMap<i64> = ConcurrentMap::new(16);
    c.bench_function("concurrent_map_atomic_update", |b| {
        b.iter(|| {
            map.atomic_update(black_box(b"bench:counter"), |cur| Ok((Some(cur.unwrap_or(0) + 1), ())))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_put_and_get, bench_atomic_update);
criterion_main!(benches);
