use criterion::{black_box, criterion_group, criterion_main, Criterion};

use noisefs::block::{self, Block};
use noisefs::cache::standard::{StandardCache, StandardCacheConfig};
use noisefs::cache::Cache;

fn bench_xor(c: &mut Criterion) {
    let block_size = 128 * 1024;
    let data = Block::new(vec![0xAAu8; block_size], block_size).unwrap();
    let r1 = Block::new_random(block_size).unwrap();
    let r2 = Block::new_random(block_size).unwrap();

    c.bench_function("xor_anonymize_128kib", |b| {
        b.iter(|| block::xor(black_box(&[&data, &r1, &r2])).unwrap())
    });
}

fn bench_cache_sampling(c: &mut Criterion) {
    let cache = StandardCache::new(StandardCacheConfig { max_entries: 10_000 });
    for i in 0..5_000u32 {
        let bytes = i.to_le_bytes().repeat(16);
        cache.store(Block::new(bytes, 64).unwrap());
    }

    c.bench_function("standard_cache_get_randomizers_20", |b| {
        b.iter(|| cache.get_randomizers(black_box(20)))
    });
}

criterion_group!(benches, bench_xor, bench_cache_sampling);
criterion_main!(benches);
