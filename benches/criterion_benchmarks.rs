use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wrapfile::compression::{self, CompressionLevel};
use wrapfile::wrap::Wrap;

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        out.push((s >> 33) as u8);
    }
    out
}

/// Asset-like data: random bytes drawn from a small alphabet with runs.
fn gen_asset(size: usize, seed: u64) -> Vec<u8> {
    gen_data(size, seed)
        .chunks(8)
        .flat_map(|chunk| {
            let byte = b'a' + chunk[0] % 12;
            std::iter::repeat_n(byte, chunk.len())
        })
        .collect()
}

fn write_source(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, data).unwrap();
    path
}

fn write_ratio_snapshot() {
    let data = gen_asset(1024 * 1024, 123);
    let mut csv = String::from("level,compressed_bytes,uncompressed_bytes,ratio\n");
    for level in 1u8..=9 {
        let level = CompressionLevel::new(level).unwrap();
        let mut packed = vec![0u8; compression::compress_bound(data.len())];
        let mut len = packed.len();
        compression::compress(&mut packed, &mut len, &data, level);
        let ratio = len as f64 / data.len() as f64;
        csv.push_str(&format!("{level},{len},{},{ratio}\n", data.len()));
    }
    let out_dir = Path::new("target/criterion/custom_reports");
    let _ = fs::create_dir_all(out_dir);
    let _ = fs::write(out_dir.join("ratio_snapshot.csv"), csv);
}

fn bench_emplace_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("emplace_speed_mb_s");
    let dir = TempDir::new().unwrap();
    for size in [64 * 1024usize, 1024 * 1024, 4 * 1024 * 1024] {
        let source = write_source(&dir, &format!("src-{size}"), &gen_asset(size, 1));
        let archive = dir.path().join(format!("emplace-{size}.wrap"));
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut wrap = Wrap::create(&archive, "Bench", 1, Path::new(""), 0).unwrap();
                let index = wrap
                    .emplace(&source, Path::new("asset"), CompressionLevel::DEFAULT, 0)
                    .unwrap();
                black_box(index);
            });
        });
    }
    g.finish();
}

fn bench_read_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("read_speed_mb_s");
    let dir = TempDir::new().unwrap();
    for level in [CompressionLevel::NONE, CompressionLevel::FAST, CompressionLevel::HIGH] {
        let size = 1024 * 1024;
        let source = write_source(&dir, &format!("src-{level}"), &gen_asset(size, 2));
        let archive = dir.path().join(format!("read-{level}.wrap"));
        let mut wrap = Wrap::create(&archive, "Bench", 1, Path::new(""), 0).unwrap();
        wrap.emplace(&source, Path::new("asset"), level, 0).unwrap();

        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(level), &level, |b, _| {
            b.iter(|| {
                let data = wrap.read(black_box(Path::new("asset"))).unwrap();
                black_box(data);
            });
        });
    }
    g.finish();
}

fn bench_ratio_vs_level(c: &mut Criterion) {
    write_ratio_snapshot();
    let mut g = c.benchmark_group("compression_ratio_vs_level");
    let data = gen_asset(1024 * 1024, 3);
    for level in 1u8..=9 {
        let level = CompressionLevel::new(level).unwrap();
        g.bench_with_input(BenchmarkId::from_parameter(level), &level, |b, level| {
            b.iter(|| {
                let mut packed = vec![0u8; compression::compress_bound(data.len())];
                let mut len = packed.len();
                compression::compress(&mut packed, &mut len, black_box(&data), *level);
                black_box(len as f64 / data.len() as f64);
            });
        });
    }
    g.finish();
}

fn bench_slot_reuse(c: &mut Criterion) {
    let mut g = c.benchmark_group("slot_reuse");
    let dir = TempDir::new().unwrap();
    for entries in [16u32, 256, 4096] {
        let archive = dir.path().join(format!("reuse-{entries}.wrap"));
        let mut wrap = Wrap::create(&archive, "Bench", entries, Path::new(""), 0).unwrap();
        let source = write_source(&dir, &format!("reuse-src-{entries}"), &gen_asset(4096, 4));
        for i in 0..entries {
            wrap.emplace(&source, Path::new(&format!("e{i}")), CompressionLevel::NONE, 8192)
                .unwrap();
        }

        g.bench_with_input(BenchmarkId::from_parameter(entries), &entries, |b, _| {
            b.iter(|| {
                let index = wrap
                    .emplace(&source, Path::new("e0"), CompressionLevel::NONE, 0)
                    .unwrap();
                black_box(index);
            });
        });
    }
    g.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut g = c.benchmark_group("load_vs_entry_count");
    let dir = TempDir::new().unwrap();
    for entries in [64u32, 1024, 16384] {
        let archive = dir.path().join(format!("load-{entries}.wrap"));
        Wrap::create(&archive, "Bench", entries, Path::new("Assets"), 0).unwrap();
        g.bench_with_input(BenchmarkId::from_parameter(entries), &entries, |b, _| {
            b.iter(|| {
                let wrap = Wrap::load(black_box(&archive)).unwrap();
                black_box(wrap.free_count());
            });
        });
    }
    g.finish();
}

criterion_group!(
    benches,
    bench_emplace_speed,
    bench_read_speed,
    bench_ratio_vs_level,
    bench_slot_reuse,
    bench_load
);
criterion_main!(benches);
