use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lmv_storage::{DataFile, Storage};
use std::hint::black_box;
use std::time::Duration;
use tempfile::TempDir;

fn bench_file_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_operations");
    group.measurement_time(Duration::from_secs(10));

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let storage = rt
        .block_on(async { Storage::builder().root(temp.path()).create(true).connect().await })
        .unwrap();

    let sizes = [("1KB", 1024), ("10KB", 10 * 1024), ("100KB", 100 * 1024)];

    for (name, size) in sizes {
        let data: Vec<u8> = (0..size).map(|i| u8::try_from(i % 256).unwrap()).collect();
        let throughput = u64::try_from(size).unwrap_or(u64::MAX);
        group.throughput(Throughput::Bytes(throughput));

        group.bench_with_input(BenchmarkId::new("write_vault", name), &data, |b, data| {
            b.to_async(&rt).iter(|| async {
                storage.write_file(DataFile::Vault, data).await.unwrap();
            });
        });

        rt.block_on(async {
            storage.write_file(DataFile::Meta, &data).await.unwrap();
        });

        group.bench_function(BenchmarkId::new("read_meta", name), |b| {
            b.to_async(&rt).iter(|| async {
                black_box(storage.read_file(DataFile::Meta).await.unwrap());
            });
        });
    }

    group.finish();
}

fn bench_journal_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("journal");

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let storage = rt
        .block_on(async { Storage::builder().root(temp.path()).create(true).connect().await })
        .unwrap();

    let line = br#"{"v":1,"kdf":{},"hkdf":{},"aead":{},"ciphertext_b64":"..."}"#;

    group.bench_function("append_journal_line", |b| {
        b.to_async(&rt).iter(|| async {
            storage.append_journal_line(line).await.unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_file_operations, bench_journal_append);
criterion_main!(benches);
