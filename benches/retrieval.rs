use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use retrieval_core::models::{EmbeddingRecord, Metric, Placement};
use retrieval_core::services::{
    Chunker, Encoder, HashingEncoder, IndexOptions, MemoryBackend, SentenceChunker,
    VectorIndexManager, WindowChunker,
};

fn corpus() -> String {
    "Vector search ranks records by similarity. Chunking keeps passages short! \
     Does re-ranking help? Usually it does.\n\n"
        .repeat(200)
}

fn bench_chunking(c: &mut Criterion) {
    let text = corpus();
    let mut group = c.benchmark_group("chunk");
    group.bench_function("sentence", |b| {
        let chunker = SentenceChunker::new();
        b.iter(|| chunker.chunk(black_box(&text)))
    });
    group.bench_function("window", |b| {
        let chunker = WindowChunker::new(500, 50);
        b.iter(|| chunker.chunk(black_box(&text)))
    });
    group.finish();
}

fn bench_memory_query(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let encoder = HashingEncoder::new(384);
    let mut group = c.benchmark_group("memory_query");

    for size in [1_000usize, 10_000] {
        let index = runtime.block_on(async {
            let index = VectorIndexManager::new(
                Arc::new(MemoryBackend::new()),
                IndexOptions::default(),
            )
            .ensure_index("bench", 384, Metric::Cosine, Placement::default())
            .await
            .expect("index");
            let records: Vec<EmbeddingRecord> = (0..size)
                .map(|i| {
                    let vector = encoder.encode(&format!("document {i} about topic {}", i % 17));
                    EmbeddingRecord::new(format!("doc-{i}"), vector.expect("encode"))
                })
                .collect();
            index.upsert_batch(records).await;
            index
        });
        let probe = encoder.encode("topic 3").expect("encode");

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| runtime.block_on(index.query(black_box(&probe), 10, None)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_chunking, bench_memory_query);
criterion_main!(benches);
