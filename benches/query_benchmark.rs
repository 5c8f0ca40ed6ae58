//! Criterion benchmarks for treelm queries.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use treelm::{LmType, QueryContext, TreeLm, TreeLmBuilder, WordId};

/// Seeded trigram model over a few hundred words.
fn build_model(vocab: usize, seed: u64) -> TreeLm {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut builder = TreeLmBuilder::new(vocab * 12, LmType::Backoff);

    builder.add_word("<unk>").unwrap();
    for w in 1..vocab {
        builder.add_word(format!("w{}", w)).unwrap();
    }
    builder.add_gram(&[0], -5.0, 0.0).unwrap();
    for w in 1..vocab as WordId {
        builder.add_gram(&[w], -2.0, -0.4).unwrap();
    }

    let mut bigrams = Vec::new();
    for w1 in 1..vocab as WordId {
        for w2 in 1..vocab as WordId {
            if rng.gen_bool(0.02) {
                builder.add_gram(&[w1, w2], -1.0, -0.2).unwrap();
                bigrams.push((w1, w2));
            }
        }
    }
    for (w1, w2) in bigrams {
        for w3 in 1..vocab as WordId {
            if rng.gen_bool(0.01) {
                builder.add_gram(&[w1, w2, w3], -0.5, 0.0).unwrap();
            }
        }
    }
    builder.finish()
}

fn benchmark_log_prob(c: &mut Criterion) {
    let vocab = 500;
    let lm = build_model(vocab, 42);
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let grams: Vec<[WordId; 3]> = (0..1024)
        .map(|_| {
            [
                rng.gen_range(0..vocab as WordId),
                rng.gen_range(0..vocab as WordId),
                rng.gen_range(0..vocab as WordId),
            ]
        })
        .collect();

    let mut group = c.benchmark_group("log_prob");
    group.bench_function("trigram_backoff", |b| {
        let mut ctx = QueryContext::new();
        let mut i = 0;
        b.iter(|| {
            let gram = &grams[i % grams.len()];
            i += 1;
            lm.log_prob(&mut ctx, black_box(gram)).unwrap()
        });
    });
    group.finish();
}

fn benchmark_batch_lists(c: &mut Criterion) {
    let vocab = 500;
    let lm = build_model(vocab, 42);
    let targets: Vec<WordId> = (0..vocab as WordId).collect();
    let mut out = vec![0.0f32; targets.len()];

    let mut group = c.benchmark_group("batch");
    group.bench_function("bigram_list_full_vocab", |b| {
        b.iter(|| {
            lm.fetch_bigram_list(black_box(3), &targets, &mut out)
                .unwrap();
            out[0]
        });
    });
    group.bench_function("trigram_list_full_vocab", |b| {
        b.iter(|| {
            lm.fetch_trigram_list(black_box(3), black_box(5), &targets, &mut out)
                .unwrap();
            out[0]
        });
    });
    group.finish();
}

criterion_group!(benches, benchmark_log_prob, benchmark_batch_lists);
criterion_main!(benches);
