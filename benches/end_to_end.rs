//! Latency benchmarks for the CTC loss/gradient pass and beam decoding.
//!
//! Measures:
//! 1. Forward/backward CTC (loss + gradient) at a few `(T, L)` sizes
//! 2. Prefix beam search at a few beam widths
//! 3. One full training epoch over a small synthetic batch

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use seqnet::beam::beam_search;
use seqnet::buffer::Matrix;
use seqnet::ctc::CtcContext;
use seqnet::dataset::batch::make_batches;
use seqnet::dataset::Sequence;
use seqnet::driver::train::train_epoch;
use seqnet::model::build_chain;

const BLANK: usize = 0;

/// Synthetic `[T, C]` log-probability-ready matrix (softmax-shaped rows).
fn synthetic_predictions(t: usize, c: usize) -> Matrix {
    let mut m = Matrix::zeros(t, c);
    for row in 0..t {
        let mut total = 0.0f32;
        for col in 0..c {
            let v = 1.0 + ((row * c + col) % 7) as f32;
            m.set(row, col, v);
            total += v;
        }
        for col in 0..c {
            m.set(row, col, m.get(row, col) / total);
        }
    }
    m
}

fn synthetic_one_hot(t: usize, c: usize, label: usize) -> Matrix {
    let mut m = Matrix::zeros(t, c);
    for row in 0..t {
        m.set(row, label.min(c - 1), 1.0);
    }
    m
}

fn bench_ctc_forward_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("ctc_loss_gradient");
    for &(t, l) in &[(20usize, 8usize), (80, 16), (200, 32)] {
        let yp = synthetic_predictions(t, l);
        let yt = synthetic_one_hot(t, l, 1);
        group.bench_function(format!("t{t}_l{l}"), |b| {
            b.iter(|| {
                let mut ctx = CtcContext::new(t, l, BLANK);
                let loss = ctx.loss(black_box(&yp), black_box(&yt));
                let mut grad = Matrix::zeros(t, l);
                ctx.gradient(&yp, &mut grad);
                black_box(loss)
            })
        });
    }
    group.finish();
}

fn bench_beam_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("beam_search");
    let p = synthetic_predictions(100, 16);
    for &width in &[4usize, 8, 16] {
        group.bench_function(format!("width{width}"), |b| {
            b.iter(|| beam_search(black_box(&p), width, BLANK))
        });
    }
    group.finish();
}

fn bench_training_epoch(c: &mut Criterion) {
    let feature_dim = 8;
    let num_classes = 10;
    let sequences: Vec<Sequence> = (0..6)
        .map(|i| Sequence {
            frames: synthetic_predictions(30, feature_dim),
            labels: vec![(i % (num_classes - 1)) + 1; 30],
            eop: vec![false; 30],
        })
        .collect();
    let batches = make_batches(&sequences, 3, feature_dim, num_classes, BLANK);

    c.bench_function("train_epoch_6seq_batch3", |b| {
        b.iter(|| {
            let mut chain = build_chain(feature_dim, &[16], num_classes);
            let result = train_epoch(&mut chain, black_box(&batches), 1e-3, 1e-4, BLANK);
            black_box(result.avg_loss)
        })
    });
}

criterion_group!(
    benches,
    bench_ctc_forward_backward,
    bench_beam_search,
    bench_training_epoch,
);
criterion_main!(benches);
