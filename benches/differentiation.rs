//! Differentiation Benchmarks
//!
//! This suite measures the cost of building and evaluating derivative operators.
//!
//! ## Benchmark Structure
//!
//! ### 1. Hessian Construction (`benchmark_hessian_construction`)
//! Time to parse an expression and build its gradient and Hessian trees, once with the
//! rewrite pass and once with raw derivative trees straight from the term algebra.
//!
//! ### 2. Hessian Evaluation (`benchmark_hessian_evaluation`)
//! Evaluation throughput of pre-built Hessians, comparing raw and optimized trees, since
//! differentiation never simplifies and trees grow with every order.
//!
//! ### 3. Batch Evaluation (`benchmark_parallel_evaluation`)
//! Sequential against rayon-parallel gradient evaluation over a batch of points.
//!
//! ## Usage
//!
//! Run with: `cargo bench --bench differentiation`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use symdiff::prelude::*;

const EXPRESSIONS: [(&str, &str); 4] = [
    ("polynomial", "a^3 + b^2 - 2*a*b + 5"),
    ("rational", "(a^3 + 2*a^2 - 5*a + 1) / (b^2 + 3*b + 2)"),
    ("trigonometric", "sin(a)^2 * cos(b) + tan(a * b)"),
    (
        "nested",
        "exp(sin(a) * b) + ln(a^2 + b^2 + c^2) + arctan(a * b * c)",
    ),
];

fn point_for(expr: &Expression) -> Vec<f64> {
    (0..expr.sorted_variables().len())
        .map(|i| 0.3 + 0.2 * i as f64)
        .collect()
}

fn benchmark_hessian_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("Hessian Construction");

    for (name, expr) in EXPRESSIONS {
        group.bench_with_input(BenchmarkId::new("Expression", name), expr, |b, expr| {
            b.iter(|| black_box(Expression::new(expr.to_string())))
        });

        let functional = Expression::new(expr.to_string())
            .expect("Failed to parse expression")
            .functional()
            .clone();
        group.bench_with_input(BenchmarkId::new("Raw", name), &functional, |b, f| {
            b.iter(|| black_box(f.hessian()))
        });
    }

    group.finish();
}

fn benchmark_hessian_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Hessian Evaluation");

    for (name, expr) in EXPRESSIONS {
        let expression = Expression::new(expr.to_string()).expect("Failed to parse expression");
        let point = point_for(&expression);
        let raw = expression.functional().hessian();
        let optimized = expression.hessian_operator().clone();

        group.bench_with_input(BenchmarkId::new("Raw", name), &point, |b, point| {
            b.iter(|| black_box(raw.evaluate(point)))
        });
        group.bench_with_input(BenchmarkId::new("Optimized", name), &point, |b, point| {
            b.iter(|| black_box(optimized.evaluate(point)))
        });
    }

    group.finish();
}

fn benchmark_parallel_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Batch Evaluation");

    let expression = Expression::new(EXPRESSIONS[3].1.to_string()).expect("Failed to parse");
    let gradient = expression.gradient_operator().clone();

    for size in [100, 1_000, 10_000] {
        let points: Vec<Vec<f64>> = (0..size)
            .map(|i| {
                let t = i as f64 / size as f64;
                vec![0.1 + t, 0.5 - t, 1.0 + t]
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("Sequential", size), &points, |b, points| {
            b.iter(|| {
                let values: Result<Vec<_>, _> =
                    points.iter().map(|p| gradient.evaluate(p)).collect();
                black_box(values)
            })
        });
        group.bench_with_input(BenchmarkId::new("Parallel", size), &points, |b, points| {
            b.iter(|| black_box(gradient.evaluate_parallel(points)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_hessian_construction,
    benchmark_hessian_evaluation,
    benchmark_parallel_evaluation
);
criterion_main!(benches);
