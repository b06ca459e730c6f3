// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use classvdf::class_group::{Discriminant, QuadraticForm, Reducer};
use classvdf::vdf::wesolowski::{prove_final, verify_final_with_discriminant};
use criterion::{criterion_group, criterion_main, Criterion};

fn evaluate(input: &QuadraticForm, iterations: u64, reducer: &mut Reducer) -> QuadraticForm {
    let mut output = input.clone();
    for _ in 0..iterations {
        output = output.square(reducer);
    }
    output
}

fn prove(c: &mut Criterion) {
    let mut group = c.benchmark_group("Prove");
    for bits in [512u64, 1024] {
        let iterations = 1000u64;
        let discriminant = Discriminant::generate(bits, b"vdf benchmark seed").unwrap();
        let input = QuadraticForm::generator(&discriminant).unwrap();
        let mut reducer = Reducer::new();
        let output = evaluate(&input, iterations, &mut reducer);
        group.bench_function(format!("{} bits/{} iterations", bits, iterations), |b| {
            b.iter(|| prove_final(&input, &output, iterations, &discriminant, 0).unwrap())
        });
    }
}

fn verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("Verify");
    for bits in [512u64, 1024] {
        let iterations = 1000u64;
        let discriminant = Discriminant::generate(bits, b"vdf benchmark seed").unwrap();
        let input = QuadraticForm::generator(&discriminant).unwrap();
        let mut reducer = Reducer::new();
        let output = evaluate(&input, iterations, &mut reducer);
        let proof = prove_final(&input, &output, iterations, &discriminant, 0).unwrap();
        group.bench_function(format!("{} bits/{} iterations", bits, iterations), |b| {
            b.iter(|| {
                verify_final_with_discriminant(&discriminant, Some(&input), &proof, iterations, 0)
                    .unwrap()
            })
        });
    }
}

criterion_group! {
name = vdf_benchmarks;
config = Criterion::default().sample_size(10);
targets = prove, verify,
}

criterion_main!(vdf_benchmarks);
