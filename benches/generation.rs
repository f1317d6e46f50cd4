use adl_gen::{Generator, Grammar, Pipeline, DEFAULT_MAX_DEPTH};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn generation_benchmark(c: &mut Criterion) {
    let generator = Generator::adl();
    let mut group = c.benchmark_group("generate");

    for depth in [1, 5, DEFAULT_MAX_DEPTH] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let mut rng = StdRng::seed_from_u64(42);
            b.iter(|| generator.generate(&mut rng, black_box(depth)));
        });
    }
    group.finish();
}

fn grammar_parse_benchmark(c: &mut Criterion) {
    c.bench_function("parse_grammar", |b| {
        b.iter(|| Grammar::parse(black_box(adl_gen::grammar::ADL_GRAMMAR)))
    });
}

fn pipeline_benchmark(c: &mut Criterion) {
    let generator = Generator::adl();
    let samples: Vec<String> = (0..32)
        .filter_map(|seed| generator.generate_seeded(seed, DEFAULT_MAX_DEPTH))
        .collect();
    let pipeline = Pipeline::new();

    c.bench_function("compile_generated", |b| {
        b.iter(|| {
            for text in &samples {
                let _ = black_box(pipeline.compile(text));
            }
        })
    });
}

criterion_group!(
    benches,
    generation_benchmark,
    grammar_parse_benchmark,
    pipeline_benchmark
);
criterion_main!(benches);
