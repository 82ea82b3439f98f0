//! Benchmarks for manifest conversion, batch processing and validation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use partkit_core::EngineConfig;
use partkit_core::ProcessOperation;
use partkit_core::Rule;
use partkit_core::RulesConfig;
use partkit_core::ValidateOptions;
use partkit_core::process_archive;
use partkit_core::rewrap_manifest;
use partkit_core::rules::Expectation;
use partkit_core::test_utils::PackageBuilder;
use partkit_core::test_utils::SLIDE_XML;
use partkit_core::test_utils::THEME_XML;
use partkit_core::unwrap_archive;
use partkit_core::validate_manifest;
use std::hint::black_box;

/// Creates a presentation with `slide_count` slides and one theme.
fn create_deck(slide_count: usize) -> Vec<u8> {
    (1..=slide_count)
        .fold(
            PackageBuilder::new().xml("ppt/theme/theme1.xml", THEME_XML),
            |builder, i| builder.xml(&format!("ppt/slides/slide{i}.xml"), SLIDE_XML),
        )
        .build()
}

fn benchmark_unwrap(c: &mut Criterion) {
    let mut group = c.benchmark_group("unwrap");
    let config = EngineConfig::default();

    for slides in [10, 100, 1000] {
        let deck = create_deck(slides);
        group.throughput(Throughput::Bytes(deck.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(slides), &deck, |b, data| {
            b.iter(|| unwrap_archive(black_box(data), &config).unwrap());
        });
    }

    group.finish();
}

fn benchmark_rewrap(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrap");

    for level in [0u8, 6, 9] {
        let config = EngineConfig::default().with_compression_level(level);
        let manifest = unwrap_archive(&create_deck(100), &config).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(level), &manifest, |b, m| {
            b.iter(|| rewrap_manifest(black_box(m), None, &config).unwrap());
        });
    }

    group.finish();
}

fn benchmark_process(c: &mut Criterion) {
    let deck = create_deck(100);
    let config = EngineConfig::default();
    let ops = vec![
        ProcessOperation::replace_text("Hello", "Goodbye"),
        ProcessOperation::rename("ppt/slides/slide1.xml", "ppt/slides/intro.xml"),
    ];

    c.bench_function("process_100_slides", |b| {
        b.iter(|| process_archive(black_box(&deck), &ops, &config).unwrap());
    });
}

fn benchmark_validate(c: &mut Criterion) {
    let manifest = unwrap_archive(&create_deck(100), &EngineConfig::default()).unwrap();
    let rules = RulesConfig::new(vec![
        Rule::new(
            "accent1",
            "ppt/theme/theme1.xml",
            "//a:accent1/a:srgbClr/@val",
            Expectation::Hex("#2277CC".into()),
        ),
        Rule::new(
            "slide-text",
            "ppt/slides/*.xml",
            "//a:t/text()",
            Expectation::Regex {
                pattern: "^Hello".into(),
                flags: None,
            },
        ),
    ]);

    c.bench_function("validate_100_slides", |b| {
        b.iter(|| {
            let mut m = manifest.clone();
            validate_manifest(&mut m, &rules, &ValidateOptions::default()).unwrap()
        });
    });
}

criterion_group!(
    benches,
    benchmark_unwrap,
    benchmark_rewrap,
    benchmark_process,
    benchmark_validate
);
criterion_main!(benches);
