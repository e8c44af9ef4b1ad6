//! Benchmarks for the request-shaping path around the model call.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use drug_interaction_api::analysis::{case_sections, extract_severity, interaction_sections};
use drug_interaction_api::prompt::{complex_prompt, simple_prompt};
use drug_interaction_api::samples::sample_queries;

const ANSWER: &str = "\
1. **Interaction severity:** High
2. Clinical mechanism: Aspirin inhibits platelet aggregation and adds to
warfarin's anticoagulant effect, raising bleeding risk.
3. Patient monitoring:
   1. INR within 3-5 days of starting aspirin
   2. Signs of GI bleeding
   3. Hemoglobin at follow-up
4. Alternatives: acetaminophen at the lowest effective dose.";

fn bench_prompts(c: &mut Criterion) {
    let samples = sample_queries();
    let simple = samples.simple_examples[0].clone();
    let complex = samples.complex_examples[0].query.clone();

    c.bench_function("simple_prompt", |b| {
        b.iter(|| black_box(simple_prompt(black_box(&simple))))
    });

    c.bench_function("complex_prompt", |b| {
        b.iter(|| black_box(complex_prompt(black_box(&complex))))
    });
}

fn bench_parsing(c: &mut Criterion) {
    c.bench_function("interaction_sections", |b| {
        b.iter(|| {
            let sections = interaction_sections(black_box(ANSWER));
            black_box(sections.severity.as_deref().and_then(extract_severity))
        })
    });

    c.bench_function("case_sections", |b| {
        b.iter(|| black_box(case_sections(black_box(ANSWER))))
    });
}

criterion_group!(benches, bench_prompts, bench_parsing);
criterion_main!(benches);
