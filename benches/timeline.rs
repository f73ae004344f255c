use criterion::{black_box, criterion_group, criterion_main, Criterion};

use shorts_tts::config::TimingPolicy;
use shorts_tts::subtitle::build_cues;
use shorts_tts::tts::{split_text, SynthesisResult, Timeline};

fn sample_text() -> String {
    "The quick brown fox jumps over the lazy dog. Is it fast? It is!\n".repeat(200)
}

fn sample_chunks(count: usize, words_per_chunk: usize) -> Vec<SynthesisResult> {
    (0..count)
        .map(|_| {
            let words = (0..words_per_chunk).map(|i| format!("word{}", i)).collect();
            let times = (0..words_per_chunk).map(|i| i as f64 * 320.0).collect();
            let durations = (0..words_per_chunk)
                .map(|i| if i % 7 == 0 { 0.0 } else { 280.0 })
                .collect();
            SynthesisResult::new(words, times, durations, Vec::new()).unwrap()
        })
        .collect()
}

fn bench_split_text(c: &mut Criterion) {
    let text = sample_text();
    c.bench_function("split_text 13k chars", |b| {
        b.iter(|| split_text(black_box(&text), 450).unwrap())
    });
}

fn bench_stitch_and_cues(c: &mut Criterion) {
    let policy = TimingPolicy::default();
    let chunks = sample_chunks(30, 80);

    c.bench_function("stitch 30 chunks", |b| {
        b.iter(|| {
            let mut timeline = Timeline::new();
            for chunk in &chunks {
                timeline.append(black_box(chunk), &policy);
            }
            timeline
        })
    });

    let mut timeline = Timeline::new();
    for chunk in &chunks {
        timeline.append(chunk, &policy);
    }
    c.bench_function("build_cues 2400 words", |b| {
        b.iter(|| build_cues(black_box(&timeline), &policy))
    });
}

criterion_group!(benches, bench_split_text, bench_stitch_and_cues);
criterion_main!(benches);
