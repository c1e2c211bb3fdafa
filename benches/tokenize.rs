use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tinytok::tokenizer::{GreedyTokenizer, OptimalTokenizer};
use tinytok::vocabulary::{build_hex_token_set, TokenSet};
use tinytok::SuffixScanner;

const WORDS: &[&str] = &[
    "the ", "and ", "ing", "ion", "to ", "of ", "a ", "in ", "that ", "er", "re", "on", "at",
    "en", "es", "or", "te", "ed", " s", "ar", "al", " w", "st", "nt", "he", "th", "an",
];

fn build_corpus() -> Vec<u8> {
    let mut corpus = Vec::new();
    while corpus.len() < 1 << 16 {
        corpus.extend_from_slice(b"the quick brown fox jumps over the lazy dog\n");
        corpus.extend_from_slice(b"and that is the way the story goes, over and over again\n");
        corpus.extend_from_slice(b"a stitch in time saves nine, or so the saying went\n");
    }
    corpus
}

fn build_token_set() -> TokenSet {
    let mut token_set = build_hex_token_set();
    for word in WORDS {
        token_set.add_string(word.as_bytes());
    }
    for byte in b'g'..=b'z' {
        token_set.add_byte(byte, false);
    }
    token_set.add_byte(b' ', false);
    token_set.add_byte(b'\n', false);
    token_set
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut c = c.benchmark_group("Tokenize");
    c.measurement_time(Duration::from_secs(10)).sample_size(100);
    let corpus = build_corpus();
    let mut token_set = build_token_set();
    let tokenizer = OptimalTokenizer::new(&mut token_set);
    c.bench_function("optimal 64KiB english", |b| {
        b.iter(|| {
            tokenizer
                .tokenize(black_box(corpus.as_slice()).iter().copied())
                .count()
        })
    });
    let greedy = GreedyTokenizer::new(tokenizer.token_set());
    c.bench_function("greedy 64KiB english", |b| {
        b.iter(|| greedy.tokenize(black_box(corpus.as_slice())).count())
    });
    let scanner = SuffixScanner::new(tokenizer.token_set());
    c.bench_function("scan 64KiB english", |b| {
        b.iter(|| {
            scanner
                .scan(black_box(corpus.as_slice()).iter().copied())
                .count()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
