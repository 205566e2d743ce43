use criterion::{criterion_group, criterion_main, Criterion};
use shelf_core::tokenizer::tokenize;
use shelf_core::{Corpus, Document, SearchEngine};

const WORDS: &[&str] = &[
    "red", "blue", "green", "cotton", "slim", "fit", "shirt", "shoes", "running", "men", "women", "casual",
    "printed", "solid", "round", "neck", "t", "pack", "of", "2", "jeans", "denim", "stretch", "regular",
];

fn corpus(n: usize) -> Corpus {
    (0..n)
        .map(|i| {
            let title: Vec<&str> = (0..6).map(|j| WORDS[(i * 7 + j * 3) % WORDS.len()]).collect();
            let desc: Vec<&str> = (0..20).map(|j| WORDS[(i * 13 + j * 5) % WORDS.len()]).collect();
            let pid = format!("P{i:06}");
            (pid.clone(), Document::new(pid).with_title(title.join(" ")).with_description(desc.join(" ")))
        })
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    let text = "Men's Slim Fit Cotton Shirt, Pack of 2 (Blue/White) - Casual wear for every day";
    c.bench_function("tokenize_title", |b| b.iter(|| tokenize(text)));
}

fn bench_search(c: &mut Criterion) {
    let corpus = corpus(10_000);
    let engine = SearchEngine::default();
    engine.search("warm up", "", &corpus).unwrap();
    c.bench_function("search_10k", |b| b.iter(|| engine.search("red cotton shirt", "bench", &corpus).unwrap()));
}

criterion_group!(benches, bench_tokenize, bench_search);
criterion_main!(benches);
