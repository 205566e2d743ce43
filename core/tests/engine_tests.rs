use shelf_core::index::InvertedIndex;
use shelf_core::{Corpus, Document, EngineConfig, EngineError, SearchEngine};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn doc(pid: &str, title: &str, description: &str) -> Document {
    Document::new(pid).with_title(title).with_description(description)
}

fn shoes_corpus() -> Corpus {
    [
        doc("A", "Red Running Shoes", "Comfortable red shoes for running"),
        doc("B", "Blue Sneakers", "Stylish blue sneakers"),
        doc("C", "Red Shoes Deluxe", "Premium red shoes"),
    ]
    .into_iter()
    .map(|d| (d.pid.clone(), d))
    .collect()
}

#[test]
fn red_shoes_scenario() {
    let corpus = shoes_corpus();
    let index = InvertedIndex::build(&corpus).unwrap();
    assert_eq!(index.doc_len("A"), Some(8));
    assert_eq!(index.doc_len("B"), Some(5));
    assert_eq!(index.doc_len("C"), Some(6));
    assert!((index.avg_doc_len() - 19.0 / 3.0).abs() < 1e-12);
    assert_eq!(index.df("red"), 2);
    assert_eq!(index.df("shoes"), 2);
    assert!((index.idf("red").unwrap() - 1.6f64.ln()).abs() < 1e-12);

    let engine = SearchEngine::default();
    let results = engine.search("red shoes", "sid", &corpus).unwrap();
    let pids: Vec<&str> = results.iter().map(|r| r.pid.as_str()).collect();
    assert_eq!(pids, vec!["C", "A"]);
    assert!((results[0].ranking - 1.366).abs() < 1e-3, "{}", results[0].ranking);
    assert!((results[1].ranking - 1.238).abs() < 1e-3, "{}", results[1].ranking);
    assert_eq!(results[0].title, "Red Shoes Deluxe");
    assert_eq!(results[0].url, "doc_details?pid=C&search_id=sid");
}

#[test]
fn any_indexed_term_yields_results() {
    let corpus = shoes_corpus();
    let engine = SearchEngine::default();
    for term in ["comfortable", "stylish", "premium", "SNEAKERS", "deluxe"] {
        assert!(!engine.search(term, "", &corpus).unwrap().is_empty(), "{term}");
    }
}

#[test]
fn results_are_sorted_non_increasing() {
    let corpus = shoes_corpus();
    let engine = SearchEngine::default();
    let results = engine.search("red blue shoes sneakers running", "", &corpus).unwrap();
    assert_eq!(results.len(), 3);
    for pair in results.windows(2) {
        assert!(pair[0].ranking >= pair[1].ranking);
    }
}

#[test]
fn rebuilding_an_unchanged_corpus_gives_identical_scores() {
    let corpus = shoes_corpus();
    let engine = SearchEngine::default();
    let before = engine.search("red shoes", "s", &corpus).unwrap();
    engine.rebuild(&corpus).unwrap();
    let after = engine.search("red shoes", "s", &corpus).unwrap();
    assert_eq!(before, after);
    assert_eq!(engine.build_count(), 2);
}

#[test]
fn empty_corpus_returns_nothing() {
    let engine = SearchEngine::default();
    assert!(engine.search("red", "", &Corpus::new()).unwrap().is_empty());
    assert_eq!(engine.stats().unwrap().index.avg_doc_len, 0.0);
}

#[test]
fn pass_through_attributes_reach_results() {
    let mut corpus = shoes_corpus();
    let a = corpus.get_mut("A").unwrap();
    a.selling_price = Some("921".into());
    a.average_rating = Some("3.9".into());
    a.url = Some("https://shop.example/p/A".into());
    a.images = vec!["a.jpg".into()];

    let engine = SearchEngine::default();
    let results = engine.search("running", "", &corpus).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].selling_price.as_deref(), Some("921"));
    assert_eq!(results[0].average_rating.as_deref(), Some("3.9"));
    assert_eq!(results[0].source_url.as_deref(), Some("https://shop.example/p/A"));
    assert_eq!(results[0].images, vec!["a.jpg"]);
}

#[test]
fn concurrent_first_searches_build_once() {
    let corpus = Arc::new(shoes_corpus());
    let engine = Arc::new(SearchEngine::default());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let (corpus, engine, barrier) = (corpus.clone(), engine.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                engine.search("red shoes", "", &corpus).unwrap().len()
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), 2);
    }
    assert_eq!(engine.build_count(), 1);
}

#[test]
fn build_errors_surface_to_the_caller() {
    let mut corpus = shoes_corpus();
    corpus.insert("D".into(), doc("E", "mismatched", ""));
    let engine = SearchEngine::default();
    let err = engine.search("red", "", &corpus).unwrap_err();
    assert_eq!(err, EngineError::PidMismatch { key: "D".into(), pid: "E".into() });
    assert!(!engine.is_built());
}

#[test]
fn generous_deadline_builds() {
    let config = EngineConfig { build_deadline: Some(Duration::from_secs(60)), ..EngineConfig::default() };
    let engine = SearchEngine::new(config);
    assert_eq!(engine.search("red", "", &shoes_corpus()).unwrap().len(), 2);
}

#[test]
fn timed_out_build_publishes_nothing() {
    let config = EngineConfig { build_deadline: Some(Duration::ZERO), ..EngineConfig::default() };
    let engine = SearchEngine::new(config);
    let err = engine.search("red", "", &shoes_corpus()).unwrap_err();
    assert!(matches!(err, EngineError::BuildTimeout { deadline, .. } if deadline == Duration::ZERO));
    assert!(!engine.is_built());
    assert!(engine.stats().is_none());
    assert_eq!(engine.build_count(), 0);
}

#[test]
fn searches_keep_the_old_index_during_a_rebuild() {
    let small = shoes_corpus();
    let mut large = small.clone();
    for i in 0..50_000 {
        let pid = format!("X{i:06}");
        large.insert(pid.clone(), doc(&pid, "filler product", "plain cotton item for everyday use"));
    }

    let engine = Arc::new(SearchEngine::default());
    assert_eq!(engine.search("red shoes", "", &small).unwrap().len(), 2);

    let rebuilder = {
        let engine = engine.clone();
        thread::spawn(move || engine.rebuild(&large).unwrap())
    };
    // the previous snapshot stays published until the swap
    while !rebuilder.is_finished() {
        assert!(engine.is_built());
        assert_eq!(engine.search("red shoes", "", &small).unwrap().len(), 2);
    }
    let stats = rebuilder.join().unwrap();
    assert_eq!(stats.index.num_docs, 50_003);
    assert_eq!(engine.stats().unwrap().index.num_docs, 50_003);
}
