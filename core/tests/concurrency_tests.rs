use std::collections::HashSet;
use std::thread;

use search_core::SearchService;
use tempfile::tempdir;

fn corpus(seed: i32, n: i32) -> Vec<(i32, String)> {
    (0..n)
        .map(|i| {
            let id = seed + i;
            let text = format!(
                "document {id} talks about topic{} and topic{} with shared filler words",
                id % 5,
                id % 3
            );
            (id, text)
        })
        .collect()
}

fn fill(s: &SearchService, docs: &[(i32, String)]) {
    for (id, text) in docs {
        s.add_document(*id, text);
    }
}

#[test]
fn parallel_searches_match_the_serial_results() {
    let s = SearchService::new();
    fill(&s, &corpus(0, 60));

    let queries = ["topic1", "shared filler", "topic0 OR topic2", "words -topic4"];
    let expected: Vec<Vec<(i32, f64)>> = queries.iter().map(|q| s.search_scored(q)).collect();

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..25 {
                    for (q, want) in queries.iter().zip(expected.iter()) {
                        assert_eq!(&s.search_scored(q), want, "query {q:?}");
                    }
                }
            });
        }
    });
}

#[test]
fn concurrent_writes_and_reads_stay_well_formed() {
    let s = SearchService::new();
    fill(&s, &corpus(0, 40));

    thread::scope(|scope| {
        scope.spawn(|| {
            for (id, text) in corpus(40, 60) {
                s.add_document(id, &text);
            }
        });
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let hits = s.search_scored("shared words");
                    let mut seen = HashSet::new();
                    for window in hits.windows(2) {
                        // Ordering discipline holds in every snapshot.
                        assert!(
                            window[0].1 > window[1].1
                                || (window[0].1 == window[1].1 && window[0].0 < window[1].0)
                        );
                    }
                    for (id, score) in &hits {
                        assert!((0..100).contains(id));
                        assert!(score.is_finite() && *score >= 0.0);
                        assert!(seen.insert(*id), "duplicate docId {id}");
                    }
                }
            });
        }
    });

    // After the writer finishes every search sees the full corpus.
    assert_eq!(s.search_scored("shared words").len(), 100);
}

#[test]
fn hot_reload_serves_one_complete_snapshot_or_the_other() {
    let dir_a = tempdir().unwrap();
    let dir_b = tempdir().unwrap();

    let builder = SearchService::new();
    fill(&builder, &corpus(0, 30));
    builder.save(dir_a.path()).unwrap();

    let builder = SearchService::new();
    fill(&builder, &corpus(100, 50));
    builder.save(dir_b.path()).unwrap();

    let serve_a = SearchService::new();
    serve_a.load(dir_a.path()).unwrap();
    let expect_a = serve_a.search_scored("shared words");
    let serve_b = SearchService::new();
    serve_b.load(dir_b.path()).unwrap();
    let expect_b = serve_b.search_scored("shared words");
    assert_ne!(expect_a, expect_b);

    let live = SearchService::new();
    live.load(dir_a.path()).unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..10 {
                live.load(dir_b.path()).unwrap();
                live.load(dir_a.path()).unwrap();
            }
        });
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..100 {
                    let got = live.search_scored("shared words");
                    // Never a mixture of the two images.
                    assert!(got == expect_a || got == expect_b);
                }
            });
        }
    });
}
