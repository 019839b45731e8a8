//! Integration tests for link-walker
//!
//! Walks run against in-memory graphs, instrumented closures, and a
//! temporary directory tree.

use link_walker::config::WalkConfig;
use link_walker::error::{ExpandError, WalkerError};
use link_walker::expand::{from_fn, DirExpander, Expander, GraphExpander};
use link_walker::walker::{run, CancelReason, CancelToken, WalkCoordinator};
use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn visited_set(visited: &[String]) -> HashSet<String> {
    visited.iter().cloned().collect()
}

/// Tracks how many calls are inside the expander at once
#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[test]
fn test_diamond_visits_shared_child_once() {
    let graph = GraphExpander::parse("A: B C\nB: D\nC: D\n").unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let expander = {
        let calls = Arc::clone(&calls);
        from_fn(move |task, cancel| {
            calls.lock().unwrap().push(task.id.clone());
            graph.expand(task, cancel)
        })
    };

    let result = run("A", expander, 3, 2, None).unwrap();

    assert!(!result.cancelled);
    assert_eq!(result.visited.len(), 4);
    assert_eq!(
        visited_set(&result.visited),
        HashSet::from(["A", "B", "C", "D"].map(String::from))
    );

    // D expanded exactly once despite two parents
    let calls = calls.lock().unwrap();
    assert_eq!(calls.iter().filter(|id| id.as_str() == "D").count(), 1);
    assert_eq!(result.stats.duplicates, 1);
}

#[test]
fn test_self_loop_terminates() {
    let graph = GraphExpander::parse("A: A").unwrap();
    let result = run("A", graph, 10, 4, None).unwrap();

    assert!(!result.cancelled);
    assert_eq!(result.visited, vec!["A".to_string()]);
}

#[test]
fn test_cycle_terminates() {
    let graph = GraphExpander::parse("A: B\nB: C\nC: A\n").unwrap();
    let result = run("A", graph, 100, 3, None).unwrap();
    assert_eq!(result.visited.len(), 3);
}

#[test]
fn test_concurrency_one_never_overlaps() {
    let in_flight = Arc::new(InFlight::default());

    let expander = {
        let in_flight = Arc::clone(&in_flight);
        from_fn(move |task, _| {
            in_flight.enter();
            thread::sleep(Duration::from_millis(2));
            in_flight.exit();

            Ok(if task.depth == 0 {
                (0..10).map(|i| format!("child-{}", i)).collect()
            } else {
                Vec::new()
            })
        })
    };

    // More workers than slots: the gate, not the pool, is the limit
    let config = WalkConfig::new(1, 1).with_workers(4);
    let result = WalkCoordinator::new(config, expander)
        .unwrap()
        .run("root")
        .unwrap();

    assert_eq!(result.visited.len(), 11);
    assert_eq!(in_flight.peak.load(Ordering::SeqCst), 1);
    assert_eq!(result.stats.peak_concurrency, 1);
}

#[test]
fn test_concurrency_bound_respected() {
    let in_flight = Arc::new(InFlight::default());
    let graph = GraphExpander::tree(6, 3);

    let expander = {
        let in_flight = Arc::clone(&in_flight);
        from_fn(move |task, cancel| {
            in_flight.enter();
            thread::sleep(Duration::from_millis(1));
            in_flight.exit();
            graph.expand(task, cancel)
        })
    };

    let config = WalkConfig::new(3, 3).with_workers(8);
    let result = WalkCoordinator::new(config, expander)
        .unwrap()
        .run("r")
        .unwrap();

    assert_eq!(result.visited.len(), 1 + 6 + 36 + 216);
    assert!(in_flight.peak.load(Ordering::SeqCst) <= 3);
    assert!(result.stats.peak_concurrency <= 3);
}

#[test]
fn test_deadline_returns_partial_result() {
    // 1 + 8 + 64 + 512 + 4096 nodes, 5ms each, 4 at a time: far over budget
    let graph = GraphExpander::tree(8, 4).with_delay(Duration::from_millis(5));
    let full = graph.reachable("r", 4);
    let deadline = Duration::from_millis(150);

    let start = Instant::now();
    let result = run("r", graph, 4, 4, Some(deadline)).unwrap();
    let elapsed = start.elapsed();

    assert!(result.cancelled);
    assert_eq!(result.cancel_reason, Some(CancelReason::DeadlineElapsed));
    assert!(!result.visited.is_empty());
    assert!(result.visited.len() < full.len());
    assert!(visited_set(&result.visited).is_subset(&full));

    // Prompt return: deadline plus a small overshoot
    assert!(
        elapsed < deadline + Duration::from_millis(500),
        "took {:?}",
        elapsed
    );
}

#[test]
fn test_explicit_cancel_returns_promptly() {
    let graph = GraphExpander::tree(4, 6).with_delay(Duration::from_millis(10));
    let coordinator = WalkCoordinator::new(WalkConfig::new(6, 2), graph).unwrap();
    let cancel = coordinator.cancel_token();

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        cancel.cancel();
        cancel.cancel();
    });

    let start = Instant::now();
    let result = coordinator.run("r").unwrap();
    canceller.join().unwrap();

    assert!(result.cancelled);
    assert_eq!(result.cancel_reason, Some(CancelReason::Requested));
    assert!(!result.visited.is_empty());
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_no_task_beyond_max_depth_is_expanded() {
    let max_seen = Arc::new(AtomicUsize::new(0));
    let graph = GraphExpander::tree(3, 6);

    let expander = {
        let max_seen = Arc::clone(&max_seen);
        from_fn(move |task, cancel| {
            max_seen.fetch_max(task.depth as usize, Ordering::SeqCst);
            graph.expand(task, cancel)
        })
    };

    let result = run("r", expander, 2, 4, None).unwrap();

    assert_eq!(max_seen.load(Ordering::SeqCst), 2);
    assert_eq!(result.visited.len(), 1 + 3 + 9);
    assert_eq!(result.stats.skipped_depth, 27);
}

#[test]
fn test_failures_recorded_and_siblings_continue() {
    let expander = from_fn(|task, _| match task.id.as_str() {
        "root" => Ok((0..5).map(|i| format!("n{}", i)).collect()),
        "n2" => Err(ExpandError::Failed("503 Service Unavailable".into())),
        "n3" => panic!("parser bug"),
        "n4" => Ok(vec!["leaf".into(), "n2".into()]),
        _ => Ok(Vec::new()),
    });

    let result = run("root", expander, 3, 3, None).unwrap();

    assert!(!result.cancelled);
    assert_eq!(
        visited_set(&result.visited),
        HashSet::from(["root", "n0", "n1", "n4", "leaf"].map(String::from))
    );

    // Failed tasks stay claimed: n2 is not retried via n4
    let mut failed: Vec<_> = result.errors.iter().map(|e| e.id.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["n2", "n3"]);
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e.error, ExpandError::Panicked { .. })));
    assert_eq!(result.stats.failed, 2);
}

#[test]
fn test_exclude_patterns() {
    let graph = GraphExpander::parse("A: B skip-1 C\nB: skip-2 D\n").unwrap();
    let config = WalkConfig::new(5, 2).with_excludes(["^skip-"]).unwrap();

    let result = WalkCoordinator::new(config, graph).unwrap().run("A").unwrap();

    assert_eq!(
        visited_set(&result.visited),
        HashSet::from(["A", "B", "C", "D"].map(String::from))
    );
    assert_eq!(result.stats.excluded, 2);
}

#[test]
fn test_backpressure_with_small_queue() {
    // Each level is far wider than the queue; slow depth-1 expansions keep
    // it full while the coordinator is still feeding that level
    let graph = GraphExpander::tree(50, 2);
    let expander = from_fn(move |task, cancel| {
        if task.depth == 1 {
            thread::sleep(Duration::from_millis(1));
        }
        graph.expand(task, cancel)
    });
    let config = WalkConfig::new(2, 4).with_queue_size(8);

    let result = WalkCoordinator::new(config, expander).unwrap().run("r").unwrap();

    assert!(!result.cancelled);
    assert_eq!(result.visited.len(), 1 + 50 + 2500);
    assert!(result.stats.backpressure_events > 0);
}

#[test]
fn test_expander_observes_cancel() {
    let started = Arc::new(AtomicUsize::new(0));

    let expander = {
        let started = Arc::clone(&started);
        from_fn(move |task, cancel: &CancelToken| {
            started.fetch_add(1, Ordering::SeqCst);
            if task.depth == 0 {
                return Ok((0..4).map(|i| i.to_string()).collect());
            }
            // Long expansion that gives up when the token fires
            if cancel.sleep(Duration::from_secs(30)) {
                return Err(ExpandError::Cancelled);
            }
            Ok(Vec::new())
        })
    };

    let start = Instant::now();
    let result = run("root", expander, 1, 4, Some(Duration::from_millis(50))).unwrap();

    assert!(result.cancelled);
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(result.visited, vec!["root".to_string()]);
    // Cancelled expansions are not errors
    assert!(result.errors.is_empty());
}

#[test]
fn test_invalid_configuration() {
    let graph = GraphExpander::new();
    assert!(matches!(run("A", graph.clone(), 3, 0, None), Err(WalkerError::Config(_))));
    assert!(matches!(
        run("A", graph, 3, 2, Some(Duration::ZERO)),
        Err(WalkerError::Config(_))
    ));
}

#[test]
fn test_filesystem_walk() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    for sub in ["a/b/c/d", "a/x", "e"] {
        fs::create_dir_all(root.join(sub)).unwrap();
    }
    fs::write(root.join("a/file.txt"), b"hello").unwrap();

    let start = root.to_string_lossy().into_owned();
    let result = run(start.clone(), DirExpander::new(), 2, 4, None).unwrap();

    let expected: HashSet<String> = [
        start.clone(),
        root.join("a").to_string_lossy().into_owned(),
        root.join("e").to_string_lossy().into_owned(),
        root.join("a/b").to_string_lossy().into_owned(),
        root.join("a/x").to_string_lossy().into_owned(),
    ]
    .into_iter()
    .collect();

    assert_eq!(visited_set(&result.visited), expected);
    assert!(result.errors.is_empty());
}

#[test]
fn test_filesystem_with_files() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub/one.txt"), b"1").unwrap();
    fs::write(dir.path().join("two.txt"), b"2").unwrap();

    let start = dir.path().to_string_lossy().into_owned();
    let result = run(start, DirExpander::new().include_files(true), 5, 2, None).unwrap();

    assert_eq!(result.visited.len(), 4);
}

#[test]
fn test_missing_start_directory_is_task_error() {
    let dir = tempdir().unwrap();
    let start = dir.path().join("missing").to_string_lossy().into_owned();

    let result = run(start, DirExpander::new(), 3, 2, None).unwrap();
    assert!(result.visited.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(result.errors[0].error, ExpandError::NotFound { .. }));
}

#[test]
fn test_concurrent_cancel_and_reads() {
    let token = CancelToken::new();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let token = token.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    if i % 2 == 0 {
                        token.cancel();
                    } else {
                        let _ = token.is_cancelled();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(token.is_cancelled());
    assert_eq!(token.reason(), Some(CancelReason::Requested));
}

#[test]
fn test_unequal_paths_reach_full_depth() {
    // Z is at depth 2 via B and depth 3 via X -> W; B is slow
    let graph = GraphExpander::parse("A: B X\nB: Z\nX: W\nW: Z\nZ: Q\n").unwrap();
    let expected = graph.reachable("A", 3);
    assert!(expected.contains("Q"));

    let expander = from_fn(move |task, cancel| {
        if task.id == "B" {
            cancel.sleep(Duration::from_millis(200));
        }
        graph.expand(task, cancel)
    });

    let result = run("A", expander, 3, 4, None).unwrap();

    assert!(!result.cancelled);
    assert_eq!(visited_set(&result.visited), expected);
}

#[test]
fn test_dag_visited_set_independent_of_timing() {
    // Many shortcuts of different lengths into the same nodes
    let text = "s: a b c\na: d\nb: e\nc: f\nd: g\ne: g h\nf: h i\ng: j\nh: j k\ni: k\nj: l\nk: l\n";
    let graph = GraphExpander::parse(text).unwrap();

    for max_depth in 0..6 {
        let expected = graph.reachable("s", max_depth);
        for concurrency in [1, 3, 8] {
            let graph = graph.clone();
            let expander = from_fn(move |task, cancel| {
                // Later siblings finish first
                let delay = task.id.bytes().next().map_or(0, |b| (b'z' - b) as u64 % 4);
                thread::sleep(Duration::from_millis(delay));
                graph.expand(task, cancel)
            });
            let result = run("s", expander, max_depth, concurrency, None).unwrap();
            assert_eq!(
                visited_set(&result.visited),
                expected,
                "depth {} concurrency {}",
                max_depth,
                concurrency
            );
        }
    }
}

#[test]
fn test_results_consistent_across_runs() {
    let graph = GraphExpander::tree(5, 3);
    let expected = graph.reachable("r", 3);

    for concurrency in [1, 2, 8, 32] {
        let result = run("r", graph.clone(), 3, concurrency, None).unwrap();
        assert_eq!(visited_set(&result.visited), expected);
        assert_eq!(result.visited.len(), expected.len());
    }
}
