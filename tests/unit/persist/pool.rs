use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;
use crate::persist::store::InMemoryStore;
use crate::render::raster::PremulImage;

fn img() -> Arc<CompositeImage> {
    Arc::new(PremulImage::transparent(1, 1))
}

/// Sleeps inside `persist` and tracks how many calls overlap.
#[derive(Default)]
struct SlowStore {
    active: AtomicUsize,
    peak: AtomicUsize,
    done: AtomicUsize,
}

impl ImageStore for SlowStore {
    fn persist(&self, _index: u32, _image: &CompositeImage) -> LayerstackResult<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(5));
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.done.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailOn(u32);

impl ImageStore for FailOn {
    fn persist(&self, index: u32, _image: &CompositeImage) -> LayerstackResult<()> {
        if index == self.0 {
            return Err(LayerstackError::persistence(format!("disk full at {index}")));
        }
        Ok(())
    }
}

struct Panics;

impl ImageStore for Panics {
    fn persist(&self, _index: u32, _image: &CompositeImage) -> LayerstackResult<()> {
        panic!("encoder exploded");
    }
}

#[test]
fn every_dispatch_completes_exactly_once() {
    let store = InMemoryStore::new();
    let completions = std::thread::scope(|scope| {
        let mut pool = PersistPool::start(
            scope,
            &store,
            PersistOpts {
                workers: 3,
                queue_capacity: 2,
            },
        )
        .unwrap();
        for i in 1..=10 {
            pool.dispatch(i, img()).unwrap();
        }
        let mut all = pool.poll();
        all.extend(pool.finish().unwrap());
        all
    });

    let mut indices: Vec<_> = completions.iter().map(|c| c.index).collect();
    indices.sort_unstable();
    assert_eq!(indices, (1..=10).collect::<Vec<_>>());
    assert!(completions.iter().all(|c| c.result.is_ok()));
    assert_eq!(store.indices(), (1..=10).collect::<Vec<_>>());
}

#[test]
fn finish_waits_for_slow_jobs() {
    let store = SlowStore::default();
    std::thread::scope(|scope| {
        let mut pool = PersistPool::start(
            scope,
            &store,
            PersistOpts {
                workers: 2,
                queue_capacity: 1,
            },
        )
        .unwrap();
        for i in 1..=6 {
            pool.dispatch(i, img()).unwrap();
        }
        pool.finish().unwrap();
        assert_eq!(store.done.load(Ordering::SeqCst), 6);
    });
}

#[test]
fn concurrency_never_exceeds_worker_count() {
    let store = SlowStore::default();
    std::thread::scope(|scope| {
        let mut pool = PersistPool::start(
            scope,
            &store,
            PersistOpts {
                workers: 2,
                queue_capacity: 8,
            },
        )
        .unwrap();
        for i in 1..=12 {
            pool.dispatch(i, img()).unwrap();
        }
        pool.finish().unwrap();
    });
    assert!(store.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(store.done.load(Ordering::SeqCst), 12);
}

#[test]
fn store_errors_come_back_as_completions() {
    let store = FailOn(2);
    let completions = std::thread::scope(|scope| {
        let mut pool = PersistPool::start(scope, &store, PersistOpts::default()).unwrap();
        for i in 1..=3 {
            pool.dispatch(i, img()).unwrap();
        }
        let mut all = pool.poll();
        all.extend(pool.finish().unwrap());
        all
    });

    assert_eq!(completions.len(), 3);
    let failed: Vec<_> = completions
        .iter()
        .filter(|c| c.result.is_err())
        .map(|c| c.index)
        .collect();
    assert_eq!(failed, vec![2]);
}

#[test]
fn panicking_store_is_reported_not_hung() {
    let store = Panics;
    let completions = std::thread::scope(|scope| {
        let mut pool = PersistPool::start(
            scope,
            &store,
            PersistOpts {
                workers: 1,
                queue_capacity: 1,
            },
        )
        .unwrap();
        pool.dispatch(1, img()).unwrap();
        pool.dispatch(2, img()).unwrap();
        pool.finish().unwrap()
    });

    assert_eq!(completions.len(), 2);
    for c in completions {
        let err = c.result.unwrap_err();
        assert!(err.to_string().contains("encoder exploded"), "{err}");
    }
}

#[test]
fn zero_workers_is_rejected() {
    let store = InMemoryStore::new();
    std::thread::scope(|scope| {
        let err = PersistPool::start(
            scope,
            &store,
            PersistOpts {
                workers: 0,
                queue_capacity: 1,
            },
        )
        .err()
        .unwrap();
        assert!(matches!(err, LayerstackError::Validation(_)));
    });
}
