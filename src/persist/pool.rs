use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::{Scope, ScopedJoinHandle};

use crate::foundation::error::{LayerstackError, LayerstackResult, panic_message};
use crate::persist::store::ImageStore;
use crate::render::raster::CompositeImage;

/// Sizing of the persistence pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PersistOpts {
    /// Number of worker threads encoding and writing composites.
    pub workers: usize,
    /// Bounded queue capacity between the control thread and the workers.
    pub queue_capacity: usize,
}

impl Default for PersistOpts {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 8,
        }
    }
}

/// Completion signal for one dispatched unit, sent exactly once per job.
#[derive(Debug)]
pub struct Completion {
    /// Unit index the job was dispatched with.
    pub index: u32,
    /// Outcome of `ImageStore::persist`. Panics are reported as persistence errors.
    pub result: LayerstackResult<()>,
}

struct SaveJob {
    index: u32,
    image: Arc<CompositeImage>,
}

/// Fixed-size pool of scoped worker threads persisting composites.
///
/// Jobs flow through a bounded channel, so the control thread blocks once `queue_capacity`
/// composites are waiting. Completions come back on a separate channel; [`PersistPool::finish`]
/// is the barrier that waits for every dispatched job.
pub struct PersistPool<'scope> {
    jobs: Option<mpsc::SyncSender<SaveJob>>,
    done: mpsc::Receiver<Completion>,
    workers: Vec<ScopedJoinHandle<'scope, ()>>,
    dispatched: u64,
    completed: u64,
}

impl<'scope> PersistPool<'scope> {
    /// Spawn `opts.workers` threads inside `scope`, all writing to `store`.
    pub fn start<'env>(
        scope: &'scope Scope<'scope, 'env>,
        store: &'env dyn ImageStore,
        opts: PersistOpts,
    ) -> LayerstackResult<Self> {
        if opts.workers == 0 {
            return Err(LayerstackError::validation(
                "persistence 'workers' must be >= 1",
            ));
        }

        let (jobs_tx, jobs_rx) = mpsc::sync_channel::<SaveJob>(opts.queue_capacity.max(1));
        let (done_tx, done_rx) = mpsc::channel::<Completion>();
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));

        let mut workers = Vec::with_capacity(opts.workers);
        for n in 0..opts.workers {
            let jobs_rx = Arc::clone(&jobs_rx);
            let done_tx = done_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("layerstack-persist-{n}"))
                .spawn_scoped(scope, move || worker_loop(store, &jobs_rx, &done_tx))
                .map_err(|e| {
                    LayerstackError::internal(format!("failed to spawn persistence worker: {e}"))
                })?;
            workers.push(handle);
        }

        Ok(Self {
            jobs: Some(jobs_tx),
            done: done_rx,
            workers,
            dispatched: 0,
            completed: 0,
        })
    }

    /// Queue one composite. Blocks while the queue is full.
    pub fn dispatch(&mut self, index: u32, image: Arc<CompositeImage>) -> LayerstackResult<()> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| LayerstackError::internal("persistence pool already closed"))?;
        jobs.send(SaveJob { index, image }).map_err(|_| {
            LayerstackError::internal("persistence workers are not accepting jobs")
        })?;
        self.dispatched += 1;
        Ok(())
    }

    /// Collect completions that are already available, without blocking.
    pub fn poll(&mut self) -> Vec<Completion> {
        let mut out = Vec::new();
        while let Ok(c) = self.done.try_recv() {
            self.completed += 1;
            out.push(c);
        }
        out
    }

    /// Jobs dispatched but not yet reported complete.
    pub fn in_flight(&self) -> u64 {
        self.dispatched - self.completed
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Close the queue, wait for every outstanding completion, then join the workers.
    ///
    /// Returns the completions not already handed out by [`PersistPool::poll`].
    pub fn finish(mut self) -> LayerstackResult<Vec<Completion>> {
        self.jobs = None;

        let mut out = Vec::new();
        while self.completed < self.dispatched {
            let c = self.done.recv().map_err(|_| {
                LayerstackError::internal(format!(
                    "persistence workers exited with {} jobs outstanding",
                    self.dispatched - self.completed
                ))
            })?;
            self.completed += 1;
            out.push(c);
        }

        for handle in self.workers.drain(..) {
            handle
                .join()
                .map_err(|_| LayerstackError::internal("persistence worker panicked"))?;
        }
        Ok(out)
    }
}

fn worker_loop(
    store: &dyn ImageStore,
    jobs: &Mutex<mpsc::Receiver<SaveJob>>,
    done: &mpsc::Sender<Completion>,
) {
    loop {
        let job = match jobs.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => return,
        };
        // Queue closed and drained.
        let Ok(job) = job else { return };

        let result = catch_unwind(AssertUnwindSafe(|| store.persist(job.index, &job.image)))
            .unwrap_or_else(|panic| {
                Err(LayerstackError::persistence(format!(
                    "persisting unit {} panicked: {}",
                    job.index,
                    panic_message(&*panic)
                )))
            });

        if done
            .send(Completion {
                index: job.index,
                result,
            })
            .is_err()
        {
            return;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/persist/pool.rs"]
mod tests;
