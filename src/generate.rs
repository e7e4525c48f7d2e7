//! The driver loop: select, dedup, composite, dispatch, and wait for persistence.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::dedup::{CacheOutcome, DedupCache};
use crate::cache::key::CompositionKey;
use crate::config::{FailurePolicy, GenerateConfig, prepare_output_dir};
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::layers::assemble::select_layers;
use crate::layers::selector::{RandomSelector, Selector};
use crate::layers::source::LayerSource;
use crate::persist::pool::{Completion, PersistOpts, PersistPool};
use crate::persist::store::{ImageStore, PngDirStore};
use crate::render::compose::compose;
use crate::render::raster::CompositeImage;

/// Per-run options of a [`GenerateSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerateOpts {
    /// Units to attempt; indices run `1..=count`.
    pub count: u32,
    pub persist: PersistOpts,
    pub failure_policy: FailurePolicy,
}

impl Default for GenerateOpts {
    fn default() -> Self {
        Self {
            count: 1,
            persist: PersistOpts::default(),
            failure_policy: FailurePolicy::Abort,
        }
    }
}

/// A unit skipped because its combination was already produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateNotice {
    /// Index of the skipped unit.
    pub index: u32,
    /// The repeated combination.
    pub key: CompositionKey,
}

/// A unit that failed under [`FailurePolicy::Continue`].
#[derive(Debug)]
pub struct UnitFailure {
    pub index: u32,
    pub error: LayerstackError,
}

/// Outcome of a completed batch.
#[derive(Debug, Default)]
pub struct GenerateReport {
    /// Units requested.
    pub requested: u32,
    /// Composition engine invocations (one per distinct combination).
    pub rendered: u64,
    /// Units skipped as repeats, in unit order.
    pub duplicates: Vec<DuplicateNotice>,
    /// Indices of units written by the store, sorted.
    pub persisted: Vec<u32>,
    /// Units lost under [`FailurePolicy::Continue`], in the order they were observed.
    ///
    /// Repeats of a combination whose write failed land here too, never in `duplicates`.
    pub failures: Vec<UnitFailure>,
}

/// Bookkeeping for composites handed to the persistence pool.
#[derive(Debug, Default)]
struct Dispatched {
    /// Key of every dispatched unit still awaiting completion.
    in_flight: HashMap<u32, CompositionKey>,
    /// Combinations whose write failed, with the unit that carried them.
    unwritten: HashMap<CompositionKey, u32>,
}

impl Dispatched {
    /// Error for a repeat of a combination that was never written, if `key` is one.
    fn repeat_of_unwritten(&self, key: &CompositionKey) -> Option<LayerstackError> {
        self.unwritten
            .get(key)
            .map(|&first| unwritten_repeat(key, first))
    }
}

fn unwritten_repeat(key: &CompositionKey, failed_unit: u32) -> LayerstackError {
    LayerstackError::persistence(format!(
        "combination {key} was not written (unit {failed_unit} failed)"
    ))
}

impl GenerateReport {
    fn record_completion(
        &mut self,
        completion: Completion,
        dispatched: &mut Dispatched,
        policy: FailurePolicy,
    ) -> LayerstackResult<()> {
        let key = dispatched.in_flight.remove(&completion.index);
        match completion.result {
            Ok(()) => {
                self.persisted.push(completion.index);
                Ok(())
            }
            Err(e) => {
                self.record_unit_error(completion.index, e, policy)?;
                if let Some(key) = key {
                    self.reclassify_repeats(&key, completion.index);
                    dispatched.unwritten.insert(key, completion.index);
                }
                Ok(())
            }
        }
    }

    /// Turn duplicate notices of a combination whose write failed into unit failures.
    fn reclassify_repeats(&mut self, key: &CompositionKey, failed_unit: u32) {
        let (lost, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.duplicates)
            .into_iter()
            .partition(|notice| notice.key == *key);
        self.duplicates = kept;
        for notice in lost {
            tracing::warn!(unit = notice.index, "repeat of unwritten combination {key}");
            self.failures.push(UnitFailure {
                index: notice.index,
                error: unwritten_repeat(key, failed_unit),
            });
        }
    }

    fn record_unit_error(
        &mut self,
        index: u32,
        error: LayerstackError,
        policy: FailurePolicy,
    ) -> LayerstackResult<()> {
        if policy == FailurePolicy::Abort || error.is_fatal_for_batch() {
            return Err(error);
        }
        tracing::warn!(unit = index, error = %error, "unit failed, continuing");
        self.failures.push(UnitFailure { index, error });
        Ok(())
    }
}

/// One generation batch over a fixed set of layer sources.
///
/// Selection, cache lookup and compositing run on the calling thread; persistence runs on a
/// bounded worker pool that lives for the duration of [`GenerateSession::run`].
pub struct GenerateSession {
    sources: Vec<LayerSource>,
    selector: Box<dyn Selector>,
    opts: GenerateOpts,
}

impl GenerateSession {
    pub fn new(
        sources: Vec<LayerSource>,
        selector: Box<dyn Selector>,
        opts: GenerateOpts,
    ) -> LayerstackResult<Self> {
        if sources.is_empty() {
            return Err(LayerstackError::validation(
                "at least one layer source is required",
            ));
        }
        if opts.persist.workers == 0 {
            return Err(LayerstackError::validation("workers must be >= 1"));
        }
        Ok(Self {
            sources,
            selector,
            opts,
        })
    }

    /// Scan every directory (in order) and build a session over them.
    ///
    /// An empty or unreadable directory fails here, before any unit is produced.
    pub fn from_dirs(
        dirs: &[PathBuf],
        selector: Box<dyn Selector>,
        opts: GenerateOpts,
    ) -> LayerstackResult<Self> {
        let sources = dirs
            .iter()
            .map(LayerSource::scan)
            .collect::<LayerstackResult<Vec<_>>>()?;
        Self::new(sources, selector, opts)
    }

    pub fn sources(&self) -> &[LayerSource] {
        &self.sources
    }

    pub fn opts(&self) -> &GenerateOpts {
        &self.opts
    }

    /// Generate `opts.count` units into `store`.
    ///
    /// Returns only after every dispatched composite has reported completion, including on the
    /// error path.
    #[tracing::instrument(skip_all)]
    pub fn run(&mut self, store: &dyn ImageStore) -> LayerstackResult<GenerateReport> {
        let count = self.opts.count;
        let policy = self.opts.failure_policy;
        let persist_opts = self.opts.persist;
        tracing::info!(
            units = count,
            sources = self.sources.len(),
            workers = persist_opts.workers,
            "generation started"
        );

        let mut cache = DedupCache::new();
        let mut report = GenerateReport {
            requested: count,
            ..GenerateReport::default()
        };

        let mut dispatched = Dispatched::default();

        let outcome = std::thread::scope(|scope| -> LayerstackResult<()> {
            let mut pool = PersistPool::start(scope, store, persist_opts)?;
            let mut fatal: Option<LayerstackError> = None;

            for index in 1..=count {
                for completion in pool.poll() {
                    if let Err(e) = report.record_completion(completion, &mut dispatched, policy)
                    {
                        fatal.get_or_insert(e);
                    }
                }
                if fatal.is_some() {
                    break;
                }

                match self.produce_unit(index, &mut cache, &mut report, &dispatched) {
                    Ok(Some((key, image))) => {
                        dispatched.in_flight.insert(index, key);
                        if let Err(e) = pool.dispatch(index, image) {
                            fatal = Some(e);
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        if let Err(e) = report.record_unit_error(index, e, policy) {
                            fatal = Some(e);
                            break;
                        }
                    }
                }
            }

            match pool.finish() {
                Ok(rest) => {
                    for completion in rest {
                        if let Err(e) = report.record_completion(completion, &mut dispatched, policy)
                        {
                            fatal.get_or_insert(e);
                        }
                    }
                }
                Err(e) => {
                    fatal.get_or_insert(e);
                }
            }

            match fatal {
                Some(e) => Err(e),
                None => Ok(()),
            }
        });

        report.rendered = cache.renders();
        report.persisted.sort_unstable();
        outcome?;

        tracing::info!(
            requested = report.requested,
            rendered = report.rendered,
            duplicates = report.duplicates.len(),
            persisted = report.persisted.len(),
            failures = report.failures.len(),
            "generation finished"
        );
        Ok(report)
    }

    /// Select and resolve one unit. `None` means the combination was a repeat.
    fn produce_unit(
        &mut self,
        index: u32,
        cache: &mut DedupCache,
        report: &mut GenerateReport,
        dispatched: &Dispatched,
    ) -> LayerstackResult<Option<(CompositionKey, Arc<CompositeImage>)>> {
        let composition = select_layers(&self.sources, self.selector.as_mut())?;
        match cache.resolve(&composition, compose)? {
            CacheOutcome::Hit { key } => {
                if let Some(e) = dispatched.repeat_of_unwritten(&key) {
                    return Err(e);
                }
                tracing::info!(unit = index, "combination {key} already exists");
                report.duplicates.push(DuplicateNotice { index, key });
                Ok(None)
            }
            CacheOutcome::Miss { key, image } => {
                tracing::debug!(unit = index, "rendered combination {key}");
                Ok(Some((key, image)))
            }
        }
    }
}

/// Run a whole batch from configuration: validate, scan sources, create the output directory,
/// then generate with uniform random picks into `<out_dir>/<index>.png`.
pub fn generate(cfg: &GenerateConfig) -> LayerstackResult<GenerateReport> {
    cfg.validate()?;
    let mut session = GenerateSession::from_dirs(
        &cfg.layer_dirs,
        Box::new(RandomSelector::new()),
        cfg.generate_opts(),
    )?;
    prepare_output_dir(&cfg.out_dir)?;
    session.run(&PngDirStore::new(&cfg.out_dir))
}

#[cfg(test)]
#[path = "../tests/unit/generate.rs"]
mod tests;
