//! Concurrent, rate-limited retrieval of host records.
//!
//! A single feeder (the calling thread) pushes identifiers into a bounded
//! work channel no faster than one per `min_interval`; a fixed pool of
//! workers pulls from it and calls the [`HostSource`]. The feeder is the
//! rate gate: worker count never changes the request rate. Progress events
//! flow over a second channel to one consumer thread that drives the
//! caller's callback.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::error::{Result, ShowdownError};
use crate::record::{HostIdentifier, HostRecord};
use crate::source::HostSource;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of one identifier's fetch, delivered once per identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    Retrieved(HostIdentifier),
    Failed { id: HostIdentifier, reason: String },
}

impl FetchEvent {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Retrieved(_))
    }

    pub fn identifier(&self) -> &HostIdentifier {
        match self {
            Self::Retrieved(id) | Self::Failed { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalEngine {
    concurrency: NonZeroUsize,
    min_interval: Duration,
    stop: Option<Arc<AtomicBool>>,
}

impl RetrievalEngine {
    /// `concurrency` must be at least one.
    pub fn new(concurrency: usize, min_interval: Duration) -> Result<Self> {
        let concurrency = NonZeroUsize::new(concurrency)
            .ok_or_else(|| ShowdownError::Config("concurrency must be at least 1".into()))?;
        Ok(Self {
            concurrency,
            min_interval,
            stop: None,
        })
    }

    /// When the flag is raised the feeder stops enqueueing; fetches already
    /// handed to workers complete normally.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.get()
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn retrieve<S, I>(&self, source: &S, ids: I) -> Vec<HostRecord>
    where
        S: HostSource,
        I: IntoIterator<Item = HostIdentifier>,
    {
        self.retrieve_with(source, ids, |_| {})
    }

    /// Fetch every identifier once and return the successful records.
    ///
    /// Blocks until every enqueued identifier has been processed by exactly
    /// one worker. `on_progress` runs on a dedicated thread, once per
    /// identifier. The order of the returned records is unspecified.
    pub fn retrieve_with<S, I, F>(&self, source: &S, ids: I, mut on_progress: F) -> Vec<HostRecord>
    where
        S: HostSource,
        I: IntoIterator<Item = HostIdentifier>,
        F: FnMut(&FetchEvent) + Send,
    {
        let ids: Vec<HostIdentifier> = ids.into_iter().collect();
        if ids.is_empty() {
            return Vec::new();
        }

        let total = ids.len();
        let workers = self.concurrency.get().min(total);
        let started = Instant::now();
        tracing::info!(
            hosts = total,
            workers,
            interval_ms = self.min_interval.as_millis() as u64,
            "retrieval started"
        );

        let (work_tx, work_rx) = crossbeam_channel::bounded::<HostIdentifier>(total);
        let (event_tx, event_rx) = crossbeam_channel::unbounded::<FetchEvent>();
        let results = Mutex::new(Vec::with_capacity(total));

        thread::scope(|scope| {
            scope.spawn(move || {
                for event in event_rx.iter() {
                    on_progress(&event);
                }
            });

            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let event_tx = event_tx.clone();
                let results = &results;
                scope.spawn(move || fetch_loop(source, work_rx, event_tx, results));
            }
            // Workers hold the remaining handles; once they exit, the
            // progress consumer sees a closed channel and exits too.
            drop(work_rx);
            drop(event_tx);

            self.feed(ids, work_tx);
        });

        let records = results.into_inner();
        tracing::info!(
            retrieved = records.len(),
            failed = total - records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "retrieval finished"
        );
        records
    }

    /// Enqueue identifiers with `min_interval` between consecutive sends,
    /// then close the channel so idle workers terminate.
    fn feed(&self, ids: Vec<HostIdentifier>, work_tx: Sender<HostIdentifier>) {
        for (n, id) in ids.into_iter().enumerate() {
            if n > 0 && !self.min_interval.is_zero() {
                thread::sleep(self.min_interval);
            }
            if self.stop_requested() {
                tracing::warn!(enqueued = n, "stop requested, no further hosts will be fetched");
                break;
            }
            if work_tx.send(id).is_err() {
                break;
            }
        }
        drop(work_tx);
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

impl Default for RetrievalEngine {
    fn default() -> Self {
        Self {
            concurrency: NonZeroUsize::new(DEFAULT_CONCURRENCY).unwrap_or(NonZeroUsize::MIN),
            min_interval: DEFAULT_MIN_INTERVAL,
            stop: None,
        }
    }
}

fn fetch_loop<S: HostSource>(
    source: &S,
    work: Receiver<HostIdentifier>,
    events: Sender<FetchEvent>,
    results: &Mutex<Vec<HostRecord>>,
) {
    for id in work.iter() {
        match source.fetch(&id) {
            Ok(record) => {
                tracing::debug!(host = %id, probes = record.data.len(), "host retrieved");
                let mut sink = results.lock();
                sink.push(record);
                let _ = events.send(FetchEvent::Retrieved(id));
            }
            Err(e) => {
                tracing::warn!(host = %id, error = %e, "host fetch failed, skipping");
                let _ = events.send(FetchEvent::Failed {
                    id,
                    reason: e.to_string(),
                });
            }
        }
    }
}
