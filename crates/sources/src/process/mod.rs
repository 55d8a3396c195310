//! Background process-table collection
//!
//! Enumerating every process is far too slow for the UI tick, so it runs on a
//! single persistent worker thread. At most one collection is in flight; the
//! finished snapshot waits in a one-slot mailbox until the consumer takes it.

mod enumerator;
mod snapshot;

pub use enumerator::{parse_cpu_list, ProcessEnumerator, SysinfoEnumerator};
pub use snapshot::{build_snapshot, matches_filter};

use anyhow::Result;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use rg_sampler_types::{ProcessConfig, ProcessSnapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

struct CollectRequest {
    n_cores: usize,
    filter: String,
}

/// State shared with the worker thread
struct Shared {
    mailbox: Mutex<Option<ProcessSnapshot>>,
    in_flight: AtomicBool,
    shut_down: AtomicBool,
}

impl Shared {
    fn mailbox(&self) -> MutexGuard<'_, Option<ProcessSnapshot>> {
        self.mailbox.lock().unwrap_or_else(|poisoned| {
            log::warn!("Process mailbox mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Clears the in-flight flag however the job ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Worker {
    handle: JoinHandle<()>,
    /// Disconnects when the worker thread exits
    done: Receiver<()>,
}

/// Collects process snapshots off the caller's thread
pub struct ProcessSnapshotCollector {
    shared: Arc<Shared>,
    requests: Mutex<Option<Sender<CollectRequest>>>,
    worker: Mutex<Option<Worker>>,
    shutdown_timeout: Duration,
}

impl ProcessSnapshotCollector {
    /// Collector backed by sysinfo
    pub fn new(config: &ProcessConfig) -> Result<Self> {
        Self::with_enumerator(config, SysinfoEnumerator::new())
    }

    pub fn with_enumerator<E: ProcessEnumerator>(config: &ProcessConfig, enumerator: E) -> Result<Self> {
        let shared = Arc::new(Shared {
            mailbox: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        });

        // Capacity 1: the in-flight flag already guarantees a single request
        let (request_tx, request_rx) = bounded::<CollectRequest>(1);
        let (done_tx, done_rx) = bounded::<()>(0);
        let top_n = config.top_n;
        let worker_shared = Arc::clone(&shared);

        let handle = std::thread::Builder::new()
            .name("process-collector".to_string())
            .spawn(move || {
                let _done = done_tx;
                run_worker(enumerator, request_rx, worker_shared, top_n);
            })?;

        log::info!("Process collector started (top {} per bucket)", top_n);

        Ok(Self {
            shared,
            requests: Mutex::new(Some(request_tx)),
            worker: Mutex::new(Some(Worker {
                handle,
                done: done_rx,
            })),
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Schedule one collection unless one is already running.
    ///
    /// Returns immediately. Calls while a collection is in flight, or after
    /// shutdown, are no-ops.
    pub fn collect_async(&self, n_cores: usize, filter: &str) {
        if self.shared.shut_down.load(Ordering::Acquire) {
            log::debug!("Process collection requested after shutdown, ignoring");
            return;
        }

        if self
            .shared
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::trace!("Process collection already in flight, skipping");
            return;
        }

        let requests = self.requests.lock().unwrap_or_else(|poisoned| {
            log::warn!("Process request mutex was poisoned, recovering");
            poisoned.into_inner()
        });

        let request = CollectRequest {
            n_cores,
            filter: filter.to_string(),
        };

        let sent = match requests.as_ref() {
            Some(tx) => match tx.try_send(request) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    log::debug!("Process request queue full, skipping");
                    false
                }
                Err(TrySendError::Disconnected(_)) => {
                    log::warn!("Process collector worker has exited");
                    false
                }
            },
            None => false,
        };

        if !sent {
            self.shared.in_flight.store(false, Ordering::Release);
        }
    }

    /// Take the latest finished snapshot, if any. Each snapshot is returned
    /// at most once.
    pub fn get_result(&self) -> Option<ProcessSnapshot> {
        self.shared.mailbox().take()
    }

    pub fn is_collecting(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Stop the worker, waiting at most the configured timeout for a running
    /// enumeration. Results completing afterwards are discarded. Safe to call
    /// more than once.
    pub fn shutdown(&self) {
        {
            // Under the mailbox lock so a finishing worker sees it before publishing
            let _slot = self.shared.mailbox();
            self.shared.shut_down.store(true, Ordering::Release);
        }

        // Dropping the sender ends the worker's request loop
        drop(
            self.requests
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take(),
        );

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(worker) = worker else {
            return;
        };

        match worker.done.recv_timeout(self.shutdown_timeout) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                if worker.handle.join().is_err() {
                    log::warn!("Process collector worker panicked");
                }
                log::info!("Process collector stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Process collector did not stop within {:?}, detaching",
                    self.shutdown_timeout
                );
            }
        }
    }
}

impl Drop for ProcessSnapshotCollector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<E: ProcessEnumerator>(
    mut enumerator: E,
    requests: Receiver<CollectRequest>,
    shared: Arc<Shared>,
    top_n: usize,
) {
    for request in requests.iter() {
        let _guard = InFlightGuard(&shared.in_flight);
        if shared.shut_down.load(Ordering::Acquire) {
            break;
        }

        let started = Instant::now();
        let table = match enumerator.enumerate() {
            Ok(table) => table,
            Err(e) => {
                log::warn!("Process enumeration failed: {:#}", e);
                continue;
            }
        };
        let snapshot = build_snapshot(&table, request.n_cores, &request.filter, top_n, Instant::now());

        let mut slot = shared.mailbox();
        if shared.shut_down.load(Ordering::Acquire) {
            log::debug!("Discarding process snapshot finished after shutdown");
            break;
        }

        log::debug!(
            "Process snapshot: {} processes, {} threads in {:?}",
            snapshot.process_count,
            snapshot.total_threads,
            started.elapsed()
        );
        if slot.replace(snapshot).is_some() {
            log::trace!("Replaced unconsumed process snapshot");
        }
    }
    log::debug!("Process collector worker exiting");
}
