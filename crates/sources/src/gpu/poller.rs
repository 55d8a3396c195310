//! Background polling of the GPU command-line tool
//!
//! The tool is only ever run on a dedicated thread with its own
//! current-thread runtime. Each poll is bounded by the tool timeout and its
//! result is published through an `ArcSwap`, so accessors never wait on a
//! subprocess.

use super::backend::{GpuSnapshot, GpuTool};
use arc_swap::ArcSwap;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use rg_sampler_core::TelemetryError;
use rg_sampler_types::GpuConfig;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Extra time allowed for the initial name query beyond the tool timeout
const STARTUP_GRACE: Duration = Duration::from_millis(500);

type NamesResult = Result<Vec<String>, TelemetryError>;

struct PollerThread {
    stop: watch::Sender<bool>,
    /// Disconnects when the thread exits
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

pub(super) struct ToolPoller {
    program: String,
    thread: Mutex<Option<PollerThread>>,
    shutdown_timeout: Duration,
}

impl ToolPoller {
    /// Query device names on the poller thread and, if any are found, keep
    /// polling. Returns the names once the initial query completes.
    pub(super) fn start<T: GpuTool>(
        tool: T,
        config: &GpuConfig,
        published: Arc<ArcSwap<GpuSnapshot>>,
    ) -> Result<(Self, Vec<String>), TelemetryError> {
        let program = tool.program();
        let interval = config.poll_interval();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (done_tx, done_rx) = bounded::<()>(0);
        let (names_tx, names_rx) = bounded::<NamesResult>(1);

        let handle = std::thread::Builder::new()
            .name("gpu-tool-poller".to_string())
            .spawn(move || {
                let _done = done_tx;
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = names_tx.send(Err(TelemetryError::Unavailable(format!(
                            "GPU poller runtime ({})",
                            e
                        ))));
                        return;
                    }
                };
                runtime.block_on(poll_loop(tool, interval, stop_rx, names_tx, published));
            })
            .map_err(|e| TelemetryError::Unavailable(format!("GPU poller thread ({})", e)))?;

        let poller = Self {
            program: program.clone(),
            thread: Mutex::new(Some(PollerThread {
                stop: stop_tx,
                done: done_rx,
                handle,
            })),
            shutdown_timeout: config.shutdown_timeout(),
        };

        let wait = config.tool_timeout() + STARTUP_GRACE;
        match names_rx.recv_timeout(wait) {
            Ok(Ok(names)) => Ok((poller, names)),
            Ok(Err(e)) => {
                poller.shutdown();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                poller.shutdown();
                Err(TelemetryError::ToolTimeout {
                    program,
                    timeout: wait,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                poller.shutdown();
                Err(TelemetryError::Unavailable(program))
            }
        }
    }

    /// Stop polling. Waits up to the shutdown timeout, then detaches.
    pub(super) fn shutdown(&self) {
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(thread) = thread else {
            return;
        };

        let _ = thread.stop.send(true);
        match thread.done.recv_timeout(self.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if thread.handle.join().is_err() {
                    log::warn!("{} poller thread panicked", self.program);
                }
                log::info!("{} poller stopped", self.program);
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "{} poller did not stop within {:?}, detaching",
                    self.program,
                    self.shutdown_timeout
                );
            }
        }
    }
}

impl Drop for ToolPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn poll_loop<T: GpuTool>(
    tool: T,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
    names_tx: Sender<NamesResult>,
    published: Arc<ArcSwap<GpuSnapshot>>,
) {
    let names = tokio::select! {
        _ = stop.changed() => return,
        names = tool.query_names() => names,
    };

    let names = match names {
        Ok(names) if !names.is_empty() => names,
        Ok(_) => {
            let _ = names_tx.send(Err(TelemetryError::Unavailable(format!(
                "{} (no devices)",
                tool.program()
            ))));
            return;
        }
        Err(e) => {
            let _ = names_tx.send(Err(e));
            return;
        }
    };

    published.store(Arc::new(GpuSnapshot::named(names.clone())));
    if names_tx.send(Ok(names)).is_err() {
        // Negotiation already gave up on us
        return;
    }
    drop(names_tx);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.tick() => {}
        }

        let reading = tokio::select! {
            _ = stop.changed() => break,
            reading = tool.poll() => reading,
        };

        match reading {
            Ok(reading) => {
                let next = published.load().merged(reading);
                published.store(Arc::new(next));
            }
            Err(e) => {
                log::debug!("GPU poll failed, keeping last values: {}", e);
            }
        }
    }

    log::debug!("{} poll loop exiting", tool.program());
}
