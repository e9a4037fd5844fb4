//! Periodic task runner
//!
//! A runner alternates between a [`Waiter`] phase and a [`Task`] phase on a
//! dedicated tokio task until it is stopped. Stopping interrupts a wait but
//! lets a running task finish its cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Default pause between reconciliation cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Blocks until the next cycle is due.
#[async_trait]
pub trait Waiter: Send + Sync {
    async fn wait(&self);
}

/// Work performed once per cycle.
#[async_trait]
pub trait Task: Send + Sync {
    async fn run(&self);
}

/// Sleeps a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct IntervalWaiter {
    interval: Duration,
}

impl IntervalWaiter {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for IntervalWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

#[async_trait]
impl Waiter for IntervalWaiter {
    async fn wait(&self) {
        tokio::time::sleep(self.interval).await;
    }
}

/// Lifecycle of a [`Runner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunnerStatus {
    /// In the waiter phase
    Waiting = 0,
    /// In the task phase
    Running = 1,
    /// Stop requested, current cycle still finishing
    Stopping = 2,
    /// Loop exited
    Stopped = 3,
}

impl RunnerStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunnerStatus::Waiting,
            1 => RunnerStatus::Running,
            2 => RunnerStatus::Stopping,
            _ => RunnerStatus::Stopped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunnerStatus::Waiting => "waiting",
            RunnerStatus::Running => "running",
            RunnerStatus::Stopping => "stopping",
            RunnerStatus::Stopped => "stopped",
        }
    }
}

impl core::fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A background loop driving a [`Task`].
pub struct Runner {
    tag: String,
    status: Arc<AtomicU8>,
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Runner {
    /// Spawn the loop on the current tokio runtime. The first cycle runs
    /// after the first wait.
    pub fn spawn(tag: impl Into<String>, waiter: Arc<dyn Waiter>, task: Arc<dyn Task>) -> Self {
        let tag = tag.into();
        let status = Arc::new(AtomicU8::new(RunnerStatus::Waiting as u8));
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            tag.clone(),
            Arc::clone(&status),
            stop_rx,
            waiter,
            task,
        ));
        Self {
            tag,
            status,
            stop_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn status(&self) -> RunnerStatus {
        RunnerStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Request shutdown without waiting for it.
    pub fn set_stopping(&self) {
        if self.status() != RunnerStatus::Stopped {
            self.status
                .store(RunnerStatus::Stopping as u8, Ordering::SeqCst);
        }
        self.stop_tx.send_replace(true);
    }

    /// Request shutdown and wait for the current cycle to finish.
    pub async fn stop(&self) {
        self.set_stopping();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(runner = %self.tag, error = %e, "runner task ended abnormally");
            self.status
                .store(RunnerStatus::Stopped as u8, Ordering::SeqCst);
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}

/// Move to `next` unless a stop was requested. Returns `false` on stop.
fn enter(status: &AtomicU8, next: RunnerStatus) -> bool {
    status
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            (current != RunnerStatus::Stopping as u8).then_some(next as u8)
        })
        .is_ok()
}

async fn run_loop(
    tag: String,
    status: Arc<AtomicU8>,
    mut stop_rx: watch::Receiver<bool>,
    waiter: Arc<dyn Waiter>,
    task: Arc<dyn Task>,
) {
    info!(runner = %tag, "Runner started");
    loop {
        if !enter(&status, RunnerStatus::Waiting) || *stop_rx.borrow() {
            break;
        }
        tokio::select! {
            () = waiter.wait() => {}
            _ = stop_rx.changed() => break,
        }
        if !enter(&status, RunnerStatus::Running) {
            break;
        }
        task.run().await;
    }
    status.store(RunnerStatus::Stopped as u8, Ordering::SeqCst);
    info!(runner = %tag, "Runner stopped");
}
