use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};

use standup_core::{TeamName, WriterName};
use standup_sync::{CycleOutcome, LockReason, ObjectStore, Snapshot, SyncEngine, SyncError};

use crate::error::{io_err, DaemonError};

/// Pending out-of-band resync requests beyond this are dropped; one queued
/// request is enough to trigger the next cycle.
const RESYNC_QUEUE: usize = 16;

const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// What one cycle produced, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleStatus {
    Published { snapshot: Snapshot },
    Locked { team: TeamName, reason: LockReason },
    Skipped,
    RateLimited { message: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// 1-based cycle counter.
    pub cycle: u64,
    /// What woke the loop: `startup`, `timer`, or the resync requester.
    pub trigger: &'static str,
    #[serde(flatten)]
    pub status: CycleStatus,
    pub duration_ms: u64,
    pub next_delay_ms: u64,
    pub finished_at_unix_ms: u64,
}

impl CycleReport {
    pub fn to_json_line(&self) -> Result<String, DaemonError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match &self.status {
            CycleStatus::Published { snapshot } => Some(snapshot),
            _ => None,
        }
    }

    pub fn writers(&self) -> &[WriterName] {
        self.snapshot().map(|s| s.writers.as_slice()).unwrap_or(&[])
    }
}

/// Cloneable control surface of a running loop.
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    resync: mpsc::Sender<&'static str>,
    shutdown: broadcast::Sender<()>,
    reports: watch::Receiver<Option<CycleReport>>,
}

/// Receiving ends consumed by [`run`].
#[derive(Debug)]
pub struct LoopInbox {
    pub(crate) resync_rx: mpsc::Receiver<&'static str>,
    pub(crate) shutdown_rx: broadcast::Receiver<()>,
    pub(crate) reports_tx: watch::Sender<Option<CycleReport>>,
}

pub fn channels() -> (DaemonHandle, LoopInbox) {
    let (resync, resync_rx) = mpsc::channel(RESYNC_QUEUE);
    let (shutdown, shutdown_rx) = broadcast::channel(4);
    let (reports_tx, reports) = watch::channel(None);
    (
        DaemonHandle {
            resync,
            shutdown,
            reports,
        },
        LoopInbox {
            resync_rx,
            shutdown_rx,
            reports_tx,
        },
    )
}

impl DaemonHandle {
    /// Ask for a cycle now instead of at the next tick.
    pub fn request_resync(&self, source: &'static str) {
        match self.resync.try_send(source) {
            Ok(()) => tracing::debug!(source, "resync requested"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(source, "resync already pending")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(source, "resync requested after loop exit")
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CycleReport>> {
        self.reports.clone()
    }

    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }
}

/// Drive `engine` until shutdown.
///
/// Every iteration runs one cycle on the blocking pool, publishes a
/// [`CycleReport`], then waits for the engine's next delay, a resync request
/// or shutdown. Cycle errors are reported, never returned; the loop always
/// schedules the next cycle.
pub async fn run<S>(engine: Arc<SyncEngine<S>>, inbox: LoopInbox) -> Result<(), DaemonError>
where
    S: ObjectStore + 'static,
{
    let LoopInbox {
        mut resync_rx,
        mut shutdown_rx,
        reports_tx,
    } = inbox;
    let mut resync_open = true;
    let mut trigger = "startup";
    let mut cycle = 0u64;

    loop {
        cycle += 1;
        let report = run_cycle(&engine, cycle, trigger).await;
        let delay = Duration::from_millis(report.next_delay_ms);
        log_report(&report);
        reports_tx.send_replace(Some(report));

        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(delay) => trigger = "timer",
            requested = resync_rx.recv(), if resync_open => match requested {
                Some(source) => {
                    trigger = source;
                    // Requests that piled up during the cycle collapse into this one.
                    while resync_rx.try_recv().is_ok() {}
                }
                None => {
                    resync_open = false;
                    trigger = "timer";
                    tokio::time::sleep(delay).await;
                }
            },
        }
    }

    tracing::info!(cycles = cycle, "sync loop stopped");
    Ok(())
}

async fn run_cycle<S>(engine: &Arc<SyncEngine<S>>, cycle: u64, trigger: &'static str) -> CycleReport
where
    S: ObjectStore + 'static,
{
    let started = tokio::time::Instant::now();
    let worker = Arc::clone(engine);
    let status = match tokio::task::spawn_blocking(move || worker.run_cycle()).await {
        Ok(Ok(CycleOutcome::Published(snapshot))) => CycleStatus::Published { snapshot },
        Ok(Ok(CycleOutcome::Locked { team, reason })) => CycleStatus::Locked { team, reason },
        Ok(Ok(CycleOutcome::Skipped)) => CycleStatus::Skipped,
        Ok(Err(err @ SyncError::RateLimited { .. })) => CycleStatus::RateLimited {
            message: err.to_string(),
        },
        Ok(Err(err)) => CycleStatus::Failed {
            message: err.to_string(),
        },
        Err(join) => CycleStatus::Failed {
            message: format!("sync task join failure: {join}"),
        },
    };
    CycleReport {
        cycle,
        trigger,
        status,
        duration_ms: millis(started.elapsed()),
        next_delay_ms: millis(engine.next_delay()),
        finished_at_unix_ms: unix_millis_now(),
    }
}

fn log_report(report: &CycleReport) {
    match &report.status {
        CycleStatus::Published { snapshot } => tracing::info!(
            cycle = report.cycle,
            trigger = report.trigger,
            team = %snapshot.team,
            session = %snapshot.session,
            records = snapshot.records.len(),
            duration_ms = report.duration_ms,
            "sync cycle published",
        ),
        CycleStatus::Locked { team, reason } => tracing::warn!(
            cycle = report.cycle,
            team = %team,
            reason = ?reason,
            "team is locked; set its passphrase to read records",
        ),
        CycleStatus::Skipped => tracing::debug!(cycle = report.cycle, "cycle skipped"),
        CycleStatus::RateLimited { message } => tracing::warn!(
            cycle = report.cycle,
            next_delay_ms = report.next_delay_ms,
            error = %message,
            "sync cycle throttled",
        ),
        CycleStatus::Failed { message } => tracing::error!(
            cycle = report.cycle,
            error = %message,
            "sync cycle failed",
        ),
    }
}

/// Build a multi-threaded runtime and block on `body` until it finishes or
/// ctrl-c is pressed.
pub fn block_on_with_ctrl_c<F>(handle: DaemonHandle, body: F) -> Result<(), DaemonError>
where
    F: std::future::Future<Output = Result<(), DaemonError>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio runtime", e))?;
    let result = runtime.block_on(async move {
        let signal_handle = {
            let handle = handle.clone();
            let mut shutdown_rx = handle.shutdown_signal();
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown_rx.recv() => {}
                    signal = tokio::signal::ctrl_c() => match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            handle.shutdown();
                        }
                        Err(err) => tracing::error!(error = %err, "ctrl-c handler failed"),
                    },
                }
            })
        };
        let result = body.await;
        handle.shutdown();
        let _ = signal_handle.await;
        result
    });
    // A blocked stdin read would otherwise hold the process open.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

/// Install the global subscriber. `RUST_LOG` wins; otherwise `info`.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn unix_millis_now() -> u64 {
    millis(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default(),
    )
}
