//! A foreground watch session: sync loop, report printer and console.

use std::sync::Arc;

use tokio::io::BufReader;

use standup_core::RecordKey;
use standup_sync::{ObjectStore, SyncEngine, WriteCoordinator};

use crate::console::{self, ConsoleExit};
use crate::debounce::ReactionDebouncer;
use crate::error::DaemonError;
use crate::runtime::{self, block_on_with_ctrl_c, CycleReport, DaemonHandle, LoopInbox};

/// Everything a session needs besides its I/O.
pub struct Session<S> {
    pub engine: Arc<SyncEngine<S>>,
    pub coordinator: WriteCoordinator<S>,
    /// The local writer's own record for the active session.
    pub owner: RecordKey,
}

/// Run until shutdown. `input`, when given, is served as a console; `quit`
/// there ends the session, end of input does not.
pub async fn watch<S, R, F>(
    session: Session<S>,
    handle: DaemonHandle,
    inbox: LoopInbox,
    input: Option<R>,
    mut on_report: F,
) -> Result<(), DaemonError>
where
    S: ObjectStore + 'static,
    R: tokio::io::AsyncBufRead + Unpin,
    F: FnMut(&CycleReport) + Send + 'static,
{
    let Session {
        engine,
        coordinator,
        owner,
    } = session;

    let loop_handle = tokio::spawn(runtime::run(engine, inbox));

    let reporter_handle = {
        let mut reports = handle.subscribe();
        let mut shutdown_rx = handle.shutdown_signal();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    changed = reports.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let report = reports.borrow_and_update().clone();
                        if let Some(report) = report {
                            on_report(&report);
                        }
                    }
                }
            }
        })
    };

    if let Some(input) = input {
        let debouncer = ReactionDebouncer::new(coordinator, owner, handle.clone());
        match console::serve(input, &debouncer, &handle).await? {
            ConsoleExit::Quit => handle.shutdown(),
            ConsoleExit::InputClosed => {
                tracing::debug!("console input closed; watching until interrupted")
            }
            ConsoleExit::Shutdown => {}
        }
    }

    let loop_result = loop_handle.await;
    handle.shutdown();
    let _ = reporter_handle.await;
    match loop_result {
        Ok(result) => result,
        Err(err) => Err(DaemonError::Join {
            task: "sync loop",
            message: err.to_string(),
        }),
    }
}

/// Watch with stdin as the console, blocking the current thread until
/// ctrl-c or `quit`.
pub fn start_blocking<S, F>(session: Session<S>, json_logs: bool, on_report: F) -> Result<(), DaemonError>
where
    S: ObjectStore + 'static,
    F: FnMut(&CycleReport) + Send + 'static,
{
    runtime::init_tracing(json_logs);
    let (handle, inbox) = runtime::channels();
    block_on_with_ctrl_c(handle.clone(), async move {
        let stdin = BufReader::new(tokio::io::stdin());
        watch(session, handle, inbox, Some(stdin), on_report).await
    })
}
