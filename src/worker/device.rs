//! Device worker with an ordered command queue and its own task

use crate::bridge::Bridge;
use crate::command::{CommandExecutor, CommandResult};
use anyhow::{anyhow, Result};
use fleet_shared::state_machine::PhaseEvent;
use fleet_shared::{CommandLine, DeviceIdentity, WorkerPhase};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Messages delivered to a worker task, in submission order
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// Run a command line
    Execute(CommandLine),
    /// Exit once everything queued before this has run
    Stop,
}

/// Runs one device's commands strictly in submission order
pub struct DeviceWorker {
    identity: DeviceIdentity,
    bridge: Arc<dyn Bridge>,
    output_root: PathBuf,
    abort: watch::Receiver<bool>,
    phase_tx: Option<watch::Sender<WorkerPhase>>,
    phase_rx: watch::Receiver<WorkerPhase>,
    /// Queue into the task, `None` until started
    queue_tx: Option<mpsc::UnboundedSender<WorkerMessage>>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl DeviceWorker {
    /// Create an unstarted worker
    ///
    /// Raising `abort` makes the task drop its queue and kill any running
    /// bridge process.
    pub fn new(
        identity: DeviceIdentity,
        bridge: Arc<dyn Bridge>,
        output_root: PathBuf,
        abort: watch::Receiver<bool>,
    ) -> Self {
        let (phase_tx, phase_rx) = watch::channel(WorkerPhase::Unstarted);
        Self {
            identity,
            bridge,
            output_root,
            abort,
            phase_tx: Some(phase_tx),
            phase_rx,
            queue_tx: None,
            handle: None,
        }
    }

    pub fn serial(&self) -> &str {
        &self.identity.serial
    }

    pub fn phase(&self) -> WorkerPhase {
        *self.phase_rx.borrow()
    }

    /// True while the worker task is alive
    pub fn is_running(&self) -> bool {
        self.phase().is_running()
    }

    /// Spawn the worker task; no-op if already started
    pub fn start(&mut self) {
        let Some(phase_tx) = self.phase_tx.take() else {
            return;
        };

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let executor = CommandExecutor::new(
            self.identity.serial.clone(),
            self.identity.auto_reconnect(),
            &self.output_root,
            self.bridge.clone(),
        );
        let abort = self.abort.clone();

        // running as soon as start returns, not when the task is first polled
        phase_tx.send_modify(|phase| *phase = phase.next(PhaseEvent::Started).unwrap_or(*phase));

        self.queue_tx = Some(queue_tx);
        self.handle = Some(tokio::spawn(async move {
            worker_loop(executor, queue_rx, abort, phase_tx).await
        }));
    }

    /// Queue a command without waiting for it to run
    ///
    /// Returns false if the worker has already terminated.
    pub fn submit(&mut self, command: impl Into<CommandLine>) -> bool {
        self.start();
        self.send(WorkerMessage::Execute(command.into()))
    }

    /// Ask the task to exit after draining its queue
    pub fn stop(&self) {
        self.send(WorkerMessage::Stop);
    }

    /// Wait for the task to terminate and return its fatal error, if any
    ///
    /// Returns immediately for a worker that was never started.
    pub async fn wait_stopped(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(anyhow!("[{}] worker task failed: {}", self.identity.serial, e)),
        }
    }

    fn send(&self, message: WorkerMessage) -> bool {
        let Some(queue_tx) = &self.queue_tx else {
            return false;
        };
        if let Err(e) = queue_tx.send(message) {
            debug!("[{}] worker gone, dropped {:?}", self.identity.serial, e.0);
            return false;
        }
        true
    }
}

/// Worker task: one command at a time, in queue order
async fn worker_loop(
    mut executor: CommandExecutor,
    mut queue_rx: mpsc::UnboundedReceiver<WorkerMessage>,
    mut abort: watch::Receiver<bool>,
    phase_tx: watch::Sender<WorkerPhase>,
) -> Result<()> {
    let serial = executor.serial().to_string();
    let advance = |event: PhaseEvent| {
        phase_tx.send_modify(|phase| {
            if let Some(next) = phase.next(event) {
                *phase = next;
            }
        });
    };

    loop {
        let message = tokio::select! {
            biased;
            _ = aborted(&mut abort) => {
                advance(PhaseEvent::Aborted);
                info!("[{}] aborted, {} command(s) dropped", serial, queue_rx.len());
                return Ok(());
            }
            message = queue_rx.recv() => message,
        };

        let command = match message {
            Some(WorkerMessage::Execute(command)) => command,
            Some(WorkerMessage::Stop) | None => {
                advance(PhaseEvent::StopReached);
                debug!(
                    "[{}] stopped, connected={}",
                    serial,
                    executor.link().is_connected()
                );
                return Ok(());
            }
        };

        advance(PhaseEvent::CommandTaken);

        let result = tokio::select! {
            biased;
            _ = aborted(&mut abort) => {
                advance(PhaseEvent::Aborted);
                warn!("[{}] aborted during: {}", serial, command);
                return Ok(());
            }
            result = executor.execute(&command) => result,
        };

        if let CommandResult::Fatal { message } = result {
            advance(PhaseEvent::Aborted);
            return Err(anyhow!("[{}] {}", serial, message));
        }

        if queue_rx.is_empty() {
            advance(PhaseEvent::QueueEmpty);
        }
    }
}

/// Resolves once the abort signal is raised
async fn aborted(abort: &mut watch::Receiver<bool>) {
    let closed = abort.wait_for(|aborted| *aborted).await.is_err();
    if closed {
        // nobody can abort any more
        std::future::pending::<()>().await;
    }
}
