//! Worker State Machines
//!
//! Lifecycle of a device worker and the connectivity rules applied to
//! control commands. Both are pure so the decisions can be tested without
//! a bridge tool.

/// Lifecycle phase of a device worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// No execution context yet
    Unstarted,
    /// Context alive, queue empty
    Idle,
    /// Context executing queued commands
    Draining,
    /// Context terminated
    Stopped,
}

/// Events that move a worker between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Execution context spawned
    Started,
    /// A command was taken off the queue
    CommandTaken,
    /// The queue ran dry
    QueueEmpty,
    /// Stop marker reached
    StopReached,
    /// Run aborted by a fatal error elsewhere
    Aborted,
}

impl WorkerPhase {
    /// Get the next phase for an event, if the transition is valid
    pub fn next(self, event: PhaseEvent) -> Option<WorkerPhase> {
        use PhaseEvent::*;
        use WorkerPhase::*;

        match (self, event) {
            (Unstarted, Started) => Some(Idle),

            (Idle, CommandTaken) => Some(Draining),
            (Draining, CommandTaken) => Some(Draining),
            (Draining, QueueEmpty) => Some(Idle),
            (Idle, QueueEmpty) => Some(Idle),

            // stop is queued behind pending commands
            (Idle, StopReached) => Some(Stopped),
            (Draining, StopReached) => Some(Stopped),

            (Idle | Draining, Aborted) => Some(Stopped),

            _ => None,
        }
    }

    /// True while an execution context exists
    pub fn is_running(self) -> bool {
        matches!(self, WorkerPhase::Idle | WorkerPhase::Draining)
    }
}

/// What a worker must do for a connectivity command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Nothing to do, the bridge tool is not invoked
    Skip,
    /// Invoke the bridge tool
    Invoke,
}

/// Connectivity of one device as tracked by its worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkState {
    connected: bool,
    auto_reconnect: bool,
}

impl LinkState {
    /// Discovery only reports visible devices, so links start connected
    pub fn new(auto_reconnect: bool) -> Self {
        Self {
            connected: true,
            auto_reconnect,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    /// Decide whether a `connect` command needs the bridge tool
    pub fn on_connect(&self) -> LinkAction {
        if self.connected {
            LinkAction::Skip
        } else {
            LinkAction::Invoke
        }
    }

    /// Decide whether a `disconnect` command needs the bridge tool
    ///
    /// USB devices and emulators are never disconnected: they would come
    /// straight back and the tracked state would be wrong.
    pub fn on_disconnect(&self) -> LinkAction {
        if !self.connected || self.auto_reconnect {
            LinkAction::Skip
        } else {
            LinkAction::Invoke
        }
    }

    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    /// Record the outcome of a `root` request
    ///
    /// Anything but "already root" restarts the device daemon and drops the
    /// bridge connection. A later explicit `connect` re-establishes it.
    pub fn on_elevated(&mut self, already_root: bool) {
        if !already_root {
            self.connected = false;
        }
    }
}
