//! Fleet registry for tracking all discovered devices

use crate::bridge::Bridge;
use crate::worker::DeviceWorker;
use anyhow::{Context, Result};
use fleet_shared::{parse_listing, DeviceIdentity};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Manages one worker per discovered device
pub struct FleetRegistry {
    bridge: Arc<dyn Bridge>,
    output_root: PathBuf,
    /// Workers in registration order
    workers: Vec<DeviceWorker>,
    /// Full serial -> index into `workers`
    by_serial: HashMap<String, usize>,
    /// Short serial -> first worker registered with it
    by_short: HashMap<String, usize>,
    /// Shared abort signal, raised on the first fatal error
    abort_tx: watch::Sender<bool>,
}

impl FleetRegistry {
    /// Create an empty registry
    pub fn new(bridge: Arc<dyn Bridge>, output_root: impl Into<PathBuf>) -> Self {
        let (abort_tx, _) = watch::channel(false);
        Self {
            bridge,
            output_root: output_root.into(),
            workers: Vec::new(),
            by_serial: HashMap::new(),
            by_short: HashMap::new(),
            abort_tx,
        }
    }

    /// List attached devices and register every new one
    ///
    /// Returns the number of newly registered devices. An unparseable
    /// listing is an error: a partially-understood fleet is unsafe.
    pub async fn discover(&mut self) -> Result<usize> {
        let lines = self
            .bridge
            .list_devices()
            .await
            .context("failed to list devices")?;
        let devices = parse_listing(&lines)?;

        let mut added = 0;
        for identity in devices {
            if self.register(identity) {
                added += 1;
            }
        }

        info!("[FLEET] {} device(s): {:?}", self.len(), self.serials());
        Ok(added)
    }

    /// Register a device, no-op if its serial is already known
    pub fn register(&mut self, identity: DeviceIdentity) -> bool {
        if self.contains(&identity.serial) {
            debug!("[FLEET] {} already registered", identity.serial);
            return false;
        }

        let index = self.workers.len();
        self.by_serial.insert(identity.serial.clone(), index);
        self.by_short
            .entry(identity.serial_short.clone())
            .or_insert(index);

        self.workers.push(DeviceWorker::new(
            identity,
            self.bridge.clone(),
            self.output_root.clone(),
            self.abort_tx.subscribe(),
        ));
        true
    }

    /// True if `name` is a known full or short serial
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.by_serial
            .get(name)
            .or_else(|| self.by_short.get(name))
            .copied()
    }

    /// Full serials in registration order
    pub fn serials(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.serial()).collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Queue a command on every worker, in registration order
    ///
    /// Returns the number of workers that accepted it. Nothing is accepted
    /// once the run has been aborted.
    pub fn broadcast(&mut self, command: &str) -> usize {
        if self.is_aborted() {
            debug!("[FLEET] aborted, not queueing: {}", command);
            return 0;
        }
        let mut accepted = 0;
        for worker in &mut self.workers {
            if worker.submit(command) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Ask every worker to stop once its queue drains
    pub fn stop_all(&self) {
        for worker in &self.workers {
            worker.stop();
        }
    }

    pub fn is_aborted(&self) -> bool {
        *self.abort_tx.borrow()
    }

    /// Wait for every worker to terminate
    ///
    /// The first fatal error aborts all other workers and is returned once
    /// they have all exited.
    pub async fn wait_all_stopped(&mut self) -> Result<()> {
        debug!(
            "[FLEET] waiting for {} running worker(s)",
            self.workers.iter().filter(|w| w.is_running()).count()
        );
        let abort_tx = &self.abort_tx;
        let mut pending: FuturesUnordered<_> = self
            .workers
            .iter_mut()
            .map(|worker| worker.wait_stopped())
            .collect();

        let mut first_fatal = None;
        while let Some(result) = pending.next().await {
            let Err(e) = result else {
                continue;
            };
            if first_fatal.is_none() {
                warn!("[FLEET] fatal error, aborting all devices");
                // every other worker drops its queue and kills its bridge process
                abort_tx.send_replace(true);
                first_fatal = Some(e);
            } else {
                debug!("further failure after abort: {:#}", e);
            }
        }

        match first_fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::mock::{BridgeCall, MockBridge};
    use std::time::Duration;

    const EMULATOR: &str =
        "emulator-5554 device usb:1-1 product:sdk model:Pixel device:generic transport_id:3";
    const NETWORK: &str = "10.0.0.7:5555 device product:sdk model:Nexus device:generic transport_id:4";

    fn registry(bridge: Arc<MockBridge>) -> FleetRegistry {
        FleetRegistry::new(bridge, "output")
    }

    #[tokio::test]
    async fn test_discover_registers_devices() {
        let bridge = Arc::new(MockBridge::new().with_listing(&[
            "List of devices attached",
            EMULATOR,
            NETWORK,
            "ZX1 offline",
        ]));
        let mut fleet = registry(bridge);

        assert_eq!(fleet.discover().await.unwrap(), 2);
        assert_eq!(fleet.serials(), ["emulator-5554", "10.0.0.7:5555"]);
        assert!(fleet.contains("10.0.0.7"));
        assert!(!fleet.contains("ZX1"));

        // a second discovery of the same fleet adds nothing
        assert_eq!(fleet.discover().await.unwrap(), 0);
        assert_eq!(fleet.len(), 2);
    }

    #[tokio::test]
    async fn test_discover_fails_on_malformed_listing() {
        let bridge = Arc::new(MockBridge::new().with_listing(&[
            "List of devices attached",
            "ABCD1234 unauthorized usb:1-1 transport_id:2",
        ]));
        let mut fleet = registry(bridge);

        assert!(fleet.discover().await.is_err());
        assert!(fleet.is_empty());
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut fleet = registry(Arc::new(MockBridge::new()));

        assert!(fleet.register(DeviceIdentity::new("10.0.0.7:5555")));
        assert!(!fleet.register(DeviceIdentity::new("10.0.0.7:5555")));
        assert!(!fleet.register(DeviceIdentity::new("10.0.0.7")));
        assert_eq!(fleet.len(), 1);

        // another port on the same host is a different device
        assert!(fleet.register(DeviceIdentity::new("10.0.0.7:5556")));
        assert_eq!(fleet.index_of("10.0.0.7"), Some(0));
        assert_eq!(fleet.len(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_gives_each_device_its_own_history() {
        let bridge = Arc::new(MockBridge::new().passthrough_delay(Duration::from_millis(2)));
        let mut fleet = registry(bridge.clone());
        for serial in ["A", "B", "C"] {
            fleet.register(DeviceIdentity::new(serial));
        }

        for command in ["shell echo 1 {device}", "shell echo 2 {device}", "shell echo 3 {device}"] {
            assert_eq!(fleet.broadcast(command), 3);
        }
        fleet.stop_all();
        fleet.wait_all_stopped().await.unwrap();

        for serial in ["A", "B", "C"] {
            let expected: Vec<String> = (1..=3)
                .map(|n| format!("shell echo {} {}", n, serial))
                .collect();
            assert_eq!(bridge.passthrough_for(serial), expected);
        }
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_other_devices() {
        let bridge = Arc::new(
            MockBridge::new()
                .failing_connect("10.0.0.7:5555")
                .passthrough_delay(Duration::from_millis(50)),
        );
        let mut fleet = registry(bridge.clone());
        fleet.register(DeviceIdentity::new("10.0.0.7:5555"));
        fleet.register(DeviceIdentity::new("10.0.0.8:5555"));

        fleet.broadcast("disconnect");
        fleet.broadcast("connect");
        for n in 0..20 {
            fleet.broadcast(&format!("shell echo {}", n));
        }
        fleet.stop_all();

        let err = fleet.wait_all_stopped().await.unwrap_err();
        assert!(err.to_string().contains("10.0.0.7:5555"));
        assert!(fleet.is_aborted());

        // the failing device ran nothing after its connect
        assert!(bridge.passthrough_for("10.0.0.7:5555").is_empty());
        // the healthy device was cut short
        assert!(bridge.passthrough_for("10.0.0.8:5555").len() < 20);
        assert!(bridge
            .calls_for("10.0.0.8:5555")
            .contains(&BridgeCall::Connect("10.0.0.8:5555".into())));
    }

    #[tokio::test]
    async fn test_wait_without_commands() {
        let mut fleet = registry(Arc::new(MockBridge::new()));
        fleet.register(DeviceIdentity::new("A"));
        fleet.stop_all();
        fleet.wait_all_stopped().await.unwrap();
        assert!(!fleet.is_aborted());
    }
}
