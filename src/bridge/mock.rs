//! Recording bridge used by worker, fleet and session tests

use crate::bridge::traits::{Bridge, ElevateResult, PassthroughOutput};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// One recorded bridge invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCall {
    Connect(String),
    Disconnect(String),
    ListDevices,
    Elevate(String),
    Passthrough { serial: String, args: String },
}

/// Scripted bridge that records every call
#[derive(Default)]
pub struct MockBridge {
    calls: Mutex<Vec<BridgeCall>>,
    listings: Mutex<Vec<Vec<String>>>,
    failing_connects: HashSet<String>,
    failing_disconnects: HashSet<String>,
    elevations: HashMap<String, ElevateResult>,
    failing_passthrough: HashSet<String>,
    passthrough_delay: Option<Duration>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the output of the next `list_devices` call; the last one repeats
    pub fn with_listing(self, lines: &[&str]) -> Self {
        self.listings
            .lock()
            .unwrap()
            .push(lines.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn failing_connect(mut self, serial: &str) -> Self {
        self.failing_connects.insert(serial.to_string());
        self
    }

    pub fn failing_disconnect(mut self, serial: &str) -> Self {
        self.failing_disconnects.insert(serial.to_string());
        self
    }

    pub fn elevation(mut self, serial: &str, result: ElevateResult) -> Self {
        self.elevations.insert(serial.to_string(), result);
        self
    }

    /// Passthrough commands containing `needle` exit with code 1
    pub fn failing_passthrough(mut self, needle: &str) -> Self {
        self.failing_passthrough.insert(needle.to_string());
        self
    }

    pub fn passthrough_delay(mut self, delay: Duration) -> Self {
        self.passthrough_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<BridgeCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls issued for one device, in order
    pub fn calls_for(&self, serial: &str) -> Vec<BridgeCall> {
        self.calls()
            .into_iter()
            .filter(|call| match call {
                BridgeCall::Connect(s)
                | BridgeCall::Disconnect(s)
                | BridgeCall::Elevate(s)
                | BridgeCall::Passthrough { serial: s, .. } => s == serial,
                BridgeCall::ListDevices => false,
            })
            .collect()
    }

    /// Passthrough arguments issued for one device, in order
    pub fn passthrough_for(&self, serial: &str) -> Vec<String> {
        self.calls_for(serial)
            .into_iter()
            .filter_map(|call| match call {
                BridgeCall::Passthrough { args, .. } => Some(args),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BridgeCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Bridge for MockBridge {
    async fn connect(&self, serial: &str) -> bool {
        self.record(BridgeCall::Connect(serial.to_string()));
        !self.failing_connects.contains(serial)
    }

    async fn disconnect(&self, serial: &str) -> bool {
        self.record(BridgeCall::Disconnect(serial.to_string()));
        !self.failing_disconnects.contains(serial)
    }

    async fn list_devices(&self) -> Result<Vec<String>> {
        self.record(BridgeCall::ListDevices);
        let mut listings = self.listings.lock().unwrap();
        match listings.len() {
            0 => Err(anyhow!("no listing scripted")),
            1 => Ok(listings[0].clone()),
            _ => Ok(listings.remove(0)),
        }
    }

    async fn elevate(&self, serial: &str) -> ElevateResult {
        self.record(BridgeCall::Elevate(serial.to_string()));
        self.elevations
            .get(serial)
            .copied()
            .unwrap_or(ElevateResult::Elevated)
    }

    async fn run_passthrough(&self, serial: &str, args: &str) -> Result<PassthroughOutput> {
        self.record(BridgeCall::Passthrough {
            serial: serial.to_string(),
            args: args.to_string(),
        });
        if let Some(delay) = self.passthrough_delay {
            tokio::time::sleep(delay).await;
        }
        let failed = self.failing_passthrough.iter().any(|n| args.contains(n.as_str()));
        Ok(PassthroughOutput {
            code: Some(if failed { 1 } else { 0 }),
            output: format!("{}\n", args),
        })
    }
}
