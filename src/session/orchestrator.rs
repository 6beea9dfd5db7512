//! Two-phase fleet run: connect, then broadcast and drain

use crate::bridge::Bridge;
use crate::config::FleetConfig;
use crate::fleet::FleetRegistry;
use anyhow::{Context, Result};
use fleet_shared::{read_lines, read_optional_lines};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Devices the script was broadcast to
    pub devices: usize,
    /// Script lines broadcast
    pub commands: usize,
}

/// Drives one run of the command script across the fleet
pub struct SessionOrchestrator {
    config: FleetConfig,
    bridge: Arc<dyn Bridge>,
}

impl SessionOrchestrator {
    pub fn new(config: FleetConfig, bridge: Arc<dyn Bridge>) -> Self {
        Self { config, bridge }
    }

    /// Run both phases
    pub async fn run(&self) -> Result<RunSummary> {
        // read up front so a missing script does not leave devices connected
        let script = read_lines(&self.config.script)
            .with_context(|| format!("cannot load command script {}", self.config.script.display()))?;

        let mut fleet = self.connect_phase().await?;
        self.execute_phase(&mut fleet, &script).await
    }

    /// Connect allow-listed devices that are not attached yet
    ///
    /// Best effort: unreachable devices are logged and skipped. Returns a
    /// freshly discovered registry.
    pub async fn connect_phase(&self) -> Result<FleetRegistry> {
        let fleet = self.discover().await?;

        let Some(serials) = read_optional_lines(&self.config.allow_list)? else {
            debug!(
                "[SESSION] no allow-list at {}, skipping connect phase",
                self.config.allow_list.display()
            );
            return Ok(fleet);
        };

        for serial in &serials {
            if fleet.contains(serial) {
                debug!("[SESSION] {} already attached", serial);
                continue;
            }
            if self.bridge.connect(serial).await {
                info!("[SESSION] connected to {}", serial);
            } else {
                warn!("[SESSION] could not connect to {}", serial);
            }
        }

        self.discover().await
    }

    /// Broadcast every script line, then drain and stop all workers
    pub async fn execute_phase(
        &self,
        fleet: &mut FleetRegistry,
        script: &[String],
    ) -> Result<RunSummary> {
        if fleet.is_empty() {
            warn!("[SESSION] no devices attached");
        }

        for line in script {
            fleet.broadcast(line);
        }
        fleet.stop_all();
        fleet.wait_all_stopped().await?;

        let summary = RunSummary {
            devices: fleet.len(),
            commands: script.len(),
        };
        info!(
            "[SESSION] ran {} command(s) on {} device(s)",
            summary.commands, summary.devices
        );
        Ok(summary)
    }

    async fn discover(&self) -> Result<FleetRegistry> {
        let mut fleet = FleetRegistry::new(self.bridge.clone(), self.config.output_root.clone());
        fleet.discover().await?;
        Ok(fleet)
    }
}
