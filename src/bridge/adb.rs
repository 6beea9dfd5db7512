//! `adb` implementation of the device bridge

use crate::bridge::traits::{Bridge, ElevateResult, PassthroughOutput};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use fleet_shared::markers;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Bridge backed by a path-resolved `adb` executable
#[derive(Debug, Clone)]
pub struct AdbBridge {
    program: PathBuf,
}

impl AdbBridge {
    /// Resolve `program` on `PATH`
    pub fn locate(program: &str) -> Result<Self> {
        let program = which::which(program)
            .map_err(|e| anyhow!("{} path not found: {}", program, e))?;
        Ok(Self { program })
    }

    /// Path of the resolved executable
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the bridge and collect its non-empty stdout lines
    async fn stdout_lines(&self, args: &[&str]) -> Result<Vec<String>> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to run {}", self.program.display()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("bridge stdout not captured"))?;

        let mut reader = BufReader::new(stdout).lines();
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().await? {
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }

        child.wait().await?;
        Ok(lines)
    }

    /// Shell command line for a passthrough invocation
    fn passthrough_script(&self, serial: &str, args: &str) -> String {
        format!("\"{}\" -s {} {}", self.program.display(), serial, args)
    }
}

#[async_trait]
impl Bridge for AdbBridge {
    async fn connect(&self, serial: &str) -> bool {
        match self.stdout_lines(&["connect", serial]).await {
            Ok(lines) => {
                debug!("[{}] connect: {:?}", serial, lines);
                connect_succeeded(&lines)
            }
            Err(e) => {
                warn!("[{}] connect: {:#}", serial, e);
                false
            }
        }
    }

    async fn disconnect(&self, serial: &str) -> bool {
        match self.stdout_lines(&["disconnect", serial]).await {
            Ok(lines) => {
                debug!("[{}] disconnect: {:?}", serial, lines);
                disconnect_succeeded(&lines)
            }
            Err(e) => {
                warn!("[{}] disconnect: {:#}", serial, e);
                false
            }
        }
    }

    async fn list_devices(&self) -> Result<Vec<String>> {
        self.stdout_lines(&["devices", "-l"]).await
    }

    async fn elevate(&self, serial: &str) -> ElevateResult {
        match self.stdout_lines(&["-s", serial, "root"]).await {
            Ok(lines) => {
                debug!("[{}] root: {:?}", serial, lines);
                classify_elevation(&lines)
            }
            Err(e) => {
                warn!("[{}] root: {:#}", serial, e);
                ElevateResult::Failed
            }
        }
    }

    async fn run_passthrough(&self, serial: &str, args: &str) -> Result<PassthroughOutput> {
        let script = self.passthrough_script(serial, args);

        #[cfg(windows)]
        let mut command = {
            let mut command = Command::new("cmd");
            command.arg("/C").arg(&script);
            command
        };
        #[cfg(not(windows))]
        let mut command = {
            let mut command = Command::new("sh");
            command.arg("-c").arg(&script);
            command
        };

        let output = command
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", script))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(PassthroughOutput {
            code: output.status.code(),
            output: combined,
        })
    }
}

/// `connect` succeeded if the bridge reported the device attached
pub fn connect_succeeded(lines: &[String]) -> bool {
    lines.iter().any(|line| {
        line.starts_with(markers::CONNECTED) || line.starts_with(markers::ALREADY_CONNECTED)
    })
}

/// `disconnect` succeeded if the bridge reported the device detached
pub fn disconnect_succeeded(lines: &[String]) -> bool {
    lines.iter().any(|line| line.starts_with(markers::DISCONNECTED))
}

/// Any line other than the exact "already root" message means the daemon
/// restarted and the connection must be treated as reset.
pub fn classify_elevation(lines: &[String]) -> ElevateResult {
    let mut result = ElevateResult::Failed;
    for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        if line != markers::ALREADY_ROOT {
            return ElevateResult::Elevated;
        }
        result = ElevateResult::AlreadyRoot;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_connect_classification() {
        assert!(connect_succeeded(&lines(&["connected to 10.0.0.7:5555"])));
        assert!(connect_succeeded(&lines(&["already connected to 10.0.0.7:5555"])));
        assert!(!connect_succeeded(&lines(&[
            "failed to connect to '10.0.0.7:5555': Connection refused"
        ])));
        assert!(!connect_succeeded(&[]));
    }

    #[test]
    fn test_disconnect_classification() {
        assert!(disconnect_succeeded(&lines(&["disconnected 10.0.0.7:5555"])));
        assert!(!disconnect_succeeded(&lines(&["error: no such device '10.0.0.7:5555'"])));
        assert!(!disconnect_succeeded(&[]));
    }

    #[test]
    fn test_elevation_classification() {
        assert_eq!(
            classify_elevation(&lines(&["adbd is already running as root"])),
            ElevateResult::AlreadyRoot
        );
        assert_eq!(
            classify_elevation(&lines(&["restarting adbd as root"])),
            ElevateResult::Elevated
        );
        // error text counts as a restart as well
        assert_eq!(
            classify_elevation(&lines(&["adbd cannot run as root in production builds"])),
            ElevateResult::Elevated
        );
        assert_eq!(classify_elevation(&[]), ElevateResult::Failed);
    }

    #[test]
    fn test_passthrough_script_quotes_program() {
        let bridge = AdbBridge {
            program: PathBuf::from("/opt/android sdk/adb"),
        };
        assert_eq!(
            bridge.passthrough_script("XYZ", "pull /sdcard/a output/XYZ/a"),
            "\"/opt/android sdk/adb\" -s XYZ pull /sdcard/a output/XYZ/a"
        );
    }

    #[test]
    fn test_locate_missing_program() {
        let err = AdbBridge::locate("fleet-adb-no-such-bridge").unwrap_err();
        assert!(err.to_string().contains("path not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_lines_from_real_process() {
        let bridge = AdbBridge::locate("echo").expect("echo on PATH");
        let lines = bridge.stdout_lines(&["connected", "to", "X"]).await.unwrap();
        assert_eq!(lines, ["connected to X"]);
    }

    /// Write an executable shell script standing in for the bridge tool
    #[cfg(unix)]
    fn fake_bridge(dir: &Path, body: &str) -> AdbBridge {
        use std::os::unix::fs::PermissionsExt;

        let program = dir.join("fake adb");
        std::fs::write(&program, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
        AdbBridge { program }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_passthrough_runs_through_shell() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = fake_bridge(
            dir.path(),
            "echo out \"$@\"\necho err >&2\nexit 3\n",
        );

        let result = bridge.run_passthrough("XYZ", "shell ls").await.unwrap();
        assert_eq!(
            result,
            PassthroughOutput {
                code: Some(3),
                output: "out -s XYZ shell ls\nerr\n".into(),
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_elevate_from_real_process() {
        let dir = tempfile::tempdir().unwrap();

        let silent = fake_bridge(dir.path(), "exit 0\n");
        assert_eq!(silent.elevate("XYZ").await, ElevateResult::Failed);

        let root = fake_bridge(dir.path(), "echo 'adbd is already running as root'\n");
        assert_eq!(root.elevate("XYZ").await, ElevateResult::AlreadyRoot);
    }
}
