//! Command script and allow-list files
//!
//! Both files are plain UTF-8 text with one entry per line. Lines starting
//! with `#` are comments and blank lines are ignored.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::placeholders;

/// Errors that can occur while reading script files
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read every meaningful line of `path`
pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>, ScriptError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(meaningful_lines(&text))
}

/// Like [`read_lines`], but a missing file yields `None`
pub fn read_optional_lines(path: impl AsRef<Path>) -> Result<Option<Vec<String>>, ScriptError> {
    match read_lines(path) {
        Ok(lines) => Ok(Some(lines)),
        Err(ScriptError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Strip comments and blank lines from file contents
pub fn meaningful_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::trim_end)
        .filter(|line| !line.trim_start().is_empty())
        .map(str::to_string)
        .collect()
}

/// How a worker interprets a command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Attach a network device
    Connect,
    /// Detach a network device
    Disconnect,
    /// Restart the device daemon with root privileges
    Root,
    /// Forwarded verbatim to the bridge tool
    Passthrough,
}

/// One line of the command script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    text: String,
}

impl CommandLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Classify by first whitespace-delimited token
    pub fn kind(&self) -> CommandKind {
        match self.text.split_whitespace().next() {
            Some("connect") => CommandKind::Connect,
            Some("disconnect") => CommandKind::Disconnect,
            Some("root") => CommandKind::Root,
            _ => CommandKind::Passthrough,
        }
    }

    /// True if the line references the per-device output directory
    pub fn uses_output_dir(&self) -> bool {
        self.text.contains(placeholders::OUTPUT_DEVICE)
    }

    /// Substitute placeholders for one device
    pub fn expand(&self, serial: &str, output_dir: &str) -> CommandLine {
        let text = self
            .text
            .replace(placeholders::DEVICE, serial)
            .replace(placeholders::OUTPUT_DEVICE, output_dir);
        CommandLine { text }
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for CommandLine {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for CommandLine {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
