//! Parser for the bridge tool's `devices -l` listing
//!
//! Each attached device is reported on one line:
//! ```text
//! <serial> <state> [usb:<path>] product:<p> model:<m> device:<d> [transport_id:<n>]
//! ```
//!
//! Lines that cannot be understood abort the whole run: commanding a
//! partially-understood fleet is unsafe.

use thiserror::Error;

use crate::markers;

/// Errors that can occur while parsing a device listing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    #[error("{line} not support")]
    UnsupportedLine { line: String },

    #[error("key {key} not found in {token}")]
    KeyMismatch { key: &'static str, token: String },
}

/// A device reported by the bridge tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Full serial, unique within one listing
    pub serial: String,
    /// Serial without its `:port` suffix
    pub serial_short: String,
    /// USB path, empty for network-attached devices
    pub usb: String,
    pub product: String,
    pub model: String,
    pub device: String,
    /// Transport id, empty when the bridge does not report one
    pub transport_id: String,
}

impl DeviceIdentity {
    /// Build an identity for `serial` with every optional field empty
    pub fn new(serial: impl Into<String>) -> Self {
        let serial = serial.into();
        Self {
            serial_short: short_serial(&serial).to_string(),
            serial,
            usb: String::new(),
            product: String::new(),
            model: String::new(),
            device: String::new(),
            transport_id: String::new(),
        }
    }

    /// Attach a USB path
    pub fn with_usb(mut self, usb: impl Into<String>) -> Self {
        self.usb = usb.into();
        self
    }

    /// True for USB-attached devices and emulators, which reconnect on
    /// their own and must never be disconnected explicitly
    pub fn auto_reconnect(&self) -> bool {
        !self.usb.is_empty() || self.serial.starts_with(markers::EMULATOR_PREFIX)
    }
}

/// Portion of a serial before its `:port` suffix
pub fn short_serial(serial: &str) -> &str {
    match serial.find(':') {
        Some(pos) => serial[..pos].trim(),
        None => serial,
    }
}

/// Parse a full listing, skipping headers, blank lines and offline devices
pub fn parse_listing<I, S>(lines: I) -> Result<Vec<DeviceIdentity>, ListingError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut devices = Vec::new();
    for line in lines {
        if let Some(identity) = parse_line(line.as_ref())? {
            devices.push(identity);
        }
    }
    Ok(devices)
}

/// Parse one listing line
///
/// Returns `Ok(None)` for lines that carry no actionable device.
pub fn parse_line(line: &str) -> Result<Option<DeviceIdentity>, ListingError> {
    let line = line.trim();
    if line.is_empty()
        || line.starts_with(markers::LISTING_HEADER)
        || line.starts_with(markers::DAEMON_STATUS)
    {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    let serial = fields[0];

    let (usb, rest, transport_id) = match fields.len() {
        // serial state usb product model device transport_id
        7 => (key_value(fields[2], "usb")?, &fields[3..6], Some(fields[6])),
        // serial state product model device transport_id
        6 => ("", &fields[2..5], Some(fields[5])),
        // serial state product model device
        5 => ("", &fields[2..5], None),
        _ => {
            if fields.get(1) == Some(&markers::OFFLINE) {
                return Ok(None);
            }
            return Err(ListingError::UnsupportedLine {
                line: line.to_string(),
            });
        }
    };

    let transport_id = match transport_id {
        Some(token) => key_value(token, "transport_id")?,
        None => "",
    };

    Ok(Some(DeviceIdentity {
        serial: serial.to_string(),
        serial_short: short_serial(serial).to_string(),
        usb: usb.to_string(),
        product: key_value(rest[0], "product")?.to_string(),
        model: key_value(rest[1], "model")?.to_string(),
        device: key_value(rest[2], "device")?.to_string(),
        transport_id: transport_id.to_string(),
    }))
}

fn key_value<'a>(token: &'a str, key: &'static str) -> Result<&'a str, ListingError> {
    token
        .strip_prefix(key)
        .and_then(|rest| rest.strip_prefix(':'))
        .ok_or_else(|| ListingError::KeyMismatch {
            key,
            token: token.to_string(),
        })
}
