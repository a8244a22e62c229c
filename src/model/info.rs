//! Module, slot, token, session and mechanism information records
//!
//! Text fields arrive from the module as fixed-width, space-padded buffers.
//! Adapters clean them up before building these records.

use std::fmt;

use super::{SlotId, Ulong};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// General information about the loaded module
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleInfo {
    pub cryptoki_version: Version,
    pub manufacturer: String,
    pub flags: Ulong,
    pub description: String,
    pub library_version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlotInfo {
    pub description: String,
    pub manufacturer: String,
    pub flags: Ulong,
    pub hardware_version: Version,
    pub firmware_version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenInfo {
    pub label: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub flags: Ulong,
    pub max_session_count: Ulong,
    pub session_count: Ulong,
    pub max_rw_session_count: Ulong,
    pub rw_session_count: Ulong,
    pub max_pin_len: Ulong,
    pub min_pin_len: Ulong,
    pub total_public_memory: Ulong,
    pub free_public_memory: Ulong,
    pub total_private_memory: Ulong,
    pub free_private_memory: Ulong,
    pub hardware_version: Version,
    pub firmware_version: Version,
    pub utc_time: String,
}

impl TokenInfo {
    /// The token has its own PIN pad; the host must not prompt for a PIN
    pub fn has_protected_authentication_path(&self) -> bool {
        self.flags & cryptoki_sys::CKF_PROTECTED_AUTHENTICATION_PATH != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub slot: SlotId,
    pub state: Ulong,
    pub flags: Ulong,
    pub device_error: Ulong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MechanismInfo {
    pub min_key_size: Ulong,
    pub max_key_size: Ulong,
    pub flags: Ulong,
}
