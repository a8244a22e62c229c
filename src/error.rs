//! Error types for p11probe
//!
//! Errors are organized hierarchically and use thiserror for implementation.
//! Module call failures always carry the module's [`Status`], which renders
//! as its symbolic name.
//!
//! Shape errors (a value whose length does not fit its type) are not part of
//! this hierarchy: they are rendering outcomes reported inside probe results.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{AttributeType, ObjectClass, Status};

/// Result type alias for p11probe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Top-level error type for all p11probe operations
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Loading or calling the module failed
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// Public/private key pairing by identifier failed
    #[error("Key pairing error: {0}")]
    Pairing(#[from] PairingError),

    /// Signature production failed outside the module's own checks
    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    /// PIN acquisition failed
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Input validation errors
    #[error("Domain validation error: {0}")]
    Domain(#[from] DomainError),

    /// Writing an attribute dump failed
    #[error("Unable to write {path:?}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failures reported by, or about, the loaded module
#[derive(Error, Debug)]
pub enum ModuleError {
    /// The shared module could not be opened or has no function table
    #[error("Failed to load module {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// An entry point returned something other than CKR_OK
    #[error("{operation} failed (rv = {status})")]
    Call {
        operation: &'static str,
        status: Status,
    },

    /// Slot discovery returned nothing
    #[error("No slots found")]
    NoSlots,

    /// A find walk over a class produced no object to work with
    #[error("No {class} object found")]
    NoObject { class: ObjectClass },

    /// A value needed verbatim is marked unavailable by the module
    #[error("{attribute} is unavailable on object {object}")]
    ValueUnavailable {
        attribute: AttributeType,
        object: String,
    },
}

impl ModuleError {
    /// Module status behind this error, if the module produced one
    pub fn status(&self) -> Option<Status> {
        match self {
            ModuleError::Call { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Ambiguity while pairing a private key with its public counterpart
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairingError {
    /// No public key carries the identifier
    #[error("No public key found with key identifier {key_id}")]
    NoMatch { key_id: String },

    /// More than one public key carries the identifier
    #[error("{count} public keys share key identifier {key_id}")]
    Ambiguous { key_id: String, count: usize },

    /// The private key has no readable identifier to pair on
    #[error("Key identifier of object {object} is unavailable")]
    MissingIdentifier { object: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// The fixed output buffer cannot hold the signature
    #[error("Signature does not fit the {capacity}-byte output buffer")]
    OutputTooSmall { capacity: usize },
}

#[derive(Error, Debug)]
pub enum CredentialError {
    /// Standard input is not a terminal, echo cannot be controlled
    #[error("Standard input is not a terminal")]
    NotATerminal,

    /// Reading or restoring the terminal failed
    #[error("Terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The user pressed Control-C at the prompt
    #[error("PIN entry interrupted")]
    Interrupted,

    /// Echo suppression is not available on this platform
    #[error("PIN prompting is not supported on this platform")]
    Unsupported,
}

/// Input validation errors
#[derive(Error, Debug)]
pub enum DomainError {
    /// PIN validation error
    #[error("PIN validation error: {0}")]
    Pin(#[from] crate::model::PinError),

    /// A name or number did not match any known identifier
    #[error("Unknown {kind}: {input}")]
    UnknownName { kind: &'static str, input: String },

    /// Output filename template is malformed
    #[error("Invalid filename template {template:?}: {reason}")]
    Template { template: String, reason: String },
}

/// Convert model errors to ProbeError (via DomainError)
impl From<crate::model::PinError> for ProbeError {
    fn from(err: crate::model::PinError) -> Self {
        ProbeError::Domain(DomainError::Pin(err))
    }
}

impl ProbeError {
    /// Module status behind this error, if any
    pub fn status(&self) -> Option<Status> {
        match self {
            ProbeError::Module(err) => err.status(),
            _ => None,
        }
    }
}
