//! Attribute probe use case
//!
//! Reads attributes of one object with the two-phase size negotiation:
//! a length query with no buffer, then a read into a buffer of exactly the
//! reported length. Probing is best effort; every identity is attempted and
//! failures are recorded next to the values that did come back.

use std::fmt;

use tracing::{debug, warn};

use crate::error::{ModuleError, ProbeResult};
use crate::logic::codec::{self, AttributeDescriptor};
use crate::model::{AttributeType, ObjectHandle, SessionHandle, Status, Ulong};
use crate::ports::{TokenModule, ValueLength};

/// What the module produced for one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Phase 2 succeeded; raw bytes and their rendering
    Value { raw: Vec<u8>, rendered: String },
    /// The module marked the value as not existing
    Unavailable,
    /// The length query failed
    QueryFailed(Status),
    /// The length query succeeded but the sized read failed
    FetchFailed(Status),
}

impl ProbeOutcome {
    pub fn failure(&self) -> Option<Status> {
        match self {
            ProbeOutcome::QueryFailed(status) | ProbeOutcome::FetchFailed(status) => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEntry {
    pub descriptor: AttributeDescriptor,
    pub outcome: ProbeOutcome,
}

impl fmt::Display for ProbeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.descriptor.label();
        match &self.outcome {
            ProbeOutcome::Value { rendered, .. } => write!(f, "{}: {}", label, rendered),
            ProbeOutcome::Unavailable => write!(f, "{}: unavailable", label),
            ProbeOutcome::QueryFailed(status) => {
                write!(f, "{}: C_GetAttributeValue returned {}", label, status)
            }
            ProbeOutcome::FetchFailed(status) => write!(
                f,
                "{}: second call to C_GetAttributeValue returned {}",
                label, status
            ),
        }
    }
}

/// Rendered attributes of one object, in the order they were requested
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub entries: Vec<ProbeEntry>,
    /// Raw value of the identity named for extraction, when it came back
    /// exactly one native integer wide
    pub extracted: Option<Ulong>,
}

impl ProbeReport {
    /// First failure among the probed identities
    pub fn first_failure(&self) -> Option<Status> {
        self.entries.iter().find_map(|entry| entry.outcome.failure())
    }

    pub fn entry(&self, attribute: AttributeType) -> Option<&ProbeEntry> {
        self.entries
            .iter()
            .find(|entry| entry.descriptor.attribute == attribute)
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

/// Result of the size negotiation for one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Negotiated {
    Value(Vec<u8>),
    Unavailable,
    QueryFailed(Status),
    FetchFailed(Status),
}

pub(crate) fn negotiate<M: TokenModule>(
    module: &mut M,
    session: SessionHandle,
    object: ObjectHandle,
    attribute: AttributeType,
) -> Negotiated {
    let reply = module.get_attribute_value(session, object, attribute, None);
    let length = match (reply.status, reply.length) {
        (Status::OK | Status::BUFFER_TOO_SMALL, ValueLength::Unavailable) => {
            return Negotiated::Unavailable;
        }
        (Status::OK | Status::BUFFER_TOO_SMALL, ValueLength::Bytes(length)) => length,
        (status, _) => return Negotiated::QueryFailed(status),
    };
    if length == 0 {
        return Negotiated::Value(Vec::new());
    }

    let mut buffer = vec![0u8; length];
    let reply = module.get_attribute_value(session, object, attribute, Some(&mut buffer));
    if !reply.status.is_ok() {
        return Negotiated::FetchFailed(reply.status);
    }
    match reply.length {
        ValueLength::Unavailable => Negotiated::Unavailable,
        ValueLength::Bytes(written) => {
            buffer.truncate(written.min(length));
            Negotiated::Value(buffer)
        }
    }
}

/// Probe `identities` on `object` in order
///
/// When `extract` names an identity, its raw value is copied out if it is
/// exactly `CK_ULONG` wide; only the first such match counts.
pub fn probe<M: TokenModule>(
    module: &mut M,
    session: SessionHandle,
    object: ObjectHandle,
    identities: &[AttributeType],
    extract: Option<AttributeType>,
) -> ProbeReport {
    let mut report = ProbeReport::default();

    for &attribute in identities {
        let descriptor = codec::lookup_or_generic(attribute);
        let outcome = match negotiate(module, session, object, attribute) {
            Negotiated::Value(raw) => {
                if report.extracted.is_none() && extract == Some(attribute) {
                    report.extracted = codec::read_ulong(&raw).ok();
                }
                let rendered = descriptor.render(&raw);
                ProbeOutcome::Value { raw, rendered }
            }
            Negotiated::Unavailable => ProbeOutcome::Unavailable,
            Negotiated::QueryFailed(status) => {
                warn!("Querying {} on object {} failed: {}", attribute, object, status);
                ProbeOutcome::QueryFailed(status)
            }
            Negotiated::FetchFailed(status) => {
                warn!("Reading {} on object {} failed: {}", attribute, object, status);
                ProbeOutcome::FetchFailed(status)
            }
        };
        report.entries.push(ProbeEntry {
            descriptor,
            outcome,
        });
    }

    debug!(
        "Probed {} attributes on object {}",
        report.entries.len(),
        object
    );
    report
}

/// Fetch one raw value, failing on any module error
///
/// Returns `None` for a value the module marks unavailable.
pub fn fetch_value<M: TokenModule>(
    module: &mut M,
    session: SessionHandle,
    object: ObjectHandle,
    attribute: AttributeType,
) -> ProbeResult<Option<Vec<u8>>> {
    match negotiate(module, session, object, attribute) {
        Negotiated::Value(raw) => Ok(Some(raw)),
        Negotiated::Unavailable => Ok(None),
        Negotiated::QueryFailed(status) => Err(ModuleError::Call {
            operation: "C_GetAttributeValue",
            status,
        }
        .into()),
        Negotiated::FetchFailed(status) => Err(ModuleError::Call {
            operation: "C_GetAttributeValue (sized read)",
            status,
        }
        .into()),
    }
}
