//! Sign/verify use case
//!
//! Signs with a private key, finds the public key carrying the same
//! `CKA_ID` and verifies with it. Everything here is fail-fast.

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::{ModuleError, PairingError, ProbeError, ProbeResult, SignatureError};
use crate::model::{
    Attribute, AttributeType, MechanismType, ObjectClass, ObjectHandle, SessionHandle, Status,
};
use crate::ports::TokenModule;
use crate::use_cases::enumerate::{FindWalk, PAGE_CAPACITY};
use crate::use_cases::probe::fetch_value;

/// Capacity of the signature output buffer
pub const MAX_SIGNATURE_LEN: usize = 1024;

/// What the module said about a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Good,
    /// The module rejected the signature with this status
    Rejected(Status),
}

impl Verdict {
    pub fn is_good(&self) -> bool {
        matches!(self, Verdict::Good)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Good => f.write_str("good"),
            Verdict::Rejected(status) => write!(f, "rejected ({})", status),
        }
    }
}

/// Outcome of signing and verifying against the paired public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTrip {
    pub signature: Vec<u8>,
    pub public_key: ObjectHandle,
    pub verdict: Verdict,
}

/// Sign `message` with `key`
///
/// A signature longer than [`MAX_SIGNATURE_LEN`] is reported as
/// [`SignatureError::OutputTooSmall`], not as a module rejection.
pub fn sign<M: TokenModule>(
    module: &mut M,
    session: SessionHandle,
    mechanism: MechanismType,
    key: ObjectHandle,
    message: &[u8],
) -> ProbeResult<Vec<u8>> {
    module.sign_init(session, mechanism, key)?;
    let signature = module
        .sign(session, message, MAX_SIGNATURE_LEN)
        .map_err(|err| match err.status() {
            Some(Status::BUFFER_TOO_SMALL) => SignatureError::OutputTooSmall {
                capacity: MAX_SIGNATURE_LEN,
            }
            .into(),
            _ => err,
        })?;
    debug!(
        "Signed {} bytes with {} into {} bytes",
        message.len(),
        mechanism,
        signature.len()
    );
    Ok(signature)
}

/// Verify `signature` over `message` with `key`
///
/// Returns [`Verdict::Rejected`] when the module rejects the signature
/// itself; any other module failure is an error.
pub fn verify<M: TokenModule>(
    module: &mut M,
    session: SessionHandle,
    mechanism: MechanismType,
    key: ObjectHandle,
    message: &[u8],
    signature: &[u8],
) -> ProbeResult<Verdict> {
    module.verify_init(session, mechanism, key)?;
    match module.verify(session, message, signature) {
        Ok(()) => Ok(Verdict::Good),
        Err(err) => match err.status() {
            Some(status @ (Status::SIGNATURE_INVALID | Status::SIGNATURE_LEN_RANGE)) => {
                warn!("Signature rejected by key {}: {}", key, err);
                Ok(Verdict::Rejected(status))
            }
            _ => Err(err),
        },
    }
}

/// Find the single public key whose `CKA_ID` equals that of `private_key`
pub fn find_public_counterpart<M: TokenModule>(
    module: &mut M,
    session: SessionHandle,
    private_key: ObjectHandle,
) -> ProbeResult<ObjectHandle> {
    let key_id = fetch_value(module, session, private_key, AttributeType::ID)?.ok_or_else(|| {
        PairingError::MissingIdentifier {
            object: private_key.to_string(),
        }
    })?;

    let template = [
        Attribute::id(&key_id),
        Attribute::class(ObjectClass::PublicKey),
    ];
    let mut walk = FindWalk::start(module, session, &template, PAGE_CAPACITY)?;
    let matches = walk.by_ref().collect::<ProbeResult<Vec<_>>>()?;
    walk.finish()?;

    match matches.as_slice() {
        [public_key] => {
            debug!("Object {} pairs with public key {}", private_key, public_key);
            Ok(*public_key)
        }
        [] => Err(PairingError::NoMatch {
            key_id: hex::encode(&key_id),
        }
        .into()),
        more => Err(PairingError::Ambiguous {
            key_id: hex::encode(&key_id),
            count: more.len(),
        }
        .into()),
    }
}

/// First object of `class` on the token
pub fn first_object<M: TokenModule>(
    module: &mut M,
    session: SessionHandle,
    class: ObjectClass,
) -> ProbeResult<ObjectHandle> {
    let mut walk = FindWalk::of_class(module, session, Some(class))?;
    let first = walk.next().transpose()?;
    walk.finish()?;
    first.ok_or_else(|| ModuleError::NoObject { class }.into())
}

/// Sign with `private_key`, then verify with its paired public key
pub fn round_trip<M: TokenModule>(
    module: &mut M,
    session: SessionHandle,
    mechanism: MechanismType,
    private_key: ObjectHandle,
    message: &[u8],
) -> ProbeResult<RoundTrip> {
    let signature = sign(module, session, mechanism, private_key, message)?;
    let public_key = find_public_counterpart(module, session, private_key)?;
    let verdict = verify(module, session, mechanism, public_key, message, &signature)?;
    info!(
        "Round trip with key {} and public key {}: {}",
        private_key, public_key, verdict
    );
    Ok(RoundTrip {
        signature,
        public_key,
        verdict,
    })
}

/// Pairing failures are never module failures
pub fn is_pairing_failure(err: &ProbeError) -> bool {
    matches!(err, ProbeError::Pairing(_))
}
