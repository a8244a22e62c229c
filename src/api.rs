use tracing::info;

use crate::adapters::Pkcs11Module;
use crate::context::Harness;
use crate::error::{ModuleError, ProbeResult};
use crate::ports::TokenModule;
use crate::use_cases::enumerate::describe_object;
use crate::use_cases::sign_verify::first_object;
use crate::use_cases::{
    enumerate, round_trip, run_pass, verify, BootstrapReport, ClassPass, DumpRecord, DumpTarget,
    ObjectReport, ObjectWalk, RoundTrip, SessionConfig, Verdict,
};

pub use crate::model::*;
pub use crate::ports::CredentialSource;

/// What to sign and with which key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    /// Signing key; the first private key on the token when `None`
    pub key: Option<ObjectHandle>,
    pub mechanism: MechanismType,
    pub message: Vec<u8>,
}

/// A detached signature to check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    /// Verification key; the first public key on the token when `None`
    pub key: Option<ObjectHandle>,
    pub mechanism: MechanismType,
    pub data: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Load the module at `path` and initialize it
pub fn open_module(path: &str) -> ProbeResult<Harness<Pkcs11Module>> {
    let module = Pkcs11Module::load(path)?;
    info!("Loaded module {}", path);
    Harness::initialize(module)
}

/// Open the run's session on `harness`, logging in as configured
pub fn open_session<M, C>(
    harness: &mut Harness<M>,
    config: &SessionConfig,
    credentials: &mut C,
) -> ProbeResult<BootstrapReport>
where
    M: TokenModule,
    C: CredentialSource + ?Sized,
{
    crate::use_cases::bootstrap(harness, config, credentials)
}

fn active_session<M: TokenModule>(harness: &Harness<M>) -> ProbeResult<Session> {
    harness.session().copied().ok_or_else(|| {
        ModuleError::Call {
            operation: "C_OpenSession",
            status: Status::SESSION_HANDLE_INVALID,
        }
        .into()
    })
}

/// Report every object (or every object of `class`), one at a time
///
/// Returns how many objects were reported. A failing page stops the walk;
/// the find operation is finalized either way.
pub fn report_objects<M, F>(
    harness: &mut Harness<M>,
    class: Option<ObjectClass>,
    report: F,
) -> ProbeResult<usize>
where
    M: TokenModule,
    F: FnMut(&ObjectReport),
{
    let session = active_session(harness)?;
    let walk = enumerate(harness.module_mut(), session.handle, class)?;
    drain(walk, report)
}

/// Report the objects matched by one of the narrow class passes
pub fn report_pass<M, F>(
    harness: &mut Harness<M>,
    pass: &ClassPass,
    report: F,
) -> ProbeResult<usize>
where
    M: TokenModule,
    F: FnMut(&ObjectReport),
{
    let session = active_session(harness)?;
    let walk = run_pass(harness.module_mut(), session.handle, pass)?;
    drain(walk, report)
}

fn drain<M, F>(mut walk: ObjectWalk<'_, M>, mut report: F) -> ProbeResult<usize>
where
    M: TokenModule,
    F: FnMut(&ObjectReport),
{
    let mut count = 0;
    for object in walk.by_ref() {
        report(&object?);
        count += 1;
    }
    walk.finish()?;
    Ok(count)
}

/// Report a single object chosen by handle
pub fn report_object<M: TokenModule>(
    harness: &mut Harness<M>,
    object: ObjectHandle,
) -> ProbeResult<ObjectReport> {
    let session = active_session(harness)?;
    Ok(describe_object(harness.module_mut(), session.handle, 0, object))
}

pub fn dump_attributes<M: TokenModule>(
    harness: &mut Harness<M>,
    target: &DumpTarget,
) -> ProbeResult<Vec<DumpRecord>> {
    let session = active_session(harness)?;
    crate::use_cases::dump(harness.module_mut(), &session, target)
}

/// Sign the request's message and verify it with the paired public key
pub fn sign_and_verify<M: TokenModule>(
    harness: &mut Harness<M>,
    request: &SignRequest,
) -> ProbeResult<RoundTrip> {
    let session = active_session(harness)?;
    let module = harness.module_mut();
    let key = match request.key {
        Some(key) => key,
        None => first_object(module, session.handle, ObjectClass::PrivateKey)?,
    };
    round_trip(
        module,
        session.handle,
        request.mechanism,
        key,
        &request.message,
    )
}

/// Check a detached signature
pub fn verify_signature<M: TokenModule>(
    harness: &mut Harness<M>,
    request: &VerifyRequest,
) -> ProbeResult<Verdict> {
    let session = active_session(harness)?;
    let module = harness.module_mut();
    let key = match request.key {
        Some(key) => key,
        None => first_object(module, session.handle, ObjectClass::PublicKey)?,
    };
    verify(
        module,
        session.handle,
        request.mechanism,
        key,
        &request.data,
        &request.signature,
    )
}
