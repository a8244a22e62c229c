//! TokenModule trait - the module's function table as a capability set

use crate::error::ProbeResult;
use crate::model::{
    Attribute, AttributeType, MechanismInfo, MechanismType, ModuleInfo, ObjectHandle, Pin,
    SessionHandle, SessionInfo, SlotId, SlotInfo, Status, TokenInfo,
};

/// Length the module reported alongside an attribute query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueLength {
    /// Size of the value in bytes
    Bytes(usize),
    /// The module marked the value as not existing for this object
    Unavailable,
}

/// Raw outcome of one `C_GetAttributeValue` call
///
/// Kept unparsed because the size negotiation has to act on statuses
/// (`CKR_BUFFER_TOO_SMALL`) that are not failures in that context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeReply {
    pub status: Status,
    pub length: ValueLength,
}

impl AttributeReply {
    pub fn new(status: Status, length: ValueLength) -> Self {
        Self { status, length }
    }
}

/// Entry points of a loaded module
///
/// One implementation wraps a real shared library, the test implementation
/// keeps tokens in memory. Every method is a single blocking call into the
/// module; a non-OK status comes back as [`ModuleError::Call`] naming the
/// entry point, except for attribute queries which return the raw reply.
///
/// A missing entry point must be reported as `CKR_FUNCTION_NOT_SUPPORTED`.
///
/// [`ModuleError::Call`]: crate::error::ModuleError::Call
pub trait TokenModule {
    fn initialize(&mut self) -> ProbeResult<()>;

    fn finalize(&mut self) -> ProbeResult<()>;

    fn info(&mut self) -> ProbeResult<ModuleInfo>;

    /// Slots known to the module, only those holding a token when
    /// `require_token` is set
    fn slot_list(&mut self, require_token: bool) -> ProbeResult<Vec<SlotId>>;

    fn slot_info(&mut self, slot: SlotId) -> ProbeResult<SlotInfo>;

    fn token_info(&mut self, slot: SlotId) -> ProbeResult<TokenInfo>;

    fn mechanism_list(&mut self, slot: SlotId) -> ProbeResult<Vec<MechanismType>>;

    fn mechanism_info(&mut self, slot: SlotId, mechanism: MechanismType)
        -> ProbeResult<MechanismInfo>;

    /// Open a read-only serial session
    fn open_session(&mut self, slot: SlotId) -> ProbeResult<SessionHandle>;

    fn session_info(&mut self, session: SessionHandle) -> ProbeResult<SessionInfo>;

    fn close_session(&mut self, session: SessionHandle) -> ProbeResult<()>;

    /// Log in as the normal user; `None` lets the token collect the PIN on
    /// its protected authentication path
    fn login(&mut self, session: SessionHandle, pin: Option<&Pin>) -> ProbeResult<()>;

    fn logout(&mut self, session: SessionHandle) -> ProbeResult<()>;

    /// Query one attribute
    ///
    /// With `buffer == None` only the length is requested. With a buffer the
    /// module copies the value into it and reports the length it wrote.
    fn get_attribute_value(
        &mut self,
        session: SessionHandle,
        object: ObjectHandle,
        attribute: AttributeType,
        buffer: Option<&mut [u8]>,
    ) -> AttributeReply;

    /// Start a find operation matching every attribute of `template`
    fn find_objects_init(&mut self, session: SessionHandle, template: &[Attribute])
        -> ProbeResult<()>;

    /// Next page of at most `capacity` handles; an empty page means done
    fn find_objects(
        &mut self,
        session: SessionHandle,
        capacity: usize,
    ) -> ProbeResult<Vec<ObjectHandle>>;

    fn find_objects_final(&mut self, session: SessionHandle) -> ProbeResult<()>;

    fn sign_init(
        &mut self,
        session: SessionHandle,
        mechanism: MechanismType,
        key: ObjectHandle,
    ) -> ProbeResult<()>;

    /// Sign into an output buffer of `capacity` bytes
    ///
    /// A signature that does not fit fails with `CKR_BUFFER_TOO_SMALL`.
    fn sign(&mut self, session: SessionHandle, data: &[u8], capacity: usize)
        -> ProbeResult<Vec<u8>>;

    fn verify_init(
        &mut self,
        session: SessionHandle,
        mechanism: MechanismType,
        key: ObjectHandle,
    ) -> ProbeResult<()>;

    fn verify(&mut self, session: SessionHandle, data: &[u8], signature: &[u8])
        -> ProbeResult<()>;
}
