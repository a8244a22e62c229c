//! In-memory module for tests
//!
//! One slot with a token, a handful of objects addressed by handle, Ed25519
//! keys behind `CKM_EDDSA`, and a call log the tests assert against. Failures
//! can be injected per attribute and per find page.

use std::collections::{BTreeMap, HashMap, HashSet};

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::{rng, RngCore};

use crate::error::{ModuleError, ProbeResult};
use crate::model::{
    Attribute, AttributeType, MechanismInfo, MechanismType, ModuleInfo, ObjectClass,
    ObjectHandle, Pin, SessionHandle, SessionInfo, SlotId, SlotInfo, Status, TokenInfo, Ulong,
    Version,
};
use crate::ports::{AttributeReply, TokenModule, ValueLength};

pub const TOKEN_SLOT: SlotId = SlotId(0);
pub const EMPTY_SLOT: SlotId = SlotId(1);

/// Failure injected into one attribute query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeFailure {
    /// The length query fails
    Query(Status),
    /// The length query succeeds, the sized read fails
    Fetch(Status),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeQuery {
    pub object: ObjectHandle,
    pub attribute: AttributeType,
    /// Size of the caller's buffer, `None` for a length query
    pub buffer: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub capacity: usize,
    pub returned: usize,
}

/// Everything the tests want to count
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub attribute_queries: Vec<AttributeQuery>,
    pub find_inits: Vec<Vec<Attribute>>,
    pub pages: Vec<PageRequest>,
    pub find_finals: usize,
    pub logins: Vec<Option<Vec<u8>>>,
    pub logouts: usize,
    pub closed_sessions: Vec<SessionHandle>,
    pub finalized: usize,
}

impl CallLog {
    pub fn queries_for(&self, object: ObjectHandle) -> Vec<AttributeQuery> {
        self.attribute_queries
            .iter()
            .filter(|query| query.object == object)
            .copied()
            .collect()
    }
}

#[derive(Debug, Clone)]
enum KeyMaterial {
    Private(SigningKey),
    Public(VerifyingKey),
}

#[derive(Debug, Clone)]
struct FakeObject {
    handle: ObjectHandle,
    /// `None` marks a value the module reports as unavailable
    attributes: BTreeMap<AttributeType, Option<Vec<u8>>>,
    key: Option<KeyMaterial>,
}

#[derive(Debug, Clone)]
struct FindState {
    matches: Vec<ObjectHandle>,
    cursor: usize,
    pages: usize,
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Sign(ObjectHandle),
    Verify(ObjectHandle),
}

#[derive(Debug, Clone)]
pub struct FakeToken {
    pub pin: Pin,
    pub token_flags: Ulong,
    pub mechanisms: Vec<(MechanismType, MechanismInfo)>,
    /// `C_GetMechanismInfo` fails for this mechanism
    pub failing_mechanism: Option<MechanismType>,
    /// Produced signatures report this length instead of their own
    pub signature_len: Option<usize>,
    pub log: CallLog,
    objects: Vec<FakeObject>,
    failures: HashMap<(ObjectHandle, AttributeType), AttributeFailure>,
    /// Length queries answered with `CKR_BUFFER_TOO_SMALL` plus the length
    too_small_queries: HashSet<(ObjectHandle, AttributeType)>,
    page_failures: HashMap<usize, Status>,
    final_failure: Option<Status>,
    initialized: bool,
    sessions: HashSet<SessionHandle>,
    next_session: Ulong,
    logged_in: bool,
    find: Option<FindState>,
    operation: Option<Operation>,
}

impl FakeToken {
    pub fn new(pin: Pin) -> Self {
        let flags = cryptoki_sys::CKF_SIGN | cryptoki_sys::CKF_VERIFY;
        Self {
            pin,
            token_flags: cryptoki_sys::CKF_LOGIN_REQUIRED
                | cryptoki_sys::CKF_USER_PIN_INITIALIZED
                | cryptoki_sys::CKF_TOKEN_INITIALIZED,
            mechanisms: vec![
                (
                    MechanismType::EDDSA,
                    MechanismInfo {
                        min_key_size: 255,
                        max_key_size: 255,
                        flags,
                    },
                ),
                (
                    MechanismType::EC_EDWARDS_KEY_PAIR_GEN,
                    MechanismInfo {
                        min_key_size: 255,
                        max_key_size: 255,
                        flags: cryptoki_sys::CKF_GENERATE_KEY_PAIR,
                    },
                ),
            ],
            failing_mechanism: None,
            signature_len: None,
            log: CallLog::default(),
            objects: Vec::new(),
            failures: HashMap::new(),
            too_small_queries: HashSet::new(),
            page_failures: HashMap::new(),
            final_failure: None,
            initialized: false,
            sessions: HashSet::new(),
            next_session: 1,
            logged_in: false,
            find: None,
            operation: None,
        }
    }

    /// Store an object with the given attributes; `None` values read back as
    /// unavailable
    pub fn add_object(
        &mut self,
        attributes: impl IntoIterator<Item = (AttributeType, Option<Vec<u8>>)>,
    ) -> ObjectHandle {
        let handle = ObjectHandle(self.objects.len() as Ulong + 1);
        self.objects.push(FakeObject {
            handle,
            attributes: attributes.into_iter().collect(),
            key: None,
        });
        handle
    }

    pub fn add_data_object(&mut self, application: &str, value: &[u8]) -> ObjectHandle {
        self.add_object([
            class_value(ObjectClass::Data),
            (AttributeType::APPLICATION, Some(application.as_bytes().to_vec())),
            (AttributeType::OBJECT_ID, Some(vec![0x06, 0x03, 0x2A, 0x03, 0x04])),
            (AttributeType::VALUE, Some(value.to_vec())),
        ])
    }

    pub fn add_certificate(&mut self, id: &[u8], subject: &[u8]) -> ObjectHandle {
        self.add_object([
            class_value(ObjectClass::Certificate),
            ulong_value(AttributeType::CERTIFICATE_TYPE, cryptoki_sys::CKC_X_509),
            (AttributeType::ID, Some(id.to_vec())),
            (AttributeType::VALUE, Some(vec![0x30; 412])),
            (AttributeType::SUBJECT, Some(subject.to_vec())),
            (AttributeType::ISSUER, Some(subject.to_vec())),
        ])
    }

    /// Generate an Ed25519 key pair sharing `id`, returns (private, public)
    pub fn add_key_pair(&mut self, id: &[u8]) -> (ObjectHandle, ObjectHandle) {
        let mut secret = [0u8; 32];
        rng().fill_bytes(&mut secret);
        let signing_key = SigningKey::from_bytes(&secret);
        let verifying_key = signing_key.verifying_key();

        let private = self.add_key_object(ObjectClass::PrivateKey, id);
        let public = self.add_key_object(ObjectClass::PublicKey, id);
        self.set_attribute(
            public,
            AttributeType::EC_POINT,
            Some(verifying_key.as_bytes().to_vec()),
        );
        self.set_key(private, KeyMaterial::Private(signing_key));
        self.set_key(public, KeyMaterial::Public(verifying_key));
        (private, public)
    }

    /// Public key object with no private counterpart
    pub fn add_public_key(&mut self, id: &[u8]) -> ObjectHandle {
        let mut secret = [0u8; 32];
        rng().fill_bytes(&mut secret);
        let verifying_key = SigningKey::from_bytes(&secret).verifying_key();
        let public = self.add_key_object(ObjectClass::PublicKey, id);
        self.set_key(public, KeyMaterial::Public(verifying_key));
        public
    }

    fn add_key_object(&mut self, class: ObjectClass, id: &[u8]) -> ObjectHandle {
        let private = class == ObjectClass::PrivateKey;
        self.add_object([
            class_value(class),
            (AttributeType::ID, Some(id.to_vec())),
            ulong_value(AttributeType::KEY_TYPE, cryptoki_sys::CKK_EC_EDWARDS),
            ulong_value(
                AttributeType::KEY_GEN_MECHANISM,
                MechanismType::EC_EDWARDS_KEY_PAIR_GEN.0,
            ),
            (
                AttributeType::ALLOWED_MECHANISMS,
                Some(MechanismType::EDDSA.0.to_ne_bytes().to_vec()),
            ),
            (AttributeType::SUBJECT, None),
            (AttributeType::SIGN, Some(vec![u8::from(private)])),
            (AttributeType::VERIFY, Some(vec![u8::from(!private)])),
        ])
    }

    pub fn set_attribute(
        &mut self,
        object: ObjectHandle,
        attribute: AttributeType,
        value: Option<Vec<u8>>,
    ) {
        if let Some(stored) = self.objects.iter_mut().find(|o| o.handle == object) {
            stored.attributes.insert(attribute, value);
        }
    }

    pub fn remove_attribute(&mut self, object: ObjectHandle, attribute: AttributeType) {
        if let Some(stored) = self.objects.iter_mut().find(|o| o.handle == object) {
            stored.attributes.remove(&attribute);
        }
    }

    fn set_key(&mut self, object: ObjectHandle, key: KeyMaterial) {
        if let Some(stored) = self.objects.iter_mut().find(|o| o.handle == object) {
            stored.key = Some(key);
        }
    }

    pub fn fail_attribute(
        &mut self,
        object: ObjectHandle,
        attribute: AttributeType,
        failure: AttributeFailure,
    ) {
        self.failures.insert((object, attribute), failure);
    }

    /// Answer the length query for this attribute the way some modules do,
    /// with `CKR_BUFFER_TOO_SMALL` and the real length
    pub fn answer_too_small(&mut self, object: ObjectHandle, attribute: AttributeType) {
        self.too_small_queries.insert((object, attribute));
    }

    /// Make every `C_FindObjectsFinal` fail with `status`
    pub fn fail_final(&mut self, status: Status) {
        self.final_failure = Some(status);
    }

    /// Make the `page`-th page request (zero based) of every find fail
    pub fn fail_page(&mut self, page: usize, status: Status) {
        self.page_failures.insert(page, status);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    fn object(&self, handle: ObjectHandle) -> Option<&FakeObject> {
        self.objects.iter().find(|o| o.handle == handle)
    }

    fn require_initialized(&self, operation: &'static str) -> ProbeResult<()> {
        if self.initialized {
            Ok(())
        } else {
            fail(operation, Status::CRYPTOKI_NOT_INITIALIZED)
        }
    }

    fn require_session(&self, operation: &'static str, session: SessionHandle) -> ProbeResult<()> {
        self.require_initialized(operation)?;
        if self.sessions.contains(&session) {
            Ok(())
        } else {
            fail(operation, Status::SESSION_HANDLE_INVALID)
        }
    }

    fn require_slot(&self, operation: &'static str, slot: SlotId) -> ProbeResult<()> {
        self.require_initialized(operation)?;
        if slot == TOKEN_SLOT || slot == EMPTY_SLOT {
            Ok(())
        } else {
            fail(operation, Status::SLOT_ID_INVALID)
        }
    }

    fn key_of(&self, operation: &'static str, key: ObjectHandle) -> ProbeResult<&KeyMaterial> {
        self.object(key)
            .and_then(|object| object.key.as_ref())
            .map_or_else(|| fail(operation, Status::KEY_HANDLE_INVALID), Ok)
    }
}

fn fail<T>(operation: &'static str, status: Status) -> ProbeResult<T> {
    Err(ModuleError::Call { operation, status }.into())
}

fn class_value(class: ObjectClass) -> (AttributeType, Option<Vec<u8>>) {
    ulong_value(AttributeType::CLASS, class.raw())
}

fn ulong_value(attribute: AttributeType, value: Ulong) -> (AttributeType, Option<Vec<u8>>) {
    (attribute, Some(value.to_ne_bytes().to_vec()))
}

impl TokenModule for FakeToken {
    fn initialize(&mut self) -> ProbeResult<()> {
        if self.initialized {
            return fail("C_Initialize", Status(cryptoki_sys::CKR_CRYPTOKI_ALREADY_INITIALIZED));
        }
        self.initialized = true;
        Ok(())
    }

    fn finalize(&mut self) -> ProbeResult<()> {
        self.require_initialized("C_Finalize")?;
        self.log.finalized += 1;
        self.initialized = false;
        self.sessions.clear();
        self.logged_in = false;
        Ok(())
    }

    fn info(&mut self) -> ProbeResult<ModuleInfo> {
        self.require_initialized("C_GetInfo")?;
        Ok(ModuleInfo {
            cryptoki_version: Version::new(2, 40),
            manufacturer: "p11probe".to_string(),
            flags: 0,
            description: "In-memory test module".to_string(),
            library_version: Version::new(0, 1),
        })
    }

    fn slot_list(&mut self, require_token: bool) -> ProbeResult<Vec<SlotId>> {
        self.require_initialized("C_GetSlotList")?;
        if require_token {
            Ok(vec![TOKEN_SLOT])
        } else {
            Ok(vec![TOKEN_SLOT, EMPTY_SLOT])
        }
    }

    fn slot_info(&mut self, slot: SlotId) -> ProbeResult<SlotInfo> {
        self.require_slot("C_GetSlotInfo", slot)?;
        let mut flags = cryptoki_sys::CKF_REMOVABLE_DEVICE;
        if slot == TOKEN_SLOT {
            flags |= cryptoki_sys::CKF_TOKEN_PRESENT;
        }
        Ok(SlotInfo {
            description: format!("Fake slot {}", slot),
            manufacturer: "p11probe".to_string(),
            flags,
            hardware_version: Version::new(1, 0),
            firmware_version: Version::new(1, 0),
        })
    }

    fn token_info(&mut self, slot: SlotId) -> ProbeResult<TokenInfo> {
        self.require_slot("C_GetTokenInfo", slot)?;
        if slot != TOKEN_SLOT {
            return fail("C_GetTokenInfo", Status(cryptoki_sys::CKR_TOKEN_NOT_PRESENT));
        }
        Ok(TokenInfo {
            label: "Fake token".to_string(),
            manufacturer: "p11probe".to_string(),
            model: "in-memory".to_string(),
            serial_number: "0001".to_string(),
            flags: self.token_flags,
            max_pin_len: Pin::MAX_LENGTH as Ulong,
            min_pin_len: 4,
            ..TokenInfo::default()
        })
    }

    fn mechanism_list(&mut self, slot: SlotId) -> ProbeResult<Vec<MechanismType>> {
        self.require_slot("C_GetMechanismList", slot)?;
        Ok(self.mechanisms.iter().map(|(mechanism, _)| *mechanism).collect())
    }

    fn mechanism_info(
        &mut self,
        slot: SlotId,
        mechanism: MechanismType,
    ) -> ProbeResult<MechanismInfo> {
        self.require_slot("C_GetMechanismInfo", slot)?;
        if self.failing_mechanism == Some(mechanism) {
            return fail("C_GetMechanismInfo", Status::FUNCTION_FAILED);
        }
        self.mechanisms
            .iter()
            .find(|(candidate, _)| *candidate == mechanism)
            .map(|(_, info)| *info)
            .map_or_else(|| fail("C_GetMechanismInfo", Status::MECHANISM_INVALID), Ok)
    }

    fn open_session(&mut self, slot: SlotId) -> ProbeResult<SessionHandle> {
        self.require_slot("C_OpenSession", slot)?;
        if slot != TOKEN_SLOT {
            return fail("C_OpenSession", Status(cryptoki_sys::CKR_TOKEN_NOT_PRESENT));
        }
        let handle = SessionHandle(self.next_session);
        self.next_session += 1;
        self.sessions.insert(handle);
        Ok(handle)
    }

    fn session_info(&mut self, session: SessionHandle) -> ProbeResult<SessionInfo> {
        self.require_session("C_GetSessionInfo", session)?;
        let state = if self.logged_in {
            cryptoki_sys::CKS_RO_USER_FUNCTIONS
        } else {
            cryptoki_sys::CKS_RO_PUBLIC_SESSION
        };
        Ok(SessionInfo {
            slot: TOKEN_SLOT,
            state,
            flags: cryptoki_sys::CKF_SERIAL_SESSION,
            device_error: 0,
        })
    }

    fn close_session(&mut self, session: SessionHandle) -> ProbeResult<()> {
        self.require_session("C_CloseSession", session)?;
        self.sessions.remove(&session);
        self.log.closed_sessions.push(session);
        if self.sessions.is_empty() {
            self.logged_in = false;
        }
        Ok(())
    }

    fn login(&mut self, session: SessionHandle, pin: Option<&Pin>) -> ProbeResult<()> {
        self.require_session("C_Login", session)?;
        self.log.logins.push(pin.map(|pin| pin.as_bytes().to_vec()));
        if self.logged_in {
            return fail("C_Login", Status::USER_ALREADY_LOGGED_IN);
        }
        match pin {
            None if self.token_flags & cryptoki_sys::CKF_PROTECTED_AUTHENTICATION_PATH != 0 => {}
            None => return fail("C_Login", Status::ARGUMENTS_BAD),
            Some(pin) if pin == &self.pin => {}
            Some(_) => return fail("C_Login", Status::PIN_INCORRECT),
        }
        self.logged_in = true;
        Ok(())
    }

    fn logout(&mut self, session: SessionHandle) -> ProbeResult<()> {
        self.require_session("C_Logout", session)?;
        self.log.logouts += 1;
        if !self.logged_in {
            return fail("C_Logout", Status::USER_NOT_LOGGED_IN);
        }
        self.logged_in = false;
        Ok(())
    }

    fn get_attribute_value(
        &mut self,
        session: SessionHandle,
        object: ObjectHandle,
        attribute: AttributeType,
        buffer: Option<&mut [u8]>,
    ) -> AttributeReply {
        self.log.attribute_queries.push(AttributeQuery {
            object,
            attribute,
            buffer: buffer.as_ref().map(|buffer| buffer.len()),
        });
        let unavailable = |status| AttributeReply::new(status, ValueLength::Unavailable);

        if self.require_session("C_GetAttributeValue", session).is_err() {
            return unavailable(Status::SESSION_HANDLE_INVALID);
        }
        match (self.failures.get(&(object, attribute)), &buffer) {
            (Some(AttributeFailure::Query(status)), None) => return unavailable(*status),
            (Some(AttributeFailure::Fetch(status)), Some(_)) => return unavailable(*status),
            _ => {}
        }
        let Some(stored) = self.object(object) else {
            return unavailable(Status::OBJECT_HANDLE_INVALID);
        };
        let value = match stored.attributes.get(&attribute) {
            None => return unavailable(Status::ATTRIBUTE_TYPE_INVALID),
            Some(None) => return unavailable(Status::OK),
            Some(Some(value)) => value,
        };
        let length = ValueLength::Bytes(value.len());
        match buffer {
            None if self.too_small_queries.contains(&(object, attribute)) => {
                AttributeReply::new(Status::BUFFER_TOO_SMALL, length)
            }
            None => AttributeReply::new(Status::OK, length),
            Some(buffer) if buffer.len() < value.len() => {
                AttributeReply::new(Status::BUFFER_TOO_SMALL, length)
            }
            Some(buffer) => {
                buffer[..value.len()].copy_from_slice(value);
                AttributeReply::new(Status::OK, length)
            }
        }
    }

    fn find_objects_init(
        &mut self,
        session: SessionHandle,
        template: &[Attribute],
    ) -> ProbeResult<()> {
        self.require_session("C_FindObjectsInit", session)?;
        self.log.find_inits.push(template.to_vec());
        if self.find.is_some() {
            return fail("C_FindObjectsInit", Status::OPERATION_ACTIVE);
        }
        let matches = self
            .objects
            .iter()
            .filter(|object| {
                template.iter().all(|predicate| {
                    object.attributes.get(&predicate.kind) == Some(&Some(predicate.value.clone()))
                })
            })
            .map(|object| object.handle)
            .collect();
        self.find = Some(FindState {
            matches,
            cursor: 0,
            pages: 0,
        });
        Ok(())
    }

    fn find_objects(
        &mut self,
        session: SessionHandle,
        capacity: usize,
    ) -> ProbeResult<Vec<ObjectHandle>> {
        self.require_session("C_FindObjects", session)?;
        let Some(find) = self.find.as_mut() else {
            return fail("C_FindObjects", Status::OPERATION_NOT_INITIALIZED);
        };
        let page = find.pages;
        find.pages += 1;
        if let Some(status) = self.page_failures.get(&page) {
            self.log.pages.push(PageRequest {
                capacity,
                returned: 0,
            });
            return fail("C_FindObjects", *status);
        }
        let end = (find.cursor + capacity).min(find.matches.len());
        let handles = find.matches[find.cursor..end].to_vec();
        find.cursor = end;
        self.log.pages.push(PageRequest {
            capacity,
            returned: handles.len(),
        });
        Ok(handles)
    }

    fn find_objects_final(&mut self, session: SessionHandle) -> ProbeResult<()> {
        self.require_session("C_FindObjectsFinal", session)?;
        self.log.find_finals += 1;
        let find = self.find.take();
        if let Some(status) = self.final_failure {
            return fail("C_FindObjectsFinal", status);
        }
        match find {
            Some(_) => Ok(()),
            None => fail("C_FindObjectsFinal", Status::OPERATION_NOT_INITIALIZED),
        }
    }

    fn sign_init(
        &mut self,
        session: SessionHandle,
        mechanism: MechanismType,
        key: ObjectHandle,
    ) -> ProbeResult<()> {
        self.require_session("C_SignInit", session)?;
        if mechanism != MechanismType::EDDSA {
            return fail("C_SignInit", Status::MECHANISM_INVALID);
        }
        if !self.logged_in {
            return fail("C_SignInit", Status::USER_NOT_LOGGED_IN);
        }
        if !matches!(self.key_of("C_SignInit", key)?, KeyMaterial::Private(_)) {
            return fail("C_SignInit", Status::KEY_FUNCTION_NOT_PERMITTED);
        }
        self.operation = Some(Operation::Sign(key));
        Ok(())
    }

    fn sign(
        &mut self,
        session: SessionHandle,
        data: &[u8],
        capacity: usize,
    ) -> ProbeResult<Vec<u8>> {
        self.require_session("C_Sign", session)?;
        let Some(Operation::Sign(key)) = self.operation else {
            return fail("C_Sign", Status::OPERATION_NOT_INITIALIZED);
        };
        let KeyMaterial::Private(signing_key) = self.key_of("C_Sign", key)? else {
            return fail("C_Sign", Status::KEY_HANDLE_INVALID);
        };
        let signature = signing_key.sign(data).to_bytes().to_vec();
        let required = self.signature_len.unwrap_or(signature.len());
        if required > capacity {
            // The operation stays active so the caller may retry with more room
            return fail("C_Sign", Status::BUFFER_TOO_SMALL);
        }
        self.operation = None;
        Ok(signature)
    }

    fn verify_init(
        &mut self,
        session: SessionHandle,
        mechanism: MechanismType,
        key: ObjectHandle,
    ) -> ProbeResult<()> {
        self.require_session("C_VerifyInit", session)?;
        if mechanism != MechanismType::EDDSA {
            return fail("C_VerifyInit", Status::MECHANISM_INVALID);
        }
        if !matches!(self.key_of("C_VerifyInit", key)?, KeyMaterial::Public(_)) {
            return fail("C_VerifyInit", Status::KEY_FUNCTION_NOT_PERMITTED);
        }
        self.operation = Some(Operation::Verify(key));
        Ok(())
    }

    fn verify(
        &mut self,
        session: SessionHandle,
        data: &[u8],
        signature: &[u8],
    ) -> ProbeResult<()> {
        self.require_session("C_Verify", session)?;
        let Some(Operation::Verify(key)) = self.operation.take() else {
            return fail("C_Verify", Status::OPERATION_NOT_INITIALIZED);
        };
        let KeyMaterial::Public(verifying_key) = self.key_of("C_Verify", key)? else {
            return fail("C_Verify", Status::KEY_HANDLE_INVALID);
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return fail("C_Verify", Status::SIGNATURE_LEN_RANGE);
        };
        verifying_key
            .verify_strict(data, &signature)
            .map_or_else(|_| fail("C_Verify", Status::SIGNATURE_INVALID), Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract_tests_for;
    use crate::ports::contract_tests::token_contract;

    contract_tests_for!(
        fake_token_contract,
        make = || FakeToken::new(Pin::from_str("123456").unwrap()),
        tests = {
            test_initialize_and_finalize => token_contract::test_initialize_and_finalize,
            test_calls_before_initialize_fail => token_contract::test_calls_before_initialize_fail,
            test_token_slot_is_listed => token_contract::test_token_slot_is_listed,
            test_open_and_close_session => token_contract::test_open_and_close_session,
            test_close_unknown_session_fails => token_contract::test_close_unknown_session_fails,
            test_find_without_init_fails => token_contract::test_find_without_init_fails,
            test_find_unmatched_class_is_empty => token_contract::test_find_unmatched_class_is_empty,
            test_unknown_object_attribute_query_fails => token_contract::test_unknown_object_attribute_query_fails,
        }
    );

    fn session(token: &mut FakeToken) -> SessionHandle {
        token.initialize().unwrap();
        token.open_session(TOKEN_SLOT).unwrap()
    }

    #[test]
    fn test_attribute_length_then_value() {
        let mut token = FakeToken::new(Pin::from_str("123456").unwrap());
        let object = token.add_data_object("app", b"value");
        let session = session(&mut token);

        let reply = token.get_attribute_value(session, object, AttributeType::VALUE, None);
        assert_eq!(reply, AttributeReply::new(Status::OK, ValueLength::Bytes(5)));

        let mut buffer = [0u8; 5];
        let reply =
            token.get_attribute_value(session, object, AttributeType::VALUE, Some(&mut buffer));
        assert!(reply.status.is_ok());
        assert_eq!(&buffer, b"value");
        assert_eq!(token.log.queries_for(object)[1].buffer, Some(5));
    }

    #[test]
    fn test_short_buffer_reports_required_length() {
        let mut token = FakeToken::new(Pin::from_str("123456").unwrap());
        let object = token.add_data_object("app", b"value");
        let session = session(&mut token);

        let mut buffer = [0u8; 2];
        let reply =
            token.get_attribute_value(session, object, AttributeType::VALUE, Some(&mut buffer));
        assert_eq!(
            reply,
            AttributeReply::new(Status::BUFFER_TOO_SMALL, ValueLength::Bytes(5))
        );
    }

    #[test]
    fn test_missing_and_unavailable_attributes() {
        let mut token = FakeToken::new(Pin::from_str("123456").unwrap());
        let (private, _) = token.add_key_pair(b"k1");
        let session = session(&mut token);

        let reply = token.get_attribute_value(session, private, AttributeType::SUBJECT, None);
        assert_eq!(reply, AttributeReply::new(Status::OK, ValueLength::Unavailable));

        let reply = token.get_attribute_value(session, private, AttributeType::MODULUS, None);
        assert_eq!(reply.status, Status::ATTRIBUTE_TYPE_INVALID);
    }

    #[test]
    fn test_find_matches_whole_template() {
        let mut token = FakeToken::new(Pin::from_str("123456").unwrap());
        let (_, public) = token.add_key_pair(b"k1");
        token.add_key_pair(b"k2");
        let session = session(&mut token);

        token
            .find_objects_init(
                session,
                &[Attribute::class(ObjectClass::PublicKey), Attribute::id(b"k1")],
            )
            .unwrap();
        assert_eq!(token.find_objects(session, 10).unwrap(), vec![public]);
        token.find_objects_final(session).unwrap();
    }

    #[test]
    fn test_login_requires_matching_pin() {
        let mut token = FakeToken::new(Pin::from_str("123456").unwrap());
        let session = session(&mut token);

        let wrong = Pin::from_str("000000").unwrap();
        let err = token.login(session, Some(&wrong)).unwrap_err();
        assert_eq!(err.status(), Some(Status::PIN_INCORRECT));

        let err = token.login(session, None).unwrap_err();
        assert_eq!(err.status(), Some(Status::ARGUMENTS_BAD));

        let pin = Pin::from_str("123456").unwrap();
        token.login(session, Some(&pin)).unwrap();
        assert!(token.is_logged_in());
    }

    #[test]
    fn test_sign_and_verify_eddsa() {
        let mut token = FakeToken::new(Pin::from_str("123456").unwrap());
        let (private, public) = token.add_key_pair(b"k1");
        let session = session(&mut token);
        let pin = Pin::from_str("123456").unwrap();
        token.login(session, Some(&pin)).unwrap();

        token.sign_init(session, MechanismType::EDDSA, private).unwrap();
        let signature = token.sign(session, b"payload", 1024).unwrap();
        assert_eq!(signature.len(), 64);

        token.verify_init(session, MechanismType::EDDSA, public).unwrap();
        token.verify(session, b"payload", &signature).unwrap();

        token.verify_init(session, MechanismType::EDDSA, public).unwrap();
        let err = token.verify(session, b"other", &signature).unwrap_err();
        assert_eq!(err.status(), Some(Status::SIGNATURE_INVALID));
    }

    #[test]
    fn test_sign_with_public_key_not_permitted() {
        let mut token = FakeToken::new(Pin::from_str("123456").unwrap());
        let (_, public) = token.add_key_pair(b"k1");
        let session = session(&mut token);
        let pin = Pin::from_str("123456").unwrap();
        token.login(session, Some(&pin)).unwrap();

        let err = token
            .sign_init(session, MechanismType::EDDSA, public)
            .unwrap_err();
        assert_eq!(err.status(), Some(Status::KEY_FUNCTION_NOT_PERMITTED));
    }
}
