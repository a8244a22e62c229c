//! Shared-library implementation of the module function table
//!
//! The library is opened with `cryptoki-sys`' dynamic loader and asked for its
//! `CK_FUNCTION_LIST`. Every entry point is then called through that table;
//! an empty slot in the table behaves like `CKR_FUNCTION_NOT_SUPPORTED`.

use std::fmt;
use std::ptr;

use cryptoki_sys::{
    CK_ATTRIBUTE, CK_BBOOL, CK_FLAGS, CK_FUNCTION_LIST, CK_FUNCTION_LIST_PTR, CK_INFO,
    CK_MECHANISM, CK_MECHANISM_INFO, CK_MECHANISM_TYPE, CK_OBJECT_HANDLE, CK_RV,
    CK_SESSION_HANDLE, CK_SESSION_INFO, CK_SLOT_ID, CK_SLOT_INFO, CK_TOKEN_INFO, CK_ULONG,
    CK_UNAVAILABLE_INFORMATION, CK_VERSION, CK_VOID_PTR, CKF_SERIAL_SESSION, CKU_USER,
};
use tracing::debug;

use crate::error::{ModuleError, ProbeResult};
use crate::logic::codec::padded_text;
use crate::model::{
    Attribute, AttributeType, MechanismInfo, MechanismType, ModuleInfo, ObjectHandle, Pin,
    SessionHandle, SessionInfo, SlotId, SlotInfo, Status, TokenInfo, Version,
};
use crate::ports::{AttributeReply, TokenModule, ValueLength};

/// Resolve an entry point or bail out with `CKR_FUNCTION_NOT_SUPPORTED`
macro_rules! entry {
    ($module:expr, $name:ident) => {
        match $module.table().$name {
            Some(function) => function,
            None => {
                return Err(ModuleError::Call {
                    operation: stringify!($name),
                    status: Status::FUNCTION_NOT_SUPPORTED,
                }
                .into())
            }
        }
    };
}

fn check(operation: &'static str, rv: CK_RV) -> ProbeResult<()> {
    let status = Status(rv);
    debug!("{} returned {}", operation, status);
    status.check(operation)
}

fn version(raw: CK_VERSION) -> Version {
    Version::new(raw.major, raw.minor)
}

/// A PKCS#11 module loaded from disk
pub struct Pkcs11Module {
    path: String,
    functions: CK_FUNCTION_LIST_PTR,
    // Keeps the code behind `functions` mapped; must outlive every call
    _library: cryptoki_sys::Pkcs11,
}

impl Pkcs11Module {
    /// Open the shared library at `path` and fetch its function table
    pub fn load(path: &str) -> ProbeResult<Self> {
        let load_failed = |reason: String| ModuleError::LoadFailed {
            path: path.to_string(),
            reason,
        };

        let library =
            unsafe { cryptoki_sys::Pkcs11::new(path) }.map_err(|e| load_failed(e.to_string()))?;
        let get_function_list = *library
            .C_GetFunctionList
            .as_ref()
            .map_err(|e| load_failed(format!("C_GetFunctionList not found: {}", e)))?;

        let mut functions: CK_FUNCTION_LIST_PTR = ptr::null_mut();
        let rv = unsafe { get_function_list(&mut functions) };
        check("C_GetFunctionList", rv)?;
        if functions.is_null() {
            return Err(load_failed("C_GetFunctionList returned no table".to_string()).into());
        }

        debug!("Loaded module {}", path);
        Ok(Self {
            path: path.to_string(),
            functions,
            _library: library,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn table(&self) -> &CK_FUNCTION_LIST {
        // Non-null and owned by the library for as long as it stays loaded
        unsafe { &*self.functions }
    }
}

impl fmt::Debug for Pkcs11Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pkcs11Module")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl TokenModule for Pkcs11Module {
    fn initialize(&mut self) -> ProbeResult<()> {
        let function = entry!(self, C_Initialize);
        check("C_Initialize", unsafe { function(ptr::null_mut()) })
    }

    fn finalize(&mut self) -> ProbeResult<()> {
        let function = entry!(self, C_Finalize);
        check("C_Finalize", unsafe { function(ptr::null_mut()) })
    }

    fn info(&mut self) -> ProbeResult<ModuleInfo> {
        let function = entry!(self, C_GetInfo);
        let mut info: CK_INFO = unsafe { std::mem::zeroed() };
        check("C_GetInfo", unsafe { function(&mut info) })?;
        Ok(ModuleInfo {
            cryptoki_version: version(info.cryptokiVersion),
            manufacturer: padded_text(&info.manufacturerID),
            flags: info.flags,
            description: padded_text(&info.libraryDescription),
            library_version: version(info.libraryVersion),
        })
    }

    fn slot_list(&mut self, require_token: bool) -> ProbeResult<Vec<SlotId>> {
        let function = entry!(self, C_GetSlotList);
        let token_present = CK_BBOOL::from(require_token);
        let mut count: CK_ULONG = 0;
        check("C_GetSlotList", unsafe {
            function(token_present, ptr::null_mut(), &mut count)
        })?;

        let mut slots: Vec<CK_SLOT_ID> = vec![0; count as usize];
        check("C_GetSlotList", unsafe {
            function(token_present, slots.as_mut_ptr(), &mut count)
        })?;
        slots.truncate(count as usize);
        Ok(slots.into_iter().map(SlotId).collect())
    }

    fn slot_info(&mut self, slot: SlotId) -> ProbeResult<SlotInfo> {
        let function = entry!(self, C_GetSlotInfo);
        let mut info: CK_SLOT_INFO = unsafe { std::mem::zeroed() };
        check("C_GetSlotInfo", unsafe { function(slot.0, &mut info) })?;
        Ok(SlotInfo {
            description: padded_text(&info.slotDescription),
            manufacturer: padded_text(&info.manufacturerID),
            flags: info.flags,
            hardware_version: version(info.hardwareVersion),
            firmware_version: version(info.firmwareVersion),
        })
    }

    fn token_info(&mut self, slot: SlotId) -> ProbeResult<TokenInfo> {
        let function = entry!(self, C_GetTokenInfo);
        let mut info: CK_TOKEN_INFO = unsafe { std::mem::zeroed() };
        check("C_GetTokenInfo", unsafe { function(slot.0, &mut info) })?;
        Ok(TokenInfo {
            label: padded_text(&info.label),
            manufacturer: padded_text(&info.manufacturerID),
            model: padded_text(&info.model),
            serial_number: padded_text(&info.serialNumber),
            flags: info.flags,
            max_session_count: info.ulMaxSessionCount,
            session_count: info.ulSessionCount,
            max_rw_session_count: info.ulMaxRwSessionCount,
            rw_session_count: info.ulRwSessionCount,
            max_pin_len: info.ulMaxPinLen,
            min_pin_len: info.ulMinPinLen,
            total_public_memory: info.ulTotalPublicMemory,
            free_public_memory: info.ulFreePublicMemory,
            total_private_memory: info.ulTotalPrivateMemory,
            free_private_memory: info.ulFreePrivateMemory,
            hardware_version: version(info.hardwareVersion),
            firmware_version: version(info.firmwareVersion),
            utc_time: padded_text(&info.utcTime),
        })
    }

    fn mechanism_list(&mut self, slot: SlotId) -> ProbeResult<Vec<MechanismType>> {
        let function = entry!(self, C_GetMechanismList);
        let mut count: CK_ULONG = 0;
        check("C_GetMechanismList", unsafe {
            function(slot.0, ptr::null_mut(), &mut count)
        })?;

        let mut mechanisms: Vec<CK_MECHANISM_TYPE> = vec![0; count as usize];
        check("C_GetMechanismList", unsafe {
            function(slot.0, mechanisms.as_mut_ptr(), &mut count)
        })?;
        mechanisms.truncate(count as usize);
        Ok(mechanisms.into_iter().map(MechanismType).collect())
    }

    fn mechanism_info(
        &mut self,
        slot: SlotId,
        mechanism: MechanismType,
    ) -> ProbeResult<MechanismInfo> {
        let function = entry!(self, C_GetMechanismInfo);
        let mut info: CK_MECHANISM_INFO = unsafe { std::mem::zeroed() };
        check("C_GetMechanismInfo", unsafe {
            function(slot.0, mechanism.0, &mut info)
        })?;
        Ok(MechanismInfo {
            min_key_size: info.ulMinKeySize,
            max_key_size: info.ulMaxKeySize,
            flags: info.flags,
        })
    }

    fn open_session(&mut self, slot: SlotId) -> ProbeResult<SessionHandle> {
        let function = entry!(self, C_OpenSession);
        let mut handle: CK_SESSION_HANDLE = 0;
        check("C_OpenSession", unsafe {
            function(
                slot.0,
                CKF_SERIAL_SESSION as CK_FLAGS,
                ptr::null_mut(),
                None,
                &mut handle,
            )
        })?;
        Ok(SessionHandle(handle))
    }

    fn session_info(&mut self, session: SessionHandle) -> ProbeResult<SessionInfo> {
        let function = entry!(self, C_GetSessionInfo);
        let mut info: CK_SESSION_INFO = unsafe { std::mem::zeroed() };
        check("C_GetSessionInfo", unsafe { function(session.0, &mut info) })?;
        Ok(SessionInfo {
            slot: SlotId(info.slotID),
            state: info.state,
            flags: info.flags,
            device_error: info.ulDeviceError,
        })
    }

    fn close_session(&mut self, session: SessionHandle) -> ProbeResult<()> {
        let function = entry!(self, C_CloseSession);
        check("C_CloseSession", unsafe { function(session.0) })
    }

    fn login(&mut self, session: SessionHandle, pin: Option<&Pin>) -> ProbeResult<()> {
        let function = entry!(self, C_Login);
        let (pin_ptr, pin_len) = match pin {
            // The module only reads the PIN
            Some(pin) => (pin.as_bytes().as_ptr() as *mut u8, pin.len() as CK_ULONG),
            None => (ptr::null_mut(), 0),
        };
        check("C_Login", unsafe {
            function(session.0, CKU_USER, pin_ptr, pin_len)
        })
    }

    fn logout(&mut self, session: SessionHandle) -> ProbeResult<()> {
        let function = entry!(self, C_Logout);
        check("C_Logout", unsafe { function(session.0) })
    }

    fn get_attribute_value(
        &mut self,
        session: SessionHandle,
        object: ObjectHandle,
        attribute: AttributeType,
        buffer: Option<&mut [u8]>,
    ) -> AttributeReply {
        let Some(function) = self.table().C_GetAttributeValue else {
            return AttributeReply::new(Status::FUNCTION_NOT_SUPPORTED, ValueLength::Unavailable);
        };
        let (value, capacity) = match buffer {
            Some(buffer) => (buffer.as_mut_ptr() as CK_VOID_PTR, buffer.len() as CK_ULONG),
            None => (ptr::null_mut(), 0),
        };
        let mut template = CK_ATTRIBUTE {
            type_: attribute.0,
            pValue: value,
            ulValueLen: capacity,
        };

        let status = Status(unsafe { function(session.0, object.0, &mut template, 1) });
        debug!(
            "C_GetAttributeValue({}, {}, {} bytes) returned {}",
            object, attribute, capacity, status
        );
        let length = if template.ulValueLen == CK_UNAVAILABLE_INFORMATION {
            ValueLength::Unavailable
        } else {
            ValueLength::Bytes(template.ulValueLen as usize)
        };
        AttributeReply::new(status, length)
    }

    fn find_objects_init(
        &mut self,
        session: SessionHandle,
        template: &[Attribute],
    ) -> ProbeResult<()> {
        let function = entry!(self, C_FindObjectsInit);
        // The module only reads the template values
        let mut raw: Vec<CK_ATTRIBUTE> = template
            .iter()
            .map(|attribute| CK_ATTRIBUTE {
                type_: attribute.kind.0,
                pValue: attribute.value.as_ptr() as CK_VOID_PTR,
                ulValueLen: attribute.value.len() as CK_ULONG,
            })
            .collect();
        let raw_ptr = if raw.is_empty() {
            ptr::null_mut()
        } else {
            raw.as_mut_ptr()
        };
        check("C_FindObjectsInit", unsafe {
            function(session.0, raw_ptr, raw.len() as CK_ULONG)
        })
    }

    fn find_objects(
        &mut self,
        session: SessionHandle,
        capacity: usize,
    ) -> ProbeResult<Vec<ObjectHandle>> {
        let function = entry!(self, C_FindObjects);
        let mut handles: Vec<CK_OBJECT_HANDLE> = vec![0; capacity];
        let mut count: CK_ULONG = 0;
        check("C_FindObjects", unsafe {
            function(
                session.0,
                handles.as_mut_ptr(),
                capacity as CK_ULONG,
                &mut count,
            )
        })?;
        handles.truncate((count as usize).min(capacity));
        Ok(handles.into_iter().map(ObjectHandle).collect())
    }

    fn find_objects_final(&mut self, session: SessionHandle) -> ProbeResult<()> {
        let function = entry!(self, C_FindObjectsFinal);
        check("C_FindObjectsFinal", unsafe { function(session.0) })
    }

    fn sign_init(
        &mut self,
        session: SessionHandle,
        mechanism: MechanismType,
        key: ObjectHandle,
    ) -> ProbeResult<()> {
        let function = entry!(self, C_SignInit);
        let mut mechanism = CK_MECHANISM {
            mechanism: mechanism.0,
            pParameter: ptr::null_mut(),
            ulParameterLen: 0,
        };
        check("C_SignInit", unsafe {
            function(session.0, &mut mechanism, key.0)
        })
    }

    fn sign(
        &mut self,
        session: SessionHandle,
        data: &[u8],
        capacity: usize,
    ) -> ProbeResult<Vec<u8>> {
        let function = entry!(self, C_Sign);
        let mut signature = vec![0u8; capacity];
        let mut length = capacity as CK_ULONG;
        check("C_Sign", unsafe {
            function(
                session.0,
                data.as_ptr() as *mut u8,
                data.len() as CK_ULONG,
                signature.as_mut_ptr(),
                &mut length,
            )
        })?;
        signature.truncate((length as usize).min(capacity));
        Ok(signature)
    }

    fn verify_init(
        &mut self,
        session: SessionHandle,
        mechanism: MechanismType,
        key: ObjectHandle,
    ) -> ProbeResult<()> {
        let function = entry!(self, C_VerifyInit);
        let mut mechanism = CK_MECHANISM {
            mechanism: mechanism.0,
            pParameter: ptr::null_mut(),
            ulParameterLen: 0,
        };
        check("C_VerifyInit", unsafe {
            function(session.0, &mut mechanism, key.0)
        })
    }

    fn verify(
        &mut self,
        session: SessionHandle,
        data: &[u8],
        signature: &[u8],
    ) -> ProbeResult<()> {
        let function = entry!(self, C_Verify);
        check("C_Verify", unsafe {
            function(
                session.0,
                data.as_ptr() as *mut u8,
                data.len() as CK_ULONG,
                signature.as_ptr() as *mut u8,
                signature.len() as CK_ULONG,
            )
        })
    }
}
