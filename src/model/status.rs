//! Return codes from module calls

use std::fmt;

use super::names::{describe, name_table, NameTable};
use super::Ulong;
use crate::error::{ModuleError, ProbeResult};

const STATUS_NAMES: NameTable = {
    use cryptoki_sys::*;
    name_table![
        CKR_OK,
        CKR_CANCEL,
        CKR_HOST_MEMORY,
        CKR_SLOT_ID_INVALID,
        CKR_GENERAL_ERROR,
        CKR_FUNCTION_FAILED,
        CKR_ARGUMENTS_BAD,
        CKR_NO_EVENT,
        CKR_NEED_TO_CREATE_THREADS,
        CKR_CANT_LOCK,
        CKR_ATTRIBUTE_READ_ONLY,
        CKR_ATTRIBUTE_SENSITIVE,
        CKR_ATTRIBUTE_TYPE_INVALID,
        CKR_ATTRIBUTE_VALUE_INVALID,
        CKR_DATA_INVALID,
        CKR_DATA_LEN_RANGE,
        CKR_DEVICE_ERROR,
        CKR_DEVICE_MEMORY,
        CKR_DEVICE_REMOVED,
        CKR_ENCRYPTED_DATA_INVALID,
        CKR_ENCRYPTED_DATA_LEN_RANGE,
        CKR_FUNCTION_CANCELED,
        CKR_FUNCTION_NOT_PARALLEL,
        CKR_FUNCTION_NOT_SUPPORTED,
        CKR_KEY_HANDLE_INVALID,
        CKR_KEY_SIZE_RANGE,
        CKR_KEY_TYPE_INCONSISTENT,
        CKR_KEY_FUNCTION_NOT_PERMITTED,
        CKR_MECHANISM_INVALID,
        CKR_MECHANISM_PARAM_INVALID,
        CKR_OBJECT_HANDLE_INVALID,
        CKR_OPERATION_ACTIVE,
        CKR_OPERATION_NOT_INITIALIZED,
        CKR_PIN_INCORRECT,
        CKR_PIN_INVALID,
        CKR_PIN_LEN_RANGE,
        CKR_PIN_EXPIRED,
        CKR_PIN_LOCKED,
        CKR_SESSION_CLOSED,
        CKR_SESSION_COUNT,
        CKR_SESSION_HANDLE_INVALID,
        CKR_SESSION_READ_ONLY,
        CKR_SESSION_EXISTS,
        CKR_SIGNATURE_INVALID,
        CKR_SIGNATURE_LEN_RANGE,
        CKR_TEMPLATE_INCOMPLETE,
        CKR_TEMPLATE_INCONSISTENT,
        CKR_TOKEN_NOT_PRESENT,
        CKR_TOKEN_NOT_RECOGNIZED,
        CKR_USER_ALREADY_LOGGED_IN,
        CKR_USER_NOT_LOGGED_IN,
        CKR_USER_PIN_NOT_INITIALIZED,
        CKR_USER_TYPE_INVALID,
        CKR_BUFFER_TOO_SMALL,
        CKR_CRYPTOKI_NOT_INITIALIZED,
        CKR_CRYPTOKI_ALREADY_INITIALIZED,
    ]
};

/// Status code returned by every module entry point
///
/// `Status::OK` is the only non-error value. Rendering always goes through
/// the symbolic name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub Ulong);

impl Status {
    pub const OK: Status = Status(cryptoki_sys::CKR_OK);
    pub const GENERAL_ERROR: Status = Status(cryptoki_sys::CKR_GENERAL_ERROR);
    pub const FUNCTION_FAILED: Status = Status(cryptoki_sys::CKR_FUNCTION_FAILED);
    pub const ARGUMENTS_BAD: Status = Status(cryptoki_sys::CKR_ARGUMENTS_BAD);
    pub const SLOT_ID_INVALID: Status = Status(cryptoki_sys::CKR_SLOT_ID_INVALID);
    pub const ATTRIBUTE_SENSITIVE: Status = Status(cryptoki_sys::CKR_ATTRIBUTE_SENSITIVE);
    pub const ATTRIBUTE_TYPE_INVALID: Status = Status(cryptoki_sys::CKR_ATTRIBUTE_TYPE_INVALID);
    pub const DEVICE_ERROR: Status = Status(cryptoki_sys::CKR_DEVICE_ERROR);
    pub const FUNCTION_NOT_SUPPORTED: Status = Status(cryptoki_sys::CKR_FUNCTION_NOT_SUPPORTED);
    pub const KEY_HANDLE_INVALID: Status = Status(cryptoki_sys::CKR_KEY_HANDLE_INVALID);
    pub const KEY_FUNCTION_NOT_PERMITTED: Status =
        Status(cryptoki_sys::CKR_KEY_FUNCTION_NOT_PERMITTED);
    pub const MECHANISM_INVALID: Status = Status(cryptoki_sys::CKR_MECHANISM_INVALID);
    pub const OBJECT_HANDLE_INVALID: Status = Status(cryptoki_sys::CKR_OBJECT_HANDLE_INVALID);
    pub const OPERATION_ACTIVE: Status = Status(cryptoki_sys::CKR_OPERATION_ACTIVE);
    pub const OPERATION_NOT_INITIALIZED: Status =
        Status(cryptoki_sys::CKR_OPERATION_NOT_INITIALIZED);
    pub const PIN_INCORRECT: Status = Status(cryptoki_sys::CKR_PIN_INCORRECT);
    pub const SESSION_HANDLE_INVALID: Status = Status(cryptoki_sys::CKR_SESSION_HANDLE_INVALID);
    pub const SIGNATURE_INVALID: Status = Status(cryptoki_sys::CKR_SIGNATURE_INVALID);
    pub const SIGNATURE_LEN_RANGE: Status = Status(cryptoki_sys::CKR_SIGNATURE_LEN_RANGE);
    pub const USER_ALREADY_LOGGED_IN: Status = Status(cryptoki_sys::CKR_USER_ALREADY_LOGGED_IN);
    pub const USER_NOT_LOGGED_IN: Status = Status(cryptoki_sys::CKR_USER_NOT_LOGGED_IN);
    pub const BUFFER_TOO_SMALL: Status = Status(cryptoki_sys::CKR_BUFFER_TOO_SMALL);
    pub const CRYPTOKI_NOT_INITIALIZED: Status =
        Status(cryptoki_sys::CKR_CRYPTOKI_NOT_INITIALIZED);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    /// Symbolic name, e.g. `CKR_PIN_INCORRECT`
    pub fn name(self) -> String {
        describe(STATUS_NAMES, "CKR_", self.0)
    }

    /// Turn a non-OK status into a [`ModuleError::Call`] naming `operation`
    pub fn check(self, operation: &'static str) -> ProbeResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(ModuleError::Call {
                operation,
                status: self,
            }
            .into())
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({})", self.name())
    }
}
