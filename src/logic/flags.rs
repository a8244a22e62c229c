//! Capability flag rendering
//!
//! Flag words are rendered by walking a static name table in its declared
//! order and joining the names whose bits are set.

use crate::model::names::{name_table, NameTable};
use crate::model::Ulong;

pub const SEPARATOR: &str = "|";

/// Ordered table of flag names and their bits
#[derive(Debug, Clone, Copy)]
pub struct FlagTable(NameTable);

impl FlagTable {
    pub const fn new(entries: NameTable) -> Self {
        Self(entries)
    }

    pub fn render(&self, mask: Ulong) -> String {
        render(self, mask)
    }
}

/// Names from `table` whose bits are set in `mask`, in table order
///
/// Returns an empty string when nothing matches.
pub fn render(table: &FlagTable, mask: Ulong) -> String {
    table
        .0
        .iter()
        .filter(|(_, bit)| mask & *bit != 0)
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

pub static SLOT_FLAGS: FlagTable = FlagTable::new({
    use cryptoki_sys::*;
    name_table![CKF_TOKEN_PRESENT, CKF_REMOVABLE_DEVICE, CKF_HW_SLOT]
});

pub static TOKEN_FLAGS: FlagTable = FlagTable::new({
    use cryptoki_sys::*;
    name_table![
        CKF_RNG,
        CKF_WRITE_PROTECTED,
        CKF_LOGIN_REQUIRED,
        CKF_USER_PIN_INITIALIZED,
        CKF_RESTORE_KEY_NOT_NEEDED,
        CKF_CLOCK_ON_TOKEN,
        CKF_PROTECTED_AUTHENTICATION_PATH,
        CKF_DUAL_CRYPTO_OPERATIONS,
        CKF_TOKEN_INITIALIZED,
        CKF_SECONDARY_AUTHENTICATION,
        CKF_USER_PIN_COUNT_LOW,
        CKF_USER_PIN_FINAL_TRY,
        CKF_USER_PIN_LOCKED,
        CKF_USER_PIN_TO_BE_CHANGED,
        CKF_SO_PIN_COUNT_LOW,
        CKF_SO_PIN_FINAL_TRY,
        CKF_SO_PIN_LOCKED,
        CKF_SO_PIN_TO_BE_CHANGED,
    ]
});

pub static SESSION_FLAGS: FlagTable = FlagTable::new({
    use cryptoki_sys::*;
    name_table![CKF_RW_SESSION, CKF_SERIAL_SESSION]
});

pub static MECHANISM_FLAGS: FlagTable = FlagTable::new({
    use cryptoki_sys::*;
    name_table![
        CKF_HW,
        CKF_ENCRYPT,
        CKF_DECRYPT,
        CKF_DIGEST,
        CKF_SIGN,
        CKF_SIGN_RECOVER,
        CKF_VERIFY,
        CKF_VERIFY_RECOVER,
        CKF_GENERATE,
        CKF_GENERATE_KEY_PAIR,
        CKF_WRAP,
        CKF_UNWRAP,
        CKF_DERIVE,
        CKF_EXTENSION,
    ]
});
