//! Symbolic name tables for the module's numeric identifiers
//!
//! Every identifier the module hands back (return codes, attribute types,
//! mechanisms, object classes, flags) is a bare `CK_ULONG`. These tables map
//! them to the constant names used by the standard so reports never show a
//! bare number where a name is known.

use super::Ulong;

/// A static table of `(name, value)` pairs, kept in declaration order
pub type NameTable = &'static [(&'static str, Ulong)];

/// Start of the vendor-defined range shared by all identifier families
pub const VENDOR_DEFINED: Ulong = 0x8000_0000;

/// Builds a [`NameTable`] from constants in scope, naming each entry after
/// the constant itself.
macro_rules! name_table {
    ($($constant:ident),+ $(,)?) => {
        &[$((stringify!($constant), $constant)),+]
    };
}

pub(crate) use name_table;

/// Look up the name registered for `value`
pub fn name_of(table: NameTable, value: Ulong) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, candidate)| *candidate == value)
        .map(|(name, _)| *name)
}

/// Look up the value registered under `name` (case-insensitive)
pub fn value_of(table: NameTable, name: &str) -> Option<Ulong> {
    table
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map(|(_, value)| *value)
}

/// Render `value` by name, falling back to a vendor or unknown marker
///
/// `prefix` is the family prefix (`"CKR_"`, `"CKA_"`, ...).
pub fn describe(table: NameTable, prefix: &str, value: Ulong) -> String {
    match name_of(table, value) {
        Some(name) => name.to_string(),
        None if value >= VENDOR_DEFINED => {
            format!("{prefix}VENDOR_DEFINED+{:#x}", value - VENDOR_DEFINED)
        }
        None => format!("{prefix}UNKNOWN({:#x})", value),
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal number
pub fn parse_number(input: &str) -> Option<Ulong> {
    let input = input.trim();
    if let Some(hex) = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Ulong::from_str_radix(hex, 16).ok()
    } else {
        input.parse().ok()
    }
}

/// Parse an identifier given as a full name (`CKA_ID`), a name without the
/// family prefix (`id`), or a number.
pub fn parse_identifier(table: NameTable, prefix: &str, input: &str) -> Option<Ulong> {
    let input = input.trim();
    value_of(table, input)
        .or_else(|| value_of(table, &format!("{prefix}{input}")))
        .or_else(|| parse_number(input))
}
