//! Attribute identities, object classes and find templates

use std::fmt;

use super::names::{describe, name_table, parse_identifier, NameTable, VENDOR_DEFINED};
use super::Ulong;
use crate::error::DomainError;

pub(crate) const ATTRIBUTE_NAMES: NameTable = {
    use cryptoki_sys::*;
    name_table![
        CKA_CLASS,
        CKA_TOKEN,
        CKA_PRIVATE,
        CKA_LABEL,
        CKA_APPLICATION,
        CKA_VALUE,
        CKA_OBJECT_ID,
        CKA_CERTIFICATE_TYPE,
        CKA_ISSUER,
        CKA_SERIAL_NUMBER,
        CKA_TRUSTED,
        CKA_CERTIFICATE_CATEGORY,
        CKA_KEY_TYPE,
        CKA_SUBJECT,
        CKA_ID,
        CKA_SENSITIVE,
        CKA_ENCRYPT,
        CKA_DECRYPT,
        CKA_WRAP,
        CKA_UNWRAP,
        CKA_SIGN,
        CKA_SIGN_RECOVER,
        CKA_VERIFY,
        CKA_VERIFY_RECOVER,
        CKA_DERIVE,
        CKA_START_DATE,
        CKA_END_DATE,
        CKA_MODULUS,
        CKA_MODULUS_BITS,
        CKA_PUBLIC_EXPONENT,
        CKA_PRIVATE_EXPONENT,
        CKA_VALUE_LEN,
        CKA_EXTRACTABLE,
        CKA_LOCAL,
        CKA_NEVER_EXTRACTABLE,
        CKA_ALWAYS_SENSITIVE,
        CKA_KEY_GEN_MECHANISM,
        CKA_MODIFIABLE,
        CKA_EC_PARAMS,
        CKA_EC_POINT,
        CKA_ALWAYS_AUTHENTICATE,
        CKA_WRAP_WITH_TRUSTED,
        CKA_ALLOWED_MECHANISMS,
    ]
};

pub(crate) const CLASS_NAMES: NameTable = {
    use cryptoki_sys::*;
    name_table![
        CKO_DATA,
        CKO_CERTIFICATE,
        CKO_PUBLIC_KEY,
        CKO_PRIVATE_KEY,
        CKO_SECRET_KEY,
        CKO_HW_FEATURE,
        CKO_DOMAIN_PARAMETERS,
        CKO_MECHANISM,
    ]
};

/// Module-defined identity of an object property (`CK_ATTRIBUTE_TYPE`)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeType(pub Ulong);

impl AttributeType {
    pub const CLASS: Self = Self(cryptoki_sys::CKA_CLASS);
    pub const TOKEN: Self = Self(cryptoki_sys::CKA_TOKEN);
    pub const PRIVATE: Self = Self(cryptoki_sys::CKA_PRIVATE);
    pub const LABEL: Self = Self(cryptoki_sys::CKA_LABEL);
    pub const APPLICATION: Self = Self(cryptoki_sys::CKA_APPLICATION);
    pub const VALUE: Self = Self(cryptoki_sys::CKA_VALUE);
    pub const OBJECT_ID: Self = Self(cryptoki_sys::CKA_OBJECT_ID);
    pub const CERTIFICATE_TYPE: Self = Self(cryptoki_sys::CKA_CERTIFICATE_TYPE);
    pub const ISSUER: Self = Self(cryptoki_sys::CKA_ISSUER);
    pub const SERIAL_NUMBER: Self = Self(cryptoki_sys::CKA_SERIAL_NUMBER);
    pub const KEY_TYPE: Self = Self(cryptoki_sys::CKA_KEY_TYPE);
    pub const SUBJECT: Self = Self(cryptoki_sys::CKA_SUBJECT);
    pub const ID: Self = Self(cryptoki_sys::CKA_ID);
    pub const SENSITIVE: Self = Self(cryptoki_sys::CKA_SENSITIVE);
    pub const SIGN: Self = Self(cryptoki_sys::CKA_SIGN);
    pub const VERIFY: Self = Self(cryptoki_sys::CKA_VERIFY);
    pub const MODULUS: Self = Self(cryptoki_sys::CKA_MODULUS);
    pub const MODULUS_BITS: Self = Self(cryptoki_sys::CKA_MODULUS_BITS);
    pub const EC_POINT: Self = Self(cryptoki_sys::CKA_EC_POINT);
    pub const VALUE_LEN: Self = Self(cryptoki_sys::CKA_VALUE_LEN);
    pub const KEY_GEN_MECHANISM: Self = Self(cryptoki_sys::CKA_KEY_GEN_MECHANISM);
    pub const ALLOWED_MECHANISMS: Self = Self(cryptoki_sys::CKA_ALLOWED_MECHANISMS);

    pub fn name(self) -> String {
        describe(ATTRIBUTE_NAMES, "CKA_", self.0)
    }

    /// Parse `CKA_ID`, `id` or a number
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        parse_identifier(ATTRIBUTE_NAMES, "CKA_", input)
            .map(Self)
            .ok_or_else(|| DomainError::UnknownName {
                kind: "attribute",
                input: input.to_string(),
            })
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeType({})", self.name())
    }
}

/// Kind of stored object, the decoded value of `CKA_CLASS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Data,
    Certificate,
    PublicKey,
    PrivateKey,
    SecretKey,
    HardwareFeature,
    DomainParameters,
    Mechanism,
    VendorDefined(Ulong),
    Other(Ulong),
}

impl ObjectClass {
    pub fn from_raw(raw: Ulong) -> Self {
        use cryptoki_sys::*;
        match raw {
            CKO_DATA => Self::Data,
            CKO_CERTIFICATE => Self::Certificate,
            CKO_PUBLIC_KEY => Self::PublicKey,
            CKO_PRIVATE_KEY => Self::PrivateKey,
            CKO_SECRET_KEY => Self::SecretKey,
            CKO_HW_FEATURE => Self::HardwareFeature,
            CKO_DOMAIN_PARAMETERS => Self::DomainParameters,
            CKO_MECHANISM => Self::Mechanism,
            raw if raw >= VENDOR_DEFINED => Self::VendorDefined(raw),
            raw => Self::Other(raw),
        }
    }

    pub fn raw(self) -> Ulong {
        use cryptoki_sys::*;
        match self {
            Self::Data => CKO_DATA,
            Self::Certificate => CKO_CERTIFICATE,
            Self::PublicKey => CKO_PUBLIC_KEY,
            Self::PrivateKey => CKO_PRIVATE_KEY,
            Self::SecretKey => CKO_SECRET_KEY,
            Self::HardwareFeature => CKO_HW_FEATURE,
            Self::DomainParameters => CKO_DOMAIN_PARAMETERS,
            Self::Mechanism => CKO_MECHANISM,
            Self::VendorDefined(raw) | Self::Other(raw) => raw,
        }
    }

    pub fn name(self) -> String {
        describe(CLASS_NAMES, "CKO_", self.raw())
    }

    /// Parse `CKO_PUBLIC_KEY`, `public_key` or a number
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        parse_identifier(CLASS_NAMES, "CKO_", input)
            .map(Self::from_raw)
            .ok_or_else(|| DomainError::UnknownName {
                kind: "object class",
                input: input.to_string(),
            })
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// One equality predicate of a find template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub kind: AttributeType,
    pub value: Vec<u8>,
}

impl Attribute {
    pub fn new(kind: AttributeType, value: Vec<u8>) -> Self {
        Self { kind, value }
    }

    /// Native-width integral attribute value
    pub fn ulong(kind: AttributeType, value: Ulong) -> Self {
        Self::new(kind, value.to_ne_bytes().to_vec())
    }

    pub fn class(class: ObjectClass) -> Self {
        Self::ulong(AttributeType::CLASS, class.raw())
    }

    pub fn id(id: &[u8]) -> Self {
        Self::new(AttributeType::ID, id.to_vec())
    }
}
