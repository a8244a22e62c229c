//! Mechanism identifiers

use std::fmt;

use super::names::{describe, name_table, parse_identifier, NameTable};
use super::Ulong;
use crate::error::DomainError;

pub(crate) const MECHANISM_NAMES: NameTable = {
    use cryptoki_sys::*;
    name_table![
        CKM_RSA_PKCS_KEY_PAIR_GEN,
        CKM_RSA_PKCS,
        CKM_RSA_9796,
        CKM_RSA_X_509,
        CKM_MD5_RSA_PKCS,
        CKM_SHA1_RSA_PKCS,
        CKM_RSA_PKCS_OAEP,
        CKM_RSA_PKCS_PSS,
        CKM_SHA1_RSA_PKCS_PSS,
        CKM_SHA256_RSA_PKCS,
        CKM_SHA384_RSA_PKCS,
        CKM_SHA512_RSA_PKCS,
        CKM_SHA256_RSA_PKCS_PSS,
        CKM_SHA384_RSA_PKCS_PSS,
        CKM_SHA512_RSA_PKCS_PSS,
        CKM_DSA_KEY_PAIR_GEN,
        CKM_DSA,
        CKM_DSA_SHA1,
        CKM_DH_PKCS_KEY_PAIR_GEN,
        CKM_DH_PKCS_DERIVE,
        CKM_DES3_KEY_GEN,
        CKM_DES3_ECB,
        CKM_DES3_CBC,
        CKM_MD5,
        CKM_SHA_1,
        CKM_SHA256,
        CKM_SHA384,
        CKM_SHA512,
        CKM_SHA256_HMAC,
        CKM_GENERIC_SECRET_KEY_GEN,
        CKM_EC_KEY_PAIR_GEN,
        CKM_ECDSA,
        CKM_ECDSA_SHA1,
        CKM_ECDSA_SHA256,
        CKM_ECDSA_SHA384,
        CKM_ECDSA_SHA512,
        CKM_ECDH1_DERIVE,
        CKM_EC_EDWARDS_KEY_PAIR_GEN,
        CKM_EDDSA,
        CKM_AES_KEY_GEN,
        CKM_AES_ECB,
        CKM_AES_CBC,
        CKM_AES_CBC_PAD,
        CKM_AES_GCM,
    ]
};

/// Module-defined algorithm identifier (`CK_MECHANISM_TYPE`)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MechanismType(pub Ulong);

impl MechanismType {
    pub const RSA_PKCS: Self = Self(cryptoki_sys::CKM_RSA_PKCS);
    pub const RSA_PKCS_KEY_PAIR_GEN: Self = Self(cryptoki_sys::CKM_RSA_PKCS_KEY_PAIR_GEN);
    pub const SHA256_RSA_PKCS: Self = Self(cryptoki_sys::CKM_SHA256_RSA_PKCS);
    pub const ECDSA: Self = Self(cryptoki_sys::CKM_ECDSA);
    pub const EC_EDWARDS_KEY_PAIR_GEN: Self = Self(cryptoki_sys::CKM_EC_EDWARDS_KEY_PAIR_GEN);
    pub const EDDSA: Self = Self(cryptoki_sys::CKM_EDDSA);

    /// Mechanism used for signing when none is requested
    pub fn default_signing() -> Self {
        Self::RSA_PKCS
    }

    pub fn name(self) -> String {
        describe(MECHANISM_NAMES, "CKM_", self.0)
    }

    /// Parse `CKM_ECDSA`, `ecdsa` or a number
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        parse_identifier(MECHANISM_NAMES, "CKM_", input)
            .map(Self)
            .ok_or_else(|| DomainError::UnknownName {
                kind: "mechanism",
                input: input.to_string(),
            })
    }
}

impl fmt::Display for MechanismType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for MechanismType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MechanismType({})", self.name())
    }
}
