//! Attribute codec: identity -> label + decoder
//!
//! The registry is a static table of tagged decoders keyed by attribute
//! identity. Decoders are pure functions of the raw bytes. Only the
//! fixed-width numeric decoders validate the length; blobs, text and lists
//! accept whatever the module returned.

use thiserror::Error;

use crate::model::{AttributeType, MechanismType, ObjectClass, Ulong, ULONG_SIZE};

/// A value whose length does not match the fixed size of its type
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeError {
    #[error("unexpected length (got {got}, expected {expected})")]
    UnexpectedLength { got: usize, expected: usize },
}

/// Shape of an attribute value and how to render it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    /// `CK_OBJECT_CLASS`, rendered by name
    ObjectClass,
    /// `CK_KEY_TYPE`, rendered as a description
    KeyType,
    /// `CK_CERTIFICATE_TYPE`, rendered as a description
    CertificateType,
    /// Single `CK_MECHANISM_TYPE`
    Mechanism,
    /// Array of `CK_MECHANISM_TYPE`
    MechanismList,
    /// Plain `CK_ULONG`
    Number,
    /// `CK_BBOOL`
    Boolean,
    /// Opaque blob as lower-case hex
    Hex,
    /// Padded text
    Text,
    /// Only the byte count, for values not worth displaying
    Length,
}

impl Decoder {
    pub fn decode(self, bytes: &[u8]) -> Result<String, ShapeError> {
        match self {
            Decoder::ObjectClass => read_ulong(bytes).map(|raw| ObjectClass::from_raw(raw).name()),
            Decoder::KeyType => read_ulong(bytes).map(key_type_label),
            Decoder::CertificateType => read_ulong(bytes).map(certificate_type_label),
            Decoder::Mechanism => read_ulong(bytes).map(|raw| MechanismType(raw).name()),
            Decoder::MechanismList => Ok(mechanism_list(bytes)),
            Decoder::Number => read_ulong(bytes).map(|raw| raw.to_string()),
            Decoder::Boolean => match bytes {
                [0] => Ok("false".to_string()),
                [_] => Ok("true".to_string()),
                _ => Err(ShapeError::UnexpectedLength {
                    got: bytes.len(),
                    expected: 1,
                }),
            },
            Decoder::Hex => Ok(hex::encode(bytes)),
            Decoder::Text => Ok(padded_text(bytes)),
            Decoder::Length => Ok(format!("{} bytes", bytes.len())),
        }
    }
}

/// Label and decoder registered for one attribute identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub attribute: AttributeType,
    pub label: &'static str,
    pub decoder: Decoder,
}

impl AttributeDescriptor {
    pub const fn new(attribute: AttributeType, label: &'static str, decoder: Decoder) -> Self {
        Self {
            attribute,
            label,
            decoder,
        }
    }

    /// Hex descriptor for identities with no registered entry
    pub const fn generic(attribute: AttributeType) -> Self {
        Self::new(attribute, "", Decoder::Hex)
    }

    /// Printed label; unregistered identities use the attribute name
    pub fn label(&self) -> String {
        if self.label.is_empty() {
            self.attribute.name()
        } else {
            self.label.to_string()
        }
    }

    /// Decode, rendering a shape error in place of the value
    pub fn render(&self, bytes: &[u8]) -> String {
        self.decoder
            .decode(bytes)
            .unwrap_or_else(|shape| shape.to_string())
    }
}

pub static CLASS: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::CLASS, "Object class", Decoder::ObjectClass);
pub static ID: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::ID, "Key Identifier", Decoder::Hex);
pub static LABEL: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::LABEL, "Label", Decoder::Text);
pub static CERTIFICATE_TYPE: AttributeDescriptor = AttributeDescriptor::new(
    AttributeType::CERTIFICATE_TYPE,
    "Certificate Type",
    Decoder::CertificateType,
);
pub static VALUE: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::VALUE, "Object value", Decoder::Length);
pub static APPLICATION: AttributeDescriptor = AttributeDescriptor::new(
    AttributeType::APPLICATION,
    "Application Description",
    Decoder::Text,
);
pub static OBJECT_ID: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::OBJECT_ID, "Object ID", Decoder::Hex);
pub static KEY_GEN_MECHANISM: AttributeDescriptor = AttributeDescriptor::new(
    AttributeType::KEY_GEN_MECHANISM,
    "Key Generation Mechanism",
    Decoder::Mechanism,
);
pub static ALLOWED_MECHANISMS: AttributeDescriptor = AttributeDescriptor::new(
    AttributeType::ALLOWED_MECHANISMS,
    "Allowed Mechanisms",
    Decoder::MechanismList,
);
pub static SUBJECT: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::SUBJECT, "Subject name", Decoder::Hex);
pub static KEY_TYPE: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::KEY_TYPE, "Key type", Decoder::KeyType);
pub static ISSUER: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::ISSUER, "Certificate issuer", Decoder::Hex);
pub static SERIAL_NUMBER: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::SERIAL_NUMBER, "Serial number", Decoder::Hex);
pub static TOKEN: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::TOKEN, "Token object", Decoder::Boolean);
pub static PRIVATE: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::PRIVATE, "Private object", Decoder::Boolean);
pub static SENSITIVE: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::SENSITIVE, "Sensitive", Decoder::Boolean);
pub static SIGN: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::SIGN, "Can sign", Decoder::Boolean);
pub static VERIFY: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::VERIFY, "Can verify", Decoder::Boolean);
pub static MODULUS: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::MODULUS, "Modulus", Decoder::Length);
pub static MODULUS_BITS: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::MODULUS_BITS, "Modulus bits", Decoder::Number);
pub static EC_POINT: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::EC_POINT, "EC point", Decoder::Hex);
pub static VALUE_LEN: AttributeDescriptor =
    AttributeDescriptor::new(AttributeType::VALUE_LEN, "Value length", Decoder::Number);

static REGISTRY: &[&AttributeDescriptor] = &[
    &CLASS,
    &ID,
    &LABEL,
    &CERTIFICATE_TYPE,
    &VALUE,
    &APPLICATION,
    &OBJECT_ID,
    &KEY_GEN_MECHANISM,
    &ALLOWED_MECHANISMS,
    &SUBJECT,
    &KEY_TYPE,
    &ISSUER,
    &SERIAL_NUMBER,
    &TOKEN,
    &PRIVATE,
    &SENSITIVE,
    &SIGN,
    &VERIFY,
    &MODULUS,
    &MODULUS_BITS,
    &EC_POINT,
    &VALUE_LEN,
];

/// Registered descriptor for `attribute`
pub fn lookup(attribute: AttributeType) -> Option<&'static AttributeDescriptor> {
    REGISTRY
        .iter()
        .copied()
        .find(|descriptor| descriptor.attribute == attribute)
}

/// Registered descriptor, or a hex rendering under the attribute's name
pub fn lookup_or_generic(attribute: AttributeType) -> AttributeDescriptor {
    lookup(attribute)
        .copied()
        .unwrap_or_else(|| AttributeDescriptor::generic(attribute))
}

/// Read a native-width integral value, requiring the exact width
pub fn read_ulong(bytes: &[u8]) -> Result<Ulong, ShapeError> {
    let raw: [u8; ULONG_SIZE] = bytes.try_into().map_err(|_| ShapeError::UnexpectedLength {
        got: bytes.len(),
        expected: ULONG_SIZE,
    })?;
    Ok(Ulong::from_ne_bytes(raw))
}

/// Fixed-width text with trailing spaces and NULs stripped
pub fn padded_text(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|b| *b != b' ' && *b != 0)
        .map_or(0, |last| last + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn mechanism_list(bytes: &[u8]) -> String {
    bytes
        .chunks_exact(ULONG_SIZE)
        .map(|chunk| {
            let mut raw = [0u8; ULONG_SIZE];
            raw.copy_from_slice(chunk);
            MechanismType(Ulong::from_ne_bytes(raw)).name()
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_type_label(raw: Ulong) -> String {
    use cryptoki_sys::*;
    let label = match raw {
        CKK_RSA => "RSA Key",
        CKK_DSA => "DSA Key",
        CKK_DH => "DH Key",
        CKK_EC => "EC Key",
        CKK_EC_EDWARDS => "EdDSA Key",
        CKK_GENERIC_SECRET => "Generic Secret Key",
        CKK_DES3 => "Triple-DES Key",
        CKK_AES => "AES Key",
        _ => return format!("Unknown key type: {:#x}", raw),
    };
    label.to_string()
}

fn certificate_type_label(raw: Ulong) -> String {
    use cryptoki_sys::*;
    let label = match raw {
        CKC_X_509 => "X.509 Certificate",
        CKC_WTLS => "WTLS Certificate",
        CKC_X_509_ATTR_CERT => "X.509 Attribute Certificate",
        _ => return format!("Unknown certificate type: {:#x}", raw),
    };
    label.to_string()
}
