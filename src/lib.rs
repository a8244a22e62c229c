//! Diagnostic harness for PKCS#11 modules
//!
//! Loads a module, reports on its slots, tokens and mechanisms, walks the
//! objects on a token probing their attributes, and checks that signatures
//! made by the token verify against its own public keys.

mod adapters;
pub mod api;
pub mod context;
pub mod error;
mod logic;
pub mod model;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use adapters::{Pkcs11Module, StaticCredential, TerminalPrompt};
pub use context::Harness;
pub use error::{ProbeError, ProbeResult};
pub use logic::codec::{padded_text, AttributeDescriptor, Decoder, ShapeError};
pub use logic::flags::{FlagTable, MECHANISM_FLAGS, SESSION_FLAGS, SLOT_FLAGS, TOKEN_FLAGS};

// Re-export public API
pub use api::{
    dump_attributes, open_module, open_session, report_object, report_objects, report_pass,
    sign_and_verify, verify_signature, SignRequest, VerifyRequest,
};
