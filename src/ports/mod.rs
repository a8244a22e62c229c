//! Ports (traits) for talking to a loaded module
//!
//! The core depends on these abstractions, not on a concrete shared library
//! or terminal. Adapters implement them.

mod credential;
mod module;


pub use credential::CredentialSource;
pub use module::{AttributeReply, TokenModule, ValueLength};
