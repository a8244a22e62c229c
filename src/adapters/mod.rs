//! Adapters - concrete implementations of ports (traits)

mod credential;
mod pkcs11_module;

#[cfg(test)]
pub mod fake_token;

pub use credential::{StaticCredential, TerminalPrompt};
pub use pkcs11_module::Pkcs11Module;
