//! CredentialSource trait - capability to obtain the user PIN

use crate::error::ProbeResult;
use crate::model::Pin;

/// Source of the PIN handed to `C_Login`
///
/// Implementations that touch the terminal must restore its previous state
/// on every exit path before returning.
pub trait CredentialSource {
    /// Obtain a PIN of at most `max_len` bytes, announcing it with `label`
    ///
    /// # Errors
    ///
    /// Returns a credential error when nothing usable could be read; never
    /// returns a partial or garbage PIN.
    fn prompt(&mut self, label: &str, max_len: usize) -> ProbeResult<Pin>;
}
