//! Opaque handles and the open session record

use std::fmt;

use super::Ulong;

/// Identifier of a slot as listed by the module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub Ulong);

/// Handle of an open session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub Ulong);

/// Handle of a stored object, only meaningful within its session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub Ulong);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the session was authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    NotLoggedIn,
    /// Logged in with a PIN from the credential source
    LoggedIn,
    /// Logged in through the token's own PIN entry device
    ProtectedPath,
}

impl LoginState {
    pub fn is_logged_in(self) -> bool {
        !matches!(self, Self::NotLoggedIn)
    }
}

/// The single open session of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub handle: SessionHandle,
    pub slot: SlotId,
    pub login: LoginState,
}

impl Session {
    pub fn new(handle: SessionHandle, slot: SlotId) -> Self {
        Self {
            handle,
            slot,
            login: LoginState::NotLoggedIn,
        }
    }
}
