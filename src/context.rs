//! Run context
//!
//! A [`Harness`] owns the loaded module and the single open session of a
//! run. Whatever way the run ends, dropping the harness logs out, closes the
//! session and finalizes the module, in that order.

use tracing::{debug, warn};

use crate::error::ProbeResult;
use crate::model::{LoginState, Session, SessionHandle};
use crate::ports::TokenModule;

#[derive(Debug)]
pub struct Harness<M: TokenModule> {
    module: M,
    session: Option<Session>,
    initialized: bool,
}

impl<M: TokenModule> Harness<M> {
    /// Initialize `module` and take ownership of it
    pub fn initialize(mut module: M) -> ProbeResult<Self> {
        module.initialize()?;
        debug!("Module initialized");
        Ok(Self {
            module,
            session: None,
            initialized: true,
        })
    }

    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Handle of the open session, if one was attached
    pub fn session_handle(&self) -> Option<SessionHandle> {
        self.session.map(|session| session.handle)
    }

    /// Record a freshly opened session so teardown will close it
    pub fn attach(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn set_login(&mut self, login: LoginState) {
        if let Some(session) = self.session.as_mut() {
            session.login = login;
        }
    }

    /// Log out, close the session and finalize the module
    ///
    /// Each step is attempted even when an earlier one failed; the first
    /// failure is returned. Calling this twice is a no-op the second time.
    pub fn teardown(&mut self) -> ProbeResult<()> {
        let mut first_failure = None;

        if let Some(session) = self.session.take() {
            if session.login.is_logged_in() {
                if let Err(err) = self.module.logout(session.handle) {
                    warn!("Logout failed: {}", err);
                    first_failure.get_or_insert(err);
                }
            }
            if let Err(err) = self.module.close_session(session.handle) {
                warn!("Closing session {} failed: {}", session.handle, err);
                first_failure.get_or_insert(err);
            }
        }

        if self.initialized {
            self.initialized = false;
            if let Err(err) = self.module.finalize() {
                warn!("Finalize failed: {}", err);
                first_failure.get_or_insert(err);
            }
        }

        first_failure.map_or(Ok(()), Err)
    }
}

impl<M: TokenModule> Drop for Harness<M> {
    fn drop(&mut self) {
        // Failures were already logged
        let _ = self.teardown();
    }
}
