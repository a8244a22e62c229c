//! Session bootstrap use case
//!
//! Lists the module, picks a slot, reports on it, opens the run's session
//! and logs in. Slot, token, mechanism and session details are reported on a
//! best-effort basis; slot selection, session opening and login are
//! fail-fast.

use std::fmt;

use tracing::{debug, info, warn};

use crate::context::Harness;
use crate::error::{ModuleError, ProbeError, ProbeResult};
use crate::logic::flags::{MECHANISM_FLAGS, SESSION_FLAGS, SLOT_FLAGS, TOKEN_FLAGS};
use crate::model::{
    LoginState, MechanismInfo, MechanismType, ModuleInfo, Pin, Session, SessionInfo, SlotId,
    SlotInfo, Status, TokenInfo,
};
use crate::ports::{CredentialSource, TokenModule};

pub const PIN_PROMPT: &str = "Enter PIN: ";

/// How the run's session is set up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Slot to open; the first listed slot when `None`
    pub slot: Option<SlotId>,
    /// Only list slots that hold a token
    pub require_token: bool,
    /// Log in after opening the session
    pub login: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            slot: None,
            require_token: true,
            login: true,
        }
    }
}

/// Mechanisms of a slot, up to the first one whose details could not be read
#[derive(Debug, Default)]
pub struct MechanismListing {
    pub total: usize,
    pub mechanisms: Vec<(MechanismType, MechanismInfo)>,
    pub stopped: Option<(MechanismType, ProbeError)>,
}

/// Everything reported about the selected slot
#[derive(Debug)]
pub struct SlotReport {
    pub slot: SlotId,
    pub slot_info: ProbeResult<SlotInfo>,
    pub token_info: ProbeResult<TokenInfo>,
    pub mechanisms: ProbeResult<MechanismListing>,
}

impl SlotReport {
    fn protected_authentication_path(&self) -> bool {
        self.token_info
            .as_ref()
            .is_ok_and(TokenInfo::has_protected_authentication_path)
    }
}

#[derive(Debug)]
pub struct BootstrapReport {
    pub module: ProbeResult<ModuleInfo>,
    pub slots: Vec<SlotId>,
    pub slot: SlotReport,
    pub session: ProbeResult<SessionInfo>,
    pub login: LoginState,
}

/// Slots the module lists and the one the run will use
pub fn select_slot<M: TokenModule>(
    module: &mut M,
    config: &SessionConfig,
) -> ProbeResult<(Vec<SlotId>, SlotId)> {
    let slots = module.slot_list(config.require_token)?;
    let first = *slots.first().ok_or(ModuleError::NoSlots)?;
    let selected = config.slot.unwrap_or(first);
    info!("Found {} slots, using slot {}", slots.len(), selected);
    Ok((slots, selected))
}

/// Mechanism list of `slot` with the details of each mechanism
///
/// Listing stops at the first mechanism whose details cannot be read.
pub fn list_mechanisms<M: TokenModule>(
    module: &mut M,
    slot: SlotId,
) -> ProbeResult<MechanismListing> {
    let all = module.mechanism_list(slot)?;
    let mut listing = MechanismListing {
        total: all.len(),
        ..MechanismListing::default()
    };
    for mechanism in all {
        match module.mechanism_info(slot, mechanism) {
            Ok(details) => listing.mechanisms.push((mechanism, details)),
            Err(err) => {
                warn!("Reading details of {} failed: {}", mechanism, err);
                listing.stopped = Some((mechanism, err));
                break;
            }
        }
    }
    Ok(listing)
}

/// Slot, token and mechanism details for `slot`; failures are kept in the report
pub fn describe_slot<M: TokenModule>(module: &mut M, slot: SlotId) -> SlotReport {
    let report = SlotReport {
        slot,
        slot_info: module.slot_info(slot),
        token_info: module.token_info(slot),
        mechanisms: list_mechanisms(module, slot),
    };
    if let Err(err) = &report.slot_info {
        warn!("Reading slot {} failed: {}", slot, err);
    }
    if let Err(err) = &report.token_info {
        warn!("Reading token in slot {} failed: {}", slot, err);
    }
    if let Err(err) = &report.mechanisms {
        warn!("Listing mechanisms of slot {} failed: {}", slot, err);
    }
    report
}

/// Log in on the harness's session
///
/// A token with its own PIN entry device is logged into without a PIN;
/// otherwise the PIN comes from `credentials`.
pub fn login<M, C>(
    harness: &mut Harness<M>,
    protected_path: bool,
    credentials: &mut C,
) -> ProbeResult<LoginState>
where
    M: TokenModule,
    C: CredentialSource + ?Sized,
{
    let Some(handle) = harness.session_handle() else {
        return Err(ModuleError::Call {
            operation: "C_Login",
            status: Status::SESSION_HANDLE_INVALID,
        }
        .into());
    };

    let state = if protected_path {
        debug!("Token has a protected authentication path, not prompting");
        harness.module_mut().login(handle, None)?;
        LoginState::ProtectedPath
    } else {
        let pin = credentials.prompt(PIN_PROMPT, Pin::MAX_LENGTH)?;
        harness.module_mut().login(handle, Some(&pin))?;
        LoginState::LoggedIn
    };
    harness.set_login(state);
    info!("Logged in to session {}", handle);
    Ok(state)
}

/// Bring the harness from an initialized module to an open session
pub fn bootstrap<M, C>(
    harness: &mut Harness<M>,
    config: &SessionConfig,
    credentials: &mut C,
) -> ProbeResult<BootstrapReport>
where
    M: TokenModule,
    C: CredentialSource + ?Sized,
{
    let module_info = harness.module_mut().info();
    if let Err(err) = &module_info {
        warn!("Reading module info failed: {}", err);
    }

    let (slots, selected) = select_slot(harness.module_mut(), config)?;
    let slot = describe_slot(harness.module_mut(), selected);

    let handle = harness.module_mut().open_session(selected)?;
    harness.attach(Session::new(handle, selected));
    debug!("Opened session {} on slot {}", handle, selected);

    let session = harness.module_mut().session_info(handle);
    if let Err(err) = &session {
        warn!("Reading session info failed: {}", err);
    }

    let login_state = if config.login {
        login(harness, slot.protected_authentication_path(), credentials)?
    } else {
        LoginState::NotLoggedIn
    };

    Ok(BootstrapReport {
        module: module_info,
        slots,
        slot,
        session,
        login: login_state,
    })
}

impl fmt::Display for BootstrapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Ok(info) => write_module(f, info)?,
            Err(err) => writeln!(f, "Unable to get module info: {}", err)?,
        }
        writeln!(f, "Found {} slots", self.slots.len())?;
        write!(f, "{}", self.slot)?;
        match &self.session {
            Ok(info) => write_session(f, info)?,
            Err(err) => writeln!(f, "Unable to get session info: {}", err)?,
        }
        Ok(())
    }
}

impl fmt::Display for SlotReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Slot {}", self.slot)?;
        match &self.slot_info {
            Ok(info) => {
                writeln!(f, "Slot Description: {}", info.description)?;
                writeln!(f, "Slot Manufacturer: {}", info.manufacturer)?;
                writeln!(f, "Slot HW version: {}", info.hardware_version)?;
                writeln!(f, "Slot FW version: {}", info.firmware_version)?;
                writeln!(f, "Slot flags: {}", SLOT_FLAGS.render(info.flags))?;
            }
            Err(err) => writeln!(f, "Unable to get slot info: {}", err)?,
        }
        match &self.token_info {
            Ok(info) => write_token(f, info)?,
            Err(err) => writeln!(f, "Unable to get token info: {}", err)?,
        }
        match &self.mechanisms {
            Ok(listing) => write!(f, "{}", listing)?,
            Err(err) => writeln!(f, "Unable to list mechanisms: {}", err)?,
        }
        Ok(())
    }
}

impl fmt::Display for MechanismListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.total == 1 { "" } else { "s" };
        writeln!(f, "Token supports {} mechanism{}", self.total, plural)?;
        for (mechanism, details) in &self.mechanisms {
            writeln!(f, "{}", mechanism)?;
            writeln!(
                f,
                "Min key size = {}, max key size = {}",
                details.min_key_size, details.max_key_size
            )?;
            writeln!(f, "Flags: {}", MECHANISM_FLAGS.render(details.flags))?;
        }
        if let Some((mechanism, err)) = &self.stopped {
            writeln!(f, "{}", mechanism)?;
            writeln!(f, "Listing stopped: {}", err)?;
        }
        Ok(())
    }
}

fn write_module(f: &mut fmt::Formatter<'_>, info: &ModuleInfo) -> fmt::Result {
    writeln!(f, "PKCS#11 Version: {}", info.cryptoki_version)?;
    writeln!(f, "Lib manufacturer: {}", info.manufacturer)?;
    writeln!(f, "Lib description: {}", info.description)?;
    writeln!(f, "Lib version: {}", info.library_version)?;
    writeln!(f, "Lib flags: {}", info.flags)
}

fn write_token(f: &mut fmt::Formatter<'_>, info: &TokenInfo) -> fmt::Result {
    writeln!(f, "Token label: {}", info.label)?;
    writeln!(f, "Token Manufacturer: {}", info.manufacturer)?;
    writeln!(f, "Token Model: {}", info.model)?;
    writeln!(f, "Token Serial: {}", info.serial_number)?;
    writeln!(f, "Token flags: {}", TOKEN_FLAGS.render(info.flags))?;
    writeln!(f, "Token MaxSessionCount = {}", info.max_session_count)?;
    writeln!(f, "Token SessionCount = {}", info.session_count)?;
    writeln!(f, "Token MaxRwSessionCount = {}", info.max_rw_session_count)?;
    writeln!(f, "Token RwSessionCount = {}", info.rw_session_count)?;
    writeln!(f, "Token Max PIN len = {}", info.max_pin_len)?;
    writeln!(f, "Token Min PIN len = {}", info.min_pin_len)?;
    writeln!(f, "Token total public mem = {}", info.total_public_memory)?;
    writeln!(f, "Token free public mem = {}", info.free_public_memory)?;
    writeln!(f, "Token total private mem = {}", info.total_private_memory)?;
    writeln!(f, "Token free private mem = {}", info.free_private_memory)?;
    writeln!(f, "Token hardware version = {}", info.hardware_version)?;
    writeln!(f, "Token firmware version = {}", info.firmware_version)?;
    writeln!(f, "Token utcTime = {}", info.utc_time)
}

fn write_session(f: &mut fmt::Formatter<'_>, info: &SessionInfo) -> fmt::Result {
    writeln!(f, "Session slot: {}", info.slot)?;
    writeln!(f, "Session state: {}", info.state)?;
    writeln!(f, "Session flags: {}", SESSION_FLAGS.render(info.flags))?;
    writeln!(f, "Session device errors: {}", info.device_error)
}
