//! PIN sources: the controlling terminal, or a PIN fixed up front

use std::io::{self, Read, Write};

use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{CredentialError, ProbeResult};
use crate::model::{Pin, PinError};
use crate::ports::CredentialSource;

/// Reads the PIN from standard input with terminal echo switched off
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl CredentialSource for TerminalPrompt {
    fn prompt(&mut self, label: &str, max_len: usize) -> ProbeResult<Pin> {
        let mut stderr = io::stderr();
        write!(stderr, "{}", label).map_err(CredentialError::Io)?;
        stderr.flush().map_err(CredentialError::Io)?;

        let entered = read_hidden();
        // Echo was off, so the user's Enter never reached the screen
        writeln!(stderr).map_err(CredentialError::Io)?;

        let entered = entered?;
        if entered.len() > max_len {
            return Err(PinError::TooLong.into());
        }
        debug!("Read a {}-byte PIN from the terminal", entered.len());
        Ok(Pin::new(entered.to_vec())?)
    }
}

/// Control-C as it arrives once signal generation is off
const ETX: u8 = 0x03;
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// Read one PIN entry a byte at a time
///
/// Enter or end of input finishes the entry, backspace and delete drop the
/// last byte, and Control-C interrupts as soon as it is typed.
#[cfg_attr(not(unix), allow(dead_code))]
fn read_entry<R: Read>(reader: R) -> Result<Zeroizing<Vec<u8>>, CredentialError> {
    let mut entered = Zeroizing::new(Vec::new());
    let mut saw_input = false;
    for byte in reader.bytes() {
        saw_input = true;
        match byte? {
            b'\n' | b'\r' => return Ok(entered),
            ETX => return Err(CredentialError::Interrupted),
            BACKSPACE | DELETE => {
                entered.pop();
            }
            byte => entered.push(byte),
        }
    }
    if !saw_input {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(entered)
}

#[cfg(unix)]
fn read_hidden() -> Result<Zeroizing<Vec<u8>>, CredentialError> {
    use std::os::fd::AsRawFd;

    let stdin = io::stdin();
    let _guard = echo::EchoGuard::disable(stdin.as_raw_fd())?;
    read_entry(stdin.lock())
}

#[cfg(not(unix))]
fn read_hidden() -> Result<Zeroizing<Vec<u8>>, CredentialError> {
    Err(CredentialError::Unsupported)
}

#[cfg(unix)]
mod echo {
    use std::io;
    use std::os::fd::RawFd;

    use crate::error::CredentialError;

    /// Terminal attributes saved before echo was switched off
    ///
    /// Dropping the guard puts them back, whichever way the read ends.
    pub(super) struct EchoGuard {
        fd: RawFd,
        saved: libc::termios,
    }

    impl EchoGuard {
        pub(super) fn disable(fd: RawFd) -> Result<Self, CredentialError> {
            if unsafe { libc::isatty(fd) } != 1 {
                return Err(CredentialError::NotATerminal);
            }

            let mut attributes: libc::termios = unsafe { std::mem::zeroed() };
            if unsafe { libc::tcgetattr(fd, &mut attributes) } != 0 {
                return Err(io::Error::last_os_error().into());
            }
            let saved = attributes;

            // Without ISIG an interrupt arrives as a character instead of
            // killing the process with echo still off; without ICANON it
            // arrives without waiting for Enter
            attributes.c_lflag &= !(libc::ECHO | libc::ISIG | libc::ICANON);
            attributes.c_cc[libc::VMIN] = 1;
            attributes.c_cc[libc::VTIME] = 0;
            if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &attributes) } != 0 {
                return Err(io::Error::last_os_error().into());
            }
            Ok(Self { fd, saved })
        }
    }

    impl Drop for EchoGuard {
        fn drop(&mut self) {
            if unsafe { libc::tcsetattr(self.fd, libc::TCSANOW, &self.saved) } != 0 {
                tracing::warn!(
                    "Failed to restore terminal attributes: {}",
                    io::Error::last_os_error()
                );
            }
        }
    }
}

/// Hands out a PIN supplied on the command line or in the environment
#[derive(Debug, Clone)]
pub struct StaticCredential {
    pin: Pin,
}

impl StaticCredential {
    pub fn new(pin: Pin) -> Self {
        Self { pin }
    }
}

impl CredentialSource for StaticCredential {
    fn prompt(&mut self, _label: &str, max_len: usize) -> ProbeResult<Pin> {
        if self.pin.len() > max_len {
            return Err(PinError::TooLong.into());
        }
        Ok(self.pin.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainError, ProbeError};

    #[test]
    fn test_static_credential_returns_pin() {
        let mut source = StaticCredential::new(Pin::from_str("123456").unwrap());
        let pin = source.prompt("Enter PIN: ", Pin::MAX_LENGTH).unwrap();
        assert_eq!(pin.as_bytes(), b"123456");
    }

    #[test]
    fn test_static_credential_respects_max_len() {
        let mut source = StaticCredential::new(Pin::from_str("123456").unwrap());
        let err = source.prompt("Enter PIN: ", 4).unwrap_err();
        assert!(matches!(
            err,
            ProbeError::Domain(DomainError::Pin(PinError::TooLong))
        ));
    }

    #[test]
    fn test_entry_ends_at_enter() {
        let entered = read_entry(&b"1234\r\nignored"[..]).unwrap();
        assert_eq!(entered.as_slice(), b"1234");

        let entered = read_entry(&b"5678"[..]).unwrap();
        assert_eq!(entered.as_slice(), b"5678");
    }

    #[test]
    fn test_entry_interrupted_by_control_c_before_enter() {
        let mut input = &b"12\x03never read"[..];
        let err = read_entry(&mut input).unwrap_err();

        assert!(matches!(err, CredentialError::Interrupted));
        assert_eq!(input, b"never read");
    }

    #[test]
    fn test_entry_handles_backspace() {
        let entered = read_entry(&b"12x\x7f3\x08\x084\n"[..]).unwrap();
        assert_eq!(entered.as_slice(), b"14");
    }

    #[test]
    fn test_entry_at_end_of_input_fails() {
        let err = read_entry(&b""[..]).unwrap_err();
        assert!(matches!(err, CredentialError::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[cfg(unix)]
    #[test]
    fn test_echo_guard_refuses_non_terminal() {
        use std::os::fd::AsRawFd;

        let file = tempfile::tempfile().unwrap();
        let result = echo::EchoGuard::disable(file.as_raw_fd());
        assert!(matches!(result, Err(CredentialError::NotATerminal)));
    }
}
