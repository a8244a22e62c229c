//! Domain types for module introspection
//!
//! Thin newtypes over the module's numeric identifiers so handles, codes and
//! attribute identities cannot be mixed up, plus the records the module
//! reports about itself.

mod attribute;
mod info;
mod mechanism;
pub mod names;
mod pin;
mod session;
mod status;

pub use attribute::{Attribute, AttributeType, ObjectClass};
pub use info::{MechanismInfo, ModuleInfo, SessionInfo, SlotInfo, TokenInfo, Version};
pub use mechanism::MechanismType;
pub use pin::{Pin, PinError};
pub use session::{LoginState, ObjectHandle, Session, SessionHandle, SlotId};
pub use status::Status;

/// The module's native unsigned integer (`CK_ULONG`)
pub type Ulong = cryptoki_sys::CK_ULONG;

/// Width in bytes of a native integral attribute value
pub const ULONG_SIZE: usize = std::mem::size_of::<Ulong>();

/// Length the module reports for a value it cannot provide
pub const UNAVAILABLE_INFORMATION: Ulong = cryptoki_sys::CK_UNAVAILABLE_INFORMATION;
