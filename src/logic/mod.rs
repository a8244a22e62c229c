//! Pure rendering logic, no module calls

pub mod codec;
pub mod flags;
