//! Use cases (orchestration)
//!
//! Each use case drives a [`TokenModule`](crate::ports::TokenModule) through
//! one part of a diagnostic run. Probing and enumeration keep going past
//! individual failures; bootstrap, dumping and signing stop at the first one.

pub mod bootstrap;
pub mod dump;
pub mod enumerate;
pub mod probe;
pub mod sign_verify;

pub use bootstrap::{bootstrap, BootstrapReport, SessionConfig};
pub use dump::{dump, DumpRecord, DumpTarget, OutputSpec};
pub use enumerate::{
    class_passes, enumerate, run_pass, ClassPass, FindWalk, ObjectReport, ObjectWalk,
    PAGE_CAPACITY,
};
pub use probe::{fetch_value, probe, ProbeOutcome, ProbeReport};
pub use sign_verify::{find_public_counterpart, round_trip, sign, verify, RoundTrip, Verdict};
