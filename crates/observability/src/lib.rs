//! Logging setup shared by the assursuite binaries.
//!
//! Libraries in this workspace only emit `tracing` events; installing a
//! subscriber is left to whichever process links them.

pub mod logging;

pub use logging::{FORMAT_ENV, LogFormat, init, init_with};
