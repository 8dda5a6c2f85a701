//! `assursuite-client`: session plumbing for the AssurSuite admin API.
//!
//! Credentials live in two storage tiers, requests go through a client that
//! refreshes expired sessions once before giving up, and `SessionState`
//! exposes the current session as an observable value that also answers
//! authorization queries.

pub mod client;
pub mod config;
pub mod credentials;
pub mod redirect;
pub mod session;
pub mod storage;
pub mod types;

pub use client::{ApiError, ApiRequest, SessionClient};
pub use config::{ClientConfig, ConfigError};
pub use credentials::CredentialStore;
pub use redirect::{LoginRedirect, TracingRedirect};
pub use session::{SessionContext, SessionSnapshot, SessionState};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::{LoginResponse, ProfileData, UserProfile};
