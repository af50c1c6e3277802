#![forbid(unsafe_code)]

//! Boundary to the hosted data & auth service.
//!
//! Everything behind these traits is an opaque remote collaborator: the app
//! only issues CRUD and auth requests and reacts to session-change events.
//! `InMemoryBackend` is the reference implementation used by tests and the
//! demo mode; `RestBackend` speaks the hosted HTTP API.

pub mod memory;
pub mod repository;
pub mod rest;

pub use memory::InMemoryBackend;
pub use repository::{
    AuthEvent, AuthGateway, AuthSession, Backend, BackendError, NewAttemptRecord, ProfileRecord,
    ProfileRepository, ProfileUpdate, ProgressRepository, SignUpMetadata,
};
pub use rest::{RestBackend, RestConfig};
