//! Core abstractions for authstate: the key/value storage contract, time
//! sources, and the credential and session data model.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod clock;
pub mod credentials;
pub mod session;
pub mod storage;
