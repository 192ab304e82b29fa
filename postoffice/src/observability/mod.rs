//! Structured logging vocabulary.
//!
//! Library code emits `tracing` events keyed by the names in [`events`] and the field keys in
//! [`fields`]. It never installs a global subscriber; tests, benches and embedding
//! binaries own `tracing_subscriber` initialization.

pub mod events;
pub mod fields;
