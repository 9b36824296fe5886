//! tradewarden — rule-based trading-signal engine.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. The domain never performs I/O;
//! callers assemble an evaluation context per tick and persist whatever the
//! engine hands back.

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
