//! Shared types and logic for the path propagation programs
//!
//! This crate provides the map layouts, wire constants and the fail-open
//! parsers shared between the eBPF programs and the userspace loader.
//! Parsers only see message bytes and side state through the traits in
//! [`buffer`] and [`state`], so the same code runs against BPF maps in the
//! kernel and against in-memory maps in tests.

#![cfg_attr(not(test), no_std)]

pub mod buffer;
pub mod cache;
pub mod constants;
pub mod hpack;
pub mod propagate;
pub mod state;
pub mod thrift;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use buffer::{MessageBytes, MessageBytesMut};
pub use constants::*;
pub use types::{ConnectionKey, TracePath};
