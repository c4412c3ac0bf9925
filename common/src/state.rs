//! Shared map seams
//!
//! The programs only ever touch their side state through these traits.
//! The kernel crate implements them over BPF maps; tests implement them
//! in memory. All methods take `&self`: the backing maps are shared and
//! mutated concurrently without locks, last writer wins.

use crate::types::TracePath;

/// Invocation argument slots carried across a tail call.
pub trait ArgSlots {
    fn slot(&self, index: u32) -> Option<u32>;
    fn set_slot(&self, index: u32, value: u32);
}

/// Approximate HPACK dynamic-table cursor per peer address.
pub trait HeaderIndex {
    fn cursor(&self, peer: u32) -> Option<u8>;
    fn set_cursor(&self, peer: u32, index: u8);
}

/// Trace id -> call path.
pub trait PathStore {
    fn path(&self, trace_id: u64) -> Option<TracePath>;
    fn store_path(&self, trace_id: u64, path: &TracePath);
    fn remove_path(&self, trace_id: u64);
}

/// Fixed-capacity ring of cached trace ids with a head/tail index pair.
pub trait EvictionRing {
    /// Head (`RING_HEAD`) or tail (`RING_TAIL`) index.
    fn index(&self, which: u32) -> Option<u32>;
    fn set_index(&self, which: u32, value: u32);
    fn entry(&self, slot: u32) -> Option<u64>;
    fn set_entry(&self, slot: u32, trace_id: u64);
}

/// Thrift message sequence counter and sequence -> request id map.
pub trait Correlations {
    fn sequence(&self) -> Option<u64>;
    fn set_sequence(&self, value: u64);
    fn record(&self, sequence: u64, request_id: u64);
}

/// Identifier of the local service, written once by the loader.
pub trait ServiceIdentity {
    fn service_id(&self) -> Option<u8>;
}
