//! Userspace type definitions
//!
//! Defines the data structures used by the loader for reporting.
//!
//! ## Organization
//!
//! This module separates kernel and userspace types:
//! - **Kernel Types**: Types shared with eBPF programs (from pathprop_common)
//! - **Userspace Types**: Types used only in userspace for aggregation and export

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

// ============================================================================
// Kernel Types (from eBPF programs)
// ============================================================================

pub mod kernel {
    //! Types shared between kernel eBPF programs and userspace
    //!
    //! These are re-exported from the pathprop-common crate and must
    //! maintain binary compatibility with the eBPF programs.

    pub use pathprop_common::constants;
    pub use pathprop_common::types::{ConnectionKey, TracePath};
}

// Re-export commonly used kernel types at module level for convenience
pub use kernel::{ConnectionKey, TracePath};

use kernel::constants::PATH_CACHE_ENTRIES;

/// Application protocol whose outbound messages are inspected
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// HTTP/2 framed gRPC: path propagation and receive-side caching
    Grpc,
    /// Thrift binary protocol: request id correlation
    Thrift,
}

/// Report written at the end of a run
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PropagationReport {
    /// ISO 8601 timestamp when the report was generated
    pub timestamp: String,
    /// Duration of the run in seconds
    pub duration_seconds: u64,
    /// Pod identity the maps are pinned under
    pub pod: String,
    /// Protocol the programs were attached for
    pub protocol: Protocol,
    /// Service identifier written to the kernel
    pub service_id: Option<u8>,
    /// Drained Thrift correlations
    pub correlations: CorrelationStats,
    /// Receive-side path cache at shutdown (gRPC only)
    pub path_cache: Option<PathCacheStats>,
}

/// One Thrift message correlation
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correlation {
    /// Message sequence number assigned by the kernel
    pub sequence: u64,
    /// Request id carried by the message
    pub request_id: u64,
}

/// Correlations drained from the kernel during a run
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct CorrelationStats {
    /// Number of correlations drained
    pub total: u64,
    /// Number of drain passes
    pub drains: u64,
    /// Lowest sequence number seen
    pub first_sequence: Option<u64>,
    /// Highest sequence number seen
    pub last_sequence: Option<u64>,
    /// Correlations ordered by sequence number
    pub records: Vec<Correlation>,
}

/// Snapshot of the receive-side path cache
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct PathCacheStats {
    /// Paths currently cached
    pub cached_paths: u64,
    /// Eviction ring head
    pub ring_head: u32,
    /// Eviction ring tail
    pub ring_tail: u32,
    /// Ring slots between head and tail
    pub ring_occupancy: u32,
    /// Longest cached path
    pub max_hops: u8,
    /// Cached paths ordered by trace id
    pub paths: Vec<CachedPath>,
}

/// One cached path
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CachedPath {
    /// Trace id in hex
    pub trace_id: String,
    /// Service ids, newest first
    pub hops: Vec<u8>,
}

impl PathCacheStats {
    /// Build a snapshot from the ring indices and the cached entries
    pub fn from_snapshot(head: u32, tail: u32, mut entries: Vec<(u64, TracePath)>) -> Self {
        entries.sort_by_key(|(trace_id, _)| *trace_id);

        let paths: Vec<CachedPath> = entries
            .iter()
            .map(|(trace_id, path)| CachedPath {
                trace_id: format_trace_id(*trace_id),
                hops: path_hops(path),
            })
            .collect();

        Self {
            cached_paths: paths.len() as u64,
            ring_head: head,
            ring_tail: tail,
            ring_occupancy: ring_occupancy(head, tail),
            max_hops: entries
                .iter()
                .map(|(_, path)| path.hop_count())
                .max()
                .unwrap_or(0),
            paths,
        }
    }
}

/// Format a trace id the way tracing backends print it
pub fn format_trace_id(trace_id: u64) -> String {
    format!("{:016x}", trace_id)
}

/// Number of ring slots in use between `head` and `tail`
pub fn ring_occupancy(head: u32, tail: u32) -> u32 {
    let head = head % PATH_CACHE_ENTRIES;
    let tail = tail % PATH_CACHE_ENTRIES;
    (tail + PATH_CACHE_ENTRIES - head) % PATH_CACHE_ENTRIES
}

/// Recorded hops of `path`, newest first
pub fn path_hops(path: &TracePath) -> Vec<u8> {
    (0..path.hop_count() as usize)
        .filter_map(|n| path.hop(n))
        .collect()
}
