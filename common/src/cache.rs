//! Receive-side path cache
//!
//! Inbound context frames are stored under their trace id so the next
//! outbound message on that trace can extend the path. The cache is
//! bounded by an eviction ring: every insertion takes the slot at `tail`,
//! and when `tail` catches up with `head` the oldest trace is evicted.

use crate::{
    buffer::MessageBytes,
    constants::*,
    hpack::is_preamble,
    state::{EvictionRing, PathStore},
    types::TracePath,
};

/// Outcome of caching one received path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Stored and tracked by the ring. `evicted` is the trace id dropped
    /// to make room, if any.
    Stored { evicted: Option<u64> },
    /// Stored, but the ring indices were unavailable so the entry is not
    /// tracked for eviction.
    Untracked,
}

/// Trace id and path of a context frame at the start of `msg`.
#[inline(always)]
pub fn read_context_frame<M: MessageBytes + ?Sized>(msg: &M) -> Option<(u64, TracePath)> {
    let word = msg.load_be_u32(0)?;
    if is_preamble(word) {
        return None;
    }
    if (word & 0xFF) as u8 != FRAME_TYPE_CONTEXT {
        return None;
    }

    let trace_id = msg.load_be_u64(CONTEXT_TRACE_ID_OFFSET)?;
    let path = msg.load_array::<PATH_RECORD_LEN>(CONTEXT_PATH_OFFSET)?;
    Some((trace_id, TracePath(path)))
}

/// Store `path` under `trace_id` and account for it in the ring.
pub fn cache_path<P, R>(paths: &P, ring: &R, trace_id: u64, path: &TracePath) -> CacheOutcome
where
    P: PathStore,
    R: EvictionRing,
{
    paths.store_path(trace_id, path);

    let (Some(head), Some(tail)) = (ring.index(RING_HEAD), ring.index(RING_TAIL)) else {
        return CacheOutcome::Untracked;
    };
    let head = head % PATH_CACHE_ENTRIES;
    let tail = tail % PATH_CACHE_ENTRIES;

    ring.set_entry(tail, trace_id);
    let tail = (tail + 1) % PATH_CACHE_ENTRIES;
    ring.set_index(RING_TAIL, tail);

    if head != tail {
        return CacheOutcome::Stored { evicted: None };
    }

    let evicted = ring.entry(head);
    if let Some(oldest) = evicted {
        paths.remove_path(oldest);
    }
    ring.set_index(RING_HEAD, (head + 1) % PATH_CACHE_ENTRIES);
    CacheOutcome::Stored { evicted }
}
