//! Helper functions for eBPF programs
//!
//! Provides bounds-checked views over socket message data and adapters
//! that expose the BPF maps through the shared state traits.

use aya_ebpf::programs::{SkBuffContext, SkMsgContext};
use pathprop_common::{
    buffer::{MessageBytes, MessageBytesMut},
    state::*,
    types::TracePath,
};

use crate::maps::*;

// ============================================================================
// Message data
// ============================================================================

/// Read `N` bytes at `offset` inside `[start, end)`.
///
/// The comparison against `end` is what the verifier uses to accept the
/// packet pointer dereference.
#[inline(always)]
fn load_linear<const N: usize>(start: usize, end: usize, offset: usize) -> Option<[u8; N]> {
    let at = start.checked_add(offset)?;
    if at.checked_add(N)? > end {
        return None;
    }
    let mut out = [0u8; N];
    unsafe { core::ptr::copy_nonoverlapping(at as *const u8, out.as_mut_ptr(), N) };
    Some(out)
}

#[inline(always)]
fn load_linear_u8(start: usize, end: usize, offset: usize) -> Option<u8> {
    let at = start.checked_add(offset)?;
    if at + 1 > end {
        return None;
    }
    Some(unsafe { *(at as *const u8) })
}

/// Outbound message of an sk_msg program.
pub struct SkMsgBytes<'a> {
    ctx: &'a SkMsgContext,
    start: usize,
    end: usize,
}

impl<'a> SkMsgBytes<'a> {
    #[inline(always)]
    pub fn new(ctx: &'a SkMsgContext) -> Self {
        Self {
            ctx,
            start: ctx.data(),
            end: ctx.data_end(),
        }
    }

    /// Data pointers are invalidated by every helper that reshapes the
    /// message.
    #[inline(always)]
    fn refresh(&mut self) {
        self.start = self.ctx.data();
        self.end = self.ctx.data_end();
    }
}

impl MessageBytes for SkMsgBytes<'_> {
    #[inline(always)]
    fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline(always)]
    fn load_u8(&self, offset: usize) -> Option<u8> {
        load_linear_u8(self.start, self.end, offset)
    }

    #[inline(always)]
    fn load_array<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        load_linear(self.start, self.end, offset)
    }
}

impl MessageBytesMut for SkMsgBytes<'_> {
    #[inline(always)]
    fn store(&mut self, offset: usize, bytes: &[u8]) -> Option<()> {
        let at = self.start.checked_add(offset)?;
        if at.checked_add(bytes.len())? > self.end {
            return None;
        }
        unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), at as *mut u8, bytes.len()) };
        Some(())
    }

    #[inline(always)]
    fn grow_front(&mut self, len: u32) -> Option<()> {
        let result = self.ctx.push_data(0, len, 0);
        self.refresh();
        result.ok()
    }

    #[inline(always)]
    fn shrink_front(&mut self, len: u32) -> Option<()> {
        let result = self.ctx.pop_data(0, len, 0);
        self.refresh();
        result.ok()
    }
}

/// Inbound stream data of an sk_skb program.
pub struct SkbBytes {
    start: usize,
    end: usize,
}

impl SkbBytes {
    #[inline(always)]
    pub fn new(ctx: &SkBuffContext) -> Self {
        Self {
            start: ctx.data(),
            end: ctx.data_end(),
        }
    }
}

impl MessageBytes for SkbBytes {
    #[inline(always)]
    fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline(always)]
    fn load_u8(&self, offset: usize) -> Option<u8> {
        load_linear_u8(self.start, self.end, offset)
    }

    #[inline(always)]
    fn load_array<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        load_linear(self.start, self.end, offset)
    }
}

/// Remote IPv4 address of the socket an sk_msg program runs for.
#[inline(always)]
pub fn peer_addr(ctx: &SkMsgContext) -> u32 {
    unsafe { (*ctx.msg).remote_ip4 }
}

// ============================================================================
// Map adapters
// ============================================================================

#[inline(always)]
fn array_set<T: Copy>(ptr: Option<*mut T>, value: T) {
    if let Some(ptr) = ptr {
        unsafe { *ptr = value };
    }
}

pub struct ArgSlotMap;

impl ArgSlots for ArgSlotMap {
    #[inline(always)]
    fn slot(&self, index: u32) -> Option<u32> {
        MSG_ARGS.get(index).copied()
    }

    #[inline(always)]
    fn set_slot(&self, index: u32, value: u32) {
        array_set(MSG_ARGS.get_ptr_mut(index), value);
    }
}

pub struct HeaderIndexMap;

impl HeaderIndex for HeaderIndexMap {
    #[inline(always)]
    fn cursor(&self, peer: u32) -> Option<u8> {
        unsafe { HEADER_INDEX.get(&peer).copied() }
    }

    #[inline(always)]
    fn set_cursor(&self, peer: u32, index: u8) {
        let _ = HEADER_INDEX.insert(&peer, &index, 0);
    }
}

pub struct PathMap;

impl PathStore for PathMap {
    #[inline(always)]
    fn path(&self, trace_id: u64) -> Option<TracePath> {
        unsafe { PATHS.get(&trace_id).copied() }
    }

    #[inline(always)]
    fn store_path(&self, trace_id: u64, path: &TracePath) {
        let _ = PATHS.insert(&trace_id, path, 0);
    }

    #[inline(always)]
    fn remove_path(&self, trace_id: u64) {
        let _ = PATHS.remove(&trace_id);
    }
}

pub struct RingMap;

impl EvictionRing for RingMap {
    #[inline(always)]
    fn index(&self, which: u32) -> Option<u32> {
        RING_INDEX.get(which).copied()
    }

    #[inline(always)]
    fn set_index(&self, which: u32, value: u32) {
        array_set(RING_INDEX.get_ptr_mut(which), value);
    }

    #[inline(always)]
    fn entry(&self, slot: u32) -> Option<u64> {
        EVICTION_RING.get(slot).copied()
    }

    #[inline(always)]
    fn set_entry(&self, slot: u32, trace_id: u64) {
        array_set(EVICTION_RING.get_ptr_mut(slot), trace_id);
    }
}

pub struct CorrelationMap;

impl Correlations for CorrelationMap {
    #[inline(always)]
    fn sequence(&self) -> Option<u64> {
        MSG_COUNTER.get(0).copied()
    }

    #[inline(always)]
    fn set_sequence(&self, value: u64) {
        array_set(MSG_COUNTER.get_ptr_mut(0), value);
    }

    #[inline(always)]
    fn record(&self, sequence: u64, request_id: u64) {
        let _ = CORRELATIONS.insert(&sequence, &request_id, 0);
    }
}

pub struct ServiceIdMap;

impl ServiceIdentity for ServiceIdMap {
    #[inline(always)]
    fn service_id(&self) -> Option<u8> {
        SERVICE_ID.get(0).copied()
    }
}
