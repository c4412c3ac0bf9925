//! Path propagation for outbound HTTP/2 messages
//!
//! Runs after the header locator has recorded where the tracing header
//! starts. Reads the trace id from the header value, extends the cached
//! path with the local service and injects a context frame carrying both
//! in front of the outbound bytes.

use crate::{
    buffer::MessageBytesMut,
    constants::*,
    state::{ArgSlots, HeaderIndex, PathStore, ServiceIdentity},
    types::TracePath,
};

/// Outcome of one propagation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Nothing was changed.
    Pass,
    /// The context frame was written and the cached path consumed.
    Injected { trace_id: u64, hops: u8 },
    /// Growing or writing the message failed. The message is left as it
    /// was and the cached path is kept.
    Aborted { trace_id: u64 },
}

/// Context frame carrying `raw_id`, the trace id exactly as it appeared
/// on the wire, and `path`.
#[inline(always)]
pub fn context_frame(raw_id: &[u8; TRACE_ID_LEN], path: &TracePath) -> [u8; CONTEXT_FRAME_LEN] {
    let mut frame = [0u8; CONTEXT_FRAME_LEN];
    let word = ((CONTEXT_PAYLOAD_LEN as u32) << 8) | FRAME_TYPE_CONTEXT as u32;
    frame[..4].copy_from_slice(&word.to_be_bytes());
    frame[CONTEXT_TRACE_ID_OFFSET..CONTEXT_PATH_OFFSET].copy_from_slice(raw_id);
    frame[CONTEXT_PATH_OFFSET..].copy_from_slice(&path.0);
    frame
}

/// Inject the context frame for the header found by the locator.
pub fn propagate<M, S, H, P, I>(
    msg: &mut M,
    peer: u32,
    slots: &S,
    index: &H,
    paths: &P,
    service: &I,
) -> Propagation
where
    M: MessageBytesMut + ?Sized,
    S: ArgSlots,
    H: HeaderIndex,
    P: PathStore,
    I: ServiceIdentity,
{
    let Some(offset) = slots.slot(ARG_SLOT_OFFSET) else {
        return Propagation::Pass;
    };
    if offset > MAX_HEADER_OFFSET {
        return Propagation::Pass;
    }
    let mut value_at = offset as usize;

    let Some(lead) = msg.load_u8(value_at) else {
        return Propagation::Pass;
    };
    if lead & 0x3F == 0 {
        // New literal name: the header is now in the peer's dynamic table
        // and later messages reference it by index.
        index.set_cursor(peer, DYNAMIC_TABLE_BASE);
        value_at += 1 + TRACE_HEADER_NAME_LEN;
    }
    // Leading (or name length) byte and value length byte.
    value_at += 2;

    let Some(raw_id) = msg.load_array::<TRACE_ID_LEN>(value_at) else {
        return Propagation::Pass;
    };
    let trace_id = u64::from_be_bytes(raw_id);

    let Some(svc) = service.service_id() else {
        return Propagation::Pass;
    };
    let path = match paths.path(trace_id) {
        Some(cached) => cached.extended(svc),
        None => TracePath::first_hop(svc),
    };

    let frame = context_frame(&raw_id, &path);
    if msg.grow_front(CONTEXT_FRAME_LEN as u32).is_none() {
        return Propagation::Aborted { trace_id };
    }
    if msg.store(0, &frame).is_none() {
        let _ = msg.shrink_front(CONTEXT_FRAME_LEN as u32);
        return Propagation::Aborted { trace_id };
    }

    paths.remove_path(trace_id);
    Propagation::Injected {
        trace_id,
        hops: path.hop_count(),
    }
}
