//! Socket program handlers for path propagation
//!
//! Implements the eBPF programs that register sockets, inspect outbound
//! messages and cache paths carried by inbound ones. Every handler fails
//! open: whatever goes wrong, the data is forwarded unchanged.

use aya_ebpf::{
    bindings::{sk_action::SK_PASS, BPF_NOEXIST},
    macros::{sk_msg, sock_ops, stream_parser, stream_verdict},
    programs::{SkBuffContext, SkMsgContext, SockOpsContext},
};
use aya_log_ebpf::{debug, error};
use pathprop_common::{
    cache::{self, CacheOutcome},
    constants::*,
    hpack::{self, save_found, Scan},
    propagate::{propagate, Propagation},
    thrift::{correlate, Correlate},
};

use crate::{helpers::*, maps::*, socket_parser::*};

/// Chain to the program at `index` of the jump table
///
/// Only returns if the tail call failed, in which case the caller passes
/// the message.
#[inline(always)]
fn chain(ctx: &SkMsgContext, index: u32) {
    if let Err(ret) = unsafe { JUMP_TABLE.tail_call(ctx, index) } {
        debug!(ctx, "tail call {} failed: {}", index, ret);
    }
}

// ============================================================================
// Connection registrar
// ============================================================================

/// Register established sockets
///
/// Attached to: cgroup sock_ops
///
/// Adds every established IPv4/IPv6 TCP socket to the sockhash so the
/// message programs run for it. Always returns 0.
#[sock_ops]
pub fn register_socket(ctx: SockOpsContext) -> u32 {
    match try_register_socket(&ctx) {
        Ok(ret) => ret,
        Err(ret) => {
            error!(&ctx, "failed to register socket: {}", ret);
            0
        }
    }
}

fn try_register_socket(ctx: &SockOpsContext) -> Result<u32, i64> {
    let Some(mut key) = extract_connection_key(ctx) else {
        return Ok(0);
    };

    SOCK_OPS.update(&mut key, unsafe { &mut *ctx.ops }, BPF_NOEXIST as u64)?;
    Ok(0)
}

// ============================================================================
// HTTP/2 header locator
// ============================================================================

/// First locator pass over an outbound HTTP/2 message
///
/// Attached to: sk_msg on the sockhash (gRPC)
///
/// Chains to the propagator when the tracing header is found and to the
/// extended locator when the field budget runs out.
#[sk_msg]
pub fn parse_grpc_headers(ctx: SkMsgContext) -> u32 {
    try_parse_grpc_headers(&ctx).unwrap_or(SK_PASS)
}

fn try_parse_grpc_headers(ctx: &SkMsgContext) -> Result<u32, i64> {
    let msg = SkMsgBytes::new(ctx);

    match hpack::locate(&msg, peer_addr(ctx), &HeaderIndexMap) {
        Scan::Found { offset } => {
            save_found(&ArgSlotMap, offset);
            chain(ctx, JUMP_PROPAGATE);
        }
        Scan::Exhausted(cont) => {
            cont.save(&ArgSlotMap);
            chain(ctx, JUMP_EXTENDED);
        }
        Scan::Pass => {}
    }

    Ok(SK_PASS)
}

/// Continuation of the header locator with a fresh budget
///
/// Tail-call target, index `JUMP_EXTENDED`.
#[sk_msg]
pub fn parse_grpc_headers_ext(ctx: SkMsgContext) -> u32 {
    try_parse_grpc_headers_ext(&ctx).unwrap_or(SK_PASS)
}

fn try_parse_grpc_headers_ext(ctx: &SkMsgContext) -> Result<u32, i64> {
    let msg = SkMsgBytes::new(ctx);

    let found = hpack::resume(&msg, peer_addr(ctx), &HeaderIndexMap, &ArgSlotMap);
    if let Scan::Found { offset } = found {
        save_found(&ArgSlotMap, offset);
        chain(ctx, JUMP_PROPAGATE);
    }

    Ok(SK_PASS)
}

// ============================================================================
// Path propagator
// ============================================================================

/// Inject the context frame in front of the message
///
/// Tail-call target, index `JUMP_PROPAGATE`.
#[sk_msg]
pub fn propagate_path(ctx: SkMsgContext) -> u32 {
    try_propagate_path(&ctx).unwrap_or(SK_PASS)
}

fn try_propagate_path(ctx: &SkMsgContext) -> Result<u32, i64> {
    let peer = peer_addr(ctx);
    let mut msg = SkMsgBytes::new(ctx);

    match propagate(&mut msg, peer, &ArgSlotMap, &HeaderIndexMap, &PathMap, &ServiceIdMap) {
        Propagation::Injected { trace_id, hops } => {
            debug!(ctx, "propagated trace {:x} with {} hops", trace_id, hops);
        }
        Propagation::Aborted { trace_id } => {
            error!(ctx, "could not inject path for trace {:x}", trace_id);
        }
        Propagation::Pass => {}
    }

    Ok(SK_PASS)
}

// ============================================================================
// Thrift request id locator
// ============================================================================

/// Correlate outbound Thrift CALLs with their request id
///
/// Attached to: sk_msg on the sockhash (Thrift)
#[sk_msg]
pub fn parse_thrift_call(ctx: SkMsgContext) -> u32 {
    try_parse_thrift_call(&ctx).unwrap_or(SK_PASS)
}

fn try_parse_thrift_call(ctx: &SkMsgContext) -> Result<u32, i64> {
    let msg = SkMsgBytes::new(ctx);

    match correlate(&msg, &CorrelationMap) {
        Correlate::Recorded {
            sequence,
            request_id,
        } => {
            debug!(ctx, "message {} carries request {}", sequence, request_id);
        }
        Correlate::NoCounter { request_id } => {
            error!(ctx, "no message counter, request {} dropped", request_id);
        }
        Correlate::Pass => {}
    }

    Ok(SK_PASS)
}

// ============================================================================
// Stream receiver
// ============================================================================

/// Make the whole message linear before the verdict runs
///
/// Attached to: sk_skb stream parser on the sockhash
#[stream_parser]
pub fn pull_full_message(ctx: SkBuffContext) -> u32 {
    let len = ctx.len();
    if ctx.data_end().saturating_sub(ctx.data()) < len as usize {
        if let Err(ret) = ctx.pull_data(len) {
            error!(&ctx, "could not pull {} bytes: {}", len, ret);
        }
    }
    len
}

/// Cache the path carried by an inbound context frame
///
/// Attached to: sk_skb stream verdict on the sockhash
#[stream_verdict]
pub fn cache_path(ctx: SkBuffContext) -> u32 {
    try_cache_path(&ctx).unwrap_or(SK_PASS)
}

fn try_cache_path(ctx: &SkBuffContext) -> Result<u32, i64> {
    let msg = SkbBytes::new(ctx);
    let Some((trace_id, path)) = cache::read_context_frame(&msg) else {
        return Ok(SK_PASS);
    };

    match cache::cache_path(&PathMap, &RingMap, trace_id, &path) {
        CacheOutcome::Stored {
            evicted: Some(oldest),
        } => {
            debug!(ctx, "cached trace {:x}, evicted {:x}", trace_id, oldest);
        }
        CacheOutcome::Stored { evicted: None } => {}
        CacheOutcome::Untracked => {
            error!(ctx, "ring indices missing, trace {:x} not tracked", trace_id);
        }
    }

    Ok(SK_PASS)
}
