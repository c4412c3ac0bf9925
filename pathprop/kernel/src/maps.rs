//! BPF map definitions for path propagation
//!
//! Every map is pinned by name so the loader can share it between the
//! programs of one pod and inspect it from userspace.

use aya_ebpf::{
    macros::map,
    maps::{Array, HashMap, ProgramArray, SockHash},
};
use pathprop_common::{constants::*, types::*};

/// Established sockets keyed by their 4-tuple
///
/// The sk_msg and sk_skb programs are attached to this map, so only
/// registered sockets are inspected.
#[map(name = "sock_ops_map")]
pub static SOCK_OPS: SockHash<ConnectionKey> = SockHash::pinned(MAX_CONNECTIONS, 0);

/// Chained dispatch targets
///
/// Index `JUMP_PROPAGATE`: path propagator
/// Index `JUMP_EXTENDED`: extended header locator
#[map(name = "jmp_table")]
pub static JUMP_TABLE: ProgramArray = ProgramArray::pinned(JUMP_TABLE_LEN, 0);

/// Scratch slots handed across a tail call
///
/// Slot 0: header offset
/// Slot 1: HEADERS frame length
#[map(name = "msg_args")]
pub static MSG_ARGS: Array<u32> = Array::pinned(ARG_SLOTS, 0);

/// Approximate HPACK dynamic-table position per peer
///
/// Key: peer IPv4 address
/// Value: dynamic table index expected for the tracing header
#[map(name = "header_index")]
pub static HEADER_INDEX: HashMap<u32, u8> = HashMap::pinned(MAX_HEADER_CURSORS, 0);

/// Received call paths waiting for the next outbound message
#[map(name = "path_map")]
pub static PATHS: HashMap<u64, TracePath> = HashMap::pinned(PATH_CACHE_ENTRIES, 0);

/// Trace ids in insertion order, for eviction
#[map(name = "eviction_ring")]
pub static EVICTION_RING: Array<u64> = Array::pinned(PATH_CACHE_ENTRIES, 0);

/// Eviction ring head (`RING_HEAD`) and tail (`RING_TAIL`)
#[map(name = "ring_index")]
pub static RING_INDEX: Array<u32> = Array::pinned(2, 0);

/// Local service identifier, written by the loader
#[map(name = "svc_id")]
pub static SERVICE_ID: Array<u8> = Array::pinned(1, 0);

/// Next Thrift message sequence number
#[map(name = "msg_id_counter")]
pub static MSG_COUNTER: Array<u64> = Array::pinned(1, 0);

/// Thrift message sequence -> request id
#[map(name = "msg_data_map")]
pub static CORRELATIONS: HashMap<u64, u64> = HashMap::pinned(MAX_CORRELATIONS, 0);
