//! Shared constants for the path propagation programs
//!
//! These constants are used by both kernel and userspace programs
//! to ensure consistency in map layouts, wire formats and limits.

// ============================================================================
// BPF Map Sizes
// ============================================================================

/// Maximum number of registered sockets
pub const MAX_CONNECTIONS: u32 = 65535;

/// Maximum number of peers with a header dynamic-table cursor
pub const MAX_HEADER_CURSORS: u32 = 65535;

/// Number of entries in the trace path cache and its eviction ring
pub const PATH_CACHE_ENTRIES: u32 = 8192;

/// Maximum number of outstanding Thrift request correlations
pub const MAX_CORRELATIONS: u32 = 65535;

// ============================================================================
// Pinned Map Names
// ============================================================================

/// Socket registration hash (4-tuple -> socket)
pub const MAP_SOCK_OPS: &str = "sock_ops_map";

/// Chained-dispatch program table
pub const MAP_JUMP_TABLE: &str = "jmp_table";

/// Invocation argument slots carried across a tail call
pub const MAP_MSG_ARGS: &str = "msg_args";

/// Header dynamic-table cursor per peer
pub const MAP_HEADER_INDEX: &str = "header_index";

/// Trace id -> path record
pub const MAP_PATHS: &str = "path_map";

/// Eviction ring of cached trace ids
pub const MAP_EVICTION_RING: &str = "eviction_ring";

/// Eviction ring head/tail indices
pub const MAP_RING_INDEX: &str = "ring_index";

/// Local service identifier
pub const MAP_SERVICE_ID: &str = "svc_id";

/// Thrift message sequence counter
pub const MAP_MSG_COUNTER: &str = "msg_id_counter";

/// Thrift sequence -> request id correlations
pub const MAP_CORRELATIONS: &str = "msg_data_map";

// ============================================================================
// Program Names
// ============================================================================

/// Connection registrar (sock_ops)
pub const PROG_REGISTRAR: &str = "register_socket";

/// First HTTP/2 header locator pass (sk_msg)
pub const PROG_GRPC_LOCATOR: &str = "parse_grpc_headers";

/// Extended HTTP/2 header locator continuation (sk_msg, tail-call target)
pub const PROG_GRPC_LOCATOR_EXT: &str = "parse_grpc_headers_ext";

/// Path propagator (sk_msg, tail-call target)
pub const PROG_PROPAGATOR: &str = "propagate_path";

/// Thrift request id locator (sk_msg)
pub const PROG_THRIFT_LOCATOR: &str = "parse_thrift_call";

/// Inbound stream parser (sk_skb)
pub const PROG_STREAM_PARSER: &str = "pull_full_message";

/// Inbound stream verdict caching received paths (sk_skb)
pub const PROG_STREAM_VERDICT: &str = "cache_path";

// ============================================================================
// Chained Dispatch
// ============================================================================

/// Jump table index of the path propagator
pub const JUMP_PROPAGATE: u32 = 0;

/// Jump table index of the extended header locator
pub const JUMP_EXTENDED: u32 = 1;

/// Number of jump table entries
pub const JUMP_TABLE_LEN: u32 = 2;

/// Argument slot holding the header offset
pub const ARG_SLOT_OFFSET: u32 = 0;

/// Argument slot holding the HEADERS frame length
pub const ARG_SLOT_FRAME_LEN: u32 = 1;

/// Number of argument slots
pub const ARG_SLOTS: u32 = 2;

// ============================================================================
// HTTP/2 and HPACK
// ============================================================================

/// Length of an HTTP/2 frame header (3B length, 1B type, 1B flags, 4B stream id)
pub const FRAME_HEADER_LEN: usize = 9;

/// HEADERS frame type
pub const FRAME_TYPE_HEADERS: u8 = 0x01;

/// Synthetic frame type carrying (trace id, path); not a real HTTP/2 type
pub const FRAME_TYPE_CONTEXT: u8 = 0x0A;

/// Largest header offset or frame length accepted from the argument slots
pub const MAX_HEADER_OFFSET: u32 = 2048;

/// Header fields examined per invocation before chaining
pub const MAX_HEADERS_PER_PASS: usize = 6;

/// First index of the HPACK dynamic table
pub const DYNAMIC_TABLE_BASE: u8 = 62;

/// Length of the Huffman-coded tracing header name
pub const TRACE_HEADER_NAME_LEN: usize = 9;

/// Huffman-coded `uber-trace-id`
pub const TRACE_HEADER_NAME: [u8; TRACE_HEADER_NAME_LEN] =
    [0xb6, 0x32, 0xd8, 0xb2, 0x6c, 0x19, 0x0a, 0xb1, 0xa4];

/// First 8 bytes of the tracing header name read as a little-endian word
pub const TRACE_HEADER_NAME_HEAD: u64 = 0xb10a_196c_b2d8_32b6;

/// Last byte of the tracing header name
pub const TRACE_HEADER_NAME_TAIL: u8 = 0xa4;

/// `HTTP` (HTTP/1.1 responses)
pub const PREAMBLE_HTTP: u32 = 0x4854_5450;

/// `GET `
pub const PREAMBLE_GET: u32 = 0x4745_5420;

/// `POST`
pub const PREAMBLE_POST: u32 = 0x504F_5354;

/// `PRI ` (HTTP/2 connection preface)
pub const PREAMBLE_PRI: u32 = 0x5052_4920;

// ============================================================================
// Trace Paths
// ============================================================================

/// Size of a path record: 1B hop count + 100 one-byte service ids
pub const PATH_RECORD_LEN: usize = 101;

/// Maximum hop count stored in a path record
pub const MAX_PATH_HOPS: u8 = 99;

/// Size of a trace id on the wire
pub const TRACE_ID_LEN: usize = 8;

/// Payload length of the injected context frame
pub const CONTEXT_PAYLOAD_LEN: usize = TRACE_ID_LEN + PATH_RECORD_LEN;

/// Total size of the injected context frame
pub const CONTEXT_FRAME_LEN: usize = FRAME_HEADER_LEN + CONTEXT_PAYLOAD_LEN;

/// Offset of the trace id inside the context frame
pub const CONTEXT_TRACE_ID_OFFSET: usize = FRAME_HEADER_LEN;

/// Offset of the path record inside the context frame
pub const CONTEXT_PATH_OFFSET: usize = FRAME_HEADER_LEN + TRACE_ID_LEN;

/// Ring index slot holding the head (oldest live entry)
pub const RING_HEAD: u32 = 0;

/// Ring index slot holding the tail (next free slot)
pub const RING_TAIL: u32 = 1;

// ============================================================================
// Thrift
// ============================================================================

/// CALL message type
pub const THRIFT_CALL: u8 = 0x01;

/// T_I64 field type
pub const THRIFT_TYPE_I64: u8 = 0x0A;

/// Upper bound accepted for the header length field
pub const MAX_THRIFT_HEADER_LEN: u32 = 256;

/// Offset of the field type tag past the header length
pub const THRIFT_FIELD_TYPE_OFFSET: usize = 12;

/// Offset of the i64 request id past the header length
pub const THRIFT_REQUEST_ID_OFFSET: usize = 15;

// ============================================================================
// Sockets (from linux/bpf.h and linux/socket.h)
// ============================================================================

/// IPv4 address family
pub const AF_INET: u32 = 2;

/// IPv6 address family
pub const AF_INET6: u32 = 10;

/// Active side finished the handshake
pub const BPF_SOCK_OPS_ACTIVE_ESTABLISHED_CB: u32 = 4;

/// Passive side finished the handshake
pub const BPF_SOCK_OPS_PASSIVE_ESTABLISHED_CB: u32 = 5;
