//! eBPF Path Propagation - Kernel Space Programs
//!
//! These programs follow distributed traces across service hops without
//! terminating connections. Outbound messages carrying a tracing header
//! get a small context frame prepended that holds the trace id and the
//! call path so far; the receiving side caches that path until its own
//! next outbound message on the same trace.
//!
//! ## Architecture
//!
//! ```text
//! sock_ops          -> register_socket: established socket into SOCK_OPS
//!
//! sk_msg (gRPC)     -> parse_grpc_headers --budget--> parse_grpc_headers_ext
//!                            |                               |
//!                            +---------- found --------------+
//!                                          v
//!                                   propagate_path: prepend context frame
//!
//! sk_msg (Thrift)   -> parse_thrift_call: sequence -> request id
//!
//! sk_skb            -> pull_full_message -> cache_path: PATHS + EVICTION_RING
//! ```
//!
//! ## Usage
//!
//! This program must be compiled for the bpfel-unknown-none target:
//!
//! ```bash
//! cargo build --release --target=bpfel-unknown-none -p pathprop-ebpf
//! ```
//!
//! The compiled bytecode is then loaded by the userspace program.

#![no_std]
#![no_main]

mod handlers;
mod helpers;
mod maps;
mod socket_parser;

// Re-export program entry points so they're visible to the loader
pub use handlers::{
    cache_path, parse_grpc_headers, parse_grpc_headers_ext, parse_thrift_call, propagate_path,
    pull_full_message, register_socket,
};

// Re-export maps for verification
pub use maps::{
    CORRELATIONS, EVICTION_RING, HEADER_INDEX, JUMP_TABLE, MSG_ARGS, MSG_COUNTER, PATHS,
    RING_INDEX, SERVICE_ID, SOCK_OPS,
};

#[link_section = "license"]
#[no_mangle]
static LICENSE: [u8; 4] = *b"GPL\0";

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    // eBPF programs cannot panic - the verifier rejects any reachable path here
    loop {}
}
