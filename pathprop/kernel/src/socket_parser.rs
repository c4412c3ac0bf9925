//! Socket registration key extraction
//!
//! Reads the 4-tuple of a freshly established connection from the
//! `bpf_sock_ops` context. The callback and family filters live in
//! `pathprop_common::types` so they can be tested on the host.

use aya_ebpf::programs::SockOpsContext;
use pathprop_common::types::{is_established, is_supported_family, ConnectionKey};

/// Extract the connection key for an established socket
///
/// Returns None for other callbacks and address families.
#[inline(always)]
pub fn extract_connection_key(ctx: &SockOpsContext) -> Option<ConnectionKey> {
    if !is_established(ctx.op()) {
        return None;
    }
    if !is_supported_family(ctx.family()) {
        return None;
    }

    Some(ConnectionKey::from_sock_ops(
        ctx.local_ip4(),
        ctx.remote_ip4(),
        ctx.local_port(),
        ctx.remote_port(),
    ))
}
