//! Shared data structures between kernel and userspace
//!
//! These structures must be repr(C) to ensure consistent memory layout
//! between eBPF programs and userspace code.

use crate::constants::{
    AF_INET, AF_INET6, BPF_SOCK_OPS_ACTIVE_ESTABLISHED_CB, BPF_SOCK_OPS_PASSIVE_ESTABLISHED_CB,
    MAX_PATH_HOPS, PATH_RECORD_LEN,
};

/// Socket registration key (4-tuple)
///
/// Used to uniquely identify TCP connections in the sockhash.
/// Addresses are in network byte order; ports carry their 16-bit
/// network-order value in the low half of the field.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    /// Local (source) IPv4 address
    pub saddr: u32,
    /// Remote (destination) IPv4 address
    pub daddr: u32,
    /// Local port
    pub sport: u32,
    /// Remote port
    pub dport: u32,
}

impl ConnectionKey {
    /// Build a key from the raw `bpf_sock_ops` fields.
    ///
    /// `local_port` arrives in host byte order and `remote_port` in network
    /// byte order in the upper half, so only the local port is swapped.
    #[inline(always)]
    pub fn from_sock_ops(
        local_ip4: u32,
        remote_ip4: u32,
        local_port: u32,
        remote_port: u32,
    ) -> Self {
        Self {
            saddr: local_ip4,
            daddr: remote_ip4,
            sport: local_port.to_be() >> 16,
            dport: remote_port >> 16,
        }
    }
}

/// Whether `op` marks the end of a handshake on either side.
#[inline(always)]
pub fn is_established(op: u32) -> bool {
    op == BPF_SOCK_OPS_ACTIVE_ESTABLISHED_CB || op == BPF_SOCK_OPS_PASSIVE_ESTABLISHED_CB
}

/// Whether the socket family is one we register.
///
/// IPv6 sockets are registered too; their key carries the IPv4 fields,
/// which are zero unless the address is v4-mapped.
#[inline(always)]
pub fn is_supported_family(family: u32) -> bool {
    family == AF_INET || family == AF_INET6
}

/// Call path of a trace: hop count followed by one-byte service ids,
/// newest first.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TracePath(pub [u8; PATH_RECORD_LEN]);

impl Default for TracePath {
    fn default() -> Self {
        Self([0; PATH_RECORD_LEN])
    }
}

impl TracePath {
    /// Path holding a single hop.
    #[inline(always)]
    pub fn first_hop(service: u8) -> Self {
        let mut path = Self::default();
        path.0[0] = 1;
        path.0[1] = service;
        path
    }

    /// Number of hops recorded.
    #[inline(always)]
    pub fn hop_count(&self) -> u8 {
        self.0[0]
    }

    /// Hop `n` counted from the newest, if recorded.
    pub fn hop(&self, n: usize) -> Option<u8> {
        if n >= self.hop_count() as usize {
            return None;
        }
        self.0.get(n + 1).copied()
    }

    /// Path with `service` prepended as the newest hop.
    ///
    /// Older hops move one slot towards the end; the slot past the end is
    /// dropped and the hop count saturates at `MAX_PATH_HOPS`.
    #[inline(always)]
    pub fn extended(&self, service: u8) -> Self {
        let mut next = *self;
        // Walk backwards so every hop is read before it is overwritten.
        for i in (1..PATH_RECORD_LEN - 1).rev() {
            next.0[i + 1] = next.0[i];
        }
        next.0[1] = service;

        let hops = if self.hop_count() >= MAX_PATH_HOPS {
            MAX_PATH_HOPS
        } else {
            self.hop_count() + 1
        };
        next.0[0] = hops;

        for i in (hops as usize + 1)..PATH_RECORD_LEN {
            next.0[i] = 0;
        }
        next
    }
}

// Compile-time layout checks
const _: () = {
    assert!(core::mem::size_of::<ConnectionKey>() == 16);
    assert!(core::mem::size_of::<TracePath>() == PATH_RECORD_LEN);
};

// Implement Aya's Pod trait for userspace usage
#[cfg(feature = "userspace")]
mod userspace_impls {
    use super::*;

    // Pod trait implementations for reading and writing maps in userspace
    unsafe impl aya::Pod for ConnectionKey {}
    unsafe impl aya::Pod for TracePath {}
}
