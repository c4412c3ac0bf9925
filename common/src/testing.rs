//! In-memory stand-ins for the shared BPF maps.

use std::{cell::RefCell, collections::HashMap, vec::Vec};

use crate::{
    buffer::{MessageBytes, MessageBytesMut},
    constants::*,
    state::*,
    types::TracePath,
};

impl MessageBytes for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn load_u8(&self, offset: usize) -> Option<u8> {
        self.as_slice().load_u8(offset)
    }

    fn load_array<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        self.as_slice().load_array(offset)
    }
}

impl MessageBytesMut for Vec<u8> {
    fn store(&mut self, offset: usize, bytes: &[u8]) -> Option<()> {
        let end = offset.checked_add(bytes.len())?;
        self.get_mut(offset..end)?.copy_from_slice(bytes);
        Some(())
    }

    fn grow_front(&mut self, len: u32) -> Option<()> {
        self.splice(0..0, core::iter::repeat(0u8).take(len as usize));
        Some(())
    }

    fn shrink_front(&mut self, len: u32) -> Option<()> {
        if (len as usize) > Vec::len(self) {
            return None;
        }
        self.drain(..len as usize);
        Some(())
    }
}

/// Message whose growth succeeds but whose contiguous window stays short,
/// like a scattered sk_msg whose pushed bytes are not linear.
pub struct ShortWindow {
    pub bytes: Vec<u8>,
    pub window: usize,
}

impl MessageBytes for ShortWindow {
    fn len(&self) -> usize {
        self.window.min(self.bytes.len())
    }

    fn load_u8(&self, offset: usize) -> Option<u8> {
        self.bytes[..self.len()].load_u8(offset)
    }

    fn load_array<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        self.bytes[..self.len()].load_array(offset)
    }
}

impl MessageBytesMut for ShortWindow {
    fn store(&mut self, offset: usize, bytes: &[u8]) -> Option<()> {
        let end = offset.checked_add(bytes.len())?;
        if end > self.len() {
            return None;
        }
        self.bytes.store(offset, bytes)
    }

    fn grow_front(&mut self, len: u32) -> Option<()> {
        self.bytes.grow_front(len)
    }

    fn shrink_front(&mut self, len: u32) -> Option<()> {
        self.bytes.shrink_front(len)
    }
}

#[derive(Default)]
pub struct MemArgSlots(pub RefCell<HashMap<u32, u32>>);

impl ArgSlots for MemArgSlots {
    fn slot(&self, index: u32) -> Option<u32> {
        if index >= ARG_SLOTS {
            return None;
        }
        // Array maps are zero-initialised.
        Some(self.0.borrow().get(&index).copied().unwrap_or(0))
    }

    fn set_slot(&self, index: u32, value: u32) {
        if index < ARG_SLOTS {
            self.0.borrow_mut().insert(index, value);
        }
    }
}

#[derive(Default)]
pub struct MemHeaderIndex(pub RefCell<HashMap<u32, u8>>);

impl HeaderIndex for MemHeaderIndex {
    fn cursor(&self, peer: u32) -> Option<u8> {
        self.0.borrow().get(&peer).copied()
    }

    fn set_cursor(&self, peer: u32, index: u8) {
        self.0.borrow_mut().insert(peer, index);
    }
}

#[derive(Default)]
pub struct MemPaths(pub RefCell<HashMap<u64, TracePath>>);

impl PathStore for MemPaths {
    fn path(&self, trace_id: u64) -> Option<TracePath> {
        self.0.borrow().get(&trace_id).copied()
    }

    fn store_path(&self, trace_id: u64, path: &TracePath) {
        self.0.borrow_mut().insert(trace_id, *path);
    }

    fn remove_path(&self, trace_id: u64) {
        self.0.borrow_mut().remove(&trace_id);
    }
}

pub struct MemRing {
    pub indices: RefCell<[u32; 2]>,
    pub entries: RefCell<Vec<u64>>,
}

impl Default for MemRing {
    fn default() -> Self {
        Self {
            indices: RefCell::new([0; 2]),
            entries: RefCell::new(vec![0; PATH_CACHE_ENTRIES as usize]),
        }
    }
}

impl EvictionRing for MemRing {
    fn index(&self, which: u32) -> Option<u32> {
        self.indices.borrow().get(which as usize).copied()
    }

    fn set_index(&self, which: u32, value: u32) {
        if let Some(v) = self.indices.borrow_mut().get_mut(which as usize) {
            *v = value;
        }
    }

    fn entry(&self, slot: u32) -> Option<u64> {
        self.entries.borrow().get(slot as usize).copied()
    }

    fn set_entry(&self, slot: u32, trace_id: u64) {
        if let Some(v) = self.entries.borrow_mut().get_mut(slot as usize) {
            *v = trace_id;
        }
    }
}

/// Ring whose index map was never created.
pub struct MissingRing;

impl EvictionRing for MissingRing {
    fn index(&self, _which: u32) -> Option<u32> {
        None
    }

    fn set_index(&self, _which: u32, _value: u32) {}

    fn entry(&self, _slot: u32) -> Option<u64> {
        None
    }

    fn set_entry(&self, _slot: u32, _trace_id: u64) {}
}

pub struct MemCorrelations {
    pub counter: RefCell<Option<u64>>,
    pub records: RefCell<HashMap<u64, u64>>,
}

impl Default for MemCorrelations {
    fn default() -> Self {
        Self {
            counter: RefCell::new(Some(0)),
            records: RefCell::new(HashMap::new()),
        }
    }
}

impl Correlations for MemCorrelations {
    fn sequence(&self) -> Option<u64> {
        *self.counter.borrow()
    }

    fn set_sequence(&self, value: u64) {
        let mut counter = self.counter.borrow_mut();
        if counter.is_some() {
            *counter = Some(value);
        }
    }

    fn record(&self, sequence: u64, request_id: u64) {
        self.records.borrow_mut().insert(sequence, request_id);
    }
}

pub struct FixedService(pub Option<u8>);

impl ServiceIdentity for FixedService {
    fn service_id(&self) -> Option<u8> {
        self.0
    }
}

/// Builds an HTTP/2 frame header followed by `payload`.
pub fn frame(frame_type: u8, payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u32;
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    out.extend_from_slice(&((len << 8) | frame_type as u32).to_be_bytes());
    out.extend_from_slice(&[0x04, 0x00, 0x00, 0x00, 0x01]);
    out.extend_from_slice(payload);
    out
}

/// New-name literal with incremental indexing carrying the tracing header.
pub fn trace_header(value: &[u8]) -> Vec<u8> {
    let mut out = vec![0x40, 0x80 | TRACE_HEADER_NAME_LEN as u8];
    out.extend_from_slice(&TRACE_HEADER_NAME);
    out.push(value.len() as u8);
    out.extend_from_slice(value);
    out
}

/// New-name literal with incremental indexing and an unrelated name.
pub fn literal_header(name: &[u8], value: &[u8]) -> Vec<u8> {
    let mut out = vec![0x40, name.len() as u8];
    out.extend_from_slice(name);
    out.push(value.len() as u8);
    out.extend_from_slice(value);
    out
}

/// Literal whose name refers to dynamic-table entry `index`.
pub fn indexed_name_header(index: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![0x40 | (index & 0x3F), value.len() as u8];
    out.extend_from_slice(value);
    out
}
