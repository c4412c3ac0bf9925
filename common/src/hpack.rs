//! HTTP/2 HEADERS frame scanning for the tracing header
//!
//! The scan is split into passes of at most `MAX_HEADERS_PER_PASS` fields.
//! A pass that runs out of budget returns a [`Continuation`], which the
//! caller serialises into the argument slots and resumes from a fresh
//! program invocation after a tail call.
//!
//! Only the HPACK forms needed to find one field are understood. Lengths
//! are read as single-byte prefixes; multi-byte integers are not decoded.

use crate::{
    buffer::MessageBytes,
    constants::*,
    state::{ArgSlots, HeaderIndex},
};

/// Result of one scanning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Not a frame of interest, end of frame reached, or a read fell out
    /// of bounds. Forward the message unchanged.
    Pass,
    /// The tracing header starts at `offset`.
    Found { offset: u32 },
    /// Budget exhausted; resume with a fresh invocation.
    Exhausted(Continuation),
}

/// Live state of a scan across a chained-dispatch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    /// Offset of the next header field.
    pub offset: u32,
    /// Length of the HEADERS frame payload.
    pub frame_len: u32,
}

impl Continuation {
    /// Write the continuation into the argument slots.
    #[inline(always)]
    pub fn save(&self, slots: &impl ArgSlots) {
        slots.set_slot(ARG_SLOT_OFFSET, self.offset);
        slots.set_slot(ARG_SLOT_FRAME_LEN, self.frame_len);
    }

    /// Read a continuation back. Values beyond `MAX_HEADER_OFFSET` are
    /// rejected.
    #[inline(always)]
    pub fn load(slots: &impl ArgSlots) -> Option<Self> {
        let offset = slots.slot(ARG_SLOT_OFFSET)?;
        if offset > MAX_HEADER_OFFSET {
            return None;
        }
        let frame_len = slots.slot(ARG_SLOT_FRAME_LEN)?;
        if frame_len > MAX_HEADER_OFFSET {
            return None;
        }
        Some(Self { offset, frame_len })
    }
}

/// Record the offset of a found tracing header for the propagator.
#[inline(always)]
pub fn save_found(slots: &impl ArgSlots, offset: u32) {
    slots.set_slot(ARG_SLOT_OFFSET, offset);
}

/// Leading-byte classification of a header field representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `1xxxxxxx`: name and value both from the tables.
    Indexed,
    /// `001xxxxx`: dynamic table size update.
    SizeUpdate,
    /// `0x00`, `0x10`, `0x40`: literal with a new name.
    NewName,
    /// Any other literal: name taken from the tables.
    IndexedName,
}

impl FieldKind {
    #[inline(always)]
    pub fn classify(lead: u8) -> Self {
        if lead & 0x80 == 0x80 {
            FieldKind::Indexed
        } else if lead & 0xE0 == 0x20 {
            FieldKind::SizeUpdate
        } else if lead == 0x00 || lead == 0x10 || lead == 0x40 {
            FieldKind::NewName
        } else {
            FieldKind::IndexedName
        }
    }
}

/// `01xxxxxx`: literal with incremental indexing.
#[inline(always)]
fn is_incremental(lead: u8) -> bool {
    lead & 0xC0 == 0x40
}

/// Whether the first four bytes spell one of the plain-text preambles
/// (`HTTP`, `GET `, `POST`, `PRI `) rather than an HTTP/2 frame header.
#[inline(always)]
pub fn is_preamble(word: u32) -> bool {
    word == PREAMBLE_HTTP || word == PREAMBLE_GET || word == PREAMBLE_POST || word == PREAMBLE_PRI
}

/// Whether `name` is the Huffman-coded tracing header name.
#[inline(always)]
pub fn is_trace_header_name(name: &[u8; TRACE_HEADER_NAME_LEN]) -> bool {
    let head = u64::from_le_bytes([
        name[0], name[1], name[2], name[3], name[4], name[5], name[6], name[7],
    ]);
    head == TRACE_HEADER_NAME_HEAD && name[8] == TRACE_HEADER_NAME_TAIL
}

/// First pass over an outbound message.
///
/// Checks the frame header and scans from the first header field.
#[inline(always)]
pub fn locate<M, H>(msg: &M, peer: u32, index: &H) -> Scan
where
    M: MessageBytes + ?Sized,
    H: HeaderIndex,
{
    let Some(word) = msg.load_be_u32(0) else {
        return Scan::Pass;
    };
    if is_preamble(word) {
        return Scan::Pass;
    }
    if (word & 0xFF) as u8 != FRAME_TYPE_HEADERS {
        return Scan::Pass;
    }

    let start = Continuation {
        offset: FRAME_HEADER_LEN as u32,
        frame_len: word >> 8,
    };
    scan(msg, peer, index, start)
}

/// Continuation pass. Never chains again: running out of budget here
/// gives up on the message.
#[inline(always)]
pub fn resume<M, H, S>(msg: &M, peer: u32, index: &H, slots: &S) -> Scan
where
    M: MessageBytes + ?Sized,
    H: HeaderIndex,
    S: ArgSlots,
{
    let Some(start) = Continuation::load(slots) else {
        return Scan::Pass;
    };
    match scan(msg, peer, index, start) {
        Scan::Exhausted(_) => Scan::Pass,
        found => found,
    }
}

/// Scan at most `MAX_HEADERS_PER_PASS` fields starting at `from`.
#[inline(always)]
pub fn scan<M, H>(msg: &M, peer: u32, index: &H, from: Continuation) -> Scan
where
    M: MessageBytes + ?Sized,
    H: HeaderIndex,
{
    let frame_end = FRAME_HEADER_LEN + from.frame_len as usize;
    let mut offset = from.offset as usize;

    // Cursor state as of the start of this pass. Only a peer that already
    // has a cursor advances it.
    let tracked = index.cursor(peer);
    let mut cursor = tracked.unwrap_or(DYNAMIC_TABLE_BASE);

    for _ in 0..MAX_HEADERS_PER_PASS {
        if offset > frame_end {
            return Scan::Pass;
        }

        let Some(lead) = msg.load_u8(offset) else {
            return Scan::Pass;
        };

        match FieldKind::classify(lead) {
            FieldKind::Indexed | FieldKind::SizeUpdate => {
                offset += 1;
                continue;
            }
            FieldKind::NewName => {
                let Some(len_byte) = msg.load_u8(offset + 1) else {
                    return Scan::Pass;
                };
                let name_len = (len_byte & 0x7F) as usize;

                if name_len == TRACE_HEADER_NAME_LEN && is_incremental(lead) {
                    let Some(name) = msg.load_array::<TRACE_HEADER_NAME_LEN>(offset + 2) else {
                        return Scan::Pass;
                    };
                    if is_trace_header_name(&name) {
                        return Scan::Found {
                            offset: offset as u32,
                        };
                    }
                }

                // Saturates so the cursor never falls back into the static
                // table range.
                if tracked.is_some() {
                    cursor = cursor.saturating_add(1);
                    index.set_cursor(peer, cursor);
                }

                offset += 1 + name_len;
            }
            FieldKind::IndexedName => {
                if is_incremental(lead) {
                    if let Some(known) = index.cursor(peer) {
                        if lead & 0x3F == known {
                            return Scan::Found {
                                offset: offset as u32,
                            };
                        }
                    }
                }
            }
        }

        // Skip the field's value.
        let Some(len_byte) = msg.load_u8(offset + 1) else {
            return Scan::Pass;
        };
        offset += 2 + (len_byte & 0x7F) as usize;
    }

    Scan::Exhausted(Continuation {
        offset: offset as u32,
        frame_len: from.frame_len,
    })
}
