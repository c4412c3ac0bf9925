//! Thrift binary protocol request id locator
//!
//! Understands just enough of a strict binary CALL message to find an
//! i64 first field carrying the request id:
//!
//! ```text
//! [frame len (framed only)] [version|type] [name len] [name] [seqid]
//! [field type] [field id] [i64 request id]
//! ```

use crate::{buffer::MessageBytes, constants::*, state::Correlations};

/// Outcome of correlating one outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlate {
    /// Not a CALL carrying an i64 request id.
    Pass,
    /// `sequence -> request_id` was recorded and the counter advanced.
    Recorded { sequence: u64, request_id: u64 },
    /// The message matched but the counter slot is missing.
    NoCounter { request_id: u64 },
}

/// Request id of a Thrift CALL, if the message is one.
#[inline(always)]
pub fn request_id<M: MessageBytes + ?Sized>(msg: &M) -> Option<u64> {
    let first = msg.load_be_u32(0)? as i32;
    // A positive first word is a frame length; strict binary messages
    // start with the high version bit set.
    let base = if first > 0 { 4 } else { 0 };

    if msg.load_u8(base + 3)? != THRIFT_CALL {
        return None;
    }

    let header_len = msg.load_be_u32(base + 4)?;
    if header_len > MAX_THRIFT_HEADER_LEN {
        return None;
    }
    let header_len = header_len as usize;

    if msg.load_u8(base + header_len + THRIFT_FIELD_TYPE_OFFSET)? != THRIFT_TYPE_I64 {
        return None;
    }
    msg.load_be_u64(base + header_len + THRIFT_REQUEST_ID_OFFSET)
}

/// Record the request id of a CALL under the next sequence number.
///
/// The counter is read, used and written back without any atomicity.
/// Concurrent callers may record under the same sequence.
pub fn correlate<M, C>(msg: &M, correlations: &C) -> Correlate
where
    M: MessageBytes + ?Sized,
    C: Correlations,
{
    let Some(request_id) = request_id(msg) else {
        return Correlate::Pass;
    };
    let Some(sequence) = correlations.sequence() else {
        return Correlate::NoCounter { request_id };
    };

    correlations.record(sequence, request_id);
    correlations.set_sequence(sequence.wrapping_add(1));
    Correlate::Recorded {
        sequence,
        request_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    /// Strict binary CALL with method `name` and an i64 first field.
    fn call(name: &[u8], request_id: u64) -> Vec<u8> {
        let mut out = vec![0x80, 0x01, 0x00, THRIFT_CALL];
        out.extend_from_slice(&(name.len() as u32).to_be_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(&7u32.to_be_bytes());
        out.push(THRIFT_TYPE_I64);
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&request_id.to_be_bytes());
        out.push(0x00);
        out
    }

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut out = (body.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_unframed_call_is_recorded() {
        let corr = MemCorrelations::default();
        *corr.counter.borrow_mut() = Some(5);
        let msg = call(b"getUserProfileById00", 42);
        assert_eq!(b"getUserProfileById00".len(), 20);

        assert_eq!(
            correlate(&msg, &corr),
            Correlate::Recorded {
                sequence: 5,
                request_id: 42
            }
        );
        assert_eq!(corr.records.borrow().get(&5), Some(&42));
        assert_eq!(corr.sequence(), Some(6));
    }

    #[test]
    fn test_framed_call_is_recorded() {
        let corr = MemCorrelations::default();
        let msg = framed(&call(b"ping", 0x0102_0304_0506_0708));

        assert_eq!(request_id(&msg), Some(0x0102_0304_0506_0708));
        correlate(&msg, &corr);
        correlate(&msg, &corr);

        assert_eq!(corr.records.borrow().len(), 2);
        assert_eq!(corr.sequence(), Some(2));
    }

    #[test]
    fn test_reply_is_ignored() {
        let corr = MemCorrelations::default();
        let mut msg = call(b"ping", 42);
        msg[3] = 0x02;

        assert_eq!(correlate(&msg, &corr), Correlate::Pass);
        assert_eq!(corr.sequence(), Some(0));
    }

    #[test]
    fn test_oversized_header_is_ignored() {
        let name = vec![b'x'; MAX_THRIFT_HEADER_LEN as usize + 1];
        let msg = call(&name, 42);

        assert_eq!(request_id(&msg), None);
    }

    #[test]
    fn test_non_i64_first_field_is_ignored() {
        let mut msg = call(b"ping", 42);
        msg[4 + 4 + 4 + 4] = 0x0B;

        assert_eq!(request_id(&msg), None);
    }

    #[test]
    fn test_truncated_call_is_ignored() {
        let mut msg = call(b"ping", 42);
        msg.truncate(4 + 4 + 4 + 4 + 3 + 4);

        assert_eq!(request_id(&msg), None);
    }

    #[test]
    fn test_missing_counter_is_reported() {
        let corr = MemCorrelations::default();
        *corr.counter.borrow_mut() = None;

        assert_eq!(
            correlate(&call(b"ping", 9), &corr),
            Correlate::NoCounter { request_id: 9 }
        );
        assert!(corr.records.borrow().is_empty());
    }
}
