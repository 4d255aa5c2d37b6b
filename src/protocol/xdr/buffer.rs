//! Cursor-based XDR byte buffer.
//!
//! [XdrBuffer] holds one RPC message. Outgoing messages are built in the
//! primary buffer and may carry trailing zero-copy payload segments (the data
//! of a WRITE call) that are never copied into the primary buffer. Incoming
//! replies are parsed from the primary buffer; reading past its end is a
//! [Error::MalformedMessage].
//!
//! Every scalar advances the cursor by its natural size. Opaque data and
//! strings advance by 4 (length) + data + zero padding to a multiple of 4.
//! Padding is always measured from the absolute position of the message,
//! which for payload-bearing messages includes every pending payload byte.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};
use bytes::Bytes;

use super::utils::{self, padding_len, ALIGNMENT};
use super::{deserialize, Deserialize, Serialize, XDREndian};
use crate::error::{Error, Result};

const ZERO_PADDING: [u8; ALIGNMENT] = [0; ALIGNMENT];

/// Decode failures inside a received message are malformed-message errors,
/// whatever the underlying io error kind.
pub(crate) fn malformed(err: std::io::Error) -> Error {
    Error::MalformedMessage(err.to_string())
}

/// Growable XDR message buffer with a read/write cursor.
#[derive(Debug, Default, Clone)]
pub struct XdrBuffer {
    buf: Vec<u8>,
    pos: usize,
    payloads: Vec<Bytes>,
    payload_len: usize,
    terminal_padding: usize,
}

impl XdrBuffer {
    /// Creates an empty buffer for building a message of about `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity), ..Default::default() }
    }

    /// Wraps received bytes for decoding. The cursor starts at 0.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self { buf, ..Default::default() }
    }

    /// Current cursor position in the primary buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the cursor to an absolute position inside the primary buffer.
    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(Error::MalformedMessage(format!(
                "position {pos} is past the end of a {} byte buffer",
                self.buf.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    /// Rewinds the cursor to the start of the message.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Bytes held in the primary buffer.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Bytes between the cursor and the end of the primary buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Total number of bytes appended as zero-copy payload.
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Number of bytes that will be transmitted: primary buffer, payload
    /// segments and terminal padding.
    pub fn total_len(&self) -> usize {
        self.buf.len() + self.payload_len + self.terminal_padding
    }

    /// Zero bytes still needed to bring `cursor + pending payload` to a
    /// 4-byte boundary.
    pub fn pending_padding(&self) -> usize {
        padding_len(self.pos + self.payload_len + self.terminal_padding)
    }

    fn align(&mut self) -> Result<()> {
        let pad = self.pending_padding();
        if pad > 0 {
            self.write_all(&ZERO_PADDING[..pad])?;
        }
        Ok(())
    }

    pub fn put_i32(&mut self, val: i32) -> Result<()> {
        Ok(self.write_i32::<XDREndian>(val)?)
    }

    pub fn put_u32(&mut self, val: u32) -> Result<()> {
        Ok(self.write_u32::<XDREndian>(val)?)
    }

    pub fn put_i64(&mut self, val: i64) -> Result<()> {
        Ok(self.write_i64::<XDREndian>(val)?)
    }

    pub fn put_u64(&mut self, val: u64) -> Result<()> {
        Ok(self.write_u64::<XDREndian>(val)?)
    }

    pub fn put_bool(&mut self, val: bool) -> Result<()> {
        Ok(val.serialize(self)?)
    }

    pub fn put_f32(&mut self, val: f32) -> Result<()> {
        Ok(self.write_f32::<XDREndian>(val)?)
    }

    pub fn put_f64(&mut self, val: f64) -> Result<()> {
        Ok(self.write_f64::<XDREndian>(val)?)
    }

    /// Writes variable-length opaque data: length, bytes, zero padding.
    pub fn put_opaque(&mut self, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| {
            Error::Io(utils::invalid_data("opaque data longer than u32::MAX bytes"))
        })?;
        self.put_u32(len)?;
        self.write_all(data)?;
        self.align()
    }

    /// Writes a UTF-8 string as variable-length opaque data.
    pub fn put_string(&mut self, val: &str) -> Result<()> {
        self.put_opaque(val.as_bytes())
    }

    /// Serializes any typed XDR value at the cursor.
    pub fn put<T: Serialize + ?Sized>(&mut self, val: &T) -> Result<()> {
        Ok(val.serialize(self)?)
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        self.read_i32::<XDREndian>().map_err(malformed)
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.read_u32::<XDREndian>().map_err(malformed)
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        self.read_i64::<XDREndian>().map_err(malformed)
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        self.read_u64::<XDREndian>().map_err(malformed)
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        deserialize::<bool>(self).map_err(malformed)
    }

    pub fn get_f32(&mut self) -> Result<f32> {
        self.read_f32::<XDREndian>().map_err(malformed)
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        self.read_f64::<XDREndian>().map_err(malformed)
    }

    /// Reads variable-length opaque data and skips its padding.
    pub fn get_opaque(&mut self) -> Result<Vec<u8>> {
        let len = self.get_u32()? as usize;
        if len > self.remaining() {
            return Err(Error::MalformedMessage(format!(
                "opaque length {len} exceeds the {} remaining bytes",
                self.remaining()
            )));
        }
        let data = self.buf[self.pos..self.pos + len].to_vec();
        self.skip(len)?;
        Ok(data)
    }

    /// Reads a UTF-8 string.
    pub fn get_string(&mut self) -> Result<String> {
        String::from_utf8(self.get_opaque()?)
            .map_err(|_| Error::MalformedMessage("string is not valid UTF-8".to_string()))
    }

    /// Deserializes a typed XDR value into its [Default] and returns it.
    pub fn get<T: Deserialize + Default>(&mut self) -> Result<T> {
        deserialize::<T>(self).map_err(malformed)
    }

    /// Advances the cursor by `n` bytes, then to the next 4-byte boundary of
    /// the new absolute position.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        let target = self.pos.checked_add(n).ok_or_else(|| {
            Error::MalformedMessage(format!("skip of {n} bytes overflows the cursor"))
        })?;
        let target = target + padding_len(target);
        if target > self.buf.len() {
            return Err(Error::MalformedMessage(format!(
                "skip to {target} runs past the end of a {} byte buffer",
                self.buf.len()
            )));
        }
        self.pos = target;
        Ok(())
    }

    /// Records zero-copy payload segments to be transmitted after the
    /// primary buffer. The primary buffer is sealed from then on.
    pub fn append_payload<I>(&mut self, segments: I)
    where
        I: IntoIterator<Item = Bytes>,
    {
        for segment in segments {
            self.payload_len += segment.len();
            self.payloads.push(segment);
        }
    }

    /// Appends the terminal padding so that primary bytes plus payload bytes
    /// end on a 4-byte boundary. Returns the number of padding bytes added.
    /// Calling it again is a no-op.
    pub fn finalize_payloads(&mut self) -> usize {
        let pad = padding_len(self.buf.len() + self.payload_len + self.terminal_padding);
        self.terminal_padding += pad;
        pad
    }

    /// The message as transmit-ordered segments: primary buffer, payloads,
    /// terminal padding.
    pub fn segments(&self) -> Vec<Bytes> {
        let mut segments = Vec::with_capacity(self.payloads.len() + 2);
        segments.push(Bytes::copy_from_slice(&self.buf));
        segments.extend(self.payloads.iter().cloned());
        if self.terminal_padding > 0 {
            segments.push(Bytes::from(vec![0_u8; self.terminal_padding]));
        }
        segments
    }
}

impl Write for XdrBuffer {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        if !self.payloads.is_empty() || self.terminal_padding > 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "primary buffer is sealed once a payload has been appended",
            ));
        }
        let end = self.pos + data.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Read for XdrBuffer {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        let n = out.len().min(self.remaining());
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_advance_by_natural_size() {
        let mut buf = XdrBuffer::with_capacity(64);
        buf.put_i32(-7).unwrap();
        assert_eq!(buf.position(), 4);
        buf.put_u64(u64::MAX).unwrap();
        assert_eq!(buf.position(), 12);
        buf.put_bool(true).unwrap();
        buf.put_f32(1.5).unwrap();
        assert_eq!(buf.position(), 20);

        buf.reset();
        assert_eq!(buf.get_i32().unwrap(), -7);
        assert_eq!(buf.get_u64().unwrap(), u64::MAX);
        assert!(buf.get_bool().unwrap());
        assert_eq!(buf.get_f32().unwrap(), 1.5);
    }

    #[test]
    fn values_are_big_endian() {
        let mut buf = XdrBuffer::default();
        buf.put_u32(0x0102_0304).unwrap();
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn opaque_is_padded_with_zeros() {
        let mut buf = XdrBuffer::default();
        buf.put_opaque(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee]).unwrap();
        assert_eq!(buf.as_slice(), &[0, 0, 0, 5, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0, 0, 0]);
    }

    #[test]
    fn opaque_round_trip_ends_aligned() {
        for len in 0..17 {
            let data: Vec<u8> = (0..len as u8).collect();
            let mut buf = XdrBuffer::default();
            buf.put_opaque(&data).unwrap();
            buf.reset();
            assert_eq!(buf.get_opaque().unwrap(), data);
            assert_eq!(buf.position() % 4, 0);
            assert_eq!(buf.remaining(), 0);
        }
    }

    #[test]
    fn empty_string_is_just_a_length() {
        let mut buf = XdrBuffer::default();
        buf.put_string("").unwrap();
        assert_eq!(buf.as_slice(), &[0, 0, 0, 0]);
        buf.reset();
        assert_eq!(buf.get_string().unwrap(), "");
    }

    #[test]
    fn skip_pads_from_the_new_position_only_once() {
        let mut buf = XdrBuffer::from_bytes(vec![0; 16]);
        buf.skip(3).unwrap();
        assert_eq!(buf.position(), 4);
        buf.skip(4).unwrap();
        assert_eq!(buf.position(), 8);
        buf.skip(0).unwrap();
        assert_eq!(buf.position(), 8);
        buf.skip(5).unwrap();
        assert_eq!(buf.position(), 16);
    }

    #[test]
    fn reading_past_the_end_is_malformed() {
        let mut buf = XdrBuffer::from_bytes(vec![0, 0, 0]);
        assert!(matches!(buf.get_u32(), Err(Error::MalformedMessage(_))));

        let mut buf = XdrBuffer::from_bytes(vec![0, 0, 0, 9, 1, 2]);
        assert!(matches!(buf.get_opaque(), Err(Error::MalformedMessage(_))));

        let mut buf = XdrBuffer::from_bytes(vec![0; 4]);
        assert!(matches!(buf.skip(5), Err(Error::MalformedMessage(_))));
    }

    #[test]
    fn payload_padding_counts_payload_bytes() {
        let mut buf = XdrBuffer::default();
        buf.put_u32(1).unwrap();
        buf.append_payload([Bytes::from_static(b"x")]);
        assert_eq!(buf.pending_padding(), 3);
        assert_eq!(buf.finalize_payloads(), 3);
        assert_eq!(buf.total_len(), 8);
        assert_eq!(buf.finalize_payloads(), 0);

        let mut buf = XdrBuffer::default();
        buf.put_u32(1).unwrap();
        buf.append_payload([Bytes::from_static(b"four")]);
        assert_eq!(buf.pending_padding(), 0);
        assert_eq!(buf.finalize_payloads(), 0);
        assert_eq!(buf.segments().len(), 2);
    }

    #[test]
    fn segments_are_in_transmit_order() {
        let mut buf = XdrBuffer::default();
        buf.put_u32(2).unwrap();
        buf.append_payload([Bytes::from_static(b"ab"), Bytes::from_static(b"c")]);
        buf.finalize_payloads();

        let flat: Vec<u8> = buf.segments().iter().flat_map(|s| s.iter().copied()).collect();
        assert_eq!(flat, vec![0, 0, 0, 2, b'a', b'b', b'c', 0]);
    }

    #[test]
    fn primary_buffer_is_sealed_by_a_payload() {
        let mut buf = XdrBuffer::default();
        buf.append_payload([Bytes::from_static(b"data")]);
        assert!(buf.put_u32(1).is_err());
    }
}
