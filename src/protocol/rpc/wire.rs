//! RPC record marking for stream transports (RFC 5531 section 11).
//!
//! Every record is sent as one or more fragments. A fragment starts with a
//! 4-byte big-endian header: the lower 31 bits hold the fragment length and
//! the highest bit marks the last fragment of the record.

use std::io;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Largest reply record accepted from a server.
pub const MAX_RPC_RECORD_LENGTH: usize = 64 * 1024 * 1024;

/// Maximum fragment size is 2^31 - 1 bytes.
const MAX_FRAGMENT_SIZE: usize = (1 << 31) - 1;

const LAST_FRAGMENT: u32 = 1 << 31;

/// Reads a single record-marked fragment and appends it to `append_to`.
///
/// Returns true if this was the last fragment in the record.
pub async fn read_fragment<R: AsyncRead + Unpin>(
    socket: &mut R,
    append_to: &mut Vec<u8>,
) -> io::Result<bool> {
    let mut header_buf = [0_u8; 4];
    socket.read_exact(&mut header_buf).await?;
    let fragment_header = u32::from_be_bytes(header_buf);
    let is_last = (fragment_header & LAST_FRAGMENT) > 0;
    let length = (fragment_header & !LAST_FRAGMENT) as usize;
    trace!("Reading fragment length:{}, last:{}", length, is_last);
    if append_to.len().saturating_add(length) > MAX_RPC_RECORD_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("RPC record length {} exceeds max {}", length, MAX_RPC_RECORD_LENGTH),
        ));
    }
    let start_offset = append_to.len();
    append_to.resize(append_to.len() + length, 0);
    socket.read_exact(&mut append_to[start_offset..]).await?;
    Ok(is_last)
}

/// Reads fragments until the last one and returns the reassembled record.
pub async fn read_record<R: AsyncRead + Unpin>(socket: &mut R) -> io::Result<Vec<u8>> {
    let mut record = Vec::new();
    while !read_fragment(socket, &mut record).await? {}
    Ok(record)
}

/// Writes `segments` back to back as a single record in one last fragment.
pub async fn write_record<W: AsyncWrite + Unpin>(
    socket: &mut W,
    segments: &[Bytes],
) -> io::Result<()> {
    let length: usize = segments.iter().map(Bytes::len).sum();
    if length > MAX_FRAGMENT_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("RPC record length {length} does not fit in one fragment"),
        ));
    }

    let fragment_header = length as u32 | LAST_FRAGMENT;
    trace!("Writing fragment length:{}, last:true", length);
    socket.write_all(&fragment_header.to_be_bytes()).await?;
    for segment in segments {
        socket.write_all(segment).await?;
    }
    socket.flush().await
}
