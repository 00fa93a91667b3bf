//! Channels that carry transactions: stream framing, the Unix socket
//! transport and an in-process loopback.

use byteorder::{ByteOrder, LittleEndian};
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

use flinger_gui::TransportError;

use crate::parcel::Parcel;
use crate::protocol::decode_reply;
use crate::stub::ProducerStub;

/// Largest payload accepted in one frame.
pub const MAX_FRAME_LEN: usize = 1 << 20;

const FRAME_HEADER_LEN: usize = 8;

/// A synchronous request/reply channel to a producer stub.
pub trait Transport: Send + Sync {
    /// Sends `data` under `code` and blocks for the reply parcel.
    fn transact(&self, code: u32, data: &Parcel) -> Result<Parcel, TransportError>;
}

/// Writes one `u32 code | u32 length | payload` frame.
pub fn write_frame<W: Write>(writer: &mut W, code: u32, payload: &[u8]) -> Result<(), TransportError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(TransportError::Malformed(format!(
            "payload of {} bytes exceeds frame limit {}",
            payload.len(),
            MAX_FRAME_LEN
        )));
    }
    let mut header = [0u8; FRAME_HEADER_LEN];
    LittleEndian::write_u32(&mut header[0..4], code);
    LittleEndian::write_u32(&mut header[4..8], payload.len() as u32);
    writer.write_all(&header)?;
    writer.write_all(payload)?;
    writer.flush()?;
    trace!("Wrote frame code {} ({} bytes)", code, payload.len());
    Ok(())
}

/// Reads one frame. `Ok(None)` when the peer closed the stream cleanly
/// between frames.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<(u32, Vec<u8>)>, TransportError> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    let mut filled = 0;
    while filled < FRAME_HEADER_LEN {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(TransportError::Disconnected),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    let code = LittleEndian::read_u32(&header[0..4]);
    let len = LittleEndian::read_u32(&header[4..8]) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::Malformed(format!(
            "frame length {} exceeds limit {}",
            len, MAX_FRAME_LEN
        )));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    trace!("Read frame code {} ({} bytes)", code, len);
    Ok(Some((code, payload)))
}

/// Producer-side end of a Unix stream socket.
///
/// The stream is locked for the whole request/reply exchange so calls from
/// several threads never interleave frames.
#[derive(Debug)]
pub struct UnixTransport {
    stream: Mutex<UnixStream>,
}

impl UnixTransport {
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self, TransportError> {
        let stream = UnixStream::connect(path.as_ref())?;
        debug!("Connected to producer socket {}", path.as_ref().display());
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: UnixStream) -> Self {
        UnixTransport {
            stream: Mutex::new(stream),
        }
    }
}

impl Transport for UnixTransport {
    fn transact(&self, code: u32, data: &Parcel) -> Result<Parcel, TransportError> {
        let mut stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        write_frame(&mut *stream, code, data.as_bytes())?;
        let (reply_code, payload) = read_frame(&mut *stream)?.ok_or(TransportError::Disconnected)?;
        decode_reply(reply_code, payload)
    }
}

/// Dispatches straight into a stub in the same process.
pub struct LoopbackTransport {
    stub: Arc<ProducerStub>,
    open: AtomicBool,
}

impl LoopbackTransport {
    pub fn new(stub: Arc<ProducerStub>) -> Self {
        LoopbackTransport {
            stub,
            open: AtomicBool::new(true),
        }
    }

    /// Simulates the remote end going away; later calls fail with
    /// [`TransportError::Disconnected`].
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl Transport for LoopbackTransport {
    fn transact(&self, code: u32, data: &Parcel) -> Result<Parcel, TransportError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        let mut request = Parcel::from_bytes(data.as_bytes().to_vec());
        let reply = self.stub.on_transact(code, &mut request)?;
        Ok(Parcel::from_bytes(reply.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Cursor;

    #[test]
    fn test_frame_header_layout() {
        let mut out = Vec::new();
        write_frame(&mut out, 3, &[9, 9]).unwrap();
        assert_eq!(out, vec![3, 0, 0, 0, 2, 0, 0, 0, 9, 9]);
        let mut cursor = Cursor::new(out);
        assert_eq!(read_frame(&mut cursor).unwrap(), Some((3, vec![9, 9])));
        assert_eq!(read_frame(&mut cursor).unwrap(), None);
    }

    #[test]
    fn test_truncated_frame_is_disconnect() {
        let mut cursor = Cursor::new(vec![3, 0, 0]);
        assert_eq!(read_frame(&mut cursor), Err(TransportError::Disconnected));

        let mut cursor = Cursor::new(vec![3, 0, 0, 0, 8, 0, 0, 0, 1]);
        assert_eq!(read_frame(&mut cursor), Err(TransportError::Disconnected));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut header = vec![1, 0, 0, 0];
        header.extend_from_slice(&((MAX_FRAME_LEN as u32) + 1).to_le_bytes());
        let mut cursor = Cursor::new(header);
        assert_matches!(read_frame(&mut cursor), Err(TransportError::Malformed(_)));
    }
}
