// ABOUTME: Frame-level I/O over any duplex byte stream for SMPP sessions
// ABOUTME: Splits a transport into a buffered PDU reader and a buffered PDU writer

use crate::codec::{CodecError, Frame, PduHeader};
use bytes::{Buf, Bytes, BytesMut};
use std::io::{self, Cursor};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

/// Upper bound on buffered, not yet framed input. A peer that streams more
/// than this without completing a PDU has its pending bytes dropped.
pub const MAX_READ_BUFFER: usize = 1024 * 1024;

/// Read half of a transport, type-erased so a session does not care whether
/// it runs over TCP, TLS or an in-memory pipe.
pub type ReadStream = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a transport.
pub type WriteStream = Box<dyn AsyncWrite + Send + Unpin>;

/// Split a duplex stream into a frame reader and a frame writer.
///
/// The two halves can be driven from different tasks: one task reads and
/// dispatches while timers and submitters write.
pub fn split<T>(io: T) -> (FrameReader, FrameWriter)
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read, write) = tokio::io::split(io);
    (
        FrameReader::new(Box::new(read)),
        FrameWriter::new(Box::new(write)),
    )
}

/// Result of pulling one PDU's worth of bytes off the stream
#[derive(Debug)]
pub enum Inbound {
    /// A PDU that decoded cleanly, together with its raw bytes
    Frame { frame: Frame, raw: Bytes },

    /// A PDU whose length was sane but whose header or body failed to
    /// decode. The bytes have been consumed; the header fields are recovered
    /// from the raw bytes so a request can still be answered.
    Malformed {
        command_id: u32,
        sequence_number: u32,
        raw: Bytes,
        error: CodecError,
    },

    /// The buffered input could not be framed and was thrown away
    Discarded { error: CodecError, dropped: usize },
}

/// Reads SMPP frames from the read half of a transport.
///
/// ## Framing
///
/// Every PDU starts with its own big-endian `command_length`, so the reader
/// only ever needs the first four bytes to know how much more to wait for.
/// Several PDUs arriving in one read, or one PDU split over several reads,
/// are both handled by the persistent `buffer`.
pub struct FrameReader {
    stream: ReadStream,

    // The buffer for reading frames. Bytes past the end of the last parsed
    // PDU stay here until the next call to `read_frame`.
    buffer: BytesMut,
}

impl std::fmt::Debug for FrameReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl FrameReader {
    pub fn new(stream: ReadStream) -> FrameReader {
        FrameReader {
            stream,
            // A 4KB read buffer comfortably holds a burst of maximum sized
            // PDUs. It grows on demand up to `MAX_READ_BUFFER`.
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read the next PDU from the underlying stream.
    ///
    /// The function waits until it has retrieved enough data to parse a
    /// frame. Decode failures are returned as `Inbound` values rather than
    /// errors so the caller can log them and keep the session alive.
    ///
    /// # Returns
    ///
    /// `None` when the peer closed the stream cleanly, between PDUs. An
    /// error when the stream failed or was closed half way through a PDU.
    pub async fn read_frame(&mut self) -> io::Result<Option<Inbound>> {
        loop {
            // Attempt to parse a frame from the buffered data. If enough data
            // has been buffered, the frame is returned.
            if let Some(inbound) = self.parse_frame() {
                return Ok(Some(inbound));
            }

            // There is not enough buffered data to read a frame. Attempt to
            // read more data from the socket.
            //
            // On success, the number of bytes is returned. `0` indicates "end
            // of stream".
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                // The remote closed the connection. For this to be a clean
                // shutdown, there should be no data in the read buffer. If
                // there is, this means that the peer closed the socket while
                // sending a frame.
                if self.buffer.is_empty() {
                    return Ok(None);
                } else {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "connection reset by peer",
                    ));
                }
            }
        }
    }

    /// Tries to parse a frame from the buffer. If the buffer contains enough
    /// data, the frame is returned and the data removed from the buffer. If
    /// not enough data has been buffered yet, `None` is returned.
    fn parse_frame(&mut self) -> Option<Inbound> {
        // Cursor is used to track the "current" location in the buffer.
        let mut buf = Cursor::new(&self.buffer[..]);

        // The first step is to check if enough data has been buffered to
        // parse a single frame. This only looks at `command_length`, so it is
        // much cheaper than a full decode.
        match Frame::check(&mut buf) {
            Ok(len) => {
                // Split the whole PDU off the front of the buffer. Whatever
                // happens while decoding it, these bytes are consumed and the
                // next PDU starts right after them.
                let raw = self.buffer.split_to(len).freeze();
                let mut cursor = Cursor::new(raw.as_ref());

                match Frame::parse(&mut cursor) {
                    Ok(frame) => Some(Inbound::Frame { frame, raw }),
                    Err(error) => {
                        let mut header = &raw[4..PduHeader::SIZE];
                        let command_id = header.get_u32();
                        header.advance(4);
                        let sequence_number = header.get_u32();
                        Some(Inbound::Malformed {
                            command_id,
                            sequence_number,
                            raw,
                            error,
                        })
                    }
                }
            }
            // Not enough data has been buffered to parse a full frame. Wait
            // for more, unless the peer is flooding us with a frame that
            // will never complete.
            Err(CodecError::Incomplete) => {
                if self.buffer.len() > MAX_READ_BUFFER {
                    let dropped = self.buffer.len();
                    self.buffer.clear();
                    Some(Inbound::Discarded {
                        error: CodecError::Incomplete,
                        dropped,
                    })
                } else {
                    None
                }
            }
            // The declared length is out of range. There is no way to find
            // the start of the next PDU, so everything buffered is dropped.
            Err(error) => {
                let dropped = self.buffer.len();
                self.buffer.clear();
                Some(Inbound::Discarded { error, dropped })
            }
        }
    }
}

/// Writes SMPP frames to the write half of a transport.
pub struct FrameWriter {
    // The write half is decorated with a `BufWriter`, which provides write
    // level buffering. The `BufWriter` implementation provided by Tokio is
    // sufficient for our needs.
    stream: BufWriter<WriteStream>,
}

impl std::fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter").finish_non_exhaustive()
    }
}

impl FrameWriter {
    pub fn new(stream: WriteStream) -> FrameWriter {
        FrameWriter {
            stream: BufWriter::new(stream),
        }
    }

    /// Write a single `Frame` value to the underlying stream and flush it.
    ///
    /// Returns the bytes written so the caller can log them.
    pub async fn write_frame(&mut self, frame: &Frame) -> io::Result<Bytes> {
        let bytes = frame
            .to_bytes()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        self.stream.write_all(&bytes).await?;

        // Ensure the encoded frame is written to the socket. The calls above
        // are to the buffered stream and writes. Calling `flush` writes the
        // remaining contents of the buffer to the socket.
        self.stream.flush().await?;

        Ok(bytes)
    }

    /// Flush and close the write half
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
