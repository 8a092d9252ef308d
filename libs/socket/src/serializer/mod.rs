//! Framed Serializer
//!
//! Writes one model as one frame: a 4-byte big-endian payload length
//! followed by the payload, sent with a single transport write. Over a
//! datagram family the frame is exactly one packet. Over a stream family
//! frames are recovered by accumulating reads in the scratch buffer;
//! anything read past the end of a frame is kept for the next one.

use crate::transports::Messenger;
use crate::{Result, TransportError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tracing::debug;

pub mod formats;

pub use formats::{Bincode, Json, Native, WireFormat};

/// Length prefix size in bytes
pub const FRAME_HEADER_LEN: usize = 4;

/// Encoder/decoder pair bound to one connection
#[derive(Debug)]
pub struct Serializer<F> {
    format: F,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
    max_message_size: usize,
}

impl<F> Serializer<F> {
    pub fn new(format: F, max_message_size: usize) -> Self {
        Self {
            format,
            read_buffer: BytesMut::with_capacity(FRAME_HEADER_LEN + max_message_size),
            write_buffer: BytesMut::with_capacity(FRAME_HEADER_LEN + max_message_size),
            max_message_size,
        }
    }

    /// Drop buffered bytes; used when the underlying socket is replaced
    pub fn clear(&mut self) {
        self.read_buffer.clear();
        self.write_buffer.clear();
    }

    /// Encode `model` and send it as one frame
    pub async fn encode<M>(&mut self, messenger: &mut Messenger, model: &M) -> Result<()>
    where
        F: WireFormat<M>,
    {
        self.write_buffer.clear();
        self.write_buffer.put_u32(0);
        self.format.marshal(model, &mut self.write_buffer)?;

        let len = self.write_buffer.len() - FRAME_HEADER_LEN;
        if len > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: len,
                max: self.max_message_size,
            });
        }
        self.write_buffer[..FRAME_HEADER_LEN].copy_from_slice(&(len as u32).to_be_bytes());

        let written = messenger
            .write(&self.write_buffer)
            .await
            .map_err(|e| TransportError::io("Failed to write message", e))?;
        if written != self.write_buffer.len() {
            return Err(TransportError::io(
                "Failed to write message",
                io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("sent {} of {} bytes", written, self.write_buffer.len()),
                ),
            ));
        }

        debug!(bytes = len, family = messenger.family().as_str(), "Sent frame");
        Ok(())
    }

    /// Receive one frame and decode it into `model`
    pub async fn decode<M>(&mut self, messenger: &mut Messenger, model: &mut M) -> Result<()>
    where
        F: WireFormat<M>,
    {
        let payload = if messenger.is_datagram() {
            self.read_packet(messenger).await?
        } else {
            self.read_stream(messenger).await?
        };

        debug!(bytes = payload.len(), family = messenger.family().as_str(), "Received frame");
        self.format.unmarshal(&payload, model)
    }

    async fn read_packet(&mut self, messenger: &mut Messenger) -> Result<Bytes> {
        let limit = FRAME_HEADER_LEN + self.max_message_size;

        // one spare byte tells a full-size packet apart from a truncated one
        self.read_buffer.clear();
        self.read_buffer.resize(limit + 1, 0);

        let n = messenger
            .read(&mut self.read_buffer)
            .await
            .map_err(|e| TransportError::io("Failed to read message", e))?;
        self.read_buffer.truncate(n);

        if n > limit {
            return Err(TransportError::MessageTooLarge {
                size: n - FRAME_HEADER_LEN,
                max: self.max_message_size,
            });
        }
        if n < FRAME_HEADER_LEN {
            return Err(TransportError::protocol(format!(
                "Datagram of {} bytes is shorter than the frame header",
                n
            )));
        }

        let declared = self.frame_len()?;
        if declared != n - FRAME_HEADER_LEN {
            return Err(TransportError::protocol(format!(
                "Frame length mismatch: header says {}, packet carries {}",
                declared,
                n - FRAME_HEADER_LEN
            )));
        }

        self.read_buffer.advance(FRAME_HEADER_LEN);
        Ok(self.read_buffer.split_to(declared).freeze())
    }

    async fn read_stream(&mut self, messenger: &mut Messenger) -> Result<Bytes> {
        let limit = FRAME_HEADER_LEN + self.max_message_size;

        loop {
            if self.read_buffer.len() >= FRAME_HEADER_LEN {
                let len = self.frame_len()?;
                if self.read_buffer.len() >= FRAME_HEADER_LEN + len {
                    self.read_buffer.advance(FRAME_HEADER_LEN);
                    return Ok(self.read_buffer.split_to(len).freeze());
                }
            }

            let start = self.read_buffer.len();
            self.read_buffer.resize(limit, 0);
            let read = messenger.read(&mut self.read_buffer[start..]).await;
            let n = match read {
                Ok(n) => n,
                Err(e) => {
                    self.read_buffer.truncate(start);
                    return Err(TransportError::io("Failed to read message", e));
                }
            };
            self.read_buffer.truncate(start + n);

            if n == 0 {
                if start == 0 {
                    return Err(TransportError::EndOfStream);
                }
                self.read_buffer.clear();
                return Err(TransportError::io(
                    "Failed to read message",
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("stream closed after {} bytes of a frame", start),
                    ),
                ));
            }
        }
    }

    /// Declared payload length of the frame at the front of the read buffer
    fn frame_len(&mut self) -> Result<usize> {
        let header = &self.read_buffer[..FRAME_HEADER_LEN];
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        if len > self.max_message_size {
            self.read_buffer.clear();
            return Err(TransportError::MessageTooLarge {
                size: len,
                max: self.max_message_size,
            });
        }
        Ok(len)
    }
}
