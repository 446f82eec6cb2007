//! Length-prefixed framing over any byte stream.
//!
//! Writes accumulate until flush, then go out as one frame:
//!
//! ```text
//! [Length u32 BE] [Payload(N)]
//! ```
//!
//! Reads hand out the payload of one frame at a time. A clean EOF between
//! frames is reported as EOF; EOF inside a frame is `UnexpectedEof`.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::constants::{ERR_FRAME_TOO_LARGE, ERR_FRAME_TRUNCATED};

const HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy)]
enum ReadState {
    Header { filled: usize },
    Payload { filled: usize },
    Draining { pos: usize },
}

/// Framing decorator over an inner transport
pub struct FramedTransport<T> {
    inner: T,
    max_frame_size: usize,
    pending: BytesMut,
    outgoing: BytesMut,
    header: [u8; HEADER_LEN],
    frame: Vec<u8>,
    state: ReadState,
}

impl<T> FramedTransport<T> {
    pub fn new(inner: T, max_frame_size: usize) -> Self {
        Self {
            inner,
            max_frame_size,
            pending: BytesMut::new(),
            outgoing: BytesMut::new(),
            header: [0; HEADER_LEN],
            frame: Vec::new(),
            state: ReadState::Header { filled: 0 },
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for FramedTransport<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            match this.state {
                ReadState::Draining { pos } if pos < this.frame.len() => {
                    let n = buf.remaining().min(this.frame.len() - pos);
                    buf.put_slice(&this.frame[pos..pos + n]);
                    this.state = ReadState::Draining { pos: pos + n };
                    return Poll::Ready(Ok(()));
                }
                ReadState::Draining { .. } => {
                    this.state = ReadState::Header { filled: 0 };
                }
                ReadState::Header { filled } => {
                    let mut header = ReadBuf::new(&mut this.header[filled..]);
                    ready!(Pin::new(&mut this.inner).poll_read(cx, &mut header))?;
                    let n = header.filled().len();
                    if n == 0 {
                        if filled == 0 {
                            return Poll::Ready(Ok(()));
                        }
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            ERR_FRAME_TRUNCATED,
                        )));
                    }

                    let filled = filled + n;
                    if filled < HEADER_LEN {
                        this.state = ReadState::Header { filled };
                        continue;
                    }

                    let len = u32::from_be_bytes(this.header) as usize;
                    if len > this.max_frame_size {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("{ERR_FRAME_TOO_LARGE}: {len} bytes"),
                        )));
                    }
                    this.frame.clear();
                    this.frame.resize(len, 0);
                    this.state = ReadState::Payload { filled: 0 };
                }
                ReadState::Payload { filled } if filled == this.frame.len() => {
                    this.state = ReadState::Draining { pos: 0 };
                }
                ReadState::Payload { filled } => {
                    let mut payload = ReadBuf::new(&mut this.frame[filled..]);
                    ready!(Pin::new(&mut this.inner).poll_read(cx, &mut payload))?;
                    let n = payload.filled().len();
                    if n == 0 {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            ERR_FRAME_TRUNCATED,
                        )));
                    }
                    this.state = ReadState::Payload { filled: filled + n };
                }
            }
        }
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for FramedTransport<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.pending.len() + buf.len() > this.max_frame_size {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{ERR_FRAME_TOO_LARGE}: {} bytes",
                    this.pending.len() + buf.len()
                ),
            )));
        }
        this.pending.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        // writes made while a frame was half sent become the next frame
        loop {
            if this.outgoing.is_empty() {
                if this.pending.is_empty() {
                    break;
                }
                this.outgoing.reserve(HEADER_LEN + this.pending.len());
                this.outgoing.put_u32(this.pending.len() as u32);
                this.outgoing.extend_from_slice(&this.pending);
                this.pending.clear();
            }

            while !this.outgoing.is_empty() {
                let n = ready!(Pin::new(&mut this.inner).poll_write(cx, &this.outgoing))?;
                if n == 0 {
                    return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                }
                this.outgoing.advance(n);
            }
        }

        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.as_mut().poll_flush(cx))?;
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
