//! TCP connector
//!
//! Owns one socket and one reusable receive buffer on behalf of a single
//! consumer handle. Connecting is lazy and retried forever (with
//! `reconnect_delay` between attempts) until either the socket opens or
//! the sink-wide close signal fires.
//!
//! Every blocking point — the connect attempt, the reconnect sleep, and
//! each socket read — races that signal, and the connector drops its
//! socket the moment it fires. That is how `Sink::close` reaches a
//! consumer parked in a read on a connection that has simply gone silent:
//! the read is interrupted and surfaces as an idle return, not a hang.
//!
//! ## Buffer discipline
//!
//! The receive buffer is a `BytesMut`: reads append at the tail, the
//! consumer advances from the head. `fill` tops the buffer up only when
//! the requested threshold is not already buffered, so a trailing partial
//! header or payload survives across frame boundaries without copying out
//! (compaction happens inside `reserve` when capacity runs out). Payloads
//! are handed to the journal appender directly from this buffer via
//! `drain_payload`.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tracing::{debug, info};

use crate::config::SinkConfig;
use crate::shutdown::CloseSignal;

pub(crate) struct SinkConnector {
    addr: SocketAddr,
    config: Arc<SinkConfig>,
    closed: CloseSignal,
    stream: Option<TcpStream>,
    buf: BytesMut,
}

impl SinkConnector {
    pub fn new(addr: SocketAddr, config: Arc<SinkConfig>, closed: CloseSignal) -> Self {
        let capacity = config.min_buffer_size;
        Self {
            addr,
            config,
            closed,
            stream: None,
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn sink_closed(&self) -> bool {
        self.closed.is_closed()
    }

    pub fn is_open(&self) -> bool {
        !self.sink_closed() && self.stream.is_some()
    }

    /// Block until either the sink is closed (`false`) or a connection is
    /// established (`true`). The buffer is emptied before returning.
    pub async fn open(&mut self) -> bool {
        while !self.sink_closed() {
            let mut shutdown = self.closed.clone();
            let connected = tokio::select! {
                connected = self.connect() => Some(connected),
                _ = shutdown.wait() => None,
            };
            match connected {
                Some(Ok(stream)) => {
                    self.buf.clear();
                    self.stream = Some(stream);
                    info!(addr = %self.addr, "connected to source");
                    return true;
                }
                Some(Err(e)) => {
                    debug!(addr = %self.addr, error = %e, "failed to connect to source, retrying");
                }
                None => return false,
            }

            let mut shutdown = self.closed.clone();
            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                _ = shutdown.wait() => return false,
            }
        }
        false
    }

    async fn connect(&self) -> io::Result<TcpStream> {
        let socket = match self.addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_recv_buffer_size(self.config.min_buffer_size as u32)?;
        socket.connect(self.addr).await
    }

    /// Write all of `bytes`; `false` on any error (the caller reconnects
    /// on its next call).
    pub async fn write_all(&mut self, bytes: &[u8]) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        match stream.write_all(bytes).await {
            Ok(()) => true,
            Err(e) => {
                debug!(addr = %self.addr, error = %e, "write to source failed");
                false
            }
        }
    }

    /// Unconsumed bytes.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Advance the read cursor past `n` consumed bytes.
    pub fn consume(&mut self, n: usize) {
        self.buf.advance(n);
    }

    /// Ensure at least `min` bytes are buffered. Returns immediately if
    /// `threshold` bytes already are. EOF and the sink closing both drop
    /// the socket and yield `Ok(false)` — a read already in flight is
    /// interrupted by the close signal.
    pub async fn fill(&mut self, threshold: usize, min: usize) -> io::Result<bool> {
        if self.sink_closed() {
            self.close();
            return Ok(false);
        }
        if self.buf.len() < threshold {
            self.buf.reserve(self.config.min_buffer_size.max(min));
            while self.buf.len() < min {
                let Some(stream) = self.stream.as_mut() else {
                    return Ok(false);
                };
                let mut shutdown = self.closed.clone();
                let read = tokio::select! {
                    read = stream.read_buf(&mut self.buf) => Some(read),
                    _ = shutdown.wait() => None,
                };
                match read {
                    Some(Ok(0)) | None => {
                        self.close();
                        return Ok(false);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e),
                }
            }
        }
        Ok(!self.sink_closed())
    }

    /// Pull whatever the socket has; EOF is an error here because the
    /// caller is mid-payload, and so is the sink closing underneath it.
    pub async fn read_more(&mut self) -> io::Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };
        self.buf.reserve(self.config.min_buffer_size);
        let mut shutdown = self.closed.clone();
        let read = tokio::select! {
            read = stream.read_buf(&mut self.buf) => Some(read),
            _ = shutdown.wait() => None,
        };
        match read {
            None => {
                self.close();
                Err(io::Error::from(io::ErrorKind::ConnectionAborted))
            }
            Some(Ok(0)) => {
                self.close();
                Err(io::Error::from(io::ErrorKind::UnexpectedEof))
            }
            Some(Ok(_)) => Ok(()),
            Some(Err(e)) => Err(e),
        }
    }

    /// Stream a `size`-byte payload out of the buffer into `out`,
    /// refilling from the socket as needed.
    pub async fn drain_payload(
        &mut self,
        size: usize,
        mut out: impl FnMut(&[u8]),
    ) -> io::Result<()> {
        let mut remaining = size;
        while remaining > 0 {
            if self.buf.is_empty() {
                self.read_more().await?;
            }
            let take = remaining.min(self.buf.len());
            out(&self.buf[..take]);
            self.buf.advance(take);
            remaining -= take;
        }
        Ok(())
    }

    /// Idempotent.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(addr = %self.addr, "connection closed");
        }
    }
}
