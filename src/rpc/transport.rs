//! Message-framed transport over a stream socket.
//!
//! Frames are length-prefixed the same way Python `multiprocessing.connection`
//! frames them: a 4-byte big-endian signed length, or `-1` followed by an
//! 8-byte big-endian length for payloads that do not fit into `i32`.

use crate::rpc::auth::{self, AuthError};
use log::trace;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Upper bound for a single incoming frame.
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024 * 1024;

const LONG_FRAME_MARKER: i32 = -1;

/// Upper bound for every read performed during the handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a readiness peek may wait on the socket.
const POLL_PEEK_TIMEOUT: Duration = Duration::from_millis(1);

/// Reading half of a framed connection.
pub struct FrameReader<R> {
    inner: R,
    recv_timeout: Option<Duration>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            recv_timeout: None,
        }
    }

    /// Read a single frame. A clean close of the peer is reported as
    /// [`ErrorKind::UnexpectedEof`].
    pub fn recv_bytes(&mut self) -> io::Result<Vec<u8>> {
        self.recv_bytes_max(DEFAULT_MAX_FRAME)
    }

    /// Read a single frame, rejecting frames longer than `max` bytes.
    pub fn recv_bytes_max(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let mut header = [0u8; 4];
        self.inner.read_exact(&mut header)?;
        let size = match i32::from_be_bytes(header) {
            LONG_FRAME_MARKER => {
                let mut long_header = [0u8; 8];
                self.inner.read_exact(&mut long_header)?;
                usize::try_from(u64::from_be_bytes(long_header))
                    .map_err(|_| io::Error::new(ErrorKind::InvalidData, "frame length overflow"))?
            }
            size if size < 0 => {
                return Err(io::Error::new(
                    ErrorKind::InvalidData,
                    format!("negative frame length {size}"),
                ))
            }
            size => size as usize,
        };

        if size > max {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("frame of {size} bytes exceeds limit of {max} bytes"),
            ));
        }

        let mut buf = vec![0u8; size];
        self.inner.read_exact(&mut buf)?;
        trace!(target: "transport", "<- {} bytes", buf.len());
        Ok(buf)
    }
}

impl FrameReader<TcpStream> {
    /// Check for available data without consuming it. A closed peer counts as
    /// readable, the following [`FrameReader::recv_bytes`] reports the EOF.
    ///
    /// The socket is shared with the writing half, so the peek uses a receive
    /// timeout instead of toggling non-blocking mode.
    pub fn poll(&self) -> io::Result<bool> {
        self.inner.set_read_timeout(Some(POLL_PEEK_TIMEOUT))?;
        let mut byte = [0u8; 1];
        let res = self.inner.peek(&mut byte);
        self.inner.set_read_timeout(self.recv_timeout)?;
        match res {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Bound blocking receives, `None` means wait forever.
    pub fn set_recv_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.inner.set_read_timeout(timeout)?;
        self.recv_timeout = timeout;
        Ok(())
    }
}

/// Writing half of a framed connection.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn send_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        match i32::try_from(buf.len()) {
            Ok(len) => self.inner.write_all(&len.to_be_bytes())?,
            Err(_) => {
                self.inner.write_all(&LONG_FRAME_MARKER.to_be_bytes())?;
                self.inner.write_all(&(buf.len() as u64).to_be_bytes())?;
            }
        }
        self.inner.write_all(buf)?;
        self.inner.flush()?;
        trace!(target: "transport", "-> {} bytes", buf.len());
        Ok(())
    }
}

impl FrameWriter<TcpStream> {
    /// Bound blocking sends, `None` means wait forever.
    pub fn set_send_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.inner.set_write_timeout(timeout)
    }

    /// Shut the socket down in both directions, this also wakes up the reading half.
    pub fn close(&self) {
        _ = self.inner.shutdown(Shutdown::Both);
    }
}

/// Failure to establish an authenticated connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },
    #[error("authentication: {0}")]
    Auth(#[from] AuthError),
    #[error(transparent)]
    IO(#[from] io::Error),
}

impl ConnectionError {
    /// True if the peer was not reachable at all (as opposed to rejecting us).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ConnectionError::Connect { .. })
    }
}

/// Authenticated, framed, bidirectional connection.
pub struct Connection {
    reader: FrameReader<TcpStream>,
    writer: FrameWriter<TcpStream>,
    peer: SocketAddr,
}

impl Connection {
    /// Connect to a listening agent and run the client side of the handshake:
    /// answer the agent challenge, then challenge the agent back.
    pub fn connect(addr: impl ToSocketAddrs, secret: &[u8]) -> Result<Self, ConnectionError> {
        let addrs: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();
        let display = addrs
            .first()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<unresolved>".to_string());

        let stream = TcpStream::connect(&addrs[..]).map_err(|source| ConnectionError::Connect {
            addr: display,
            source,
        })?;
        let mut conn = Connection::from_stream(stream)?;
        conn.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

        let res = auth::answer_challenge(&mut conn.reader, &mut conn.writer, secret)
            .and_then(|_| auth::deliver_challenge(&mut conn.reader, &mut conn.writer, secret));
        if let Err(e) = res {
            conn.close();
            return Err(e.into());
        }
        conn.set_read_timeout(None)?;
        Ok(conn)
    }

    /// Wrap an already connected stream, no handshake is performed.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let reader = FrameReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: FrameWriter::new(stream),
            peer,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn send_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.send_bytes(buf)
    }

    pub fn recv_bytes(&mut self) -> io::Result<Vec<u8>> {
        self.reader.recv_bytes()
    }

    pub fn poll(&self) -> io::Result<bool> {
        self.reader.poll()
    }

    /// Bound the blocking receive, `None` means wait forever.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.reader.set_recv_timeout(timeout)
    }

    pub fn close(&self) {
        self.writer.close()
    }

    /// Split into halves so that reading and writing may live in different threads.
    pub fn split(self) -> (FrameReader<TcpStream>, FrameWriter<TcpStream>) {
        (self.reader, self.writer)
    }
}

/// Agent side of the protocol: accepts connections and authenticates them
/// (challenge the peer first, then answer its challenge).
pub struct Listener {
    inner: TcpListener,
    secret: Vec<u8>,
}

impl Listener {
    pub fn bind(addr: impl ToSocketAddrs, secret: &[u8]) -> io::Result<Self> {
        Ok(Self {
            inner: TcpListener::bind(addr)?,
            secret: secret.to_vec(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn accept(&self) -> Result<Connection, ConnectionError> {
        let (stream, _) = self.inner.accept()?;
        let mut conn = Connection::from_stream(stream)?;
        conn.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

        let res = auth::deliver_challenge(&mut conn.reader, &mut conn.writer, &self.secret)
            .and_then(|_| auth::answer_challenge(&mut conn.reader, &mut conn.writer, &self.secret));
        if let Err(e) = res {
            conn.close();
            return Err(e.into());
        }
        conn.set_read_timeout(None)?;
        Ok(conn)
    }
}
