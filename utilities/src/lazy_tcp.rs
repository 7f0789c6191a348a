use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, warn};

/// TCP stream that connects on demand.
///
/// Unlike a plain socket it never reconnects behind the caller's back: a reset
/// drops the connection and surfaces the error, and the next
/// [`ensure_connected`](LazyTcpStream::ensure_connected) reports that a fresh
/// session was opened so the owner can redo its handshake.
pub struct LazyTcpStream {
    addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
    max_retries: u32,
    read_timeout: Duration,
    write_timeout: Duration,
    connect_timeout: Duration,
}

fn is_connection_lost(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}

impl LazyTcpStream {
    pub fn new<A: ToSocketAddrs>(
        addr: A,
        max_retries: u32,
        read_timeout: Duration,
        write_timeout: Duration,
        connect_timeout: Duration,
    ) -> Self {
        LazyTcpStream {
            addr: addr.to_socket_addrs().ok().and_then(|mut addrs| addrs.next()),
            stream: None,
            max_retries,
            read_timeout,
            write_timeout,
            connect_timeout,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn connect(&mut self) -> io::Result<()> {
        let addr = self
            .addr
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "Unresolvable address"))?;

        for attempt in 0..=self.max_retries {
            debug!("Connecting to {} (attempt {})", addr, attempt + 1);

            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.read_timeout))?;
                    stream.set_write_timeout(Some(self.write_timeout))?;
                    stream.set_nodelay(true)?;

                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) if attempt == self.max_retries => {
                    warn!("Failed to connect to {}: {}", addr, e);
                    return Err(e);
                }
                Err(e) => debug!("Connection attempt to {} failed: {}", addr, e),
            }
        }

        Err(io::Error::new(
            ErrorKind::Other,
            "Max connection retries reached",
        ))
    }

    /// Connects if needed. Returns `true` when a new connection was opened.
    pub fn ensure_connected(&mut self) -> io::Result<bool> {
        if self.stream.is_some() {
            return Ok(false);
        }

        self.connect()?;
        Ok(true)
    }

    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn stream_mut(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "Not connected"))
    }

    fn drop_on_loss<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if let Err(e) = &result {
            if is_connection_lost(e) {
                warn!("Connection lost: {}", e);
                self.disconnect();
            }
        }
        result
    }
}

impl Read for LazyTcpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = match self.stream_mut()?.read(buf) {
            Ok(0) if !buf.is_empty() => Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "Connection closed by peer",
            )),
            other => other,
        };
        self.drop_on_loss(result)
    }
}

impl Write for LazyTcpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.stream_mut()?.write(buf);
        self.drop_on_loss(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.stream_mut()?.flush();
        self.drop_on_loss(result)
    }
}
