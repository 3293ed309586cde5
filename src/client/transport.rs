//! TCP transport for the workbench scripting engine.
//!
//! The engine closes its side after every reply, so the transport never
//! keeps a connection around:
//!
//! - each call opens a fresh [`TcpStream`]
//! - the command is written, then [`END_MARKER`]
//! - one read of at most [`REPLY_BUFFER_SIZE`] bytes collects the reply
//! - the stream is dropped, which closes it
//!
//! Calls are awaited one after the other; nothing here is shared between
//! tasks.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::trace;

use crate::client::error::{BridgeError, BridgeResult};
use crate::client::protocol::{END_MARKER, REPLY_BUFFER_SIZE};

/// Default bound on establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Open-use-close TCP transport to one `host:port`.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    /// Host the engine listens on.
    host: String,
    /// Port the engine listens on.
    port: u16,
    /// Bound on establishing a connection.
    connect_timeout: Duration,
    /// Bound on waiting for the reply. `None` blocks until the engine answers.
    reply_timeout: Option<Duration>,
}

impl TcpTransport {
    /// Creates a transport with the default connect timeout and no reply
    /// timeout.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reply_timeout: None,
        }
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Sets the reply timeout.
    #[must_use]
    pub const fn with_reply_timeout(mut self, reply_timeout: Option<Duration>) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    /// Host the transport dials.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port the transport dials.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, used in logs and errors.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Sends one command and returns the decoded reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened, a write or read
    /// fails, or the reply timeout expires.
    pub async fn exchange(&self, command: &str) -> BridgeResult<String> {
        self.exchange_parts(std::iter::once(command)).await
    }

    /// Sends several chunks on one connection, then the end marker, and
    /// returns the decoded reply.
    ///
    /// Script files go through here one line per chunk.
    ///
    /// # Errors
    ///
    /// Same as [`TcpTransport::exchange`].
    pub async fn exchange_parts<I, S>(&self, parts: I) -> BridgeResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stream = self.connect().await?;
        self.write_command(&mut stream, parts).await?;
        self.read_reply(&mut stream).await
    }

    /// Sends a command without waiting for any reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened or the write fails.
    pub async fn send_only(&self, command: &str) -> BridgeResult<()> {
        let mut stream = self.connect().await?;
        self.write_command(&mut stream, std::iter::once(command))
            .await
    }

    async fn connect(&self) -> BridgeResult<TcpStream> {
        let connecting = TcpStream::connect((self.host.as_str(), self.port));
        match timeout(self.connect_timeout, connecting).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(BridgeError::connect(self.address(), e)),
            Err(_) => Err(BridgeError::connect(
                self.address(),
                io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            )),
        }
    }

    async fn write_command<I, S>(&self, stream: &mut TcpStream, parts: I) -> BridgeResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for part in parts {
            stream
                .write_all(part.as_ref().as_bytes())
                .await
                .map_err(|e| BridgeError::io(self.address(), e))?;
        }
        stream
            .write_all(END_MARKER.as_bytes())
            .await
            .map_err(|e| BridgeError::io(self.address(), e))?;
        stream
            .flush()
            .await
            .map_err(|e| BridgeError::io(self.address(), e))
    }

    async fn read_reply(&self, stream: &mut TcpStream) -> BridgeResult<String> {
        let mut buf = vec![0u8; REPLY_BUFFER_SIZE];
        let started = Instant::now();

        let read = match self.reply_timeout {
            Some(limit) => timeout(limit, stream.read(&mut buf))
                .await
                .map_err(|_| BridgeError::timeout(self.address(), started.elapsed().as_millis()))?,
            None => stream.read(&mut buf).await,
        };
        let n = read.map_err(|e| BridgeError::io(self.address(), e))?;

        let reply = String::from_utf8_lossy(&buf[..n]).into_owned();
        trace!(address = %self.address(), bytes = n, "Reply received");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accepts one connection, collects everything up to the end marker,
    /// answers with `reply`, and hands back what it received.
    async fn one_shot_server(reply: &'static str) -> (u16, JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut chunk = [0u8; 512];
            while !received.ends_with(END_MARKER.as_bytes()) {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&chunk[..n]);
            }
            socket.write_all(reply.as_bytes()).await.unwrap();
            received
        });
        (port, handle)
    }

    #[tokio::test]
    async fn command_arrives_byte_for_byte() {
        let (port, server) = one_shot_server("<OK>").await;
        let transport = TcpTransport::new("127.0.0.1", port);

        let reply = transport.exchange("system1 = GetSystem(Name=\"SYS\")").await.unwrap();

        assert_eq!(reply, "<OK>");
        assert_eq!(
            server.await.unwrap(),
            b"system1 = GetSystem(Name=\"SYS\")<EOF>".to_vec()
        );
    }

    #[tokio::test]
    async fn parts_share_one_connection() {
        let (port, server) = one_shot_server("<OK>").await;
        let transport = TcpTransport::new("127.0.0.1", port);

        transport
            .exchange_parts(["a = 1\n", "b = 2\n"])
            .await
            .unwrap();

        assert_eq!(server.await.unwrap(), b"a = 1\nb = 2\n<EOF>".to_vec());
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = TcpTransport::new("127.0.0.1", port)
            .exchange("Reset()")
            .await
            .unwrap_err();
        assert!(err.is_connect());
    }

    #[tokio::test]
    async fn silent_server_hits_reply_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let err = TcpTransport::new("127.0.0.1", port)
            .with_reply_timeout(Some(Duration::from_millis(100)))
            .exchange("Reset()")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { .. }));
    }

    #[test]
    fn address_format() {
        assert_eq!(TcpTransport::new("localhost", 8001).address(), "localhost:8001");
    }
}
