//! Stub scripting server shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use wb_bridge::client::protocol::END_MARKER;

/// Accepts connections forever. Each connection gets the next scripted
/// reply, or the fallback once the script runs out, and every command is
/// recorded without its end marker.
pub struct StubServer {
    pub port: u16,
    received: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub async fn start(scripted: &[&str], fallback: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));

        let mut replies: VecDeque<String> = scripted.iter().map(|s| (*s).to_string()).collect();
        let fallback = fallback.to_string();
        let log = Arc::clone(&received);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };

                let mut data = Vec::new();
                let mut chunk = [0u8; 1024];
                while !data.ends_with(END_MARKER.as_bytes()) {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => data.extend_from_slice(&chunk[..n]),
                    }
                }

                let text = String::from_utf8_lossy(&data).into_owned();
                let command = text.strip_suffix(END_MARKER).unwrap_or(&text).to_string();
                log.lock().unwrap().push(command);

                let reply = replies.pop_front().unwrap_or_else(|| fallback.clone());
                let _ = socket.write_all(reply.as_bytes()).await;
            }
        });

        Self { port, received }
    }

    /// Server answering `<OK>` to everything.
    pub async fn accepting() -> Self {
        Self::start(&[], "<OK>").await
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// A server that accepts connections and never answers. Sockets stay open
/// for as long as the runtime runs.
pub async fn silent_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    port
}
