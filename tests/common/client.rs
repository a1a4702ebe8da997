//! Test chat client.
//!
//! A line-oriented client for integration testing that can mint its own
//! identity assertions, send events, and assert on received events.

use slchat_proto::assertion::{sign, IdentityClaims};
use slchat_proto::{ClientEvent, ServerEvent};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// A test chat client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    username: String,
}

impl TestClient {
    /// Connect to a test daemon without authenticating.
    pub async fn connect(address: &str, username: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address).await?;

        let (read_half, write_half) = stream.into_split();
        let reader = BufReader::new(read_half);
        let writer = BufWriter::new(write_half);

        Ok(Self {
            reader,
            writer,
            username: username.to_string(),
        })
    }

    /// Send a raw line.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Send a client event.
    pub async fn send(&mut self, event: ClientEvent) -> anyhow::Result<()> {
        self.send_raw(&serde_json::to_string(&event)?).await
    }

    /// Present an identity assertion minted with the shared test secret.
    pub async fn authenticate(&mut self) -> anyhow::Result<()> {
        let token = self.mint_token(super::TEST_SECRET);
        self.send(ClientEvent::Auth { token }).await
    }

    /// Mint an assertion for this client's username with an arbitrary secret.
    pub fn mint_token(&self, secret: &str) -> String {
        let claims = IdentityClaims {
            sub: self.username.clone(),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        sign(&claims, secret.as_bytes())
    }

    /// Receive a single event from the daemon.
    pub async fn recv(&mut self) -> anyhow::Result<ServerEvent> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive an event with a timeout.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<ServerEvent> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("Connection closed");
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }

    /// Receive events until the predicate returns true, returning everything
    /// read along the way.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<ServerEvent>>
    where
        F: FnMut(&ServerEvent) -> bool,
    {
        let mut events = Vec::new();
        loop {
            let event = self.recv().await?;
            let done = predicate(&event);
            events.push(event);
            if done {
                break;
            }
        }
        Ok(events)
    }

    /// Receive events until one with the given wire name arrives; returns it.
    pub async fn expect(&mut self, name: &str) -> anyhow::Result<ServerEvent> {
        let mut events = self.recv_until(|e| e.name() == name).await?;
        Ok(events.pop().expect("recv_until returns at least one event"))
    }

    /// Drain any events already queued, with a short timeout.
    pub async fn drain(&mut self) {
        while self
            .recv_timeout(Duration::from_millis(50))
            .await
            .is_ok()
        {}
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}
