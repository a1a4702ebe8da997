//! Test server management.
//!
//! Spawns and manages slchatd instances for integration testing.

use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// A test daemon instance.
pub struct TestServer {
    child: Child,
    port: u16,
    // Held so the config directory outlives the daemon.
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a new test daemon listening on the given port.
    pub async fn spawn(port: u16) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;

        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[server]
name = "chat.test"
node_id = "T01"
http_port = 0

[listen]
address = "127.0.0.1:{port}"

[auth]
secret = "{secret}"
handshake_timeout_secs = 2

[chat]
rooms = ["general", "random", "tech"]
default_room = "general"
retention = 100
"#,
            port = port,
            secret = super::TEST_SECRET,
        );

        std::fs::write(&config_path, config_content)?;

        // Cargo builds the binary for integration tests and exposes its path.
        let child = Command::new(env!("CARGO_BIN_EXE_slchatd"))
            .arg(&config_path)
            .spawn()?;

        let server = Self {
            child,
            port,
            _data_dir: data_dir,
        };

        server.wait_until_ready().await?;

        Ok(server)
    }

    /// Wait until the daemon is accepting connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..30 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 3 seconds")
    }

    /// Get the server address.
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Create a new authenticated test client connected to this daemon.
    pub async fn connect(&self, username: &str) -> anyhow::Result<super::client::TestClient> {
        let mut client = super::client::TestClient::connect(&self.address(), username).await?;
        client.authenticate().await?;
        Ok(client)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
