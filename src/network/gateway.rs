//! Gateway - listeners that accept incoming connections.
//!
//! The Gateway binds to sockets and spawns a Connection task for each
//! incoming client. Supports plaintext TCP, TLS, and WebSocket transports.

use crate::config::{TlsConfig, WebSocketConfig};
use crate::handlers::Registry;
use crate::network::Connection;
use crate::state::SharedHub;
use rustls_pemfile::{certs, pkcs8_private_keys};
use std::io::{BufReader, Cursor};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::accept_hdr_async;
use tracing::{error, info, warn};

/// The Gateway accepts incoming connections and spawns handlers.
pub struct Gateway {
    plaintext_listener: TcpListener,
    tls_listener: Option<(TcpListener, TlsAcceptor)>,
    websocket_listener: Option<(TcpListener, WebSocketConfig)>,
    hub: SharedHub,
    registry: Arc<Registry>,
}

impl Gateway {
    /// Bind the gateway to the configured addresses.
    pub async fn bind(
        addr: SocketAddr,
        tls_config: Option<TlsConfig>,
        websocket_config: Option<WebSocketConfig>,
        hub: SharedHub,
    ) -> anyhow::Result<Self> {
        let plaintext_listener = TcpListener::bind(addr).await?;
        let registry = Arc::new(Registry::new());
        info!(%addr, "Plaintext listener bound");

        let tls_listener = if let Some(tls_cfg) = tls_config {
            let tls_acceptor = Self::load_tls(&tls_cfg)?;
            let listener = TcpListener::bind(tls_cfg.address).await?;
            info!(address = %tls_cfg.address, "TLS listener bound");
            Some((listener, tls_acceptor))
        } else {
            None
        };

        let websocket_listener = if let Some(ws_cfg) = websocket_config {
            let listener = TcpListener::bind(ws_cfg.address).await?;
            info!(address = %ws_cfg.address, "WebSocket listener bound");
            Some((listener, ws_cfg))
        } else {
            None
        };

        Ok(Self {
            plaintext_listener,
            tls_listener,
            websocket_listener,
            hub,
            registry,
        })
    }

    /// Load TLS certificates and create a TlsAcceptor.
    fn load_tls(config: &TlsConfig) -> anyhow::Result<TlsAcceptor> {
        let cert_file = std::fs::read(&config.cert_path)?;
        let cert_reader = &mut BufReader::new(Cursor::new(cert_file));
        let certs: Vec<CertificateDer> = certs(cert_reader).collect::<Result<Vec<_>, _>>()?;

        if certs.is_empty() {
            anyhow::bail!("No certificates found in {}", config.cert_path);
        }

        let key_file = std::fs::read(&config.key_path)?;
        let key_reader = &mut BufReader::new(Cursor::new(key_file));
        let mut keys: Vec<PrivateKeyDer> = pkcs8_private_keys(key_reader)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(PrivateKeyDer::from)
            .collect();

        if keys.is_empty() {
            anyhow::bail!("No private keys found in {}", config.key_path);
        }

        let key = keys.remove(0);

        let tls_config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;

        Ok(TlsAcceptor::from(Arc::new(tls_config)))
    }

    /// Run the gateway, accepting connections forever.
    pub async fn run(self) -> anyhow::Result<()> {
        let hub = Arc::clone(&self.hub);
        let registry = Arc::clone(&self.registry);

        if let Some((tls_listener, tls_acceptor)) = self.tls_listener {
            let hub_tls = Arc::clone(&hub);
            let registry_tls = Arc::clone(&registry);

            tokio::spawn(async move {
                loop {
                    match tls_listener.accept().await {
                        Ok((stream, addr)) => {
                            let hub = Arc::clone(&hub_tls);
                            let registry = Arc::clone(&registry_tls);
                            let cid = hub.cid_gen.next();
                            let acceptor = tls_acceptor.clone();

                            tokio::spawn(async move {
                                match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        info!(%cid, %addr, "TLS connection accepted");
                                        let connection = Connection::new_tls(
                                            cid.clone(),
                                            tls_stream,
                                            addr,
                                            hub,
                                            registry,
                                        );
                                        if let Err(e) = connection.run().await {
                                            error!(%cid, %addr, error = %e, "TLS connection error");
                                        }
                                        info!(%cid, %addr, "TLS connection closed");
                                    }
                                    Err(e) => {
                                        warn!(%addr, error = %e, "TLS handshake failed");
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept TLS connection");
                        }
                    }
                }
            });
        }

        if let Some((ws_listener, ws_config)) = self.websocket_listener {
            let hub_ws = Arc::clone(&hub);
            let registry_ws = Arc::clone(&registry);
            let allow_origins = ws_config.allow_origins.clone();

            tokio::spawn(async move {
                loop {
                    match ws_listener.accept().await {
                        Ok((stream, addr)) => {
                            let hub = Arc::clone(&hub_ws);
                            let registry = Arc::clone(&registry_ws);
                            let cid = hub.cid_gen.next();
                            let allowed = allow_origins.clone();

                            tokio::spawn(async move {
                                // Origin validation callback for the WebSocket handshake.
                                let cors_callback = |req: &http::Request<()>,
                                                     response: http::Response<()>| {
                                    if allowed.is_empty() {
                                        return Ok(response);
                                    }

                                    if let Some(origin) = req
                                        .headers()
                                        .get("Origin")
                                        .and_then(|o| o.to_str().ok())
                                    {
                                        if allowed.iter().any(|a| a == origin || a == "*") {
                                            return Ok(response);
                                        }
                                        warn!(%addr, origin = %origin, "WebSocket origin rejected");
                                    }

                                    Err(http::Response::builder()
                                        .status(http::StatusCode::FORBIDDEN)
                                        .body(Some("Origin not allowed".to_string()))
                                        .unwrap())
                                };

                                match accept_hdr_async(stream, cors_callback).await {
                                    Ok(ws_stream) => {
                                        info!(%cid, %addr, "WebSocket connection accepted");
                                        let connection = Connection::new_websocket(
                                            cid.clone(),
                                            ws_stream,
                                            addr,
                                            hub,
                                            registry,
                                        );
                                        if let Err(e) = connection.run().await {
                                            error!(%cid, %addr, error = %e, "WebSocket connection error");
                                        }
                                        info!(%cid, %addr, "WebSocket connection closed");
                                    }
                                    Err(e) => {
                                        warn!(%addr, error = %e, "WebSocket handshake failed");
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept WebSocket connection");
                        }
                    }
                }
            });
        }

        // Main plaintext listener loop
        loop {
            match self.plaintext_listener.accept().await {
                Ok((stream, addr)) => {
                    let hub = Arc::clone(&hub);
                    let registry = Arc::clone(&registry);
                    let cid = hub.cid_gen.next();

                    info!(%cid, %addr, "Connection accepted");

                    tokio::spawn(async move {
                        let connection =
                            Connection::new_plaintext(cid.clone(), stream, addr, hub, registry);
                        if let Err(e) = connection.run().await {
                            error!(%cid, %addr, error = %e, "Connection error");
                        }
                        info!(%cid, %addr, "Connection closed");
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}
