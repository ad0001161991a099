//! WebTransport server
//!
//! Each connection gets a fresh [`ConnectionId`] and a `Connected` greeting
//! on its first bidirectional stream. Client messages arrive as u32 LE
//! length-prefixed bincode frames on that stream; movement and fight input
//! may also arrive as datagrams.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::metrics::Metrics;
use crate::net::arena_session::start_arena_loop;
use crate::net::connections::{encode_frame, outbox, run_writer};
use crate::net::dos_protection::{DoSConfig, DoSProtection};
use crate::net::fight_session::start_fight_loop;
use crate::net::handler::{handle_client_message, handle_disconnect, ServerContext};
use crate::net::protocol::{decode, ClientMessage, ConnectionId, ServerMessage};
use crate::net::tls::TlsConfig;

/// Largest accepted stream frame
pub const MAX_MESSAGE_SIZE: usize = 65536;

/// Datagrams are rate-checked once per this many, to keep the lock cold
const DATAGRAM_CHECK_EVERY: u64 = 10;

/// Messages clients may send unreliably; everything else must use the stream
pub fn datagram_allowed(msg: &ClientMessage) -> bool {
    matches!(msg, ClientMessage::Move { .. } | ClientMessage::FightInput(_))
}

/// WebTransport server
pub struct WebTransportServer {
    config: ServerConfig,
    tls_config: TlsConfig,
    dos_protection: Arc<RwLock<DoSProtection>>,
    ctx: ServerContext,
}

impl WebTransportServer {
    pub async fn new(config: ServerConfig, metrics: Arc<Metrics>) -> anyhow::Result<Self> {
        let tls_config = TlsConfig::load(&config).await?;
        let dos_protection = Arc::new(RwLock::new(DoSProtection::new(DoSConfig::with_max_connections(
            config.max_connections,
        ))));
        let ctx = ServerContext::new(&config, metrics);

        Ok(Self {
            config,
            tls_config,
            dos_protection,
            ctx,
        })
    }

    /// Certificate hash for client configuration
    pub fn cert_hash(&self) -> &str {
        self.tls_config.cert_hash()
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.config.port)
    }

    pub fn context(&self) -> &ServerContext {
        &self.ctx
    }

    /// Start both tick loops and accept connections until the endpoint fails
    pub async fn run(self) -> anyhow::Result<()> {
        use wtransport::Endpoint;

        let bind_addr = self.bind_addr();
        let builder = wtransport::ServerConfig::builder();
        // Unspecified address: bind dual-stack so both IPv4 and IPv6 clients get in
        let builder = if self.config.bind_address.is_unspecified() {
            builder.with_bind_default(self.config.port)
        } else {
            builder.with_bind_address(bind_addr)
        };
        let server_config = builder.with_identity(self.tls_config.identity).build();

        let server = Endpoint::server(server_config).context("Failed to bind WebTransport endpoint")?;

        tracing::info!("WebTransport server listening on {}", bind_addr);

        let ctx = self.ctx;
        start_arena_loop(
            ctx.arena.clone(),
            ctx.connections.clone(),
            ctx.clock,
            ctx.metrics.clone(),
            self.config.arena_tick_rate,
        );
        start_fight_loop(
            ctx.fight.clone(),
            ctx.connections.clone(),
            ctx.clock,
            ctx.metrics.clone(),
            self.config.fight_tick_rate,
        );

        let mut accepted: u64 = 0;
        loop {
            let incoming = server.accept().await;
            let dos = self.dos_protection.clone();
            let ctx = ctx.clone();

            accepted += 1;
            if accepted % 100 == 0 {
                let expired = dos.write().await.cleanup_expired_bans();
                if expired > 0 {
                    tracing::debug!("Cleared {} expired IP bans", expired);
                }
            }

            tokio::spawn(async move {
                if let Err(e) = handle_connection(incoming, dos, ctx).await {
                    tracing::warn!("Connection error: {:#}", e);
                }
            });
        }
    }
}

/// Handle a single WebTransport connection
async fn handle_connection(
    incoming: wtransport::endpoint::IncomingSession,
    dos_protection: Arc<RwLock<DoSProtection>>,
    ctx: ServerContext,
) -> anyhow::Result<()> {
    let session_request = incoming.await.context("Handshake failed")?;
    let client_ip = session_request.remote_address().ip();
    let connection_id: ConnectionId = Uuid::new_v4();

    let from_ip = {
        let mut dos = dos_protection.write().await;
        if let Err(e) = dos.register_connection(connection_id, client_ip) {
            tracing::warn!("Connection from {} rejected: {}", client_ip, e);
            return Err(anyhow::anyhow!("Connection rejected: {}", e));
        }
        dos.connections_from_ip(client_ip)
    };

    tracing::debug!(
        "New connection from {} ({} open from this IP), path: {}, conn_id: {}",
        client_ip,
        from_ip,
        session_request.path(),
        connection_id
    );

    let connection = match session_request.accept().await {
        Ok(connection) => connection,
        Err(e) => {
            dos_protection.write().await.unregister_connection(connection_id);
            return Err(e).context("Failed to accept session");
        }
    };

    ctx.metrics.connections_active.fetch_add(1, Ordering::Relaxed);
    tracing::info!("Connection {} opened from {}", connection_id, client_ip);

    let mut datagrams: u64 = 0;
    loop {
        tokio::select! {
            stream = connection.accept_bi() => {
                match stream {
                    Ok((send, recv)) => {
                        let (tx, rx) = outbox();
                        // Greeting is queued ahead of anything the engines send
                        match encode_frame(&ServerMessage::Connected { connection_id }) {
                            Ok(greeting) => {
                                let _ = tx.try_send(greeting);
                            }
                            Err(e) => tracing::warn!("Failed to greet {}: {}", connection_id, e),
                        }
                        tokio::spawn(run_writer(connection_id, send, rx, ctx.metrics.clone()));
                        // The newest stream becomes this connection's outbound channel
                        ctx.connections.register(connection_id, tx);

                        let ctx = ctx.clone();
                        let dos = dos_protection.clone();
                        tokio::spawn(async move {
                            read_stream(recv, connection_id, dos, ctx).await;
                        });
                    }
                    Err(e) => {
                        tracing::debug!("Stream accept error: {}", e);
                        break;
                    }
                }
            }

            datagram = connection.receive_datagram() => {
                match datagram {
                    Ok(data) => {
                        datagrams += 1;
                        #[cfg(feature = "dos_ratelimit")]
                        {
                            if datagrams % DATAGRAM_CHECK_EVERY == 0 {
                                let checked = dos_protection.write().await.check_message(connection_id, data.len());
                                if let Err(e) = checked {
                                    tracing::debug!("Datagram from {} rate limited: {}", connection_id, e);
                                    continue;
                                }
                            }
                        }
                        ctx.metrics.record_received(data.len());

                        match decode::<ClientMessage>(&data) {
                            Ok(msg) if datagram_allowed(&msg) => {
                                let out = handle_client_message(&ctx, connection_id, msg).await;
                                ctx.connections.dispatch(out);
                            }
                            Ok(_) => tracing::debug!("Ignoring reliable-only message sent as datagram"),
                            Err(e) => tracing::debug!("Failed to decode datagram: {}", e),
                        }
                    }
                    Err(e) => {
                        tracing::debug!("Datagram receive error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    // Deregister first so nothing is queued to the closed connection
    ctx.connections.unregister(connection_id);
    let out = handle_disconnect(&ctx, connection_id).await;
    ctx.connections.dispatch(out);

    dos_protection.write().await.unregister_connection(connection_id);
    ctx.metrics.connections_active.fetch_sub(1, Ordering::Relaxed);

    tracing::info!("Connection {} closed", connection_id);
    Ok(())
}

/// Read length-prefixed frames until the stream ends or misbehaves
async fn read_stream(
    mut recv: wtransport::RecvStream,
    connection_id: ConnectionId,
    dos_protection: Arc<RwLock<DoSProtection>>,
    ctx: ServerContext,
) {
    #[cfg(feature = "dos_ratelimit")]
    use crate::net::dos_protection::DoSError;
    #[cfg(not(feature = "dos_ratelimit"))]
    let _ = &dos_protection;

    let mut buffer = vec![0u8; 4096];

    loop {
        let mut len_buf = [0u8; 4];
        if let Err(e) = recv.read_exact(&mut len_buf).await {
            tracing::debug!("Stream read error: {}", e);
            break;
        }

        let msg_len = u32::from_le_bytes(len_buf) as usize;
        if msg_len > MAX_MESSAGE_SIZE {
            tracing::warn!("Rejected oversized message: {} bytes from {}", msg_len, connection_id);
            break;
        }
        if msg_len > buffer.len() {
            buffer.resize(msg_len, 0);
        }

        if let Err(e) = recv.read_exact(&mut buffer[..msg_len]).await {
            tracing::debug!("Stream read error: {}", e);
            break;
        }

        #[cfg(feature = "dos_ratelimit")]
        {
            let mut dos = dos_protection.write().await;
            match dos.check_message(connection_id, msg_len) {
                Ok(()) => {}
                Err(DoSError::ViolationLimitExceeded) => {
                    tracing::warn!(
                        "{} rate violations, dropping stream of {}",
                        dos.violation_count(connection_id),
                        connection_id
                    );
                    dos.ban_connection_ip(connection_id, "message flood");
                    break;
                }
                Err(e) => {
                    tracing::warn!("{} from {}", e, connection_id);
                    continue;
                }
            }
        }
        ctx.metrics.record_received(msg_len);

        let msg: ClientMessage = match decode(&buffer[..msg_len]) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("Failed to decode client message from {}: {}", connection_id, e);
                continue;
            }
        };

        let out = handle_client_message(&ctx, connection_id, msg).await;
        ctx.connections.dispatch(out);
    }
}
