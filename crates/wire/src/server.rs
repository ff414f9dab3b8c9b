//! RESP TCP listener
//!
//! One tokio task per connection. The loop reads into the connection's
//! parser, dispatches every complete command (pipelining falls out of the
//! parse loop), and batches the encoded replies into a single write.
//! Subscribed connections additionally receive pushed `message`/
//! `pmessage` frames from their pub/sub receiver.

use crate::conn::ConnState;
use crate::dispatch::{dispatch, is_write_command};
use crate::parse::RespParser;
use crate::reply::Reply;
use async_trait::async_trait;
use brine_engine::{Engine, PubSubMessage};
use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Resolves the engine serving a namespace. The provisioning layer
/// implements this; single-engine deployments use the blanket
/// `Arc<Engine>` implementation.
pub trait EngineResolver: Send + Sync {
    /// The engine that owns `namespace`'s keyspace
    fn engine_for(&self, namespace: &str) -> Arc<Engine>;
}

impl EngineResolver for Arc<Engine> {
    fn engine_for(&self, _namespace: &str) -> Arc<Engine> {
        Arc::clone(self)
    }
}

/// Post-dispatch hook for successful write commands. The replication
/// manager sits behind this seam; the wire layer stays cluster-agnostic.
#[async_trait]
pub trait MutationObserver: Send + Sync {
    /// Called after a write command dispatched without error
    async fn on_mutation(&self, namespace: &str, argv: &[Vec<u8>]);
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct RespServerConfig {
    /// Bind address, e.g. `127.0.0.1:6379`
    pub bind_addr: String,
    /// Password required by `AUTH`; `None` disables authentication
    pub password: Option<String>,
    /// Namespace served to RESP connections (`SELECT` is a no-op;
    /// namespace selection is a configuration concern on this path)
    pub namespace: String,
}

impl Default for RespServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:6379".to_string(),
            password: None,
            namespace: "default".to_string(),
        }
    }
}

/// The RESP front door
pub struct RespServer {
    config: RespServerConfig,
    resolver: Arc<dyn EngineResolver>,
    observer: Option<Arc<dyn MutationObserver>>,
}

impl RespServer {
    /// Build a server over an engine resolver
    pub fn new(config: RespServerConfig, resolver: Arc<dyn EngineResolver>) -> Self {
        Self {
            config,
            resolver,
            observer: None,
        }
    }

    /// Attach the replication observer
    pub fn with_observer(mut self, observer: Arc<dyn MutationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Bind and serve until `shutdown` flips to true.
    ///
    /// Returns once the listener stops accepting; in-flight connections
    /// finish their current command and close with the runtime.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, "resp listener bound");
        let server = Arc::new(self);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "connection accepted");
                            let server = Arc::clone(&server);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream).await {
                                    debug!(%peer, error = %e, "connection ended");
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "accept failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("resp listener shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> std::io::Result<()> {
        let _ = stream.set_nodelay(true);
        let engine = self.resolver.engine_for(&self.config.namespace);
        let mut conn = ConnState::new(self.config.password.clone());
        let mut parser = RespParser::new();
        let mut read_buf = [0u8; 8192];
        let mut write_buf = BytesMut::with_capacity(4096);
        let mut push_rx: Option<UnboundedReceiver<PubSubMessage>> = None;

        'outer: loop {
            tokio::select! {
                read = stream.read(&mut read_buf) => {
                    let n = read?;
                    if n == 0 {
                        break 'outer;
                    }
                    parser.feed(&read_buf[..n]);

                    // Drain every complete command (pipelining)
                    loop {
                        match parser.next_command() {
                            Ok(Some(argv)) => {
                                let reply = dispatch(&engine, &self.config.namespace, &argv, &mut conn);
                                let failed = matches!(reply, Reply::Error(_));
                                reply.encode_into(&mut write_buf);

                                if !failed {
                                    self.observe_write(&argv).await;
                                }
                                if let Some(rx) = conn.pending_receiver.take() {
                                    push_rx = Some(rx);
                                }
                                if conn.closing {
                                    stream.write_all(&write_buf).await?;
                                    stream.flush().await?;
                                    break 'outer;
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                warn!(error = %e, "protocol error, closing connection");
                                Reply::from_error(&e).encode_into(&mut write_buf);
                                stream.write_all(&write_buf).await?;
                                break 'outer;
                            }
                        }
                    }

                    if !write_buf.is_empty() {
                        stream.write_all(&write_buf).await?;
                        stream.flush().await?;
                        write_buf.clear();
                    }
                }
                pushed = recv_push(&mut push_rx) => {
                    if let Some(msg) = pushed {
                        encode_push(&msg, &mut write_buf);
                        stream.write_all(&write_buf).await?;
                        stream.flush().await?;
                        write_buf.clear();
                    }
                }
            }
        }

        if let Some(id) = conn.subscriber {
            engine.remove_subscriber(id);
        }
        Ok(())
    }

    async fn observe_write(&self, argv: &[Vec<u8>]) {
        let Some(observer) = &self.observer else {
            return;
        };
        let Some(name) = argv.first() else {
            return;
        };
        let name = String::from_utf8_lossy(name).to_uppercase();
        if is_write_command(&name) {
            observer.on_mutation(&self.config.namespace, argv).await;
        }
    }
}

/// Await the next pushed message, or pend forever when the connection
/// has no subscriptions yet.
async fn recv_push(rx: &mut Option<UnboundedReceiver<PubSubMessage>>) -> Option<PubSubMessage> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Pushed frames: `["message", channel, payload]`, or
/// `["pmessage", pattern, channel, payload]` for pattern deliveries.
fn encode_push(msg: &PubSubMessage, buf: &mut BytesMut) {
    let reply = match &msg.pattern {
        Some(pattern) => Reply::Array(vec![
            Reply::Bulk(b"pmessage".to_vec()),
            Reply::Bulk(pattern.clone().into_bytes()),
            Reply::Bulk(msg.channel.clone().into_bytes()),
            Reply::Bulk(msg.payload.clone()),
        ]),
        None => Reply::Array(vec![
            Reply::Bulk(b"message".to_vec()),
            Reply::Bulk(msg.channel.clone().into_bytes()),
            Reply::Bulk(msg.payload.clone()),
        ]),
    };
    reply.encode_into(buf);
}
