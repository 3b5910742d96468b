use crate::config::MpiConfig;
use crate::error::{MpiError, Result};
use crate::protocol::{HEADER_SIZE, MpiMessage, decode_header, decode_payload, encode_message};
use crate::transport::tls::{HostIdentity, client_config};
use crate::transport::{InboundSink, Transport};
use crate::types::HostId;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;

/// Outbound link to one peer host.
///
/// Every frame to that host goes down a single long-lived uni stream, so
/// frames arrive in the order they were written.
struct PeerLink {
    conn: quinn::Connection,
    stream: Mutex<quinn::SendStream>,
}

/// QUIC transport between hosts.
///
/// Host ids are `ip:port` (or `name:port`) strings of the peers' QUIC
/// endpoints. Inbound frames are `[header][rkyv payload]` and are delivered
/// to the sink given to [`QuicTransport::start`].
pub struct QuicTransport {
    endpoint: quinn::Endpoint,
    local_addr: SocketAddr,
    links: Mutex<HashMap<HostId, Arc<PeerLink>>>,
    connect_timeout: Duration,
    max_message_bytes: usize,
    accept_task: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl QuicTransport {
    /// Bind a QUIC endpoint on `addr` with a fresh self-signed identity.
    pub fn bind(addr: SocketAddr, config: &MpiConfig) -> Result<Self> {
        let server_config = HostIdentity::generate(&config.endpoint_host)?.server_config()?;
        let mut endpoint = quinn::Endpoint::server(server_config, addr)
            .map_err(|e| MpiError::transport_with_source(format!("bind {addr}"), e))?;
        endpoint.set_default_client_config(client_config()?);

        let local_addr = endpoint
            .local_addr()
            .map_err(|e| MpiError::transport_with_source("local_addr", e))?;

        Ok(Self {
            endpoint,
            local_addr,
            links: Mutex::new(HashMap::new()),
            connect_timeout: config.connect_timeout,
            max_message_bytes: config.max_message_bytes,
            accept_task: std::sync::Mutex::new(None),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The id other hosts use to reach this endpoint.
    pub fn host_id(&self) -> HostId {
        HostId::from(self.local_addr)
    }

    /// Start accepting inbound connections, delivering to `sink`.
    ///
    /// Calling this again replaces the previous accept loop.
    pub fn start(&self, sink: Weak<dyn InboundSink>) {
        let endpoint = self.endpoint.clone();
        let max = self.max_message_bytes;
        let task = tokio::spawn(accept_loop(endpoint, sink, max));
        let mut slot = self.accept_task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = slot.replace(task) {
            old.abort();
        }
    }

    /// Close all connections and stop accepting.
    pub fn close(&self) {
        if let Some(task) = self
            .accept_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
        self.endpoint.close(0u32.into(), b"shutdown");
    }

    async fn link(&self, host: &HostId) -> Result<Arc<PeerLink>> {
        let mut links = self.links.lock().await;
        if let Some(link) = links.get(host) {
            if link.conn.close_reason().is_none() {
                return Ok(Arc::clone(link));
            }
            tracing::warn!(%host, "quic: cached connection closed, reconnecting");
            links.remove(host);
        }

        let addr = resolve(host).await?;
        let connecting = self
            .endpoint
            .connect(addr, "localhost")
            .map_err(|e| MpiError::transport_with_source(format!("connect {host}"), e))?;
        let conn = tokio::time::timeout(self.connect_timeout, connecting)
            .await
            .map_err(|_| {
                MpiError::transport(format!(
                    "connect {host}: timed out after {:?}",
                    self.connect_timeout
                ))
            })?
            .map_err(|e| MpiError::transport_with_source(format!("connect {host}"), e))?;
        let stream = conn
            .open_uni()
            .await
            .map_err(|e| MpiError::transport_with_source("open uni stream", e))?;

        tracing::debug!(%host, "quic: connected");
        let link = Arc::new(PeerLink {
            conn,
            stream: Mutex::new(stream),
        });
        links.insert(host.clone(), Arc::clone(&link));
        Ok(link)
    }
}

impl Transport for QuicTransport {
    fn send<'a>(&'a self, host: &'a HostId, msg: MpiMessage) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let frame = encode_message(&msg)?;
            let link = self.link(host).await?;
            let mut stream = link.stream.lock().await;
            stream
                .write_all(&frame)
                .await
                .map_err(|e| MpiError::transport_with_source(format!("write to {host}"), e))
        })
    }
}

impl Drop for QuicTransport {
    fn drop(&mut self) {
        if let Some(task) = self
            .accept_task
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
    }
}

async fn resolve(host: &HostId) -> Result<SocketAddr> {
    if let Ok(addr) = host.as_str().parse::<SocketAddr>() {
        return Ok(addr);
    }
    tokio::net::lookup_host(host.as_str())
        .await
        .map_err(|e| MpiError::transport_with_source(format!("resolve {host}"), e))?
        .next()
        .ok_or_else(|| MpiError::transport(format!("resolve {host}: no addresses")))
}

async fn accept_loop(endpoint: quinn::Endpoint, sink: Weak<dyn InboundSink>, max: usize) {
    while let Some(incoming) = endpoint.accept().await {
        let sink = sink.clone();
        tokio::spawn(async move {
            let conn = match incoming.await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("quic: handshake failed: {e}");
                    return;
                }
            };
            let remote = conn.remote_address();
            while let Ok(stream) = conn.accept_uni().await {
                let sink = sink.clone();
                tokio::spawn(async move {
                    if let Err(e) = read_frames(stream, &sink, max).await {
                        tracing::error!(%remote, "quic: inbound stream failed: {e}");
                    }
                });
            }
        });
    }
}

/// Read frames until the peer finishes the stream.
async fn read_frames(
    mut stream: quinn::RecvStream,
    sink: &Weak<dyn InboundSink>,
    max: usize,
) -> Result<()> {
    let mut header_buf = [0u8; HEADER_SIZE];
    loop {
        match stream.read_exact(&mut header_buf).await {
            Ok(()) => {}
            Err(quinn::ReadExactError::FinishedEarly(0)) => return Ok(()),
            Err(e) => return Err(MpiError::transport_with_source("read header", e)),
        }
        let header = decode_header(&header_buf)?;
        let len = header.payload_length as usize;
        if len > max {
            return Err(MpiError::DecodeFailed(format!(
                "frame of {len} bytes exceeds limit of {max}"
            )));
        }

        let mut payload = vec![0u8; len];
        stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| MpiError::transport_with_source("read payload", e))?;
        let msg = decode_payload(&payload)?;

        let Some(sink) = sink.upgrade() else {
            tracing::warn!(
                world_id = msg.world_id,
                "quic: local registry dropped, discarding inbound message"
            );
            return Ok(());
        };
        if let Err(e) = sink.deliver(msg) {
            tracing::warn!("quic: inbound message dropped: {e}");
        }
    }
}
