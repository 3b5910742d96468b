use crate::error::{MpiError, Result};
use crate::protocol::MpiMessage;
use crate::transport::{InboundSink, Transport};
use crate::types::HostId;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{RwLock, Weak};

/// In-process network joining several hosts that live in one process.
///
/// Each host attaches its sink under its [`HostId`]; a send looks the
/// destination host up and delivers synchronously. Sinks are held weakly so
/// a dropped registry simply becomes unreachable.
#[derive(Default)]
pub struct LocalNetwork {
    hosts: RwLock<HashMap<HostId, Weak<dyn InboundSink>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `sink` reachable as `host`, replacing any previous attachment.
    pub fn attach(&self, host: HostId, sink: Weak<dyn InboundSink>) {
        let mut hosts = self.hosts.write().unwrap_or_else(|e| e.into_inner());
        hosts.insert(host, sink);
    }

    pub fn detach(&self, host: &HostId) {
        let mut hosts = self.hosts.write().unwrap_or_else(|e| e.into_inner());
        hosts.remove(host);
    }

    /// Hosts currently attached.
    pub fn hosts(&self) -> Vec<HostId> {
        let hosts = self.hosts.read().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<HostId> = hosts.keys().cloned().collect();
        out.sort();
        out
    }

    fn sink_for(&self, host: &HostId) -> Result<std::sync::Arc<dyn InboundSink>> {
        let hosts = self.hosts.read().unwrap_or_else(|e| e.into_inner());
        hosts
            .get(host)
            .and_then(Weak::upgrade)
            .ok_or_else(|| MpiError::transport(format!("no route to host {host}")))
    }
}

impl Transport for LocalNetwork {
    fn send<'a>(&'a self, host: &'a HostId, msg: MpiMessage) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let sink = self.sink_for(host)?;
            sink.deliver(msg)
        })
    }
}
