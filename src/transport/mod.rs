//! Host-to-host delivery of [`MpiMessage`]s.
//!
//! Sends to ranks on the local host never reach a transport; the world
//! pushes them straight into its mailbox. A transport only carries traffic
//! between hosts and hands inbound messages to an [`InboundSink`].

mod local;
mod quic;
pub(crate) mod tls;

pub use local::LocalNetwork;
pub use quic::QuicTransport;

use crate::error::Result;
use crate::protocol::MpiMessage;
use crate::types::HostId;
use futures::future::BoxFuture;

/// Outbound half: deliver a message to whichever host owns its destination.
pub trait Transport: Send + Sync {
    /// Returns once the message has been handed to the network; no delivery
    /// acknowledgement is awaited.
    fn send<'a>(&'a self, host: &'a HostId, msg: MpiMessage) -> BoxFuture<'a, Result<()>>;
}

/// Inbound half: where a transport puts messages addressed to this host.
pub trait InboundSink: Send + Sync {
    fn deliver(&self, msg: MpiMessage) -> Result<()>;
}
