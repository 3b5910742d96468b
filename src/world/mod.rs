//! Worlds, their registry, and the point-to-point engine.

mod collectives;
mod context;
mod directory;
pub(crate) mod mailbox;
mod messaging;
mod registry;
mod request;
mod status;

pub use context::WorldContext;
pub use directory::{Directory, WorldDescriptor};
pub use registry::WorldRegistry;
pub use request::{Completion, RequestId};
pub use status::Status;

use crate::error::{MpiError, Result};
use crate::protocol::MpiMessage;
use crate::transport::Transport;
use crate::types::{HostId, Rank, WorldId};
use mailbox::Mailbox;
use request::RequestArena;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// One fixed-size group of ranks, as seen from one host.
///
/// Holds the mailbox for the ranks placed on this host and the requests
/// they have in flight. Dropping the world drops unreceived messages and
/// aborts pending requests.
pub struct World {
    id: WorldId,
    directory: Directory,
    local_host: HostId,
    created: Instant,
    mailbox: Mailbox,
    requests: RequestArena,
    transport: Arc<dyn Transport>,
    joined: Mutex<HashSet<Rank>>,
    left: Mutex<HashSet<Rank>>,
}

impl World {
    pub(crate) fn new(
        id: WorldId,
        directory: Directory,
        local_host: HostId,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id,
            directory,
            local_host,
            created: Instant::now(),
            mailbox: Mailbox::new(),
            requests: RequestArena::new(),
            transport,
            joined: Mutex::new(HashSet::new()),
            left: Mutex::new(HashSet::new()),
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn size(&self) -> u32 {
        self.directory.size()
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn local_host(&self) -> &HostId {
        &self.local_host
    }

    /// Seconds since the world was created on this host.
    pub fn elapsed_secs(&self) -> f64 {
        self.created.elapsed().as_secs_f64()
    }

    /// Number of requests started and not yet waited on.
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Messages delivered to local ranks and not yet received.
    pub fn pending_messages(&self) -> usize {
        self.mailbox.pending()
    }

    /// Message keys that currently hold queued messages or posted receives.
    pub fn active_queues(&self) -> usize {
        self.mailbox.bucket_count()
    }

    pub(crate) fn check_rank(&self, rank: Rank) -> Result<()> {
        if rank < self.size() {
            Ok(())
        } else {
            Err(MpiError::InvalidRank {
                rank,
                world_size: self.size(),
            })
        }
    }

    pub(crate) fn is_local(&self, rank: Rank) -> bool {
        self.directory
            .host_of(rank)
            .is_ok_and(|h| *h == self.local_host)
    }

    /// Record `rank` as joined on this host.
    pub(crate) fn mark_joined(&self, rank: Rank) -> Result<()> {
        self.check_rank(rank)?;
        let host = self.directory.host_of(rank)?;
        if *host != self.local_host {
            return Err(MpiError::RankNotLocal {
                world_id: self.id,
                rank,
                host: host.to_string(),
            });
        }
        let mut joined = self.joined.lock().unwrap_or_else(|e| e.into_inner());
        if !joined.insert(rank) {
            return Err(MpiError::RankAlreadyJoined {
                world_id: self.id,
                rank,
            });
        }
        Ok(())
    }

    /// Record that `rank` has finished. Returns true once every rank placed
    /// on this host has left.
    pub(crate) fn leave(&self, rank: Rank) -> Result<bool> {
        let joined = self.joined.lock().unwrap_or_else(|e| e.into_inner());
        if !joined.contains(&rank) {
            return Err(MpiError::NotInitialized);
        }
        drop(joined);
        let mut left = self.left.lock().unwrap_or_else(|e| e.into_inner());
        left.insert(rank);
        Ok(left.len() == self.directory.ranks_on(&self.local_host).len())
    }

    /// Route a message to its destination: straight into the mailbox for a
    /// local rank, through the transport otherwise.
    pub(crate) async fn dispatch(&self, msg: MpiMessage) -> Result<()> {
        let host = self.directory.host_of(msg.destination)?;
        if *host == self.local_host {
            self.mailbox.push(msg);
            Ok(())
        } else {
            self.transport.send(host, msg).await
        }
    }

    /// Inbound path from a transport.
    pub(crate) fn deliver(&self, msg: MpiMessage) -> Result<()> {
        self.check_rank(msg.sender)?;
        self.check_rank(msg.destination)?;
        if !self.is_local(msg.destination) {
            tracing::warn!(
                world_id = self.id,
                destination = msg.destination,
                "inbound message for a rank not placed here, dropping"
            );
            return Err(MpiError::RankNotLocal {
                world_id: self.id,
                rank: msg.destination,
                host: self.local_host.to_string(),
            });
        }
        self.mailbox.push(msg);
        Ok(())
    }

    pub(crate) fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub(crate) fn requests(&self) -> &RequestArena {
        &self.requests
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("size", &self.size())
            .field("local_host", &self.local_host)
            .finish_non_exhaustive()
    }
}
