use crate::config::MpiConfig;
use crate::error::{MpiError, Result};
use crate::protocol::MpiMessage;
use crate::transport::{InboundSink, LocalNetwork, QuicTransport, Transport};
use crate::types::{HostId, Rank, WorldId};
use crate::world::{Directory, World, WorldContext, WorldDescriptor};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/// Table of the worlds known on one host.
///
/// Worlds are created here (rank 0's host) or adopted from a descriptor
/// produced elsewhere; ranks then join them. The registry is also the
/// transport's inbound sink: traffic for a world that has not been adopted
/// yet is held until it is, and traffic for a destroyed world is rejected.
pub struct WorldRegistry {
    local_host: HostId,
    transport: Arc<dyn Transport>,
    worlds: DashMap<WorldId, Arc<World>>,
    unadopted: DashMap<WorldId, Vec<MpiMessage>>,
    retired: DashSet<WorldId>,
    next_id: AtomicU32,
}

impl WorldRegistry {
    pub fn new(local_host: HostId, transport: Arc<dyn Transport>) -> Self {
        Self {
            local_host,
            transport,
            worlds: DashMap::new(),
            unadopted: DashMap::new(),
            retired: DashSet::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// A registry named after `config.endpoint_host`.
    pub fn from_config(config: &MpiConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(HostId::new(config.endpoint_host.clone()), transport)
    }

    /// A single-host registry. Every world it creates is fully local.
    pub fn local() -> Arc<Self> {
        let network = Arc::new(LocalNetwork::new());
        Self::attach(&network, HostId::new("localhost"))
    }

    /// A registry for `host` that is reachable through `network`.
    pub fn attach(network: &Arc<LocalNetwork>, host: HostId) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<WorldRegistry>| {
            let sink: Weak<dyn InboundSink> = weak.clone();
            network.attach(host.clone(), sink);
            let transport: Arc<dyn Transport> = network.clone();
            Self::new(host, transport)
        })
    }

    /// A registry reachable through `transport`, named after its endpoint
    /// address. Starts the transport's accept loop.
    pub fn with_quic(transport: Arc<QuicTransport>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<WorldRegistry>| {
            let sink: Weak<dyn InboundSink> = weak.clone();
            transport.start(sink);
            let host = transport.host_id();
            Self::new(host, transport)
        })
    }

    pub fn local_host(&self) -> &HostId {
        &self.local_host
    }

    /// Create a world of `size` ranks, all placed on this host, and join
    /// rank 0.
    pub fn create_world(&self, size: u32) -> Result<WorldContext> {
        if size == 0 {
            return Err(MpiError::InvalidRank {
                rank: 0,
                world_size: 0,
            });
        }
        let directory = Directory::single_host(self.local_host.clone(), size);
        self.create_with_directory(directory)
    }

    /// Create a world whose ranks are placed as `placement[rank]`, and join
    /// rank 0. Rank 0 must live on this host.
    pub fn create_world_with_placement(&self, placement: Vec<HostId>) -> Result<WorldContext> {
        let Some(first) = placement.first() else {
            return Err(MpiError::InvalidRank {
                rank: 0,
                world_size: 0,
            });
        };
        if *first != self.local_host {
            return Err(MpiError::RankNotLocal {
                world_id: 0,
                rank: 0,
                host: first.to_string(),
            });
        }
        self.create_with_directory(Directory::from_placement(placement))
    }

    fn create_with_directory(&self, directory: Directory) -> Result<WorldContext> {
        let size = directory.size();
        let world = loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if let Entry::Vacant(slot) = self.worlds.entry(id) {
                let world = Arc::new(World::new(
                    id,
                    directory,
                    self.local_host.clone(),
                    Arc::clone(&self.transport),
                ));
                slot.insert(Arc::clone(&world));
                break world;
            }
        };
        world.mark_joined(0)?;
        tracing::debug!(world_id = world.id(), size, "created world");
        Ok(WorldContext::new(world, 0))
    }

    /// Descriptor other hosts need to adopt world `world_id`.
    pub fn descriptor(&self, world_id: WorldId) -> Result<WorldDescriptor> {
        let world = self.get_world(world_id)?;
        Ok(WorldDescriptor {
            world_id,
            placement: world.directory().placement().to_vec(),
        })
    }

    /// Install a world created on another host so local ranks can join it.
    ///
    /// Messages that arrived for the world before this call are delivered
    /// first, in arrival order.
    pub fn adopt_world(&self, descriptor: WorldDescriptor) -> Result<Arc<World>> {
        let WorldDescriptor {
            world_id,
            placement,
        } = descriptor;
        match self.worlds.entry(world_id) {
            Entry::Occupied(_) => Err(MpiError::WorldExists { world_id }),
            Entry::Vacant(slot) => {
                let size = placement.len();
                let world = Arc::new(World::new(
                    world_id,
                    Directory::from_placement(placement),
                    self.local_host.clone(),
                    Arc::clone(&self.transport),
                ));
                // Held under the vacant slot so no newer message can
                // overtake the early arrivals.
                let early = self
                    .unadopted
                    .remove(&world_id)
                    .map(|(_, msgs)| msgs)
                    .unwrap_or_default();
                let held = early.len();
                for msg in early {
                    if let Err(e) = world.deliver(msg) {
                        tracing::warn!(world_id, "held message rejected on adopt: {e}");
                    }
                }
                slot.insert(Arc::clone(&world));
                self.retired.remove(&world_id);
                tracing::debug!(world_id, size, held, host = %self.local_host, "adopted world");
                Ok(world)
            }
        }
    }

    /// Join `rank` to an existing world.
    pub fn join_world(&self, world_id: WorldId, rank: Rank) -> Result<WorldContext> {
        let world = self.get_world(world_id)?;
        world.mark_joined(rank)?;
        tracing::debug!(world_id, rank, "joined world");
        Ok(WorldContext::new(world, rank))
    }

    pub fn get_world(&self, world_id: WorldId) -> Result<Arc<World>> {
        self.worlds
            .get(&world_id)
            .map(|w| Arc::clone(w.value()))
            .ok_or(MpiError::UnknownWorld { world_id })
    }

    pub fn contains(&self, world_id: WorldId) -> bool {
        self.worlds.contains_key(&world_id)
    }

    /// Remove a world. Unreceived messages are dropped and pending requests
    /// aborted.
    pub fn destroy_world(&self, world_id: WorldId) -> Result<()> {
        let (_, world) = self
            .worlds
            .remove(&world_id)
            .ok_or(MpiError::UnknownWorld { world_id })?;
        self.retired.insert(world_id);
        let aborted = world.requests().abort_all();
        let dropped = world.pending_messages();
        tracing::debug!(world_id, aborted, dropped, "destroyed world");
        Ok(())
    }

    /// Retire `ctx`'s rank. The world is destroyed once every rank placed on
    /// this host has left; returns whether that happened.
    pub fn leave_world(&self, ctx: WorldContext) -> Result<bool> {
        let world_id = ctx.world_id();
        let last = ctx.world().leave(ctx.rank())?;
        tracing::debug!(world_id, rank = ctx.rank(), last, "left world");
        if last && self.contains(world_id) {
            self.destroy_world(world_id)?;
        }
        Ok(last)
    }

    /// Ids of all worlds known here, ascending.
    pub fn world_ids(&self) -> Vec<WorldId> {
        let mut ids: Vec<WorldId> = self.worlds.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Messages held for worlds not adopted yet.
    pub fn held_messages(&self) -> usize {
        self.unadopted.iter().map(|e| e.value().len()).sum()
    }
}

impl InboundSink for WorldRegistry {
    fn deliver(&self, msg: MpiMessage) -> Result<()> {
        let world_id = msg.world_id;
        let world = match self.worlds.entry(world_id) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(_) if self.retired.contains(&world_id) => {
                tracing::warn!(
                    world_id,
                    sender = msg.sender,
                    "inbound message for destroyed world, dropping"
                );
                return Err(MpiError::UnknownWorld { world_id });
            }
            Entry::Vacant(_) => {
                tracing::debug!(world_id, sender = msg.sender, "holding message until adopt");
                self.unadopted.entry(world_id).or_default().push(msg);
                return Ok(());
            }
        };
        world.deliver(msg)
    }
}
