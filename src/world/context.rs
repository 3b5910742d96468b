use crate::types::{Rank, WorldId};
use crate::world::World;
use std::sync::Arc;

/// One rank's view of a world.
///
/// Every point-to-point, collective and topology operation is a method on
/// the context, so a rank's state travels with the value instead of living
/// in thread-local storage. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct WorldContext {
    world: Arc<World>,
    rank: Rank,
}

impl WorldContext {
    pub(crate) fn new(world: Arc<World>, rank: Rank) -> Self {
        Self { world, rank }
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn size(&self) -> u32 {
        self.world.size()
    }

    pub fn world_id(&self) -> WorldId {
        self.world.id()
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Wall-clock seconds since the world was created on this host.
    pub fn wtime(&self) -> f64 {
        self.world.elapsed_secs()
    }
}
