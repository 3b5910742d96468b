//! Collective algorithms built on point-to-point messages.
//!
//! Each collective is a free function over a [`WorldContext`]; the same
//! operations are available as methods on the context. Every rank of the
//! world must call the same collectives in the same order.
//!
//! [`WorldContext`]: crate::world::WorldContext

mod allgather;
mod allreduce;
mod alltoall;
mod barrier;
mod broadcast;
mod gather;
mod helpers;
mod reduce;
mod scan;
mod scatter;

pub use allgather::allgather;
pub use allreduce::allreduce;
pub use alltoall::alltoall;
pub use barrier::barrier;
pub use broadcast::broadcast;
pub use gather::gather;
pub use reduce::reduce;
pub use scan::scan;
pub use scatter::scatter;
