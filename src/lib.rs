pub mod collective;
pub mod config;
pub mod error;
pub mod host;
pub mod protocol;
mod reduce;
pub mod topology;
pub mod transport;
pub mod types;
pub mod world;

pub use config::MpiConfig;
pub use error::{MpiError, Result};
pub use host::{ExecutionCall, GuestMemory, LinearMemory, MpiHost};
pub use protocol::MpiMessage;
pub use topology::{CartCoords, CartTopology, dims_create};
pub use transport::{InboundSink, LocalNetwork, QuicTransport, Transport};
pub use types::{BufferSource, Communicator, DataType, HostId, Rank, ReduceOp, Tag, WorldId};
pub use world::{Completion, RequestId, Status, World, WorldContext, WorldDescriptor, WorldRegistry};
