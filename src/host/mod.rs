//! Host-call boundary.
//!
//! [`MpiHost`] is the MPI call surface one executing rank sees from inside
//! its sandbox. Each call validates the guest's handles, resolves buffers
//! against [`GuestMemory`], runs the matching engine operation on the
//! rank's [`WorldContext`] and writes results back into guest memory.
//! Guest addresses are `u32` offsets; the [`IN_PLACE`] sentinel is
//! translated into [`BufferSource::InPlace`](crate::types::BufferSource)
//! here and nowhere else.

mod collectives;
pub mod handles;
pub mod memory;
mod p2p;
mod topology;

pub use handles::{
    COMMUNICATOR_BYTES, DATATYPE_BYTES, IN_PLACE, INFO_NULL, MPI_ERR_COUNT, MPI_SUCCESS,
    STATUS_BYTES, STATUS_IGNORE, write_comm_handle, write_dtype_handle, write_op_handle,
};
pub use memory::{GuestMemory, LinearMemory, PAGE_SIZE, page_aligned};

use crate::config::MpiConfig;
use crate::error::{MpiError, Result};
use crate::topology::CartTopology;
use crate::types::{DataType, Rank, WorldId};
use crate::world::{RequestId, WorldContext, WorldRegistry};
use handles::{read_comm, read_dtype};
use std::collections::HashMap;
use std::sync::Arc;

/// Identity of the function call a rank is executing, as assigned by the
/// scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionCall {
    pub rank: Rank,
    /// Set by the scheduler for joining ranks; filled in by `init` on rank 0.
    pub world_id: Option<WorldId>,
    /// World size requested for rank 0; the configured default otherwise.
    pub world_size: Option<u32>,
}

impl ExecutionCall {
    /// Call for the rank that creates a world of `size` ranks.
    pub fn root(size: u32) -> Self {
        Self {
            rank: 0,
            world_id: None,
            world_size: Some(size),
        }
    }

    /// Call for `rank` joining an existing world.
    pub fn member(world_id: WorldId, rank: Rank) -> Self {
        Self {
            rank,
            world_id: Some(world_id),
            world_size: None,
        }
    }
}

/// Element type and count resolved from a guest (count, datatype) pair.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Chunk {
    pub dtype: DataType,
    pub count: usize,
}

impl Chunk {
    pub fn bytes(&self) -> usize {
        self.dtype.bytes_for(self.count)
    }
}

/// MPI host calls for one executing rank.
pub struct MpiHost<M> {
    registry: Arc<WorldRegistry>,
    config: MpiConfig,
    call: ExecutionCall,
    memory: M,
    ctx: Option<WorldContext>,
    cart: Option<CartTopology>,
    /// Guest buffer each outstanding irecv delivers into.
    pending_recvs: HashMap<RequestId, u32>,
}

macro_rules! unsupported_calls {
    ($($(#[$meta:meta])* $name:ident => $call:literal;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&self) -> Result<()> {
                tracing::trace!(rank = self.call.rank, $call);
                Err(MpiError::unsupported($call))
            }
        )*
    };
}

impl<M: GuestMemory> MpiHost<M> {
    pub fn new(
        registry: Arc<WorldRegistry>,
        config: MpiConfig,
        call: ExecutionCall,
        memory: M,
    ) -> Self {
        Self {
            registry,
            config,
            call,
            memory,
            ctx: None,
            cart: None,
            pending_recvs: HashMap::new(),
        }
    }

    pub fn call(&self) -> &ExecutionCall {
        &self.call
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// The rank's world context, once `init` has run.
    pub fn context(&self) -> Option<&WorldContext> {
        self.ctx.as_ref()
    }

    fn ctx(&self) -> Result<WorldContext> {
        self.ctx.clone().ok_or(MpiError::NotInitialized)
    }

    /// Validate the communicator handle at `comm` and return the context.
    fn checked_ctx(&self, comm: u32) -> Result<WorldContext> {
        read_comm(&self.memory, comm)?;
        self.ctx()
    }

    pub(crate) fn chunk(&self, count: u32, datatype: u32) -> Result<Chunk> {
        Ok(Chunk {
            dtype: read_dtype(&self.memory, datatype)?,
            count: count as usize,
        })
    }

    /// Rank 0 creates the world; every other rank joins the one named by
    /// its execution call.
    pub fn init(&mut self) -> Result<()> {
        if self.ctx.is_some() {
            tracing::warn!(rank = self.call.rank, "MPI_Init called twice, ignoring");
            return Ok(());
        }
        let ctx = if self.call.rank == 0 {
            let size = self
                .call
                .world_size
                .unwrap_or(self.config.default_world_size);
            tracing::debug!(size, "MPI_Init (create)");
            let ctx = self.registry.create_world(size)?;
            self.call.world_id = Some(ctx.world_id());
            ctx
        } else {
            let world_id = self
                .call
                .world_id
                .ok_or(MpiError::UnknownWorld { world_id: 0 })?;
            tracing::debug!(world_id, rank = self.call.rank, "MPI_Init (join)");
            self.registry.join_world(world_id, self.call.rank)?
        };
        self.ctx = Some(ctx);
        Ok(())
    }

    /// Leave the world. The last rank on this host to leave destroys it.
    pub fn finalize(&mut self) -> Result<()> {
        tracing::trace!(rank = self.call.rank, "MPI_Finalize");
        let ctx = self.ctx.take().ok_or(MpiError::NotInitialized)?;
        self.cart = None;
        self.pending_recvs.clear();
        self.registry.leave_world(ctx)?;
        Ok(())
    }

    /// Tear the world down immediately, aborting outstanding requests.
    pub fn abort(&mut self, comm: u32, error_code: i32) -> Result<()> {
        tracing::warn!(rank = self.call.rank, comm, error_code, "MPI_Abort");
        let ctx = self.ctx.take().ok_or(MpiError::NotInitialized)?;
        self.cart = None;
        self.pending_recvs.clear();
        if self.registry.contains(ctx.world_id()) {
            self.registry.destroy_world(ctx.world_id())?;
        }
        Ok(())
    }

    pub fn comm_size(&mut self, comm: u32, res_ptr: u32) -> Result<()> {
        tracing::trace!(rank = self.call.rank, comm, res_ptr, "MPI_Comm_size");
        let ctx = self.checked_ctx(comm)?;
        self.memory.write_i32(res_ptr, ctx.size() as i32)
    }

    pub fn comm_rank(&mut self, comm: u32, res_ptr: u32) -> Result<()> {
        tracing::trace!(rank = self.call.rank, comm, res_ptr, "MPI_Comm_rank");
        let ctx = self.checked_ctx(comm)?;
        self.memory.write_i32(res_ptr, ctx.rank() as i32)
    }

    /// Communicators are never freed; only the handle is checked.
    pub fn comm_free(&mut self, comm: u32) -> Result<()> {
        tracing::trace!(rank = self.call.rank, comm, "MPI_Comm_free");
        read_comm(&self.memory, comm).map(|_| ())
    }

    pub fn type_size(&mut self, datatype: u32, res_ptr: u32) -> Result<()> {
        tracing::trace!(rank = self.call.rank, datatype, res_ptr, "MPI_Type_size");
        let dtype = read_dtype(&self.memory, datatype)?;
        self.memory.write_i32(res_ptr, dtype.size_in_bytes() as i32)
    }

    pub fn type_contiguous(&mut self, count: u32, old_type: u32, new_type_ptr: u32) -> Result<()> {
        tracing::trace!(
            rank = self.call.rank,
            count,
            old_type,
            new_type_ptr,
            "MPI_Type_contiguous"
        );
        Ok(())
    }

    pub fn type_commit(&mut self, type_ptr: u32) -> Result<()> {
        tracing::trace!(rank = self.call.rank, type_ptr, "MPI_Type_commit");
        Ok(())
    }

    /// Grow guest memory by `size` bytes (page aligned) and write the new
    /// region's address to `res_ptr`.
    pub fn alloc_mem(&mut self, size: u32, info: u32, res_ptr: u32) -> Result<()> {
        tracing::trace!(rank = self.call.rank, size, info, res_ptr, "MPI_Alloc_mem");
        if info != 0 && self.memory.read_i32(info)? != INFO_NULL {
            return Err(MpiError::unsupported("MPI_Alloc_mem with non-null info"));
        }
        let addr = self.memory.grow(size as usize)?;
        self.memory.write_i32(res_ptr, addr as i32)
    }

    pub fn free_mem(&mut self, base: u32) -> Result<()> {
        tracing::trace!(rank = self.call.rank, base, "MPI_Free_mem");
        Ok(())
    }

    /// Write this host's endpoint name, NUL terminated, to `buf` and its
    /// length to `len_ptr`.
    pub fn get_processor_name(&mut self, buf: u32, len_ptr: u32) -> Result<()> {
        tracing::trace!(rank = self.call.rank, buf, len_ptr, "MPI_Get_processor_name");
        let mut name = self.config.endpoint_host.clone().into_bytes();
        let len = name.len();
        name.push(0);
        self.memory.write(buf, &name)?;
        if len_ptr != 0 {
            self.memory.write_i32(len_ptr, len as i32)?;
        }
        Ok(())
    }

    /// Seconds since the world was created on this host.
    pub fn wtime(&self) -> Result<f64> {
        Ok(self.ctx()?.wtime())
    }

    unsupported_calls! {
        get_version => "MPI_Get_version";
        comm_dup => "MPI_Comm_dup";
        comm_split => "MPI_Comm_split";
        comm_c2f => "MPI_Comm_c2f";
        comm_f2c => "MPI_Comm_f2c";
        rsend => "MPI_Rsend";
        waitany => "MPI_Waitany";
        allgatherv => "MPI_Allgatherv";
        reduce_scatter => "MPI_Reduce_scatter";
        alltoallv => "MPI_Alltoallv";
        op_create => "MPI_Op_create";
        op_free => "MPI_Op_free";
        win_create => "MPI_Win_create";
        win_fence => "MPI_Win_fence";
        get => "MPI_Get";
        put => "MPI_Put";
        win_free => "MPI_Win_free";
        win_get_attr => "MPI_Win_get_attr";
        request_free => "MPI_Request_free";
        type_free => "MPI_Type_free";
    }
}
