use crate::error::{MpiError, Result};
use crate::host::handles::{read_op, IN_PLACE};
use crate::host::{Chunk, GuestMemory, MpiHost};
use crate::types::{BufferSource, Rank};

/// Fail unless the send and receive sides describe chunks of equal size.
fn same_extent(send: Chunk, recv: Chunk) -> Result<()> {
    if send.bytes() == recv.bytes() {
        Ok(())
    } else {
        Err(MpiError::BufferSizeMismatch {
            expected: recv.bytes(),
            actual: send.bytes(),
        })
    }
}

impl<M: GuestMemory> MpiHost<M> {
    pub async fn bcast(
        &mut self,
        buf: u32,
        count: u32,
        datatype: u32,
        root: Rank,
        comm: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, buf, count, root, "MPI_Bcast");
        let ctx = self.checked_ctx(comm)?;
        let chunk = self.chunk(count, datatype)?;
        let mut data = self.memory.read_vec(buf, chunk.bytes())?;
        ctx.broadcast(root, &mut data, chunk.dtype, chunk.count)
            .await?;
        self.memory.write(buf, &data)
    }

    pub async fn barrier(&mut self, comm: u32) -> Result<()> {
        tracing::trace!(rank = self.call.rank, "MPI_Barrier");
        let ctx = self.checked_ctx(comm)?;
        ctx.barrier().await
    }

    /// A root passing [`IN_PLACE`] as `recv_buf` keeps its own chunk where
    /// it already is in the send buffer.
    #[allow(clippy::too_many_arguments)]
    pub async fn scatter(
        &mut self,
        send_buf: u32,
        send_count: u32,
        send_type: u32,
        recv_buf: u32,
        recv_count: u32,
        recv_type: u32,
        root: Rank,
        comm: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, send_count, recv_count, root, "MPI_Scatter");
        let ctx = self.checked_ctx(comm)?;
        let is_root = ctx.rank() == root;
        let in_place = is_root && recv_buf == IN_PLACE;

        let chunk = if in_place {
            self.chunk(send_count, send_type)?
        } else {
            self.chunk(recv_count, recv_type)?
        };
        let send = if is_root {
            let send_chunk = self.chunk(send_count, send_type)?;
            same_extent(send_chunk, chunk)?;
            self.memory
                .read_vec(send_buf, chunk.bytes() * ctx.size() as usize)?
        } else {
            Vec::new()
        };
        let mut recv = if in_place {
            vec![0u8; chunk.bytes()]
        } else {
            self.memory.read_vec(recv_buf, chunk.bytes())?
        };

        ctx.scatter(root, &send, &mut recv, chunk.dtype, chunk.count)
            .await?;
        if !in_place {
            self.memory.write(recv_buf, &recv)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn gather(
        &mut self,
        send_buf: u32,
        send_count: u32,
        send_type: u32,
        recv_buf: u32,
        recv_count: u32,
        recv_type: u32,
        root: Rank,
        comm: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, send_count, recv_count, root, "MPI_Gather");
        let ctx = self.checked_ctx(comm)?;
        let is_root = ctx.rank() == root;
        let in_place = send_buf == IN_PLACE;

        let chunk = if in_place {
            self.chunk(recv_count, recv_type)?
        } else {
            self.chunk(send_count, send_type)?
        };
        if is_root && !in_place {
            same_extent(chunk, self.chunk(recv_count, recv_type)?)?;
        }
        let total = chunk.bytes() * ctx.size() as usize;
        let mut recv = if is_root || in_place {
            self.memory.read_vec(recv_buf, total)?
        } else {
            Vec::new()
        };
        let send_data = if in_place {
            Vec::new()
        } else {
            self.memory.read_vec(send_buf, chunk.bytes())?
        };
        let send = if in_place {
            BufferSource::InPlace
        } else {
            BufferSource::Separate(&send_data)
        };

        ctx.gather(root, send, &mut recv, chunk.dtype, chunk.count)
            .await?;
        if is_root {
            self.memory.write(recv_buf, &recv)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn allgather(
        &mut self,
        send_buf: u32,
        send_count: u32,
        send_type: u32,
        recv_buf: u32,
        recv_count: u32,
        recv_type: u32,
        comm: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, send_count, recv_count, "MPI_Allgather");
        let ctx = self.checked_ctx(comm)?;
        let in_place = send_buf == IN_PLACE;
        let chunk = self.chunk(recv_count, recv_type)?;
        if !in_place {
            same_extent(self.chunk(send_count, send_type)?, chunk)?;
        }
        let mut recv = self
            .memory
            .read_vec(recv_buf, chunk.bytes() * ctx.size() as usize)?;
        let send_data = if in_place {
            Vec::new()
        } else {
            self.memory.read_vec(send_buf, chunk.bytes())?
        };
        let send = if in_place {
            BufferSource::InPlace
        } else {
            BufferSource::Separate(&send_data)
        };

        ctx.allgather(send, &mut recv, chunk.dtype, chunk.count)
            .await?;
        self.memory.write(recv_buf, &recv)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn reduce(
        &mut self,
        send_buf: u32,
        recv_buf: u32,
        count: u32,
        datatype: u32,
        op: u32,
        root: Rank,
        comm: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, count, root, "MPI_Reduce");
        let ctx = self.checked_ctx(comm)?;
        let chunk = self.chunk(count, datatype)?;
        let op = read_op(&self.memory, op)?;
        let is_root = ctx.rank() == root;
        let in_place = send_buf == IN_PLACE;

        let mut recv = if is_root || in_place {
            self.memory.read_vec(recv_buf, chunk.bytes())?
        } else {
            Vec::new()
        };
        let send_data = if in_place {
            Vec::new()
        } else {
            self.memory.read_vec(send_buf, chunk.bytes())?
        };
        let send = if in_place {
            BufferSource::InPlace
        } else {
            BufferSource::Separate(&send_data)
        };

        ctx.reduce(root, op, send, &mut recv, chunk.dtype, chunk.count)
            .await?;
        if is_root {
            self.memory.write(recv_buf, &recv)?;
        }
        Ok(())
    }

    pub async fn allreduce(
        &mut self,
        send_buf: u32,
        recv_buf: u32,
        count: u32,
        datatype: u32,
        op: u32,
        comm: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, count, "MPI_Allreduce");
        let ctx = self.checked_ctx(comm)?;
        let chunk = self.chunk(count, datatype)?;
        let op = read_op(&self.memory, op)?;
        let (send_data, mut recv) = self.fold_buffers(send_buf, recv_buf, chunk.bytes())?;
        let send = match &send_data {
            Some(data) => BufferSource::Separate(data),
            None => BufferSource::InPlace,
        };
        ctx.allreduce(op, send, &mut recv, chunk.dtype, chunk.count)
            .await?;
        self.memory.write(recv_buf, &recv)
    }

    pub async fn scan(
        &mut self,
        send_buf: u32,
        recv_buf: u32,
        count: u32,
        datatype: u32,
        op: u32,
        comm: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, count, "MPI_Scan");
        let ctx = self.checked_ctx(comm)?;
        let chunk = self.chunk(count, datatype)?;
        let op = read_op(&self.memory, op)?;
        let (send_data, mut recv) = self.fold_buffers(send_buf, recv_buf, chunk.bytes())?;
        let send = match &send_data {
            Some(data) => BufferSource::Separate(data),
            None => BufferSource::InPlace,
        };
        ctx.scan(op, send, &mut recv, chunk.dtype, chunk.count)
            .await?;
        self.memory.write(recv_buf, &recv)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn alltoall(
        &mut self,
        send_buf: u32,
        send_count: u32,
        send_type: u32,
        recv_buf: u32,
        recv_count: u32,
        recv_type: u32,
        comm: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, send_count, recv_count, "MPI_Alltoall");
        let ctx = self.checked_ctx(comm)?;
        let in_place = send_buf == IN_PLACE;
        let chunk = self.chunk(recv_count, recv_type)?;
        if !in_place {
            same_extent(self.chunk(send_count, send_type)?, chunk)?;
        }
        let total = chunk.bytes() * ctx.size() as usize;
        let mut recv = self.memory.read_vec(recv_buf, total)?;
        let send_data = if in_place {
            Vec::new()
        } else {
            self.memory.read_vec(send_buf, total)?
        };
        let send = if in_place {
            BufferSource::InPlace
        } else {
            BufferSource::Separate(&send_data)
        };

        ctx.alltoall(send, &mut recv, chunk.dtype, chunk.count)
            .await?;
        self.memory.write(recv_buf, &recv)
    }

    /// Send data (`None` when in place) and receive buffer for the
    /// all-ranks folds.
    fn fold_buffers(
        &self,
        send_buf: u32,
        recv_buf: u32,
        nbytes: usize,
    ) -> Result<(Option<Vec<u8>>, Vec<u8>)> {
        let recv = self.memory.read_vec(recv_buf, nbytes)?;
        if send_buf == IN_PLACE {
            Ok((None, recv))
        } else {
            Ok((Some(self.memory.read_vec(send_buf, nbytes)?), recv))
        }
    }
}
