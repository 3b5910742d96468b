use crate::error::Result;
use crate::host::handles::{MPI_ERR_COUNT, MPI_SUCCESS, STATUS_BYTES, read_dtype, read_status, write_status};
use crate::host::{GuestMemory, MpiHost, STATUS_IGNORE};
use crate::types::{Rank, Tag};
use crate::world::{Completion, RequestId, WorldContext};

impl<M: GuestMemory> MpiHost<M> {
    pub async fn send(
        &mut self,
        buf: u32,
        count: u32,
        datatype: u32,
        dest: Rank,
        tag: Tag,
        comm: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, buf, count, dest, tag, "MPI_Send");
        let ctx = self.checked_ctx(comm)?;
        let chunk = self.chunk(count, datatype)?;
        let data = self.memory.read_vec(buf, chunk.bytes())?;
        ctx.send(dest, tag, &data, chunk.dtype, chunk.count).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn recv(
        &mut self,
        buf: u32,
        count: u32,
        datatype: u32,
        source: Rank,
        tag: Tag,
        comm: u32,
        status_ptr: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, buf, count, source, tag, "MPI_Recv");
        let ctx = self.checked_ctx(comm)?;
        let chunk = self.chunk(count, datatype)?;
        let mut data = self.memory.read_vec(buf, chunk.bytes())?;
        let status = ctx
            .recv(source, tag, &mut data, chunk.dtype, chunk.count)
            .await?;
        self.memory.write(buf, &data[..status.bytes])?;
        write_status(&mut self.memory, status_ptr, &status)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn isend(
        &mut self,
        buf: u32,
        count: u32,
        datatype: u32,
        dest: Rank,
        tag: Tag,
        comm: u32,
        request_ptr: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, buf, count, dest, tag, "MPI_Isend");
        let ctx = self.checked_ctx(comm)?;
        let chunk = self.chunk(count, datatype)?;
        let data = self.memory.read_vec(buf, chunk.bytes())?;
        let id = ctx.isend(dest, tag, &data, chunk.dtype, chunk.count)?;
        self.memory.write_i32(request_ptr, id.as_raw())
    }

    /// Post a receive into `buf`; the data lands there when the request is
    /// waited on.
    #[allow(clippy::too_many_arguments)]
    pub fn irecv(
        &mut self,
        buf: u32,
        count: u32,
        datatype: u32,
        source: Rank,
        tag: Tag,
        comm: u32,
        request_ptr: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, buf, count, source, tag, "MPI_Irecv");
        let ctx = self.checked_ctx(comm)?;
        let chunk = self.chunk(count, datatype)?;
        self.memory.read_vec(buf, chunk.bytes())?;
        let id = ctx.irecv(source, tag, chunk.dtype, chunk.count)?;
        self.pending_recvs.insert(id, buf);
        self.memory.write_i32(request_ptr, id.as_raw())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn sendrecv(
        &mut self,
        send_buf: u32,
        send_count: u32,
        send_type: u32,
        dest: Rank,
        send_tag: Tag,
        recv_buf: u32,
        recv_count: u32,
        recv_type: u32,
        source: Rank,
        recv_tag: Tag,
        comm: u32,
        status_ptr: u32,
    ) -> Result<()> {
        tracing::trace!(
            rank = self.call.rank,
            dest,
            send_tag,
            source,
            recv_tag,
            "MPI_Sendrecv"
        );
        let ctx = self.checked_ctx(comm)?;
        let send = self.chunk(send_count, send_type)?;
        let recv = self.chunk(recv_count, recv_type)?;
        let send_data = self.memory.read_vec(send_buf, send.bytes())?;
        let mut recv_data = self.memory.read_vec(recv_buf, recv.bytes())?;
        let status = ctx
            .send_recv(
                &send_data,
                send.count,
                send.dtype,
                dest,
                send_tag,
                &mut recv_data,
                recv.count,
                recv.dtype,
                source,
                recv_tag,
            )
            .await?;
        self.memory.write(recv_buf, &recv_data[..status.bytes])?;
        write_status(&mut self.memory, status_ptr, &status)
    }

    /// Number of whole elements described by the status at `status_ptr`.
    ///
    /// Returns [`MPI_ERR_COUNT`] without writing a count when the byte count
    /// is not a multiple of the element size.
    pub fn get_count(&mut self, status_ptr: u32, datatype: u32, count_ptr: u32) -> Result<i32> {
        tracing::trace!(rank = self.call.rank, status_ptr, datatype, count_ptr, "MPI_Get_count");
        let status = read_status(&self.memory, status_ptr)?;
        let dtype = read_dtype(&self.memory, datatype)?;
        match status.get_count(dtype) {
            Ok(count) => {
                self.memory.write_i32(count_ptr, count as i32)?;
                Ok(MPI_SUCCESS)
            }
            Err(e) if e.is_recoverable() => {
                tracing::error!(error = %e, "incomplete message");
                Ok(MPI_ERR_COUNT)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn wait(&mut self, request_ptr: u32, status_ptr: u32) -> Result<()> {
        let id = RequestId::from_raw(self.memory.read_i32(request_ptr)?);
        tracing::trace!(rank = self.call.rank, request_ptr, %id, "MPI_Wait");
        let ctx = self.ctx()?;
        self.complete(&ctx, id, status_ptr).await
    }

    /// Wait for `count` requests read from `requests_ptr`, in order. Statuses
    /// are written to consecutive slots at `statuses_ptr`.
    pub async fn waitall(&mut self, count: u32, requests_ptr: u32, statuses_ptr: u32) -> Result<()> {
        tracing::trace!(rank = self.call.rank, count, requests_ptr, "MPI_Waitall");
        let ctx = self.ctx()?;
        let ids = self.memory.read_i32s(requests_ptr, count as usize)?;
        for (i, raw) in ids.into_iter().enumerate() {
            let status_ptr = if statuses_ptr == STATUS_IGNORE {
                STATUS_IGNORE
            } else {
                statuses_ptr + (i * STATUS_BYTES) as u32
            };
            self.complete(&ctx, RequestId::from_raw(raw), status_ptr)
                .await?;
        }
        Ok(())
    }

    async fn complete(&mut self, ctx: &WorldContext, id: RequestId, status_ptr: u32) -> Result<()> {
        let target = self.pending_recvs.remove(&id);
        let completion = ctx.wait(id).await?;
        if let (Some(addr), Completion::Received { data, .. }) = (target, &completion) {
            self.memory.write(addr, data)?;
        }
        write_status(&mut self.memory, status_ptr, &completion.status())
    }

    pub async fn probe(&mut self, source: Rank, tag: Tag, comm: u32, status_ptr: u32) -> Result<()> {
        tracing::trace!(rank = self.call.rank, source, tag, "MPI_Probe");
        let ctx = self.checked_ctx(comm)?;
        let status = ctx.probe(source, tag).await?;
        write_status(&mut self.memory, status_ptr, &status)
    }
}
