use crate::error::Result;
use crate::types::{BufferSource, DataType, Rank, ReduceOp};
use crate::world::WorldContext;

impl WorldContext {
    /// Block until every rank of the world has entered the barrier.
    pub async fn barrier(&self) -> Result<()> {
        tracing::trace!(rank = self.rank(), "barrier");
        crate::collective::barrier(self).await
    }

    /// Broadcast `count` elements of `buf` from `root`.
    pub async fn broadcast(
        &self,
        root: Rank,
        buf: &mut [u8],
        dtype: DataType,
        count: usize,
    ) -> Result<()> {
        tracing::trace!(rank = self.rank(), root, count, %dtype, "broadcast");
        crate::collective::broadcast(self, root, buf, dtype, count).await
    }

    /// Scatter `count`-element chunks of root's `send` buffer.
    pub async fn scatter(
        &self,
        root: Rank,
        send: &[u8],
        recv: &mut [u8],
        dtype: DataType,
        count: usize,
    ) -> Result<()> {
        tracing::trace!(rank = self.rank(), root, count, %dtype, "scatter");
        crate::collective::scatter(self, root, send, recv, dtype, count).await
    }

    /// Gather every rank's `count` elements into root's `recv`.
    pub async fn gather(
        &self,
        root: Rank,
        send: BufferSource<'_>,
        recv: &mut [u8],
        dtype: DataType,
        count: usize,
    ) -> Result<()> {
        tracing::trace!(rank = self.rank(), root, count, in_place = send.is_in_place(), "gather");
        crate::collective::gather(self, root, send, recv, dtype, count).await
    }

    pub async fn allgather(
        &self,
        send: BufferSource<'_>,
        recv: &mut [u8],
        dtype: DataType,
        count: usize,
    ) -> Result<()> {
        tracing::trace!(rank = self.rank(), count, in_place = send.is_in_place(), "allgather");
        crate::collective::allgather(self, send, recv, dtype, count).await
    }

    /// Reduce into root's `recv`, folding in ascending rank order.
    pub async fn reduce(
        &self,
        root: Rank,
        op: ReduceOp,
        send: BufferSource<'_>,
        recv: &mut [u8],
        dtype: DataType,
        count: usize,
    ) -> Result<()> {
        tracing::trace!(rank = self.rank(), root, %op, %dtype, count, "reduce");
        crate::collective::reduce(self, root, op, send, recv, dtype, count).await
    }

    pub async fn allreduce(
        &self,
        op: ReduceOp,
        send: BufferSource<'_>,
        recv: &mut [u8],
        dtype: DataType,
        count: usize,
    ) -> Result<()> {
        tracing::trace!(rank = self.rank(), %op, %dtype, count, "allreduce");
        crate::collective::allreduce(self, op, send, recv, dtype, count).await
    }

    /// Inclusive prefix reduction over ranks `0..=self.rank()`.
    pub async fn scan(
        &self,
        op: ReduceOp,
        send: BufferSource<'_>,
        recv: &mut [u8],
        dtype: DataType,
        count: usize,
    ) -> Result<()> {
        tracing::trace!(rank = self.rank(), %op, %dtype, count, "scan");
        crate::collective::scan(self, op, send, recv, dtype, count).await
    }

    pub async fn alltoall(
        &self,
        send: BufferSource<'_>,
        recv: &mut [u8],
        dtype: DataType,
        count: usize,
    ) -> Result<()> {
        tracing::trace!(rank = self.rank(), count, %dtype, "alltoall");
        crate::collective::alltoall(self, send, recv, dtype, count).await
    }
}
