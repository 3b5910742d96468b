use crate::collective::broadcast::broadcast_bytes;
use crate::collective::helpers::require_len;
use crate::collective::reduce::reduce_to_root;
use crate::error::Result;
use crate::protocol::MessageKind;
use crate::reduce::check_op;
use crate::types::{BufferSource, DataType, ReduceOp};
use crate::world::WorldContext;

/// Allreduce: every rank's `recv` receives the same rank-ordered reduction.
///
/// Reduces to rank 0, then broadcasts, which keeps the fold order identical
/// to [`reduce`](crate::collective::reduce).
pub async fn allreduce(
    ctx: &WorldContext,
    op: ReduceOp,
    send: BufferSource<'_>,
    recv: &mut [u8],
    dtype: DataType,
    count: usize,
) -> Result<()> {
    check_op(dtype, op)?;
    let nbytes = dtype.bytes_for(count);
    require_len(recv, nbytes)?;

    reduce_to_root(ctx, 0, op, send, recv, dtype, count, MessageKind::AllReduce).await?;
    broadcast_bytes(ctx, 0, &mut recv[..nbytes], MessageKind::AllReduce).await
}
