use crate::collective::broadcast::broadcast_bytes;
use crate::collective::gather::gather_bytes;
use crate::collective::helpers::require_len;
use crate::error::Result;
use crate::protocol::MessageKind;
use crate::types::{BufferSource, DataType};
use crate::world::WorldContext;

/// Allgather: every rank ends with the rank-ordered concatenation of all
/// contributions. Gathers to rank 0, then broadcasts the result.
pub async fn allgather(
    ctx: &WorldContext,
    send: BufferSource<'_>,
    recv: &mut [u8],
    dtype: DataType,
    count: usize,
) -> Result<()> {
    let chunk_bytes = dtype.bytes_for(count);
    let total = chunk_bytes * ctx.size() as usize;
    require_len(recv, total)?;

    gather_bytes(ctx, 0, send, recv, chunk_bytes, MessageKind::AllGather).await?;
    broadcast_bytes(ctx, 0, &mut recv[..total], MessageKind::AllGather).await
}
