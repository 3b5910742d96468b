use crate::collective::helpers::{check_root, collective_recv, collective_send, require_len};
use crate::error::Result;
use crate::protocol::MessageKind;
use crate::types::{DataType, Rank};
use crate::world::WorldContext;
use futures::future::try_join_all;

/// Scatter: chunk *i* of root's `send` buffer lands in rank *i*'s `recv`.
///
/// Each chunk is `count` elements. `send` is only read on the root, which
/// copies its own chunk locally.
pub async fn scatter(
    ctx: &WorldContext,
    root: Rank,
    send: &[u8],
    recv: &mut [u8],
    dtype: DataType,
    count: usize,
) -> Result<()> {
    check_root(ctx, root)?;
    let world = ctx.size() as usize;
    let chunk_bytes = dtype.bytes_for(count);
    require_len(recv, chunk_bytes)?;

    if ctx.rank() == root {
        require_len(send, chunk_bytes * world)?;
        try_join_all((0..ctx.size()).filter(|&r| r != root).map(|r| {
            let off = r as usize * chunk_bytes;
            collective_send(
                ctx,
                r,
                MessageKind::Scatter,
                send[off..off + chunk_bytes].to_vec(),
                "scatter",
            )
        }))
        .await?;
        let own = root as usize * chunk_bytes;
        recv[..chunk_bytes].copy_from_slice(&send[own..own + chunk_bytes]);
    } else {
        let received =
            collective_recv(ctx, root, MessageKind::Scatter, chunk_bytes, "scatter").await?;
        recv[..chunk_bytes].copy_from_slice(&received);
    }
    Ok(())
}
