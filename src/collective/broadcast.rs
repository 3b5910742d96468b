use crate::collective::helpers::{check_root, collective_recv, collective_send, require_len};
use crate::error::Result;
use crate::protocol::MessageKind;
use crate::types::{DataType, Rank};
use crate::world::WorldContext;
use futures::future::try_join_all;

/// Threshold: use flat broadcast for small worlds, tree broadcast for larger.
const TREE_BROADCAST_THRESHOLD: u32 = 4;

/// Broadcast `count` elements of `buf` from `root` to every rank.
pub async fn broadcast(
    ctx: &WorldContext,
    root: Rank,
    buf: &mut [u8],
    dtype: DataType,
    count: usize,
) -> Result<()> {
    check_root(ctx, root)?;
    let nbytes = dtype.bytes_for(count);
    require_len(buf, nbytes)?;
    broadcast_bytes(ctx, root, &mut buf[..nbytes], MessageKind::Broadcast).await
}

/// Broadcast the whole of `buf`, on messages of `kind`.
pub(crate) async fn broadcast_bytes(
    ctx: &WorldContext,
    root: Rank,
    buf: &mut [u8],
    kind: MessageKind,
) -> Result<()> {
    let world = ctx.size();
    if world <= 1 {
        return Ok(());
    }
    if world < TREE_BROADCAST_THRESHOLD {
        flat_broadcast(ctx, root, buf, kind).await
    } else {
        tree_broadcast(ctx, root, buf, kind).await
    }
}

/// Root sends to every other rank directly.
async fn flat_broadcast(
    ctx: &WorldContext,
    root: Rank,
    buf: &mut [u8],
    kind: MessageKind,
) -> Result<()> {
    if ctx.rank() == root {
        let data = &*buf;
        try_join_all(
            (0..ctx.size())
                .filter(|&r| r != root)
                .map(|r| collective_send(ctx, r, kind, data.to_vec(), "broadcast")),
        )
        .await?;
    } else {
        let received = collective_recv(ctx, root, kind, buf.len(), "broadcast").await?;
        buf.copy_from_slice(&received);
    }
    Ok(())
}

/// Binary tree over logical ranks, with `root` remapped to logical rank 0.
async fn tree_broadcast(
    ctx: &WorldContext,
    root: Rank,
    buf: &mut [u8],
    kind: MessageKind,
) -> Result<()> {
    let world = ctx.size();
    let logical = |r: Rank| -> Rank { (r + world - root) % world };
    let physical = |l: Rank| -> Rank { (l + root) % world };
    let me = logical(ctx.rank());

    if me != 0 {
        let parent = physical((me - 1) / 2);
        let received = collective_recv(ctx, parent, kind, buf.len(), "broadcast").await?;
        buf.copy_from_slice(&received);
    }

    let data = &*buf;
    try_join_all(
        [2 * me + 1, 2 * me + 2]
            .into_iter()
            .filter(|&child| child < world)
            .map(|child| collective_send(ctx, physical(child), kind, data.to_vec(), "broadcast")),
    )
    .await?;
    Ok(())
}
