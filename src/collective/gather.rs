use crate::collective::helpers::{
    check_root, collective_recv, collective_send, contribution, require_len,
};
use crate::error::Result;
use crate::protocol::MessageKind;
use crate::types::{BufferSource, DataType, Rank};
use crate::world::WorldContext;
use futures::future::try_join_all;

/// Gather: root's `recv` becomes the rank-ordered concatenation of every
/// rank's `count`-element contribution.
///
/// With [`BufferSource::InPlace`] a rank's contribution is read from its own
/// slice of `recv`, and the root leaves that slice untouched. Non-root
/// ranks need `recv` only when gathering in place.
pub async fn gather(
    ctx: &WorldContext,
    root: Rank,
    send: BufferSource<'_>,
    recv: &mut [u8],
    dtype: DataType,
    count: usize,
) -> Result<()> {
    check_root(ctx, root)?;
    gather_bytes(ctx, root, send, recv, dtype.bytes_for(count), MessageKind::Gather).await
}

pub(crate) async fn gather_bytes(
    ctx: &WorldContext,
    root: Rank,
    send: BufferSource<'_>,
    recv: &mut [u8],
    chunk_bytes: usize,
    kind: MessageKind,
) -> Result<()> {
    let rank = ctx.rank();
    let own_off = rank as usize * chunk_bytes;

    if rank != root {
        let data = contribution(send, recv, own_off, chunk_bytes)?;
        return collective_send(ctx, root, kind, data, "gather").await;
    }

    require_len(recv, chunk_bytes * ctx.size() as usize)?;
    if let BufferSource::Separate(buf) = send {
        require_len(buf, chunk_bytes)?;
        recv[own_off..own_off + chunk_bytes].copy_from_slice(&buf[..chunk_bytes]);
    }

    let peers: Vec<Rank> = (0..ctx.size()).filter(|&r| r != root).collect();
    let chunks = try_join_all(
        peers
            .iter()
            .map(|&r| collective_recv(ctx, r, kind, chunk_bytes, "gather")),
    )
    .await?;
    for (r, chunk) in peers.into_iter().zip(chunks) {
        let off = r as usize * chunk_bytes;
        recv[off..off + chunk_bytes].copy_from_slice(&chunk);
    }
    Ok(())
}
