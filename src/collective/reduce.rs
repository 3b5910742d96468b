use crate::collective::helpers::{
    check_root, collective_recv, collective_send, contribution, require_len,
};
use crate::error::Result;
use crate::protocol::MessageKind;
use crate::reduce::{check_op, reduce_slice};
use crate::types::{BufferSource, DataType, Rank, ReduceOp};
use crate::world::WorldContext;
use futures::future::try_join_all;

/// Reduce: root's `recv` becomes `op` applied element-wise across every
/// rank's contribution.
///
/// Contributions are folded in ascending rank order
/// (`acc = c0; acc = op(acc, c1); ...`) so floating-point results are
/// reproducible. With [`BufferSource::InPlace`] the root's contribution is
/// read from `recv`.
#[allow(clippy::too_many_arguments)]
pub async fn reduce(
    ctx: &WorldContext,
    root: Rank,
    op: ReduceOp,
    send: BufferSource<'_>,
    recv: &mut [u8],
    dtype: DataType,
    count: usize,
) -> Result<()> {
    check_root(ctx, root)?;
    check_op(dtype, op)?;
    reduce_to_root(ctx, root, op, send, recv, dtype, count, MessageKind::Reduce).await
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn reduce_to_root(
    ctx: &WorldContext,
    root: Rank,
    op: ReduceOp,
    send: BufferSource<'_>,
    recv: &mut [u8],
    dtype: DataType,
    count: usize,
    kind: MessageKind,
) -> Result<()> {
    let nbytes = dtype.bytes_for(count);

    if ctx.rank() != root {
        let data = contribution(send, recv, 0, nbytes)?;
        return collective_send(ctx, root, kind, data, "reduce").await;
    }

    require_len(recv, nbytes)?;
    let stashed;
    let own: &[u8] = match send {
        BufferSource::Separate(buf) => {
            require_len(buf, nbytes)?;
            &buf[..nbytes]
        }
        // The receive buffer is about to hold the running fold, so a non-zero
        // root keeps its own contribution aside.
        BufferSource::InPlace if root != 0 => {
            stashed = recv[..nbytes].to_vec();
            &stashed
        }
        BufferSource::InPlace => &[],
    };

    let peers: Vec<Rank> = (0..ctx.size()).filter(|&r| r != root).collect();
    let received = try_join_all(
        peers
            .iter()
            .map(|&r| collective_recv(ctx, r, kind, nbytes, "reduce")),
    )
    .await?;

    let acc = &mut recv[..nbytes];
    if !(root == 0 && send.is_in_place()) {
        acc.copy_from_slice(contribution_of(0, root, own, &received));
    }
    for r in 1..ctx.size() {
        reduce_slice(acc, contribution_of(r, root, own, &received), count, dtype, op)?;
    }
    Ok(())
}

/// Rank `r`'s contribution; `received` holds every rank but the root, in
/// rank order.
fn contribution_of<'a>(r: Rank, root: Rank, own: &'a [u8], received: &'a [Vec<u8>]) -> &'a [u8] {
    match r.cmp(&root) {
        std::cmp::Ordering::Equal => own,
        std::cmp::Ordering::Less => &received[r as usize],
        std::cmp::Ordering::Greater => &received[r as usize - 1],
    }
}
