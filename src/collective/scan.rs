use crate::collective::helpers::{collective_recv, collective_send, contribution, require_len};
use crate::error::Result;
use crate::protocol::MessageKind;
use crate::reduce::{check_op, reduce_slice};
use crate::types::{BufferSource, DataType, ReduceOp};
use crate::world::WorldContext;

/// Inclusive scan: rank *i*'s `recv` holds the reduction of ranks `0..=i`.
///
/// Linear chain: rank *i* receives the prefix of ranks `0..i` from rank
/// *i - 1*, folds its own contribution onto it and forwards the result.
pub async fn scan(
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
    let rank = ctx.rank();

    let acc = if rank == 0 {
        contribution(send, recv, 0, nbytes)?
    } else {
        let mut prefix =
            collective_recv(ctx, rank - 1, MessageKind::Scan, nbytes, "scan").await?;
        let own: &[u8] = match send {
            BufferSource::Separate(buf) => {
                require_len(buf, nbytes)?;
                &buf[..nbytes]
            }
            BufferSource::InPlace => &recv[..nbytes],
        };
        reduce_slice(&mut prefix, own, count, dtype, op)?;
        prefix
    };

    recv[..nbytes].copy_from_slice(&acc);
    if rank + 1 < ctx.size() {
        collective_send(ctx, rank + 1, MessageKind::Scan, acc, "scan").await?;
    }
    Ok(())
}
