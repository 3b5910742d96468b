use crate::collective::helpers::{collective_recv, collective_send, require_len};
use crate::error::Result;
use crate::protocol::MessageKind;
use crate::types::{BufferSource, DataType};
use crate::world::WorldContext;

/// All-to-all: chunk *j* of rank *i*'s send buffer lands in chunk *i* of
/// rank *j*'s `recv`.
///
/// Pairwise exchange: in step *s* every rank sends to `rank + s` and
/// receives from `rank - s`. In place, the outgoing chunks are staged
/// before the first receive overwrites `recv`.
pub async fn alltoall(
    ctx: &WorldContext,
    send: BufferSource<'_>,
    recv: &mut [u8],
    dtype: DataType,
    count: usize,
) -> Result<()> {
    let world = ctx.size() as usize;
    let rank = ctx.rank() as usize;
    let chunk_bytes = dtype.bytes_for(count);
    let total_bytes = chunk_bytes * world;
    require_len(recv, total_bytes)?;

    let self_off = rank * chunk_bytes;
    if let BufferSource::Separate(buf) = send {
        require_len(buf, total_bytes)?;
        recv[self_off..self_off + chunk_bytes]
            .copy_from_slice(&buf[self_off..self_off + chunk_bytes]);
    }

    let staged;
    let source: &[u8] = match send {
        BufferSource::Separate(buf) => buf,
        BufferSource::InPlace => {
            staged = recv[..total_bytes].to_vec();
            &staged
        }
    };

    for step in 1..world {
        let send_to = (rank + step) % world;
        let recv_from = (rank + world - step) % world;

        let send_off = send_to * chunk_bytes;
        let outgoing = source[send_off..send_off + chunk_bytes].to_vec();

        let (_, received) = tokio::try_join!(
            collective_send(
                ctx,
                send_to as u32,
                MessageKind::AllToAll,
                outgoing,
                "alltoall"
            ),
            collective_recv(
                ctx,
                recv_from as u32,
                MessageKind::AllToAll,
                chunk_bytes,
                "alltoall"
            ),
        )?;

        let recv_off = recv_from * chunk_bytes;
        recv[recv_off..recv_off + chunk_bytes].copy_from_slice(&received);
    }
    Ok(())
}
