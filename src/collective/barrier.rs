use crate::collective::helpers::{collective_recv, collective_send};
use crate::error::Result;
use crate::protocol::MessageKind;
use crate::world::WorldContext;
use futures::future::try_join_all;

/// Barrier: blocks until all ranks reach this point.
///
/// Every rank except 0 sends an empty join to rank 0; once rank 0 holds all
/// joins it releases everyone.
pub async fn barrier(ctx: &WorldContext) -> Result<()> {
    let world = ctx.size();
    if world <= 1 {
        return Ok(());
    }

    if ctx.rank() == 0 {
        try_join_all((1..world).map(|r| {
            collective_recv(ctx, r, MessageKind::BarrierJoin, 0, "barrier")
        }))
        .await?;
        try_join_all((1..world).map(|r| {
            collective_send(ctx, r, MessageKind::BarrierDone, Vec::new(), "barrier")
        }))
        .await?;
    } else {
        collective_send(ctx, 0, MessageKind::BarrierJoin, Vec::new(), "barrier").await?;
        collective_recv(ctx, 0, MessageKind::BarrierDone, 0, "barrier").await?;
    }
    Ok(())
}
