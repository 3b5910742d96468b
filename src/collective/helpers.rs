use crate::error::{MpiError, Result};
use crate::protocol::MessageKind;
use crate::types::{BufferSource, Rank, Tag};
use crate::world::WorldContext;

/// Tag used for all collective-internal traffic. Collectives are told apart
/// by message kind, and successive collectives by per-key FIFO order.
pub(crate) const COLLECTIVE_TAG: Tag = 0;

/// Send bytes to a peer, wrapping errors as `CollectiveFailed`.
pub(crate) async fn collective_send(
    ctx: &WorldContext,
    dest: Rank,
    kind: MessageKind,
    data: Vec<u8>,
    operation: &'static str,
) -> Result<()> {
    ctx.send_kind(dest, COLLECTIVE_TAG, kind, data)
        .await
        .map_err(|e| MpiError::CollectiveFailed {
            operation,
            rank: dest,
            reason: e.to_string(),
        })
}

/// Receive exactly `expected` bytes from a peer.
pub(crate) async fn collective_recv(
    ctx: &WorldContext,
    src: Rank,
    kind: MessageKind,
    expected: usize,
    operation: &'static str,
) -> Result<Vec<u8>> {
    let msg = ctx
        .recv_kind(src, COLLECTIVE_TAG, kind)
        .await
        .map_err(|e| MpiError::CollectiveFailed {
            operation,
            rank: src,
            reason: e.to_string(),
        })?;
    if msg.payload.len() != expected {
        return Err(MpiError::BufferSizeMismatch {
            expected,
            actual: msg.payload.len(),
        });
    }
    Ok(msg.payload)
}

pub(crate) fn check_root(ctx: &WorldContext, root: Rank) -> Result<()> {
    if root < ctx.size() {
        Ok(())
    } else {
        Err(MpiError::InvalidRank {
            rank: root,
            world_size: ctx.size(),
        })
    }
}

/// Fail unless `buf` holds at least `needed` bytes.
pub(crate) fn require_len(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        Err(MpiError::BufferSizeMismatch {
            expected: needed,
            actual: buf.len(),
        })
    } else {
        Ok(())
    }
}

/// The caller's own contribution of `len` bytes. In-place callers supply it
/// at `offset` in their receive buffer.
pub(crate) fn contribution(
    send: BufferSource<'_>,
    recv: &[u8],
    offset: usize,
    len: usize,
) -> Result<Vec<u8>> {
    let src = match send {
        BufferSource::Separate(buf) => buf,
        BufferSource::InPlace => recv.get(offset..).unwrap_or_default(),
    };
    require_len(src, len)?;
    Ok(src[..len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contribution_separate() {
        let recv = [9u8; 8];
        let got = contribution(BufferSource::Separate(&[1, 2, 3, 4]), &recv, 4, 4).unwrap();
        assert_eq!(got, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_contribution_in_place_reads_own_slice() {
        let recv = [0, 0, 0, 0, 5, 6, 7, 8];
        let got = contribution(BufferSource::InPlace, &recv, 4, 4).unwrap();
        assert_eq!(got, vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_contribution_bounds() {
        let recv = [0u8; 6];
        assert!(contribution(BufferSource::InPlace, &recv, 4, 4).is_err());
        assert!(contribution(BufferSource::InPlace, &recv, 10, 1).is_err());
        assert!(contribution(BufferSource::Separate(&[1]), &recv, 0, 2).is_err());
    }
}
