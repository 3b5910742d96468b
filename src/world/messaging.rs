use crate::error::{MpiError, Result};
use crate::protocol::{MessageKind, MpiMessage};
use crate::types::{DataType, Rank, Tag};
use crate::world::mailbox::MessageKey;
use crate::world::request::join_request;
use crate::world::{Completion, RequestId, Status, WorldContext};

/// Check that `buf` can hold `count` elements of `dtype`; returns the byte
/// length of that many elements.
pub(crate) fn checked_len(buf_len: usize, dtype: DataType, count: usize) -> Result<usize> {
    let nbytes = dtype.bytes_for(count);
    if buf_len < nbytes {
        return Err(MpiError::BufferSizeMismatch {
            expected: nbytes,
            actual: buf_len,
        });
    }
    Ok(nbytes)
}

/// Copy as much of `payload` as fits in `capacity` bytes of `buf`.
fn copy_truncated(payload: &[u8], buf: &mut [u8], capacity: usize) -> usize {
    let n = payload.len().min(capacity);
    buf[..n].copy_from_slice(&payload[..n]);
    n
}

impl WorldContext {
    /// Hand a message to the destination's mailbox or the transport.
    pub(crate) async fn send_kind(
        &self,
        dest: Rank,
        tag: Tag,
        kind: MessageKind,
        payload: Vec<u8>,
    ) -> Result<()> {
        let msg = MpiMessage::new(self.world_id(), self.rank(), dest, tag, kind, payload);
        self.world().dispatch(msg).await
    }

    fn key_from(&self, source: Rank, tag: Tag, kind: MessageKind) -> MessageKey {
        MessageKey {
            sender: source,
            destination: self.rank(),
            tag,
            kind,
        }
    }

    /// Wait for the next message from `source` on (`tag`, `kind`).
    pub(crate) async fn recv_kind(
        &self,
        source: Rank,
        tag: Tag,
        kind: MessageKind,
    ) -> Result<MpiMessage> {
        let key = self.key_from(source, tag, kind);
        self.world().mailbox().take(key).await
    }

    /// Blocking send of `count` elements of `dtype` from `buf` to `dest`.
    ///
    /// Returns once the message is queued locally or handed to the
    /// transport; no acknowledgement is awaited.
    pub async fn send(
        &self,
        dest: Rank,
        tag: Tag,
        buf: &[u8],
        dtype: DataType,
        count: usize,
    ) -> Result<()> {
        self.world().check_rank(dest)?;
        let nbytes = checked_len(buf.len(), dtype, count)?;
        tracing::trace!(rank = self.rank(), dest, tag, nbytes, "send");
        self.send_kind(dest, tag, MessageKind::Normal, buf[..nbytes].to_vec())
            .await
    }

    /// Blocking receive of up to `count` elements of `dtype` into `buf`.
    ///
    /// A longer message is truncated to the posted capacity without error;
    /// the status reports the bytes actually copied.
    pub async fn recv(
        &self,
        source: Rank,
        tag: Tag,
        buf: &mut [u8],
        dtype: DataType,
        count: usize,
    ) -> Result<Status> {
        self.world().check_rank(source)?;
        let capacity = checked_len(buf.len(), dtype, count)?;
        let msg = self.recv_kind(source, tag, MessageKind::Normal).await?;
        let bytes = copy_truncated(&msg.payload, buf, capacity);
        tracing::trace!(rank = self.rank(), source, tag, bytes, "recv");
        Ok(Status::new(source, tag, bytes))
    }

    /// Non-blocking send. The buffer is copied before this returns.
    pub fn isend(
        &self,
        dest: Rank,
        tag: Tag,
        buf: &[u8],
        dtype: DataType,
        count: usize,
    ) -> Result<RequestId> {
        self.world().check_rank(dest)?;
        let nbytes = checked_len(buf.len(), dtype, count)?;
        let payload = buf[..nbytes].to_vec();
        let ctx = self.clone();
        let task = tokio::spawn(async move {
            ctx.send_kind(dest, tag, MessageKind::Normal, payload).await?;
            Ok(Completion::Sent {
                status: Status::new(ctx.rank(), tag, nbytes),
            })
        });
        let id = self.world().requests().insert(task);
        tracing::trace!(rank = self.rank(), dest, tag, %id, "isend");
        Ok(id)
    }

    /// Non-blocking receive of up to `count` elements of `dtype`.
    ///
    /// The receive is matched in posting order: a later `recv` or `irecv`
    /// on the same source and tag cannot overtake it. The data is delivered
    /// by [`wait`](Self::wait) or copied into a buffer by
    /// [`wait_recv`](Self::wait_recv).
    pub fn irecv(
        &self,
        source: Rank,
        tag: Tag,
        dtype: DataType,
        count: usize,
    ) -> Result<RequestId> {
        self.world().check_rank(source)?;
        let capacity = dtype.bytes_for(count);
        let claim = self
            .world()
            .mailbox()
            .claim(self.key_from(source, tag, MessageKind::Normal));
        let task = tokio::spawn(async move {
            let mut msg = claim.message().await?;
            msg.payload.truncate(capacity);
            Ok(Completion::Received {
                status: Status::new(source, tag, msg.payload.len()),
                data: msg.payload,
            })
        });
        let id = self.world().requests().insert(task);
        tracing::trace!(rank = self.rank(), source, tag, %id, "irecv");
        Ok(id)
    }

    /// Wait for a request to finish. Each request can be waited on once.
    pub async fn wait(&self, id: RequestId) -> Result<Completion> {
        let task = self.world().requests().take(id)?;
        join_request(id, task).await
    }

    /// Wait for a request and copy any received data into `buf`.
    pub async fn wait_recv(&self, id: RequestId, buf: &mut [u8]) -> Result<Status> {
        match self.wait(id).await? {
            Completion::Sent { status } => Ok(status),
            Completion::Received { status, data } => {
                if buf.len() < data.len() {
                    return Err(MpiError::BufferSizeMismatch {
                        expected: data.len(),
                        actual: buf.len(),
                    });
                }
                buf[..data.len()].copy_from_slice(&data);
                Ok(status)
            }
        }
    }

    /// Wait for every request in `ids`, in order.
    pub async fn wait_all(&self, ids: &[RequestId]) -> Result<Vec<Completion>> {
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            out.push(self.wait(id).await?);
        }
        Ok(out)
    }

    /// Wait until a message from `source` with `tag` is available, without
    /// receiving it. The status reports the full message length.
    pub async fn probe(&self, source: Rank, tag: Tag) -> Result<Status> {
        self.world().check_rank(source)?;
        let key = self.key_from(source, tag, MessageKind::Normal);
        let bytes = self.world().mailbox().peek_len(key).await?;
        Ok(Status::new(source, tag, bytes))
    }

    /// Send to `dest` and receive from `source` concurrently.
    ///
    /// Both halves are ordinary point-to-point traffic, so the peer may
    /// answer with plain `recv` and `send` calls.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_recv(
        &self,
        send_buf: &[u8],
        send_count: usize,
        send_dtype: DataType,
        dest: Rank,
        send_tag: Tag,
        recv_buf: &mut [u8],
        recv_count: usize,
        recv_dtype: DataType,
        source: Rank,
        recv_tag: Tag,
    ) -> Result<Status> {
        self.world().check_rank(dest)?;
        self.world().check_rank(source)?;
        let send_bytes = checked_len(send_buf.len(), send_dtype, send_count)?;
        let capacity = checked_len(recv_buf.len(), recv_dtype, recv_count)?;

        let payload = send_buf[..send_bytes].to_vec();
        let (_, msg) = tokio::try_join!(
            self.send_kind(dest, send_tag, MessageKind::Normal, payload),
            self.recv_kind(source, recv_tag, MessageKind::Normal),
        )?;
        let bytes = copy_truncated(&msg.payload, recv_buf, capacity);
        tracing::trace!(rank = self.rank(), dest, source, bytes, "sendrecv");
        Ok(Status::new(source, recv_tag, bytes))
    }
}
