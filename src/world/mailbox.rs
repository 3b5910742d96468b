use crate::error::{MpiError, Result};
use crate::protocol::{MessageKind, MpiMessage};
use crate::types::{Rank, Tag};
use dashmap::DashMap;
use std::collections::VecDeque;
use tokio::sync::oneshot;

/// Matching key of a queue. Messages are FIFO within a key and unordered
/// across keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct MessageKey {
    pub sender: Rank,
    pub destination: Rank,
    pub tag: Tag,
    pub kind: MessageKind,
}

impl MessageKey {
    pub fn of(msg: &MpiMessage) -> Self {
        Self {
            sender: msg.sender,
            destination: msg.destination,
            tag: msg.tag,
            kind: msg.kind,
        }
    }
}

/// Queue state for one key, created lazily by whichever side touches it
/// first and removed once it holds nothing.
///
/// Messages wait in `queued` only while no receiver is posted; receivers
/// wait in `receivers` only while nothing is queued.
#[derive(Default)]
struct Bucket {
    queued: VecDeque<MpiMessage>,
    receivers: VecDeque<oneshot::Sender<MpiMessage>>,
    probes: Vec<oneshot::Sender<()>>,
}

impl Bucket {
    fn is_idle(&self) -> bool {
        self.queued.is_empty()
            && self.receivers.iter().all(|r| r.is_closed())
            && self.probes.iter().all(|p| p.is_closed())
    }
}

/// A receive that has taken its place in a key's queue.
///
/// Posting order decides which message a receive gets, not the order in
/// which receives are awaited.
pub(crate) enum Claim {
    Ready(MpiMessage),
    Waiting {
        rx: oneshot::Receiver<MpiMessage>,
        sender: Rank,
    },
}

impl Claim {
    pub async fn message(self) -> Result<MpiMessage> {
        match self {
            Claim::Ready(msg) => Ok(msg),
            Claim::Waiting { rx, sender } => rx
                .await
                .map_err(|_| MpiError::PeerDisconnected { rank: sender }),
        }
    }
}

/// Per-world message store for every locally placed destination rank.
///
/// Pushing never waits for a receiver. Receives on one key are matched in
/// the order they were posted.
#[derive(Default)]
pub(crate) struct Mailbox {
    buckets: DashMap<MessageKey, Bucket>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the bucket for `key` if nothing is queued or waiting on it.
    fn prune(&self, key: MessageKey) {
        self.buckets.remove_if(&key, |_, bucket| bucket.is_idle());
    }

    pub fn push(&self, mut msg: MpiMessage) {
        let key = MessageKey::of(&msg);
        let mut bucket = self.buckets.entry(key).or_default();
        loop {
            let Some(receiver) = bucket.receivers.pop_front() else {
                break;
            };
            match receiver.send(msg) {
                Ok(()) => {
                    drop(bucket);
                    self.prune(key);
                    return;
                }
                // Receiver was cancelled; offer the message to the next one.
                Err(back) => msg = back,
            }
        }
        bucket.queued.push_back(msg);
        for probe in bucket.probes.drain(..) {
            let _ = probe.send(());
        }
    }

    /// Post a receive for `key`. The oldest queued message is taken now;
    /// otherwise the receive queues behind any earlier ones.
    pub fn claim(&self, key: MessageKey) -> Claim {
        let mut bucket = self.buckets.entry(key).or_default();
        let oldest = bucket.queued.pop_front();
        if let Some(msg) = oldest {
            drop(bucket);
            self.prune(key);
            return Claim::Ready(msg);
        }
        let (tx, rx) = oneshot::channel();
        bucket.receivers.push_back(tx);
        Claim::Waiting {
            rx,
            sender: key.sender,
        }
    }

    /// Remove and return the oldest message for `key`, waiting for one.
    pub async fn take(&self, key: MessageKey) -> Result<MpiMessage> {
        self.claim(key).message().await
    }

    /// Wait until a message for `key` is queued and return its length
    /// without consuming it.
    pub async fn peek_len(&self, key: MessageKey) -> Result<usize> {
        loop {
            let queued = {
                let mut bucket = self.buckets.entry(key).or_default();
                if let Some(msg) = bucket.queued.front() {
                    return Ok(msg.payload.len());
                }
                let (tx, rx) = oneshot::channel();
                bucket.probes.push(tx);
                rx
            };
            queued
                .await
                .map_err(|_| MpiError::PeerDisconnected { rank: key.sender })?;
        }
    }

    /// Messages queued and not yet received, across all keys.
    pub fn pending(&self) -> usize {
        self.buckets.iter().map(|b| b.value().queued.len()).sum()
    }

    /// Number of keys currently holding state.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn msg(sender: Rank, tag: Tag, payload: Vec<u8>) -> MpiMessage {
        MpiMessage::new(1, sender, 0, tag, MessageKind::Normal, payload)
    }

    fn key(sender: Rank, tag: Tag) -> MessageKey {
        MessageKey {
            sender,
            destination: 0,
            tag,
            kind: MessageKind::Normal,
        }
    }

    #[tokio::test]
    async fn test_fifo_within_key() {
        let mb = Mailbox::new();
        for i in 0..5u8 {
            mb.push(msg(1, 7, vec![i]));
        }
        for i in 0..5u8 {
            assert_eq!(mb.take(key(1, 7)).await.unwrap().payload, vec![i]);
        }
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let mb = Mailbox::new();
        mb.push(msg(1, 1, vec![1]));
        mb.push(msg(1, 2, vec![2]));
        mb.push(msg(2, 1, vec![3]));
        assert_eq!(mb.take(key(2, 1)).await.unwrap().payload, vec![3]);
        assert_eq!(mb.take(key(1, 2)).await.unwrap().payload, vec![2]);
        assert_eq!(mb.take(key(1, 1)).await.unwrap().payload, vec![1]);
    }

    #[tokio::test]
    async fn test_kind_separates_queues() {
        let mb = Mailbox::new();
        mb.push(MpiMessage::new(1, 1, 0, 0, MessageKind::Reduce, vec![9]));
        let user = tokio::time::timeout(Duration::from_millis(50), mb.take(key(1, 0))).await;
        assert!(user.is_err(), "user receive must not see collective traffic");
    }

    #[tokio::test]
    async fn test_take_waits_for_push() {
        let mb = Arc::new(Mailbox::new());
        let waiter = {
            let mb = Arc::clone(&mb);
            tokio::spawn(async move { mb.take(key(3, 0)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        mb.push(msg(3, 0, vec![42]));
        assert_eq!(waiter.await.unwrap().unwrap().payload, vec![42]);
    }

    #[tokio::test]
    async fn test_peek_does_not_consume() {
        let mb = Mailbox::new();
        mb.push(msg(1, 0, vec![1, 2, 3]));
        mb.push(msg(1, 0, vec![4]));
        assert_eq!(mb.peek_len(key(1, 0)).await.unwrap(), 3);
        assert_eq!(mb.peek_len(key(1, 0)).await.unwrap(), 3);
        assert_eq!(mb.pending(), 2);
        assert_eq!(mb.take(key(1, 0)).await.unwrap().payload, vec![1, 2, 3]);
        assert_eq!(mb.take(key(1, 0)).await.unwrap().payload, vec![4]);
        assert_eq!(mb.pending(), 0);
    }

    #[tokio::test]
    async fn test_receives_match_in_post_order() {
        let mb = Mailbox::new();
        let first = mb.claim(key(1, 0));
        let second = mb.claim(key(1, 0));
        mb.push(msg(1, 0, vec![1]));
        mb.push(msg(1, 0, vec![2]));
        assert_eq!(second.message().await.unwrap().payload, vec![2]);
        assert_eq!(first.message().await.unwrap().payload, vec![1]);
    }

    #[tokio::test]
    async fn test_queued_message_claimed_at_post_time() {
        let mb = Mailbox::new();
        mb.push(msg(1, 0, vec![1]));
        mb.push(msg(1, 0, vec![2]));
        let early = mb.claim(key(1, 0));
        assert_eq!(mb.take(key(1, 0)).await.unwrap().payload, vec![2]);
        assert_eq!(early.message().await.unwrap().payload, vec![1]);
    }

    #[tokio::test]
    async fn test_cancelled_receive_is_skipped() {
        let mb = Mailbox::new();
        drop(mb.claim(key(1, 0)));
        let live = mb.claim(key(1, 0));
        mb.push(msg(1, 0, vec![7]));
        assert_eq!(live.message().await.unwrap().payload, vec![7]);
        assert_eq!(mb.pending(), 0);
    }

    #[tokio::test]
    async fn test_probe_waits_for_push() {
        let mb = Arc::new(Mailbox::new());
        let probe = {
            let mb = Arc::clone(&mb);
            tokio::spawn(async move { mb.peek_len(key(2, 5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!probe.is_finished());
        mb.push(msg(2, 5, vec![0; 6]));
        assert_eq!(probe.await.unwrap().unwrap(), 6);
        assert_eq!(mb.pending(), 1);
    }

    #[tokio::test]
    async fn test_drained_keys_release_state() {
        let mb = Mailbox::new();
        for tag in 0..100 {
            mb.push(msg(1, tag, vec![tag as u8]));
        }
        assert_eq!(mb.bucket_count(), 100);
        for tag in 0..100 {
            mb.take(key(1, tag)).await.unwrap();
        }
        assert_eq!(mb.bucket_count(), 0);

        let waiting = mb.claim(key(1, 0));
        assert_eq!(mb.bucket_count(), 1);
        mb.push(msg(1, 0, vec![1]));
        waiting.message().await.unwrap();
        assert_eq!(mb.bucket_count(), 0);
    }
}
