use crate::types::{Rank, Tag, WorldId};

/// Which traffic class a message belongs to.
///
/// User point-to-point messages and each collective's internal messages
/// live in separate queues, so a collective never consumes a user message
/// that happens to share a tag.
#[derive(
    rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
#[repr(u8)]
pub enum MessageKind {
    Normal = 0,
    BarrierJoin = 1,
    BarrierDone = 2,
    Broadcast = 3,
    Scatter = 4,
    Gather = 5,
    AllGather = 6,
    Reduce = 7,
    AllReduce = 8,
    Scan = 9,
    AllToAll = 10,
}

impl MessageKind {
    const ALL: [MessageKind; 11] = [
        MessageKind::Normal,
        MessageKind::BarrierJoin,
        MessageKind::BarrierDone,
        MessageKind::Broadcast,
        MessageKind::Scatter,
        MessageKind::Gather,
        MessageKind::AllGather,
        MessageKind::Reduce,
        MessageKind::AllReduce,
        MessageKind::Scan,
        MessageKind::AllToAll,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| *k as u8 == v)
    }
}

/// Envelope for every rank-to-rank transfer.
///
/// The payload is the raw element bytes; datatype and count are not carried
/// because the receiver supplies its own.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub struct MpiMessage {
    pub world_id: WorldId,
    pub sender: Rank,
    pub destination: Rank,
    pub tag: Tag,
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

impl MpiMessage {
    pub fn new(
        world_id: WorldId,
        sender: Rank,
        destination: Rank,
        tag: Tag,
        kind: MessageKind,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            world_id,
            sender,
            destination,
            tag,
            kind,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_rkyv_roundtrip() {
        let msg = MpiMessage::new(3, 1, 2, -7, MessageKind::Scan, vec![1, 2, 3, 4]);
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&msg).unwrap();
        let back: MpiMessage = rkyv::from_bytes::<MpiMessage, rkyv::rancor::Error>(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_kind_from_u8() {
        assert_eq!(MessageKind::from_u8(0), Some(MessageKind::Normal));
        assert_eq!(MessageKind::from_u8(10), Some(MessageKind::AllToAll));
        assert_eq!(MessageKind::from_u8(11), None);
    }
}
