use crate::error::{MpiError, Result};
use crate::protocol::header::{HEADER_SIZE, Header};
use crate::protocol::message::MpiMessage;

/// Encode an `MpiMessage` into a framed byte buffer: `[header][rkyv payload]`.
pub fn encode_message(msg: &MpiMessage) -> Result<Vec<u8>> {
    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(msg)
        .map_err(|e| MpiError::EncodeFailed(e.to_string()))?;

    let payload_length = u32::try_from(payload.len()).map_err(|_| {
        MpiError::EncodeFailed(format!(
            "payload too large for framed header: {} bytes exceeds u32::MAX",
            payload.len()
        ))
    })?;

    let header = Header::new(payload_length, msg.kind);

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode the header at the start of `buf`.
pub fn decode_header(buf: &[u8]) -> Result<Header> {
    let header_bytes: &[u8; HEADER_SIZE] = buf
        .get(..HEADER_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            MpiError::DecodeFailed(format!("buffer too short: {} < {HEADER_SIZE}", buf.len()))
        })?;
    Header::decode(header_bytes)
        .ok_or_else(|| MpiError::DecodeFailed("invalid header: unknown version or kind".into()))
}

/// Decode an rkyv payload (without header) into an `MpiMessage`.
///
/// The bytes are copied into an aligned buffer first; frames read off a
/// stream carry no alignment guarantee.
pub fn decode_payload(payload: &[u8]) -> Result<MpiMessage> {
    let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(payload.len());
    aligned.extend_from_slice(payload);
    rkyv::from_bytes::<MpiMessage, rkyv::rancor::Error>(&aligned)
        .map_err(|e| MpiError::DecodeFailed(e.to_string()))
}

/// Decode a framed byte buffer back into a `(Header, MpiMessage)`.
pub fn decode_message(buf: &[u8]) -> Result<(Header, MpiMessage)> {
    let header = decode_header(buf)?;

    let payload_end = HEADER_SIZE + header.payload_length as usize;
    if buf.len() < payload_end {
        return Err(MpiError::DecodeFailed(format!(
            "buffer too short for payload: {} < {payload_end}",
            buf.len()
        )));
    }

    let msg = decode_payload(&buf[HEADER_SIZE..payload_end])?;
    if msg.kind != header.kind {
        return Err(MpiError::DecodeFailed(format!(
            "header kind {:?} disagrees with payload kind {:?}",
            header.kind, msg.kind
        )));
    }
    Ok((header, msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::MessageKind;

    #[test]
    fn test_encode_decode() {
        let msg = MpiMessage::new(1, 0, 3, 42, MessageKind::Normal, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let buf = encode_message(&msg).unwrap();
        let (header, decoded) = decode_message(&buf).unwrap();
        assert_eq!(header.kind, MessageKind::Normal);
        assert_eq!(header.payload_length as usize, buf.len() - HEADER_SIZE);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_decode_misaligned_frame() {
        let msg = MpiMessage::new(9, 2, 1, 0, MessageKind::AllToAll, vec![7; 100]);
        let buf = encode_message(&msg).unwrap();
        let mut shifted = vec![0u8];
        shifted.extend_from_slice(&buf);
        let (_, decoded) = decode_message(&shifted[1..]).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_decode_buffer_too_short() {
        let err = decode_message(&[0u8; 4]).unwrap_err().to_string();
        assert!(err.contains("too short"), "got: {err}");
    }

    #[test]
    fn test_decode_truncated_payload() {
        let msg = MpiMessage::new(1, 0, 1, 0, MessageKind::Reduce, vec![1; 16]);
        let mut buf = encode_message(&msg).unwrap();
        buf.truncate(HEADER_SIZE + 2);
        assert!(decode_message(&buf).is_err());
    }

    #[test]
    fn test_decode_kind_disagreement() {
        let msg = MpiMessage::new(1, 0, 1, 0, MessageKind::Reduce, vec![]);
        let mut buf = encode_message(&msg).unwrap();
        buf[5] = MessageKind::Scan as u8;
        assert!(decode_message(&buf).is_err());
    }
}
