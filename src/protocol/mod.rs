pub(crate) mod codec;
pub(crate) mod header;
mod message;

pub use codec::{decode_header, decode_message, decode_payload, encode_message};
pub use header::{HEADER_SIZE, Header, PROTOCOL_VERSION};
pub use message::{MessageKind, MpiMessage};
