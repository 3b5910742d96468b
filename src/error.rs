use crate::types::{DataType, Rank, ReduceOp, WorldId};

pub type Result<T> = std::result::Result<T, MpiError>;

#[derive(Debug, thiserror::Error)]
pub enum MpiError {
    #[error("{operation} is not supported")]
    Unsupported { operation: &'static str },

    #[error("unrecognised communicator {id}")]
    InvalidCommunicator { id: i32 },

    #[error("world {world_id} does not exist")]
    UnknownWorld { world_id: WorldId },

    #[error("world {world_id} already exists")]
    WorldExists { world_id: WorldId },

    #[error("invalid rank {rank}: world size is {world_size}")]
    InvalidRank { rank: Rank, world_size: u32 },

    #[error("rank {rank} of world {world_id} is placed on host {host}, not here")]
    RankNotLocal {
        world_id: WorldId,
        rank: Rank,
        host: String,
    },

    #[error("rank {rank} already joined world {world_id}")]
    RankAlreadyJoined { world_id: WorldId, rank: Rank },

    #[error("unknown datatype id {id}")]
    UnknownDataType { id: i32 },

    #[error("unknown reduction operator id {id}")]
    UnknownOp { id: i32 },

    #[error("unsupported data type: {dtype} for operation {op}")]
    UnsupportedDType { dtype: DataType, op: ReduceOp },

    #[error("incomplete message: {bytes} bytes is not a multiple of {dtype} size {elem_size}")]
    SizeMismatch {
        bytes: usize,
        dtype: DataType,
        elem_size: usize,
    },

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("request {id} is not pending")]
    UnknownRequest { id: u32 },

    #[error("invalid cartesian dimensions: {0}")]
    InvalidDimensions(String),

    #[error("invalid cartesian coordinates {coords:?}")]
    InvalidCoordinates { coords: Vec<i32> },

    #[error("MPI has not been initialised for this rank")]
    NotInitialized,

    #[error("failed to grow guest memory by {requested} bytes")]
    ResourceExhausted { requested: usize },

    #[error("guest memory access out of bounds: {len} bytes at {addr:#x}")]
    GuestMemory { addr: u32, len: usize },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("message encode failed: {0}")]
    EncodeFailed(String),

    #[error("message decode failed: {0}")]
    DecodeFailed(String),

    #[error("peer rank {rank} disconnected")]
    PeerDisconnected { rank: Rank },

    #[error("{operation} failed at rank {rank}: {reason}")]
    CollectiveFailed {
        operation: &'static str,
        rank: Rank,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MpiError {
    /// Create an `Unsupported` error for the named operation.
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// Create a `Transport` error with just a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Transport` error with a message and a source error.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for errors the caller is expected to recover from.
    ///
    /// Only a byte count that does not divide into whole elements is
    /// recoverable; everything else denotes misuse or a broken world.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SizeMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_display() {
        let e = MpiError::unsupported("MPI_Comm_split");
        assert_eq!(e.to_string(), "MPI_Comm_split is not supported");
    }

    #[test]
    fn test_size_mismatch_display() {
        let e = MpiError::SizeMismatch {
            bytes: 6,
            dtype: DataType::I32,
            elem_size: 4,
        };
        assert_eq!(
            e.to_string(),
            "incomplete message: 6 bytes is not a multiple of i32 size 4"
        );
        assert!(e.is_recoverable());
    }

    #[test]
    fn test_invalid_communicator_is_fatal() {
        let e = MpiError::InvalidCommunicator { id: 7 };
        assert!(!e.is_recoverable());
        assert_eq!(e.to_string(), "unrecognised communicator 7");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port busy");
        let err: MpiError = io_err.into();
        assert!(err.to_string().contains("port busy"));
    }

    #[test]
    fn test_transport_with_source_keeps_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("reset");
        let e = MpiError::transport_with_source("stream write", io_err);
        assert!(e.source().is_some());
        assert_eq!(e.to_string(), "transport error: stream write");
    }

    #[test]
    fn test_all_variants_display() {
        let errors: Vec<MpiError> = vec![
            MpiError::unsupported("MPI_Put"),
            MpiError::InvalidCommunicator { id: 3 },
            MpiError::UnknownWorld { world_id: 9 },
            MpiError::WorldExists { world_id: 9 },
            MpiError::InvalidRank {
                rank: 5,
                world_size: 4,
            },
            MpiError::RankNotLocal {
                world_id: 1,
                rank: 2,
                host: "h2".into(),
            },
            MpiError::RankAlreadyJoined {
                world_id: 1,
                rank: 2,
            },
            MpiError::UnknownDataType { id: 99 },
            MpiError::UnknownOp { id: 99 },
            MpiError::UnsupportedDType {
                dtype: DataType::F32,
                op: ReduceOp::Band,
            },
            MpiError::BufferSizeMismatch {
                expected: 8,
                actual: 4,
            },
            MpiError::UnknownRequest { id: 1 },
            MpiError::InvalidDimensions("maxdims 1".into()),
            MpiError::InvalidCoordinates { coords: vec![9, 9] },
            MpiError::NotInitialized,
            MpiError::ResourceExhausted { requested: 1 << 20 },
            MpiError::GuestMemory { addr: 16, len: 4 },
            MpiError::transport("closed"),
            MpiError::Tls("bad cert".into()),
            MpiError::EncodeFailed("x".into()),
            MpiError::DecodeFailed("x".into()),
            MpiError::PeerDisconnected { rank: 1 },
            MpiError::CollectiveFailed {
                operation: "reduce",
                rank: 2,
                reason: "short payload".into(),
            },
        ];
        for e in &errors {
            assert!(!e.to_string().is_empty(), "empty display for {e:?}");
        }
    }
}
