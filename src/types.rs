use crate::error::{MpiError, Result};

/// Rank of a participant in a world (0-indexed).
pub type Rank = u32;

/// Identifier of a world, unique per registry.
pub type WorldId = u32;

/// Point-to-point message tag.
pub type Tag = i32;

/// Sentinel written to the guest for values that do not exist, such as the
/// dimensions beyond the synthetic 2-D grid.
pub const UNDEFINED: i32 = -32766;

/// Sentinel written to the guest for a neighbour that falls off a
/// non-periodic grid edge.
pub const PROC_NULL: i32 = -2;

/// Transport endpoint that owns a rank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(String);

impl HostId {
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<std::net::SocketAddr> for HostId {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self::new(addr.to_string())
    }
}

/// Element types understood by the engine.
///
/// The discriminant is the raw identifier guest code uses in its datatype
/// handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DataType {
    Byte = 1,
    Bool = 2,
    I8 = 3,
    U8 = 4,
    I16 = 5,
    U16 = 6,
    I32 = 7,
    U32 = 8,
    I64 = 9,
    U64 = 10,
    F32 = 11,
    F64 = 12,
}

impl DataType {
    pub const ALL: [DataType; 12] = [
        DataType::Byte,
        DataType::Bool,
        DataType::I8,
        DataType::U8,
        DataType::I16,
        DataType::U16,
        DataType::I32,
        DataType::U32,
        DataType::I64,
        DataType::U64,
        DataType::F32,
        DataType::F64,
    ];

    /// Look up a datatype by its raw guest identifier.
    pub fn from_raw(id: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|dt| *dt as i32 == id)
            .ok_or(MpiError::UnknownDataType { id })
    }

    /// Raw guest identifier.
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::Byte | DataType::Bool | DataType::I8 | DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::I64 | DataType::U64 | DataType::F64 => 8,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::Byte => "byte",
            DataType::Bool => "bool",
            DataType::I8 => "i8",
            DataType::U8 => "u8",
            DataType::I16 => "i16",
            DataType::U16 => "u16",
            DataType::I32 => "i32",
            DataType::U32 => "u32",
            DataType::I64 => "i64",
            DataType::U64 => "u64",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        }
    }

    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::I8
                | DataType::U8
                | DataType::I16
                | DataType::U16
                | DataType::I32
                | DataType::U32
                | DataType::I64
                | DataType::U64
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    /// Bytes occupied by `count` elements.
    pub const fn bytes_for(self, count: usize) -> usize {
        count * self.size_in_bytes()
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Built-in reduction operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ReduceOp {
    /// Element-wise maximum across ranks.
    Max = 1,
    /// Element-wise minimum across ranks.
    Min = 2,
    /// Element-wise sum across ranks.
    Sum = 3,
    /// Element-wise product across ranks.
    Prod = 4,
    /// Logical and.
    Land = 5,
    /// Bitwise and.
    Band = 6,
    /// Logical or.
    Lor = 7,
    /// Bitwise or.
    Bor = 8,
    /// Logical exclusive or.
    Lxor = 9,
    /// Bitwise exclusive or.
    Bxor = 10,
}

impl ReduceOp {
    pub const ALL: [ReduceOp; 10] = [
        ReduceOp::Max,
        ReduceOp::Min,
        ReduceOp::Sum,
        ReduceOp::Prod,
        ReduceOp::Land,
        ReduceOp::Band,
        ReduceOp::Lor,
        ReduceOp::Bor,
        ReduceOp::Lxor,
        ReduceOp::Bxor,
    ];

    /// Look up an operator by its raw guest identifier.
    pub fn from_raw(id: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| *op as i32 == id)
            .ok_or(MpiError::UnknownOp { id })
    }

    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    pub const fn is_logical(self) -> bool {
        matches!(self, ReduceOp::Land | ReduceOp::Lor | ReduceOp::Lxor)
    }

    pub const fn is_bitwise(self) -> bool {
        matches!(self, ReduceOp::Band | ReduceOp::Bor | ReduceOp::Bxor)
    }

    /// Whether this operator is defined over `dtype`.
    ///
    /// Arithmetic operators apply to every numeric type, logical operators
    /// to integers and `Bool`, bitwise operators to integers and `Byte`.
    pub const fn supports(self, dtype: DataType) -> bool {
        if self.is_logical() {
            dtype.is_integer() || matches!(dtype, DataType::Bool)
        } else if self.is_bitwise() {
            dtype.is_integer() || matches!(dtype, DataType::Byte)
        } else {
            dtype.is_integer() || dtype.is_float()
        }
    }
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReduceOp::Max => "max",
            ReduceOp::Min => "min",
            ReduceOp::Sum => "sum",
            ReduceOp::Prod => "prod",
            ReduceOp::Land => "land",
            ReduceOp::Band => "band",
            ReduceOp::Lor => "lor",
            ReduceOp::Bor => "bor",
            ReduceOp::Lxor => "lxor",
            ReduceOp::Bxor => "bxor",
        };
        f.write_str(name)
    }
}

/// Participant groups. Only the world group exists; derived communicators
/// are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Communicator {
    World,
}

impl Communicator {
    /// Raw identifier of the world communicator in guest handles.
    pub const WORLD_ID: i32 = 1;

    /// Validate a raw guest communicator identifier.
    pub fn from_raw(id: i32) -> Result<Self> {
        if id == Self::WORLD_ID {
            Ok(Communicator::World)
        } else {
            Err(MpiError::InvalidCommunicator { id })
        }
    }

    pub const fn as_raw(self) -> i32 {
        match self {
            Communicator::World => Self::WORLD_ID,
        }
    }
}

/// Where a collective reads the caller's own contribution from.
#[derive(Debug, Clone, Copy)]
pub enum BufferSource<'a> {
    /// A dedicated send buffer.
    Separate(&'a [u8]),
    /// The receive buffer doubles as the send buffer.
    InPlace,
}

impl BufferSource<'_> {
    pub fn is_in_place(&self) -> bool {
        matches!(self, BufferSource::InPlace)
    }
}
