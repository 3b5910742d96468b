//! Guest handle layout.
//!
//! Communicators, datatypes, operators and info objects are guest pointers
//! to little-endian `i32` identifiers; a datatype handle also carries its
//! element size in the following `i32`. Request handles and statuses are
//! plain `i32`s written by the host.

use crate::error::{MpiError, Result};
use crate::host::memory::GuestMemory;
use crate::types::{Communicator, DataType, ReduceOp};
use crate::world::Status;

/// Return code for a successful call.
pub const MPI_SUCCESS: i32 = 0;

/// Return code of `get_count` when the byte count is not a whole number of
/// elements.
pub const MPI_ERR_COUNT: i32 = 1;

/// Guest address that stands for "use the receive buffer as the send
/// buffer".
pub const IN_PLACE: u32 = 1;

/// Guest address that means "do not write a status".
pub const STATUS_IGNORE: u32 = 0;

/// Identifier of the null info object, the only one accepted.
pub const INFO_NULL: i32 = 0;

/// Bytes occupied by a communicator object in guest memory.
pub const COMMUNICATOR_BYTES: usize = 4;

/// Bytes occupied by a datatype object in guest memory.
pub const DATATYPE_BYTES: usize = 8;

/// Bytes of a status written back to the guest: source, tag, byte count.
pub const STATUS_BYTES: usize = 12;

pub(crate) fn read_comm<M: GuestMemory>(mem: &M, ptr: u32) -> Result<Communicator> {
    let id = mem.read_i32(ptr)?;
    Communicator::from_raw(id).inspect_err(|_| {
        tracing::error!(id, "unrecognised communicator");
    })
}

pub(crate) fn read_dtype<M: GuestMemory>(mem: &M, ptr: u32) -> Result<DataType> {
    DataType::from_raw(mem.read_i32(ptr)?)
}

pub(crate) fn read_op<M: GuestMemory>(mem: &M, ptr: u32) -> Result<ReduceOp> {
    ReduceOp::from_raw(mem.read_i32(ptr)?)
}

pub(crate) fn write_status<M: GuestMemory>(mem: &mut M, ptr: u32, status: &Status) -> Result<()> {
    if ptr == STATUS_IGNORE {
        return Ok(());
    }
    mem.write_i32s(
        ptr,
        &[status.source as i32, status.tag, status.bytes as i32],
    )
}

pub(crate) fn read_status<M: GuestMemory>(mem: &M, ptr: u32) -> Result<Status> {
    let raw = mem.read_i32s(ptr, 3)?;
    let bytes = usize::try_from(raw[2]).map_err(|_| MpiError::GuestMemory {
        addr: ptr,
        len: STATUS_BYTES,
    })?;
    Ok(Status::new(raw[0] as u32, raw[1], bytes))
}

/// Lay out a communicator object at `addr`.
pub fn write_comm_handle<M: GuestMemory>(mem: &mut M, addr: u32, comm: Communicator) -> Result<()> {
    mem.write_i32(addr, comm.as_raw())
}

/// Lay out a datatype object (identifier, element size) at `addr`.
pub fn write_dtype_handle<M: GuestMemory>(mem: &mut M, addr: u32, dtype: DataType) -> Result<()> {
    mem.write_i32s(addr, &[dtype.as_raw(), dtype.size_in_bytes() as i32])
}

/// Lay out a reduction operator object at `addr`.
pub fn write_op_handle<M: GuestMemory>(mem: &mut M, addr: u32, op: ReduceOp) -> Result<()> {
    mem.write_i32(addr, op.as_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::LinearMemory;

    #[test]
    fn test_handles_roundtrip() {
        let mut mem = LinearMemory::new(1, 1);
        write_comm_handle(&mut mem, 8, Communicator::World).unwrap();
        write_dtype_handle(&mut mem, 16, DataType::F64).unwrap();
        write_op_handle(&mut mem, 32, ReduceOp::Bxor).unwrap();

        assert_eq!(read_comm(&mem, 8).unwrap(), Communicator::World);
        assert_eq!(read_dtype(&mem, 16).unwrap(), DataType::F64);
        assert_eq!(mem.read_i32(20).unwrap(), 8);
        assert_eq!(read_op(&mem, 32).unwrap(), ReduceOp::Bxor);
    }

    #[test]
    fn test_bad_handles() {
        let mut mem = LinearMemory::new(1, 1);
        mem.write_i32s(0, &[42, 0, 999]).unwrap();
        assert!(matches!(
            read_comm(&mem, 0),
            Err(MpiError::InvalidCommunicator { id: 42 })
        ));
        assert!(matches!(
            read_dtype(&mem, 8),
            Err(MpiError::UnknownDataType { id: 999 })
        ));
        assert!(matches!(
            read_op(&mem, 4),
            Err(MpiError::UnknownOp { id: 0 })
        ));
    }

    #[test]
    fn test_status_layout() {
        let mut mem = LinearMemory::new(1, 1);
        write_status(&mut mem, 64, &Status::new(3, 9, 24)).unwrap();
        assert_eq!(mem.read_i32s(64, 3).unwrap(), vec![3, 9, 24]);
        assert_eq!(read_status(&mem, 64).unwrap(), Status::new(3, 9, 24));

        write_status(&mut mem, STATUS_IGNORE, &Status::new(1, 1, 1)).unwrap();
        assert_eq!(mem.read_i32(0).unwrap(), 0);
    }
}
