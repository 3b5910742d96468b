use crate::error::{MpiError, Result};

/// Linear-memory page size of the guest sandbox.
pub const PAGE_SIZE: usize = 64 * 1024;

/// Round `bytes` up to a whole number of pages.
pub fn page_aligned(bytes: usize) -> usize {
    bytes.div_ceil(PAGE_SIZE) * PAGE_SIZE
}

/// A guest's linear memory as seen by the host-call boundary.
///
/// Addresses are guest offsets. Every access is bounds checked.
pub trait GuestMemory: Send {
    /// Current size in bytes.
    fn size(&self) -> usize;

    /// Copy `buf.len()` bytes starting at `addr` into `buf`.
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Copy `data` into guest memory starting at `addr`.
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()>;

    /// Grow memory by `bytes` (rounded up to whole pages) and return the
    /// address of the new region.
    fn grow(&mut self, bytes: usize) -> Result<u32>;

    fn read_vec(&self, addr: u32, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read(addr, &mut buf)?;
        Ok(buf)
    }

    fn read_i32(&self, addr: u32) -> Result<i32> {
        let mut raw = [0u8; 4];
        self.read(addr, &mut raw)?;
        Ok(i32::from_le_bytes(raw))
    }

    fn write_i32(&mut self, addr: u32, value: i32) -> Result<()> {
        self.write(addr, &value.to_le_bytes())
    }

    fn read_i32s(&self, addr: u32, n: usize) -> Result<Vec<i32>> {
        let raw = self.read_vec(addr, n * 4)?;
        Ok(raw
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn write_i32s(&mut self, addr: u32, values: &[i32]) -> Result<()> {
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.write(addr, &raw)
    }
}

/// Growable guest memory backed by a `Vec`, capped at `max_bytes`.
#[derive(Debug, Clone)]
pub struct LinearMemory {
    data: Vec<u8>,
    max_bytes: usize,
}

impl LinearMemory {
    /// `initial_pages` zeroed pages; growth beyond `max_pages` fails.
    pub fn new(initial_pages: usize, max_pages: usize) -> Self {
        Self {
            data: vec![0; initial_pages * PAGE_SIZE],
            max_bytes: max_pages.max(initial_pages) * PAGE_SIZE,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, addr: u32, len: usize) -> Result<std::ops::Range<usize>> {
        let start = addr as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(start..end),
            _ => Err(MpiError::GuestMemory { addr, len }),
        }
    }
}

impl GuestMemory for LinearMemory {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let range = self.range(addr, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let range = self.range(addr, data.len())?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }

    fn grow(&mut self, bytes: usize) -> Result<u32> {
        let aligned = page_aligned(bytes);
        let base = self.data.len();
        let new_len = base
            .checked_add(aligned)
            .filter(|&n| n <= self.max_bytes && n <= u32::MAX as usize)
            .ok_or(MpiError::ResourceExhausted { requested: bytes })?;
        self.data.resize(new_len, 0);
        Ok(base as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_alignment() {
        assert_eq!(page_aligned(0), 0);
        assert_eq!(page_aligned(1), PAGE_SIZE);
        assert_eq!(page_aligned(PAGE_SIZE), PAGE_SIZE);
        assert_eq!(page_aligned(PAGE_SIZE + 1), 2 * PAGE_SIZE);
    }

    #[test]
    fn test_read_write_roundtrip() {
        let mut mem = LinearMemory::new(1, 1);
        mem.write_i32s(16, &[1, -2, 3]).unwrap();
        assert_eq!(mem.read_i32s(16, 3).unwrap(), vec![1, -2, 3]);
        assert_eq!(mem.read_i32(20).unwrap(), -2);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut mem = LinearMemory::new(1, 1);
        let end = PAGE_SIZE as u32;
        assert!(matches!(
            mem.write(end - 2, &[0; 4]),
            Err(MpiError::GuestMemory { len: 4, .. })
        ));
        assert!(mem.read_i32(u32::MAX).is_err());
    }

    #[test]
    fn test_grow_returns_new_region() {
        let mut mem = LinearMemory::new(1, 3);
        let addr = mem.grow(10).unwrap();
        assert_eq!(addr as usize, PAGE_SIZE);
        assert_eq!(mem.size(), 2 * PAGE_SIZE);
        mem.write_i32(addr, 7).unwrap();
        assert_eq!(mem.read_i32(addr).unwrap(), 7);
    }

    #[test]
    fn test_grow_past_limit() {
        let mut mem = LinearMemory::new(1, 2);
        mem.grow(PAGE_SIZE).unwrap();
        assert!(matches!(
            mem.grow(1),
            Err(MpiError::ResourceExhausted { requested: 1 })
        ));
        assert_eq!(mem.size(), 2 * PAGE_SIZE);
    }
}
