//! Virtual Cartesian topology.
//!
//! Ranks are placed by a scheduler, not pinned to hardware, so the grid is
//! synthetic: a 2-D row-major layout derived from the world size. Requests
//! for more dimensions report the extra ones as undefined.

use crate::error::{MpiError, Result};
use crate::types::Rank;
use crate::world::WorldContext;

/// Number of dimensions guest code passes for coordinate arrays.
pub const CART_MAX_DIMENSIONS: usize = 3;

/// Dimensions actually modelled.
pub const CART_DIMS: usize = 2;

/// Balanced 2-D factorization of `nnodes`.
///
/// Non-zero entries of `hint` are honored; zero entries are chosen so that
/// the grid is as square as possible, larger dimension first.
pub fn dims_create(nnodes: u32, hint: [u32; CART_DIMS]) -> Result<[u32; CART_DIMS]> {
    if nnodes == 0 {
        return Err(MpiError::InvalidDimensions("world size is zero".into()));
    }
    let dims = match hint {
        [0, 0] => {
            let mut small = (nnodes as f64).sqrt() as u32;
            while small > 1 && nnodes % small != 0 {
                small -= 1;
            }
            let small = small.max(1);
            [nnodes / small, small]
        }
        [a, 0] if nnodes % a == 0 => [a, nnodes / a],
        [0, b] if nnodes % b == 0 => [nnodes / b, b],
        [a, b] if a.checked_mul(b) == Some(nnodes) => [a, b],
        _ => {
            return Err(MpiError::InvalidDimensions(format!(
                "{hint:?} does not factor a world of {nnodes}"
            )));
        }
    };
    Ok(dims)
}

/// Dimensions, periodicity and coordinates of one rank, padded to the
/// caller's requested number of dimensions.
///
/// Entries past the modelled dimensions are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartCoords {
    pub dims: Vec<Option<u32>>,
    pub periods: Vec<Option<bool>>,
    pub coords: Vec<Option<u32>>,
}

/// A 2-D grid over the ranks of a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTopology {
    dims: [u32; CART_DIMS],
    periods: [bool; CART_DIMS],
}

impl CartTopology {
    /// Grid for a world of `size` ranks. Missing hint or period entries are
    /// treated as unconstrained and non-periodic.
    pub fn new(size: u32, dims_hint: &[u32], periods: &[bool]) -> Result<Self> {
        let hint = [
            dims_hint.first().copied().unwrap_or(0),
            dims_hint.get(1).copied().unwrap_or(0),
        ];
        Ok(Self {
            dims: dims_create(size, hint)?,
            periods: [
                periods.first().copied().unwrap_or(false),
                periods.get(1).copied().unwrap_or(false),
            ],
        })
    }

    /// Unconstrained, non-periodic grid.
    pub fn for_size(size: u32) -> Result<Self> {
        Self::new(size, &[], &[])
    }

    pub fn dims(&self) -> [u32; CART_DIMS] {
        self.dims
    }

    pub fn periods(&self) -> [bool; CART_DIMS] {
        self.periods
    }

    pub fn size(&self) -> u32 {
        self.dims[0] * self.dims[1]
    }

    /// Rank at `coords`. Periodic axes wrap; a coordinate off a non-periodic
    /// axis is rejected. Entries past the modelled dimensions are ignored.
    pub fn rank_of(&self, coords: &[i32]) -> Result<Rank> {
        if coords.len() < CART_DIMS {
            return Err(MpiError::InvalidCoordinates {
                coords: coords.to_vec(),
            });
        }
        let mut fixed = [0u32; CART_DIMS];
        for axis in 0..CART_DIMS {
            fixed[axis] = self
                .wrap(axis, i64::from(coords[axis]))
                .ok_or_else(|| MpiError::InvalidCoordinates {
                    coords: coords.to_vec(),
                })?;
        }
        Ok(fixed[0] * self.dims[1] + fixed[1])
    }

    /// Grid position of `rank`.
    pub fn coords_of(&self, rank: Rank) -> Result<[u32; CART_DIMS]> {
        if rank >= self.size() {
            return Err(MpiError::InvalidRank {
                rank,
                world_size: self.size(),
            });
        }
        Ok([rank / self.dims[1], rank % self.dims[1]])
    }

    /// Full description of `rank`'s place in the grid, padded to
    /// `max_dims` entries.
    pub fn coords(&self, rank: Rank, max_dims: usize) -> Result<CartCoords> {
        if max_dims < CART_DIMS {
            return Err(MpiError::InvalidDimensions(format!(
                "max_dims {max_dims} is below the grid's {CART_DIMS} dimensions"
            )));
        }
        let position = self.coords_of(rank)?;
        Ok(CartCoords {
            dims: pad(self.dims, max_dims),
            periods: pad(self.periods, max_dims),
            coords: pad(position, max_dims),
        })
    }

    /// Neighbours of `rank` at `-disp` (source) and `+disp` (destination)
    /// along `direction`. A neighbour off a non-periodic edge is `None`.
    pub fn shift(
        &self,
        rank: Rank,
        direction: usize,
        disp: i32,
    ) -> Result<(Option<Rank>, Option<Rank>)> {
        if direction >= CART_DIMS {
            return Err(MpiError::InvalidDimensions(format!(
                "shift direction {direction} outside the grid's {CART_DIMS} dimensions"
            )));
        }
        let position = self.coords_of(rank)?;
        let neighbour = |delta: i64| -> Option<Rank> {
            let along = self.wrap(direction, i64::from(position[direction]) + delta)?;
            let mut at = position;
            at[direction] = along;
            Some(at[0] * self.dims[1] + at[1])
        };
        Ok((neighbour(-i64::from(disp)), neighbour(i64::from(disp))))
    }

    fn wrap(&self, axis: usize, c: i64) -> Option<u32> {
        let extent = i64::from(self.dims[axis]);
        if self.periods[axis] {
            Some(c.rem_euclid(extent) as u32)
        } else if (0..extent).contains(&c) {
            Some(c as u32)
        } else {
            None
        }
    }
}

impl WorldContext {
    /// A Cartesian grid over this world.
    pub fn cart_create(&self, dims_hint: &[u32], periods: &[bool]) -> Result<CartTopology> {
        CartTopology::new(self.size(), dims_hint, periods)
    }

    /// This rank's place in `topology`.
    pub fn cart_coords(&self, topology: &CartTopology, max_dims: usize) -> Result<CartCoords> {
        topology.coords(self.rank(), max_dims)
    }

    /// This rank's neighbours in `topology`.
    pub fn cart_shift(
        &self,
        topology: &CartTopology,
        direction: usize,
        disp: i32,
    ) -> Result<(Option<Rank>, Option<Rank>)> {
        topology.shift(self.rank(), direction, disp)
    }
}

/// `v` as `Some` entries, extended with `None` up to `n`.
fn pad<T>(v: [T; CART_DIMS], n: usize) -> Vec<Option<T>> {
    let mut out: Vec<Option<T>> = v.into_iter().map(Some).collect();
    out.resize_with(n, || None);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dims_create_balanced() {
        assert_eq!(dims_create(6, [0, 0]).unwrap(), [3, 2]);
        assert_eq!(dims_create(16, [0, 0]).unwrap(), [4, 4]);
        assert_eq!(dims_create(7, [0, 0]).unwrap(), [7, 1]);
        assert_eq!(dims_create(1, [0, 0]).unwrap(), [1, 1]);
    }

    #[test]
    fn test_dims_create_hints() {
        assert_eq!(dims_create(6, [2, 0]).unwrap(), [2, 3]);
        assert_eq!(dims_create(6, [0, 6]).unwrap(), [1, 6]);
        assert_eq!(dims_create(6, [6, 1]).unwrap(), [6, 1]);
        assert!(dims_create(6, [4, 0]).is_err());
        assert!(dims_create(6, [2, 2]).is_err());
        assert!(dims_create(0, [0, 0]).is_err());
    }

    #[test]
    fn test_row_major_layout() {
        let t = CartTopology::for_size(6).unwrap();
        assert_eq!(t.coords_of(0).unwrap(), [0, 0]);
        assert_eq!(t.coords_of(1).unwrap(), [0, 1]);
        assert_eq!(t.coords_of(2).unwrap(), [1, 0]);
        assert_eq!(t.coords_of(5).unwrap(), [2, 1]);
        assert_eq!(t.rank_of(&[2, 1]).unwrap(), 5);
    }

    #[test]
    fn test_coords_rank_identity() {
        for size in 1..=12 {
            let t = CartTopology::for_size(size).unwrap();
            for rank in 0..size {
                let [a, b] = t.coords_of(rank).unwrap();
                assert_eq!(t.rank_of(&[a as i32, b as i32]).unwrap(), rank);
            }
        }
    }

    #[test]
    fn test_coords_padding() {
        let t = CartTopology::new(6, &[], &[true, false]).unwrap();
        let c = t.coords(3, CART_MAX_DIMENSIONS).unwrap();
        assert_eq!(c.dims, vec![Some(3), Some(2), None]);
        assert_eq!(c.periods, vec![Some(true), Some(false), None]);
        assert_eq!(c.coords, vec![Some(1), Some(1), None]);
        assert!(matches!(
            t.coords(3, 1),
            Err(MpiError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_rank_of_wraps_only_periodic_axes() {
        let t = CartTopology::new(6, &[], &[true, false]).unwrap();
        assert_eq!(t.rank_of(&[-1, 0]).unwrap(), 4);
        assert_eq!(t.rank_of(&[3, 1]).unwrap(), 1);
        assert!(matches!(
            t.rank_of(&[0, 2]),
            Err(MpiError::InvalidCoordinates { .. })
        ));
        assert!(t.rank_of(&[0]).is_err());
    }

    #[test]
    fn test_shift_non_periodic_edges() {
        let t = CartTopology::for_size(6).unwrap();
        assert_eq!(t.shift(0, 0, 1).unwrap(), (None, Some(2)));
        assert_eq!(t.shift(4, 0, 1).unwrap(), (Some(2), None));
        assert_eq!(t.shift(1, 1, 1).unwrap(), (Some(0), None));
        assert_eq!(t.shift(2, 0, 0).unwrap(), (Some(2), Some(2)));
    }

    #[test]
    fn test_shift_periodic_wraps() {
        let t = CartTopology::new(6, &[], &[true, true]).unwrap();
        assert_eq!(t.shift(0, 0, 1).unwrap(), (Some(4), Some(2)));
        assert_eq!(t.shift(1, 1, 1).unwrap(), (Some(0), Some(0)));
        assert_eq!(t.shift(0, 0, -4).unwrap(), (Some(2), Some(4)));
    }

    #[test]
    fn test_shift_bad_direction() {
        let t = CartTopology::for_size(4).unwrap();
        assert!(t.shift(0, 2, 1).is_err());
        assert!(t.shift(9, 0, 1).is_err());
    }
}
