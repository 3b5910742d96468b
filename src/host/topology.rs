use crate::error::{MpiError, Result};
use crate::host::handles::COMMUNICATOR_BYTES;
use crate::host::{GuestMemory, MpiHost};
use crate::topology::{CART_DIMS, CART_MAX_DIMENSIONS, CartTopology};
use crate::types::{PROC_NULL, UNDEFINED};
use crate::world::WorldContext;

impl<M: GuestMemory> MpiHost<M> {
    /// The grid recorded by `cart_create`, or the default one for the world.
    fn topology(&self, ctx: &WorldContext) -> Result<CartTopology> {
        match self.cart {
            Some(topology) => Ok(topology),
            None => CartTopology::for_size(ctx.size()),
        }
    }

    /// Record a Cartesian grid and hand the guest a new communicator object,
    /// allocated in fresh guest memory as a copy of `comm_old`.
    ///
    /// Only the first two dims and periods are read; `reorder` is ignored.
    #[allow(clippy::too_many_arguments)]
    pub fn cart_create(
        &mut self,
        comm_old: u32,
        ndims: u32,
        dims_ptr: u32,
        periods_ptr: u32,
        reorder: i32,
        new_comm_ptr: u32,
    ) -> Result<()> {
        tracing::trace!(
            rank = self.call.rank,
            comm_old,
            ndims,
            reorder,
            new_comm_ptr,
            "MPI_Cart_create"
        );
        let ctx = self.checked_ctx(comm_old)?;
        let n = (ndims as usize).min(CART_DIMS);

        let hint = if dims_ptr == 0 {
            Vec::new()
        } else {
            self.memory
                .read_i32s(dims_ptr, n)?
                .into_iter()
                .map(|d| {
                    u32::try_from(d)
                        .map_err(|_| MpiError::InvalidDimensions(format!("negative dimension {d}")))
                })
                .collect::<Result<Vec<u32>>>()?
        };
        let periods: Vec<bool> = if periods_ptr == 0 {
            Vec::new()
        } else {
            self.memory
                .read_i32s(periods_ptr, n)?
                .into_iter()
                .map(|p| p != 0)
                .collect()
        };
        let topology = ctx.cart_create(&hint, &periods)?;

        let comm = self.memory.read_vec(comm_old, COMMUNICATOR_BYTES)?;
        let addr = self.memory.grow(COMMUNICATOR_BYTES)?;
        self.memory.write(addr, &comm)?;
        self.memory.write_i32(new_comm_ptr, addr as i32)?;
        self.cart = Some(topology);
        Ok(())
    }

    /// Rank at the coordinates stored at `coords_ptr`.
    pub fn cart_rank(&mut self, comm: u32, coords_ptr: u32, rank_ptr: u32) -> Result<()> {
        tracing::trace!(rank = self.call.rank, comm, coords_ptr, rank_ptr, "MPI_Cart_rank");
        let ctx = self.checked_ctx(comm)?;
        let coords = self.memory.read_i32s(coords_ptr, CART_MAX_DIMENSIONS)?;
        let rank = self.topology(&ctx)?.rank_of(&coords)?;
        self.memory.write_i32(rank_ptr, rank as i32)
    }

    /// Write the grid's dims, periods and this rank's coordinates, each as
    /// `max_dims` integers. Dimensions past the grid read as [`UNDEFINED`].
    pub fn cart_get(
        &mut self,
        comm: u32,
        max_dims: u32,
        dims_ptr: u32,
        periods_ptr: u32,
        coords_ptr: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, comm, max_dims, "MPI_Cart_get");
        let ctx = self.checked_ctx(comm)?;
        let max_dims = max_dims as usize;
        if max_dims < CART_MAX_DIMENSIONS {
            return Err(MpiError::InvalidDimensions(format!(
                "max_dims {max_dims} is below {CART_MAX_DIMENSIONS}"
            )));
        }
        let c = ctx.cart_coords(&self.topology(&ctx)?, max_dims)?;
        let or_undefined = |v: Option<u32>| v.map_or(UNDEFINED, |x| x as i32);
        let dims: Vec<i32> = c.dims.into_iter().map(or_undefined).collect();
        let periods: Vec<i32> = c
            .periods
            .into_iter()
            .map(|p| p.map_or(UNDEFINED, i32::from))
            .collect();
        let coords: Vec<i32> = c.coords.into_iter().map(or_undefined).collect();

        self.memory.write_i32s(dims_ptr, &dims)?;
        self.memory.write_i32s(periods_ptr, &periods)?;
        self.memory.write_i32s(coords_ptr, &coords)
    }

    /// Write the ranks at `-disp` and `+disp` along `direction`; a
    /// neighbour off a non-periodic edge is [`PROC_NULL`].
    pub fn cart_shift(
        &mut self,
        comm: u32,
        direction: u32,
        disp: i32,
        source_ptr: u32,
        dest_ptr: u32,
    ) -> Result<()> {
        tracing::trace!(rank = self.call.rank, comm, direction, disp, "MPI_Cart_shift");
        let ctx = self.checked_ctx(comm)?;
        let (source, dest) = ctx.cart_shift(&self.topology(&ctx)?, direction as usize, disp)?;
        let or_null = |r: Option<u32>| r.map_or(PROC_NULL, |r| r as i32);
        self.memory.write_i32(source_ptr, or_null(source))?;
        self.memory.write_i32(dest_ptr, or_null(dest))
    }
}
