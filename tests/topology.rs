mod common;

use common::run_world;
use mpiworld::topology::CART_MAX_DIMENSIONS;
use mpiworld::{CartTopology, MpiError};

#[tokio::test]
async fn test_six_rank_grid_identity() {
    run_world(6, |ctx| async move {
        let grid = ctx.cart_create(&[], &[]).unwrap();
        assert_eq!(grid.dims(), [3, 2]);

        let c = ctx.cart_coords(&grid, CART_MAX_DIMENSIONS).unwrap();
        let coords: Vec<i32> = c
            .coords
            .iter()
            .map(|v| v.map_or(-1, |x| x as i32))
            .collect();
        assert_eq!(coords[2], -1);
        assert_eq!(grid.rank_of(&coords).unwrap(), ctx.rank());
    })
    .await;
}

#[tokio::test]
async fn test_shift_off_non_periodic_edge() {
    run_world(6, |ctx| async move {
        let grid = ctx.cart_create(&[], &[false, true]).unwrap();
        let [row, col] = grid.coords_of(ctx.rank()).unwrap();

        let (up, down) = ctx.cart_shift(&grid, 0, 1).unwrap();
        assert_eq!(up.is_none(), row == 0);
        assert_eq!(down.is_none(), row == 2);

        let (left, right) = ctx.cart_shift(&grid, 1, 1).unwrap();
        let other = row * 2 + (1 - col);
        assert_eq!(left, Some(other));
        assert_eq!(right, Some(other));
    })
    .await;
}

#[test]
fn test_hint_must_factor_world() {
    assert!(matches!(
        CartTopology::new(6, &[4], &[]),
        Err(MpiError::InvalidDimensions(_))
    ));
    let grid = CartTopology::new(6, &[1], &[]).unwrap();
    assert_eq!(grid.dims(), [1, 6]);
}
