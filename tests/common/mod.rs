#![allow(dead_code)]

use mpiworld::{WorldContext, WorldRegistry};
use std::future::Future;

/// Run `f` once per rank of a fresh single-host world, each rank on its own
/// task. Panics in any rank fail the test.
pub async fn run_world<F, Fut>(world_size: u32, f: F)
where
    F: Fn(WorldContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let registry = WorldRegistry::local();
    let root = registry.create_world(world_size).unwrap();
    let mut ranks = vec![root.clone()];
    for r in 1..world_size {
        ranks.push(registry.join_world(root.world_id(), r).unwrap());
    }

    let f = std::sync::Arc::new(f);
    let mut handles = Vec::new();
    for ctx in ranks {
        let f = std::sync::Arc::clone(&f);
        handles.push(tokio::spawn(async move { f(ctx).await }));
    }
    for h in handles {
        h.await.unwrap();
    }
}

pub fn i32_bytes(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn bytes_i32(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn f64_bytes(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn bytes_f64(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect()
}
