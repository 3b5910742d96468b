use crate::error::{MpiError, Result};
use crate::types::{HostId, Rank, WorldId};

/// Rank → host placement of one world. Fixed when the world is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    hosts: Vec<HostId>,
}

impl Directory {
    /// A directory with every rank on `host`.
    pub fn single_host(host: HostId, size: u32) -> Self {
        Self {
            hosts: vec![host; size as usize],
        }
    }

    /// A directory from an explicit placement; index = rank.
    pub fn from_placement(hosts: Vec<HostId>) -> Self {
        Self { hosts }
    }

    pub fn size(&self) -> u32 {
        self.hosts.len() as u32
    }

    /// Host owning `rank`.
    pub fn host_of(&self, rank: Rank) -> Result<&HostId> {
        self.hosts
            .get(rank as usize)
            .ok_or(MpiError::InvalidRank {
                rank,
                world_size: self.size(),
            })
    }

    /// Ranks placed on `host`, ascending.
    pub fn ranks_on(&self, host: &HostId) -> Vec<Rank> {
        self.hosts
            .iter()
            .enumerate()
            .filter(|(_, h)| *h == host)
            .map(|(r, _)| r as Rank)
            .collect()
    }

    /// Distinct hosts in first-appearance order.
    pub fn hosts(&self) -> Vec<HostId> {
        let mut out: Vec<HostId> = Vec::new();
        for h in &self.hosts {
            if !out.contains(h) {
                out.push(h.clone());
            }
        }
        out
    }

    pub fn placement(&self) -> &[HostId] {
        &self.hosts
    }
}

/// What a scheduler hands to each host so it can adopt a world created
/// elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldDescriptor {
    pub world_id: WorldId,
    pub placement: Vec<HostId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement() -> Directory {
        Directory::from_placement(vec![
            HostId::new("a"),
            HostId::new("b"),
            HostId::new("a"),
            HostId::new("c"),
        ])
    }

    #[test]
    fn test_host_lookup() {
        let d = placement();
        assert_eq!(d.size(), 4);
        assert_eq!(d.host_of(1).unwrap().as_str(), "b");
        assert!(matches!(
            d.host_of(4),
            Err(MpiError::InvalidRank {
                rank: 4,
                world_size: 4
            })
        ));
    }

    #[test]
    fn test_ranks_on_and_hosts() {
        let d = placement();
        assert_eq!(d.ranks_on(&HostId::new("a")), vec![0, 2]);
        assert!(d.ranks_on(&HostId::new("z")).is_empty());
        assert_eq!(
            d.hosts(),
            vec![HostId::new("a"), HostId::new("b"), HostId::new("c")]
        );
    }

    #[test]
    fn test_single_host() {
        let d = Directory::single_host(HostId::new("h"), 3);
        assert_eq!(d.ranks_on(&HostId::new("h")), vec![0, 1, 2]);
    }
}
