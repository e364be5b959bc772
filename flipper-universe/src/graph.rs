use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use fnv::FnvHashMap;
use serde::Deserialize;

use crate::error::UniverseError;
use crate::types::{RegionId, SolarSystem, SystemId};

#[derive(Debug, Deserialize)]
struct GraphFile {
    systems: Vec<SolarSystem>,
    edges: Vec<(SystemId, SystemId)>,
}

/// Static, cyclic adjacency over solar systems, stored as arrays of indices
/// rather than object pointers (see SPEC_FULL.md §9 "Cyclic references") so
/// the graph is trivially `Clone`/`Arc`-shareable across scan workers without
/// any interior mutability.
#[derive(Debug, Clone)]
pub struct UniverseGraph {
    systems: Vec<SolarSystem>,
    adjacency: Vec<Vec<usize>>,
    index_by_id: FnvHashMap<SystemId, usize>,
}

/// A BFS-discovered system, carrying its hop distance from the query origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithinResult {
    pub system_id: SystemId,
    pub jumps: u32,
}

impl UniverseGraph {
    /// Build a graph from systems and an undirected, unweighted edge list.
    /// Edges referencing unknown system ids are dropped rather than causing
    /// a load-time failure — the upstream universe dump is not guaranteed
    /// internally consistent across regions.
    pub fn new(systems: Vec<SolarSystem>, edges: &[(SystemId, SystemId)]) -> Self {
        let index_by_id: FnvHashMap<SystemId, usize> = systems
            .iter()
            .enumerate()
            .map(|(idx, system)| (system.id, idx))
            .collect();

        let mut adjacency = vec![Vec::new(); systems.len()];
        for &(a, b) in edges {
            if let (Some(&ia), Some(&ib)) = (index_by_id.get(&a), index_by_id.get(&b)) {
                adjacency[ia].push(ib);
                adjacency[ib].push(ia);
            }
        }

        Self {
            systems,
            adjacency,
            index_by_id,
        }
    }

    /// Load a systems+edges dump from a single JSON file in the cache
    /// directory, mirroring `StaticCatalog::load_from_file`.
    pub fn load_from_file(path: &Path) -> Result<Self, UniverseError> {
        let raw = fs::read_to_string(path).map_err(|source| UniverseError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let parsed: GraphFile = serde_json::from_str(&raw).map_err(|source| UniverseError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(parsed.systems, &parsed.edges))
    }

    pub fn system(&self, id: SystemId) -> Result<&SolarSystem, UniverseError> {
        self.index_by_id
            .get(&id)
            .map(|&idx| &self.systems[idx])
            .ok_or(UniverseError::UnknownSystem(id.0))
    }

    pub fn contains(&self, id: SystemId) -> bool {
        self.index_by_id.contains_key(&id)
    }

    fn index_of(&self, id: SystemId) -> Option<usize> {
        self.index_by_id.get(&id).copied()
    }

    /// True if `idx` passes the security floor. The origin of a BFS always
    /// passes regardless of its own security, matching `systems-within(a,0)
    /// = {a}` even when `a` itself is below the floor.
    fn passes_floor(&self, idx: usize, min_security: Option<f64>) -> bool {
        match min_security {
            None => true,
            Some(floor) => self.systems[idx].security.0 >= floor,
        }
    }

    /// BFS over systems within `radius` jumps of `origin`, carrying hop
    /// distance. A `min_security` floor restricts which systems (other than
    /// the origin itself) may be entered — this can only shrink the
    /// reachable set relative to no floor, per the Testable Properties in
    /// §8: "adding a security floor can only increase or preserve [shortest
    /// path distances], never decrease it."
    pub fn systems_within(
        &self,
        origin: SystemId,
        radius: u32,
        min_security: Option<f64>,
    ) -> Vec<WithinResult> {
        let Some(origin_idx) = self.index_of(origin) else {
            return Vec::new();
        };

        let mut visited: FnvHashMap<usize, u32> = FnvHashMap::default();
        visited.insert(origin_idx, 0);
        let mut queue = VecDeque::new();
        queue.push_back(origin_idx);

        while let Some(current) = queue.pop_front() {
            let dist = visited[&current];
            if dist >= radius {
                continue;
            }
            for &next in &self.adjacency[current] {
                if visited.contains_key(&next) {
                    continue;
                }
                if !self.passes_floor(next, min_security) {
                    continue;
                }
                visited.insert(next, dist + 1);
                queue.push_back(next);
            }
        }

        visited
            .into_iter()
            .map(|(idx, jumps)| WithinResult {
                system_id: self.systems[idx].id,
                jumps,
            })
            .collect()
    }

    /// Shortest path distance in jumps between two systems, or `None` if
    /// unreachable under the given security floor. Symmetric with no floor
    /// applied (§8 property 1).
    pub fn shortest_path(
        &self,
        a: SystemId,
        b: SystemId,
        min_security: Option<f64>,
    ) -> Option<u32> {
        let (a_idx, b_idx) = (self.index_of(a)?, self.index_of(b)?);
        if a_idx == b_idx {
            return Some(0);
        }

        let mut visited: FnvHashMap<usize, u32> = FnvHashMap::default();
        visited.insert(a_idx, 0);
        let mut queue = VecDeque::new();
        queue.push_back(a_idx);

        while let Some(current) = queue.pop_front() {
            let dist = visited[&current];
            for &next in &self.adjacency[current] {
                if visited.contains_key(&next) {
                    continue;
                }
                if !self.passes_floor(next, min_security) {
                    continue;
                }
                if next == b_idx {
                    return Some(dist + 1);
                }
                visited.insert(next, dist + 1);
                queue.push_back(next);
            }
        }

        None
    }

    /// Distinct region ids reached by a set of systems.
    pub fn regions_of<'a>(&self, systems: impl Iterator<Item = &'a SystemId>) -> Vec<RegionId> {
        let mut regions: Vec<RegionId> = systems
            .filter_map(|id| self.index_of(*id))
            .map(|idx| self.systems[idx].region_id)
            .collect();
        regions.sort_by_key(|r| r.0);
        regions.dedup_by_key(|r| r.0);
        regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SecurityRating;

    fn sys(id: u32, region: u32, security: f64) -> SolarSystem {
        SolarSystem {
            id: SystemId(id),
            name: format!("sys-{id}"),
            region_id: RegionId(region),
            security: SecurityRating(security),
        }
    }

    /// Chain: 1 - 2 - 3 - 4, all high-sec except 3 which is low-sec (0.4).
    fn chain_graph() -> UniverseGraph {
        let systems = vec![sys(1, 10, 0.9), sys(2, 10, 0.8), sys(3, 10, 0.4), sys(4, 20, 0.9)];
        let edges = [
            (SystemId(1), SystemId(2)),
            (SystemId(2), SystemId(3)),
            (SystemId(3), SystemId(4)),
        ];
        UniverseGraph::new(systems, &edges)
    }

    #[test]
    fn systems_within_zero_radius_is_just_origin() {
        let graph = chain_graph();
        let within = graph.systems_within(SystemId(1), 0, None);
        assert_eq!(within.len(), 1);
        assert_eq!(within[0].system_id, SystemId(1));
        assert_eq!(within[0].jumps, 0);
    }

    #[test]
    fn shortest_path_is_symmetric_without_floor() {
        let graph = chain_graph();
        let forward = graph.shortest_path(SystemId(1), SystemId(4), None);
        let backward = graph.shortest_path(SystemId(4), SystemId(1), None);
        assert_eq!(forward, backward);
        assert_eq!(forward, Some(3));
    }

    #[test]
    fn security_floor_never_shortens_a_path() {
        let graph = chain_graph();
        let unrestricted = graph.shortest_path(SystemId(1), SystemId(4), None).unwrap();
        let restricted = graph.shortest_path(SystemId(1), SystemId(4), Some(0.5));
        // System 3 (0.4 security) is the only route to system 4, so with a
        // 0.5 floor the destination becomes unreachable, not merely farther.
        assert!(restricted.is_none());
        assert!(restricted.map_or(true, |d| d >= unrestricted));
    }

    #[test]
    fn security_floor_zero_matches_unrestricted() {
        let graph = chain_graph();
        let unrestricted = graph.shortest_path(SystemId(1), SystemId(4), None);
        let floored = graph.shortest_path(SystemId(1), SystemId(4), Some(0.0));
        assert_eq!(unrestricted, floored);
    }

    #[test]
    fn regions_of_dedups_and_sorts() {
        let graph = chain_graph();
        let ids = [SystemId(1), SystemId(2), SystemId(4), SystemId(3)];
        let regions = graph.regions_of(ids.iter());
        assert_eq!(regions, vec![RegionId(10), RegionId(20)]);
    }
}
