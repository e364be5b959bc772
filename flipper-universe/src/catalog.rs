use std::fs;
use std::path::Path;

use fnv::FnvHashMap;
use serde::Deserialize;

use crate::error::UniverseError;
use crate::types::{ItemType, Location, StationId, SystemId};

/// Static item type metadata and station → system lookup, loaded once at
/// startup from the cache directory (see SPEC_FULL.md §6, "Persistent
/// state"). Structures (as opposed to catalog-known stations) are not
/// present here; they are resolved lazily through `flipper-client`'s
/// structure-name cache.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: FnvHashMap<u32, ItemType>,
    stations: FnvHashMap<StationId, Location>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    items: Vec<ItemType>,
    stations: Vec<Location>,
}

impl StaticCatalog {
    pub fn new(items: Vec<ItemType>, stations: Vec<Location>) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.type_id, i)).collect(),
            stations: stations.into_iter().map(|s| (s.id, s)).collect(),
        }
    }

    /// Load a combined items+stations dump from a single JSON file in the
    /// cache directory.
    pub fn load_from_file(path: &Path) -> Result<Self, UniverseError> {
        let raw = fs::read_to_string(path).map_err(|source| UniverseError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let parsed: CatalogFile =
            serde_json::from_str(&raw).map_err(|source| UniverseError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self::new(parsed.items, parsed.stations))
    }

    pub fn item(&self, type_id: u32) -> Option<&ItemType> {
        self.items.get(&type_id)
    }

    pub fn item_name(&self, type_id: u32) -> &str {
        self.items
            .get(&type_id)
            .map(|item| item.name.as_str())
            .unwrap_or("unknown type")
    }

    /// Station → containing system, for catalog-known stations only.
    /// Structures return `None` and must be resolved via the upstream
    /// client's structure-name cache.
    pub fn station_system(&self, station_id: StationId) -> Option<SystemId> {
        self.stations.get(&station_id).map(|loc| loc.system_id)
    }

    pub fn station(&self, station_id: StationId) -> Option<&Location> {
        self.stations.get(&station_id)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RegionId;

    #[test]
    fn station_system_resolves_known_stations_only() {
        let catalog = StaticCatalog::new(
            vec![],
            vec![Location {
                id: StationId(60003760),
                name: "Jita IV - Moon 4".into(),
                system_id: SystemId(30000142),
            }],
        );

        assert_eq!(
            catalog.station_system(StationId(60003760)),
            Some(SystemId(30000142))
        );
        assert_eq!(catalog.station_system(StationId(1_000_000_000_000)), None);
    }

    #[test]
    fn item_name_falls_back_for_unknown_type() {
        let catalog = StaticCatalog::new(
            vec![ItemType {
                type_id: 34,
                name: "Tritanium".into(),
                volume_m3: 0.01,
                market_group_id: None,
            }],
            vec![],
        );
        assert_eq!(catalog.item_name(34), "Tritanium");
        assert_eq!(catalog.item_name(999), "unknown type");
        let _ = RegionId(0);
    }
}
