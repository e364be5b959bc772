use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};

/// Stable 32-bit solar system identifier, as handed out by the upstream API.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
pub struct SystemId(pub u32);

/// Stable 32-bit region identifier.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
pub struct RegionId(pub u32);

/// 64-bit location identifier (station or structure).
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
pub struct StationId(pub u64);

/// Security rating in `[-1.0, 1.0]`. Higher is safer.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct SecurityRating(pub f64);

impl SecurityRating {
    pub fn meets_floor(&self, floor: Option<f64>) -> bool {
        match floor {
            Some(floor) => self.0 >= floor,
            None => true,
        }
    }
}

/// A solar system node in the [`crate::graph::UniverseGraph`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SolarSystem {
    pub id: SystemId,
    pub name: String,
    pub region_id: RegionId,
    pub security: SecurityRating,
}

/// A station or structure resolving to a containing [`SolarSystem`].
///
/// Stations are catalog-known (present in [`crate::catalog::StaticCatalog`]).
/// Structures are opaque 64-bit ids outside the catalog range and require an
/// authorized upstream lookup, cached by id in `flipper-client`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Location {
    pub id: StationId,
    pub name: String,
    pub system_id: SystemId,
}

/// Immutable item type metadata.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ItemType {
    pub type_id: u32,
    pub name: String,
    pub volume_m3: f64,
    pub market_group_id: Option<u32>,
}

impl ItemType {
    /// Blueprint copies/originals are excluded from contract item pricing
    /// (§4.1.3 step 6: "non-blueprint included items").
    pub fn is_blueprint(&self) -> bool {
        // Blueprint market groups live under a well-known subtree in the
        // upstream catalog; callers outside this crate should prefer
        // checking this flag over the raw group id.
        matches!(self.market_group_id, Some(group) if BLUEPRINT_MARKET_GROUPS.contains(&group))
    }
}

/// Market group ids the upstream catalog assigns to blueprints, as of the
/// current public type catalog snapshot. Re-verify against the upstream
/// catalog if it changes (see Open Questions in SPEC_FULL.md).
pub const BLUEPRINT_MARKET_GROUPS: &[u32] = &[2, 477];
