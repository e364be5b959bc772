//! Static universe topology and item type catalog.
//!
//! Everything here is loaded once at startup and treated as immutable for
//! the lifetime of the process — see the "Lifecycles" note in the data
//! model: "Types/locations/universe are loaded once at startup from static
//! data."

pub mod catalog;
pub mod error;
pub mod graph;
pub mod types;

pub use catalog::StaticCatalog;
pub use error::UniverseError;
pub use graph::UniverseGraph;
pub use types::{ItemType, Location, RegionId, SecurityRating, SolarSystem, StationId, SystemId};
