pub mod detector;
pub mod record;
pub mod snapshot;
pub mod store;

pub use detector::{has_moved, IdentityError};
pub use record::{Altitude, Position, TrackedObjectRecord, AIRCRAFT_KIND};
pub use snapshot::{AltitudeValue, Snapshot, SourceAircraft, SourceSchema};
pub use store::{DirtyEntry, PositionStore, PurgeStats, Sightings, StoreEntry};
