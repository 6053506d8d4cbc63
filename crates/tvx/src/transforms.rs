//! 🔄 Transforms: turning what the API says into what the stores want.
//!
//! 🎬 COLD OPEN: INT. CUSTOMS HALL, 6:03 AM
//!
//! Two queues. On the left: station listings, clutching detail responses full of
//! latitudes typed as strings. On the right: trip listings, timestamps in Eastern
//! Time, stop codes that may or may not be numbers today. The customs officer
//! (this module) stamps what it can, substitutes a sentinel where the paperwork is
//! cosmetic, and turns back anyone whose passport (trip id, first/last stop) is bogus.
//!
//! ## Knowledge Graph 🧠
//! - `station`: listing + details → [`CompleteStation`](crate::common::CompleteStation).
//!   Numeric parse failures default to zero. Never fails.
//! - `trip`: listing → [`TripRecord`](crate::common::TripRecord) + [`PositionEntry`](crate::common::PositionEntry).
//!   Essential field failures drop the record; prev-stop and the time zone fall back to −1.
//! - Pure functions, no I/O. The pipelines call them; the tests love them. 🦆

pub(crate) mod station;
pub(crate) mod trip;

pub use station::enrich_station;
pub use trip::{SourceClock, TransformedTrip, TripRejection, transform_trip};
