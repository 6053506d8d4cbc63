//! 🚰 Pipelines: the two flows, start to finish.
//!
//! Both have the same shape: list → enrich/transform → persist, and the trips flow
//! also publishes a snapshot. Both return a [`RunReport`](crate::progress::RunReport)
//! no matter what happened along the way. Errors end up in the log, not in `main`.
//!
//! - [`refresh_stations`]: the monthly roster refresh, with the rate-limited fan-out.
//! - [`refresh_trips`]: the every-few-seconds live refresh, single task end to end.

mod stations;
mod trips;

pub use stations::refresh_stations;
pub use trips::refresh_trips;
