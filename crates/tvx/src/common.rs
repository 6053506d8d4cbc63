//! 📦 Common data structures: the building blocks of tvx
//!
//! 🎬 COLD OPEN: EXT. BUS TERMINAL, 6:02 AM
//!
//! A coach idles at bay 7. Its GPS unit phones home. Somewhere, an API gateway
//! wraps that phone call in three layers of JSON envelope and hands it to us.
//! We unwrap it, we straighten its tie, and we send it along. Every 15 seconds.
//! Forever. 🦆
//!
//! This module holds the shapes that travel through the pipeline:
//! - listing records: raw, exactly as the transit API serves them
//! - enriched records: a listing merged with its detail fetch ([`CompleteStation`])
//! - derived records: a trip listing transformed into a row + a position ([`TripRecord`], [`Position`])
//!
//! All of them live for exactly one run. Nothing here survives to the next tick
//! except what lands in Postgres or Redis.

use serde::{Deserialize, Deserializer, Serialize};

/// 🕳️ A JSON `null` reads as the field's default, same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 🕳️ `null` lists read as empty, and `null` entries inside a list are dropped.
fn nulls_skipped<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let entries = Option::<Vec<Option<T>>>::deserialize(deserializer)?;
    Ok(entries.unwrap_or_default().into_iter().flatten().collect())
}

// ============================================================
//  📡 Listing records: straight off the wire
// ============================================================

/// 📡 Envelope for `Stop/All`: `{ Stations: { Station: [...] } }`.
/// Two layers of wrapping for one list. Like a gift box inside a gift box.
#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct AllStationsResponse {
    #[serde(rename = "Stations", default, deserialize_with = "null_as_default")]
    pub stations: StationList,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct StationList {
    #[serde(rename = "Station", default, deserialize_with = "nulls_skipped")]
    pub station: Vec<StationListing>,
}

/// 🚏 One stop from the roster. Immutable once fetched. Identified by `LocationCode`.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct StationListing {
    #[serde(rename = "LocationCode", default, deserialize_with = "null_as_default")]
    pub location_code: String,
    #[serde(rename = "PublicStopID", default, deserialize_with = "null_as_default")]
    pub public_stop_id: String,
    #[serde(rename = "LocationName", default, deserialize_with = "null_as_default")]
    pub location_name: String,
    #[serde(rename = "LocationType", default, deserialize_with = "null_as_default")]
    pub location_type: String,
}

/// 📡 Envelope for `Stop/Details/{code}`: `{ Stop: { ... } }`.
#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct StationDetailsResponse {
    #[serde(rename = "Stop", default, deserialize_with = "null_as_default")]
    pub stop: StopDetails,
}

/// 🔍 Detail fetch payload. Every field is a string, including the numbers.
/// Yes, the latitude is a string. No, we don't know why either.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct StopDetails {
    #[serde(rename = "ZoneCode", default, deserialize_with = "null_as_default")]
    pub zone_code: String,
    #[serde(rename = "City", default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(rename = "Latitude", default, deserialize_with = "null_as_default")]
    pub latitude: String,
    #[serde(rename = "Longitude", default, deserialize_with = "null_as_default")]
    pub longitude: String,
}

/// 📡 Envelope for `ServiceataGlance/Buses/All` (sic, the typo is the API's, not ours).
#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct BusesGlanceResponse {
    #[serde(rename = "Trips", default, deserialize_with = "null_as_default")]
    pub trips: TripList,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct TripList {
    #[serde(rename = "Trip", default, deserialize_with = "nulls_skipped")]
    pub trip: Vec<TripListing>,
}

/// 🚌 One live trip, as the API reports it. Already carries its position,
/// so no second fetch is needed. Stop codes arrive as strings and may be
/// blank when the bus hasn't passed a stop yet.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TripListing {
    #[serde(rename = "BusType", deserialize_with = "null_as_default")]
    pub bus_type: String,
    #[serde(rename = "TripNumber", deserialize_with = "null_as_default")]
    pub trip_number: String,
    #[serde(rename = "StartTime", deserialize_with = "null_as_default")]
    pub start_time: String,
    #[serde(rename = "EndTime", deserialize_with = "null_as_default")]
    pub end_time: String,
    #[serde(rename = "LineCode", deserialize_with = "null_as_default")]
    pub line_code: String,
    #[serde(rename = "RouteNumber", deserialize_with = "null_as_default")]
    pub route_number: String,
    #[serde(rename = "VariantDir", deserialize_with = "null_as_default")]
    pub variant_dir: String,
    #[serde(rename = "Display", deserialize_with = "null_as_default")]
    pub display: String,
    #[serde(rename = "Latitude", deserialize_with = "null_as_default")]
    pub latitude: f64,
    #[serde(rename = "Longitude", deserialize_with = "null_as_default")]
    pub longitude: f64,
    #[serde(rename = "IsInMotion", deserialize_with = "null_as_default")]
    pub is_in_motion: bool,
    #[serde(rename = "DelaySeconds", deserialize_with = "null_as_default")]
    pub delay_seconds: i32,
    #[serde(rename = "Course", deserialize_with = "null_as_default")]
    pub course: f64,
    #[serde(rename = "FirstStopCode", deserialize_with = "null_as_default")]
    pub first_stop_code: String,
    #[serde(rename = "LastStopCode", deserialize_with = "null_as_default")]
    pub last_stop_code: String,
    #[serde(rename = "PrevStopCode", deserialize_with = "null_as_default")]
    pub prev_stop_code: String,
    #[serde(rename = "NextStopCode", deserialize_with = "null_as_default")]
    pub next_stop_code: String,
    #[serde(rename = "AtStationCode", deserialize_with = "null_as_default")]
    pub at_station_code: String,
    #[serde(rename = "ModifiedDate", deserialize_with = "null_as_default")]
    pub modified_date: String,
}

// ============================================================
//  🏷️ Closed enumerations
// ============================================================

/// 🏷️ What kind of stop is this? Five answers, plus a shrug.
///
/// [`StationType::from_label`] is a direct match table, no scanning.
/// `Unknown` is stored as −1 so the row still lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationType {
    BusStop,
    BusTerminal,
    ParkRide,
    TrainBusStation,
    TrainStation,
    /// 🤷 the API said something we've never heard of
    Unknown,
}

impl StationType {
    /// 🔍 Exact-match lookup. Case matters. Whitespace matters. Feelings do not.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Bus Stop" => Self::BusStop,
            "Bus Terminal" => Self::BusTerminal,
            "Park & Ride" => Self::ParkRide,
            "Train & Bus Station" => Self::TrainBusStation,
            "Train Station" => Self::TrainStation,
            _ => Self::Unknown,
        }
    }

    /// 🔢 The integer that goes in the `station_type` column.
    pub fn code(self) -> i32 {
        match self {
            Self::BusStop => 0,
            Self::BusTerminal => 1,
            Self::ParkRide => 2,
            Self::TrainBusStation => 3,
            Self::TrainStation => 4,
            Self::Unknown => -1,
        }
    }
}

/// 🚌 Coach or... not coach. The API knows more kinds; we only care about one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusType {
    Coach,
    /// 📦 catch-all for every other bus type string
    Other,
}

impl BusType {
    pub fn from_label(label: &str) -> Self {
        match label {
            "Coach" => Self::Coach,
            _ => Self::Other,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Coach => 0,
            Self::Other => 1,
        }
    }
}

// ============================================================
//  🏗️ Enriched + derived records
// ============================================================

/// 🚏✨ A station listing merged with its detail fetch.
///
/// Built by exactly one detail worker, owned by that worker until it's sent
/// down the channel, and never touched again after that.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteStation {
    pub location_code: String,
    pub station_name: String,
    pub station_type: StationType,
    pub lat: f64,
    pub lng: f64,
    pub city: String,
    pub zone_code: i32,
}

/// 🚌📋 One row for the `trips` table, derived purely from a [`TripListing`].
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub trip_id: i32,
    pub route_number: String,
    pub start_time: String,
    pub end_time: String,
    pub bus_type: BusType,
    pub first_stop: i32,
    /// −1 when the bus has no previous stop yet
    pub prev_stop: i32,
    pub last_stop: i32,
    pub delay: i32,
    /// unix seconds, or −1 when the source time zone could not be resolved
    pub timestamp: i64,
}

/// 📍 The tiny blob stored per trip in the key store.
///
/// Field names are PascalCase on the wire because the readers on the other side
/// of Redis expect `{"Lat":..,"Lng":..,"Course":..,"Timestamp":..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Position {
    pub lat: f32,
    pub lng: f32,
    pub course: i32,
    pub timestamp: i64,
}

/// 🗺️ One member of the geo index: name + coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoMember {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

/// 📍🗺️ Everything the snapshot publisher needs for one in-motion trip.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEntry {
    /// the per-entity key (the trip number, as the API spells it)
    pub key: String,
    pub position: Position,
    pub member: GeoMember,
}
