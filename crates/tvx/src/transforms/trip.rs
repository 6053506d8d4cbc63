//! 🚌 Trip transform: one listing in, one row + one position out (or a polite rejection).
//!
//! 🧠 Knowledge graph:
//! - Stationary trips are skipped before anything else is parsed.
//! - Essential fields (modified date, trip number, first stop, last stop) reject the record.
//! - `PrevStopCode` is optional: blank or junk becomes −1, "no previous stop".
//! - `ModifiedDate` is wall-clock time in a named zone (Eastern, by default). A zone that
//!   can't be resolved, or a local time that doesn't exist (DST spring-forward), becomes −1.
//!
//! ⚠️ The date is rebuilt field-for-field: year, month, day, hour, minute, second.
//! Nobody's day-of-month ends up in the seconds column on our watch. 🦆

use std::fmt;

use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::common::{BusType, GeoMember, Position, PositionEntry, TripListing, TripRecord};

/// 🕰️ The wall clock the transit API lives on: a named zone plus a timestamp format.
#[derive(Debug, Clone)]
pub struct SourceClock {
    zone_name: String,
    /// `None` when the zone name didn't resolve; every timestamp becomes −1
    zone: Option<Tz>,
    format: String,
}

impl SourceClock {
    /// 🏗️ Resolve the zone once per run. A bad zone name is logged, not fatal.
    pub fn new(zone_name: &str, format: &str) -> Self {
        let zone = zone_name.parse::<Tz>().ok();
        if zone.is_none() {
            warn!(
                "⚠️ Could not load time zone '{}': every trip timestamp this run will be the −1 sentinel",
                zone_name
            );
        }
        Self {
            zone_name: zone_name.to_string(),
            zone,
            format: format.to_string(),
        }
    }

    /// 🔢 Parse `raw` as local wall time and convert to unix seconds.
    ///
    /// `Err` only when the text itself doesn't match the format. Zone problems
    /// come back as `Ok(-1)`.
    pub fn to_unix(&self, raw: &str) -> Result<i64, chrono::ParseError> {
        let naive = NaiveDateTime::parse_from_str(raw.trim(), &self.format)?;
        let Some(zone) = self.zone else {
            return Ok(-1);
        };
        // 🔄 ambiguous (fall-back hour) → earliest; nonexistent (spring-forward gap) → sentinel
        match zone.from_local_datetime(&naive).earliest() {
            Some(instant) => Ok(instant.timestamp()),
            None => {
                debug!(
                    "🕳️ '{}' never happened in {} (DST gap), using −1",
                    raw, self.zone_name
                );
                Ok(-1)
            }
        }
    }
}

/// 🚫 Why a trip didn't make it into the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripRejection {
    /// 💤 parked buses are nobody's business
    NotInMotion,
    BadModifiedDate(String),
    BadTripNumber(String),
    BadFirstStop(String),
    BadLastStop(String),
}

impl fmt::Display for TripRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInMotion => write!(f, "trip is not in motion"),
            Self::BadModifiedDate(raw) => write!(f, "ModifiedDate '{raw}' is not a timestamp"),
            Self::BadTripNumber(raw) => write!(f, "TripNumber '{raw}' is not an integer"),
            Self::BadFirstStop(raw) => write!(f, "FirstStopCode '{raw}' is not an integer"),
            Self::BadLastStop(raw) => write!(f, "LastStopCode '{raw}' is not an integer"),
        }
    }
}

/// 📦 The two things a moving trip turns into.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedTrip {
    pub record: TripRecord,
    pub position: PositionEntry,
}

fn parse_code(raw: &str) -> Option<i32> {
    raw.trim().parse().ok()
}

/// 🔄 Listing → row + position. Pure, synchronous, no network.
pub fn transform_trip(
    trip: &TripListing,
    clock: &SourceClock,
) -> Result<TransformedTrip, TripRejection> {
    if !trip.is_in_motion {
        return Err(TripRejection::NotInMotion);
    }

    let timestamp = clock
        .to_unix(&trip.modified_date)
        .map_err(|_| TripRejection::BadModifiedDate(trip.modified_date.clone()))?;

    let trip_id = parse_code(&trip.trip_number)
        .ok_or_else(|| TripRejection::BadTripNumber(trip.trip_number.clone()))?;

    let first_stop = parse_code(&trip.first_stop_code)
        .ok_or_else(|| TripRejection::BadFirstStop(trip.first_stop_code.clone()))?;

    // 🔧 a trip can legitimately have no previous stop yet
    let prev_stop = parse_code(&trip.prev_stop_code).unwrap_or(-1);

    let last_stop = parse_code(&trip.last_stop_code)
        .ok_or_else(|| TripRejection::BadLastStop(trip.last_stop_code.clone()))?;

    let record = TripRecord {
        trip_id,
        route_number: trip.route_number.clone(),
        start_time: trip.start_time.clone(),
        end_time: trip.end_time.clone(),
        bus_type: BusType::from_label(&trip.bus_type),
        first_stop,
        prev_stop,
        last_stop,
        delay: trip.delay_seconds,
        timestamp,
    };

    let position = PositionEntry {
        key: trip.trip_number.clone(),
        position: Position {
            lat: trip.latitude as f32,
            lng: trip.longitude as f32,
            course: trip.course as i32,
            timestamp,
        },
        member: GeoMember {
            name: trip.trip_number.clone(),
            lat: trip.latitude,
            lng: trip.longitude,
        },
    };

    Ok(TransformedTrip { record, position })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    fn eastern() -> SourceClock {
        SourceClock::new("America/New_York", FORMAT)
    }

    fn a_moving_bus() -> TripListing {
        TripListing {
            bus_type: "Coach".to_string(),
            trip_number: "7131".to_string(),
            start_time: "06:15".to_string(),
            end_time: "07:40".to_string(),
            route_number: "19".to_string(),
            latitude: 43.7,
            longitude: -79.4,
            is_in_motion: true,
            delay_seconds: 95,
            course: 181.7,
            first_stop_code: "100".to_string(),
            prev_stop_code: "105".to_string(),
            last_stop_code: "150".to_string(),
            modified_date: "2024-01-15 10:30:45".to_string(),
            ..TripListing::default()
        }
    }

    #[test]
    fn the_one_where_a_healthy_bus_becomes_a_row_and_a_dot_on_the_map() {
        let transformed = transform_trip(&a_moving_bus(), &eastern())
            .expect("💀 a perfectly healthy bus should transform");

        // 🕰️ 10:30:45 EST (UTC−5) == 15:30:45 UTC
        assert_eq!(transformed.record.timestamp, 1_705_332_645);
        assert_eq!(transformed.record.trip_id, 7131);
        assert_eq!(transformed.record.first_stop, 100);
        assert_eq!(transformed.record.prev_stop, 105);
        assert_eq!(transformed.record.last_stop, 150);
        assert_eq!(transformed.record.delay, 95);
        assert_eq!(transformed.record.bus_type, BusType::Coach);

        assert_eq!(transformed.position.key, "7131");
        assert_eq!(transformed.position.position.course, 181);
        assert_eq!(transformed.position.position.timestamp, 1_705_332_645);
        assert_eq!(transformed.position.member.name, "7131");
        assert_eq!(transformed.position.member.lng, -79.4);
    }

    #[test]
    fn the_one_where_daylight_saving_is_respected() {
        // 🌞 July: EDT (UTC−4)
        let stamp = eastern()
            .to_unix("2024-07-01 12:00:00")
            .expect("💀 valid date");
        assert_eq!(stamp, 1_719_849_600);
    }

    #[test]
    fn the_one_where_the_parked_bus_is_ignored() {
        let mut parked = a_moving_bus();
        parked.is_in_motion = false;
        assert_eq!(
            transform_trip(&parked, &eastern()),
            Err(TripRejection::NotInMotion)
        );
    }

    #[test]
    fn the_one_where_no_previous_stop_means_minus_one() {
        let mut fresh_departure = a_moving_bus();
        fresh_departure.prev_stop_code = "UN".to_string();

        let transformed = transform_trip(&fresh_departure, &eastern())
            .expect("💀 a junk prev stop is not fatal");
        assert_eq!(transformed.record.prev_stop, -1);
    }

    #[test]
    fn the_one_where_essential_fields_send_the_record_home() {
        let clock = eastern();

        let mut bad_id = a_moving_bus();
        bad_id.trip_number = "T-7131".to_string();
        assert!(matches!(
            transform_trip(&bad_id, &clock),
            Err(TripRejection::BadTripNumber(_))
        ));

        let mut bad_first = a_moving_bus();
        bad_first.first_stop_code = "".to_string();
        assert!(matches!(
            transform_trip(&bad_first, &clock),
            Err(TripRejection::BadFirstStop(_))
        ));

        let mut bad_last = a_moving_bus();
        bad_last.last_stop_code = "end of the line".to_string();
        assert!(matches!(
            transform_trip(&bad_last, &clock),
            Err(TripRejection::BadLastStop(_))
        ));

        let mut bad_date = a_moving_bus();
        bad_date.modified_date = "2024-01-15T10:30:45Z".to_string();
        assert!(matches!(
            transform_trip(&bad_date, &clock),
            Err(TripRejection::BadModifiedDate(_))
        ));
    }

    #[test]
    fn the_one_where_an_unknown_time_zone_yields_the_sentinel_instant() {
        let lost_in_time = SourceClock::new("Atlantis/Lost_City", FORMAT);
        let transformed = transform_trip(&a_moving_bus(), &lost_in_time)
            .expect("💀 a bad time zone must not drop the record");
        assert_eq!(transformed.record.timestamp, -1);
        assert_eq!(transformed.position.position.timestamp, -1);
    }

    #[test]
    fn the_one_where_the_spring_forward_gap_does_not_exist() {
        // ⏭️ 2024-03-10 02:30 never happened in New York
        assert_eq!(eastern().to_unix("2024-03-10 02:30:00"), Ok(-1));
    }

    #[test]
    fn the_one_where_other_buses_fall_into_the_catch_all() {
        let mut double_decker = a_moving_bus();
        double_decker.bus_type = "Double Decker".to_string();
        let transformed = transform_trip(&double_decker, &eastern()).expect("💀 valid bus");
        assert_eq!(transformed.record.bus_type, BusType::Other);
    }
}
