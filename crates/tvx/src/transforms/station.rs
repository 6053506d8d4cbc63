//! 🚏 Station enrichment: listing meets details, details are all strings, hilarity ensues.

use crate::common::{CompleteStation, StationListing, StationType, StopDetails};
use tracing::trace;

/// 🔧 Best-effort float parse. "N/A" becomes 0.0, blank becomes 0.0, "43.65" becomes 43.65.
fn parse_f64_or_zero(raw: &str) -> f64 {
    raw.trim().parse().unwrap_or_default()
}

/// 🔧 Best-effort integer parse for zone codes. Same forgiveness policy.
fn parse_i32_or_zero(raw: &str) -> i32 {
    raw.trim().parse().unwrap_or_default()
}

/// ✨ Merge a roster listing with its detail fetch.
///
/// Cosmetic fields never fail the record: unparsable numbers fall back to zero
/// and an unknown station type is recorded as [`StationType::Unknown`].
pub fn enrich_station(listing: StationListing, details: StopDetails) -> CompleteStation {
    let station_type = StationType::from_label(&listing.location_type);
    if station_type == StationType::Unknown {
        trace!(
            "🤷 station {} has an unrecognised type '{}', recording the sentinel",
            listing.location_code, listing.location_type
        );
    }

    CompleteStation {
        location_code: listing.location_code,
        station_name: listing.location_name,
        station_type,
        lat: parse_f64_or_zero(&details.latitude),
        lng: parse_f64_or_zero(&details.longitude),
        city: details.city,
        zone_code: parse_i32_or_zero(&details.zone_code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn union_station() -> StationListing {
        StationListing {
            location_code: "UN".to_string(),
            public_stop_id: "".to_string(),
            location_name: "Union Station".to_string(),
            location_type: "Train & Bus Station".to_string(),
        }
    }

    #[test]
    fn the_one_where_all_the_strings_are_actually_numbers() {
        let details = StopDetails {
            zone_code: "02".to_string(),
            city: "Toronto".to_string(),
            latitude: "43.645195".to_string(),
            longitude: "-79.3806".to_string(),
        };

        let station = enrich_station(union_station(), details);

        assert_eq!(station.location_code, "UN");
        assert_eq!(station.station_name, "Union Station");
        assert_eq!(station.station_type, StationType::TrainBusStation);
        assert_eq!(station.lat, 43.645195);
        assert_eq!(station.lng, -79.3806);
        assert_eq!(station.city, "Toronto");
        assert_eq!(station.zone_code, 2);
    }

    #[test]
    fn the_one_where_latitude_is_not_applicable_and_nobody_panics() {
        let details = StopDetails {
            zone_code: "".to_string(),
            city: "Oakville".to_string(),
            latitude: "N/A".to_string(),
            longitude: "-79.6".to_string(),
        };

        let station = enrich_station(union_station(), details);

        // ✅ cosmetic parse failures land as zero, the record survives
        assert_eq!(station.lat, 0.0);
        assert_eq!(station.lng, -79.6);
        assert_eq!(station.zone_code, 0);
    }

    #[test]
    fn the_one_where_a_mystery_station_type_is_kept_anyway() {
        let mut listing = union_station();
        listing.location_type = "Hovercraft Pier".to_string();

        let station = enrich_station(listing, StopDetails::default());

        assert_eq!(station.station_type, StationType::Unknown);
        assert_eq!(station.station_type.code(), -1);
    }
}
