//! 🚌 The trips flow: live listing → transform → Postgres, and → the snapshot.
//!
//! No fan-out here. The listing already carries every position, so one task does the whole
//! thing top to bottom: transform each trip, batch the moving ones, persist, publish.

use std::time::Instant;

use tracing::{error, info, trace, warn};

use crate::app_config::AppConfig;
use crate::backends::{PositionStore, RecordStore, TransitApi};
use crate::persister::{Upsert, UpsertBatch, persist};
use crate::progress::{Flow, RunReport};
use crate::snapshot::publish_snapshot;
use crate::transforms::{SourceClock, TripRejection, transform_trip};

/// 🚀 Refresh the live trips: one batch of upserts and one rebuilt map.
pub async fn refresh_trips<R, P>(
    api: &TransitApi,
    records: &R,
    positions: &P,
    config: &AppConfig,
) -> RunReport
where
    R: RecordStore + ?Sized,
    P: PositionStore + ?Sized,
{
    let started = Instant::now();
    info!("🚌 Trip refresh started");
    let mut report = RunReport::new(Flow::Trips);

    let listings = match api.list_trips().await {
        Ok(listings) => listings,
        Err(err) => {
            // ⚠️ the map keeps last run's buses; they age out via TTL if this keeps up
            error!("💀 Could not list trips, skipping this run: {err:#}");
            report.elapsed = started.elapsed();
            report.log_summary();
            return report;
        }
    };
    report.listed = listings.len();

    let clock = SourceClock::new(
        &config.trips.source_time_zone,
        &config.trips.modified_date_format,
    );

    let mut batch = UpsertBatch::new();
    let mut entries = Vec::with_capacity(listings.len());
    for trip in &listings {
        match transform_trip(trip, &clock) {
            Ok(transformed) => {
                batch.queue(Upsert::Trip(transformed.record));
                entries.push(transformed.position);
            }
            Err(TripRejection::NotInMotion) => {
                trace!("💤 trip {} is parked, skipping", trip.trip_number);
            }
            Err(rejection) => {
                warn!("⚠️ Dropping trip {}: {}", trip.trip_number, rejection);
            }
        }
    }
    report.produced = batch.len();
    report.dropped = report.listed.saturating_sub(report.produced);

    let outcome = persist(records, batch, "trips").await;
    report.submitted = outcome.submitted;
    report.failed = outcome.failed;

    let snapshot = publish_snapshot(
        positions,
        &entries,
        &config.snapshot.geo_index_key,
        config.snapshot.position_ttl(),
    )
    .await;
    report.positions_written = snapshot.positions_written;
    report.index_rebuilt = snapshot.index_rebuilt;

    report.elapsed = started.elapsed();
    report.log_summary();
    report
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backends::{InMemoryPositionStore, InMemoryRecordStore, TransitApiConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TWO_TRIPS: &str = r#"{"Trips":{"Trip":[
        {"BusType":"Coach","TripNumber":"7131","StartTime":"06:15","EndTime":"07:40","RouteNumber":"19",
         "Latitude":43.7,"Longitude":-79.4,"IsInMotion":true,"DelaySeconds":95,"Course":181.7,
         "FirstStopCode":"100","PrevStopCode":"UN","LastStopCode":"150","ModifiedDate":"2024-01-15 10:30:45"},
        {"BusType":"Coach","TripNumber":"7200","StartTime":"06:30","EndTime":"08:00","RouteNumber":"21",
         "Latitude":43.9,"Longitude":-79.9,"IsInMotion":false,"DelaySeconds":0,"Course":0,
         "FirstStopCode":"200","PrevStopCode":"201","LastStopCode":"250","ModifiedDate":"2024-01-15 10:30:40"}
    ]}}"#;

    async fn trips_server(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ServiceataGlance/Buses/All"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(&server)
            .await;
        server
    }

    fn config_for(server: &MockServer) -> AppConfig {
        let mut config = AppConfig::default().into_dry_run();
        config.transit_api = TransitApiConfig {
            base_url: server.uri(),
            api_key: "k".to_string(),
            ..TransitApiConfig::default()
        };
        config
    }

    #[tokio::test]
    async fn the_one_where_one_bus_moves_and_one_bus_naps() {
        let server = trips_server(TWO_TRIPS).await;
        let config = config_for(&server);
        let api = TransitApi::new(&config.transit_api).expect("💀 client should build");
        let records = InMemoryRecordStore::new();
        let positions = InMemoryPositionStore::new();

        let report = refresh_trips(&api, &records, &positions, &config).await;

        assert_eq!(report.listed, 2);
        assert_eq!(report.produced, 1);
        assert_eq!(report.submitted, 1);
        assert_eq!(report.positions_written, 1);
        assert!(report.index_rebuilt);

        let rows = records.tables().await;
        assert_eq!(rows.trips.len(), 1);
        let row = &rows.trips[&7131];
        // ✅ "UN" is not a stop number: no previous stop, and the run carries on
        assert_eq!(row.prev_stop, -1);
        assert_eq!(row.timestamp, 1_705_332_645);

        let snapshot = positions.tables().await;
        assert_eq!(snapshot.positions.len(), 1);
        assert_eq!(snapshot.positions["7131"].ttl, Duration::from_secs(3600));
        assert_eq!(snapshot.index_len("locates"), 1);
        assert!(snapshot.index_member("locates", "7131").is_some());
        assert!(snapshot.index_member("locates", "7200").is_none());
        assert!(!snapshot.positions.contains_key("7200"));
    }

    #[tokio::test]
    async fn the_one_where_the_second_lap_only_moves_prev_stop_and_delay() {
        let first = trips_server(TWO_TRIPS).await;
        let records = InMemoryRecordStore::new();
        let positions = InMemoryPositionStore::new();
        let config = config_for(&first);
        let api = TransitApi::new(&config.transit_api).expect("💀 client should build");
        refresh_trips(&api, &records, &positions, &config).await;

        let later = trips_server(
            r#"{"Trips":{"Trip":[{"BusType":"Coach","TripNumber":"7131","StartTime":"99:99","EndTime":"07:40",
                "RouteNumber":"19","Latitude":43.75,"Longitude":-79.45,"IsInMotion":true,"DelaySeconds":240,
                "Course":10,"FirstStopCode":"999","PrevStopCode":"105","LastStopCode":"150",
                "ModifiedDate":"2024-01-15 10:31:00"}]}}"#,
        )
        .await;
        let config = config_for(&later);
        let api = TransitApi::new(&config.transit_api).expect("💀 client should build");
        refresh_trips(&api, &records, &positions, &config).await;

        let row = &records.tables().await.trips[&7131];
        assert_eq!(row.prev_stop, 105);
        assert_eq!(row.delay, 240);
        assert_eq!(row.first_stop, 100);
        assert_eq!(row.start_time, "06:15");
    }

    #[tokio::test]
    async fn the_one_where_the_feed_is_down_and_the_map_is_left_alone() {
        let healthy = trips_server(TWO_TRIPS).await;
        let records = InMemoryRecordStore::new();
        let positions = InMemoryPositionStore::new();
        let config = config_for(&healthy);
        let api = TransitApi::new(&config.transit_api).expect("💀 client should build");
        refresh_trips(&api, &records, &positions, &config).await;

        let broken = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&broken)
            .await;
        let config = config_for(&broken);
        let api = TransitApi::new(&config.transit_api).expect("💀 client should build");
        let report = refresh_trips(&api, &records, &positions, &config).await;

        assert_eq!(report.listed, 0);
        assert!(!report.index_rebuilt);
        assert_eq!(positions.tables().await.index_len("locates"), 1);
    }

    #[tokio::test]
    async fn the_one_where_a_garbled_trip_is_dropped_and_its_neighbour_is_not() {
        let server = trips_server(
            r#"{"Trips":{"Trip":[
                {"TripNumber":"abc","IsInMotion":true,"FirstStopCode":"1","LastStopCode":"2","ModifiedDate":"2024-01-15 10:30:45"},
                {"TripNumber":"42","IsInMotion":true,"FirstStopCode":"1","LastStopCode":"2","ModifiedDate":"2024-01-15 10:30:45"}
            ]}}"#,
        )
        .await;
        let config = config_for(&server);
        let api = TransitApi::new(&config.transit_api).expect("💀 client should build");
        let records = InMemoryRecordStore::new();
        let positions = InMemoryPositionStore::new();

        let report = refresh_trips(&api, &records, &positions, &config).await;

        assert_eq!(report.produced, 1);
        assert_eq!(report.dropped, 1);
        assert!(records.tables().await.trips.contains_key(&42));
    }

    #[tokio::test]
    async fn the_one_where_a_null_prev_stop_lands_as_minus_one_and_keeps_its_neighbour() {
        let server = trips_server(
            r#"{"Trips":{"Trip":[
                {"TripNumber":"42","IsInMotion":true,"FirstStopCode":"1","PrevStopCode":null,"LastStopCode":"2",
                 "Latitude":null,"Longitude":-79.4,"ModifiedDate":"2024-01-15 10:30:45"},
                {"TripNumber":"43","IsInMotion":true,"FirstStopCode":"1","PrevStopCode":"7","LastStopCode":"2",
                 "Latitude":43.7,"Longitude":-79.4,"ModifiedDate":"2024-01-15 10:30:45"}
            ]}}"#,
        )
        .await;
        let config = config_for(&server);
        let api = TransitApi::new(&config.transit_api).expect("💀 client should build");
        let records = InMemoryRecordStore::new();
        let positions = InMemoryPositionStore::new();

        let report = refresh_trips(&api, &records, &positions, &config).await;

        assert_eq!(report.listed, 2);
        assert_eq!(report.produced, 2);
        let rows = records.tables().await;
        assert_eq!(rows.trips[&42].prev_stop, -1);
        assert_eq!(rows.trips[&43].prev_stop, 7);
        assert_eq!(positions.tables().await.index_len("locates"), 2);
    }

    #[tokio::test]
    async fn the_one_where_no_buses_means_null_and_null_means_an_empty_map() {
        let server = trips_server(r#"{"Trips":null}"#).await;
        let config = config_for(&server);
        let api = TransitApi::new(&config.transit_api).expect("💀 client should build");
        let records = InMemoryRecordStore::new();
        let positions = InMemoryPositionStore::new();

        let report = refresh_trips(&api, &records, &positions, &config).await;

        assert_eq!(report.listed, 0);
        assert!(report.index_rebuilt, "a quiet night is a successful listing, not an outage");
    }
}
