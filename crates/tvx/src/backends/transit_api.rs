use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::common::{
    AllStationsResponse, BusesGlanceResponse, StationDetailsResponse, StationListing, StopDetails,
    TripListing,
};

// 🔧 Lives here and not in app_config.rs, because configs live near the thing they configure.
#[derive(Debug, Deserialize, Clone)]
pub struct TransitApiConfig {
    /// 📡 Everything up to and including `/V1`. The endpoint paths get glued on after it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 🔒 Sent as `?key=` on every request. Empty means "rejected", not "anonymous".
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://api.openmetrolinx.com/OpenDataAPI/api/V1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for TransitApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// 📡 The one and only source: three GET endpoints and a key.
///
/// Cheap to clone (reqwest's client is an `Arc` inside), so every detail worker
/// gets its own handle and nobody waits on a lock to make a request.
#[derive(Debug, Clone)]
pub struct TransitApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TransitApi {
    /// 🚀 Build the HTTP client. No ping here: the API is polled every few seconds,
    /// so if it's down we'll hear about it soon enough.
    pub fn new(config: &TransitApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. Probably TLS. It's always TLS.")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// 🚏 `GET /Stop/All` → the whole roster. Whatever order the API likes.
    pub async fn list_stations(&self) -> Result<Vec<StationListing>> {
        let response: AllStationsResponse = self.get_json(&["Stop", "All"]).await?;
        Ok(response.stations.station)
    }

    /// 🔍 `GET /Stop/Details/{code}` → the half of a station the roster forgot.
    pub async fn station_details(&self, location_code: &str) -> Result<StopDetails> {
        // 🔒 the code is one path segment; a '/' or '?' in it gets escaped, not obeyed
        let response: StationDetailsResponse = self
            .get_json(&["Stop", "Details", location_code.trim()])
            .await?;
        Ok(response.stop)
    }

    /// 🚌 `GET /ServiceataGlance/Buses/All` → every live trip, positions included.
    pub async fn list_trips(&self) -> Result<Vec<TripListing>> {
        let response: BusesGlanceResponse =
            self.get_json(&["ServiceataGlance", "Buses", "All"]).await?;
        Ok(response.trips.trip)
    }

    fn endpoint_url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url).with_context(|| {
            format!("💀 '{}' is not a URL. Check transit_api.base_url.", self.base_url)
        })?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("💀 '{}' can't have a path glued onto it", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let endpoint = segments.join("/");
        let url = self.endpoint_url(segments)?;

        debug!("📡 GET {}", endpoint);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("💀 GET {endpoint} never came back. The network is giving us the silent treatment."))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("💀 GET {endpoint} answered, then hung up mid-sentence"))?;
        if !status.is_success() {
            bail!(
                "💀 GET {} said '{}'. The body read: '{}'",
                endpoint,
                status,
                body
            );
        }

        trace!("📦 GET {} returned {} bytes", endpoint, body.len());
        serde_json::from_str(&body)
            .with_context(|| format!("💀 GET {endpoint} returned something that isn't the JSON we were promised"))
    }
}
