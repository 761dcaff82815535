//! Weather acquisition against the Open-Meteo API, served cache-first with
//! the same stale-fallback contract as feeds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use lookout_common::config::WeatherConfig;
use lookout_common::error::{CacheError, FetchError};
use lookout_common::models::{CurrentWeather, DailyForecast, HourlyForecast, WeatherData};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cache::{Acquired, CacheStore, CachedValue, stale_fallback};
use crate::fetcher::transport::{build_client, check_status, map_reqwest_error};
use crate::retry::RetryPolicy;

pub const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

const CURRENT_FIELDS: &str = "temperature_2m,wind_speed_10m";
const HOURLY_FIELDS: &str = "temperature_2m,relative_humidity_2m,wind_speed_10m";
const DAILY_FIELDS: &str = "temperature_2m_min,temperature_2m_max,precipitation_sum,precipitation_probability_max";
const FORECAST_DAYS: u8 = 5;

pub type WeatherOutcome = Acquired<WeatherData>;

#[async_trait]
pub trait WeatherClient: Send + Sync {
    async fn fetch(&self, location: &WeatherConfig) -> Result<WeatherData, FetchError>;
}

/// Result of a place-name lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

pub struct OpenMeteoClient {
    client: reqwest::Client,
    forecast_url: String,
    geocoding_url: String,
    retry: RetryPolicy,
}

impl OpenMeteoClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            forecast_url: FORECAST_URL.to_string(),
            geocoding_url: GEOCODING_URL.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_base_urls(mut self, forecast_url: impl Into<String>, geocoding_url: impl Into<String>) -> Self {
        self.forecast_url = forecast_url.into();
        self.geocoding_url = geocoding_url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolves a place name or postcode. `None` when nothing matched.
    pub async fn geocode(&self, query: &str) -> Result<Option<GeoLocation>, FetchError> {
        let params = [
            ("name", query.to_string()),
            ("count", "1".to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ];
        let response: GeocodingResponse = self.get_json(&self.geocoding_url, &params).await?;
        let Some(hit) = response.results.into_iter().next() else {
            return Ok(None);
        };

        let mut parts = vec![hit.name.unwrap_or_else(|| query.to_string())];
        if let Some(admin) = hit.admin1.filter(|a| !a.is_empty() && *a != parts[0]) {
            parts.push(admin);
        } else if let Some(country) = hit.country.filter(|c| !c.is_empty()) {
            parts.push(country);
        }

        Ok(Some(GeoLocation {
            name: parts.join(", "),
            latitude: hit.latitude,
            longitude: hit.longitude,
        }))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, params: &[(&str, String)]) -> Result<T, FetchError> {
        let client = &self.client;
        let body = self
            .retry
            .run(url, move || async move {
                let response = client.get(url).query(params).send().await.map_err(map_reqwest_error)?;
                check_status(response.status())?;
                response.text().await.map_err(map_reqwest_error)
            })
            .await?;
        serde_json::from_str(&body).map_err(|e| FetchError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl WeatherClient for OpenMeteoClient {
    async fn fetch(&self, location: &WeatherConfig) -> Result<WeatherData, FetchError> {
        let params = [
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("forecast_days", FORECAST_DAYS.to_string()),
            ("timezone", "auto".to_string()),
        ];
        let response: ForecastResponse = self.get_json(&self.forecast_url, &params).await?;
        Ok(response.into_weather(&location.location_name))
    }
}

pub struct WeatherService {
    client: Arc<dyn WeatherClient>,
    cache: Arc<CacheStore>,
    ttl: Duration,
}

impl WeatherService {
    pub fn new(client: Arc<dyn WeatherClient>, cache: Arc<CacheStore>, ttl: Duration) -> Self {
        Self { client, cache, ttl }
    }

    pub async fn fetch(&self, location: &WeatherConfig) -> Result<WeatherOutcome, FetchError> {
        self.fetch_with_preview(location, &ignore_preview).await
    }

    /// Like [`fetch`](Self::fetch); `preview` sees an expired cache entry
    /// before the network attempt starts.
    pub async fn fetch_with_preview(
        &self,
        location: &WeatherConfig,
        preview: &(dyn Fn(&WeatherOutcome) + Send + Sync),
    ) -> Result<WeatherOutcome, FetchError> {
        let key = location.cache_key();
        let cached: Option<CachedValue<WeatherData>> = match self.cache.get_as(&key) {
            Ok(entry) => Some(entry),
            Err(CacheError::NotFound(_)) => None,
            Err(e) => {
                warn!("ignoring cache entry {key}: {e}");
                None
            }
        };

        if let Some(entry) = &cached
            && entry.is_fresh
        {
            debug!("weather for {}: served from cache", location.location_name);
            return Ok(Acquired::from_cached(entry));
        }
        if let Some(entry) = &cached {
            preview(&Acquired::from_cached(entry));
        }

        match self.client.fetch(location).await {
            Ok(data) => {
                if let Err(e) = self.cache.put_as(&key, &data, self.ttl) {
                    warn!("could not cache weather: {e}");
                }
                Ok(Acquired::fresh(data))
            }
            Err(e) => {
                warn!("weather for {} failed: {e}", location.location_name);
                stale_fallback(cached, e)
            }
        }
    }
}

fn ignore_preview(_: &WeatherOutcome) {}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ForecastResponse {
    latitude: f64,
    longitude: f64,
    timezone: Option<String>,
    current: Option<CurrentBlock>,
    current_units: HashMap<String, String>,
    hourly: HourlyBlock,
    daily: DailyBlock,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CurrentBlock {
    time: Option<String>,
    temperature_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HourlyBlock {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    relative_humidity_2m: Vec<Option<f64>>,
    wind_speed_10m: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DailyBlock {
    time: Vec<String>,
    temperature_2m_min: Vec<Option<f64>>,
    temperature_2m_max: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
    precipitation_probability_max: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeocodingResponse {
    results: Vec<GeocodingHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeocodingHit {
    name: Option<String>,
    admin1: Option<String>,
    country: Option<String>,
    latitude: f64,
    longitude: f64,
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

fn parse_local_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

impl ForecastResponse {
    fn into_weather(self, location_name: &str) -> WeatherData {
        let unit = |field: &str, fallback: &str| {
            self.current_units.get(field).cloned().unwrap_or_else(|| fallback.to_string())
        };

        let current = self.current.as_ref().and_then(|c| {
            Some(CurrentWeather {
                temperature: c.temperature_2m?,
                wind_speed: c.wind_speed_10m.unwrap_or_default(),
                time: c.time.as_deref().and_then(parse_local_time)?,
                temperature_unit: unit("temperature_2m", "°C"),
                wind_speed_unit: unit("wind_speed_10m", "km/h"),
            })
        });

        let hourly_block = &self.hourly;
        let hourly = hourly_block
            .time
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                Some(HourlyForecast {
                    time: parse_local_time(raw)?,
                    temperature: at(&hourly_block.temperature_2m, i)?,
                    humidity: at(&hourly_block.relative_humidity_2m, i)?.round().clamp(0.0, 100.0) as u8,
                    wind_speed: at(&hourly_block.wind_speed_10m, i)?,
                })
            })
            .collect();

        let daily_block = &self.daily;
        let daily = daily_block
            .time
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                Some(DailyForecast {
                    date: NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?,
                    temp_min: at(&daily_block.temperature_2m_min, i)?,
                    temp_max: at(&daily_block.temperature_2m_max, i)?,
                    precipitation_sum: at(&daily_block.precipitation_sum, i).unwrap_or_default(),
                    precipitation_probability: at(&daily_block.precipitation_probability_max, i)
                        .unwrap_or_default()
                        .round()
                        .clamp(0.0, 100.0) as u8,
                })
            })
            .collect();

        WeatherData {
            location_name: location_name.to_string(),
            latitude: self.latitude,
            longitude: self.longitude,
            timezone: self.timezone.clone().unwrap_or_else(|| "GMT".to_string()),
            current,
            hourly,
            daily,
            fetched_at: Utc::now(),
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
