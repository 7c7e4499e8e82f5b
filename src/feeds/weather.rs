//! Current weather for one city
//!
//! Chinese-locale consumers are served from `{mirror}/v2/weather?query={city}`
//! with Open-Meteo as the fallback. Everyone else goes straight to Open-Meteo:
//! geocode the city, then fetch current conditions and describe the WMO
//! weather code in the consumer's language.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::form_urlencoded::byte_serialize;

use super::{FeedSource, Fetched};
use crate::config::FeedsConfig;
use crate::error::FetchError;
use crate::fetch::{mirror_data, FetchOrchestrator, Secondary};
use crate::text::repair_mis_decoded;

const FAMILY: &str = "weather";

/// Normalized current conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub city: String,
    pub temp_celsius: f64,
    pub description: String,
}

/// Types of weather conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    FreezingRain,
    Snow,
    Showers,
    Thunderstorm,
}

/// Map WMO weather code to WeatherCondition enum
///
/// Weather codes from WMO (World Meteorological Organization):
/// - 0: Clear sky
/// - 1-2: Mainly clear, partly cloudy
/// - 3: Overcast
/// - 45, 48: Fog
/// - 51-55: Drizzle
/// - 56-57, 66-67: Freezing drizzle / freezing rain
/// - 61-65: Rain
/// - 71-77, 85-86: Snow, snow showers
/// - 80-82: Rain showers
/// - 95-99: Thunderstorm
pub fn weather_code_to_condition(code: u8) -> WeatherCondition {
    match code {
        0 => WeatherCondition::Clear,
        1..=2 => WeatherCondition::PartlyCloudy,
        3 => WeatherCondition::Cloudy,
        45 | 48 => WeatherCondition::Fog,
        51..=55 => WeatherCondition::Drizzle,
        56..=57 | 66..=67 => WeatherCondition::FreezingRain,
        61..=65 => WeatherCondition::Rain,
        71..=77 | 85..=86 => WeatherCondition::Snow,
        80..=82 => WeatherCondition::Showers,
        95..=99 => WeatherCondition::Thunderstorm,
        _ => WeatherCondition::Cloudy, // Default for unknown codes
    }
}

/// Human-readable description of a condition, keyed by language
pub fn describe(condition: WeatherCondition, language: &str) -> &'static str {
    use WeatherCondition::*;

    let zh = language.starts_with("zh");
    match (condition, zh) {
        (Clear, true) => "晴",
        (Clear, false) => "Clear",
        (PartlyCloudy, true) => "多云",
        (PartlyCloudy, false) => "Partly cloudy",
        (Cloudy, true) => "阴",
        (Cloudy, false) => "Overcast",
        (Fog, true) => "雾",
        (Fog, false) => "Fog",
        (Drizzle, true) => "毛毛雨",
        (Drizzle, false) => "Drizzle",
        (Rain, true) => "雨",
        (Rain, false) => "Rain",
        (FreezingRain, true) => "冻雨",
        (FreezingRain, false) => "Freezing rain",
        (Snow, true) => "雪",
        (Snow, false) => "Snow",
        (Showers, true) => "阵雨",
        (Showers, false) => "Rain showers",
        (Thunderstorm, true) => "雷暴",
        (Thunderstorm, false) => "Thunderstorm",
    }
}

/// Mirror response body (`data` object)
#[derive(Debug, Deserialize)]
struct MirrorWeather {
    #[serde(default)]
    location: MirrorLocation,
    weather: MirrorConditions,
}

#[derive(Debug, Default, Deserialize)]
struct MirrorLocation {
    #[serde(default)]
    city: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    formatted: String,
}

#[derive(Debug, Deserialize)]
struct MirrorConditions {
    temperature: f64,
    #[serde(default)]
    condition: String,
}

/// Open-Meteo geocoding response
#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
}

/// Open-Meteo forecast response, current block only
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature_2m: f64,
    weather_code: u8,
}

/// Fetches current weather for a configured city
#[derive(Debug, Clone)]
pub struct WeatherSource {
    city: String,
    language: &'static str,
    use_mirrors: bool,
    ttl: Duration,
    timeout: Duration,
    geocoding_url: String,
    forecast_url: String,
}

impl WeatherSource {
    pub fn new(city: impl Into<String>, config: &FeedsConfig) -> Self {
        Self {
            city: city.into(),
            language: config.language(),
            use_mirrors: config.is_local_language(),
            ttl: config.weather_ttl,
            timeout: config.weather_timeout,
            geocoding_url: config.geocoding_url.clone(),
            forecast_url: config.forecast_url.clone(),
        }
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    fn mirror_url(&self, base: &str) -> String {
        format!("{}/v2/weather?query={}", base, encode(&self.city))
    }

    fn geocoding_query(&self) -> String {
        format!(
            "{}?name={}&count=1&language={}&format=json",
            self.geocoding_url,
            encode(&self.city),
            self.language
        )
    }

    fn forecast_query(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}?latitude={}&longitude={}&current=temperature_2m,weather_code&timezone=auto",
            self.forecast_url, latitude, longitude
        )
    }

    /// Geocodes the city, then reads current conditions
    async fn fetch_open_meteo(&self, orchestrator: &FetchOrchestrator) -> Result<Fetched<Weather>, FetchError> {
        let body = orchestrator.get_json(&self.geocoding_query(), self.timeout).await?;
        let place = parse_geocoding(body)?;

        let body = orchestrator
            .get_json(&self.forecast_query(place.latitude, place.longitude), self.timeout)
            .await?;
        let forecast: ForecastResponse = serde_json::from_value(body)?;

        let condition = weather_code_to_condition(forecast.current.weather_code);
        Ok(Fetched::new(
            Weather {
                city: place.name,
                temp_celsius: forecast.current.temperature_2m,
                description: describe(condition, self.language).to_string(),
            },
            None,
        ))
    }
}

#[async_trait]
impl FeedSource for WeatherSource {
    type Payload = Weather;

    fn family(&self) -> &'static str {
        FAMILY
    }

    fn cache_key(&self) -> String {
        format!("weather_{}", self.city.trim().to_lowercase())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn fetch(&self, orchestrator: &FetchOrchestrator) -> Result<Fetched<Weather>, FetchError> {
        if !self.use_mirrors {
            return self
                .fetch_open_meteo(orchestrator)
                .await
                .map_err(|e| FetchError::AllCandidatesExhausted(Box::new(e)));
        }

        let secondary: Secondary<'_, Fetched<Weather>> = Box::pin(self.fetch_open_meteo(orchestrator));
        orchestrator
            .fetch_with_failover(
                FAMILY,
                |base| self.mirror_url(base),
                parse_mirror,
                self.timeout,
                Some(secondary),
            )
            .await
    }
}

/// URL-encodes a query value
fn encode(value: &str) -> String {
    byte_serialize(value.trim().as_bytes()).collect()
}

/// Validates and normalizes a mirror response
fn parse_mirror(body: Value) -> Result<Fetched<Weather>, FetchError> {
    let raw: MirrorWeather = serde_json::from_value(mirror_data(body)?)?;

    let city = [raw.location.city, raw.location.name, raw.location.formatted]
        .into_iter()
        .map(|s| repair_mis_decoded(s.trim()))
        .find(|s| !s.is_empty())
        .ok_or_else(|| FetchError::rejected("missing city"))?;

    Ok(Fetched::new(
        Weather {
            city,
            temp_celsius: raw.weather.temperature,
            description: repair_mis_decoded(raw.weather.condition.trim()),
        },
        None,
    ))
}

/// Picks the first geocoding match
fn parse_geocoding(body: Value) -> Result<GeocodingResult, FetchError> {
    let geocoding: GeocodingResponse = serde_json::from_value(body)?;
    geocoding
        .results
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::rejected("city not found"))
}
