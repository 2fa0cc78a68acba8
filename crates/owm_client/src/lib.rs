//! OpenWeatherMap current-weather client.
//!
//! Issues one GET per query against the configured endpoint and maps the
//! response body onto the shared `WeatherReading`.

use common::config::ProviderConfig;
use common::{clamp01, Error, WeatherQuery, WeatherReading};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// OpenWeatherMap API client.
#[derive(Debug, Clone)]
pub struct OwmClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

// ── OWM response types ────────────────────────────────────────────────

/// Body of `/data/2.5/weather`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct CurrentWeatherResponse {
    #[serde(default)]
    pub main: Option<MainSection>,
    #[serde(default)]
    pub wind: Option<WindSection>,
    #[serde(default)]
    pub clouds: Option<CloudsSection>,
    #[serde(default)]
    pub rain: Option<Volume>,
    #[serde(default)]
    pub snow: Option<Volume>,
}

#[derive(Debug, Deserialize)]
pub struct MainSection {
    #[serde(default)]
    pub temp: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct WindSection {
    #[serde(default)]
    pub speed: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct CloudsSection {
    #[serde(default)]
    pub all: Option<f32>,
}

/// Rain or snow volume for the last one / three hours (mm).
#[derive(Debug, Deserialize)]
pub struct Volume {
    #[serde(rename = "1h", default)]
    pub one_hour: Option<f32>,
    #[serde(rename = "3h", default)]
    pub three_hours: Option<f32>,
}

// ── Implementation ────────────────────────────────────────────────────

impl OwmClient {
    pub fn new(config: &ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("weather-stamp/0.1")
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .expect("failed to build OpenWeatherMap HTTP client");

        Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.trim().to_string(),
        }
    }

    /// Whether an `appid` credential is configured.
    pub fn has_credential(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Query parameters for one request, in wire order.
    pub fn query_params(&self, query: &WeatherQuery) -> Vec<(&'static str, String)> {
        let mut params = match query {
            WeatherQuery::City(name) => vec![("q", name.clone())],
            WeatherQuery::Coords { lat, lon } => {
                vec![("lat", lat.to_string()), ("lon", lon.to_string())]
            }
        };
        params.push(("units", "metric".to_string()));
        params.push(("appid", self.api_key.clone()));
        params
    }

    /// Fetch current weather for a query. The returned reading has an empty
    /// `source_label`; the caller assigns it.
    pub async fn fetch_current(&self, query: &WeatherQuery) -> Result<WeatherReading, Error> {
        if !self.has_credential() {
            return Err(Error::Config("OpenWeatherMap API key is not configured".into()));
        }

        debug!("Fetching OpenWeatherMap current weather: {} {}", self.api_base, query);

        let resp = self
            .client
            .get(&self.api_base)
            .query(&self.query_params(query))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP error for {query}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "OpenWeatherMap returned {} for {}: {}",
                status.as_u16(),
                query,
                body.chars().take(500).collect::<String>()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Body read error for {query}: {e}")))?;

        parse_body(&body)
    }
}

/// Parse a raw response body into a reading.
pub fn parse_body(body: &str) -> Result<WeatherReading, Error> {
    if body.trim().is_empty() {
        return Err(Error::Parse("empty response body".into()));
    }
    let payload: CurrentWeatherResponse =
        serde_json::from_str(body).map_err(|e| Error::Parse(format!("JSON parse error: {e}")))?;
    Ok(map_response(&payload))
}

/// Per-hour volume: the 1h value when positive, otherwise a third of the 3h
/// value when that is positive.
fn per_hour(volume: Option<&Volume>) -> f32 {
    let Some(v) = volume else {
        return 0.0;
    };
    let one = v.one_hour.unwrap_or(0.0);
    let three = v.three_hours.unwrap_or(0.0);
    if one <= 0.0 && three > 0.0 {
        three / 3.0
    } else {
        one
    }
}

/// Map an OWM body onto a reading.
pub fn map_response(r: &CurrentWeatherResponse) -> WeatherReading {
    let temperature_c = r.main.as_ref().and_then(|m| m.temp).unwrap_or(0.0);
    let wind_speed_ms = r.wind.as_ref().and_then(|w| w.speed).unwrap_or(0.0);

    let rain = per_hour(r.rain.as_ref());
    let snow = per_hour(r.snow.as_ref());
    let precipitation_mm_h = rain.max(0.0) + snow.max(0.0);

    let is_snow = snow > 0.0 || (temperature_c <= 0.0 && precipitation_mm_h > 0.0);
    let cloudiness = clamp01(r.clouds.as_ref().and_then(|c| c.all).unwrap_or(0.0) / 100.0);

    WeatherReading {
        temperature_c,
        wind_speed_ms,
        precipitation_mm_h,
        cloudiness,
        is_snow,
        source_label: String::new(),
    }
}
