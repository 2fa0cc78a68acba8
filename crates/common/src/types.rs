//! Domain types shared across the workspace.

use serde::{Deserialize, Serialize};

/// Clamp a value into `[0, 1]`.
pub fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

// ── Weather reading ───────────────────────────────────────────────────

/// A normalized snapshot of weather conditions.
///
/// Produced by mapping a provider response (or a preset) and never mutated
/// afterwards; `with_source` consumes the value to attach the label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    /// Air temperature in °C.
    pub temperature_c: f32,
    /// Wind speed in m/s.
    pub wind_speed_ms: f32,
    /// Rain + snow, mm/h.
    pub precipitation_mm_h: f32,
    /// Cloud cover, 0..1.
    pub cloudiness: f32,
    /// Whether precipitation is treated as snow.
    pub is_snow: bool,
    /// City name, coordinate label or preset tag.
    #[serde(default)]
    pub source_label: String,
}

impl WeatherReading {
    pub fn with_source(mut self, label: impl Into<String>) -> Self {
        self.source_label = label.into();
        self
    }
}

impl std::fmt::Display for WeatherReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {:.1}°C, wind={:.1} m/s, precip={:.2} mm/h, clouds={:.0}%, snow={}",
            self.source_label,
            self.temperature_c,
            self.wind_speed_ms,
            self.precipitation_mm_h,
            self.cloudiness * 100.0,
            self.is_snow
        )
    }
}

// ── Queries ───────────────────────────────────────────────────────────

/// What to ask the provider for. Coordinates are expected to be quantized
/// already; the client sends them as given.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherQuery {
    City(String),
    Coords { lat: f64, lon: f64 },
}

impl std::fmt::Display for WeatherQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeatherQuery::City(name) => write!(f, "city '{}'", name),
            WeatherQuery::Coords { lat, lon } => write!(f, "coords ({}, {})", lat, lon),
        }
    }
}
