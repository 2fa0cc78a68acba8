//! Application configuration types.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Weather provider endpoint and credential.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Persistent cache, TTL and quota policy.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Spawned weather patches.
    #[serde(default)]
    pub patch: PatchConfig,

    /// Water container thresholds and rates.
    #[serde(default)]
    pub container: ContainerConfig,

    /// Plant column growth.
    #[serde(default)]
    pub plant: PlantConfig,

    /// Sun-reactive mushroom hazard.
    #[serde(default)]
    pub mushroom: MushroomConfig,

    /// Scene-wide reaction to the current reading.
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Tick loop.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// OpenWeatherMap current-weather endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Endpoint template base, query parameters are appended.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// `appid` credential. Empty means "not configured".
    #[serde(default)]
    pub api_key: String,

    /// City fetched once at startup. Empty disables the startup fetch.
    #[serde(default = "default_city")]
    pub default_city: String,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Cache store policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path of the persisted cache file.
    #[serde(default = "default_cache_file")]
    pub file: String,

    /// Max age (hours) at which an entry still counts as fresh.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: f64,

    /// HTTP requests allowed per UTC day.
    #[serde(default = "default_daily_limit")]
    pub daily_request_limit: u32,

    /// Coordinate quantization step in degrees (<= 0 disables).
    #[serde(default = "default_coord_grid")]
    pub coord_grid: f64,
}

/// Weather patch tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchConfig {
    /// Area width in world units.
    #[serde(default = "default_patch_size")]
    pub width: f32,

    /// Area height in world units.
    #[serde(default = "default_patch_size")]
    pub height: f32,

    /// Lifetime in seconds; `None` lives until replaced or despawned.
    #[serde(default)]
    pub lifetime_secs: Option<f64>,

    /// Soft fade before expiry in seconds (0 = no fade).
    #[serde(default = "default_fade_out")]
    pub fade_out_secs: f64,

    /// Friction lost per mm/h of precipitation.
    #[serde(default = "default_friction_per_mm_h")]
    pub friction_per_mm_h: f32,

    /// Horizontal force per m/s of wind.
    #[serde(default = "default_wind_to_force")]
    pub wind_to_force: f32,

    /// Precipitation below which emitters stay off (mm/h).
    #[serde(default = "default_precip_threshold")]
    pub precip_threshold_mm_h: f32,

    /// Temperature at which the sun light switches on (°C).
    #[serde(default = "default_hot_sun")]
    pub sun_light_temp_c: f32,

    /// Push occupants with wind force each physics step.
    #[serde(default)]
    pub enable_wind: bool,

    /// A new patch replaces the previously active one.
    #[serde(default = "default_true")]
    pub enforce_single_active: bool,
}

/// Water container reactor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Fill change (0..1) per second: rain adds, hot sun removes.
    #[serde(default = "default_change_per_second")]
    pub change_per_second: f32,

    /// Starting fill level, 0..1.
    #[serde(default)]
    pub initial_fill: f32,

    /// Precipitation that counts as rain (mm/h, exclusive).
    #[serde(default = "default_precip_threshold")]
    pub rain_threshold_mm_h: f32,

    /// Temperature from which sun dries the container (°C).
    #[serde(default = "default_hot_sun")]
    pub hot_sun_temp_c: f32,

    /// Temperature at or below which water freezes (°C).
    #[serde(default)]
    pub freeze_temp_c: f32,
}

/// Plant column reactor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantConfig {
    /// Rows grown per second while raining.
    #[serde(default = "default_grow_rate")]
    pub grow_cells_per_second: f32,

    /// Rows present at start.
    #[serde(default)]
    pub initial_rows: u32,

    /// Max height in rows; `None` derives it from the sensor footprint.
    #[serde(default)]
    pub max_height_rows: Option<u32>,

    /// Grow across the whole footprint width instead of a single column.
    #[serde(default = "default_true")]
    pub grow_full_width: bool,

    /// Minimum seconds between tile redraws.
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: f32,

    /// Precipitation that counts as rain (mm/h, exclusive).
    #[serde(default = "default_precip_threshold")]
    pub rain_threshold_mm_h: f32,
}

/// Sun mushroom hazard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MushroomConfig {
    /// Minimum temperature for hot sun (°C).
    #[serde(default = "default_mushroom_temp")]
    pub min_temp_c: f32,

    /// Maximum precipitation still counted as dry (mm/h).
    #[serde(default = "default_precip_threshold")]
    pub max_precip_mm_h: f32,
}

/// Scene-wide environment reactor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Ground friction lost per mm/h of precipitation.
    #[serde(default = "default_friction_per_mm_h")]
    pub friction_per_mm_h: f32,

    /// Precipitation above which global emitters switch on (mm/h).
    #[serde(default = "default_precip_threshold")]
    pub precip_threshold_mm_h: f32,
}

/// Simulation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Ticks per second.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: f32,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_api_base() -> String {
    "https://api.openweathermap.org/data/2.5/weather".into()
}
fn default_city() -> String {
    "Warszawa".into()
}
fn default_timeout() -> u64 {
    10
}

fn default_cache_file() -> String {
    "weather_cache_v2.json".into()
}
fn default_ttl_hours() -> f64 {
    12.0
}
fn default_daily_limit() -> u32 {
    1000
}
fn default_coord_grid() -> f64 {
    1.0
}

fn default_patch_size() -> f32 {
    8.0
}
fn default_fade_out() -> f64 {
    0.35
}
fn default_friction_per_mm_h() -> f32 {
    0.15
}
fn default_wind_to_force() -> f32 {
    3.0
}
fn default_precip_threshold() -> f32 {
    0.01
}
fn default_hot_sun() -> f32 {
    28.0
}

fn default_change_per_second() -> f32 {
    0.08
}

fn default_grow_rate() -> f32 {
    1.0
}
fn default_update_interval() -> f32 {
    0.05
}

fn default_mushroom_temp() -> f32 {
    25.0
}

fn default_tick_hz() -> f32 {
    30.0
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: String::new(),
            default_city: default_city(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file: default_cache_file(),
            ttl_hours: default_ttl_hours(),
            daily_request_limit: default_daily_limit(),
            coord_grid: default_coord_grid(),
        }
    }
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            width: default_patch_size(),
            height: default_patch_size(),
            lifetime_secs: None,
            fade_out_secs: default_fade_out(),
            friction_per_mm_h: default_friction_per_mm_h(),
            wind_to_force: default_wind_to_force(),
            precip_threshold_mm_h: default_precip_threshold(),
            sun_light_temp_c: default_hot_sun(),
            enable_wind: false,
            enforce_single_active: true,
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            change_per_second: default_change_per_second(),
            initial_fill: 0.0,
            rain_threshold_mm_h: default_precip_threshold(),
            hot_sun_temp_c: default_hot_sun(),
            freeze_temp_c: 0.0,
        }
    }
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            grow_cells_per_second: default_grow_rate(),
            initial_rows: 0,
            max_height_rows: None,
            grow_full_width: true,
            update_interval_secs: default_update_interval(),
            rain_threshold_mm_h: default_precip_threshold(),
        }
    }
}

impl Default for MushroomConfig {
    fn default() -> Self {
        Self {
            min_temp_c: default_mushroom_temp(),
            max_precip_mm_h: default_precip_threshold(),
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            friction_per_mm_h: default_friction_per_mm_h(),
            precip_threshold_mm_h: default_precip_threshold(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
        }
    }
}
