//! Configuration loader: .env file, config.toml, then environment overrides.

use common::config::AppConfig;
use common::Error;
use std::path::Path;

fn parse_non_negative_f64(raw: &str, env_name: &str) -> Result<f64, Error> {
    let parsed = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{env_name} must be a number >= 0")))?;
    if parsed < 0.0 {
        return Err(Error::Config(format!("{env_name} must be a number >= 0")));
    }
    Ok(parsed)
}

fn parse_positive_u32(raw: &str, env_name: &str) -> Result<u32, Error> {
    match raw.trim().parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::Config(format!("{env_name} must be an integer > 0"))),
    }
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

fn in_unit_range(v: f32) -> bool {
    (0.0..=1.0).contains(&v)
}

pub fn validate_config(config: &AppConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.provider.api_base.trim().is_empty() {
        issues.push("provider.api_base must not be empty".into());
    }
    if config.provider.timeout_secs == 0 {
        issues.push("provider.timeout_secs must be > 0".into());
    }

    if config.cache.file.trim().is_empty() {
        issues.push("cache.file must not be empty".into());
    }
    if config.cache.ttl_hours < 0.0 {
        issues.push("cache.ttl_hours must be >= 0".into());
    }
    if config.cache.daily_request_limit == 0 {
        issues.push("cache.daily_request_limit must be > 0".into());
    }
    if config.cache.coord_grid < 0.0 {
        issues.push("cache.coord_grid must be >= 0".into());
    }

    if config.patch.width <= 0.0 || config.patch.height <= 0.0 {
        issues.push("patch.width and patch.height must be > 0".into());
    }
    if config.patch.lifetime_secs.is_some_and(|l| l <= 0.0) {
        issues.push("patch.lifetime_secs must be > 0 when set".into());
    }
    if config.patch.fade_out_secs < 0.0 {
        issues.push("patch.fade_out_secs must be >= 0".into());
    }
    if let Some(lifetime) = config.patch.lifetime_secs {
        if config.patch.fade_out_secs > lifetime {
            issues.push("patch.fade_out_secs must be <= patch.lifetime_secs".into());
        }
    }
    if config.patch.friction_per_mm_h < 0.0 {
        issues.push("patch.friction_per_mm_h must be >= 0".into());
    }

    if config.container.change_per_second < 0.0 {
        issues.push("container.change_per_second must be >= 0".into());
    }
    if !in_unit_range(config.container.initial_fill) {
        issues.push("container.initial_fill must be in [0,1]".into());
    }
    if config.container.freeze_temp_c >= config.container.hot_sun_temp_c {
        issues.push("container.freeze_temp_c must be < container.hot_sun_temp_c".into());
    }

    if config.plant.grow_cells_per_second < 0.0 {
        issues.push("plant.grow_cells_per_second must be >= 0".into());
    }
    if config.plant.update_interval_secs < 0.0 {
        issues.push("plant.update_interval_secs must be >= 0".into());
    }

    if config.environment.friction_per_mm_h < 0.0 {
        issues.push("environment.friction_per_mm_h must be >= 0".into());
    }

    if config.simulation.tick_hz <= 0.0 {
        issues.push("simulation.tick_hz must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load configuration from environment and optional config file.
///
/// A missing API key is not an error here; fetches report it when they run.
pub fn load_config() -> Result<AppConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Defaults, replaced by config.toml if it exists.
    let mut config = AppConfig::default();
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 3. Environment variables (highest priority).
    if let Ok(key) = std::env::var("OWM_API_KEY") {
        config.provider.api_key = key.trim().to_string();
    }
    if let Ok(base) = std::env::var("OWM_API_BASE") {
        config.provider.api_base = base.trim().to_string();
    }
    if let Ok(city) = std::env::var("WEATHER_DEFAULT_CITY") {
        config.provider.default_city = city.trim().to_string();
    }
    if let Ok(file) = std::env::var("WEATHER_CACHE_FILE") {
        config.cache.file = file;
    }
    if let Ok(raw) = std::env::var("WEATHER_CACHE_TTL_HOURS") {
        config.cache.ttl_hours = parse_non_negative_f64(&raw, "WEATHER_CACHE_TTL_HOURS")?;
    }
    if let Ok(raw) = std::env::var("WEATHER_DAILY_REQUEST_LIMIT") {
        config.cache.daily_request_limit = parse_positive_u32(&raw, "WEATHER_DAILY_REQUEST_LIMIT")?;
    }
    if let Ok(raw) = std::env::var("WEATHER_COORD_GRID") {
        config.cache.coord_grid = parse_non_negative_f64(&raw, "WEATHER_COORD_GRID")?;
    }
    if let Ok(raw) = std::env::var("WEATHER_PATCH_LIFETIME_SECS") {
        let secs = parse_non_negative_f64(&raw, "WEATHER_PATCH_LIFETIME_SECS")?;
        // 0 means "until replaced"
        config.patch.lifetime_secs = (secs > 0.0).then_some(secs);
    }
    if let Ok(raw) = std::env::var("WEATHER_PATCH_FADE_SECS") {
        config.patch.fade_out_secs = parse_non_negative_f64(&raw, "WEATHER_PATCH_FADE_SECS")?;
    }
    if let Ok(raw) = std::env::var("WEATHER_ENABLE_WIND") {
        config.patch.enable_wind = parse_bool(&raw);
    }

    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_issues_are_collected() {
        let mut config = AppConfig::default();
        config.cache.daily_request_limit = 0;
        config.patch.lifetime_secs = Some(0.2);
        config.simulation.tick_hz = 0.0;

        let msg = validate_config(&config).unwrap_err().to_string();
        assert!(msg.contains("cache.daily_request_limit"));
        assert!(msg.contains("patch.fade_out_secs must be <= patch.lifetime_secs"));
        assert!(msg.contains("simulation.tick_hz"));
    }

    #[test]
    fn test_toml_sections_override_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [provider]
            default_city = "Gdańsk"

            [cache]
            ttl_hours = 2.5

            [patch]
            lifetime_secs = 12.0
            enable_wind = true
            "#,
        )
        .unwrap();

        assert_eq!(config.provider.default_city, "Gdańsk");
        assert_eq!(config.provider.timeout_secs, 10);
        assert_eq!(config.cache.ttl_hours, 2.5);
        assert_eq!(config.cache.daily_request_limit, 1000);
        assert_eq!(config.patch.lifetime_secs, Some(12.0));
        assert!(config.patch.enable_wind);
        assert_eq!(config.container.change_per_second, 0.08);
    }

    #[test]
    fn test_env_value_parsers() {
        assert_eq!(parse_non_negative_f64(" 1.5 ", "X").unwrap(), 1.5);
        assert!(parse_non_negative_f64("-1", "X").is_err());
        assert!(parse_positive_u32("0", "X").is_err());
        assert_eq!(parse_positive_u32("250", "X").unwrap(), 250);
        assert!(parse_bool("yes"));
        assert!(!parse_bool("Off"));
    }
}
