//! Named test readings that bypass the provider.

use common::{Error, WeatherReading};

fn preset(
    temperature_c: f32,
    precipitation_mm_h: f32,
    cloudiness: f32,
    is_snow: bool,
    label: &str,
) -> WeatherReading {
    WeatherReading {
        temperature_c,
        wind_speed_ms: 0.0,
        precipitation_mm_h,
        cloudiness,
        is_snow,
        source_label: label.into(),
    }
}

/// Resolve `rain`, `snow`, `freeze` or `sun` (case-insensitive, trimmed).
///
/// Anything else is `Error::NotFound`; the caller decides what to do next,
/// typically a city lookup.
pub fn resolve(input: &str) -> Result<WeatherReading, Error> {
    match input.trim().to_lowercase().as_str() {
        "rain" => Ok(preset(6.0, 2.0, 1.0, false, "PRESET_RAIN")),
        "snow" => Ok(preset(-2.0, 2.0, 1.0, true, "PRESET_SNOW")),
        "freeze" => Ok(preset(-5.0, 0.0, 0.2, false, "PRESET_FREEZE")),
        "sun" => Ok(preset(32.0, 0.0, 0.05, false, "PRESET_SUN")),
        other => Err(Error::NotFound(format!("no preset named '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rain_preset_literal() {
        let r = resolve("rain").unwrap();
        assert_eq!(
            r,
            WeatherReading {
                temperature_c: 6.0,
                wind_speed_ms: 0.0,
                precipitation_mm_h: 2.0,
                cloudiness: 1.0,
                is_snow: false,
                source_label: "PRESET_RAIN".into(),
            }
        );
    }

    #[test]
    fn test_presets_case_insensitive() {
        assert_eq!(resolve(" SUN ").unwrap().source_label, "PRESET_SUN");
        assert!(resolve("Snow").unwrap().is_snow);
        assert_eq!(resolve("freeze").unwrap().temperature_c, -5.0);
    }

    #[test]
    fn test_unknown_is_not_found() {
        assert!(matches!(resolve("Paris"), Err(Error::NotFound(_))));
        assert!(matches!(resolve(""), Err(Error::NotFound(_))));
    }
}
