//! Scene-wide reaction to the current reading.
//!
//! Holds a broadcast subscription for as long as it lives; dropping the
//! reactor unsubscribes.

use crate::body::SurfaceMaterial;
use crate::effects::Emitter;
use common::config::EnvironmentConfig;
use common::{clamp01, WeatherReading};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};

pub struct EnvironmentReactor {
    updates: broadcast::Receiver<WeatherReading>,
    friction_per_mm_h: f32,
    precip_threshold_mm_h: f32,
    rain: Emitter,
    snow: Emitter,
    ground: SurfaceMaterial,
    last: Option<WeatherReading>,
}

impl EnvironmentReactor {
    /// `initial` is applied immediately, typically the service's current reading.
    pub fn new(
        updates: broadcast::Receiver<WeatherReading>,
        cfg: &EnvironmentConfig,
        initial: Option<WeatherReading>,
    ) -> Self {
        let mut reactor = Self {
            updates,
            friction_per_mm_h: cfg.friction_per_mm_h,
            precip_threshold_mm_h: cfg.precip_threshold_mm_h,
            rain: Emitter::default(),
            snow: Emitter::default(),
            ground: SurfaceMaterial::default(),
            last: None,
        };
        if let Some(w) = initial {
            reactor.apply(w);
        }
        reactor
    }

    pub fn apply(&mut self, w: WeatherReading) {
        let wet = w.precipitation_mm_h > self.precip_threshold_mm_h;
        self.rain.toggle(wet && !w.is_snow, w.precipitation_mm_h);
        self.snow.toggle(wet && w.is_snow, w.precipitation_mm_h);

        let target = clamp01(1.0 - w.precipitation_mm_h * self.friction_per_mm_h);
        self.ground.friction = target.clamp(0.05, 1.0);

        info!(
            "[Environment] apply: {} | ground friction {:.2}",
            w, self.ground.friction
        );
        self.last = Some(w);
    }

    /// Apply every queued update. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.updates.try_recv() {
                Ok(w) => {
                    self.apply(w);
                    applied += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("[Environment] skipped {} stale updates", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        applied
    }

    pub fn ground(&self) -> SurfaceMaterial {
        self.ground
    }

    pub fn rain(&self) -> &Emitter {
        &self.rain
    }

    pub fn snow(&self) -> &Emitter {
        &self.snow
    }

    pub fn last(&self) -> Option<&WeatherReading> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(precip: f32, snow: bool) -> WeatherReading {
        WeatherReading {
            temperature_c: if snow { -3.0 } else { 8.0 },
            wind_speed_ms: 1.0,
            precipitation_mm_h: precip,
            cloudiness: 1.0,
            is_snow: snow,
            source_label: "Oslo".into(),
        }
    }

    #[test]
    fn test_initial_reading_applied() {
        let (_tx, rx) = broadcast::channel(4);
        let env = EnvironmentReactor::new(rx, &EnvironmentConfig::default(), Some(reading(2.0, false)));

        assert!(env.rain().enabled);
        assert!(!env.snow().enabled);
        assert!((env.ground().friction - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_ground_friction_floor() {
        let (_tx, rx) = broadcast::channel(4);
        let mut env = EnvironmentReactor::new(rx, &EnvironmentConfig::default(), None);
        env.apply(reading(40.0, true));

        assert_eq!(env.ground().friction, 0.05);
        assert!(env.snow().enabled);
        assert_eq!(env.snow().rate, 600.0);
    }

    #[test]
    fn test_poll_applies_latest_and_survives_lag() {
        let (tx, rx) = broadcast::channel(2);
        let mut env = EnvironmentReactor::new(rx, &EnvironmentConfig::default(), None);
        assert_eq!(env.poll(), 0);

        for p in [0.0, 1.0, 2.0, 3.0] {
            tx.send(reading(p, false)).unwrap();
        }
        assert_eq!(env.poll(), 2);
        assert_eq!(env.last().unwrap().precipitation_mm_h, 3.0);

        drop(tx);
        assert_eq!(env.poll(), 0);
    }
}
