//! Sun mushrooms: soft by default, solid under hot dry sun.

use crate::geometry::CellCoord;
use crate::tiles::{TileKind, Tilemap};
use crate::zone::{ConditionEvaluator, Conditions, TileReactor, ZoneAggregator};
use common::config::MushroomConfig;
use common::WeatherReading;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone)]
pub struct SunSensor {
    pub min_temp_c: f32,
    pub max_precip_mm_h: f32,
}

impl SunSensor {
    pub fn from_config(cfg: &MushroomConfig) -> Self {
        Self {
            min_temp_c: cfg.min_temp_c,
            max_precip_mm_h: cfg.max_precip_mm_h,
        }
    }
}

impl ConditionEvaluator for SunSensor {
    fn needed(&self) -> Conditions {
        Conditions {
            hot_sun: true,
            ..Conditions::default()
        }
    }

    fn classify(&self, w: &WeatherReading) -> Conditions {
        Conditions {
            hot_sun: !w.is_snow
                && w.precipitation_mm_h <= self.max_precip_mm_h
                && w.temperature_c >= self.min_temp_c,
            ..Conditions::default()
        }
    }
}

/// Toggles collision on a pre-painted tile region.
#[derive(Debug, Clone, Default)]
pub struct SunMushroom {
    originals: BTreeMap<CellCoord, TileKind>,
    sunny: bool,
}

impl SunMushroom {
    /// Mushroom zone over an existing tile region; the sensor fits its bounds.
    pub fn zone(
        name: impl Into<String>,
        tiles: Tilemap,
        cfg: &MushroomConfig,
    ) -> ZoneAggregator<SunSensor, SunMushroom> {
        let sensor = tiles.world_bounds().unwrap_or_default();
        ZoneAggregator::new(
            name,
            sensor,
            SunSensor::from_config(cfg),
            Self::default(),
            tiles,
        )
    }

    pub fn is_sunny(&self) -> bool {
        self.sunny
    }

    pub fn cell_count(&self) -> usize {
        self.originals.len()
    }

    fn apply_tiles(&self, sunny: bool, tiles: &mut Tilemap) {
        for (cell, original) in &self.originals {
            tiles.set_tile(*cell, if sunny { TileKind::MushroomSun } else { *original });
        }
    }
}

impl TileReactor for SunMushroom {
    fn attach(&mut self, tiles: &mut Tilemap) {
        self.originals = tiles.iter().collect();
        // collision off until the sun hits; solid, not a trigger, once on
        tiles.collider.enabled = false;
        tiles.collider.is_trigger = false;
    }

    fn react(&mut self, c: Conditions, _dt: f32, tiles: &mut Tilemap) {
        if c.hot_sun == self.sunny {
            return;
        }
        tiles.collider.enabled = c.hot_sun;
        self.apply_tiles(c.hot_sun, tiles);
        self.sunny = c.hot_sun;
        info!(
            "Mushrooms {} ({} cells)",
            if c.hot_sun { "hardened" } else { "softened" },
            self.originals.len()
        );
    }
}
