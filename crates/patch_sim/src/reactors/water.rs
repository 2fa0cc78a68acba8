//! Water container: fills in rain, dries in hot sun, freezes solid.

use crate::geometry::{Rect, Vec2};
use crate::tiles::{GridFootprint, TileKind, Tilemap};
use crate::zone::{ConditionEvaluator, Conditions, TileReactor, ZoneAggregator};
use common::config::ContainerConfig;
use common::{clamp01, WeatherReading};
use tracing::info;

#[derive(Debug, Clone)]
pub struct WaterConditions {
    pub rain_threshold_mm_h: f32,
    pub hot_sun_temp_c: f32,
    pub freeze_temp_c: f32,
}

impl WaterConditions {
    pub fn from_config(cfg: &ContainerConfig) -> Self {
        Self {
            rain_threshold_mm_h: cfg.rain_threshold_mm_h,
            hot_sun_temp_c: cfg.hot_sun_temp_c,
            freeze_temp_c: cfg.freeze_temp_c,
        }
    }
}

impl ConditionEvaluator for WaterConditions {
    fn needed(&self) -> Conditions {
        Conditions::ALL
    }

    fn classify(&self, w: &WeatherReading) -> Conditions {
        let dry = w.precipitation_mm_h <= self.rain_threshold_mm_h;
        Conditions {
            raining: !w.is_snow && !dry,
            hot_sun: !w.is_snow && dry && w.temperature_c >= self.hot_sun_temp_c,
            freezing: w.is_snow || w.temperature_c <= self.freeze_temp_c,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WaterContainer {
    footprint: GridFootprint,
    cell_height: f32,
    change_per_second: f32,
    initial_fill: f32,
    fill: f32,
    rows: u32,
    frozen: bool,
}

impl WaterContainer {
    pub fn new(footprint: GridFootprint, cell_size: Vec2, cfg: &ContainerConfig) -> Self {
        Self {
            footprint,
            cell_height: cell_size.y,
            change_per_second: cfg.change_per_second,
            initial_fill: cfg.initial_fill,
            fill: 0.0,
            rows: 0,
            frozen: false,
        }
    }

    /// Container zone whose grid is derived from the sensor area.
    pub fn zone(
        name: impl Into<String>,
        sensor: Rect,
        cell_size: Vec2,
        cfg: &ContainerConfig,
    ) -> ZoneAggregator<WaterConditions, WaterContainer> {
        let footprint = GridFootprint::from_sensor(sensor, cell_size);
        ZoneAggregator::new(
            name,
            sensor,
            WaterConditions::from_config(cfg),
            Self::new(footprint, cell_size, cfg),
            Tilemap::new(cell_size).with_effector(),
        )
    }

    pub fn fill(&self) -> f32 {
        self.fill
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn footprint(&self) -> GridFootprint {
        self.footprint
    }

    /// Halves round to even: 2.5 rows draws 2, 7.5 draws 8.
    fn target_rows(&self) -> u32 {
        (self.fill * self.footprint.height as f32).round_ties_even() as u32
    }

    fn tile_kind(&self) -> TileKind {
        if self.frozen {
            TileKind::Ice
        } else {
            TileKind::Water
        }
    }

    fn apply_rows(&mut self, rows: u32, tiles: &mut Tilemap) {
        tiles.clear_all();
        let kind = self.tile_kind();
        for y in 0..rows {
            for cell in self.footprint.row(y) {
                tiles.set_tile(cell, kind);
            }
        }
        if let Some(effector) = tiles.effector.as_mut() {
            effector.surface_level = (self.footprint.bottom_left.y + rows as i32) as f32 * self.cell_height;
        }
        self.rows = rows;
    }

    fn set_frozen(&mut self, frozen: bool, force: bool, tiles: &mut Tilemap) {
        if !force && frozen == self.frozen {
            return;
        }
        self.frozen = frozen;

        // ice is solid, water is a trigger with buoyancy
        tiles.collider.is_trigger = !frozen;
        if let Some(effector) = tiles.effector.as_mut() {
            effector.enabled = !frozen;
        }
        tiles.retile(self.tile_kind());

        if !force {
            info!("Water container {}", if frozen { "froze" } else { "thawed" });
        }
    }
}

impl TileReactor for WaterContainer {
    fn attach(&mut self, tiles: &mut Tilemap) {
        self.fill = clamp01(self.initial_fill);
        self.apply_rows(self.target_rows(), tiles);
        self.set_frozen(false, true, tiles);
    }

    fn react(&mut self, c: Conditions, dt: f32, tiles: &mut Tilemap) {
        let delta = if c.raining {
            self.change_per_second * dt
        } else if c.hot_sun {
            -self.change_per_second * dt
        } else {
            0.0
        };

        if delta != 0.0 {
            self.fill = clamp01(self.fill + delta);
            let target = self.target_rows();
            if target != self.rows {
                self.apply_rows(target, tiles);
            }
        }

        self.set_frozen(c.freezing, false, tiles);
    }
}
