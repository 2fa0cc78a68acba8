//! Plant column: grows upward while it rains. Never shrinks.

use crate::geometry::{CellCoord, Rect, Vec2};
use crate::tiles::{GridFootprint, TileKind, Tilemap};
use crate::zone::{ConditionEvaluator, Conditions, TileReactor, ZoneAggregator};
use common::config::PlantConfig;
use common::WeatherReading;
use tracing::{debug, info};

/// Rain only; snow does not water plants.
#[derive(Debug, Clone)]
pub struct RainSensor {
    pub threshold_mm_h: f32,
}

impl ConditionEvaluator for RainSensor {
    fn needed(&self) -> Conditions {
        Conditions {
            raining: true,
            ..Conditions::default()
        }
    }

    fn classify(&self, w: &WeatherReading) -> Conditions {
        Conditions {
            raining: !w.is_snow && w.precipitation_mm_h > self.threshold_mm_h,
            ..Conditions::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlantColumn {
    footprint: GridFootprint,
    max_rows: u32,
    grow_per_second: f32,
    update_interval: f32,
    full_width: bool,
    initial_rows: u32,
    rows: u32,
    /// Fractional rows grown but not yet drawn.
    grow_acc: f32,
    since_draw: f32,
}

impl PlantColumn {
    pub fn new(footprint: GridFootprint, cfg: &PlantConfig) -> Self {
        let max_rows = cfg
            .max_height_rows
            .filter(|m| *m > 0)
            .unwrap_or(footprint.height);
        Self {
            footprint,
            max_rows,
            grow_per_second: cfg.grow_cells_per_second,
            update_interval: cfg.update_interval_secs,
            full_width: cfg.grow_full_width,
            initial_rows: cfg.initial_rows,
            rows: 0,
            grow_acc: 0.0,
            since_draw: 0.0,
        }
    }

    pub fn zone(
        name: impl Into<String>,
        sensor: Rect,
        cell_size: Vec2,
        cfg: &PlantConfig,
    ) -> ZoneAggregator<RainSensor, PlantColumn> {
        ZoneAggregator::new(
            name,
            sensor,
            RainSensor {
                threshold_mm_h: cfg.rain_threshold_mm_h,
            },
            Self::new(GridFootprint::from_sensor(sensor, cell_size), cfg),
            Tilemap::new(cell_size),
        )
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn max_rows(&self) -> u32 {
        self.max_rows
    }

    pub fn pending_growth(&self) -> f32 {
        self.grow_acc
    }

    /// Paint rows `[self.rows, target)` on top of what is already there.
    fn draw_additive(&self, target: u32, tiles: &mut Tilemap) {
        for y in self.rows..target {
            if self.full_width {
                for cell in self.footprint.row(y) {
                    tiles.set_tile(cell, TileKind::Plant);
                }
            } else {
                let row_y = self.footprint.bottom_left.y + y as i32;
                tiles.set_tile(
                    CellCoord::new(self.footprint.center_column(), row_y),
                    TileKind::Plant,
                );
            }
        }
    }
}

impl TileReactor for PlantColumn {
    fn attach(&mut self, tiles: &mut Tilemap) {
        let initial = self.initial_rows.min(self.max_rows);
        if initial > 0 {
            self.draw_additive(initial, tiles);
        }
        self.rows = initial;
    }

    fn react(&mut self, c: Conditions, dt: f32, tiles: &mut Tilemap) {
        if !c.raining || self.rows >= self.max_rows {
            self.since_draw = 0.0;
            return;
        }

        self.grow_acc += self.grow_per_second * dt;
        let whole = self.grow_acc.floor() as u32;
        if whole == 0 {
            return;
        }

        let target = (self.rows + whole).min(self.max_rows);
        self.since_draw += dt;
        if self.since_draw >= self.update_interval || target >= self.max_rows {
            self.draw_additive(target, tiles);
            debug!("Plant grew {} -> {} rows", self.rows, target);
            self.rows = target;
            self.grow_acc -= whole as f32;
            self.since_draw = 0.0;
            if self.rows >= self.max_rows {
                info!("Plant reached full height ({} rows)", self.max_rows);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactors::test_support::{cover, reading};
    use crate::registry::PatchRegistry;
    use crate::zone::Zone;

    fn plant(cfg: &PlantConfig) -> ZoneAggregator<RainSensor, PlantColumn> {
        PlantColumn::zone(
            "vine",
            Rect::new(Vec2::new(0.0, 0.0), Vec2::new(3.0, 6.0)),
            Vec2::new(1.0, 1.0),
            cfg,
        )
    }

    #[test]
    fn test_two_and_a_half_seconds_of_rain_grows_two_rows() {
        let mut reg = PatchRegistry::new();
        let mut vine = plant(&PlantConfig::default());
        cover(&mut reg, reading(12.0, 2.0, false));
        vine.sync_overlaps(&reg);

        for _ in 0..5 {
            vine.tick(&reg, 0.5);
        }

        assert_eq!(vine.reactor().rows(), 2);
        assert!((vine.reactor().pending_growth() - 0.5).abs() < 1e-6);
        assert_eq!(vine.tiles().count(TileKind::Plant), 6);
    }

    #[test]
    fn test_snow_does_not_grow() {
        let mut reg = PatchRegistry::new();
        let mut vine = plant(&PlantConfig::default());
        cover(&mut reg, reading(-1.0, 3.0, true));
        vine.sync_overlaps(&reg);

        for _ in 0..10 {
            vine.tick(&reg, 0.5);
        }
        assert_eq!(vine.reactor().rows(), 0);
        assert!(vine.tiles().is_empty());
    }

    #[test]
    fn test_growth_stops_at_max_and_never_shrinks() {
        let cfg = PlantConfig {
            grow_cells_per_second: 4.0,
            max_height_rows: Some(3),
            ..PlantConfig::default()
        };
        let mut bodies = crate::body::Bodies::new();
        let mut reg = PatchRegistry::new();
        let mut vine = plant(&cfg);
        let rain = cover(&mut reg, reading(12.0, 2.0, false));
        vine.sync_overlaps(&reg);

        for _ in 0..10 {
            vine.tick(&reg, 0.5);
        }
        assert_eq!(vine.reactor().rows(), 3);

        reg.despawn(rain, &mut bodies);
        cover(&mut reg, reading(35.0, 0.0, false));
        vine.sync_overlaps(&reg);
        vine.tick(&reg, 5.0);
        assert_eq!(vine.reactor().rows(), 3);
        assert_eq!(vine.tiles().count(TileKind::Plant), 9);
    }

    #[test]
    fn test_update_interval_batches_redraws() {
        let cfg = PlantConfig {
            grow_cells_per_second: 20.0,
            update_interval_secs: 0.2,
            ..PlantConfig::default()
        };
        let mut reg = PatchRegistry::new();
        let mut vine = plant(&cfg);
        cover(&mut reg, reading(12.0, 2.0, false));
        vine.sync_overlaps(&reg);

        vine.tick(&reg, 0.1);
        assert_eq!(vine.reactor().rows(), 0);
        vine.tick(&reg, 0.1);
        assert_eq!(vine.reactor().rows(), 4);
    }

    #[test]
    fn test_single_column_and_initial_rows() {
        let cfg = PlantConfig {
            grow_full_width: false,
            initial_rows: 10,
            ..PlantConfig::default()
        };
        let vine = plant(&cfg);

        assert_eq!(vine.reactor().rows(), 6);
        assert_eq!(vine.tiles().len(), 6);
        assert!(vine.tiles().iter().all(|(c, _)| c.x == 1));
    }
}
