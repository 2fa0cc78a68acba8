//! Minimal tile grid: cells, a collider flag pair and an optional buoyancy
//! effector. Painting is reduced to "set these cells to this kind".

use crate::geometry::{CellCoord, Rect, Vec2};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileKind {
    Water,
    Ice,
    Plant,
    Mushroom,
    MushroomSun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColliderState {
    pub enabled: bool,
    /// Trigger colliders let bodies pass through.
    pub is_trigger: bool,
}

impl Default for ColliderState {
    fn default() -> Self {
        Self {
            enabled: true,
            is_trigger: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BuoyancyEffector {
    pub enabled: bool,
    /// World-space y of the liquid surface.
    pub surface_level: f32,
}

#[derive(Debug, Clone)]
pub struct Tilemap {
    cell_size: Vec2,
    tiles: BTreeMap<CellCoord, TileKind>,
    pub collider: ColliderState,
    pub effector: Option<BuoyancyEffector>,
    revision: u64,
}

impl Tilemap {
    pub fn new(cell_size: Vec2) -> Self {
        Self {
            cell_size,
            tiles: BTreeMap::new(),
            collider: ColliderState::default(),
            effector: None,
            revision: 0,
        }
    }

    pub fn with_effector(mut self) -> Self {
        self.effector = Some(BuoyancyEffector::default());
        self
    }

    pub fn cell_size(&self) -> Vec2 {
        self.cell_size
    }

    /// Bumped on every mutation of the cell contents.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn tile(&self, cell: CellCoord) -> Option<TileKind> {
        self.tiles.get(&cell).copied()
    }

    pub fn set_tile(&mut self, cell: CellCoord, kind: TileKind) {
        self.tiles.insert(cell, kind);
        self.revision += 1;
    }

    pub fn clear_all(&mut self) {
        self.tiles.clear();
        self.revision += 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, TileKind)> + '_ {
        self.tiles.iter().map(|(c, k)| (*c, *k))
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn count(&self, kind: TileKind) -> usize {
        self.tiles.values().filter(|k| **k == kind).count()
    }

    /// Set every existing tile to `kind`.
    pub fn retile(&mut self, kind: TileKind) {
        if self.tiles.is_empty() {
            return;
        }
        for k in self.tiles.values_mut() {
            *k = kind;
        }
        self.revision += 1;
    }

    /// World-space bounds of the painted cells.
    pub fn world_bounds(&self) -> Option<Rect> {
        let first = self.tiles.keys().next()?;
        let (mut lo, mut hi) = (*first, *first);
        for c in self.tiles.keys() {
            lo.x = lo.x.min(c.x);
            lo.y = lo.y.min(c.y);
            hi.x = hi.x.max(c.x);
            hi.y = hi.y.max(c.y);
        }
        let cs = self.cell_size;
        Some(Rect::new(
            Vec2::new(lo.x as f32 * cs.x, lo.y as f32 * cs.y),
            Vec2::new((hi.x + 1) as f32 * cs.x, (hi.y + 1) as f32 * cs.y),
        ))
    }
}

/// The cell rectangle covered by a sensor area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridFootprint {
    pub bottom_left: CellCoord,
    pub width: u32,
    pub height: u32,
}

impl GridFootprint {
    /// Width and height are rounded to whole cells, at least one each.
    pub fn from_sensor(sensor: Rect, cell_size: Vec2) -> Self {
        let size = sensor.size();
        let cells = |extent: f32, cell: f32| ((extent / cell.max(1e-4)).round() as u32).max(1);
        Self {
            bottom_left: CellCoord::containing(
                Vec2::new(sensor.min.x + 0.001, sensor.min.y + 0.001),
                cell_size,
            ),
            width: cells(size.x, cell_size.x),
            height: cells(size.y, cell_size.y),
        }
    }

    /// Cells of row `y` (0 = bottom).
    pub fn row(&self, y: u32) -> impl Iterator<Item = CellCoord> + '_ {
        let row_y = self.bottom_left.y + y as i32;
        (0..self.width).map(move |x| CellCoord::new(self.bottom_left.x + x as i32, row_y))
    }

    /// Middle column, leaning left on even widths.
    pub fn center_column(&self) -> i32 {
        self.bottom_left.x + (self.width.saturating_sub(1) / 2) as i32
    }
}
