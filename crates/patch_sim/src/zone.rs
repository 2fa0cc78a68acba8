//! Generic zone aggregator.
//!
//! A zone tracks which patches overlap its sensor, folds their readings into
//! a [`Conditions`] set each tick, and hands that to a tile reactor. Nothing
//! is cached between ticks: a patch that leaves (or is despawned) stops
//! counting on the very next tick.

use crate::geometry::Rect;
use crate::patch::PatchId;
use crate::registry::PatchRegistry;
use crate::tiles::Tilemap;
use common::WeatherReading;
use std::collections::BTreeSet;
use tracing::debug;

/// Derived environment flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Conditions {
    pub raining: bool,
    pub hot_sun: bool,
    pub freezing: bool,
}

impl Conditions {
    pub const ALL: Conditions = Conditions {
        raining: true,
        hot_sun: true,
        freezing: true,
    };

    pub fn merge(&mut self, other: Conditions) {
        self.raining |= other.raining;
        self.hot_sun |= other.hot_sun;
        self.freezing |= other.freezing;
    }

    /// Every flag set in `needed` is also set here.
    pub fn covers(&self, needed: Conditions) -> bool {
        (!needed.raining || self.raining)
            && (!needed.hot_sun || self.hot_sun)
            && (!needed.freezing || self.freezing)
    }
}

/// Maps one reading to the flags it contributes.
pub trait ConditionEvaluator {
    /// Flags this evaluator can set; the scan stops once all are known.
    fn needed(&self) -> Conditions;

    fn classify(&self, reading: &WeatherReading) -> Conditions;
}

/// Mutates a tile grid from the aggregated conditions.
pub trait TileReactor {
    /// Called once when the zone is built.
    fn attach(&mut self, _tiles: &mut Tilemap) {}

    fn react(&mut self, conditions: Conditions, dt: f32, tiles: &mut Tilemap);
}

/// Object-safe view of a zone, for heterogeneous storage in the world.
pub trait Zone {
    fn name(&self) -> &str;
    fn sensor(&self) -> Rect;
    fn tiles(&self) -> &Tilemap;
    fn last_conditions(&self) -> Conditions;

    /// Diff the overlap set against the live patches.
    fn sync_overlaps(&mut self, patches: &PatchRegistry);

    fn tick(&mut self, patches: &PatchRegistry, dt: f32);
}

pub struct ZoneAggregator<E, R> {
    name: String,
    sensor: Rect,
    overlapping: BTreeSet<PatchId>,
    evaluator: E,
    reactor: R,
    tiles: Tilemap,
    last: Conditions,
}

impl<E: ConditionEvaluator, R: TileReactor> ZoneAggregator<E, R> {
    pub fn new(
        name: impl Into<String>,
        sensor: Rect,
        evaluator: E,
        mut reactor: R,
        mut tiles: Tilemap,
    ) -> Self {
        reactor.attach(&mut tiles);
        Self {
            name: name.into(),
            sensor,
            overlapping: BTreeSet::new(),
            evaluator,
            reactor,
            tiles,
            last: Conditions::default(),
        }
    }

    pub fn reactor(&self) -> &R {
        &self.reactor
    }

    pub fn overlapping(&self) -> impl Iterator<Item = PatchId> + '_ {
        self.overlapping.iter().copied()
    }

    pub fn patch_entered(&mut self, id: PatchId) {
        if self.overlapping.insert(id) {
            debug!("[{}] {} entered", self.name, id);
        }
    }

    pub fn patch_exited(&mut self, id: PatchId) {
        if self.overlapping.remove(&id) {
            debug!("[{}] {} exited", self.name, id);
        }
    }

    /// Fold the readings of every overlapping patch.
    pub fn evaluate(&self, patches: &PatchRegistry) -> Conditions {
        let needed = self.evaluator.needed();
        let mut acc = Conditions::default();
        for id in &self.overlapping {
            let Some(patch) = patches.get(*id).filter(|p| p.is_live()) else {
                continue;
            };
            acc.merge(self.evaluator.classify(patch.reading()));
            if acc.covers(needed) {
                break;
            }
        }
        acc
    }

    /// Evaluate and react, without touching the overlap set.
    pub fn step(&mut self, patches: &PatchRegistry, dt: f32) -> Conditions {
        let conditions = self.evaluate(patches);
        if conditions != self.last {
            debug!("[{}] conditions {:?}", self.name, conditions);
            self.last = conditions;
        }
        self.reactor.react(conditions, dt, &mut self.tiles);
        conditions
    }
}

impl<E: ConditionEvaluator, R: TileReactor> Zone for ZoneAggregator<E, R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn sensor(&self) -> Rect {
        self.sensor
    }

    fn tiles(&self) -> &Tilemap {
        &self.tiles
    }

    fn last_conditions(&self) -> Conditions {
        self.last
    }

    fn sync_overlaps(&mut self, patches: &PatchRegistry) {
        let gone: Vec<PatchId> = self
            .overlapping
            .iter()
            .copied()
            .filter(|id| {
                !patches
                    .get(*id)
                    .is_some_and(|p| p.is_live() && p.area().overlaps(&self.sensor))
            })
            .collect();
        for id in gone {
            self.patch_exited(id);
        }

        let entered: Vec<PatchId> = patches
            .iter()
            .filter(|p| p.is_live() && p.area().overlaps(&self.sensor))
            .map(|p| p.id())
            .collect();
        for id in entered {
            self.patch_entered(id);
        }
    }

    fn tick(&mut self, patches: &PatchRegistry, dt: f32) {
        self.step(patches, dt);
    }
}
