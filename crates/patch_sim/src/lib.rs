//! Local weather effects.
//!
//! Patches carry one reading over an area and adjust the bodies inside it.
//! Tile zones watch which patches overlap them and mutate their tile grids
//! every tick. [`World`] owns all of it and drives the tick order.

pub mod body;
pub mod effects;
pub mod environment;
pub mod geometry;
pub mod patch;
pub mod reactors;
pub mod registry;
pub mod spawner;
pub mod tiles;
pub mod world;
pub mod zone;

pub use body::{Bodies, Body, BodyId, SurfaceMaterial};
pub use effects::Emitter;
pub use environment::EnvironmentReactor;
pub use geometry::{CellCoord, Rect, Vec2};
pub use patch::{PatchId, PatchState, WeatherPatch};
pub use reactors::{PlantColumn, RainSensor, SunMushroom, SunSensor, WaterConditions, WaterContainer};
pub use registry::PatchRegistry;
pub use spawner::StampSpawner;
pub use tiles::{GridFootprint, TileKind, Tilemap};
pub use world::World;
pub use zone::{ConditionEvaluator, Conditions, TileReactor, Zone, ZoneAggregator};
