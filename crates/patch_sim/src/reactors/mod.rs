//! Tile reactors and the condition evaluators that drive them.

mod mushroom;
mod plant;
mod water;

pub use mushroom::{SunMushroom, SunSensor};
pub use plant::{PlantColumn, RainSensor};
pub use water::{WaterConditions, WaterContainer};
