//! Drops weather patches at a position.

use crate::geometry::{Rect, Vec2};
use crate::patch::PatchId;
use crate::world::World;
use common::config::PatchConfig;
use common::WeatherReading;
use tokio::sync::watch;
use tracing::{info, warn};

pub struct StampSpawner {
    size: Vec2,
    lifetime: Option<f64>,
    current: watch::Receiver<Option<WeatherReading>>,
}

impl StampSpawner {
    /// `current` tracks the service's last published reading.
    pub fn new(cfg: &PatchConfig, current: watch::Receiver<Option<WeatherReading>>) -> Self {
        Self {
            size: Vec2::new(cfg.width, cfg.height),
            lifetime: cfg.lifetime_secs,
            current,
        }
    }

    /// Drop a patch carrying `reading`, centered on `position`.
    pub fn drop_patch_here(
        &self,
        world: &mut World,
        reading: WeatherReading,
        position: Vec2,
    ) -> PatchId {
        info!("[Spawner] patch @ {} | {}", position, reading);
        world.spawn_patch(
            reading,
            Rect::from_center_size(position, self.size),
            self.lifetime,
        )
    }

    /// Drop a patch with the current reading, if there is one.
    pub fn drop_current(&self, world: &mut World, position: Vec2) -> Option<PatchId> {
        let reading = self.current.borrow().clone();
        match reading {
            Some(r) => Some(self.drop_patch_here(world, r, position)),
            None => {
                warn!("[Spawner] no current weather; nothing dropped");
                None
            }
        }
    }
}
