//! Simulation root.
//!
//! Owns bodies, patches, tile zones and the environment reactor. Each
//! [`World::tick`] runs, in order: patch lifecycle, occupancy diffing,
//! wind, then reactors. Pending body forces hold only the current tick's
//! pushes; read them with `pending_force` between ticks.

use crate::body::{Bodies, BodyId, SurfaceMaterial};
use crate::environment::EnvironmentReactor;
use crate::geometry::Rect;
use crate::patch::PatchId;
use crate::registry::PatchRegistry;
use crate::zone::Zone;
use common::config::PatchConfig;
use common::WeatherReading;
use tracing::debug;

pub struct World {
    time: f64,
    patch_cfg: PatchConfig,
    bodies: Bodies,
    patches: PatchRegistry,
    zones: Vec<Box<dyn Zone>>,
    environment: Option<EnvironmentReactor>,
}

impl World {
    pub fn new(patch_cfg: PatchConfig) -> Self {
        Self {
            time: 0.0,
            patch_cfg,
            bodies: Bodies::new(),
            patches: PatchRegistry::new(),
            zones: Vec::new(),
            environment: None,
        }
    }

    /// Seconds simulated so far.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn patch_config(&self) -> &PatchConfig {
        &self.patch_cfg
    }

    pub fn bodies(&self) -> &Bodies {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut Bodies {
        &mut self.bodies
    }

    pub fn patches(&self) -> &PatchRegistry {
        &self.patches
    }

    pub fn zones(&self) -> impl Iterator<Item = &dyn Zone> {
        self.zones.iter().map(|z| z.as_ref())
    }

    pub fn zone(&self, name: &str) -> Option<&dyn Zone> {
        self.zones().find(|z| z.name() == name)
    }

    pub fn environment(&self) -> Option<&EnvironmentReactor> {
        self.environment.as_ref()
    }

    pub fn set_environment(&mut self, env: EnvironmentReactor) {
        self.environment = Some(env);
    }

    pub fn add_zone(&mut self, zone: impl Zone + 'static) {
        self.zones.push(Box::new(zone));
    }

    pub fn spawn_body(&mut self, bounds: Rect, material: SurfaceMaterial) -> BodyId {
        self.bodies.spawn(bounds, material)
    }

    /// Create a patch now. It takes effect on the next tick.
    pub fn spawn_patch(
        &mut self,
        reading: WeatherReading,
        area: Rect,
        lifetime: Option<f64>,
    ) -> PatchId {
        self.patches
            .spawn(reading, area, self.time, lifetime, &self.patch_cfg)
    }

    pub fn despawn_patch(&mut self, id: PatchId) -> bool {
        self.patches.despawn(id, &mut self.bodies)
    }

    pub fn tick(&mut self, dt: f32) {
        self.time += dt as f64;
        for body in self.bodies.iter_mut() {
            body.take_force();
        }

        let released = self.patches.tick_lifecycle(self.time, &mut self.bodies);
        if !released.is_empty() {
            debug!("t={:.2}: released {:?}", self.time, released);
        }

        self.update_occupancy();

        for patch in self.patches.iter() {
            patch.apply_wind(&mut self.bodies);
        }

        if let Some(env) = self.environment.as_mut() {
            env.poll();
        }
        for zone in &mut self.zones {
            zone.tick(&self.patches, dt);
        }
    }

    fn update_occupancy(&mut self) {
        for patch in self.patches.iter_mut().filter(|p| p.is_live()) {
            let area = patch.area();
            for body in self.bodies.iter_mut() {
                let inside = body.bounds.overlaps(&area);
                let tracked = patch.is_occupied_by(body.id);
                if inside && !tracked {
                    patch.on_enter(body);
                } else if !inside && tracked {
                    patch.on_exit(body);
                }
            }
        }

        for zone in &mut self.zones {
            zone.sync_overlaps(&self.patches);
        }
    }
}
