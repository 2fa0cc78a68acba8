//! Owner of every live patch, including the single "active" slot.

use crate::body::Bodies;
use crate::geometry::Rect;
use crate::patch::{PatchId, PatchState, WeatherPatch};
use common::config::PatchConfig;
use common::WeatherReading;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Default)]
pub struct PatchRegistry {
    next_id: u64,
    patches: BTreeMap<PatchId, WeatherPatch>,
    active: Option<PatchId>,
}

impl PatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending patch. It becomes active on the next lifecycle pass.
    pub fn spawn(
        &mut self,
        reading: WeatherReading,
        area: Rect,
        now: f64,
        lifetime: Option<f64>,
        cfg: &PatchConfig,
    ) -> PatchId {
        self.next_id += 1;
        let id = PatchId(self.next_id);
        self.patches
            .insert(id, WeatherPatch::new(id, reading, area, now, lifetime, cfg));
        id
    }

    /// Remove a patch, restoring its occupants first.
    pub fn despawn(&mut self, id: PatchId, bodies: &mut Bodies) -> bool {
        let Some(mut patch) = self.patches.remove(&id) else {
            return false;
        };
        patch.release(bodies);
        if self.active == Some(id) {
            self.active = None;
        }
        info!("{} despawned", id);
        true
    }

    pub fn get(&self, id: PatchId) -> Option<&WeatherPatch> {
        self.patches.get(&id)
    }

    pub fn get_mut(&mut self, id: PatchId) -> Option<&mut WeatherPatch> {
        self.patches.get_mut(&id)
    }

    pub fn active(&self) -> Option<PatchId> {
        self.active
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeatherPatch> {
        self.patches.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WeatherPatch> {
        self.patches.values_mut()
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Activate pending patches, advance fades and release expired ones.
    ///
    /// A pending patch that enforces the singleton replaces the previous
    /// active patch before it is marked active itself. Returns the ids
    /// released this pass.
    pub fn tick_lifecycle(&mut self, now: f64, bodies: &mut Bodies) -> Vec<PatchId> {
        let mut released = Vec::new();

        let pending: Vec<PatchId> = self
            .patches
            .values()
            .filter(|p| p.state() == PatchState::Pending)
            .map(|p| p.id())
            .collect();

        for id in pending {
            let enforce = self
                .patches
                .get(&id)
                .is_some_and(|p| p.enforces_single_active());
            if enforce {
                if let Some(previous) = self.active.filter(|prev| *prev != id) {
                    info!("{} replaces {}", id, previous);
                    if self.despawn(previous, bodies) {
                        released.push(previous);
                    }
                }
                self.active = Some(id);
            }
            if let Some(patch) = self.patches.get_mut(&id) {
                patch.activate();
            }
        }

        let expired: Vec<PatchId> = self
            .patches
            .values_mut()
            .filter_map(|p| (p.advance(now) == PatchState::Expired).then(|| p.id()))
            .collect();

        for id in expired {
            info!("{} expired", id);
            if self.despawn(id, bodies) {
                released.push(id);
            }
        }

        released
    }
}
