//! Bodies that patches can affect.
//!
//! Only the parts a patch touches are modeled: bounds for overlap tests, a
//! surface material, and a force accumulator. Integration is left to
//! whatever owns the physics.
//!
//! Patch friction is layered: the body keeps the material it had before the
//! first patch claimed it, plus one override per patch in entry order. The
//! newest override wins; the base comes back when the last one is dropped.

use crate::geometry::{Rect, Vec2};
use crate::patch::PatchId;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(pub u32);

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

/// Surface material, compared exactly on restore.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMaterial {
    pub friction: f32,
    pub bounciness: f32,
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self {
            friction: 0.4,
            bounciness: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Body {
    pub id: BodyId,
    pub bounds: Rect,
    pub material: SurfaceMaterial,
    base: SurfaceMaterial,
    overrides: Vec<(PatchId, f32)>,
    force: Vec2,
}

impl Body {
    /// Put `patch`'s friction on top of any other patch overrides.
    pub fn push_friction(&mut self, patch: PatchId, friction: f32) {
        if self.overrides.is_empty() {
            self.base = self.material;
        }
        self.overrides.retain(|(p, _)| *p != patch);
        self.overrides.push((patch, friction));
        self.apply_top();
    }

    /// Drop `patch`'s override. Returns false if it held none.
    pub fn pop_friction(&mut self, patch: PatchId) -> bool {
        let before = self.overrides.len();
        self.overrides.retain(|(p, _)| *p != patch);
        if self.overrides.len() == before {
            return false;
        }
        self.apply_top();
        true
    }

    /// Material the body had before any patch claimed it.
    pub fn base_material(&self) -> SurfaceMaterial {
        if self.overrides.is_empty() {
            self.material
        } else {
            self.base
        }
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    fn apply_top(&mut self) {
        self.material = match self.overrides.last() {
            Some((_, friction)) => SurfaceMaterial {
                friction: *friction,
                bounciness: self.base.bounciness,
            },
            None => self.base,
        };
    }

    pub fn add_force(&mut self, f: Vec2) {
        self.force += f;
    }

    /// Force accumulated since the last call.
    pub fn take_force(&mut self) -> Vec2 {
        std::mem::take(&mut self.force)
    }

    pub fn pending_force(&self) -> Vec2 {
        self.force
    }
}

/// All bodies in the world, keyed by id.
#[derive(Debug, Default)]
pub struct Bodies {
    next_id: u32,
    items: BTreeMap<BodyId, Body>,
}

impl Bodies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, bounds: Rect, material: SurfaceMaterial) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        self.items.insert(
            id,
            Body {
                id,
                bounds,
                material,
                base: material,
                overrides: Vec::new(),
                force: Vec2::ZERO,
            },
        );
        id
    }

    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.items.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Body> {
        self.items.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Body> {
        self.items.values_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Move a body to a new position, keeping its size.
    pub fn move_to(&mut self, id: BodyId, center: Vec2) -> bool {
        match self.items.get_mut(&id) {
            Some(body) => {
                body.bounds = Rect::from_center_size(center, body.bounds.size());
                true
            }
            None => false,
        }
    }
}
