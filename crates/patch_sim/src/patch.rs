//! Weather patch: one reading applied over an area for a limited time.
//!
//! Lifecycle: `Pending` until the registry's first tick sees it, then
//! `Active`, `Fading` once the fade window opens, and `Expired` at the
//! deadline. Expiry and despawn go through [`WeatherPatch::release`], which
//! drops this patch's friction from every occupant.

use crate::body::{Bodies, Body, BodyId};
use crate::effects::Emitter;
use crate::geometry::{Rect, Vec2};
use common::config::PatchConfig;
use common::{clamp01, WeatherReading};
use std::collections::BTreeSet;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatchId(pub u64);

impl std::fmt::Display for PatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "patch#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    Pending,
    Active,
    Fading,
    Expired,
}

/// Emitters and light derived from the reading at creation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PatchVisuals {
    pub rain: Emitter,
    pub snow: Emitter,
    pub sun_light: bool,
}

impl PatchVisuals {
    pub fn for_reading(w: &WeatherReading, precip_threshold: f32, sun_temp_c: f32) -> Self {
        let wet = w.precipitation_mm_h > precip_threshold;
        let mut visuals = Self::default();
        visuals.rain.toggle(wet && !w.is_snow, w.precipitation_mm_h);
        visuals.snow.toggle(wet && w.is_snow, w.precipitation_mm_h);
        visuals.sun_light = w.temperature_c >= sun_temp_c;
        visuals
    }

    fn scale(&mut self, k: f32) {
        self.rain.scale(k);
        self.snow.scale(k);
    }
}

#[derive(Debug, Clone)]
pub struct WeatherPatch {
    id: PatchId,
    reading: WeatherReading,
    area: Rect,
    created_at: f64,
    die_at: Option<f64>,
    fade_start: Option<f64>,
    state: PatchState,
    visuals: PatchVisuals,
    occupants: BTreeSet<BodyId>,
    friction_per_mm_h: f32,
    wind_to_force: f32,
    enable_wind: bool,
    enforce_single_active: bool,
}

impl WeatherPatch {
    /// `lifetime` of `None` (or <= 0) lives until replaced or despawned.
    pub fn new(
        id: PatchId,
        reading: WeatherReading,
        area: Rect,
        now: f64,
        lifetime: Option<f64>,
        cfg: &PatchConfig,
    ) -> Self {
        let die_at = lifetime.filter(|l| *l > 0.0).map(|l| now + l);
        let fade_start = die_at
            .filter(|_| cfg.fade_out_secs > 0.0)
            .map(|d| d - cfg.fade_out_secs);
        let visuals =
            PatchVisuals::for_reading(&reading, cfg.precip_threshold_mm_h, cfg.sun_light_temp_c);

        info!(
            "{} created @ {} | {} (lifetime={:?})",
            id,
            area.center(),
            reading,
            lifetime
        );

        Self {
            id,
            reading,
            area,
            created_at: now,
            die_at,
            fade_start,
            state: PatchState::Pending,
            visuals,
            occupants: BTreeSet::new(),
            friction_per_mm_h: cfg.friction_per_mm_h,
            wind_to_force: cfg.wind_to_force,
            enable_wind: cfg.enable_wind,
            enforce_single_active: cfg.enforce_single_active,
        }
    }

    pub fn id(&self) -> PatchId {
        self.id
    }

    pub fn reading(&self) -> &WeatherReading {
        &self.reading
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn state(&self) -> PatchState {
        self.state
    }

    pub fn visuals(&self) -> &PatchVisuals {
        &self.visuals
    }

    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    pub fn die_at(&self) -> Option<f64> {
        self.die_at
    }

    pub fn fade_start(&self) -> Option<f64> {
        self.fade_start
    }

    pub fn enforces_single_active(&self) -> bool {
        self.enforce_single_active
    }

    pub fn is_live(&self) -> bool {
        self.state != PatchState::Expired
    }

    pub fn is_occupied_by(&self, body: BodyId) -> bool {
        self.occupants.contains(&body)
    }

    pub fn occupants(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.occupants.iter().copied()
    }

    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    /// Friction applied to occupants.
    pub fn patch_friction(&self) -> f32 {
        clamp01(1.0 - self.reading.precipitation_mm_h * self.friction_per_mm_h)
    }

    /// Emission multiplier: 1 before the fade window, 0 at the deadline.
    pub fn fade_factor(&self, now: f64) -> f32 {
        match (self.fade_start, self.die_at) {
            (Some(start), Some(end)) => {
                let t = if end > start {
                    (now - start) / (end - start)
                } else {
                    1.0
                };
                1.0 - clamp01(t as f32)
            }
            _ => 1.0,
        }
    }

    pub(crate) fn activate(&mut self) {
        if self.state == PatchState::Pending {
            self.state = PatchState::Active;
            debug!("{} active", self.id);
        }
    }

    /// Advance fade and expiry to `now`. Does not release occupants.
    pub fn advance(&mut self, now: f64) -> PatchState {
        if matches!(self.state, PatchState::Pending | PatchState::Expired) {
            return self.state;
        }

        if self.state == PatchState::Active && self.fade_start.is_some_and(|s| now >= s) {
            self.state = PatchState::Fading;
            debug!("{} fading", self.id);
        }

        if self.state == PatchState::Fading {
            let k = self.fade_factor(now);
            self.visuals.scale(k);
        }

        if self.die_at.is_some_and(|d| now >= d) {
            self.state = PatchState::Expired;
        }

        self.state
    }

    /// Body entered the area: layer this patch's friction on top.
    pub fn on_enter(&mut self, body: &mut Body) {
        if !self.is_live() || !self.occupants.insert(body.id) {
            return;
        }
        body.push_friction(self.id, self.patch_friction());
        debug!("{} entered {} (friction {:.2})", body.id, self.id, body.material.friction);
    }

    /// Body left the area: drop this patch's friction layer.
    pub fn on_exit(&mut self, body: &mut Body) {
        if self.occupants.remove(&body.id) {
            body.pop_friction(self.id);
            debug!("{} left {}", body.id, self.id);
        }
    }

    /// Push every occupant along x by wind speed.
    pub fn apply_wind(&self, bodies: &mut Bodies) {
        if !self.enable_wind || !self.is_live() || self.reading.wind_speed_ms.abs() <= 0.01 {
            return;
        }
        let force = Vec2::new(self.reading.wind_speed_ms * self.wind_to_force, 0.0);
        for id in &self.occupants {
            if let Some(body) = bodies.get_mut(*id) {
                body.add_force(force);
            }
        }
    }

    /// Drop this patch from every occupant and mark it expired.
    pub(crate) fn release(&mut self, bodies: &mut Bodies) {
        for id in std::mem::take(&mut self.occupants) {
            if let Some(body) = bodies.get_mut(id) {
                body.pop_friction(self.id);
            }
        }
        self.state = PatchState::Expired;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::SurfaceMaterial;

    fn reading(temp: f32, precip: f32, snow: bool) -> WeatherReading {
        WeatherReading {
            temperature_c: temp,
            wind_speed_ms: 2.0,
            precipitation_mm_h: precip,
            cloudiness: 0.5,
            is_snow: snow,
            source_label: "test".into(),
        }
    }

    fn area() -> Rect {
        Rect::from_center_size(Vec2::ZERO, Vec2::new(8.0, 8.0))
    }

    fn patch(w: WeatherReading, lifetime: Option<f64>, cfg: &PatchConfig) -> WeatherPatch {
        WeatherPatch::new(PatchId(1), w, area(), 10.0, lifetime, cfg)
    }

    #[test]
    fn test_visuals_follow_reading() {
        let cfg = PatchConfig::default();

        let rain = patch(reading(6.0, 2.0, false), None, &cfg);
        assert!(rain.visuals().rain.enabled);
        assert!(!rain.visuals().snow.enabled);
        assert_eq!(rain.visuals().rain.rate, 100.0);
        assert!(!rain.visuals().sun_light);

        let snow = patch(reading(-2.0, 2.0, true), None, &cfg);
        assert!(snow.visuals().snow.enabled);
        assert!(!snow.visuals().rain.enabled);

        let sun = patch(reading(32.0, 0.0, false), None, &cfg);
        assert!(!sun.visuals().rain.enabled);
        assert!(sun.visuals().sun_light);
    }

    #[test]
    fn test_deadlines_from_lifetime() {
        let cfg = PatchConfig::default();

        let finite = patch(reading(6.0, 2.0, false), Some(5.0), &cfg);
        assert_eq!(finite.die_at(), Some(15.0));
        assert_eq!(finite.fade_start(), Some(15.0 - 0.35));

        let endless = patch(reading(6.0, 2.0, false), None, &cfg);
        assert_eq!(endless.die_at(), None);
        assert_eq!(endless.fade_start(), None);

        let no_fade = PatchConfig {
            fade_out_secs: 0.0,
            ..PatchConfig::default()
        };
        let abrupt = patch(reading(6.0, 2.0, false), Some(5.0), &no_fade);
        assert_eq!(abrupt.fade_start(), None);
    }

    #[test]
    fn test_fade_scales_emission_linearly() {
        let cfg = PatchConfig {
            fade_out_secs: 1.0,
            ..PatchConfig::default()
        };
        let mut p = patch(reading(6.0, 2.0, false), Some(2.0), &cfg);
        p.activate();

        assert_eq!(p.advance(10.5), PatchState::Active);
        assert_eq!(p.visuals().rain.rate, 100.0);

        assert_eq!(p.advance(11.5), PatchState::Fading);
        assert!((p.visuals().rain.rate - 50.0).abs() < 1e-3);

        assert_eq!(p.advance(12.0), PatchState::Expired);
        assert_eq!(p.fade_factor(12.0), 0.0);
    }

    #[test]
    fn test_pending_patch_does_not_advance() {
        let mut p = patch(reading(6.0, 2.0, false), Some(1.0), &PatchConfig::default());
        assert_eq!(p.advance(100.0), PatchState::Pending);
    }

    #[test]
    fn test_enter_then_exit_restores_exact_material() {
        let mut bodies = Bodies::new();
        let original = SurfaceMaterial {
            friction: 0.37,
            bounciness: 0.2,
        };
        let id = bodies.spawn(area(), original);
        let mut p = patch(reading(6.0, 2.0, false), None, &PatchConfig::default());
        p.activate();

        p.on_enter(bodies.get_mut(id).unwrap());
        let inside = bodies.get(id).unwrap().material;
        assert!((inside.friction - 0.7).abs() < 1e-6);
        assert_eq!(inside.bounciness, 0.2);
        assert!(p.is_occupied_by(id));

        p.on_exit(bodies.get_mut(id).unwrap());
        assert_eq!(bodies.get(id).unwrap().material, original);
        assert_eq!(p.occupant_count(), 0);
    }

    #[test]
    fn test_heavy_precip_clamps_friction_to_zero() {
        let p = patch(reading(6.0, 20.0, false), None, &PatchConfig::default());
        assert_eq!(p.patch_friction(), 0.0);
    }

    #[test]
    fn test_release_restores_all_occupants() {
        let mut bodies = Bodies::new();
        let a = bodies.spawn(area(), SurfaceMaterial::default());
        let b = bodies.spawn(
            area(),
            SurfaceMaterial {
                friction: 0.9,
                bounciness: 0.5,
            },
        );
        let mut p = patch(reading(6.0, 4.0, false), None, &PatchConfig::default());
        p.activate();
        p.on_enter(bodies.get_mut(a).unwrap());
        p.on_enter(bodies.get_mut(b).unwrap());

        p.release(&mut bodies);

        assert_eq!(p.state(), PatchState::Expired);
        assert_eq!(bodies.get(a).unwrap().material, SurfaceMaterial::default());
        assert_eq!(bodies.get(b).unwrap().material.friction, 0.9);
    }

    #[test]
    fn test_wind_pushes_occupants_only_when_enabled() {
        let mut bodies = Bodies::new();
        let id = bodies.spawn(area(), SurfaceMaterial::default());

        let calm = PatchConfig::default();
        let mut p = patch(reading(6.0, 0.0, false), None, &calm);
        p.activate();
        p.on_enter(bodies.get_mut(id).unwrap());
        p.apply_wind(&mut bodies);
        assert_eq!(bodies.get(id).unwrap().pending_force(), Vec2::ZERO);

        let windy = PatchConfig {
            enable_wind: true,
            ..PatchConfig::default()
        };
        let mut p = patch(reading(6.0, 0.0, false), None, &windy);
        p.activate();
        p.on_enter(bodies.get_mut(id).unwrap());
        p.apply_wind(&mut bodies);
        assert_eq!(bodies.get(id).unwrap().pending_force(), Vec2::new(6.0, 0.0));
    }
}
