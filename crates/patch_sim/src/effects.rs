//! Particle emitter state.

/// Particles per second for a given precipitation, ~50 per mm/h.
pub fn emission_rate(precip_mm_h: f32) -> f32 {
    (50.0 * precip_mm_h.max(0.1)).clamp(10.0, 600.0)
}

/// An on/off particle emitter with a base rate and a scaled live rate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Emitter {
    pub enabled: bool,
    pub base_rate: f32,
    pub rate: f32,
}

impl Emitter {
    /// Switch on or off and set the rate for `precip_mm_h`.
    pub fn toggle(&mut self, on: bool, precip_mm_h: f32) {
        self.enabled = on;
        self.base_rate = emission_rate(precip_mm_h);
        self.rate = self.base_rate;
    }

    /// Scale the live rate by `k` in `[0, 1]`, relative to the base rate.
    pub fn scale(&mut self, k: f32) {
        self.rate = self.base_rate * k.clamp(0.0, 1.0);
    }

    pub fn is_emitting(&self) -> bool {
        self.enabled && self.rate > 0.0
    }
}
