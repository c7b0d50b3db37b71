use crate::game::judgment::Rank;
use crate::game::life::{
    BASE_DRAIN_PER_MS, LIFE_HIT, LIFE_LOOSE, LIFE_MID, LIFE_MISS, health_rate_factor,
};
use crate::game::mods::ModSet;
use crate::game::timing_windows::{TimingWindows, approach_duration_ms, hit_radius_px};

// Hard Rock scales the raw knobs, never the derived values.
pub const HARD_ROCK_AR_FACTOR: f64 = 1.5;
pub const HARD_ROCK_OD_FACTOR: f64 = 1.5;
pub const HARD_ROCK_CS_FACTOR: f64 = 1.5;
pub const HARD_ROCK_HP_FACTOR: f64 = 1.0;

// Used when a knob arrives as NaN/inf.
const FALLBACK_KNOB: f64 = 5.0;

/// The four raw difficulty values from a map header.
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize)]
pub struct DifficultyKnobs {
    pub ar: f64,
    pub od: f64,
    pub cs: f64,
    pub hp: f64,
}

impl Default for DifficultyKnobs {
    fn default() -> Self {
        Self {
            ar: FALLBACK_KNOB,
            od: FALLBACK_KNOB,
            cs: FALLBACK_KNOB,
            hp: FALLBACK_KNOB,
        }
    }
}

impl DifficultyKnobs {
    fn sanitized(self) -> Self {
        #[inline(always)]
        fn knob(v: f64) -> f64 {
            if v.is_finite() { v.max(0.0) } else { FALLBACK_KNOB }
        }
        Self {
            ar: knob(self.ar),
            od: knob(self.od),
            cs: knob(self.cs),
            hp: knob(self.hp),
        }
    }

    /// Knobs after modifier scaling.
    pub fn with_mods(self, mods: ModSet) -> Self {
        let k = self.sanitized();
        if !mods.contains(ModSet::HARD_ROCK) {
            return k;
        }
        Self {
            ar: k.ar * HARD_ROCK_AR_FACTOR,
            od: k.od * HARD_ROCK_OD_FACTOR,
            cs: k.cs * HARD_ROCK_CS_FACTOR,
            hp: k.hp * HARD_ROCK_HP_FACTOR,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DifficultyParams {
    pub approach_duration_ms: f64,
    /// Effective hit size; a press counts when closer than half of it.
    pub hit_radius_px: f64,
    pub timing: TimingWindows,
    pub health_gain_on_hit: f64,
    pub health_loss_on_mid: f64,
    pub health_loss_on_loose: f64,
    pub health_loss_on_miss: f64,
    pub health_drain_per_ms: f64,
}

impl DifficultyParams {
    #[inline(always)]
    pub const fn timing_windows_ms(&self) -> [f64; 3] {
        self.timing.windows_ms
    }

    /// Radius of the circle around a target within which a press lands.
    #[inline(always)]
    pub fn hit_distance_px(&self) -> f32 {
        (self.hit_radius_px * 0.5) as f32
    }

    /// Signed health delta applied when `rank` is judged.
    #[inline(always)]
    pub const fn health_delta(&self, rank: Rank) -> f64 {
        match rank {
            Rank::Perfect => self.health_gain_on_hit,
            Rank::Good => -self.health_loss_on_mid,
            Rank::Meh => -self.health_loss_on_loose,
            Rank::Miss => -self.health_loss_on_miss,
        }
    }
}

/// Maps raw knobs plus modifiers to engine parameters. Pure and total: any
/// input produces a usable parameter set.
pub fn derive(knobs: DifficultyKnobs, mods: ModSet) -> DifficultyParams {
    let k = knobs.with_mods(mods);

    let rate = health_rate_factor(k.hp);
    // Hit gain scales inversely with the factor, penalties directly.
    let gain = LIFE_HIT / rate;
    let loss = |base: f64| (-base) * rate;

    DifficultyParams {
        approach_duration_ms: approach_duration_ms(k.ar),
        hit_radius_px: hit_radius_px(k.cs),
        timing: TimingWindows::from_od(k.od),
        health_gain_on_hit: gain,
        health_loss_on_mid: loss(LIFE_MID),
        health_loss_on_loose: loss(LIFE_LOOSE),
        health_loss_on_miss: loss(LIFE_MISS),
        health_drain_per_ms: BASE_DRAIN_PER_MS / rate,
    }
}
