// Health bar tuning. Health lives in 0..=100 and starts full.
pub const HEALTH_MAX: f64 = 100.0;
pub const HEALTH_MIN: f64 = 0.0;
pub const HEALTH_INITIAL: f64 = HEALTH_MAX;

// Base deltas per rank before HP scaling.
pub const LIFE_HIT: f64 = 10.0;
pub const LIFE_MID: f64 = 0.0;
pub const LIFE_LOOSE: f64 = -7.0;
pub const LIFE_MISS: f64 = -14.0;

// Passive drain (health per ms) at a rate factor of 1.0.
pub const BASE_DRAIN_PER_MS: f64 = 0.005;

pub const HEALTH_RATE_BASE: f64 = 5.0;
pub const HEALTH_RATE_CURVE: f64 = 1.4;

/// Leniency multiplier for an HP knob: large for low HP, small for high HP.
#[inline(always)]
pub fn health_rate_factor(hp: f64) -> f64 {
    HEALTH_RATE_BASE * HEALTH_RATE_CURVE.powf(-hp)
}

#[inline(always)]
pub fn clamp_health(value: f64) -> f64 {
    if value.is_nan() {
        return HEALTH_MIN;
    }
    value.clamp(HEALTH_MIN, HEALTH_MAX)
}
