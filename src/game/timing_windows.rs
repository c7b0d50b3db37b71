// Exponential curves shared by the deriver and the visual state so judgement
// and rendering agree on the same numbers. All times are milliseconds.

use crate::game::judgment::Rank;

pub const APPROACH_BASE_MS: f64 = 6000.0;
pub const APPROACH_CURVE: f64 = 1.28;

pub const HIT_RADIUS_BASE_PX: f64 = 200.0;
pub const HIT_RADIUS_CURVE: f64 = 1.13;

pub const MISS_WINDOW_BASE_MS: f64 = 1200.0;
pub const MISS_WINDOW_CURVE: f64 = 1.27;

// Fractions of the Miss cutoff for the two inner windows.
pub const PERFECT_WINDOW_FRACTION: f64 = 0.5;
pub const GOOD_WINDOW_FRACTION: f64 = 0.75;

/// Circle timing windows, tight to loose. The last entry is the Miss cutoff:
/// an offset at or beyond it is a Miss.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimingWindows {
    pub windows_ms: [f64; 3],
}

impl TimingWindows {
    #[inline(always)]
    pub fn from_miss_cutoff(miss_ms: f64) -> Self {
        Self {
            windows_ms: [
                miss_ms * PERFECT_WINDOW_FRACTION,
                miss_ms * GOOD_WINDOW_FRACTION,
                miss_ms,
            ],
        }
    }

    #[inline(always)]
    pub fn from_od(od: f64) -> Self {
        Self::from_miss_cutoff(MISS_WINDOW_BASE_MS * MISS_WINDOW_CURVE.powf(-od))
    }

    #[inline(always)]
    pub const fn miss_cutoff_ms(&self) -> f64 {
        self.windows_ms[2]
    }

    /// Classify an absolute press offset. The first window strictly larger
    /// than the offset decides the rank.
    #[inline(always)]
    pub fn classify(&self, offset_ms: f64) -> Rank {
        let abs = offset_ms.abs();
        let w = self.windows_ms;
        if abs < w[0] {
            Rank::Perfect
        } else if abs < w[1] {
            Rank::Good
        } else if abs < w[2] {
            Rank::Meh
        } else {
            Rank::Miss
        }
    }
}

#[inline(always)]
pub fn approach_duration_ms(ar: f64) -> f64 {
    APPROACH_BASE_MS * APPROACH_CURVE.powf(-ar)
}

#[inline(always)]
pub fn hit_radius_px(cs: f64) -> f64 {
    HIT_RADIUS_BASE_PX * HIT_RADIUS_CURVE.powf(-cs)
}
