use crate::game::element::ElementId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub enum Rank {
    Perfect, // 300
    Good,    // 100
    Meh,     // 50
    Miss,
}

impl Rank {
    pub const ALL: [Rank; 4] = [Rank::Perfect, Rank::Good, Rank::Meh, Rank::Miss];

    #[inline(always)]
    pub const fn index(self) -> usize {
        match self {
            Self::Perfect => 0,
            Self::Good => 1,
            Self::Meh => 2,
            Self::Miss => 3,
        }
    }

    #[inline(always)]
    pub const fn base_score(self) -> u32 {
        match self {
            Self::Perfect => 300,
            Self::Good => 100,
            Self::Meh => 50,
            Self::Miss => 0,
        }
    }

    /// Weight of this rank in the accuracy average, in percent.
    #[inline(always)]
    pub const fn accuracy_weight(self) -> f64 {
        match self {
            Self::Perfect => 100.0,
            Self::Good => 100.0 / 3.0,
            Self::Meh => 100.0 / 6.0,
            Self::Miss => 0.0,
        }
    }
}

/// How an element left the active set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum JudgeCause {
    /// A press landed on a circle.
    Hit,
    /// A slider reached its end and was scored on held points.
    SliderEnd,
    /// The element timed out without being hit.
    Expired,
}

#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize)]
pub struct Judgment {
    pub id: ElementId,
    pub rank: Rank,
    pub cause: JudgeCause,
    /// Signed press offset for circle hits (negative = early).
    pub time_error_ms: Option<f64>,
}

// Slider scoring: one point per 20ms of the slider's duration is the maximum.
pub const SLIDER_POINT_INTERVAL_MS: f64 = 20.0;
pub const SLIDER_RELEASE_PENALTY: f64 = 0.8;
pub const SLIDER_PERFECT_FRACTION: f64 = 0.9;
pub const SLIDER_GOOD_FRACTION: f64 = 0.7;
pub const SLIDER_MEH_FRACTION: f64 = 0.5;

#[inline(always)]
pub fn slider_max_points(duration_ms: f64) -> f64 {
    (duration_ms / SLIDER_POINT_INTERVAL_MS).max(0.0)
}

/// Rank a finished slider from its (already penalized) held points.
/// Zero-duration sliders cannot be held and always rank Perfect.
pub fn rank_slider_points(points: f64, duration_ms: f64) -> Rank {
    let max = slider_max_points(duration_ms);
    if max <= 0.0 {
        return Rank::Perfect;
    }
    let ratio = points / max;
    if ratio >= SLIDER_PERFECT_FRACTION {
        Rank::Perfect
    } else if ratio >= SLIDER_GOOD_FRACTION {
        Rank::Good
    } else if ratio >= SLIDER_MEH_FRACTION {
        Rank::Meh
    } else {
        Rank::Miss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slider_thresholds_follow_fraction_of_max_points() {
        // 1000ms slider -> 50 points max.
        assert_eq!(rank_slider_points(50.0, 1000.0), Rank::Perfect);
        assert_eq!(rank_slider_points(45.0, 1000.0), Rank::Perfect);
        assert_eq!(rank_slider_points(44.0, 1000.0), Rank::Good);
        assert_eq!(rank_slider_points(35.0, 1000.0), Rank::Good);
        assert_eq!(rank_slider_points(25.0, 1000.0), Rank::Meh);
        assert_eq!(rank_slider_points(24.9, 1000.0), Rank::Miss);
        assert_eq!(rank_slider_points(0.0, 1000.0), Rank::Miss);
    }

    #[test]
    fn zero_duration_slider_ranks_perfect() {
        assert_eq!(rank_slider_points(0.0, 0.0), Rank::Perfect);
        assert_eq!(rank_slider_points(0.0, -10.0), Rank::Perfect);
    }

    #[test]
    fn rank_indices_are_dense() {
        for (i, r) in Rank::ALL.iter().enumerate() {
            assert_eq!(r.index(), i);
        }
    }
}
