use crate::game::difficulty::DifficultyParams;
use crate::game::judgment::Rank;
use crate::game::life::{HEALTH_INITIAL, HEALTH_MIN, clamp_health};

// Combo bonus: base * (1 + (combo * COMBO_SCALE)^2).
const COMBO_SCALE: f64 = 0.1;

/// Number of judgements per rank.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct JudgementCounts {
    pub perfect: u32,
    pub good: u32,
    pub meh: u32,
    pub miss: u32,
}

impl JudgementCounts {
    #[inline(always)]
    pub const fn get(&self, rank: Rank) -> u32 {
        match rank {
            Rank::Perfect => self.perfect,
            Rank::Good => self.good,
            Rank::Meh => self.meh,
            Rank::Miss => self.miss,
        }
    }

    #[inline(always)]
    fn bump(&mut self, rank: Rank) {
        let slot = match rank {
            Rank::Perfect => &mut self.perfect,
            Rank::Good => &mut self.good,
            Rank::Meh => &mut self.meh,
            Rank::Miss => &mut self.miss,
        };
        *slot = slot.saturating_add(1);
    }

    #[inline(always)]
    pub const fn total(&self) -> u32 {
        self.perfect + self.good + self.meh + self.miss
    }

    /// Weighted average over all judgements, in percent. 0 when empty.
    pub fn accuracy_percent(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let weighted: f64 = Rank::ALL
            .iter()
            .map(|&r| f64::from(self.get(r)) * r.accuracy_weight())
            .sum();
        weighted / f64::from(total)
    }
}

/// End-of-play letter grade, decided by the share of Perfects.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub enum Grade {
    SS,
    S,
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn from_counts(counts: &JudgementCounts) -> Self {
        let total = counts.total();
        if total == 0 {
            return Self::D;
        }
        let perfect = f64::from(counts.perfect) / f64::from(total);
        let clean = counts.miss == 0;
        if counts.perfect == total {
            Self::SS
        } else if perfect > 0.9 && clean {
            Self::S
        } else if perfect > 0.9 || (perfect > 0.8 && clean) {
            Self::A
        } else if perfect > 0.8 || (perfect > 0.7 && clean) {
            Self::B
        } else if perfect > 0.65 {
            Self::C
        } else {
            Self::D
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SS => "SS",
            Self::S => "S",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl core::fmt::Display for Grade {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a HUD needs to draw for one frame.
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize)]
pub struct HudSnapshot {
    pub score: u64,
    pub health: f64,
    pub accuracy_percent: f64,
    pub combo: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoreState {
    score: u64,
    health: f64,
    combo: u32,
    max_combo: u32,
    counts: JudgementCounts,
    accuracy_percent: f64,
}

impl Default for ScoreState {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreState {
    pub fn new() -> Self {
        Self {
            score: 0,
            health: HEALTH_INITIAL,
            combo: 0,
            max_combo: 0,
            counts: JudgementCounts::default(),
            accuracy_percent: 0.0,
        }
    }

    pub fn apply_judgement(&mut self, rank: Rank, params: &DifficultyParams) {
        let multiplier = 1.0 + (f64::from(self.combo) * COMBO_SCALE).powi(2);
        let gained = (f64::from(rank.base_score()) * multiplier).floor();
        self.score = self.score.saturating_add(gained as u64);

        self.set_health(self.health + params.health_delta(rank));

        if rank == Rank::Miss {
            self.combo = 0;
        } else {
            self.combo = self.combo.saturating_add(1);
            self.max_combo = self.max_combo.max(self.combo);
        }

        self.counts.bump(rank);
        self.accuracy_percent = self.counts.accuracy_percent();
    }

    /// Passive drain for one tick. Callers skip this inside breaks.
    pub fn apply_tick(&mut self, tick_ms: f64, params: &DifficultyParams) {
        self.set_health(self.health - params.health_drain_per_ms * tick_ms.max(0.0));
    }

    #[inline(always)]
    fn set_health(&mut self, value: f64) {
        self.health = clamp_health(value);
    }

    #[inline(always)]
    pub fn is_depleted(&self) -> bool {
        self.health <= HEALTH_MIN
    }

    pub const fn score(&self) -> u64 {
        self.score
    }

    pub const fn health(&self) -> f64 {
        self.health
    }

    pub const fn combo(&self) -> u32 {
        self.combo
    }

    pub const fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub const fn judged_count(&self) -> u32 {
        self.counts.total()
    }

    pub const fn counts(&self) -> &JudgementCounts {
        &self.counts
    }

    pub const fn accuracy_percent(&self) -> f64 {
        self.accuracy_percent
    }

    pub fn grade(&self) -> Grade {
        Grade::from_counts(&self.counts)
    }

    pub const fn hud(&self) -> HudSnapshot {
        HudSnapshot {
            score: self.score,
            health: self.health,
            accuracy_percent: self.accuracy_percent,
            combo: self.combo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::difficulty::{DifficultyKnobs, derive};
    use crate::game::mods::ModSet;

    fn params() -> DifficultyParams {
        derive(DifficultyKnobs::default(), ModSet::empty())
    }

    #[test]
    fn combo_counts_non_misses_and_resets_only_on_miss() {
        let p = params();
        let mut s = ScoreState::new();
        for rank in [Rank::Perfect, Rank::Meh, Rank::Good, Rank::Perfect, Rank::Meh] {
            s.apply_judgement(rank, &p);
        }
        assert_eq!(s.combo(), 5);
        s.apply_judgement(Rank::Miss, &p);
        assert_eq!(s.combo(), 0);
        s.apply_judgement(Rank::Good, &p);
        assert_eq!(s.combo(), 1);
        assert_eq!(s.max_combo(), 5);
    }

    #[test]
    fn score_uses_combo_before_increment() {
        let p = params();
        let mut s = ScoreState::new();
        s.apply_judgement(Rank::Perfect, &p);
        assert_eq!(s.score(), 300, "combo 0 gives the bare base score");
        s.apply_judgement(Rank::Perfect, &p);
        // combo 1: 300 * (1 + 0.01) = 303
        assert_eq!(s.score(), 603);
        for _ in 0..8 {
            s.apply_judgement(Rank::Good, &p);
        }
        let before = s.score();
        s.apply_judgement(Rank::Meh, &p);
        // combo 10: 50 * (1 + 1) = 100
        assert_eq!(s.score() - before, 100);
    }

    #[test]
    fn accuracy_is_recomputed_from_counts() {
        let p = params();
        let history = [
            Rank::Perfect,
            Rank::Miss,
            Rank::Good,
            Rank::Good,
            Rank::Meh,
            Rank::Perfect,
            Rank::Miss,
        ];
        let mut s = ScoreState::new();
        for (i, rank) in history.iter().enumerate() {
            s.apply_judgement(*rank, &p);
            let seen = &history[..=i];
            let direct: f64 =
                seen.iter().map(|r| r.accuracy_weight()).sum::<f64>() / seen.len() as f64;
            assert!(
                (s.accuracy_percent() - direct).abs() < 1e-9,
                "accuracy drifted after {} judgements",
                i + 1
            );
        }
        assert_eq!(s.judged_count(), history.len() as u32);
    }

    #[test]
    fn empty_state_reports_zero_accuracy_and_d() {
        let s = ScoreState::new();
        assert_eq!(s.accuracy_percent(), 0.0);
        assert_eq!(s.grade(), Grade::D);
        assert_eq!(s.health(), 100.0);
    }

    #[test]
    fn health_is_clamped_on_every_write() {
        let p = params();
        let mut s = ScoreState::new();
        s.apply_judgement(Rank::Perfect, &p);
        assert_eq!(s.health(), 100.0);
        for _ in 0..200 {
            s.apply_judgement(Rank::Miss, &p);
        }
        assert_eq!(s.health(), 0.0);
        assert!(s.is_depleted());
        s.apply_tick(1.0e9, &p);
        assert_eq!(s.health(), 0.0);
    }

    #[test]
    fn tick_drains_by_rate_times_duration() {
        let p = params();
        let mut s = ScoreState::new();
        s.apply_tick(20.0, &p);
        let expected = 100.0 - p.health_drain_per_ms * 20.0;
        assert!((s.health() - expected).abs() < 1e-12);
    }

    #[test]
    fn grade_table_matches_perfect_share() {
        let counts = |perfect, good, meh, miss| JudgementCounts {
            perfect,
            good,
            meh,
            miss,
        };
        assert_eq!(Grade::from_counts(&counts(10, 0, 0, 0)), Grade::SS);
        assert_eq!(Grade::from_counts(&counts(95, 5, 0, 0)), Grade::S);
        assert_eq!(Grade::from_counts(&counts(95, 4, 0, 1)), Grade::A);
        assert_eq!(Grade::from_counts(&counts(85, 15, 0, 0)), Grade::A);
        assert_eq!(Grade::from_counts(&counts(85, 10, 0, 5)), Grade::B);
        assert_eq!(Grade::from_counts(&counts(75, 25, 0, 0)), Grade::B);
        assert_eq!(Grade::from_counts(&counts(70, 20, 0, 10)), Grade::C);
        assert_eq!(Grade::from_counts(&counts(50, 50, 0, 0)), Grade::D);
    }
}
