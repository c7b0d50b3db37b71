use log::debug;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ClockPhase {
    Running,
    Paused { since_ms: f64 },
    Terminated,
}

/// Derives map time from wall time. Map time is never stored:
/// `now - start - accumulated_pause + intro_skip`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Clock {
    wall_start_ms: f64,
    accumulated_pause_ms: f64,
    intro_skip_ms: f64,
    phase: ClockPhase,
    first_hit_registered: bool,
}

impl Clock {
    pub fn start(wall_now_ms: f64) -> Self {
        Self {
            wall_start_ms: wall_now_ms,
            accumulated_pause_ms: 0.0,
            intro_skip_ms: 0.0,
            phase: ClockPhase::Running,
            first_hit_registered: false,
        }
    }

    #[inline(always)]
    pub const fn phase(&self) -> ClockPhase {
        self.phase
    }

    #[inline(always)]
    pub const fn is_running(&self) -> bool {
        matches!(self.phase, ClockPhase::Running)
    }

    #[inline(always)]
    pub const fn is_paused(&self) -> bool {
        matches!(self.phase, ClockPhase::Paused { .. })
    }

    #[inline(always)]
    pub const fn is_terminated(&self) -> bool {
        matches!(self.phase, ClockPhase::Terminated)
    }

    /// `None` once terminated. Frozen at the pause instant while paused.
    pub fn map_time_ms(&self, wall_now_ms: f64) -> Option<f64> {
        let effective_now = match self.phase {
            ClockPhase::Running => wall_now_ms,
            ClockPhase::Paused { since_ms } => since_ms,
            ClockPhase::Terminated => return None,
        };
        Some(effective_now - self.wall_start_ms - self.accumulated_pause_ms + self.intro_skip_ms)
    }

    pub fn pause(&mut self, wall_now_ms: f64) {
        if let ClockPhase::Running = self.phase {
            self.phase = ClockPhase::Paused {
                since_ms: wall_now_ms,
            };
        }
    }

    pub fn resume(&mut self, wall_now_ms: f64) {
        if let ClockPhase::Paused { since_ms } = self.phase {
            let paused_for = (wall_now_ms - since_ms).max(0.0);
            self.accumulated_pause_ms += paused_for;
            self.phase = ClockPhase::Running;
            debug!("Clock resumed after {paused_for:.0}ms pause");
        }
    }

    /// Holds map time back by `ms`, for stalls such as an audio restart
    /// mid-play.
    pub fn stall(&mut self, ms: f64) {
        if self.is_running() && ms.is_finite() && ms > 0.0 {
            self.accumulated_pause_ms += ms;
        }
    }

    /// Jumps map time forward. Refused after the first hit or for
    /// non-positive amounts.
    pub fn skip_intro(&mut self, amount_ms: f64) -> bool {
        if self.first_hit_registered || !amount_ms.is_finite() || amount_ms <= 0.0 {
            return false;
        }
        if self.is_terminated() {
            return false;
        }
        self.intro_skip_ms += amount_ms;
        true
    }

    #[inline(always)]
    pub fn register_hit(&mut self) {
        self.first_hit_registered = true;
    }

    #[inline(always)]
    pub const fn first_hit_registered(&self) -> bool {
        self.first_hit_registered
    }

    pub fn terminate(&mut self) {
        self.phase = ClockPhase::Terminated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_time_follows_wall_time_while_running() {
        let c = Clock::start(1000.0);
        assert_eq!(c.map_time_ms(1000.0), Some(0.0));
        assert_eq!(c.map_time_ms(1750.0), Some(750.0));
    }

    #[test]
    fn stall_holds_map_time_back() {
        let mut c = Clock::start(0.0);
        c.stall(40.0);
        assert_eq!(c.map_time_ms(1000.0), Some(960.0));
        c.stall(f64::NAN);
        c.stall(-5.0);
        assert_eq!(c.map_time_ms(1000.0), Some(960.0));
    }

    #[test]
    fn pause_resume_leaves_map_time_unchanged() {
        let mut c = Clock::start(0.0);
        c.pause(500.0);
        assert_eq!(c.map_time_ms(500.0), Some(500.0));
        assert_eq!(c.map_time_ms(90_000.0), Some(500.0), "frozen while paused");
        c.resume(12_345.0);
        let t = c.map_time_ms(12_345.0).unwrap_or_default();
        assert!((t - 500.0).abs() < 1e-9, "resume must not jump; got {t}");
        assert_eq!(c.map_time_ms(12_445.0), Some(600.0));
    }

    #[test]
    fn pause_and_resume_are_no_ops_in_the_wrong_phase() {
        let mut c = Clock::start(0.0);
        c.resume(100.0);
        assert_eq!(c.map_time_ms(100.0), Some(100.0));
        c.pause(100.0);
        c.pause(300.0);
        assert_eq!(c.phase(), ClockPhase::Paused { since_ms: 100.0 });
    }

    #[test]
    fn skip_intro_is_refused_after_first_hit() {
        let mut c = Clock::start(0.0);
        assert!(!c.skip_intro(0.0));
        assert!(!c.skip_intro(-10.0));
        assert!(c.skip_intro(2000.0));
        assert_eq!(c.map_time_ms(0.0), Some(2000.0));
        c.register_hit();
        assert!(!c.skip_intro(500.0));
        assert_eq!(c.map_time_ms(0.0), Some(2000.0));
    }

    #[test]
    fn terminated_clock_has_no_map_time() {
        let mut c = Clock::start(0.0);
        c.pause(10.0);
        c.terminate();
        assert_eq!(c.map_time_ms(20.0), None);
        c.resume(30.0);
        assert!(c.is_terminated());
    }
}
