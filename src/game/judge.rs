use crate::game::active::{ActiveKind, ActiveSet, SliderProgress};
use crate::game::difficulty::DifficultyParams;
use crate::game::element::{ElementId, Slider};
use crate::game::judgment::{JudgeCause, Judgment, Rank, SLIDER_RELEASE_PENALTY, rank_slider_points};
use glam::Vec2;
use log::{debug, trace};

/// Outcome of a press that landed on something.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PressOutcome {
    Judged(Judgment),
    /// A slider's follow point was grabbed; it is judged when it ends.
    Grabbed(ElementId),
}

/// Turns press/release transitions into judgements and tracks the one slider
/// that may be dragged at a time.
#[derive(Clone, Debug, Default)]
pub struct Judge {
    drag: Option<ElementId>,
}

impl Judge {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub const fn drag_target(&self) -> Option<ElementId> {
        self.drag
    }

    pub fn reset(&mut self) {
        self.drag = None;
    }

    /// Drops the drag reference if it points at `id`.
    #[inline(always)]
    pub fn forget(&mut self, id: ElementId) {
        if self.drag == Some(id) {
            self.drag = None;
        }
    }

    /// Applies one press (`down`) or release transition at `(x, y)`.
    ///
    /// Returns the judged circle, if any. Slider grabs and releases never
    /// judge; see [`Judge::on_press`] for the full outcome.
    pub fn on_pointer_or_key(
        &mut self,
        down: bool,
        x: f32,
        y: f32,
        map_time_ms: f64,
        active: &mut ActiveSet,
        params: &DifficultyParams,
    ) -> Option<(ElementId, Rank)> {
        if !down {
            self.on_release(map_time_ms, active);
            return None;
        }
        match self.on_press(Vec2::new(x, y), map_time_ms, active, params)? {
            PressOutcome::Judged(j) => Some((j.id, j.rank)),
            PressOutcome::Grabbed(_) => None,
        }
    }

    pub fn on_press(
        &mut self,
        pointer: Vec2,
        map_time_ms: f64,
        active: &mut ActiveSet,
        params: &DifficultyParams,
    ) -> Option<PressOutcome> {
        if !pointer.is_finite() {
            return None;
        }
        let reach = params.hit_distance_px();
        // Oldest eligible target wins; activation order breaks ties.
        let mut best: Option<(ElementId, f64)> = None;
        for entry in active.iter() {
            if entry.hit_point_at(map_time_ms).distance(pointer) >= reach {
                continue;
            }
            let t = entry.target_time();
            if best.is_none_or(|(_, bt)| t < bt) {
                best = Some((entry.id, t));
            }
        }
        let (id, _) = best?;

        let is_slider = active.get(id).is_some_and(|e| e.is_slider());
        if is_slider {
            self.drag = Some(id);
            trace!("Slider {id} grabbed at {map_time_ms:.0}ms");
            return Some(PressOutcome::Grabbed(id));
        }

        let entry = active.remove(id)?;
        let ActiveKind::Circle(circle) = entry.kind else {
            return None;
        };
        let offset = map_time_ms - circle.time;
        let rank = params.timing.classify(offset);
        debug!("Circle {id} hit: {rank:?} (offset {offset:+.1}ms)");
        Some(PressOutcome::Judged(Judgment {
            id,
            rank,
            cause: JudgeCause::Hit,
            time_error_ms: Some(offset),
        }))
    }

    /// Letting go clears the drag reference. The slider stays active and is
    /// judged when it ends.
    pub fn on_release(&mut self, map_time_ms: f64, active: &mut ActiveSet) {
        let Some(id) = self.drag.take() else {
            return;
        };
        if let Some(entry) = active.get_mut(id)
            && let ActiveKind::Slider(slider, progress) = &mut entry.kind
            && map_time_ms < slider.end_time
        {
            progress.released_early = true;
            trace!("Slider {id} released early at {map_time_ms:.0}ms");
        }
    }

    /// Advances every active slider's follow point and credits the dragged
    /// one for this tick when the pointer is on it.
    pub fn accrue(
        &mut self,
        held: bool,
        pointer: Vec2,
        map_time_ms: f64,
        tick_ms: f64,
        active: &mut ActiveSet,
        params: &DifficultyParams,
    ) {
        let reach = params.hit_distance_px();
        for entry in active.iter_mut() {
            let ActiveKind::Slider(slider, progress) = &mut entry.kind else {
                continue;
            };
            progress.follow_distance = slider.follow_distance_at(map_time_ms);
            let in_span = map_time_ms >= slider.start_time && map_time_ms < slider.end_time;
            if !held || self.drag != Some(entry.id) || !in_span {
                continue;
            }
            let follow = slider.point_at_distance(progress.follow_distance);
            if follow.distance(pointer) < reach {
                progress.accrue(slider, tick_ms);
            }
        }
    }
}

/// Final rank for a slider that reached its end.
pub fn finish_slider(slider: &Slider, progress: &SliderProgress) -> Rank {
    let mut points = progress.held_points;
    if progress.released_early {
        points *= SLIDER_RELEASE_PENALTY;
    }
    rank_slider_points(points, slider.duration_ms())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::active::ActiveEntry;
    use crate::game::difficulty::{DifficultyKnobs, derive};
    use crate::game::element::Circle;
    use crate::game::mods::ModSet;
    use crate::game::timing_windows::TimingWindows;

    fn params() -> DifficultyParams {
        derive(DifficultyKnobs::default(), ModSet::empty())
    }

    fn circle_at(id: u32, time: f64, x: f32, y: f32) -> ActiveEntry {
        ActiveEntry {
            id: ElementId(id),
            kind: ActiveKind::Circle(Circle { time, x, y }),
        }
    }

    fn slider(id: u32) -> ActiveEntry {
        ActiveEntry {
            id: ElementId(id),
            kind: ActiveKind::Slider(
                Slider {
                    start_time: 0.0,
                    end_time: 1000.0,
                    length: 200.0,
                    angle_radians: 0.0,
                    x: 100.0,
                    y: 100.0,
                },
                SliderProgress::default(),
            ),
        }
    }

    #[test]
    fn press_at_exact_time_is_perfect_and_removes_the_circle() {
        let p = params();
        let mut set = ActiveSet::new();
        set.insert(circle_at(1, 1000.0, 50.0, 50.0));
        let mut judge = Judge::new();
        let hit = judge.on_pointer_or_key(true, 50.0, 50.0, 1000.0, &mut set, &p);
        assert_eq!(hit, Some((ElementId(1), Rank::Perfect)));
        assert!(set.is_empty());
        let again = judge.on_pointer_or_key(true, 50.0, 50.0, 1000.0, &mut set, &p);
        assert_eq!(again, None, "a judged circle cannot be judged twice");
    }

    #[test]
    fn press_at_miss_cutoff_is_miss() {
        let mut p = params();
        p.timing = TimingWindows::from_miss_cutoff(100.0);
        let mut set = ActiveSet::new();
        set.insert(circle_at(1, 1000.0, 0.0, 0.0));
        let mut judge = Judge::new();
        let hit = judge.on_pointer_or_key(true, 0.0, 0.0, 1100.0, &mut set, &p);
        assert_eq!(hit, Some((ElementId(1), Rank::Miss)));
    }

    #[test]
    fn oldest_overlapping_circle_wins() {
        let p = params();
        let mut set = ActiveSet::new();
        set.insert(circle_at(1, 1200.0, 10.0, 10.0));
        set.insert(circle_at(2, 1100.0, 12.0, 10.0));
        let mut judge = Judge::new();
        let hit = judge.on_pointer_or_key(true, 11.0, 10.0, 1100.0, &mut set, &p);
        assert_eq!(hit.map(|(id, _)| id), Some(ElementId(2)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn press_outside_radius_is_a_no_op() {
        let p = params();
        let mut set = ActiveSet::new();
        set.insert(circle_at(1, 1000.0, 0.0, 0.0));
        let mut judge = Judge::new();
        let far = p.hit_distance_px() + 1.0;
        assert_eq!(judge.on_pointer_or_key(true, far, 0.0, 1000.0, &mut set, &p), None);
        assert_eq!(
            judge.on_pointer_or_key(true, f32::NAN, 0.0, 1000.0, &mut set, &p),
            None
        );
        assert_eq!(
            judge.on_pointer_or_key(true, -1.0e9, 1.0e9, 1000.0, &mut set, &p),
            None
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn slider_grab_then_release_marks_early_release_without_judging() {
        let p = params();
        let mut set = ActiveSet::new();
        set.insert(slider(3));
        let mut judge = Judge::new();
        let out = judge.on_press(Vec2::new(100.0, 100.0), 0.0, &mut set, &p);
        assert_eq!(out, Some(PressOutcome::Grabbed(ElementId(3))));
        assert_eq!(judge.drag_target(), Some(ElementId(3)));

        judge.accrue(true, Vec2::new(100.0, 100.0), 0.0, 20.0, &mut set, &p);
        assert_eq!(judge.on_pointer_or_key(false, 0.0, 0.0, 500.0, &mut set, &p), None);
        assert_eq!(judge.drag_target(), None);
        match set.get(ElementId(3)).map(|e| e.kind) {
            Some(ActiveKind::Slider(_, progress)) => {
                assert!(progress.released_early);
                assert_eq!(progress.held_points, 1.0);
            }
            other => panic!("slider should still be active: {other:?}"),
        }
    }

    #[test]
    fn accrual_needs_pointer_on_follow_point() {
        let p = params();
        let mut set = ActiveSet::new();
        set.insert(slider(1));
        let mut judge = Judge::new();
        judge.on_press(Vec2::new(100.0, 100.0), 0.0, &mut set, &p);
        // At 500ms the follow point is at x=200; the head is far behind.
        judge.accrue(true, Vec2::new(100.0, 100.0), 500.0, 20.0, &mut set, &p);
        judge.accrue(true, Vec2::new(200.0, 100.0), 520.0, 20.0, &mut set, &p);
        judge.accrue(false, Vec2::new(202.0, 100.0), 540.0, 20.0, &mut set, &p);
        match set.get(ElementId(1)).map(|e| e.kind) {
            Some(ActiveKind::Slider(_, progress)) => assert_eq!(progress.held_points, 1.0),
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn finish_applies_release_penalty() {
        let s = match slider(1).kind {
            ActiveKind::Slider(s, _) => s,
            ActiveKind::Circle(_) => unreachable!(),
        };
        let full = SliderProgress {
            held_points: 50.0,
            ..SliderProgress::default()
        };
        assert_eq!(finish_slider(&s, &full), Rank::Perfect);
        let released = SliderProgress {
            held_points: 50.0,
            released_early: true,
            ..SliderProgress::default()
        };
        // 40 / 50 = 80%
        assert_eq!(finish_slider(&s, &released), Rank::Good);
    }
}
