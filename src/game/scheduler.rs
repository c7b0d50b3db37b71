use crate::game::active::{ActiveEntry, ActiveKind, ActiveSet, SliderProgress};
use crate::game::difficulty::DifficultyParams;
use crate::game::element::{Break, Element, ElementId};
use crate::game::judge::{Judge, finish_slider};
use crate::game::judgment::{JudgeCause, Judgment, Rank};
use crate::game::timeline::Timeline;
use log::{debug, trace};
use smallvec::SmallVec;

pub type ExpiredIds = SmallVec<[ElementId; 8]>;

/// Decides which active entries have left the playfield. A renderer that
/// animates its own fade-outs can stand in for the default.
pub trait DisposalSource {
    fn collect_expired(
        &mut self,
        active: &ActiveSet,
        map_time_ms: f64,
        params: &DifficultyParams,
        out: &mut ExpiredIds,
    );
}

/// Circles leave once their Miss window has fully passed; sliders once they
/// reach their end time.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowExpiry;

impl DisposalSource for WindowExpiry {
    fn collect_expired(
        &mut self,
        active: &ActiveSet,
        map_time_ms: f64,
        params: &DifficultyParams,
        out: &mut ExpiredIds,
    ) {
        let cutoff = params.timing.miss_cutoff_ms();
        for entry in active.iter() {
            let gone = match &entry.kind {
                ActiveKind::Circle(c) => map_time_ms - c.time > cutoff,
                ActiveKind::Slider(s, _) => map_time_ms >= s.end_time,
            };
            if gone {
                out.push(entry.id);
            }
        }
    }
}

/// Moves elements from the timeline into the active set and back out again.
#[derive(Debug)]
pub struct Scheduler<D: DisposalSource = WindowExpiry> {
    next_id: u32,
    breaks: Vec<Break>,
    disposal: D,
    scratch: ExpiredIds,
}

impl Default for Scheduler<WindowExpiry> {
    fn default() -> Self {
        Self::new(WindowExpiry)
    }
}

impl<D: DisposalSource> Scheduler<D> {
    pub fn new(disposal: D) -> Self {
        Self {
            next_id: 0,
            breaks: Vec::new(),
            disposal,
            scratch: ExpiredIds::new(),
        }
    }

    pub fn reset(&mut self) {
        self.next_id = 0;
        self.breaks.clear();
        self.scratch.clear();
    }

    #[inline(always)]
    fn fresh_id(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Activates everything whose approach window has opened. Breaks leave
    /// the timeline straight away so they never hold back later elements.
    pub fn activate(
        &mut self,
        timeline: &mut Timeline,
        active: &mut ActiveSet,
        map_time_ms: f64,
        params: &DifficultyParams,
    ) -> usize {
        let mut activated = 0;
        while let Some(&next) = timeline.peek() {
            match next {
                Element::Break(b) => {
                    timeline.advance();
                    trace!(
                        "Break queued: {:.0}ms..{:.0}ms",
                        b.start_time, b.end_time
                    );
                    self.breaks.push(b);
                }
                Element::Circle(c) => {
                    if c.time - map_time_ms >= params.approach_duration_ms {
                        break;
                    }
                    timeline.advance();
                    let id = self.fresh_id();
                    active.insert(ActiveEntry {
                        id,
                        kind: ActiveKind::Circle(c),
                    });
                    trace!("Activated circle {id} (t={:.0}ms) at {map_time_ms:.0}ms", c.time);
                    activated += 1;
                }
                Element::Slider(s) => {
                    if s.start_time - map_time_ms >= params.approach_duration_ms {
                        break;
                    }
                    timeline.advance();
                    let id = self.fresh_id();
                    active.insert(ActiveEntry {
                        id,
                        kind: ActiveKind::Slider(s, SliderProgress::default()),
                    });
                    trace!(
                        "Activated slider {id} ({:.0}..{:.0}ms) at {map_time_ms:.0}ms",
                        s.start_time, s.end_time
                    );
                    activated += 1;
                }
            }
        }
        activated
    }

    /// Removes expired entries. Circles become unforced Misses, sliders are
    /// ranked on their held points.
    pub fn expire(
        &mut self,
        active: &mut ActiveSet,
        judge: &mut Judge,
        map_time_ms: f64,
        params: &DifficultyParams,
        out: &mut Vec<Judgment>,
    ) {
        self.scratch.clear();
        self.disposal
            .collect_expired(active, map_time_ms, params, &mut self.scratch);
        for &id in &self.scratch {
            let Some(entry) = active.remove(id) else {
                continue;
            };
            judge.forget(id);
            let judgment = match entry.kind {
                ActiveKind::Circle(c) => {
                    debug!(
                        "Circle {id} expired unhit ({:+.1}ms past target)",
                        map_time_ms - c.time
                    );
                    Judgment {
                        id,
                        rank: Rank::Miss,
                        cause: JudgeCause::Expired,
                        time_error_ms: None,
                    }
                }
                ActiveKind::Slider(s, progress) => {
                    let rank = finish_slider(&s, &progress);
                    debug!(
                        "Slider {id} ended: {rank:?} ({:.1} points, released early: {})",
                        progress.held_points, progress.released_early
                    );
                    Judgment {
                        id,
                        rank,
                        cause: JudgeCause::SliderEnd,
                        time_error_ms: None,
                    }
                }
            };
            out.push(judgment);
        }
    }

    /// True while `map_time_ms` sits inside a queued break. Breaks that have
    /// fully passed are dropped.
    pub fn in_break(&mut self, map_time_ms: f64) -> bool {
        self.breaks.retain(|b| map_time_ms < b.end_time);
        self.breaks.iter().any(|b| b.contains(map_time_ms))
    }

    pub fn is_finished(&self, timeline: &Timeline, active: &ActiveSet) -> bool {
        timeline.is_exhausted() && active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::difficulty::{DifficultyKnobs, derive};
    use crate::game::element::{Circle, Slider};
    use crate::game::mods::ModSet;
    use crate::game::timing_windows::TimingWindows;

    fn params_with_approach(approach: f64) -> DifficultyParams {
        let mut p = derive(DifficultyKnobs::default(), ModSet::empty());
        p.approach_duration_ms = approach;
        p
    }

    fn circle(time: f64) -> Element {
        Element::Circle(Circle {
            time,
            x: 0.0,
            y: 0.0,
        })
    }

    #[test]
    fn circles_activate_inside_the_approach_window() {
        let p = params_with_approach(500.0);
        let mut tl = Timeline::build(&[circle(1000.0)], 0.0, ModSet::empty(), 480.0);
        let mut active = ActiveSet::new();
        let mut sched = Scheduler::default();
        assert_eq!(sched.activate(&mut tl, &mut active, 500.0, &p), 0);
        assert_eq!(sched.activate(&mut tl, &mut active, 501.0, &p), 1);
        assert_eq!(active.iter().next().map(|e| e.id), Some(ElementId(0)));
        assert!(tl.is_exhausted());
    }

    #[test]
    fn ids_are_monotonic_and_restart_from_zero_after_reset() {
        let p = params_with_approach(500.0);
        let rows = [circle(100.0), circle(200.0), circle(300.0)];
        let mut tl = Timeline::build(&rows, 0.0, ModSet::empty(), 480.0);
        let mut active = ActiveSet::new();
        let mut sched = Scheduler::default();
        sched.activate(&mut tl, &mut active, 0.0, &p);
        let ids: Vec<u32> = active.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        sched.reset();
        tl.reset();
        active.clear();
        sched.activate(&mut tl, &mut active, 0.0, &p);
        assert_eq!(active.iter().next().map(|e| e.id), Some(ElementId(0)));
    }

    #[test]
    fn breaks_do_not_block_later_elements() {
        let p = params_with_approach(1000.0);
        let rows = [
            Element::Break(Break {
                start_time: 2000.0,
                end_time: 5000.0,
            }),
            circle(2500.0),
        ];
        let mut tl = Timeline::build(&rows, 0.0, ModSet::empty(), 480.0);
        let mut active = ActiveSet::new();
        let mut sched = Scheduler::default();
        assert_eq!(sched.activate(&mut tl, &mut active, 1600.0, &p), 1);
        assert!(!sched.in_break(1600.0));
        assert!(sched.in_break(2000.0));
        assert!(sched.in_break(4999.0));
        assert!(!sched.in_break(5000.0));
    }

    #[test]
    fn expired_circle_becomes_unforced_miss() {
        let mut p = params_with_approach(500.0);
        p.timing = TimingWindows::from_miss_cutoff(100.0);
        let mut tl = Timeline::build(&[circle(1000.0)], 0.0, ModSet::empty(), 480.0);
        let mut active = ActiveSet::new();
        let mut judge = Judge::new();
        let mut sched = Scheduler::default();
        sched.activate(&mut tl, &mut active, 600.0, &p);

        let mut out = Vec::new();
        sched.expire(&mut active, &mut judge, 1100.0, &p, &mut out);
        assert!(out.is_empty(), "still inside the Miss window");
        sched.expire(&mut active, &mut judge, 1100.5, &p, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rank, Rank::Miss);
        assert_eq!(out[0].cause, JudgeCause::Expired);
        assert!(active.is_empty());
        assert!(sched.is_finished(&tl, &active));
    }

    #[test]
    fn zero_duration_slider_ends_perfect() {
        let p = params_with_approach(500.0);
        let rows = [Element::Slider(Slider {
            start_time: 100.0,
            end_time: 100.0,
            length: 50.0,
            angle_radians: 0.0,
            x: 0.0,
            y: 0.0,
        })];
        let mut tl = Timeline::build(&rows, 0.0, ModSet::empty(), 480.0);
        let mut active = ActiveSet::new();
        let mut judge = Judge::new();
        let mut sched = Scheduler::default();
        sched.activate(&mut tl, &mut active, 0.0, &p);
        let mut out = Vec::new();
        sched.expire(&mut active, &mut judge, 100.0, &p, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rank, Rank::Perfect);
        assert_eq!(out[0].cause, JudgeCause::SliderEnd);
    }

    struct Everything;

    impl DisposalSource for Everything {
        fn collect_expired(
            &mut self,
            active: &ActiveSet,
            _map_time_ms: f64,
            _params: &DifficultyParams,
            out: &mut ExpiredIds,
        ) {
            out.extend(active.iter().map(|e| e.id));
        }
    }

    #[test]
    fn custom_disposal_source_decides_expiry() {
        let p = params_with_approach(5000.0);
        let mut tl = Timeline::build(&[circle(1000.0), circle(1200.0)], 0.0, ModSet::empty(), 480.0);
        let mut active = ActiveSet::new();
        let mut judge = Judge::new();
        let mut sched = Scheduler::new(Everything);
        sched.activate(&mut tl, &mut active, 0.0, &p);
        let mut out = Vec::new();
        sched.expire(&mut active, &mut judge, 0.0, &p, &mut out);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|j| j.rank == Rank::Miss));
    }
}
