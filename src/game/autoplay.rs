use crate::core::input::{HitButton, InputEvent};
use crate::game::element::Element;
use crate::game::timeline::Timeline;

// How long a tapped key stays down before it is let go.
const TAP_HOLD_MS: f64 = 40.0;

/// A precomputed stream of perfect inputs for a timeline, in map time.
#[derive(Clone, Debug, Default)]
pub struct AutoplayScript {
    events: Vec<(f64, InputEvent)>,
    cursor: usize,
}

impl AutoplayScript {
    /// Taps every circle at its target time and drags every slider along
    /// its path, sampling the follow point every `step_ms`.
    pub fn from_timeline(timeline: &Timeline, step_ms: f64) -> Self {
        let step_ms = if step_ms.is_finite() && step_ms > 0.0 {
            step_ms
        } else {
            20.0
        };
        let targets: Vec<&Element> = timeline
            .elements()
            .iter()
            .filter(|e| e.is_judgeable())
            .collect();

        let mut events = Vec::with_capacity(targets.len() * 3);
        let mut button = HitButton::Key1;
        for (i, element) in targets.iter().enumerate() {
            let next_time = targets.get(i + 1).map(|e| e.time());
            match element {
                Element::Circle(c) => {
                    events.push((c.time, InputEvent::PointerMoved { x: c.x, y: c.y }));
                    events.push((c.time, InputEvent::Button { button, pressed: true }));
                    let mut up = c.time + TAP_HOLD_MS;
                    if let Some(next) = next_time {
                        up = up.min(c.time + (next - c.time) * 0.5);
                    }
                    events.push((up, InputEvent::Button { button, pressed: false }));
                }
                Element::Slider(s) => {
                    let head = s.head();
                    events.push((s.start_time, InputEvent::PointerMoved { x: head.x, y: head.y }));
                    events.push((s.start_time, InputEvent::Button { button, pressed: true }));
                    let mut t = s.start_time + step_ms;
                    while t < s.end_time {
                        let p = s.follow_point_at(t);
                        events.push((t, InputEvent::PointerMoved { x: p.x, y: p.y }));
                        t += step_ms;
                    }
                    events.push((s.end_time, InputEvent::Button { button, pressed: false }));
                }
                Element::Break(_) => {}
            }
            button = match button {
                HitButton::Key1 => HitButton::Key2,
                _ => HitButton::Key1,
            };
        }
        // Stable, so same-time events keep move-then-press order.
        events.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { events, cursor: 0 }
    }

    /// Appends every event due at or before `map_time_ms`.
    pub fn drain_due(&mut self, map_time_ms: f64, out: &mut Vec<InputEvent>) {
        while let Some(&(t, ev)) = self.events.get(self.cursor) {
            if t > map_time_ms {
                break;
            }
            out.push(ev);
            self.cursor += 1;
        }
    }

    pub fn next_due_ms(&self) -> Option<f64> {
        self.events.get(self.cursor).map(|(t, _)| *t)
    }

    #[inline(always)]
    pub fn is_done(&self) -> bool {
        self.cursor >= self.events.len()
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
