use crate::game::element::{Break, Element};
use crate::game::mods::ModSet;
use log::debug;

/// Ordered, immutable element sequence for one play plus a read cursor.
#[derive(Clone, Debug)]
pub struct Timeline {
    elements: Vec<Element>,
    cursor: usize,
    initial_break_end_ms: f64,
}

impl Timeline {
    /// Builds the play order from parsed map rows.
    ///
    /// Rows are stably sorted by target time. A positive `initial_break_end_ms`
    /// becomes a leading break. Hard Rock mirrors positions over the playfield
    /// height (slider angles flip with them).
    pub fn build(
        rows: &[Element],
        initial_break_end_ms: f64,
        mods: ModSet,
        playfield_height: f32,
    ) -> Self {
        let mut elements: Vec<Element> = Vec::with_capacity(rows.len() + 1);
        let initial_break_end_ms = if initial_break_end_ms.is_finite() {
            initial_break_end_ms.max(0.0)
        } else {
            0.0
        };
        if initial_break_end_ms > 0.0 {
            elements.push(Element::Break(Break {
                start_time: 0.0,
                end_time: initial_break_end_ms,
            }));
        }

        let flip = mods.contains(ModSet::HARD_ROCK);
        elements.extend(rows.iter().map(|row| {
            if flip {
                mirror_vertically(*row, playfield_height)
            } else {
                *row
            }
        }));
        // `sort_by` is stable, so rows sharing a time keep file order.
        elements.sort_by(|a, b| a.time().total_cmp(&b.time()));

        debug!(
            "Timeline built: {} elements, initial break ends at {initial_break_end_ms:.0}ms, mods={mods}",
            elements.len()
        );
        Self {
            elements,
            cursor: 0,
            initial_break_end_ms,
        }
    }

    #[inline(always)]
    pub fn peek(&self) -> Option<&Element> {
        self.elements.get(self.cursor)
    }

    /// Consumes and returns the next element.
    #[inline(always)]
    pub fn advance(&mut self) -> Option<Element> {
        let next = self.elements.get(self.cursor).copied();
        if next.is_some() {
            self.cursor += 1;
        }
        next
    }

    #[inline(always)]
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.elements.len()
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[inline(always)]
    pub const fn initial_break_end_ms(&self) -> f64 {
        self.initial_break_end_ms
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Target time of the first circle or slider, if any.
    pub fn first_judgeable_time(&self) -> Option<f64> {
        self.elements
            .iter()
            .find(|e| e.is_judgeable())
            .map(Element::time)
    }

    /// Number of elements that produce a judgement.
    pub fn judgeable_count(&self) -> usize {
        self.elements.iter().filter(|e| e.is_judgeable()).count()
    }
}

fn mirror_vertically(element: Element, playfield_height: f32) -> Element {
    match element {
        Element::Circle(mut c) => {
            c.y = playfield_height - c.y;
            Element::Circle(c)
        }
        Element::Slider(mut s) => {
            s.y = playfield_height - s.y;
            s.angle_radians = -s.angle_radians;
            Element::Slider(s)
        }
        Element::Break(b) => Element::Break(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::element::{Circle, Slider};

    fn circle(time: f64, x: f32, y: f32) -> Element {
        Element::Circle(Circle { time, x, y })
    }

    #[test]
    fn rows_are_sorted_stably_by_time() {
        let rows = [
            circle(2000.0, 1.0, 0.0),
            circle(1000.0, 2.0, 0.0),
            circle(2000.0, 3.0, 0.0),
        ];
        let t = Timeline::build(&rows, 0.0, ModSet::empty(), 480.0);
        let xs: Vec<f32> = t
            .elements()
            .iter()
            .filter_map(|e| e.position().map(|p| p.x))
            .collect();
        assert_eq!(xs, vec![2.0, 1.0, 3.0]);
    }

    #[test]
    fn initial_break_is_prepended() {
        let t = Timeline::build(&[circle(3000.0, 0.0, 0.0)], 2500.0, ModSet::empty(), 480.0);
        assert_eq!(t.len(), 2);
        assert!(matches!(
            t.peek(),
            Some(Element::Break(b)) if b.end_time == 2500.0
        ));
        assert_eq!(t.first_judgeable_time(), Some(3000.0));
        assert_eq!(t.judgeable_count(), 1);
    }

    #[test]
    fn cursor_walks_then_resets() {
        let mut t = Timeline::build(
            &[circle(0.0, 0.0, 0.0), circle(10.0, 0.0, 0.0)],
            0.0,
            ModSet::empty(),
            480.0,
        );
        assert!(t.advance().is_some());
        assert!(t.advance().is_some());
        assert!(t.advance().is_none());
        assert!(t.is_exhausted());
        t.reset();
        assert!(!t.is_exhausted());
        assert_eq!(t.peek().map(Element::time), Some(0.0));
    }

    #[test]
    fn hard_rock_mirrors_positions_and_angles() {
        let rows = [
            circle(0.0, 100.0, 80.0),
            Element::Slider(Slider {
                start_time: 10.0,
                end_time: 500.0,
                length: 100.0,
                angle_radians: 0.5,
                x: 10.0,
                y: 400.0,
            }),
        ];
        let t = Timeline::build(&rows, 0.0, ModSet::HARD_ROCK, 480.0);
        match t.elements() {
            [Element::Circle(c), Element::Slider(s)] => {
                assert_eq!((c.x, c.y), (100.0, 400.0));
                assert_eq!((s.x, s.y), (10.0, 80.0));
                assert_eq!(s.angle_radians, -0.5);
            }
            other => panic!("unexpected layout: {other:?}"),
        }
    }
}
