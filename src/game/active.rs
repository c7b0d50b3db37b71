use crate::game::element::{Circle, ElementId, Slider};
use crate::game::judgment::{SLIDER_POINT_INTERVAL_MS, slider_max_points};
use glam::Vec2;

/// Per-slider accrual state. Lives beside the element, never on it.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SliderProgress {
    pub held_points: f64,
    /// Set when the drag was let go before the slider ended.
    pub released_early: bool,
    /// Last follow distance along the path, for renderers.
    pub follow_distance: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ActiveKind {
    Circle(Circle),
    Slider(Slider, SliderProgress),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ActiveEntry {
    pub id: ElementId,
    pub kind: ActiveKind,
}

impl ActiveEntry {
    #[inline(always)]
    pub const fn target_time(&self) -> f64 {
        match &self.kind {
            ActiveKind::Circle(c) => c.time,
            ActiveKind::Slider(s, _) => s.start_time,
        }
    }

    /// Where a press has to land at `map_time_ms`: the centre for circles,
    /// the follow point for sliders.
    #[inline(always)]
    pub fn hit_point_at(&self, map_time_ms: f64) -> Vec2 {
        match &self.kind {
            ActiveKind::Circle(c) => Vec2::new(c.x, c.y),
            ActiveKind::Slider(s, _) => s.follow_point_at(map_time_ms),
        }
    }

    #[inline(always)]
    pub const fn is_slider(&self) -> bool {
        matches!(self.kind, ActiveKind::Slider(..))
    }
}

impl SliderProgress {
    /// Adds the points earned over one tick, capped at the slider's maximum.
    pub fn accrue(&mut self, slider: &Slider, tick_ms: f64) {
        let max = slider_max_points(slider.duration_ms());
        let gained = (tick_ms / SLIDER_POINT_INTERVAL_MS).max(0.0);
        self.held_points = (self.held_points + gained).min(max);
    }
}

/// Elements currently on the playfield, in activation order.
#[derive(Clone, Debug, Default)]
pub struct ActiveSet {
    entries: Vec<ActiveEntry>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn insert(&mut self, entry: ActiveEntry) {
        self.entries.push(entry);
    }

    /// Removes an entry. Order of the remaining entries is preserved.
    pub fn remove(&mut self, id: ElementId) -> Option<ActiveEntry> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(idx))
    }

    #[inline(always)]
    pub fn get(&self, id: ElementId) -> Option<&ActiveEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    #[inline(always)]
    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut ActiveEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    #[inline(always)]
    pub fn contains(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ActiveEntry> {
        self.entries.iter_mut()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
