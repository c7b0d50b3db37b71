use glam::Vec2;

/// Identifier handed out when an element enters the active set.
/// Monotonic and unique for the lifetime of one play (restart starts over).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct ElementId(pub u32);

impl core::fmt::Display for ElementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Circle {
    pub time: f64,
    pub x: f32,
    pub y: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Slider {
    pub start_time: f64,
    pub end_time: f64,
    pub length: f32,
    pub angle_radians: f32,
    pub x: f32,
    pub y: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Break {
    pub start_time: f64,
    pub end_time: f64,
}

/// One row of a map. Breaks carry no position; ask `position()` and match on
/// the result instead of assuming every element has one.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Element {
    Circle(Circle),
    Slider(Slider),
    Break(Break),
}

impl Element {
    /// The time the element should be acted on (start time for sliders/breaks).
    #[inline(always)]
    pub const fn time(&self) -> f64 {
        match self {
            Self::Circle(c) => c.time,
            Self::Slider(s) => s.start_time,
            Self::Break(b) => b.start_time,
        }
    }

    #[inline(always)]
    pub const fn position(&self) -> Option<Vec2> {
        match self {
            Self::Circle(c) => Some(Vec2::new(c.x, c.y)),
            Self::Slider(s) => Some(Vec2::new(s.x, s.y)),
            Self::Break(_) => None,
        }
    }

    #[inline(always)]
    pub const fn is_judgeable(&self) -> bool {
        !matches!(self, Self::Break(_))
    }
}

impl Slider {
    #[inline(always)]
    pub fn duration_ms(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    #[inline(always)]
    pub fn head(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    #[inline(always)]
    pub fn tail(&self) -> Vec2 {
        self.point_at_distance(self.length)
    }

    #[inline(always)]
    pub fn point_at_distance(&self, distance: f32) -> Vec2 {
        self.head() + Vec2::from_angle(self.angle_radians) * distance
    }

    /// Fraction of the slider travelled at `map_time_ms`, clamped to 0..=1.
    /// Zero-length sliders report 1.0 once their start has passed.
    pub fn progress_at(&self, map_time_ms: f64) -> f32 {
        let duration = self.duration_ms();
        if duration <= 0.0 {
            return if map_time_ms >= self.start_time { 1.0 } else { 0.0 };
        }
        ((map_time_ms - self.start_time) / duration).clamp(0.0, 1.0) as f32
    }

    /// Distance of the follow point from the head at `map_time_ms`.
    #[inline(always)]
    pub fn follow_distance_at(&self, map_time_ms: f64) -> f32 {
        self.length.max(0.0) * self.progress_at(map_time_ms)
    }

    #[inline(always)]
    pub fn follow_point_at(&self, map_time_ms: f64) -> Vec2 {
        self.point_at_distance(self.follow_distance_at(map_time_ms))
    }
}

impl Break {
    #[inline(always)]
    pub fn contains(&self, map_time_ms: f64) -> bool {
        map_time_ms >= self.start_time && map_time_ms < self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slider() -> Slider {
        Slider {
            start_time: 0.0,
            end_time: 1000.0,
            length: 200.0,
            angle_radians: 0.0,
            x: 100.0,
            y: 100.0,
        }
    }

    #[test]
    fn follow_point_moves_linearly_along_the_path() {
        let s = slider();
        assert_eq!(s.follow_point_at(-50.0), Vec2::new(100.0, 100.0));
        let mid = s.follow_point_at(500.0);
        assert!((mid.x - 200.0).abs() < 1e-3, "halfway should be 100px along; got {mid:?}");
        assert!((mid.y - 100.0).abs() < 1e-3);
        let end = s.follow_point_at(5000.0);
        assert!((end.x - 300.0).abs() < 1e-3, "follow point must stop at the tail; got {end:?}");
    }

    #[test]
    fn angled_slider_points_down_at_ninety_degrees() {
        let s = Slider {
            angle_radians: std::f32::consts::FRAC_PI_2,
            ..slider()
        };
        let tail = s.tail();
        assert!((tail.x - 100.0).abs() < 1e-3);
        assert!((tail.y - 300.0).abs() < 1e-3);
    }

    #[test]
    fn zero_duration_slider_does_not_divide_by_zero() {
        let s = Slider {
            end_time: 0.0,
            ..slider()
        };
        assert_eq!(s.progress_at(-1.0), 0.0);
        assert_eq!(s.progress_at(0.0), 1.0);
        assert!(s.follow_point_at(0.0).is_finite());
    }

    #[test]
    fn breaks_have_no_position() {
        let b = Element::Break(Break {
            start_time: 2000.0,
            end_time: 5000.0,
        });
        assert!(b.position().is_none());
        assert!(!b.is_judgeable());
        assert_eq!(b.time(), 2000.0);
    }
}
