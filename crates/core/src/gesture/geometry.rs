use serde::{Deserialize, Serialize};

use crate::{config::SurfaceConfig, protocol::SLICE_COUNT};

/// Angular width of one wedge, in degrees.
pub const WEDGE_DEGREES: f64 = 360.0 / SLICE_COUNT as f64;

/// Rotation that moves the surface's visual north onto wedge 0, plus half a
/// wedge so boundaries land on multiples of [`WEDGE_DEGREES`].
const ANGLE_SHIFT: f64 = 90.0 + WEDGE_DEGREES / 2.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// What a pointer position lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitRegion {
    /// Wedge index in `0..16`.
    Slice(u8),
    CenterHub,
    Outside,
}

/// Annular surface in pointer coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    pub center: Point,
    pub radius: f64,
    pub inner_ratio: f64,
    pub outer_ratio: f64,
}

impl SurfaceGeometry {
    pub fn new(center: Point, radius: f64) -> Self {
        let defaults = SurfaceConfig::default();
        Self {
            center,
            radius,
            inner_ratio: defaults.inner_radius_ratio,
            outer_ratio: defaults.outer_radius_ratio,
        }
    }

    pub fn from_config(config: &SurfaceConfig) -> Self {
        let half = config.size / 2.0;
        Self {
            center: Point::new(half, half),
            radius: half,
            inner_ratio: config.inner_radius_ratio,
            outer_ratio: config.outer_radius_ratio,
        }
    }

    pub fn hit_test(&self, pointer: Point) -> HitRegion {
        if !pointer.is_finite() || !self.center.is_finite() {
            return HitRegion::Outside;
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return HitRegion::Outside;
        }

        let dx = pointer.x - self.center.x;
        let dy = pointer.y - self.center.y;
        let normalized = dx.hypot(dy) / self.radius;

        if normalized < self.inner_ratio {
            return HitRegion::CenterHub;
        }
        if normalized > self.outer_ratio {
            return HitRegion::Outside;
        }

        slice_for_angle(pointer_angle(dx, dy))
    }

    /// Pointer position at `normalized_radius` along `visual_degrees`, where
    /// 0° is visual north and angles grow clockwise on screen.
    pub fn point_at(&self, visual_degrees: f64, normalized_radius: f64) -> Point {
        let radians = (visual_degrees - 90.0).to_radians();
        let distance = normalized_radius * self.radius;
        Point::new(
            self.center.x + distance * radians.cos(),
            self.center.y + distance * radians.sin(),
        )
    }

    /// Pointer position at the angular middle of wedge `index`.
    pub fn wedge_center(&self, index: u8, normalized_radius: f64) -> Point {
        self.point_at(f64::from(index) * WEDGE_DEGREES, normalized_radius)
    }
}

/// Angle of the center-relative vector in degrees, in `[0, 360)`.
fn pointer_angle(dx: f64, dy: f64) -> f64 {
    let degrees = dy.atan2(dx).to_degrees();
    if degrees < 0.0 {
        degrees + 360.0
    } else {
        degrees
    }
}

/// Wedge containing a pointer angle. Angles on a wedge edge belong to the
/// wedge that starts there.
fn slice_for_angle(pointer_degrees: f64) -> HitRegion {
    let shifted = (pointer_degrees + ANGLE_SHIFT) % 360.0;
    let index = (shifted / WEDGE_DEGREES).floor();
    if (0.0..SLICE_COUNT as f64).contains(&index) {
        HitRegion::Slice(index as u8)
    } else {
        HitRegion::Outside
    }
}

/// Free-standing hit test with the default 0.40 / 0.98 radii.
pub fn hit_test(pointer_x: f64, pointer_y: f64, center: Point, surface_radius: f64) -> HitRegion {
    SurfaceGeometry::new(center, surface_radius).hit_test(Point::new(pointer_x, pointer_y))
}
