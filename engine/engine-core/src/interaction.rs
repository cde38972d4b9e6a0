//! Input and per-frame types handed to session interfaces.

use glam::Vec3;
use serde_json::Value;

/// A pointing ray in world space. `direction` need not be normalised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Ray from `origin` towards `target`.
    pub fn towards(origin: Vec3, target: Vec3) -> Self {
        Self::new(origin, target - origin)
    }

    /// Distance along the ray to the nearest hit of a sphere, if any.
    pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let dir = self.direction.try_normalize()?;
        let to_origin = self.origin - center;
        let b = to_origin.dot(dir);
        let c = to_origin.length_squared() - radius * radius;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let root = discriminant.sqrt();
        let near = -b - root;
        let far = -b + root;
        if near >= 0.0 {
            Some(near)
        } else if far >= 0.0 {
            // Origin inside the sphere
            Some(0.0)
        } else {
            None
        }
    }

    /// Point where the ray crosses the horizontal plane `y = height`.
    pub fn intersect_horizontal_plane(&self, height: f32) -> Option<Vec3> {
        if self.direction.y.abs() < f32::EPSILON {
            return None;
        }
        let t = (height - self.origin.y) / self.direction.y;
        (t >= 0.0).then(|| self.origin + self.direction * t)
    }
}

/// User input routed through a session interface.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    /// Primary select along a pointing ray
    Select { ray: Ray },
    /// Secondary grip
    Squeeze,
    /// Named UI command (buttons, keyboard)
    Command { name: String, data: Value },
}

/// One engine call produced by translating an interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineAction {
    pub action: String,
    pub data: Value,
}

impl EngineAction {
    pub fn new(action: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.into(),
            data,
        }
    }
}

/// Timing of one host render tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub frame: u64,
    /// Milliseconds since the host loop started
    pub time_ms: f64,
    /// Milliseconds since the previous frame
    pub delta_ms: f64,
}

/// Spherical "exit" button placed relative to the presentation root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitAffordance {
    pub offset: Vec3,
    pub radius: f32,
}

impl Default for ExitAffordance {
    fn default() -> Self {
        Self {
            offset: Vec3::new(0.0, 1.6, -0.5),
            radius: 0.12,
        }
    }
}

impl ExitAffordance {
    pub fn center(&self, root_origin: Vec3) -> Vec3 {
        root_origin + self.offset
    }

    pub fn is_hit(&self, root_origin: Vec3, ray: &Ray) -> bool {
        ray.intersect_sphere(self.center(root_origin), self.radius)
            .is_some()
    }
}
