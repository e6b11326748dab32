use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

/// Six view-volume half-spaces extracted from a view-projection matrix.
///
/// Plane order is left, right, bottom, top, near, far. Each plane is
/// `(A, B, C, D)` with a unit-length normal pointing into the volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
    offset: Vec3,
}

impl Default for Frustum {
    /// A frustum that accepts everything.
    fn default() -> Self {
        Self {
            planes: [Vec4::new(0.0, 0.0, 0.0, 1.0); 6],
            offset: Vec3::ZERO,
        }
    }
}

impl Frustum {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        let mut frustum = Self::default();
        frustum.calculate_frustum(view, projection);
        frustum
    }

    /// Re-derives the planes for a new camera. Keeps the current offset.
    pub fn calculate_frustum(&mut self, view: Mat4, projection: Mat4) {
        let vp = projection * view;
        let (r1, r2, r3, r4) = (vp.row(0), vp.row(1), vp.row(2), vp.row(3));

        self.planes = [r4 + r1, r4 - r1, r4 + r2, r4 - r2, r3, r4 - r3].map(normalize_plane);
    }

    /// Coordinates passed to the tests are translated by `-offset` first,
    /// so callers can test camera-relative volumes against world planes.
    pub fn set_offset(&mut self, offset: Vec3) {
        self.offset = offset;
    }

    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    pub fn is_point_in_frustum(&self, point: Vec3) -> bool {
        let p = point - self.offset;
        self.planes.iter().all(|plane| distance(*plane, p) >= 0.0)
    }

    /// Conservative: rejects only when all eight corners lie behind a single
    /// plane, so a visible box is never rejected.
    pub fn is_box_in_frustum(&self, min: Vec3, max: Vec3) -> bool {
        let min = min - self.offset;
        let max = max - self.offset;
        let corners = [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ];
        !self.planes.iter().any(|plane| {
            corners
                .iter()
                .all(|corner| distance(*plane, *corner) < 0.0)
        })
    }

    pub fn is_sphere_in_frustum(&self, center: Vec3, radius: f32) -> bool {
        let c = center - self.offset;
        self.planes
            .iter()
            .all(|plane| distance(*plane, c) >= -radius)
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let length = plane.xyz().length();
    if length > f32::EPSILON {
        plane / length
    } else {
        plane
    }
}

fn distance(plane: Vec4, point: Vec3) -> f32 {
    plane.xyz().dot(point) + plane.w
}
