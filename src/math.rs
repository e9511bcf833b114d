use glam::{Mat4, Vec3, Vec4};

/// Sphere bounds used for frustum gating and entity extents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Centroid-based sphere enclosing every point.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let points: Vec<Vec3> = points.into_iter().collect();
        if points.is_empty() {
            return Self::new(Vec3::ZERO, 0.0);
        }

        let center = points.iter().copied().sum::<Vec3>() / points.len() as f32;
        let radius = points
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0f32, f32::max);
        Self { center, radius }
    }

    /// Moves the sphere into the space of `matrix`, growing the radius by the
    /// largest axis scale.
    pub fn transform(&self, matrix: &Mat4) -> Self {
        let center = matrix.transform_point3(self.center);
        let scale = matrix
            .x_axis
            .truncate()
            .length()
            .max(matrix.y_axis.truncate().length())
            .max(matrix.z_axis.truncate().length());
        Self {
            center,
            radius: self.radius * scale,
        }
    }

    /// Smallest sphere containing both inputs.
    pub fn merged(original: &Self, additional: &Self) -> Self {
        let mut offset = additional.center - original.center;
        let distance = offset.length();

        if distance <= original.radius + additional.radius {
            if distance <= original.radius - additional.radius {
                return *original;
            }
            if distance <= additional.radius - original.radius {
                return *additional;
            }
        }

        let left_radius = (original.radius - distance).max(additional.radius);
        let right_radius = (original.radius + distance).max(additional.radius);
        offset += ((left_radius - right_radius) / (2.0 * distance)) * offset;

        Self {
            center: original.center + offset,
            radius: (left_radius + right_radius) * 0.5,
        }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.distance_squared(self.center) <= self.radius * self.radius
    }
}

/// Six inward-facing planes of a view-projection volume (0..1 depth range).
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let r0 = view_projection.row(0);
        let r1 = view_projection.row(1);
        let r2 = view_projection.row(2);
        let r3 = view_projection.row(3);

        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(|plane| {
            let length = plane.truncate().length();
            if length > f32::EPSILON {
                plane / length
            } else {
                plane
            }
        });

        Self { planes }
    }

    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(sphere.center) + plane.w >= -sphere.radius)
    }
}
