use nalgebra as na;
use na::{vector, Matrix3, Vector2, Vector3};

use crate::util::rotated_about_axis;

/// Pinhole camera described by its optical center and three basis vectors.
///
/// A pixel (x, y) is seen along the ray `a * x + b * y + c` from `center`, so `a` steps one pixel
/// right, `b` one pixel up and `c` points from the center to pixel (0, 0) on the image plane.
/// Row 0 is therefore the bottom row of the image.
#[derive(Debug, Clone, PartialEq)]
pub struct PinholeCamera {
    pub center: Vector3<f32>,
    pub a: Vector3<f32>,
    pub b: Vector3<f32>,
    pub c: Vector3<f32>,
    /// Inverse of the matrix with columns a, b, c. Cached, refreshed by every orientation change.
    pub projection_matrix: Matrix3<f32>,
    pub width: u32,
    pub height: u32,
}

impl PinholeCamera {
    /// Camera at the origin looking down -z with y up.
    pub fn new(width: u32, height: u32, hfov: f32) -> Self {
        let a = vector![1.0, 0.0, 0.0];
        let b = vector![0.0, 1.0, 0.0];
        let c = vector![
            -(width as f32) / 2.0,
            -(height as f32) / 2.0,
            -(width as f32) / (2.0 * (hfov / 2.0).tan())
        ];
        return Self {
            center: Vector3::zeros(),
            a,
            b,
            c,
            projection_matrix: projection_matrix(&a, &b, &c),
            width,
            height,
        };
    }

    pub fn with_orientation(
        width: u32,
        height: u32,
        hfov: f32,
        center: Vector3<f32>,
        direction: Vector3<f32>,
        up: Vector3<f32>,
    ) -> Self {
        let mut camera = Self::new(width, height, hfov);
        camera.center = center;
        camera.orient(direction, up);
        return camera;
    }

    fn refresh_projection(&mut self) {
        self.projection_matrix = projection_matrix(&self.a, &self.b, &self.c);
    }

    pub fn view_direction(&self) -> Vector3<f32> {
        return self.b.cross(&self.a);
    }

    pub fn focal_length(&self) -> f32 {
        return self.c.dot(&self.view_direction());
    }

    pub fn horizontal_fov(&self) -> f32 {
        return 2.0 * (self.width as f32 / 2.0 / self.focal_length()).atan();
    }

    pub fn vertical_fov(&self) -> f32 {
        return 2.0 * (self.height as f32 / 2.0 / self.focal_length()).atan();
    }

    pub fn principal_point(&self) -> Vector2<f32> {
        return vector![-self.c.dot(&self.a), -self.c.dot(&self.b)];
    }

    pub fn translate_horizontally(&mut self, distance: f32) {
        self.center += self.a * distance;
    }

    pub fn translate_vertically(&mut self, distance: f32) {
        self.center += self.b * distance;
    }

    pub fn translate_depth(&mut self, distance: f32) {
        self.center += self.view_direction() * distance;
    }

    /// Rotation about the up vector.
    pub fn pan(&mut self, theta: f32) {
        self.a = rotated_about_axis(&self.a, &self.b, theta);
        self.c = rotated_about_axis(&self.c, &self.b, theta);
        self.refresh_projection();
    }

    /// Rotation about the right vector.
    pub fn tilt(&mut self, theta: f32) {
        self.b = rotated_about_axis(&self.b, &self.a, theta);
        self.c = rotated_about_axis(&self.c, &self.a, theta);
        self.refresh_projection();
    }

    /// Rotation about the view direction.
    pub fn roll(&mut self, theta: f32) {
        let view_direction = self.view_direction();
        self.a = rotated_about_axis(&self.a, &view_direction, theta);
        self.b = rotated_about_axis(&self.b, &view_direction, theta);
        self.c = rotated_about_axis(&self.c, &view_direction, theta);
        self.refresh_projection();
    }

    /// Scales the focal length, narrowing the field of view for multipliers above 1.
    pub fn zoom(&mut self, multiplier: f32) {
        self.c = self.view_direction() * self.focal_length() * multiplier
            - self.a * (self.width as f32 / 2.0)
            - self.b * (self.height as f32 / 2.0);
        self.refresh_projection();
    }

    /// Rebuilds the basis around a view direction, keeping the focal length and centering the
    /// principal point.
    pub fn orient(&mut self, direction: Vector3<f32>, up: Vector3<f32>) {
        let focal_length = self.focal_length();
        let direction = direction.normalize();
        self.a = direction.cross(&up.normalize());
        self.b = self.a.cross(&direction);
        self.c = direction * focal_length
            - self.a * (self.width as f32 / 2.0)
            - self.b * (self.height as f32 / 2.0);
        self.refresh_projection();
    }

    pub fn point(&mut self, direction: Vector3<f32>) {
        let up = self.b;
        self.orient(direction, up);
    }

    pub fn set_up(&mut self, up: Vector3<f32>) {
        self.orient(self.view_direction(), up);
    }

    pub fn look_at_and_up(&mut self, object: Vector3<f32>, up: Vector3<f32>) {
        self.orient(object - self.center, up);
    }

    pub fn look_at(&mut self, object: Vector3<f32>) {
        self.point(object - self.center);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        let up = self.b;
        self.orient(self.view_direction(), up);
    }

    /// World point to (screen x, screen y, reciprocal depth).
    pub fn project(&self, point: &Vector3<f32>) -> Vector3<f32> {
        let q = self.projection_matrix * (point - self.center);
        return vector![q.x / q.z, q.y / q.z, 1.0 / q.z];
    }

    /// Inverse of [`PinholeCamera::project`].
    pub fn unproject(&self, projection: &Vector3<f32>) -> Vector3<f32> {
        return self.center + (self.a * projection.x + self.b * projection.y + self.c) / projection.z;
    }

    /// Ray through a pixel, not normalized.
    pub fn ray(&self, x: f32, y: f32) -> Vector3<f32> {
        return self.a * x + self.b * y + self.c;
    }
}

fn projection_matrix(a: &Vector3<f32>, b: &Vector3<f32>, c: &Vector3<f32>) -> Matrix3<f32> {
    return Matrix3::from_columns(&[*a, *b, *c])
        .try_inverse()
        .unwrap_or_else(|| {
            log::warn!("Camera basis is singular, projection disabled.");
            Matrix3::zeros()
        });
}

/// Camera path of `steps` cameras, starting at `c1` and moving towards `c2`.
pub fn interpolate(c1: &PinholeCamera, c2: &PinholeCamera, steps: usize) -> Vec<PinholeCamera> {
    let mut cameras = Vec::with_capacity(steps);
    if steps == 0 {
        return cameras;
    }
    let span = steps.saturating_sub(1).max(1) as f32;
    let mut camera = c1.clone();
    for step in 0..steps {
        cameras.push(camera);
        let t = (step + 1) as f32 / span;
        // Restarting from c1 every step, accumulating rotations drifts.
        camera = c1.clone();
        camera.orient(
            c1.view_direction() + (c2.view_direction() - c1.view_direction()) * t,
            c1.b + (c2.b - c1.b) * t,
        );
        camera.center = c1.center + (c2.center - c1.center) * t;
    }
    return cameras;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn project_unproject_round_trip() {
        let camera = PinholeCamera::with_orientation(
            64,
            48,
            FRAC_PI_2,
            vector![1.0, 2.0, 3.0],
            vector![0.3, -0.2, 1.0],
            vector![0.0, 1.0, 0.0],
        );
        let point = vector![4.0, 1.0, 20.0];
        let projection = camera.project(&point);
        assert!(projection.z > 0.0);
        assert!((camera.unproject(&projection) - point).norm() < 1e-3);
    }

    #[test]
    fn principal_point_is_centered() {
        let camera = PinholeCamera::with_orientation(
            64,
            48,
            1.2,
            Vector3::zeros(),
            vector![1.0, 0.0, 0.0],
            vector![0.0, 1.0, 0.0],
        );
        let principal_point = camera.principal_point();
        assert!((principal_point - vector![32.0, 24.0]).norm() < 1e-4);
        assert!((camera.horizontal_fov() - 1.2).abs() < 1e-4);
    }

    #[test]
    fn point_along_view_direction_lands_on_principal_point() {
        let mut camera = PinholeCamera::new(32, 32, FRAC_PI_2);
        camera.pan(0.4);
        camera.tilt(-0.3);
        let projection = camera.project(&(camera.view_direction() * 10.0));
        assert!((projection.x - 16.0).abs() < 1e-3);
        assert!((projection.y - 16.0).abs() < 1e-3);
    }

    #[test]
    fn interpolation_ends_at_target() {
        let c1 = PinholeCamera::new(32, 32, FRAC_PI_2);
        let mut c2 = c1.clone();
        c2.center = vector![10.0, 0.0, 0.0];
        let cameras = interpolate(&c1, &c2, 5);
        assert_eq!(cameras.len(), 5);
        assert_eq!(cameras[0].center, c1.center);
        assert!((cameras[4].center - c2.center).norm() < 1e-4);
        assert!((cameras[2].center - vector![5.0, 0.0, 0.0]).norm() < 1e-4);
    }
}
