use std::cell::Cell;
use std::f32::consts::{FRAC_PI_2, PI};

use nalgebra as na;
use na::{vector, Vector3};

use super::framebuffer::Framebuffer;
use super::mesh::Mesh;
use super::shader::RenderContext;
use crate::camera::PinholeCamera;
use crate::error::{Error, Result};
use crate::util::{Color, BLACK, EMPTY};

/// A point's projection into the three primary faces of a shadow cube map, each scaled by the
/// point's reciprocal depth in the viewing camera. Kept in this form because it is affine in
/// screen coordinates, so the rasterizer can advance it by constant steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCoords(pub [Vector3<f32>; 3]);

impl ShadowCoords {
    pub fn from_world(cube_map: &CubeMap, point: &Vector3<f32>, reciprocal_depth: f32) -> Self {
        return ShadowCoords(std::array::from_fn(|i| {
            let camera = &cube_map.cameras[i];
            reciprocal_depth * (camera.projection_matrix * (point - camera.center))
        }));
    }

    pub(super) fn advance(&mut self, step: &ShadowCoords) {
        for (coords, step) in self.0.iter_mut().zip(step.0.iter()) {
            *coords += step;
        }
    }
}

/// Tolerance of the face bounds, relative to the resolution.
const FACE_EDGE_SLACK: f32 = 1e-4;

/// Where a direction landed: face index and the position on that face.
struct FaceHit {
    face: usize,
    x: f32,
    y: f32,
    z: f32,
}

/// Six 90 degree cameras around one center, each with its own framebuffer.
///
/// Faces look along +x, +y, -z, -x, -y and +z. Face `i + 3` is oriented so that its pixel
/// (x, y) is what camera `i` projects to (y, x) behind itself, so only the first three cameras are
/// needed to find the face a direction falls on.
///
/// Lookups remember the last face hit to start the next search there. That cache lives in a
/// `Cell`, so a cube map can't be shared between threads.
#[derive(Debug, Clone)]
pub struct CubeMap {
    cameras: [PinholeCamera; 6],
    framebuffers: [Framebuffer; 6],
    previous_hit: Cell<usize>,
}

fn face_cameras(resolution: u32, position: Vector3<f32>) -> [PinholeCamera; 6] {
    let base = PinholeCamera::with_orientation(
        resolution,
        resolution,
        FRAC_PI_2,
        position,
        vector![1.0, 0.0, 0.0],
        vector![0.0, 1.0, 0.0],
    );
    let mut cameras: [PinholeCamera; 6] = std::array::from_fn(|_| base.clone());
    cameras[1].tilt(FRAC_PI_2);
    cameras[2].pan(FRAC_PI_2);
    cameras[3].tilt(PI);
    cameras[3].roll(1.5 * PI);
    cameras[4].tilt(1.5 * PI);
    cameras[4].roll(1.5 * PI);
    cameras[5].pan(1.5 * PI);
    cameras[5].roll(0.5 * PI);
    return cameras;
}

impl CubeMap {
    pub fn new(resolution: u32, position: Vector3<f32>) -> Self {
        let size = resolution as usize;
        return Self {
            cameras: face_cameras(resolution, position),
            framebuffers: std::array::from_fn(|_| Framebuffer::new(size, size)),
            previous_hit: Cell::new(0),
        };
    }

    /// Cube map around the origin made of already painted faces, e.g. a sky box.
    pub fn from_faces(faces: [Framebuffer; 6]) -> Result<Self> {
        let resolution = faces[0].width();
        if faces.iter().any(|face| face.width() != resolution || face.height() != resolution) {
            return Err(Error::FaceMismatch);
        }
        log::debug!("Cube map assembled from {}x{} faces.", resolution, resolution);
        return Ok(Self {
            cameras: face_cameras(resolution as u32, Vector3::zeros()),
            framebuffers: faces,
            previous_hit: Cell::new(0),
        });
    }

    pub fn position(&self) -> Vector3<f32> {
        return self.cameras[0].center;
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        for camera in self.cameras.iter_mut() {
            camera.center = position;
        }
    }

    pub fn resolution(&self) -> usize {
        return self.framebuffers[0].width();
    }

    /// Changes the face resolution. Face contents are lost.
    pub fn resize(&mut self, resolution: u32) {
        *self = CubeMap::new(resolution, self.position());
    }

    pub fn cameras(&self) -> &[PinholeCamera; 6] {
        return &self.cameras;
    }

    pub fn framebuffer(&self, face: usize) -> &Framebuffer {
        return &self.framebuffers[face];
    }

    pub fn framebuffer_mut(&mut self, face: usize) -> &mut Framebuffer {
        return &mut self.framebuffers[face];
    }

    pub fn fill(&mut self, color: Color) {
        for framebuffer in self.framebuffers.iter_mut() {
            framebuffer.fill(color);
        }
    }

    pub fn clear(&mut self) {
        self.fill(BLACK);
    }

    pub fn z_fill(&mut self, z: f32) {
        for framebuffer in self.framebuffers.iter_mut() {
            framebuffer.z_fill(z);
        }
    }

    pub fn z_clear(&mut self) {
        self.z_fill(0.0);
    }

    /// Depth-only pass of a mesh into all six faces.
    pub fn prerender(&mut self, mesh: &Mesh) {
        for (camera, framebuffer) in self.cameras.iter().zip(self.framebuffers.iter_mut()) {
            mesh.prerender(framebuffer, camera);
        }
    }

    /// Renders a mesh into all six faces, including its depth pre-pass.
    pub fn render(&mut self, mesh: &Mesh, context: &RenderContext) {
        for (camera, framebuffer) in self.cameras.iter().zip(self.framebuffers.iter_mut()) {
            mesh.render(framebuffer, camera, context);
        }
    }

    /// Sets every face pixel to `f` of the unit direction it looks along.
    pub fn paint<F: Fn(&Vector3<f32>) -> Color>(&mut self, f: F) {
        for (camera, framebuffer) in self.cameras.iter().zip(self.framebuffers.iter_mut()) {
            for y in 0..framebuffer.height() {
                for x in 0..framebuffer.width() {
                    let direction = camera.ray(x as f32, y as f32).normalize();
                    framebuffer.set_pixel(x, y, f(&direction));
                }
            }
        }
    }

    /// Draws what this cube map shows in every direction of `camera`'s view, e.g. a sky behind
    /// the scene.
    pub fn render_onto(&self, framebuffer: &mut Framebuffer, camera: &PinholeCamera) {
        let mut row_ray = camera.c;
        for y in 0..framebuffer.height() {
            let mut ray = row_ray;
            for x in 0..framebuffer.width() {
                framebuffer.set_pixel(x, y, self.lookup(&ray));
                ray += camera.a;
            }
            row_ray += camera.b;
        }
    }

    /// Copies this cube map's appearance onto the faces of another one, whatever its position.
    pub fn render_onto_cube(&self, other: &mut CubeMap) {
        for (camera, framebuffer) in other.cameras.iter().zip(other.framebuffers.iter_mut()) {
            self.render_onto(framebuffer, camera);
        }
    }

    /// Finds the face a projection lands on, starting from the last face hit. `project` gives
    /// screen x, screen y and reciprocal depth in camera `i`, for `i` in 0..3.
    fn resolve_face<F: Fn(usize) -> Vector3<f32>>(&self, project: F) -> Option<FaceHit> {
        let resolution = self.resolution() as f32;
        // Face edges are shared, both bounds are inclusive. The slack absorbs rounding in the
        // rotated face cameras, so directions along an edge or a corner still land somewhere.
        let slack = resolution * FACE_EDGE_SLACK;
        let hint = self.previous_hit.get();
        let candidates = std::iter::once(hint).chain((0..3).filter(|i| *i != hint));
        for i in candidates {
            let p = project(i);
            let inside = |v: f32| v >= -slack && v <= resolution + slack;
            if inside(p.x) && inside(p.y) {
                self.previous_hit.set(i);
                let (x, y) = (p.x.clamp(0.0, resolution), p.y.clamp(0.0, resolution));
                if p.z > 0.0 {
                    return Some(FaceHit { face: i, x, y, z: p.z });
                }
                return Some(FaceHit { face: i + 3, x: y, y: x, z: -p.z });
            }
        }
        return None;
    }

    /// Color seen along a direction from the center. `EMPTY` if no face contains it, which only
    /// happens for degenerate directions.
    pub fn lookup(&self, direction: &Vector3<f32>) -> Color {
        let point = self.position() + direction;
        return match self.resolve_face(|i| self.cameras[i].project(&point)) {
            Some(hit) => self.framebuffers[hit.face].bilinear_lookup(hit.x, hit.y),
            None => EMPTY,
        };
    }

    /// Soft shadow test of a point given by its shadow coordinates, 1.0 meaning fully lit.
    /// Points on no face count as shadowed.
    pub fn visibility(&self, coords: &ShadowCoords, reciprocal_depth: f32) -> f32 {
        let hit = self.resolve_face(|i| {
            let p = coords.0[i];
            vector![p.x, p.y, reciprocal_depth] / p.z
        });
        return match hit {
            Some(hit) => self.framebuffers[hit.face].bilinear_visibility(hit.x, hit.y, hit.z),
            None => 0.0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{SKY_BLUE, WHITE};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, StandardNormal};

    fn random_direction(rng: &mut StdRng) -> Vector3<f32> {
        let x: f32 = StandardNormal.sample(rng);
        let y: f32 = StandardNormal.sample(rng);
        let z: f32 = StandardNormal.sample(rng);
        return vector![x, y, z];
    }

    #[test]
    fn faces_look_along_the_axes() {
        let cube_map = CubeMap::new(16, vector![1.0, 2.0, 3.0]);
        let expected = [
            vector![1.0, 0.0, 0.0],
            vector![0.0, 1.0, 0.0],
            vector![0.0, 0.0, -1.0],
            vector![-1.0, 0.0, 0.0],
            vector![0.0, -1.0, 0.0],
            vector![0.0, 0.0, 1.0],
        ];
        for (camera, direction) in cube_map.cameras().iter().zip(expected.iter()) {
            assert!((camera.view_direction().normalize() - direction).norm() < 1e-5);
            assert!((camera.horizontal_fov() - FRAC_PI_2).abs() < 1e-5);
        }
    }

    #[test]
    fn every_direction_hits_a_face() {
        let mut cube_map = CubeMap::new(32, vector![0.5, -1.0, 2.0]);
        cube_map.fill(SKY_BLUE);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let color = cube_map.lookup(&random_direction(&mut rng));
            assert!((color - SKY_BLUE).norm() < 1e-5);
        }
    }

    /// Axis, edge and corner directions, the ones on face boundaries.
    fn boundary_directions() -> Vec<Vector3<f32>> {
        let mut directions = Vec::new();
        for x in -1..=1 {
            for y in -1..=1 {
                for z in -1..=1 {
                    if (x, y, z) != (0, 0, 0) {
                        directions.push(vector![x as f32, y as f32, z as f32]);
                    }
                }
            }
        }
        return directions;
    }

    #[test]
    fn face_boundaries_are_seamless() {
        let mut cube_map = CubeMap::new(128, vector![0.0, 10.0, 0.0]);
        cube_map.fill(SKY_BLUE);
        cube_map.z_clear();
        let directions = boundary_directions();
        assert_eq!(directions.len(), 26);
        for direction in directions.iter() {
            for scale in [1.0, 10.0] {
                let color = cube_map.lookup(&(direction * scale));
                assert!((color - SKY_BLUE).norm() < 1e-5, "lookup {:?}", direction * scale);

                let point = cube_map.position() + direction * scale;
                let coords = ShadowCoords::from_world(&cube_map, &point, 1.0);
                assert_eq!(cube_map.visibility(&coords, 1.0), 1.0, "visibility {:?}", direction * scale);
            }
        }
    }

    #[test]
    fn painted_directions_are_looked_up_again() {
        let mut cube_map = CubeMap::new(64, Vector3::zeros());
        let paint = |d: &Vector3<f32>| vector![(d.x + 1.0) / 2.0, (d.y + 1.0) / 2.0, (d.z + 1.0) / 2.0, 1.0];
        cube_map.paint(paint);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..2_000 {
            let direction = random_direction(&mut rng).normalize();
            let color = cube_map.lookup(&(direction * 3.0));
            assert!((color - paint(&direction)).norm() < 0.05, "{:?}", direction);
        }
    }

    #[test]
    fn moving_keeps_faces_valid() {
        let mut cube_map = CubeMap::new(8, Vector3::zeros());
        cube_map.fill(WHITE);
        cube_map.set_position(vector![10.0, -3.0, 4.0]);
        assert!((cube_map.lookup(&vector![0.2, 1.0, -0.4]) - WHITE).norm() < 1e-5);
        cube_map.resize(4);
        assert_eq!(cube_map.resolution(), 4);
        assert_eq!(cube_map.position(), vector![10.0, -3.0, 4.0]);
    }

    #[test]
    fn faces_must_match() {
        let mut faces: [Framebuffer; 6] = std::array::from_fn(|_| Framebuffer::new(4, 4));
        assert!(CubeMap::from_faces(faces.clone()).is_ok());
        faces[3] = Framebuffer::new(4, 5);
        assert!(matches!(CubeMap::from_faces(faces), Err(Error::FaceMismatch)));
    }

    #[test]
    fn sky_fills_a_flat_view() {
        let mut sky = CubeMap::new(8, Vector3::zeros());
        sky.fill(SKY_BLUE);
        let camera = PinholeCamera::new(24, 16, 1.4);
        let mut framebuffer = Framebuffer::new(24, 16);
        sky.render_onto(&mut framebuffer, &camera);
        assert!(framebuffer.as_colors().iter().all(|color| (color - SKY_BLUE).norm() < 1e-5));

        let mut probe = CubeMap::new(4, vector![3.0, 0.0, 0.0]);
        sky.render_onto_cube(&mut probe);
        assert!((probe.lookup(&vector![0.0, 0.0, 1.0]) - SKY_BLUE).norm() < 1e-5);
    }

    #[test]
    fn visibility_compares_against_stored_depth() {
        let mut shadow_map = CubeMap::new(16, vector![0.0, 5.0, 0.0]);
        let point = vector![1.0, 0.0, 0.5];
        let coords = ShadowCoords::from_world(&shadow_map, &point, 0.7);
        assert_eq!(shadow_map.visibility(&coords, 0.7), 1.0);

        // Reciprocal depths are in units of the focal length, 8 pixels here. The point is 5 below
        // the light, the occluder 1.
        shadow_map.z_fill(8.0);
        assert_eq!(shadow_map.visibility(&coords, 0.7), 0.0);
    }
}
