//! Triangle scan conversion into a [`Framebuffer`].
//!
//! Screen coordinates are snapped to 1/16 pixel and coverage is decided by integer edge functions,
//! so neighbouring triangles sharing an edge leave no seam between them. Depth and attributes are
//! affine planes in screen space advanced by constant steps per pixel and per scanline.

use nalgebra as na;
use na::{vector, Matrix3, Matrix3x2, SMatrix, SVector, Vector2, Vector3};

use super::cube_map::ShadowCoords;
use super::framebuffer::Framebuffer;
use super::light::PointLight;
use super::shader::{shade, Fragment, Material, RenderContext};
use crate::camera::PinholeCamera;
use crate::util::Color;

const SUBPIXEL_BITS: u32 = 4;
const SUBPIXEL_SCALE: f32 = (1 << SUBPIXEL_BITS) as f32;
const SUBPIXEL_ROUNDING: i64 = (1 << SUBPIXEL_BITS) - 1;
/// Triangles projecting farther off screen than this are dropped, keeping the fixed point edge
/// functions far from overflow.
const MAX_SCREEN_COORDINATE: f32 = (1 << 22) as f32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColoredVertex {
    pub position: Vector3<f32>,
    pub color: Color,
    pub normal: Vector3<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexturedVertex {
    pub position: Vector3<f32>,
    pub uv: Vector2<f32>,
    pub normal: Vector3<f32>,
}

/// Everything about a triangle's screen footprint that the fills share.
struct TriangleSetup {
    min_x: i64,
    min_y: i64,
    max_x: i64,
    max_y: i64,
    /// Edge functions of the edges opposite to each vertex at (min_x, min_y).
    edges: [i64; 3],
    edge_step_x: [i64; 3],
    edge_step_y: [i64; 3],
    /// Inverse of the matrix with rows (x, y, 1) of the projected vertices. Multiplying it with
    /// per-vertex values gives the plane (d/dx, d/dy, value at the origin) through them.
    plane_solver: Matrix3<f32>,
    depth_plane: Vector3<f32>,
}

impl TriangleSetup {
    /// None for triangles that cover nothing: back facing, behind the camera, off screen or
    /// degenerate.
    fn new(camera: &PinholeCamera, width: usize, height: usize, positions: &[Vector3<f32>; 3]) -> Option<Self> {
        let [t1, t2, t3] = positions;
        if (t1 - camera.center).dot(&(t2 - t1).cross(&(t3 - t1))) >= 0.0 {
            return None;
        }

        let projected = [camera.project(t1), camera.project(t2), camera.project(t3)];
        // No clipping, a single vertex behind the camera drops the whole triangle.
        let visible = projected.iter().all(|p| {
            p.z > 0.0 && p.x.abs() < MAX_SCREEN_COORDINATE && p.y.abs() < MAX_SCREEN_COORDINATE
        });
        if !visible || width == 0 || height == 0 {
            return None;
        }

        let fixed = projected.map(|p| ((p.x * SUBPIXEL_SCALE).round() as i64, (p.y * SUBPIXEL_SCALE).round() as i64));
        let [(x1, y1), (x2, y2), (x3, y3)] = fixed;

        let min_x = ((x1.min(x2).min(x3) + SUBPIXEL_ROUNDING) >> SUBPIXEL_BITS).max(0);
        let min_y = ((y1.min(y2).min(y3) + SUBPIXEL_ROUNDING) >> SUBPIXEL_BITS).max(0);
        let max_x = ((x1.max(x2).max(x3) + SUBPIXEL_ROUNDING) >> SUBPIXEL_BITS).min(width as i64 - 1);
        let max_y = ((y1.max(y2).max(y3) + SUBPIXEL_ROUNDING) >> SUBPIXEL_BITS).min(height as i64 - 1);
        if min_x > max_x || min_y > max_y {
            return None;
        }

        let [p1, p2, p3] = projected;
        let plane_solver = Matrix3::new(
            p1.x, p1.y, 1.0,
            p2.x, p2.y, 1.0,
            p3.x, p3.y, 1.0,
        ).try_inverse()?;
        let depth_plane = plane_solver * vector![p1.z, p2.z, p3.z];

        let origin_x = min_x << SUBPIXEL_BITS;
        let origin_y = min_y << SUBPIXEL_BITS;
        // A pixel exactly on an edge goes to the triangle it is a left or top edge of, so shared
        // edges are drawn once. Edge values are integers, the bias only moves exact zeros.
        let edge = |(ax, ay): (i64, i64), (bx, by): (i64, i64)| {
            let value = (bx - ax) * (origin_y - ay) - (by - ay) * (origin_x - ax);
            if by < ay || (by == ay && bx < ax) {
                return value;
            }
            return value - 1;
        };

        return Some(Self {
            min_x,
            min_y,
            max_x,
            max_y,
            edges: [edge((x2, y2), (x3, y3)), edge((x3, y3), (x1, y1)), edge((x1, y1), (x2, y2))],
            edge_step_x: [(y2 - y3) << SUBPIXEL_BITS, (y3 - y1) << SUBPIXEL_BITS, (y1 - y2) << SUBPIXEL_BITS],
            edge_step_y: [(x3 - x2) << SUBPIXEL_BITS, (x1 - x3) << SUBPIXEL_BITS, (x2 - x1) << SUBPIXEL_BITS],
            plane_solver,
            depth_plane,
        });
    }

    /// Homogeneous screen position of the first pixel of the scan box.
    fn origin(&self) -> Vector3<f32> {
        return vector![self.min_x as f32, self.min_y as f32, 1.0];
    }

    fn depth_at_origin(&self) -> f32 {
        return self.depth_plane.dot(&self.origin());
    }
}

fn covers(edges: &[i64; 3]) -> bool {
    return (edges[0] | edges[1] | edges[2]) >= 0;
}

fn advance(edges: &mut [i64; 3], step: &[i64; 3]) {
    for (edge, step) in edges.iter_mut().zip(step.iter()) {
        *edge += step;
    }
}

/// Maps an unbounded texture coordinate into [0, 1], mirroring every other repetition so the
/// texture tiles without seams.
pub fn mirrored_wrap(t: f32) -> f32 {
    let whole = t.floor();
    if (whole as i64) % 2 != 0 {
        return 1.0 + whole - t;
    }
    return t - whole;
}

/// Something interpolated across a triangle in lockstep with the edge functions.
trait Varying {
    fn start_row(&mut self);
    fn advance_x(&mut self);
    fn advance_y(&mut self);
}

/// N affine functions of screen position.
struct AttributePlanes<const N: usize> {
    row: SVector<f32, N>,
    current: SVector<f32, N>,
    step_x: SVector<f32, N>,
    step_y: SVector<f32, N>,
}

impl<const N: usize> AttributePlanes<N> {
    /// Rows of `planes` are the x step, the y step and the constant term.
    fn from_planes(planes: &SMatrix<f32, 3, N>, origin: &Vector3<f32>) -> Self {
        let row = planes.tr_mul(origin);
        return Self {
            row,
            current: row,
            step_x: planes.row(0).transpose(),
            step_y: planes.row(1).transpose(),
        };
    }

    /// Planes through the per-vertex values, one row per vertex.
    fn fit(setup: &TriangleSetup, values: &SMatrix<f32, 3, N>) -> Self {
        return Self::from_planes(&(setup.plane_solver * values), &setup.origin());
    }
}

impl<const N: usize> Varying for AttributePlanes<N> {
    fn start_row(&mut self) {
        self.current = self.row;
    }

    fn advance_x(&mut self) {
        self.current += self.step_x;
    }

    fn advance_y(&mut self) {
        self.row += self.step_y;
    }
}

/// Shadow coordinates of the current pixel for every point light, so a fragment's shadow lookup
/// costs no matrix product. Lives for one triangle.
struct ShadowProjector {
    row: Vec<ShadowCoords>,
    current: Vec<ShadowCoords>,
    step_x: Vec<ShadowCoords>,
    step_y: Vec<ShadowCoords>,
}

impl ShadowProjector {
    /// The shadow coordinates of the unprojected pixel (x, y, w) are
    /// `w * P * (center - C) + P * (a * x + b * y + c)` for a face camera with projection `P` and
    /// center `C`, affine in screen space once `w` is.
    fn new(camera: &PinholeCamera, point_lights: &[PointLight], depth_plane: &Vector3<f32>, origin: &Vector3<f32>) -> Self {
        let basis = Matrix3::from_columns(&[camera.a, camera.b, camera.c]);
        let origin_depth = depth_plane.dot(origin);
        let mut row = Vec::with_capacity(point_lights.len());
        let mut step_x = Vec::with_capacity(point_lights.len());
        let mut step_y = Vec::with_capacity(point_lights.len());
        for light in point_lights {
            let mut start = ShadowCoords([Vector3::zeros(); 3]);
            let mut dx = start;
            let mut dy = start;
            for (i, face) in light.shadow_map().cameras()[..3].iter().enumerate() {
                let offset = face.projection_matrix * (camera.center - face.center);
                let screen_to_face = face.projection_matrix * basis;
                start.0[i] = offset * origin_depth + screen_to_face * origin;
                dx.0[i] = screen_to_face.column(0) + offset * depth_plane.x;
                dy.0[i] = screen_to_face.column(1) + offset * depth_plane.y;
            }
            row.push(start);
            step_x.push(dx);
            step_y.push(dy);
        }
        return Self {
            current: row.clone(),
            row,
            step_x,
            step_y,
        };
    }

    fn coords(&self) -> &[ShadowCoords] {
        return &self.current;
    }
}

impl Varying for ShadowProjector {
    fn start_row(&mut self) {
        self.current.copy_from_slice(&self.row);
    }

    fn advance_x(&mut self) {
        for (coords, step) in self.current.iter_mut().zip(self.step_x.iter()) {
            coords.advance(step);
        }
    }

    fn advance_y(&mut self) {
        for (coords, step) in self.row.iter_mut().zip(self.step_y.iter()) {
            coords.advance(step);
        }
    }
}

impl<A: Varying, B: Varying> Varying for (A, B) {
    fn start_row(&mut self) {
        self.0.start_row();
        self.1.start_row();
    }

    fn advance_x(&mut self) {
        self.0.advance_x();
        self.1.advance_x();
    }

    fn advance_y(&mut self) {
        self.0.advance_y();
        self.1.advance_y();
    }
}

impl<A: Varying, B: Varying, C: Varying> Varying for (A, B, C) {
    fn start_row(&mut self) {
        self.0.start_row();
        self.1.start_row();
        self.2.start_row();
    }

    fn advance_x(&mut self) {
        self.0.advance_x();
        self.1.advance_x();
        self.2.advance_x();
    }

    fn advance_y(&mut self) {
        self.0.advance_y();
        self.1.advance_y();
        self.2.advance_y();
    }
}

impl Framebuffer {
    /// Opaque pre-pass: keeps the largest reciprocal depth of every covered pixel, touching no
    /// color.
    pub fn prerender_triangle(&mut self, camera: &PinholeCamera, positions: &[Vector3<f32>; 3]) {
        let Some(setup) = TriangleSetup::new(camera, self.width, self.height, positions) else {
            return;
        };

        let mut row_edges = setup.edges;
        let mut row_depth = setup.depth_at_origin();
        for y in setup.min_y..=setup.max_y {
            let mut edges = row_edges;
            let mut depth = row_depth;
            let row = y as usize * self.width;
            for x in setup.min_x..=setup.max_x {
                if covers(&edges) {
                    let stored = &mut self.depth[row + x as usize];
                    *stored = stored.max(depth);
                }
                advance(&mut edges, &setup.edge_step_x);
                depth += setup.depth_plane.x;
            }
            advance(&mut row_edges, &setup.edge_step_y);
            row_depth += setup.depth_plane.y;
        }
    }

    /// Composites `shade_pixel` over every covered pixel at least as near as the stored depth.
    /// Depth is accumulated exactly like in [`Framebuffer::prerender_triangle`], so a triangle
    /// always passes the gate against its own pre-pass.
    fn shade_triangle<V: Varying, F: FnMut(&V, i64, i64, f32) -> Color>(
        &mut self,
        setup: &TriangleSetup,
        varying: &mut V,
        mut shade_pixel: F,
    ) {
        let mut row_edges = setup.edges;
        let mut row_depth = setup.depth_at_origin();
        for y in setup.min_y..=setup.max_y {
            let mut edges = row_edges;
            let mut depth = row_depth;
            varying.start_row();
            let row = y as usize * self.width;
            for x in setup.min_x..=setup.max_x {
                let index = row + x as usize;
                if covers(&edges) && depth >= self.depth[index] {
                    let color = shade_pixel(varying, x, y, depth);
                    self.color[index] = color + (1.0 - color.w) * self.color[index];
                }
                advance(&mut edges, &setup.edge_step_x);
                depth += setup.depth_plane.x;
                varying.advance_x();
            }
            advance(&mut row_edges, &setup.edge_step_y);
            row_depth += setup.depth_plane.y;
            varying.advance_y();
        }
    }

    /// Fills a triangle with per-vertex colors and normals. Depth is left untouched.
    pub fn render_triangle(
        &mut self,
        camera: &PinholeCamera,
        vertices: &[ColoredVertex; 3],
        context: &RenderContext,
        material: &Material,
    ) {
        let positions = vertices.map(|vertex| vertex.position);
        let Some(setup) = TriangleSetup::new(camera, self.width, self.height, &positions) else {
            return;
        };

        // Color channels then normal components.
        let values = SMatrix::<f32, 3, 7>::from_fn(|i, j| {
            let vertex = &vertices[i];
            if j < 4 {
                return vertex.color[j];
            }
            return vertex.normal[j - 4];
        });
        let mut varying = (
            AttributePlanes::fit(&setup, &values),
            ShadowProjector::new(camera, context.point_lights, &setup.depth_plane, &setup.origin()),
        );

        self.shade_triangle(&setup, &mut varying, |(attributes, shadows), x, y, depth| {
            let current = &attributes.current;
            let fragment = Fragment {
                color: current.fixed_rows::<4>(0).into_owned(),
                normal: current.fixed_rows::<3>(4).normalize(),
                position: camera.unproject(&vector![x as f32, y as f32, depth]),
                reciprocal_depth: depth,
                shadow_coords: shadows.coords(),
            };
            return shade(&fragment, &camera.center, context, material);
        });
    }

    /// Fills a triangle sampling `texture` with perspective correct coordinates. Depth is left
    /// untouched.
    pub fn render_textured_triangle(
        &mut self,
        camera: &PinholeCamera,
        texture: &Framebuffer,
        vertices: &[TexturedVertex; 3],
        context: &RenderContext,
        material: &Material,
    ) {
        let positions = vertices.map(|vertex| vertex.position);
        let Some(setup) = TriangleSetup::new(camera, self.width, self.height, &positions) else {
            return;
        };

        // The view ray through (x, y) splits into the vectors from the camera to the vertices with
        // weights affine in (x, y). Normalized, those weights are the barycentric coordinates of
        // the point the ray hits.
        let [t1, t2, t3] = positions;
        let Some(to_vertices) = Matrix3::from_rows(&[
            (t1 - camera.center).transpose(),
            (t2 - camera.center).transpose(),
            (t3 - camera.center).transpose(),
        ]).try_inverse() else {
            return;
        };
        let view_basis = Matrix3::from_rows(&[camera.a.transpose(), camera.b.transpose(), camera.c.transpose()]);
        let weights = view_basis * to_vertices;
        let uvs = Matrix3x2::from_rows(&[
            vertices[0].uv.transpose(),
            vertices[1].uv.transpose(),
            vertices[2].uv.transpose(),
        ]);
        let uv_planes = weights * uvs;
        let texture_planes = Matrix3::from_columns(&[
            uv_planes.column(0).into_owned(),
            uv_planes.column(1).into_owned(),
            weights.column_sum(),
        ]);

        let normals = Matrix3::from_rows(&[
            vertices[0].normal.transpose(),
            vertices[1].normal.transpose(),
            vertices[2].normal.transpose(),
        ]);
        let mut varying = (
            AttributePlanes::fit(&setup, &normals),
            AttributePlanes::from_planes(&texture_planes, &setup.origin()),
            ShadowProjector::new(camera, context.point_lights, &setup.depth_plane, &setup.origin()),
        );

        let texture_width = texture.width().saturating_sub(1) as f32;
        let texture_height = texture.height().saturating_sub(1) as f32;
        self.shade_triangle(&setup, &mut varying, |(normals, texture_coords, shadows), x, y, depth| {
            let [u, v, weight] = [texture_coords.current.x, texture_coords.current.y, texture_coords.current.z];
            let tx = mirrored_wrap(u / weight) * texture_width;
            let ty = mirrored_wrap(v / weight) * texture_height;
            let fragment = Fragment {
                color: texture.bilinear_lookup(tx, ty),
                normal: normals.current.normalize(),
                position: camera.unproject(&vector![x as f32, y as f32, depth]),
                reciprocal_depth: depth,
                shadow_coords: shadows.coords(),
            };
            return shade(&fragment, &camera.center, context, material);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{BLACK, RED, WHITE};
    use std::f32::consts::FRAC_PI_2;

    fn camera() -> PinholeCamera {
        return PinholeCamera::new(32, 32, FRAC_PI_2);
    }

    fn colored(positions: [Vector3<f32>; 3], color: Color) -> [ColoredVertex; 3] {
        return positions.map(|position| ColoredVertex {
            position,
            color,
            normal: vector![0.0, 0.0, 1.0],
        });
    }

    fn at_depth(z: f32, corners: [(f32, f32); 3]) -> [Vector3<f32>; 3] {
        return corners.map(|(x, y)| vector![x, y, z]);
    }

    #[test]
    fn back_faces_are_culled() {
        let camera = camera();
        let mut framebuffer = Framebuffer::new(32, 32);
        framebuffer.fill(BLACK);
        let untouched = framebuffer.clone();
        // Clockwise as seen from the camera.
        let positions = at_depth(-10.0, [(-3.0, -3.0), (0.0, 3.0), (3.0, -3.0)]);
        framebuffer.prerender_triangle(&camera, &positions);
        framebuffer.render_triangle(&camera, &colored(positions, RED), &RenderContext::unlit(), &Material::UNLIT);
        assert!(framebuffer == untouched);
    }

    #[test]
    fn triangles_behind_the_camera_are_dropped() {
        let camera = camera();
        let mut framebuffer = Framebuffer::new(32, 32);
        let untouched = framebuffer.clone();
        let positions = [vector![-3.0, -3.0, -10.0], vector![3.0, -3.0, -10.0], vector![0.0, 3.0, 1.0]];
        framebuffer.prerender_triangle(&camera, &positions);
        framebuffer.render_triangle(&camera, &colored(positions, RED), &RenderContext::unlit(), &Material::UNLIT);
        assert!(framebuffer == untouched);
    }

    #[test]
    fn prepass_keeps_the_nearest_depth() {
        let camera = camera();
        let mut framebuffer = Framebuffer::new(32, 32);
        let near = at_depth(-10.0, [(-3.0, -3.0), (3.0, -3.0), (0.0, 3.0)]);
        let middle = at_depth(-20.0, [(-10.0, -10.0), (10.0, -10.0), (0.0, 10.0)]);
        let far = at_depth(-30.0, [(-30.0, -30.0), (30.0, -30.0), (0.0, 30.0)]);
        // Submission order must not matter.
        for positions in [&middle, &far, &near] {
            framebuffer.prerender_triangle(&camera, positions);
        }
        assert!((framebuffer.depth(16, 16) - 1.6).abs() < 1e-4);
        assert!((framebuffer.depth(16, 9) - 0.8).abs() < 1e-4);
        assert!((framebuffer.depth(16, 2) - 16.0 / 30.0).abs() < 1e-4);
        assert_eq!(framebuffer.depth(0, 31), 0.0);
    }

    #[test]
    fn shared_diagonal_is_covered_once() {
        let camera = camera();
        let mut framebuffer = Framebuffer::new(32, 32);
        let translucent = vector![0.25, 0.0, 0.0, 0.25];
        // At depth 16 screen coordinates are world ones shifted by 16, so the diagonal runs
        // through pixel centers.
        let quad = at_depth(-16.0, [(-4.0, -4.0), (4.0, -4.0), (4.0, 4.0)]);
        let other_half = at_depth(-16.0, [(-4.0, -4.0), (4.0, 4.0), (-4.0, 4.0)]);
        framebuffer.render_triangle(&camera, &colored(quad, translucent), &RenderContext::unlit(), &Material::UNLIT);
        framebuffer.render_triangle(&camera, &colored(other_half, translucent), &RenderContext::unlit(), &Material::UNLIT);
        for color in framebuffer.as_colors() {
            // Covered twice would read 0.4375.
            assert!(color.w == 0.0 || (color.w - 0.25).abs() < 1e-5);
        }
        // Pixels on the bottom and right edges of the quad belong to its neighbours.
        for k in 13..20 {
            assert!((framebuffer.pixel(k, k).w - 0.25).abs() < 1e-5);
        }
    }

    #[test]
    fn occluded_fragments_are_not_shaded() {
        let camera = camera();
        let mut framebuffer = Framebuffer::new(32, 32);
        let near = at_depth(-10.0, [(-3.0, -3.0), (3.0, -3.0), (0.0, 3.0)]);
        let far = at_depth(-20.0, [(-10.0, -10.0), (10.0, -10.0), (0.0, 10.0)]);
        framebuffer.prerender_triangle(&camera, &near);
        framebuffer.prerender_triangle(&camera, &far);
        framebuffer.render_triangle(&camera, &colored(far, RED), &RenderContext::unlit(), &Material::UNLIT);
        framebuffer.render_triangle(&camera, &colored(near, WHITE), &RenderContext::unlit(), &Material::UNLIT);
        assert!((framebuffer.pixel(16, 16) - WHITE).norm() < 1e-5);
        assert!((framebuffer.pixel(16, 9) - RED).norm() < 1e-5);
    }

    #[test]
    fn mirrored_wrap_reflects_odd_repetitions() {
        assert!((mirrored_wrap(0.25) - 0.25).abs() < 1e-6);
        assert!((mirrored_wrap(1.25) - 0.75).abs() < 1e-6);
        assert!((mirrored_wrap(2.25) - 0.25).abs() < 1e-6);
        assert!((mirrored_wrap(-0.25) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn texture_coordinates_follow_the_surface() {
        let camera = camera();
        // Black left column, white right column: the sampled gray level is u.
        let mut texture = Framebuffer::new(2, 2);
        texture.fill(BLACK);
        texture.set_pixel(1, 0, WHITE);
        texture.set_pixel(1, 1, WHITE);

        let corner = |x: f32, y: f32, u: f32, v: f32| TexturedVertex {
            position: vector![x, y, -16.0],
            uv: vector![u, v],
            normal: vector![0.0, 0.0, 1.0],
        };
        let quad = [corner(-8.0, -8.0, 0.0, 0.0), corner(8.0, -8.0, 1.0, 0.0), corner(8.0, 8.0, 1.0, 1.0), corner(-8.0, 8.0, 0.0, 1.0)];
        let mut framebuffer = Framebuffer::new(32, 32);
        let context = RenderContext::unlit();
        framebuffer.render_textured_triangle(&camera, &texture, &[quad[0], quad[1], quad[2]], &context, &Material::UNLIT);
        framebuffer.render_textured_triangle(&camera, &texture, &[quad[0], quad[2], quad[3]], &context, &Material::UNLIT);

        // Screen x = world x + 16 at this depth.
        assert!((framebuffer.pixel(12, 13).x - 0.25).abs() < 0.02);
        assert!((framebuffer.pixel(20, 18).x - 0.75).abs() < 0.02);
        assert!((framebuffer.pixel(20, 18).w - 1.0).abs() < 1e-5);
        assert_eq!(framebuffer.pixel(2, 2).w, 0.0);
    }

    #[test]
    fn incremental_shadow_coordinates_match_direct_projection() {
        let camera = camera();
        let lights = [PointLight::new(16, vector![3.0, 4.0, -2.0], 1.0, 0.0, vector![1.0, 1.0, 1.0])];
        let positions = [vector![-6.0, -5.0, -9.0], vector![7.0, -4.0, -12.0], vector![1.0, 6.0, -10.0]];
        let Some(setup) = TriangleSetup::new(&camera, 32, 32, &positions) else {
            panic!("triangle should be visible");
        };
        let mut projector = ShadowProjector::new(&camera, &lights, &setup.depth_plane, &setup.origin());

        let (steps_x, steps_y) = (5, 7);
        let mut depth = setup.depth_at_origin();
        for _ in 0..steps_y {
            projector.advance_y();
            depth += setup.depth_plane.y;
        }
        projector.start_row();
        for _ in 0..steps_x {
            projector.advance_x();
            depth += setup.depth_plane.x;
        }

        let x = (setup.min_x + steps_x) as f32;
        let y = (setup.min_y + steps_y) as f32;
        let point = camera.unproject(&vector![x, y, depth]);
        let expected = ShadowCoords::from_world(lights[0].shadow_map(), &point, depth);
        for (actual, expected) in projector.coords()[0].0.iter().zip(expected.0.iter()) {
            assert!((actual - expected).norm() < 1e-3 * (1.0 + expected.norm()));
        }
    }
}
