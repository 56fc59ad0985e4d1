use std::path::Path;

use image::{imageops, ColorType, DynamicImage};
use nalgebra as na;
use na::vector;

use crate::error::Result;
use crate::util::{to_byte, Color, EMPTY};

/// Tolerance of the visibility test, in reciprocal depth units. Keeps lit surfaces from
/// shadowing themselves.
pub const SHADOW_BIAS: f32 = 0.1;

/// Color plane plus reciprocal depth plane of the same size.
/// (0, 0) is the bottom left pixel, rows are stored bottom to top.
#[derive(Debug, Clone, PartialEq)]
pub struct Framebuffer {
    pub(super) width: usize,
    pub(super) height: usize,
    pub(super) color: Vec<Color>,
    // 1 / z, larger is nearer. 0.0 is "nothing rendered yet".
    pub(super) depth: Vec<f32>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let n_pixels = width * height;
        return Self {
            width,
            height,
            color: vec![EMPTY; n_pixels],
            depth: vec![0.0; n_pixels],
        };
    }

    /// Changes the dimensions, dropping the contents of both planes.
    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Framebuffer::new(width, height);
    }

    /// Decodes an image into the color plane, mirrored so that the top row of the file is the
    /// top row of the framebuffer. Grayscale and rgb images get an opaque alpha.
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgba = imageops::flip_vertical(&image.to_rgba32f());
        let (width, height) = (rgba.width() as usize, rgba.height() as usize);
        let color = rgba
            .pixels()
            .map(|pixel| vector![pixel.0[0], pixel.0[1], pixel.0[2], pixel.0[3]])
            .collect();
        return Self {
            width,
            height,
            color,
            depth: vec![0.0; width * height],
        };
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let image = image::open(path.as_ref())?;
        log::info!(
            "Loaded '{}' ({}x{})",
            path.as_ref().display(),
            image.width(),
            image.height()
        );
        return Ok(Self::from_image(&image));
    }

    /// Writes the color plane as an 8-bit rgba png.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        image::save_buffer(
            path.as_ref(),
            &self.to_rgba8(),
            self.width as u32,
            self.height as u32,
            ColorType::Rgba8,
        )?;
        log::info!("Saved '{}'", path.as_ref().display());
        return Ok(());
    }

    pub fn width(&self) -> usize {
        return self.width;
    }

    pub fn height(&self) -> usize {
        return self.height;
    }

    fn index(&self, x: usize, y: usize) -> usize {
        return y * self.width + x;
    }

    pub fn pixel(&self, x: usize, y: usize) -> Color {
        return self.color[self.index(x, y)];
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        let index = self.index(x, y);
        self.color[index] = color;
    }

    pub fn depth(&self, x: usize, y: usize) -> f32 {
        return self.depth[self.index(x, y)];
    }

    pub fn set_depth(&mut self, x: usize, y: usize, depth: f32) {
        let index = self.index(x, y);
        self.depth[index] = depth;
    }

    pub fn row(&self, y: usize) -> &[Color] {
        return &self.color[y * self.width..(y + 1) * self.width];
    }

    /// Raw color plane, row-major from the bottom row.
    pub fn as_colors(&self) -> &[Color] {
        return &self.color[..];
    }

    /// Color plane as a contiguous array of rgba floats, ready for a blit.
    pub fn as_rgba(&self) -> &[f32] {
        return bytemuck::cast_slice(&self.color[..]);
    }

    /// Quantized rgba8 pixels with the top row first, the order images and windows expect.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 * self.width * self.height);
        for y in (0..self.height).rev() {
            for color in self.row(y) {
                data.extend(color.iter().map(|channel| to_byte(*channel)));
            }
        }
        return data;
    }

    /// Bilinear color lookup. Integer coordinates return the stored pixel, the last row and
    /// column fall back to nearest. An empty framebuffer gives `EMPTY`.
    pub fn bilinear_lookup(&self, x: f32, y: f32) -> Color {
        if self.color.is_empty() {
            return EMPTY;
        }
        let x1 = (x as usize).min(self.width - 1);
        let y1 = (y as usize).min(self.height - 1);
        let x2 = x1 + 1;
        let y2 = y1 + 1;
        if x2 >= self.width || y2 >= self.height {
            return self.pixel(x1, y1);
        }

        let (fx1, fx2) = (x1 as f32, x2 as f32);
        let (fy1, fy2) = (y1 as f32, y2 as f32);
        return (fx2 - x) * (fy2 - y) * self.pixel(x1, y1)
            + (x - fx1) * (fy2 - y) * self.pixel(x2, y1)
            + (fx2 - x) * (y - fy1) * self.pixel(x1, y2)
            + (x - fx1) * (y - fy1) * self.pixel(x2, y2);
    }

    /// 1.0 if reciprocal depth `z` is not occluded at the pixel, 0.0 otherwise.
    pub fn visibility(&self, x: usize, y: usize, z: f32) -> f32 {
        if z >= self.depth(x, y) - SHADOW_BIAS {
            return 1.0;
        }
        return 0.0;
    }

    /// Visibility tests of the four neighbours, blended like [`Framebuffer::bilinear_lookup`].
    /// Gives soft shadow edges instead of a hard staircase. Nothing occludes in an empty
    /// framebuffer.
    pub fn bilinear_visibility(&self, x: f32, y: f32, z: f32) -> f32 {
        if self.depth.is_empty() {
            return 1.0;
        }
        let x1 = (x as usize).min(self.width - 1);
        let y1 = (y as usize).min(self.height - 1);
        let x2 = x1 + 1;
        let y2 = y1 + 1;
        if x2 >= self.width || y2 >= self.height {
            return self.visibility(x1, y1, z);
        }

        let (fx1, fx2) = (x1 as f32, x2 as f32);
        let (fy1, fy2) = (y1 as f32, y2 as f32);
        return (fx2 - x) * (fy2 - y) * self.visibility(x1, y1, z)
            + (x - fx1) * (fy2 - y) * self.visibility(x2, y1, z)
            + (fx2 - x) * (y - fy1) * self.visibility(x1, y2, z)
            + (x - fx1) * (y - fy1) * self.visibility(x2, y2, z);
    }

    pub fn fill(&mut self, color: Color) {
        self.color.fill(color);
    }

    /// Sets all pixels to transparent black.
    pub fn clear(&mut self) {
        self.fill(EMPTY);
    }

    pub fn z_fill(&mut self, z: f32) {
        self.depth.fill(z);
    }

    /// Resets the depth plane to "infinitely far".
    pub fn z_clear(&mut self) {
        self.z_fill(0.0);
    }

    /// Copies the color plane into `surface` with this framebuffer's (0, 0) at the offset.
    /// Parts falling outside `surface` are dropped.
    pub fn blit(&self, surface: &mut Framebuffer, offset_x: i64, offset_y: i64) {
        let min_x = offset_x.clamp(0, surface.width as i64) as usize;
        let min_y = offset_y.clamp(0, surface.height as i64) as usize;
        let max_x = (offset_x + self.width as i64).clamp(0, surface.width as i64) as usize;
        let max_y = (offset_y + self.height as i64).clamp(0, surface.height as i64) as usize;
        for y in min_y..max_y {
            let source_y = (y as i64 - offset_y) as usize;
            for x in min_x..max_x {
                let source_x = (x as i64 - offset_x) as usize;
                surface.set_pixel(x, y, self.pixel(source_x, source_y));
            }
        }
    }

    /// Replaces the color plane with a grayscale view of the depth plane.
    pub fn depth_to_color(&mut self) {
        // Brightness of 1 - 1/e is reached at reciprocal depth 2.
        const BRIGHTNESS_OFFSET: f32 = 0.5;
        for (color, depth) in self.color.iter_mut().zip(self.depth.iter()) {
            let gray = 1.0 - (-depth * BRIGHTNESS_OFFSET).exp();
            *color = vector![gray, gray, gray, gray];
        }
    }

    /// Copy rotated by 180 degrees.
    pub fn flipped(&self) -> Framebuffer {
        let mut result = Framebuffer::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                result.set_pixel(self.width - 1 - x, self.height - 1 - y, self.pixel(x, y));
            }
        }
        return result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{BLACK, WHITE};
    use image::RgbaImage;

    fn checker() -> Framebuffer {
        let mut framebuffer = Framebuffer::new(3, 2);
        framebuffer.set_pixel(0, 0, vector![0.0, 0.2, 0.4, 1.0]);
        framebuffer.set_pixel(1, 0, vector![1.0, 0.6, 0.0, 1.0]);
        framebuffer.set_pixel(0, 1, vector![0.4, 0.0, 0.8, 0.5]);
        framebuffer.set_pixel(1, 1, vector![0.2, 1.0, 0.4, 0.0]);
        return framebuffer;
    }

    #[test]
    fn planes_match_dimensions() {
        let framebuffer = Framebuffer::new(7, 5);
        assert_eq!(framebuffer.as_colors().len(), 35);
        assert_eq!(framebuffer.as_rgba().len(), 4 * 35);
        assert_eq!(framebuffer.depth.len(), 35);
    }

    #[test]
    fn bilinear_at_integer_coordinates_is_exact() {
        let framebuffer = checker();
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(framebuffer.bilinear_lookup(x as f32, y as f32), framebuffer.pixel(x, y));
            }
        }
    }

    #[test]
    fn bilinear_at_midpoint_is_the_mean() {
        let framebuffer = checker();
        let mean = (framebuffer.pixel(0, 0)
            + framebuffer.pixel(1, 0)
            + framebuffer.pixel(0, 1)
            + framebuffer.pixel(1, 1))
            / 4.0;
        assert!((framebuffer.bilinear_lookup(0.5, 0.5) - mean).norm() < 1e-6);
    }

    #[test]
    fn soft_visibility_blends_occlusion() {
        let mut framebuffer = Framebuffer::new(2, 2);
        framebuffer.z_fill(1.0);
        framebuffer.set_depth(1, 0, 5.0);
        framebuffer.set_depth(1, 1, 5.0);
        assert_eq!(framebuffer.visibility(0, 0, 1.0), 1.0);
        // Within the bias, still visible.
        assert_eq!(framebuffer.visibility(0, 0, 0.95), 1.0);
        assert_eq!(framebuffer.visibility(1, 0, 1.0), 0.0);
        assert!((framebuffer.bilinear_visibility(0.25, 0.5, 1.0) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn empty_framebuffer_samples_nothing() {
        let framebuffer = Framebuffer::new(0, 0);
        assert_eq!(framebuffer.bilinear_lookup(0.0, 0.0), EMPTY);
        assert_eq!(framebuffer.bilinear_lookup(3.5, 1.0), EMPTY);
        assert_eq!(framebuffer.bilinear_visibility(0.0, 0.0, 1.0), 1.0);
    }

    #[test]
    fn depth_is_shown_as_gray() {
        let mut framebuffer = Framebuffer::new(2, 1);
        framebuffer.set_depth(1, 0, 2.0);
        framebuffer.depth_to_color();
        assert_eq!(framebuffer.pixel(0, 0), EMPTY);
        let gray = 1.0 - (-1.0f32).exp();
        assert!((framebuffer.pixel(1, 0) - vector![gray, gray, gray, gray]).norm() < 1e-6);
    }

    #[test]
    fn rgba8_export_starts_with_the_top_row() {
        let mut framebuffer = Framebuffer::new(1, 2);
        framebuffer.set_pixel(0, 0, BLACK);
        framebuffer.set_pixel(0, 1, WHITE);
        assert_eq!(framebuffer.to_rgba8(), vec![255, 255, 255, 255, 0, 0, 0, 255]);
    }

    #[test]
    fn blit_is_clipped_to_the_surface() {
        let mut source = Framebuffer::new(2, 2);
        source.fill(WHITE);
        let mut surface = Framebuffer::new(3, 3);
        source.blit(&mut surface, 2, -1);
        assert_eq!(surface.pixel(2, 0), WHITE);
        assert_eq!(surface.pixel(2, 1), EMPTY);
        assert_eq!(surface.pixel(1, 0), EMPTY);
    }

    #[test]
    fn flipped_rotates_by_half_a_turn() {
        let framebuffer = checker();
        let flipped = framebuffer.flipped();
        assert_eq!(flipped.pixel(2, 1), framebuffer.pixel(0, 0));
        assert_eq!(flipped.pixel(1, 0), framebuffer.pixel(1, 1));
    }

    #[test]
    fn image_rows_are_mirrored_on_load() {
        let mut image = RgbaImage::new(1, 2);
        image.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        image.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        let framebuffer = Framebuffer::from_image(&DynamicImage::ImageRgba8(image));
        assert_eq!(framebuffer.pixel(0, 1), vector![1.0, 0.0, 0.0, 1.0]);
        assert_eq!(framebuffer.pixel(0, 0), vector![0.0, 0.0, 1.0, 1.0]);
    }
}
