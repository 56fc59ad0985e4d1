use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::rc::Rc;

use nalgebra as na;
use na::{vector, Vector2, Vector3};
use obj::raw::parse_obj;
use obj::{Obj, Position as ObjPosition, TexturedVertex as ObjTexturedVertex, Vertex as ObjVertex};

use super::framebuffer::Framebuffer;
use super::raster::{ColoredVertex, TexturedVertex};
use super::shader::{Material, RenderContext};
use crate::camera::PinholeCamera;
use crate::error::{Error, Result};
use crate::util::{rotated_about_axis, rotated_about_point, Color, WHITE};

/// What a mesh's triangles are painted with. A mesh is either colored or textured, never both.
#[derive(Debug, Clone)]
pub enum Surface {
    /// One color per vertex.
    Colored(Vec<Color>),
    /// A texture shared with other meshes and one texture coordinate per vertex.
    Textured {
        texture: Rc<Framebuffer>,
        uvs: Vec<Vector2<f32>>,
    },
}

/// Indexed triangle mesh. Triangles are front facing when counter-clockwise as seen by the
/// camera.
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<Vector3<f32>>,
    normals: Vec<Vector3<f32>>,
    triangles: Vec<[u32; 3]>,
    surface: Surface,
    pub material: Material,
}

/// Streams of one file, validated before they touch a mesh.
struct MeshData {
    vertices: Vec<Vector3<f32>>,
    colors: Option<Vec<Color>>,
    normals: Option<Vec<Vector3<f32>>>,
    uvs: Option<Vec<Vector2<f32>>>,
    triangles: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new(material: Material) -> Self {
        return Self {
            vertices: Vec::new(),
            normals: Vec::new(),
            triangles: Vec::new(),
            surface: Surface::Colored(Vec::new()),
            material,
        };
    }

    pub fn with_texture(texture: Rc<Framebuffer>, material: Material) -> Self {
        return Self {
            surface: Surface::Textured {
                texture,
                uvs: Vec::new(),
            },
            ..Self::new(material)
        };
    }

    /// Colored mesh from a binary mesh file.
    pub fn load_bin<P: AsRef<Path>>(path: P, material: Material) -> Result<Self> {
        let mut mesh = Self::new(material);
        mesh.add_bin(path)?;
        return Ok(mesh);
    }

    /// Textured mesh from a binary mesh file.
    pub fn load_textured_bin<P: AsRef<Path>>(path: P, texture: Rc<Framebuffer>, material: Material) -> Result<Self> {
        let mut mesh = Self::with_texture(texture, material);
        mesh.add_bin(path)?;
        return Ok(mesh);
    }

    pub fn vertices(&self) -> &[Vector3<f32>] {
        return &self.vertices;
    }

    pub fn normals(&self) -> &[Vector3<f32>] {
        return &self.normals;
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        return &self.triangles;
    }

    pub fn surface(&self) -> &Surface {
        return &self.surface;
    }

    pub fn is_textured(&self) -> bool {
        return matches!(self.surface, Surface::Textured { .. });
    }

    /// Three new vertices sharing the face normal.
    fn push_flat_triangle(&mut self, positions: [Vector3<f32>; 3]) {
        let [p1, p2, p3] = positions;
        let normal = (p2 - p1).cross(&(p3 - p1)).normalize();
        self.push_triangle(positions, [normal; 3]);
    }

    fn push_triangle(&mut self, positions: [Vector3<f32>; 3], normals: [Vector3<f32>; 3]) {
        let first = self.vertices.len() as u32;
        self.vertices.extend(positions);
        self.normals.extend(normals);
        self.triangles.push([first, first + 1, first + 2]);
    }

    fn colors_mut(&mut self) -> Result<&mut Vec<Color>> {
        return match &mut self.surface {
            Surface::Colored(colors) => Ok(colors),
            Surface::Textured { .. } => Err(Error::SurfaceMismatch),
        };
    }

    fn uvs_mut(&mut self) -> Result<&mut Vec<Vector2<f32>>> {
        return match &mut self.surface {
            Surface::Textured { uvs, .. } => Ok(uvs),
            Surface::Colored(_) => Err(Error::SurfaceMismatch),
        };
    }

    pub fn add_colored_triangle(&mut self, positions: [Vector3<f32>; 3], colors: [Color; 3]) -> Result<()> {
        self.colors_mut()?.extend(colors);
        self.push_flat_triangle(positions);
        return Ok(());
    }

    pub fn add_triangle(&mut self, positions: [Vector3<f32>; 3], color: Color) -> Result<()> {
        return self.add_colored_triangle(positions, [color; 3]);
    }

    pub fn add_textured_triangle(&mut self, positions: [Vector3<f32>; 3], uvs: [Vector2<f32>; 3]) -> Result<()> {
        self.uvs_mut()?.extend(uvs);
        self.push_flat_triangle(positions);
        return Ok(());
    }

    /// Planar convex quad split along its p1-p3 diagonal.
    pub fn add_colored_quad(&mut self, positions: [Vector3<f32>; 4], colors: [Color; 4]) -> Result<()> {
        let [p1, p2, p3, p4] = positions;
        let [c1, c2, c3, c4] = colors;
        self.add_colored_triangle([p1, p2, p3], [c1, c2, c3])?;
        return self.add_colored_triangle([p1, p3, p4], [c1, c3, c4]);
    }

    pub fn add_quad(&mut self, positions: [Vector3<f32>; 4], color: Color) -> Result<()> {
        return self.add_colored_quad(positions, [color; 4]);
    }

    pub fn add_textured_quad(&mut self, positions: [Vector3<f32>; 4], uvs: [Vector2<f32>; 4]) -> Result<()> {
        let [p1, p2, p3, p4] = positions;
        let [r1, r2, r3, r4] = uvs;
        self.add_textured_triangle([p1, p2, p3], [r1, r2, r3])?;
        return self.add_textured_triangle([p1, p3, p4], [r1, r3, r4]);
    }

    /// Box with faces parallel to the axes, spanned by two opposite corners and facing outwards.
    pub fn add_aligned_box(&mut self, corner: Vector3<f32>, opposite: Vector3<f32>, color: Color) -> Result<()> {
        if self.is_textured() {
            return Err(Error::SurfaceMismatch);
        }
        let (x0, y0, z0) = (corner.x.min(opposite.x), corner.y.min(opposite.y), corner.z.min(opposite.z));
        let (x1, y1, z1) = (corner.x.max(opposite.x), corner.y.max(opposite.y), corner.z.max(opposite.z));
        let faces = [
            [vector![x0, y0, z0], vector![x0, y0, z1], vector![x0, y1, z1], vector![x0, y1, z0]],
            [vector![x1, y0, z0], vector![x1, y1, z0], vector![x1, y1, z1], vector![x1, y0, z1]],
            [vector![x0, y0, z0], vector![x1, y0, z0], vector![x1, y0, z1], vector![x0, y0, z1]],
            [vector![x0, y1, z0], vector![x0, y1, z1], vector![x1, y1, z1], vector![x1, y1, z0]],
            [vector![x0, y0, z0], vector![x0, y1, z0], vector![x1, y1, z0], vector![x1, y0, z0]],
            [vector![x0, y0, z1], vector![x1, y0, z1], vector![x1, y1, z1], vector![x0, y1, z1]],
        ];
        for face in faces {
            self.add_quad(face, color)?;
        }
        return Ok(());
    }

    /// Closed cylinder standing on `bottom_center` along +y. Sides get smooth normals, caps flat
    /// ones.
    pub fn add_aligned_cylinder(
        &mut self,
        bottom_center: Vector3<f32>,
        radius: f32,
        height: f32,
        subdivisions: u32,
        color: Color,
    ) -> Result<()> {
        if subdivisions < 3 {
            log::warn!("Cylinder needs at least 3 subdivisions, got {}.", subdivisions);
            return Ok(());
        }
        let up = vector![0.0, height, 0.0];
        let top_center = bottom_center + up;
        let down_normal = vector![0.0, -1.0, 0.0];
        let up_normal = vector![0.0, 1.0, 0.0];
        let radial = |i: u32| {
            let theta = i as f32 / subdivisions as f32 * 2.0 * std::f32::consts::PI;
            return vector![theta.cos(), 0.0, theta.sin()];
        };

        self.colors_mut()?.extend(std::iter::repeat(color).take(12 * subdivisions as usize));
        for i in 0..subdivisions {
            let (n0, n1) = (radial(i), radial(i + 1));
            let (b0, b1) = (bottom_center + n0 * radius, bottom_center + n1 * radius);
            let (t0, t1) = (b0 + up, b1 + up);
            self.push_triangle([bottom_center, b0, b1], [down_normal; 3]);
            self.push_triangle([top_center, t1, t0], [up_normal; 3]);
            self.push_triangle([b1, b0, t0], [n1, n0, n0]);
            self.push_triangle([b1, t0, t1], [n1, n0, n1]);
        }
        return Ok(());
    }

    /// Appends a binary mesh file. Nothing is added if the file is malformed.
    ///
    /// Layout, little-endian: i32 vertex count, four 'y'/'n' bytes flagging the position, color,
    /// normal and texture coordinate streams, the flagged streams in that order (3, 3, 3 and 2
    /// f32 per vertex), i32 triangle count and three u32 indices per triangle.
    pub fn add_bin<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let data = parse_bin(&bytes, path)?;
        log::info!(
            "Loaded '{}': {} vertices, {} triangles.",
            path.display(),
            data.vertices.len(),
            data.triangles.len()
        );
        return self.merge(data);
    }

    /// Appends a Wavefront OBJ file. Colored meshes read positions and normals, if any, textured
    /// ones texture coordinates as well.
    pub fn add_obj<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw = parse_obj(BufReader::new(file))?;
        let data = if self.is_textured() {
            let model: Obj<ObjTexturedVertex, u32> = Obj::new(raw)?;
            MeshData {
                vertices: model.vertices.iter().map(|v| Vector3::from(v.position)).collect(),
                colors: None,
                normals: Some(model.vertices.iter().map(|v| Vector3::from(v.normal)).collect()),
                uvs: Some(model.vertices.iter().map(|v| vector![v.texture[0], v.texture[1]]).collect()),
                triangles: to_triangles(&model.indices),
            }
        } else if raw.normals.is_empty() {
            // Normals are computed from the faces on merge.
            let model: Obj<ObjPosition, u32> = Obj::new(raw)?;
            MeshData {
                vertices: model.vertices.iter().map(|v| Vector3::from(v.position)).collect(),
                colors: None,
                normals: None,
                uvs: None,
                triangles: to_triangles(&model.indices),
            }
        } else {
            let model: Obj<ObjVertex, u32> = Obj::new(raw)?;
            MeshData {
                vertices: model.vertices.iter().map(|v| Vector3::from(v.position)).collect(),
                colors: None,
                normals: Some(model.vertices.iter().map(|v| Vector3::from(v.normal)).collect()),
                uvs: None,
                triangles: to_triangles(&model.indices),
            }
        };
        log::info!(
            "Loaded '{}': {} vertices, {} triangles.",
            path.display(),
            data.vertices.len(),
            data.triangles.len()
        );
        return self.merge(data);
    }

    fn merge(&mut self, data: MeshData) -> Result<()> {
        let vertex_count = data.vertices.len();
        for triangle in data.triangles.iter() {
            if let Some(index) = triangle.iter().find(|index| **index as usize >= vertex_count) {
                return Err(Error::IndexOutOfRange { index: *index, vertex_count });
            }
        }

        let normals = match data.normals {
            Some(normals) => normals,
            None => {
                log::debug!("No normals given, computing them from the faces.");
                vertex_normals(&data.vertices, &data.triangles)
            }
        };
        match &mut self.surface {
            Surface::Colored(colors) => match data.colors {
                Some(loaded) => colors.extend(loaded),
                None => colors.extend(std::iter::repeat(WHITE).take(vertex_count)),
            },
            Surface::Textured { uvs, .. } => match data.uvs {
                Some(loaded) => uvs.extend(loaded),
                None => {
                    log::warn!("Textured mesh loaded without texture coordinates.");
                    uvs.extend(std::iter::repeat(Vector2::zeros()).take(vertex_count));
                }
            },
        }

        let offset = self.vertices.len() as u32;
        self.vertices.extend(data.vertices);
        self.normals.extend(normals);
        self.triangles.extend(data.triangles.iter().map(|triangle| triangle.map(|index| index + offset)));
        return Ok(());
    }

    /// Depth-only pass of the opaque triangles. Textured triangles always count as opaque,
    /// colored ones when all three vertices are.
    pub fn prerender(&self, framebuffer: &mut Framebuffer, camera: &PinholeCamera) {
        for triangle in self.triangles.iter() {
            let opaque = match &self.surface {
                Surface::Colored(colors) => triangle.iter().all(|index| colors[*index as usize].w >= 1.0),
                Surface::Textured { .. } => true,
            };
            if opaque {
                framebuffer.prerender_triangle(camera, &triangle.map(|index| self.vertices[index as usize]));
            }
        }
    }

    /// Pre-pass, then shading of every triangle in order.
    pub fn render(&self, framebuffer: &mut Framebuffer, camera: &PinholeCamera, context: &RenderContext) {
        self.prerender(framebuffer, camera);
        match &self.surface {
            Surface::Colored(colors) => {
                for triangle in self.triangles.iter() {
                    let vertices = triangle.map(|index| {
                        let index = index as usize;
                        ColoredVertex {
                            position: self.vertices[index],
                            color: colors[index],
                            normal: self.normals[index],
                        }
                    });
                    framebuffer.render_triangle(camera, &vertices, context, &self.material);
                }
            }
            Surface::Textured { texture, uvs } => {
                for triangle in self.triangles.iter() {
                    let vertices = triangle.map(|index| {
                        let index = index as usize;
                        TexturedVertex {
                            position: self.vertices[index],
                            uv: uvs[index],
                            normal: self.normals[index],
                        }
                    });
                    framebuffer.render_textured_triangle(camera, texture, &vertices, context, &self.material);
                }
            }
        }
    }

    pub fn translate(&mut self, direction: Vector3<f32>) {
        for vertex in self.vertices.iter_mut() {
            *vertex += direction;
        }
    }

    /// Mean of the vertices.
    pub fn center(&self) -> Vector3<f32> {
        if self.vertices.is_empty() {
            return Vector3::zeros();
        }
        return self.vertices.iter().sum::<Vector3<f32>>() / self.vertices.len() as f32;
    }

    pub fn set_center(&mut self, center: Vector3<f32>) {
        self.translate(center - self.center());
    }

    pub fn scale_about(&mut self, center: Vector3<f32>, multiplier: f32) {
        for vertex in self.vertices.iter_mut() {
            *vertex = (*vertex - center) * multiplier + center;
        }
    }

    pub fn scale(&mut self, multiplier: f32) {
        self.scale_about(self.center(), multiplier);
    }

    /// Mean distance of the vertices to `center`.
    pub fn size_about(&self, center: Vector3<f32>) -> f32 {
        if self.vertices.is_empty() {
            return 0.0;
        }
        let total: f32 = self.vertices.iter().map(|vertex| (vertex - center).norm()).sum();
        return total / self.vertices.len() as f32;
    }

    pub fn size(&self) -> f32 {
        return self.size_about(self.center());
    }

    /// Scales about `center` until [`Mesh::size`] equals `size`.
    pub fn set_size_about(&mut self, center: Vector3<f32>, size: f32) {
        let current = self.size();
        if current > 0.0 {
            self.scale_about(center, size / current);
        }
    }

    pub fn set_size(&mut self, size: f32) {
        self.set_size_about(self.center(), size);
    }

    /// Rotates vertices and normals about an axis through `origin`.
    pub fn rotate_about_axis(&mut self, origin: Vector3<f32>, axis: Vector3<f32>, theta: f32) {
        for vertex in self.vertices.iter_mut() {
            *vertex = rotated_about_point(vertex, &origin, &axis, theta);
        }
        for normal in self.normals.iter_mut() {
            *normal = rotated_about_axis(normal, &axis, theta);
        }
    }

    pub fn rotate(&mut self, axis: Vector3<f32>, theta: f32) {
        self.rotate_about_axis(self.center(), axis, theta);
    }

    pub fn rotate_about_segment(&mut self, start: Vector3<f32>, end: Vector3<f32>, theta: f32) {
        self.rotate_about_axis(start, end - start, theta);
    }
}

fn to_triangles(indices: &[u32]) -> Vec<[u32; 3]> {
    return indices
        .chunks_exact(3)
        .map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect();
}

/// Area weighted average of the normals of the faces around each vertex.
fn vertex_normals(vertices: &[Vector3<f32>], triangles: &[[u32; 3]]) -> Vec<Vector3<f32>> {
    let mut normals = vec![Vector3::zeros(); vertices.len()];
    for triangle in triangles {
        let [p1, p2, p3] = triangle.map(|index| vertices[index as usize]);
        let face_normal = (p2 - p1).cross(&(p3 - p1));
        for index in triangle {
            normals[*index as usize] += face_normal;
        }
    }
    return normals
        .into_iter()
        .map(|normal| normal.try_normalize(f32::EPSILON).unwrap_or_else(|| vector![0.0, 0.0, 1.0]))
        .collect();
}

/// Cursor over the bytes of a binary mesh file.
struct ByteReader<'a> {
    bytes: &'a [u8],
    path: &'a Path,
}

impl<'a> ByteReader<'a> {
    fn truncated(&self) -> Error {
        return Error::Truncated {
            path: self.path.to_path_buf(),
        };
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < count {
            return Err(self.truncated());
        }
        let (head, tail) = self.bytes.split_at(count);
        self.bytes = tail;
        return Ok(head);
    }

    fn read_flag(&mut self) -> Result<bool> {
        return Ok(self.take(1)?[0] == b'y');
    }

    /// Non-negative i32 count.
    fn read_count(&mut self) -> Result<usize> {
        let bytes = self.take(4)?;
        let count = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        return usize::try_from(count).map_err(|_| self.truncated());
    }

    fn read_array<const N: usize>(&mut self, count: usize) -> Result<Vec<[[u8; 4]; N]>> {
        let size = count.checked_mul(4 * N).ok_or_else(|| self.truncated())?;
        let bytes = self.take(size)?;
        return Ok(bytes
            .chunks_exact(4 * N)
            .map(|chunk| std::array::from_fn(|i| [chunk[4 * i], chunk[4 * i + 1], chunk[4 * i + 2], chunk[4 * i + 3]]))
            .collect());
    }

    fn read_floats<const N: usize>(&mut self, count: usize) -> Result<Vec<[f32; N]>> {
        let words = self.read_array::<N>(count)?;
        return Ok(words.into_iter().map(|word| word.map(f32::from_le_bytes)).collect());
    }

    fn read_indices(&mut self, count: usize) -> Result<Vec<[u32; 3]>> {
        let words = self.read_array::<3>(count)?;
        return Ok(words.into_iter().map(|word| word.map(u32::from_le_bytes)).collect());
    }
}

fn parse_bin(bytes: &[u8], path: &Path) -> Result<MeshData> {
    let mut reader = ByteReader { bytes, path };
    let vertex_count = reader.read_count()?;
    if !reader.read_flag()? {
        return Err(Error::MissingPositions {
            path: path.to_path_buf(),
        });
    }
    let has_colors = reader.read_flag()?;
    let has_normals = reader.read_flag()?;
    let has_uvs = reader.read_flag()?;

    let vertices = reader.read_floats::<3>(vertex_count)?.into_iter().map(Vector3::from).collect();
    let colors = if has_colors {
        let colors = reader.read_floats::<3>(vertex_count)?;
        Some(colors.into_iter().map(|[r, g, b]| vector![r, g, b, 1.0]).collect())
    } else {
        None
    };
    let normals = if has_normals {
        Some(reader.read_floats::<3>(vertex_count)?.into_iter().map(Vector3::from).collect())
    } else {
        None
    };
    let uvs = if has_uvs {
        Some(reader.read_floats::<2>(vertex_count)?.into_iter().map(Vector2::from).collect())
    } else {
        None
    };

    let triangle_count = reader.read_count()?;
    let triangles = reader.read_indices(triangle_count)?;
    return Ok(MeshData {
        vertices,
        colors,
        normals,
        uvs,
        triangles,
    });
}
