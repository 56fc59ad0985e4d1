pub mod cube_map;
pub mod framebuffer;
pub mod light;
pub mod mesh;
pub mod raster;
pub mod shader;

pub use cube_map::{CubeMap, ShadowCoords};
pub use framebuffer::Framebuffer;
pub use light::{DirectionalLight, PointLight};
pub use mesh::{Mesh, Surface};
pub use raster::{ColoredVertex, TexturedVertex};
pub use shader::{shade, Fragment, Material, Regime, RenderContext};

use crate::camera::PinholeCamera;

/// Meshes, lights and an optional sky, drawn together one frame at a time.
///
/// A frame is the sky behind everything, the shadow pre-passes of every point light, then every
/// mesh in submission order. Translucent meshes have to be submitted after whatever they cover.
#[derive(Debug, Default)]
pub struct Scene {
    meshes: Vec<Mesh>,
    /// Reflection cube map of the mesh with the same index, if it reflects its surroundings.
    probes: Vec<Option<CubeMap>>,
    pub directional_lights: Vec<DirectionalLight>,
    pub point_lights: Vec<PointLight>,
    pub sky: Option<CubeMap>,
}

impl Scene {
    pub fn new() -> Self {
        return Self::default();
    }

    /// Returns the index of the mesh.
    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(mesh);
        self.probes.push(None);
        return self.meshes.len() - 1;
    }

    /// Adds a mesh that reflects the rest of the scene, seen from its center through a cube map
    /// of the given resolution.
    pub fn add_reflective_mesh(&mut self, mesh: Mesh, resolution: u32) -> usize {
        let probe = CubeMap::new(resolution, mesh.center());
        self.meshes.push(mesh);
        self.probes.push(Some(probe));
        return self.meshes.len() - 1;
    }

    pub fn meshes(&self) -> &[Mesh] {
        return &self.meshes;
    }

    pub fn mesh_mut(&mut self, index: usize) -> &mut Mesh {
        return &mut self.meshes[index];
    }

    pub fn probe(&self, index: usize) -> Option<&CubeMap> {
        return self.probes.get(index).and_then(|probe| probe.as_ref());
    }

    /// Refreshes the shadow maps of every point light.
    pub fn cast_shadows(&mut self) {
        for light in self.point_lights.iter_mut() {
            light.clear_shadows();
            for mesh in self.meshes.iter() {
                light.cast_shadows(mesh);
            }
        }
    }

    /// Draws a full frame into `framebuffer`, replacing its contents.
    pub fn render(&mut self, framebuffer: &mut Framebuffer, camera: &PinholeCamera) {
        match &self.sky {
            Some(sky) => sky.render_onto(framebuffer, camera),
            None => framebuffer.clear(),
        }
        framebuffer.z_clear();
        self.cast_shadows();

        let context = RenderContext::new(&self.directional_lights, &self.point_lights);
        for (index, (mesh, probe)) in self.meshes.iter().zip(self.probes.iter_mut()).enumerate() {
            let Some(probe) = probe else {
                mesh.render(framebuffer, camera, &context);
                continue;
            };

            match &self.sky {
                Some(sky) => sky.render_onto_cube(probe),
                None => probe.clear(),
            }
            probe.z_clear();
            probe.set_position(mesh.center());
            for (other_index, other) in self.meshes.iter().enumerate() {
                if other_index != index {
                    probe.render(other, &context);
                }
            }
            mesh.render(framebuffer, camera, &context.with_environment(probe));
        }
    }
}
