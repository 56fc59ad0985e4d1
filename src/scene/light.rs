use nalgebra as na;
use na::Vector3;

use super::cube_map::CubeMap;
use super::mesh::Mesh;

/// Light infinitely far away, lighting everything from one direction. Casts no shadows.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    direction: Vector3<f32>,
    strength: f32,
    specular_strength: f32,
    specular_color: Vector3<f32>,
}

impl DirectionalLight {
    /// `direction` points from the surface towards the light and is normalized here.
    pub fn new(
        direction: Vector3<f32>,
        strength: f32,
        specular_strength: f32,
        specular_color: Vector3<f32>,
    ) -> Self {
        return Self {
            direction: direction.normalize(),
            strength,
            specular_strength,
            specular_color,
        };
    }

    pub fn direction(&self) -> Vector3<f32> {
        return self.direction;
    }

    pub fn strength(&self) -> f32 {
        return self.strength;
    }

    pub fn specular_strength(&self) -> f32 {
        return self.specular_strength;
    }

    pub fn specular_color(&self) -> Vector3<f32> {
        return self.specular_color;
    }
}

/// Omnidirectional light with a depth-only cube map for shadows.
#[derive(Debug, Clone)]
pub struct PointLight {
    position: Vector3<f32>,
    pub strength: f32,
    pub specular_strength: f32,
    pub specular_color: Vector3<f32>,
    shadow_map: CubeMap,
}

impl PointLight {
    pub fn new(
        shadow_resolution: u32,
        position: Vector3<f32>,
        strength: f32,
        specular_strength: f32,
        specular_color: Vector3<f32>,
    ) -> Self {
        return Self {
            position,
            strength,
            specular_strength,
            specular_color,
            shadow_map: CubeMap::new(shadow_resolution, position),
        };
    }

    pub fn position(&self) -> Vector3<f32> {
        return self.position;
    }

    /// Moves the light along with its shadow map. Shadows have to be prerendered again.
    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        self.shadow_map.set_position(position);
    }

    pub fn shadow_map(&self) -> &CubeMap {
        return &self.shadow_map;
    }

    /// Forgets every occluder.
    pub fn clear_shadows(&mut self) {
        self.shadow_map.z_clear();
    }

    /// Adds the opaque triangles of a mesh as occluders.
    pub fn cast_shadows(&mut self, mesh: &Mesh) {
        self.shadow_map.prerender(mesh);
    }
}
