// Explanation for lighting factors:
//  k_a - ambience factor, the minimum possible value of k_d
//  k_d - diffuse lighting factor
//  k_s - specular lighting color
//  k_t - specular strength multiplier
//  k_e - specular exponent
//  k_m - stretching factor of the diffuse compression curve
//  k_x - offset of the diffuse compression curve
//  k_r - how reflective the surface is
//  k_f - fresnel factor
//  k_u - combination of k_r and k_f

use nalgebra as na;
use na::{vector, Vector3};

use super::cube_map::{CubeMap, ShadowCoords};
use super::light::{DirectionalLight, PointLight};
use crate::util::{power, rgb, Color};

/// Lighting coefficients of a surface, shared by every triangle of a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub k_a: f32,
    pub k_t: f32,
    pub k_e: u32,
    pub k_m: f32,
    pub k_x: f32,
    pub k_r: f32,
    pub k_f: f32,
}

/// Which lighting terms a material needs. A pure function of the coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    /// No specular term.
    Diffuse,
    /// Fully reflective, no diffuse term.
    Mirror,
    /// Diffuse and specular.
    Glossy,
}

impl Material {
    pub const FLAT: Material = Material { k_a: 0.01, k_t: 0.0, k_e: 0, k_m: 3.0, k_x: 1.0, k_r: 0.0, k_f: 0.0 };
    pub const MIXED: Material = Material { k_a: 0.01, k_t: 0.1, k_e: 10, k_m: 3.0, k_x: 1.0, k_r: 0.0, k_f: 0.0 };
    pub const SHINY: Material = Material { k_a: 0.01, k_t: 1.0, k_e: 100, k_m: 3.0, k_x: 1.0, k_r: 0.0, k_f: 0.0 };
    pub const REFLECTIVE: Material = Material { k_a: 0.01, k_t: 1.0, k_e: 100, k_m: 3.0, k_x: 1.0, k_r: 0.5, k_f: 0.5 };
    pub const CHROME: Material = Material { k_a: 0.0, k_t: 0.0, k_e: 0, k_m: 0.0, k_x: 0.0, k_r: 1.0, k_f: 0.0 };
    pub const SPECULAR_CHROME: Material = Material { k_a: 0.0, k_t: 1.0, k_e: 100, k_m: 0.0, k_x: 0.0, k_r: 1.0, k_f: 0.0 };
    /// Shows the base color as is, as long as no environment is bound.
    pub const UNLIT: Material = Material { k_a: 1.0, k_t: 0.0, k_e: 0, k_m: 0.0, k_x: 0.0, k_r: 1.0, k_f: 0.0 };

    pub fn regime(&self) -> Regime {
        if self.k_r == 1.0 {
            return Regime::Mirror;
        }
        if self.k_t == 0.0 {
            return Regime::Diffuse;
        }
        return Regime::Glossy;
    }
}

impl Default for Material {
    fn default() -> Self {
        return Material::MIXED;
    }
}

/// Lights and environment a mesh is shaded with.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub directional_lights: &'a [DirectionalLight],
    pub point_lights: &'a [PointLight],
    /// Cube map sampled by reflective materials. None disables reflections.
    pub environment: Option<&'a CubeMap>,
}

impl<'a> RenderContext<'a> {
    pub fn new(directional_lights: &'a [DirectionalLight], point_lights: &'a [PointLight]) -> Self {
        return Self {
            directional_lights,
            point_lights,
            environment: None,
        };
    }

    /// No lights, no environment.
    pub fn unlit() -> RenderContext<'static> {
        return RenderContext {
            directional_lights: &[],
            point_lights: &[],
            environment: None,
        };
    }

    pub fn with_environment(self, environment: &'a CubeMap) -> Self {
        return Self {
            environment: Some(environment),
            ..self
        };
    }
}

/// Interpolated surface attributes of one pixel.
#[derive(Debug, Clone, Copy)]
pub struct Fragment<'a> {
    pub color: Color,
    /// Unit length.
    pub normal: Vector3<f32>,
    pub position: Vector3<f32>,
    pub reciprocal_depth: f32,
    /// One entry per point light of the context, in the same order. Lights without an entry are
    /// treated as unshadowed.
    pub shadow_coords: &'a [ShadowCoords],
}

/// Saturating curve squeezing accumulated diffuse light below 1 without a hard clip.
pub fn compress_diffuse(k_d: f32, material: &Material) -> f32 {
    return 1.0 - 1.0 / (material.k_m * k_d + material.k_x);
}

/// Scales all channels down by the same factor if any of them exceeds 1, keeping the hue.
pub fn scale_to_unit(color: Vector3<f32>) -> Vector3<f32> {
    let max = color.max();
    if max > 1.0 {
        return color / max;
    }
    return color;
}

fn point_light_visibility(fragment: &Fragment, index: usize, light: &PointLight) -> f32 {
    return match fragment.shadow_coords.get(index) {
        Some(coords) => light.shadow_map().visibility(coords, fragment.reciprocal_depth),
        None => 1.0,
    };
}

fn specular(reflected_ray: &Vector3<f32>, direction: &Vector3<f32>, material: &Material) -> f32 {
    return power(reflected_ray.dot(direction).max(0.0), material.k_e) * material.k_t;
}

/// Final premultiplied color of a fragment.
pub fn shade(
    fragment: &Fragment,
    camera_position: &Vector3<f32>,
    context: &RenderContext,
    material: &Material,
) -> Color {
    let normal = &fragment.normal;
    let mut k_d = material.k_a;
    let mut k_s: Vector3<f32> = Vector3::zeros();

    let ray = (camera_position - fragment.position).normalize();
    let reflected_ray = 2.0 * ray.dot(normal) * normal - ray;
    let regime = material.regime();

    if regime != Regime::Mirror {
        for light in context.directional_lights {
            k_d += (light.direction().dot(normal) * light.strength()).max(0.0);
        }
    }
    if regime != Regime::Diffuse {
        for light in context.directional_lights {
            k_s += specular(&reflected_ray, &light.direction(), material)
                * light.specular_strength()
                * light.specular_color();
        }
    }

    for (index, light) in context.point_lights.iter().enumerate() {
        let visibility = point_light_visibility(fragment, index, light);
        if visibility == 0.0 {
            continue;
        }
        let direction = light.position() - fragment.position;
        let distance = direction.norm();
        let unit_direction = direction / distance;
        match regime {
            // @TODO the diffuse-only falloff is cubic while the glossy one is quadratic. Kept,
            // since scenes are lit for it, but worth unifying.
            Regime::Diffuse => {
                k_d += visibility
                    * (direction.dot(normal) * light.strength / (distance * distance * distance)).max(0.0);
            }
            Regime::Glossy => {
                k_d += visibility
                    * (unit_direction.dot(normal) * light.strength / (distance * distance)).max(0.0);
            }
            Regime::Mirror => (),
        }
        if regime != Regime::Diffuse {
            k_s += visibility * specular(&reflected_ray, &unit_direction, material)
                * light.specular_strength
                / distance
                * light.specular_color;
        }
    }

    if regime != Regime::Mirror {
        k_d = compress_diffuse(k_d, material);
    }

    let base = rgb(&fragment.color);
    let mut result = k_s;
    match context.environment {
        Some(environment) if material.k_r != 0.0 => {
            let k_u = material.k_r - material.k_f * ray.dot(normal);
            result += (1.0 - k_u) * k_d * base + k_u * rgb(&environment.lookup(&reflected_ray));
        }
        _ => result += k_d * base,
    }

    let result = scale_to_unit(result);
    return vector![result.x, result.y, result.z, 1.0] * fragment.color.w;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{BLACK, WHITE};

    fn facing_fragment(color: Color) -> Fragment<'static> {
        return Fragment {
            color,
            normal: vector![0.0, 0.0, 1.0],
            position: Vector3::zeros(),
            reciprocal_depth: 1.0,
            shadow_coords: &[],
        };
    }

    #[test]
    fn regime_follows_coefficients() {
        assert_eq!(Material::FLAT.regime(), Regime::Diffuse);
        assert_eq!(Material::MIXED.regime(), Regime::Glossy);
        assert_eq!(Material::REFLECTIVE.regime(), Regime::Glossy);
        assert_eq!(Material::CHROME.regime(), Regime::Mirror);
        assert_eq!(Material::SPECULAR_CHROME.regime(), Regime::Mirror);
    }

    #[test]
    fn compressed_diffuse_stays_below_one_and_increases() {
        let material = Material::FLAT;
        let camera_position = vector![0.0, 0.0, 5.0];
        let mut previous = 0.0;
        for strength in [1.0, 2.0, 4.0, 8.0, 16.0, 64.0] {
            let lights = [DirectionalLight::new(vector![0.0, 0.0, 1.0], strength, 0.0, WHITE.xyz())];
            let context = RenderContext::new(&lights, &[]);
            let raw = material.k_a + strength;
            assert!(raw > 1.0);
            let shaded = shade(&facing_fragment(WHITE), &camera_position, &context, &material);
            assert!(shaded.x < 1.0);
            assert!(shaded.x > previous);
            assert!((shaded.x - compress_diffuse(raw, &material)).abs() < 1e-6);
            previous = shaded.x;
        }
    }

    #[test]
    fn overflowing_channels_are_rescaled_together() {
        let material = Material { k_a: 0.0, k_t: 1.0, k_e: 1, ..Material::CHROME };
        let lights = [DirectionalLight::new(vector![0.0, 0.0, 1.0], 0.0, 2.0, vector![1.0, 0.5, 0.25])];
        let context = RenderContext::new(&lights, &[]);
        let shaded = shade(&facing_fragment(BLACK), &vector![0.0, 0.0, 3.0], &context, &material);
        assert!((shaded.x - 1.0).abs() < 1e-6);
        assert!((shaded.y - 0.5).abs() < 1e-6);
        assert!((shaded.z - 0.25).abs() < 1e-6);
        assert_eq!(shaded.w, 1.0);
    }

    #[test]
    fn unlit_keeps_base_color_and_alpha_premultiplies() {
        let color = vector![0.2, 0.4, 0.6, 0.5];
        let shaded = shade(&facing_fragment(color), &vector![1.0, 2.0, 3.0], &RenderContext::unlit(), &Material::UNLIT);
        assert!((shaded - vector![0.1, 0.2, 0.3, 0.5]).norm() < 1e-6);
    }

    #[test]
    fn lights_behind_the_surface_add_nothing() {
        let lights = [DirectionalLight::new(vector![0.0, 0.0, -1.0], 5.0, 5.0, WHITE.xyz())];
        let context = RenderContext::new(&lights, &[]);
        let shaded = shade(&facing_fragment(WHITE), &vector![0.0, 0.0, 3.0], &context, &Material::MIXED);
        let ambient_only = compress_diffuse(Material::MIXED.k_a, &Material::MIXED);
        assert!((shaded.x - ambient_only).abs() < 1e-6);
    }

    #[test]
    fn mirror_shows_the_environment() {
        let mut environment = CubeMap::new(8, Vector3::zeros());
        environment.fill(vector![0.3, 0.6, 0.9, 1.0]);
        let context = RenderContext::unlit().with_environment(&environment);
        let shaded = shade(&facing_fragment(WHITE), &vector![0.0, 0.5, 3.0], &context, &Material::CHROME);
        assert!((shaded - vector![0.3, 0.6, 0.9, 1.0]).norm() < 1e-5);
    }

    #[test]
    fn point_light_falls_off_with_distance() {
        let near = [PointLight::new(4, vector![0.0, 0.0, 2.0], 10.0, 0.0, WHITE.xyz())];
        let far = [PointLight::new(4, vector![0.0, 0.0, 4.0], 10.0, 0.0, WHITE.xyz())];
        let camera_position = vector![0.0, 0.0, 5.0];
        let lit_near = shade(&facing_fragment(WHITE), &camera_position, &RenderContext::new(&[], &near), &Material::FLAT);
        let lit_far = shade(&facing_fragment(WHITE), &camera_position, &RenderContext::new(&[], &far), &Material::FLAT);
        // Diffuse-only falloff is inverse cube.
        let expected_near = compress_diffuse(Material::FLAT.k_a + 10.0 * 2.0 / 8.0, &Material::FLAT);
        assert!((lit_near.x - expected_near).abs() < 1e-5);
        assert!(lit_near.x > lit_far.x);
    }
}
