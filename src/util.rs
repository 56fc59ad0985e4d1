use nalgebra as na;
use na::{vector, Rotation3, Unit, Vector3, Vector4};

/// Premultiplied rgba color with every channel in [0.0, 1.0].
pub type Color = Vector4<f32>;

pub const EMPTY: Color = vector![0.0, 0.0, 0.0, 0.0];
pub const BLACK: Color = vector![0.0, 0.0, 0.0, 1.0];
pub const WHITE: Color = vector![1.0, 1.0, 1.0, 1.0];
pub const RED: Color = vector![1.0, 0.0, 0.0, 1.0];
pub const GREEN: Color = vector![0.0, 1.0, 0.0, 1.0];
pub const BLUE: Color = vector![0.0, 0.0, 1.0, 1.0];
pub const LEMON_YELLOW: Color = vector![1.0, 0.96, 0.31, 1.0];
pub const SKY_BLUE: Color = vector![0.53, 0.81, 0.92, 1.0];

pub fn to_radians(angle: f32) -> f32 {
    return angle.to_radians();
}

/// Drops alpha.
pub fn rgb(color: &Color) -> Vector3<f32> {
    return vector![color.x, color.y, color.z];
}

/// Right-handed rotation of a vector by theta radians about an axis through the origin.
pub fn rotated_about_axis(v: &Vector3<f32>, axis: &Vector3<f32>, theta: f32) -> Vector3<f32> {
    let rotation = Rotation3::from_axis_angle(&Unit::new_normalize(*axis), theta);
    return rotation * v;
}

/// Same as [`rotated_about_axis`], but the axis passes through `origin`.
pub fn rotated_about_point(
    v: &Vector3<f32>,
    origin: &Vector3<f32>,
    axis: &Vector3<f32>,
    theta: f32,
) -> Vector3<f32> {
    return rotated_about_axis(&(v - origin), axis, theta) + origin;
}

/// Exponentiation by squaring, cheaper than powf for the small integer specular exponents.
pub fn power(mut base: f32, mut exponent: u32) -> f32 {
    let mut result = 1.0;
    while exponent != 0 {
        if exponent & 1 == 1 {
            result *= base;
        }
        exponent >>= 1;
        base *= base;
    }
    return result;
}

/// Quantizes a [0.0, 1.0] channel to a byte.
pub fn to_byte(channel: f32) -> u8 {
    return (channel.clamp(0.0, 1.0) * 255.0).round() as u8;
}
