use std::path::Path;
use std::rc::Rc;
use std::time;

use nalgebra as na;
use na::{vector, Vector3};
use show_image::{create_window, event, ImageInfo, ImageView, WindowOptions};

use tiny_cube_renderer::camera::PinholeCamera;
use tiny_cube_renderer::scene::{CubeMap, DirectionalLight, Framebuffer, Material, Mesh, PointLight, Scene};
use tiny_cube_renderer::util::{to_radians, Color, BLACK, LEMON_YELLOW, RED, SKY_BLUE, WHITE};

const SHADOW_RESOLUTION: u32 = 256;
const PROBE_RESOLUTION: u32 = 128;
const LIGHT_ORBIT_RADIUS: f32 = 10.0;
const LIGHT_HEIGHT: f32 = 8.0;
/// Time step of headless frames, in seconds.
const HEADLESS_FRAME_TIME: f32 = 1.0 / 30.0;

pub struct Params {
    pub width: u32,
    pub height: u32,
    pub print_fps: bool,
    pub asset_path: String,
    /// Render `frames` frames without a window and save the last one here.
    pub output_path: Option<String>,
    pub frames: u32,
}

/// Helper, defining exit event to be an Escape key press.
fn is_exit_event(window_event: event::WindowEvent) -> bool {
    if let event::WindowEvent::KeyboardInput(event) = window_event {
        if event.input.key_code == Some(event::VirtualKeyCode::Escape) && event.input.state.is_released() {
            return true;
        }
    }

    return false;
}

fn checker_texture(size: usize, cells: usize) -> Framebuffer {
    let mut texture = Framebuffer::new(size, size);
    let cell = (size / cells).max(1);
    for y in 0..size {
        for x in 0..size {
            let color = if (x / cell + y / cell) % 2 == 0 { WHITE } else { vector![0.3, 0.3, 0.35, 1.0] };
            texture.set_pixel(x, y, color);
        }
    }
    return texture;
}

/// Sky box from `sky_0.png` .. `sky_5.png` in the asset directory, or a painted gradient when
/// they are missing.
fn load_sky(asset_path: &Path) -> Result<CubeMap, Box<dyn std::error::Error>> {
    let paths: Vec<_> = (0..6).map(|i| asset_path.join(format!("sky_{}.png", i))).collect();
    if paths.iter().all(|path| path.exists()) {
        let mut faces = Vec::with_capacity(6);
        for path in paths.iter() {
            faces.push(Framebuffer::load(path)?);
        }
        let faces: [Framebuffer; 6] = match faces.try_into() {
            Ok(faces) => faces,
            Err(_) => unreachable!("six paths give six faces"),
        };
        return Ok(CubeMap::from_faces(faces)?);
    }

    log::info!("No sky box in '{}', painting one.", asset_path.display());
    let horizon: Color = vector![0.85, 0.9, 0.95, 1.0];
    let mut sky = CubeMap::new(256, Vector3::zeros());
    sky.paint(|direction| {
        let t = direction.y.max(0.0);
        return horizon * (1.0 - t) + SKY_BLUE * t;
    });
    return Ok(sky);
}

/// Floor, a few primitives, a mirror box and an optional `model.obj` from the asset directory.
pub fn build_scene(params: &Params) -> Result<Scene, Box<dyn std::error::Error>> {
    let asset_path = Path::new(&params.asset_path);
    let mut scene = Scene::new();
    scene.sky = Some(load_sky(asset_path)?);

    let mut floor = Mesh::with_texture(Rc::new(checker_texture(64, 8)), Material::MIXED);
    floor.add_textured_quad(
        [
            vector![-20.0, -2.0, 20.0],
            vector![20.0, -2.0, 20.0],
            vector![20.0, -2.0, -20.0],
            vector![-20.0, -2.0, -20.0],
        ],
        [vector![0.0, 0.0], vector![4.0, 0.0], vector![4.0, 4.0], vector![0.0, 4.0]],
    )?;
    scene.add_mesh(floor);

    let mut crate_box = Mesh::new(Material::SHINY);
    crate_box.add_aligned_box(vector![-6.0, -2.0, -4.0], vector![-3.0, 1.0, -1.0], LEMON_YELLOW)?;
    scene.add_mesh(crate_box);

    let mut pillar = Mesh::new(Material::MIXED);
    pillar.add_aligned_cylinder(vector![5.0, -2.0, -3.0], 1.0, 4.0, 32, RED)?;
    scene.add_mesh(pillar);

    let model_path = asset_path.join("model.obj");
    if model_path.exists() {
        let mut model = Mesh::new(Material::REFLECTIVE);
        model.add_obj(&model_path)?;
        model.set_size(2.0);
        model.set_center(vector![0.0, 0.5, 2.0]);
        scene.add_reflective_mesh(model, PROBE_RESOLUTION);
    }

    let mut mirror = Mesh::new(Material::SPECULAR_CHROME);
    mirror.add_aligned_box(vector![-1.5, -2.0, -7.0], vector![1.5, 1.0, -5.0], BLACK)?;
    scene.add_reflective_mesh(mirror, PROBE_RESOLUTION);

    scene.directional_lights.push(DirectionalLight::new(vector![0.0, 1.0, 0.0], 0.1, 0.0, WHITE.xyz()));
    for _ in 0..2 {
        scene.point_lights.push(PointLight::new(
            SHADOW_RESOLUTION,
            Vector3::zeros(),
            300.0,
            2.0,
            vector![1.0, 0.95, 0.8],
        ));
    }
    animate(&mut scene, 0.0);
    return Ok(scene);
}

/// Point lights orbit the scene center, evenly spaced.
fn animate(scene: &mut Scene, time: f32) {
    let count = scene.point_lights.len() as f32;
    for (i, light) in scene.point_lights.iter_mut().enumerate() {
        let angle = time * 0.5 + i as f32 * 2.0 * std::f32::consts::PI / count;
        light.set_position(vector![
            LIGHT_ORBIT_RADIUS * angle.cos(),
            LIGHT_HEIGHT,
            LIGHT_ORBIT_RADIUS * angle.sin()
        ]);
    }
}

fn demo_camera(width: u32, height: u32) -> PinholeCamera {
    return PinholeCamera::with_orientation(
        width,
        height,
        to_radians(70.0),
        vector![0.0, 3.0, 12.0],
        vector![0.0, -0.25, -1.0],
        vector![0.0, 1.0, 0.0],
    );
}

/// Renders without a window and saves the last frame.
pub fn render_to_file(params: &Params, output_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut scene = build_scene(params)?;
    let camera = demo_camera(params.width, params.height);
    let mut framebuffer = Framebuffer::new(params.width as usize, params.height as usize);

    let time_begin = time::Instant::now();
    for frame in 0..params.frames.max(1) {
        animate(&mut scene, frame as f32 * HEADLESS_FRAME_TIME);
        scene.render(&mut framebuffer, &camera);
    }
    log::info!(
        "Rendered {} frame(s) in {:.2}s.",
        params.frames.max(1),
        time::Instant::now().duration_since(time_begin).as_secs_f32()
    );

    framebuffer.save(output_path)?;
    log::info!("Saved '{}'.", output_path);
    return Ok(());
}

/// Actualy launches the window, showing the animated scene until Escape is released.
pub fn run(params: Params) -> Result<(), Box<dyn std::error::Error>> {
    let mut scene = build_scene(&params)?;
    let camera = demo_camera(params.width, params.height);
    let mut framebuffer = Framebuffer::new(params.width as usize, params.height as usize);

    let window_options: WindowOptions = WindowOptions {
        size: Some([params.width, params.height]),
        ..Default::default()
    };
    let window = create_window("output", window_options)?;
    let event_channel = window.event_channel()?;

    let mut exit = false;
    let time_begin = time::Instant::now();
    let mut frame_counter_time_begin = time::Instant::now();
    let mut frame_counter: u32 = 0;
    while !exit {
        let passed_time = time::Instant::now()
            .duration_since(time_begin)
            .as_secs_f32();
        animate(&mut scene, passed_time);
        scene.render(&mut framebuffer, &camera);

        let image_data = framebuffer.to_rgba8();
        let image = ImageView::new(ImageInfo::rgba8(params.width, params.height), &image_data);
        window.set_image("image", image)?;

        // Unloading all the events that have piled up, looking for exit event.
        exit = event_channel
            .try_iter()
            .map(is_exit_event)
            .reduce(|was_exit_event, is_exit_event| was_exit_event || is_exit_event)
            .unwrap_or(false);

        if params.print_fps {
            frame_counter += 1;
            if time::Instant::now()
                .duration_since(frame_counter_time_begin)
                .as_secs_f32() > 1.0
            {
                log::info!("FPS --- {}", frame_counter);
                frame_counter_time_begin = time::Instant::now();
                frame_counter = 0;
            }
        }
    }

    return Ok(());
}
