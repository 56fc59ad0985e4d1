mod app;

use std::env;

use env_logger::Env;

const WIDTH: u32  = 800;
const HEIGHT: u32 = 600;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Default values.
    let mut params = app::Params {
        width: WIDTH,
        height: HEIGHT,
        print_fps: false,
        asset_path: String::from("assets"),
        output_path: None,
        frames: 1,
    };

    let args: Vec<String> = env::args().collect();
    for i in 1..args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("-w", Some(value)) => { params.width = value.parse()?; }
            ("-h", Some(value)) => { params.height = value.parse()?; }
            ("-p", Some(value)) => { params.asset_path = value.clone(); }
            ("-o", Some(value)) => { params.output_path = Some(value.clone()); }
            ("-n", Some(value)) => { params.frames = value.parse()?; }
            ("-f", _) => { params.print_fps = true; }
            _ => ()
        }
    }

    if let Some(output_path) = params.output_path.clone() {
        return app::render_to_file(&params, &output_path);
    }

    // The window needs the main thread, the frame loop runs next to it.
    show_image::run_context(move || app::run(params));
}
