pub mod camera;
pub mod error;
pub mod scene;
pub mod util;
