pub mod camera;
pub mod cli;
pub mod config;
pub mod core;
pub mod loaders;
pub mod math;
pub mod renderer;
pub mod scene;
pub mod scenes;
pub mod traits;
pub mod types;

pub use scenes::{create_panel, create_scene};
