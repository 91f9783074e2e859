// cli.rs - Command-line interface configuration
use std::path::PathBuf;

use clap::Parser;

use crate::config::ScenePreset;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "orbit-scene")]
#[command(about = "Orbit-controlled 3D scene viewer", long_about = None)]
pub struct Cli {
    /// Disable the control panel and lower console output to warnings
    #[arg(long = "no-ui", default_value = "false")]
    pub no_ui: bool,

    /// Scene preset (falls back to the SCENE environment variable)
    #[arg(long, value_enum)]
    pub scene: Option<ScenePreset>,

    /// JSON scene configuration, replaces the preset entirely
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory that relative asset paths are resolved against
    #[arg(long = "asset-root")]
    pub asset_root: Option<PathBuf>,

    /// Hide the point light helper markers
    #[arg(long = "no-helpers", default_value = "false")]
    pub no_helpers: bool,

    /// Seed for particle placement
    #[arg(long)]
    pub seed: Option<u64>,
}
