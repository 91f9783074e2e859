use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::camera::{DEFAULT_FAR, DEFAULT_FOV_DEGREES, DEFAULT_NEAR};
use crate::cli::Cli;
use crate::loaders::AssetSource;
use crate::math::{Axis, Color};

pub const MAX_PIXEL_RATIO: f32 = 2.0;

/// Built-in scene layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScenePreset {
    /// Spinning glTF dice, nudged by scroll
    Dice,
    /// Static home-office OBJ model
    #[default]
    Desktop,
}

impl ScenePreset {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "dice" => Some(Self::Dice),
            "desktop" => Some(Self::Desktop),
            _ => None,
        }
    }
}

/// `0xRRGGBB` color, written as `"#rrggbb"` in JSON (plain numbers accepted)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor(pub u32);

impl HexColor {
    pub fn color(self) -> Color {
        Color::from_hex(self.0)
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(HexColor(n & 0xff_ffff)),
            Raw::Text(s) => {
                let digits = s.trim_start_matches('#').trim_start_matches("0x");
                u32::from_str_radix(digits, 16)
                    .map(|n| HexColor(n & 0xff_ffff))
                    .map_err(|_| serde::de::Error::custom(format!("invalid hex color '{}'", s)))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: DEFAULT_FOV_DEGREES,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
            position: [0.0, 0.0, 50.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    pub color: HexColor,
    pub intensity: f32,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            color: HexColor(0x404040),
            intensity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightConfig {
    pub name: String,
    pub color: HexColor,
    pub intensity: f32,
    pub position: [f32; 3],
    /// Initial value of the panel's color picker; the light keeps `color`
    /// until the picker is changed
    #[serde(default)]
    pub palette: Option<HexColor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub count: usize,
    /// Edge length of the cube particles are scattered in
    pub spread: f32,
    pub size: f32,
    pub color: HexColor,
    /// Fixed rotation about Y applied every frame
    pub spin: f32,
    pub sprite: Option<PathBuf>,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 1000,
            spread: 55.0,
            size: 0.005,
            color: HexColor(0xffffff),
            spin: 0.001,
            sprite: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    pub rotation_step: f32,
    pub axes: [Axis; 2],
    pub particle_step: f32,
    /// Virtual page offset per wheel line
    pub line_height: f32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            rotation_step: 0.03,
            axes: [Axis::Y, Axis::X],
            particle_step: 1.0,
            line_height: 40.0,
        }
    }
}

/// Which clock reading scales the spinner's rotation each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBase {
    /// Total time since the loop started; rotation speeds up over time
    #[default]
    SinceStart,
    /// Time since the previous frame
    SinceLastFrame,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinConfig {
    pub rate: [f32; 3],
    pub axes: [Axis; 2],
    pub time_base: TimeBase,
    /// Expose the rate in the control panel
    pub controls: bool,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            rate: [0.0, 0.1, 0.1],
            axes: [Axis::Y, Axis::Z],
            time_base: TimeBase::SinceStart,
            controls: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            pan_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub name: String,
    #[serde(flatten)]
    pub source: AssetSource,
    #[serde(default)]
    pub position: Option<[f32; 3]>,
    #[serde(default)]
    pub scale: Option<[f32; 3]>,
    #[serde(default)]
    pub look_at: Option<[f32; 3]>,
    /// Bind the loaded node as the scroll/spin target
    #[serde(default)]
    pub tracked: bool,
    /// Node a texture asset is attached to
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub camera: CameraConfig,
    pub ambient: AmbientConfig,
    pub lights: Vec<LightConfig>,
    pub particles: ParticleConfig,
    pub scroll: ScrollConfig,
    pub spin: SpinConfig,
    pub orbit: OrbitConfig,
    pub show_helpers: bool,
    pub helper_size: f32,
    pub assets: Vec<AssetConfig>,
    pub seed: Option<u64>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::preset(ScenePreset::default())
    }
}

impl SceneConfig {
    pub fn preset(preset: ScenePreset) -> Self {
        let assets = match preset {
            ScenePreset::Dice => vec![AssetConfig {
                name: "dice".to_string(),
                source: AssetSource::Gltf {
                    path: PathBuf::from("static/textures/dice/scene.gltf"),
                },
                position: None,
                scale: None,
                look_at: Some([1.0, 0.0, 0.0]),
                tracked: true,
                target: None,
            }],
            ScenePreset::Desktop => vec![AssetConfig {
                name: "desktop".to_string(),
                source: AssetSource::Obj {
                    path: PathBuf::from("static/desktop/home-office.obj"),
                    material: Some(PathBuf::from("static/desktop/home-office.mtl")),
                },
                position: Some([0.0, 0.0, 0.0]),
                scale: Some([0.1, 0.1, 0.1]),
                look_at: None,
                tracked: false,
                target: None,
            }],
        };

        Self {
            camera: CameraConfig::default(),
            ambient: AmbientConfig::default(),
            lights: vec![
                LightConfig {
                    name: "Light 1".to_string(),
                    color: HexColor(0x8928ce),
                    intensity: 10.0,
                    position: [5.0, 2.0, 1.0],
                    palette: Some(HexColor(0x49ce28)),
                },
                LightConfig {
                    name: "Light 2".to_string(),
                    color: HexColor(0xffffff),
                    intensity: 1.0,
                    position: [-14.0, 20.0, 17.0],
                    palette: Some(HexColor(0xb42607)),
                },
            ],
            particles: ParticleConfig::default(),
            scroll: ScrollConfig::default(),
            spin: SpinConfig::default(),
            orbit: OrbitConfig::default(),
            show_helpers: true,
            helper_size: 1.0,
            assets,
            seed: None,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene config: {:?}", path))?;
        Self::from_json(&text).with_context(|| format!("Invalid scene config: {:?}", path))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build the effective configuration from CLI flags and the environment
    ///
    /// Precedence: `--config` file, else `--scene`, else `SCENE`, else the
    /// default preset. `GLTF_FILE` replaces the first glTF asset path.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let scene_env = std::env::var("SCENE").ok();
        let gltf_env = std::env::var("GLTF_FILE").ok();
        Self::resolve(cli, scene_env.as_deref(), gltf_env.as_deref())
    }

    pub fn resolve(cli: &Cli, scene_env: Option<&str>, gltf_env: Option<&str>) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => {
                let preset = cli
                    .scene
                    .or_else(|| {
                        let name = scene_env?;
                        let preset = ScenePreset::from_name(name);
                        if preset.is_none() {
                            log::warn!("Unknown SCENE '{}', using default preset", name);
                        }
                        preset
                    })
                    .unwrap_or_default();
                Self::preset(preset)
            }
        };

        if let Some(file) = gltf_env {
            let gltf = config
                .assets
                .iter_mut()
                .find(|asset| matches!(asset.source, AssetSource::Gltf { .. }));
            if let Some(asset) = gltf {
                asset.source = AssetSource::Gltf {
                    path: PathBuf::from(file),
                };
            }
        }

        if cli.no_helpers {
            config.show_helpers = false;
        }
        if cli.seed.is_some() {
            config.seed = cli.seed;
        }
        if let Some(root) = &cli.asset_root {
            config.rebase_assets(root);
        }

        Ok(config)
    }

    /// Resolve relative asset paths against `root`
    pub fn rebase_assets(&mut self, root: &Path) {
        for asset in &mut self.assets {
            asset.source.rebase(root);
        }
        if let Some(sprite) = &mut self.particles.sprite {
            if sprite.is_relative() {
                *sprite = root.join(&*sprite);
            }
        }
    }
}
