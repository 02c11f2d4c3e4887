use crate::{common::*, message::RenderJob, params, paths::WorkDirs};

/// Typed render settings. Field defaults reproduce the stock render run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct RenderConfig {
    pub moshpp_verbosity: u32,
    #[derivative(Default(value = "true"))]
    pub show_markers: bool,
    #[derivative(Default(value = "params::DEFAULT_VIDEO_FPS"))]
    pub video_fps: u32,
    #[derivative(Default(value = "params::DEFAULT_MESH_DS_RATE"))]
    pub mesh_ds_rate: u32,
    #[derivative(Default(value = "true"))]
    pub save_final_blend_file: bool,
    #[derivative(Default(value = "true"))]
    pub resolution_change_from_blend: bool,
    #[derivative(Default(value = "params::DEFAULT_RESOLUTION"))]
    pub resolution_default: [u32; 2],
    pub render_engine: RenderEngine,
    pub render_only_one_image: bool,
    #[derivative(Default(value = "PathBuf::from(\"blender\")"))]
    pub blender_binary: PathBuf,
    pub temp_base_dir: Option<PathBuf>,
    pub support_base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderEngine {
    #[derivative(Default)]
    Eevee,
    Cycles,
}

impl Display for RenderEngine {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Eevee => "eevee",
            Self::Cycles => "cycles",
        };
        name.fmt(formatter)
    }
}

impl FromStr for RenderEngine {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        match text {
            "eevee" => Ok(Self::Eevee),
            "cycles" => Ok(Self::Cycles),
            _ => bail!("unknown render engine {:?}, expected eevee or cycles", text),
        }
    }
}

/// A scalar or list value of one dotted-key render setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverrideValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
}

impl From<bool> for OverrideValue {
    fn from(from: bool) -> Self {
        Self::Bool(from)
    }
}

impl From<i64> for OverrideValue {
    fn from(from: i64) -> Self {
        Self::Int(from)
    }
}

impl From<u32> for OverrideValue {
    fn from(from: u32) -> Self {
        Self::Int(from as i64)
    }
}

impl From<f64> for OverrideValue {
    fn from(from: f64) -> Self {
        Self::Float(from)
    }
}

impl From<&str> for OverrideValue {
    fn from(from: &str) -> Self {
        Self::Str(from.to_owned())
    }
}

impl From<String> for OverrideValue {
    fn from(from: String) -> Self {
        Self::Str(from)
    }
}

impl From<Vec<i64>> for OverrideValue {
    fn from(from: Vec<i64>) -> Self {
        Self::IntList(from)
    }
}

impl From<[u32; 2]> for OverrideValue {
    fn from(from: [u32; 2]) -> Self {
        Self::IntList(from.iter().map(|value| *value as i64).collect())
    }
}

impl OverrideValue {
    fn as_bool(&self, key: &str) -> Result<bool> {
        match self {
            Self::Bool(value) => Ok(*value),
            _ => bail!("{} expects a bool, got {:?}", key, self),
        }
    }

    fn as_u32(&self, key: &str) -> Result<u32> {
        match self {
            Self::Int(value) if *value >= 0 => Ok(*value as u32),
            _ => bail!("{} expects a non-negative integer, got {:?}", key, self),
        }
    }

    fn as_str(&self, key: &str) -> Result<&str> {
        match self {
            Self::Str(value) => Ok(value),
            _ => bail!("{} expects a string, got {:?}", key, self),
        }
    }

    fn as_resolution(&self, key: &str) -> Result<[u32; 2]> {
        match self {
            Self::IntList(values) => {
                let (x, y) = values
                    .iter()
                    .collect_tuple()
                    .ok_or_else(|| format_err!("{} expects an [x, y] pair, got {:?}", key, self))?;
                ensure!(*x > 0 && *y > 0, "{} expects positive sizes, got {:?}", key, self);
                Ok([*x as u32, *y as u32])
            }
            _ => bail!("{} expects an [x, y] pair, got {:?}", key, self),
        }
    }
}

/// Open-ended dotted-key overrides forwarded into the render settings,
/// e.g. `"render.video_fps" -> 15`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderOverrides(pub BTreeMap<String, OverrideValue>);

impl RenderOverrides {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&OverrideValue> {
        self.0.get(key)
    }
}

impl RenderConfig {
    /// Fold dotted-key overrides into the typed settings. Unknown keys and
    /// wrong-shaped values are errors.
    pub fn apply(&mut self, overrides: &RenderOverrides) -> Result<()> {
        for (key, value) in &overrides.0 {
            match key.as_str() {
                "moshpp.verbosity" => self.moshpp_verbosity = value.as_u32(key)?,
                "render.show_markers" => self.show_markers = value.as_bool(key)?,
                "render.video_fps" => self.video_fps = value.as_u32(key)?,
                "mesh.ds_rate" => self.mesh_ds_rate = value.as_u32(key)?,
                "render.save_final_blend_file" => {
                    self.save_final_blend_file = value.as_bool(key)?
                }
                "render.resolution.change_from_blend" => {
                    self.resolution_change_from_blend = value.as_bool(key)?
                }
                "render.resolution.default" => {
                    self.resolution_default = value.as_resolution(key)?
                }
                "render.render_engine" => self.render_engine = value.as_str(key)?.parse()?,
                "render.render_only_one_image" => {
                    self.render_only_one_image = value.as_bool(key)?
                }
                "render.blender_binary" => self.blender_binary = value.as_str(key)?.into(),
                "dirs.temp_base_dir" => self.temp_base_dir = Some(value.as_str(key)?.into()),
                "dirs.support_base_dir" => {
                    self.support_base_dir = Some(value.as_str(key)?.into())
                }
                _ => bail!("unrecognized render setting {:?}", key),
            }
        }
        Ok(())
    }

    /// The dotted-key view of the settings, as handed to the render backend.
    pub fn to_overrides(&self, dirs: &WorkDirs) -> RenderOverrides {
        RenderOverrides(btreemap! {
            "moshpp.verbosity".into() => self.moshpp_verbosity.into(),
            "render.show_markers".into() => self.show_markers.into(),
            "render.video_fps".into() => self.video_fps.into(),
            "mesh.ds_rate".into() => self.mesh_ds_rate.into(),
            "render.save_final_blend_file".into() => self.save_final_blend_file.into(),
            "render.resolution.change_from_blend".into() => self.resolution_change_from_blend.into(),
            "render.resolution.default".into() => self.resolution_default.into(),
            "render.render_engine".into() => self.render_engine.to_string().into(),
            "render.render_only_one_image".into() => self.render_only_one_image.into(),
            "dirs.temp_base_dir".into() => dirs.blender_temp_dir.display().to_string().into(),
            "dirs.support_base_dir".into() => dirs.support_base_dir.display().to_string().into(),
        })
    }
}

/// Build the render tool invocation for one job. Pure; nothing is spawned
/// and no path is touched here.
pub fn render_command(job: &RenderJob, config: &RenderConfig, dirs: &WorkDirs) -> (PathBuf, Vec<String>) {
    let path_arg = |path: &Path| path.display().to_string();

    let mut args = vec![
        "--background".to_owned(),
        "-noaudio".to_owned(),
        "--python".to_owned(),
        path_arg(&dirs.render_script_fname),
        "--".to_owned(),
        "--mocap".to_owned(),
        path_arg(&job.mocap.path),
        "--out".to_owned(),
        path_arg(&job.out_fname),
        "--temp-dir".to_owned(),
        path_arg(&dirs.blender_temp_dir),
        "--marker-layout".to_owned(),
        path_arg(&dirs.marker_layout_fname),
        "--fps".to_owned(),
        config.video_fps.to_string(),
        "--ds-rate".to_owned(),
        config.mesh_ds_rate.to_string(),
        "--engine".to_owned(),
        config.render_engine.to_string(),
        "--resolution".to_owned(),
        config.resolution_default[0].to_string(),
        config.resolution_default[1].to_string(),
        "--moshpp-verbosity".to_owned(),
        config.moshpp_verbosity.to_string(),
    ];
    if config.show_markers {
        args.push("--show-markers".to_owned());
    }
    if config.resolution_change_from_blend {
        args.push("--resolution-from-blend".to_owned());
    }
    if config.render_only_one_image {
        args.push("--single-image".to_owned());
    }
    if let Some(blend_fname) = &job.blend_fname {
        args.push("--save-blend".to_owned());
        args.push(path_arg(blend_fname));
    }

    (config.blender_binary.clone(), args)
}
