use crate::{
    common::*,
    data_id::{DataSettings, SomaDataId},
    params,
    render::{RenderConfig, RenderOverrides},
};

/// The full run configuration: which experiments to render, over which
/// evaluation datasets, for which training-data settings.
///
/// Every field has a default reproducing the stock render run, so an empty
/// config file (or none at all) is launchable once a work dir is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct RunConfig {
    #[derivative(Default(value = "vec![params::DEFAULT_EXPR_ID.to_owned()]"))]
    pub soma_expr_ids: Vec<String>,
    #[derivative(Default(value = "vec![params::DEFAULT_TARGET_DS_NAME.to_owned()]"))]
    pub soma_mocap_target_ds_names: Vec<String>,
    #[derivative(Default(value = "vec![params::DEFAULT_DATA_SETTINGS]"))]
    pub soma_data_settings: Vec<DataSettings>,
    pub render: RenderConfig,
    pub render_overrides: RenderOverrides,
    /// Defaults to `{support_base_dir}/evaluation_mocaps/original`.
    pub mocap_base_dir: Option<PathBuf>,
    #[derivative(Default(value = "PathBuf::from(\"soma\")"))]
    pub soma_work_base_dir: PathBuf,
    #[derivative(Default(value = "params::DEFAULT_MOCAP_EXT.to_owned()"))]
    #[serde(
        serialize_with = "serialize_mocap_ext",
        deserialize_with = "deserialize_mocap_ext"
    )]
    pub mocap_ext: String,
    #[derivative(Default(value = "vec![RunTask::Render]"))]
    pub run_tasks: Vec<RunTask>,
    pub parallel: ParallelConfig,
}

impl RunConfig {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let config: Self = match extension {
            "json5" | "json" => json5::from_str(&text)?,
            "yaml" | "yml" => serde_yaml::from_str(&text)?,
            _ => bail!(
                "unsupported config format {:?}, expected json5/json/yaml/yml",
                path.display()
            ),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.soma_expr_ids.is_empty(), "soma_expr_ids is empty");
        ensure!(
            !self.soma_mocap_target_ds_names.is_empty(),
            "soma_mocap_target_ds_names is empty"
        );
        ensure!(
            !self.soma_data_settings.is_empty(),
            "soma_data_settings is empty"
        );
        ensure!(!self.run_tasks.is_empty(), "run_tasks is empty");
        for settings in &self.soma_data_settings {
            settings.validate()?;
        }
        check_mocap_ext(&self.mocap_ext).map_err(|message| format_err!("{}", message))?;
        Ok(())
    }

    /// Data ids of the configured settings, in configuration order.
    pub fn soma_data_ids(&self) -> Vec<SomaDataId> {
        self.soma_data_settings
            .iter()
            .copied()
            .map(SomaDataId::new)
            .collect()
    }
}

/// Pipeline stages selectable through `run_tasks`. Only rendering runs in
/// this launcher; the training-side stages are accepted by name so configs
/// written for the full pipeline still parse, and fail with a clear error
/// when dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTask {
    Render,
    Soma,
    Mosh,
    EvalLabel,
}

impl Display for RunTask {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Render => "render",
            Self::Soma => "soma",
            Self::Mosh => "mosh",
            Self::EvalLabel => "eval_label",
        };
        name.fmt(formatter)
    }
}

impl FromStr for RunTask {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let task = match text {
            "render" => Self::Render,
            "soma" => Self::Soma,
            "mosh" => Self::Mosh,
            "eval_label" => Self::EvalLabel,
            _ => bail!(
                "unknown task {:?}, expected one of render/soma/mosh/eval_label",
                text
            ),
        };
        Ok(task)
    }
}

/// Job-distribution knobs. These order and cap the job list; they are not a
/// scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct ParallelConfig {
    /// Shuffle the job list so long recordings spread across workers.
    #[derivative(Default(value = "true"))]
    pub randomly_run_jobs: bool,
    /// Cap the number of dispatched jobs; unset runs on all mocaps.
    pub max_num_jobs: Option<NonZeroUsize>,
    #[derivative(Default(value = "default_num_workers()"))]
    pub num_workers: NonZeroUsize,
    /// Plan and log jobs without spawning the render tool.
    pub dry_run: bool,
}

fn default_num_workers() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn check_mocap_ext(ext: &str) -> Result<(), String> {
    if ext.len() < 2 || !ext.starts_with('.') {
        return Err(format!(
            "mocap_ext must be a dotted extension such as \".c3d\", got {:?}",
            ext
        ));
    }
    Ok(())
}

fn serialize_mocap_ext<S>(ext: &str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    check_mocap_ext(ext).map_err(S::Error::custom)?;
    ext.serialize(serializer)
}

fn deserialize_mocap_ext<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let ext = String::deserialize(deserializer)?;
    check_mocap_ext(&ext).map_err(D::Error::custom)?;
    Ok(ext)
}
