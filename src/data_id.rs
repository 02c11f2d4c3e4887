use crate::common::*;

/// One training-data setting of the pipeline: occlusion/ghost-point caps and
/// the real/synthetic mix the training data was generated with.
///
/// Serializes as the tuple `(max_occlusions, max_ghost_points,
/// real_data_fraction, synthetic_data_fraction)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(u32, u32, f64, f64)", into = "(u32, u32, f64, f64)")]
pub struct DataSettings {
    pub max_occlusions: u32,
    pub max_ghost_points: u32,
    pub real_data_fraction: f64,
    pub synthetic_data_fraction: f64,
}

impl From<(u32, u32, f64, f64)> for DataSettings {
    fn from((max_occlusions, max_ghost_points, real, synt): (u32, u32, f64, f64)) -> Self {
        Self {
            max_occlusions,
            max_ghost_points,
            real_data_fraction: real,
            synthetic_data_fraction: synt,
        }
    }
}

impl From<DataSettings> for (u32, u32, f64, f64) {
    fn from(settings: DataSettings) -> Self {
        (
            settings.max_occlusions,
            settings.max_ghost_points,
            settings.real_data_fraction,
            settings.synthetic_data_fraction,
        )
    }
}

impl DataSettings {
    pub fn validate(&self) -> Result<()> {
        let check_fraction = |name: &str, value: f64| {
            ensure!(
                (0.0..=1.0).contains(&value),
                "{} must lie in [0, 1], got {}",
                name,
                value
            );
            Ok(())
        };
        check_fraction("real_data_fraction", self.real_data_fraction)?;
        check_fraction("synthetic_data_fraction", self.synthetic_data_fraction)?;
        Ok(())
    }
}

/// Textual id of a training-data setting, e.g. `OC_05_G_03_real_0.0_synt_1.0`.
///
/// The id names the directory the trained model and its renders live under,
/// so the format is load-bearing and must stay stable across releases.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SomaDataId(String);

lazy_static! {
    static ref DATA_ID_RE: Regex =
        Regex::new(r"^OC_(\d{2})_G_(\d{2})_real_(\d+\.\d)_synt_(\d+\.\d)$").unwrap();
}

impl SomaDataId {
    pub fn new(settings: DataSettings) -> Self {
        Self(format!(
            "OC_{:02}_G_{:02}_real_{:.1}_synt_{:.1}",
            settings.max_occlusions,
            settings.max_ghost_points,
            settings.real_data_fraction,
            settings.synthetic_data_fraction,
        ))
    }

    /// Recover the settings from an id. Fractions come back at the 0.1
    /// granularity the id encodes.
    pub fn parse(&self) -> Result<DataSettings> {
        let captures = DATA_ID_RE
            .captures(&self.0)
            .ok_or_else(|| format_err!("malformed data id {:?}", self.0))?;
        let field = |index: usize| -> Result<f64> {
            captures[index]
                .parse::<f64>()
                .with_context(|| format!("malformed data id {:?}", self.0))
        };
        Ok(DataSettings {
            max_occlusions: field(1)? as u32,
            max_ghost_points: field(2)? as u32,
            real_data_fraction: field(3)?,
            synthetic_data_fraction: field(4)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SomaDataId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

impl FromStr for SomaDataId {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let id = Self(text.to_owned());
        id.parse()?;
        Ok(id)
    }
}

pub fn create_soma_data_id(
    max_occlusions: u32,
    max_ghost_points: u32,
    real_data_fraction: f64,
    synthetic_data_fraction: f64,
) -> SomaDataId {
    SomaDataId::new(DataSettings {
        max_occlusions,
        max_ghost_points,
        real_data_fraction,
        synthetic_data_fraction,
    })
}
