use crate::{common::*, data_id::SomaDataId, params};

/// Directory layout under the work base dir. Paths are computed here, never
/// created; a job creates its own output dirs right before it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkDirs {
    pub work_base_dir: PathBuf,
    pub support_base_dir: PathBuf,
    pub mocap_base_dir: PathBuf,
    pub experiments_dir: PathBuf,
    pub blender_temp_dir: PathBuf,
    pub marker_layout_fname: PathBuf,
    pub render_script_fname: PathBuf,
}

impl WorkDirs {
    pub fn new(work_base_dir: &Path) -> Self {
        let support_base_dir = work_base_dir.join(params::SUPPORT_DIR_NAME);
        Self::with_support_base_dir(work_base_dir, &support_base_dir)
    }

    pub fn with_support_base_dir(work_base_dir: &Path, support_base_dir: &Path) -> Self {
        Self {
            work_base_dir: work_base_dir.to_owned(),
            support_base_dir: support_base_dir.to_owned(),
            mocap_base_dir: support_base_dir.join(params::EVAL_MOCAP_SUBDIR),
            experiments_dir: work_base_dir.join(params::EXPERIMENTS_DIR_NAME),
            blender_temp_dir: work_base_dir.join(params::BLENDER_TEMP_DIR_NAME),
            marker_layout_fname: support_base_dir.join(params::MARKER_LAYOUT_SUBDIR),
            render_script_fname: support_base_dir.join(params::RENDER_SCRIPT_SUBDIR),
        }
    }

    /// Render output dir of one experiment/data-id/dataset cell.
    pub fn render_out_dir(&self, expr_id: &str, data_id: &SomaDataId, ds_name: &str) -> PathBuf {
        self.experiments_dir
            .join(expr_id)
            .join(data_id.as_str())
            .join("renders")
            .join(ds_name)
    }

    pub fn render_manifest_fname(&self) -> PathBuf {
        self.experiments_dir.join(params::RENDER_MANIFEST_FNAME)
    }
}
