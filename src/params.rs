use crate::data_id::DataSettings;
use static_assertions::const_assert;

// stock run
pub const DEFAULT_EXPR_ID: &str = "V48_02_SOMA";
pub const DEFAULT_TARGET_DS_NAME: &str = "SOMA_unlabeled_mpc";
pub const DEFAULT_MOCAP_EXT: &str = ".c3d";
pub const DEFAULT_DATA_SETTINGS: DataSettings = DataSettings {
    max_occlusions: 5,   // upto 5 occlusions
    max_ghost_points: 3, // upto 3 ghost points
    real_data_fraction: 0.0,
    synthetic_data_fraction: 1.0, // 100% synthetic data
};

// render defaults
pub const DEFAULT_VIDEO_FPS: u32 = 15; // 25 for paper-quality clips
pub const DEFAULT_MESH_DS_RATE: u32 = 5;
pub const DEFAULT_RESOLUTION: [u32; 2] = [1600, 1600]; // [x, y]

// work-dir layout
pub const SUPPORT_DIR_NAME: &str = "support_files";
pub const EXPERIMENTS_DIR_NAME: &str = "training_experiments";
pub const BLENDER_TEMP_DIR_NAME: &str = "blender_temp";
pub const EVAL_MOCAP_SUBDIR: &str = "evaluation_mocaps/original";
pub const MARKER_LAYOUT_SUBDIR: &str = "marker_layouts/SOMA/soma_subject1/clap_001.c3d";
pub const RENDER_SCRIPT_SUBDIR: &str = "render/render_mocap.py";
pub const RENDER_MANIFEST_FNAME: &str = "render_manifest.json";
pub const RENDER_VIDEO_EXT: &str = "mp4";
pub const BLEND_FILE_EXT: &str = "blend";

const_assert!(DEFAULT_VIDEO_FPS > 0);
const_assert!(DEFAULT_MESH_DS_RATE > 0);
const_assert!(DEFAULT_RESOLUTION[0] > 0 && DEFAULT_RESOLUTION[1] > 0);
